use serde::{Deserialize, Serialize};
use yieldpoint_core::Millis;

/// Max 31 bit integer, used as the "never times out" timeout.
pub const MAX_SIGNED_31_BIT_INT: Millis = 1_073_741_823.0;

pub const IMMEDIATE_PRIORITY_TIMEOUT: Millis = -1.0;
pub const USER_BLOCKING_PRIORITY_TIMEOUT: Millis = 250.0;
pub const NORMAL_PRIORITY_TIMEOUT: Millis = 5000.0;
pub const LOW_PRIORITY_TIMEOUT: Millis = 10000.0;
pub const IDLE_PRIORITY_TIMEOUT: Millis = MAX_SIGNED_31_BIT_INT;

/// Task urgency class. Lower numeric value = more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    /// Already expired when scheduled; runs before any time-slice check.
    Immediate = 1,
    UserBlocking = 2,
    #[default]
    Normal = 3,
    Low = 4,
    /// Never expires, so never forces its way past a yield.
    Idle = 5,
}

impl PriorityLevel {
    pub const ALL: [PriorityLevel; 5] = [
        PriorityLevel::Immediate,
        PriorityLevel::UserBlocking,
        PriorityLevel::Normal,
        PriorityLevel::Low,
        PriorityLevel::Idle,
    ];

    /// Timeout added to a task's start time to get its expiration time.
    pub fn timeout(self) -> Millis {
        match self {
            PriorityLevel::Immediate => IMMEDIATE_PRIORITY_TIMEOUT,
            PriorityLevel::UserBlocking => USER_BLOCKING_PRIORITY_TIMEOUT,
            PriorityLevel::Normal => NORMAL_PRIORITY_TIMEOUT,
            PriorityLevel::Low => LOW_PRIORITY_TIMEOUT,
            PriorityLevel::Idle => IDLE_PRIORITY_TIMEOUT,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriorityLevel::Immediate => "immediate",
            PriorityLevel::UserBlocking => "user_blocking",
            PriorityLevel::Normal => "normal",
            PriorityLevel::Low => "low",
            PriorityLevel::Idle => "idle",
        }
    }
}

/// Unknown raw levels normalize to `Normal`.
impl From<u8> for PriorityLevel {
    fn from(raw: u8) -> Self {
        match raw {
            1 => PriorityLevel::Immediate,
            2 => PriorityLevel::UserBlocking,
            3 => PriorityLevel::Normal,
            4 => PriorityLevel::Low,
            5 => PriorityLevel::Idle,
            _ => PriorityLevel::Normal,
        }
    }
}

impl std::fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering() {
        assert!(PriorityLevel::Immediate < PriorityLevel::UserBlocking);
        assert!(PriorityLevel::UserBlocking < PriorityLevel::Normal);
        assert!(PriorityLevel::Normal < PriorityLevel::Low);
        assert!(PriorityLevel::Low < PriorityLevel::Idle);
    }

    #[test]
    fn timeout_for_priority() {
        assert_eq!(PriorityLevel::Immediate.timeout(), -1.0);
        assert_eq!(PriorityLevel::UserBlocking.timeout(), 250.0);
        assert_eq!(PriorityLevel::Normal.timeout(), 5000.0);
        assert_eq!(PriorityLevel::Low.timeout(), 10000.0);
        assert_eq!(PriorityLevel::Idle.timeout(), 1073741823.0);
    }

    #[test]
    fn raw_levels_round_trip_and_unknown_normalizes() {
        for level in PriorityLevel::ALL {
            assert_eq!(PriorityLevel::from(level.as_u8()), level);
        }
        assert_eq!(PriorityLevel::from(0), PriorityLevel::Normal);
        assert_eq!(PriorityLevel::from(42), PriorityLevel::Normal);
        assert_eq!(PriorityLevel::default(), PriorityLevel::Normal);
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&PriorityLevel::UserBlocking).unwrap();
        assert_eq!(json, "\"user_blocking\"");
        let level: PriorityLevel = serde_json::from_str("\"idle\"").unwrap();
        assert_eq!(level, PriorityLevel::Idle);
    }
}
