use std::cell::Cell;

use tracing::{debug, error};
use yieldpoint_core::config::MAX_FRAME_RATE;
pub use yieldpoint_core::config::MAX_YIELD_INTERVAL_MS;
use yieldpoint_core::{Millis, SchedulerConfig, SchedulerError};

/// Decides when a running window should hand control back to the host.
///
/// Each window gets `deadline = window_start + yield_interval`. Past the
/// deadline, a host with an input-pending probe is only yielded to for a
/// pending paint or pending input, until `max_yield_interval` after the
/// window started; a host without the probe is yielded to straight away.
#[derive(Debug)]
pub struct YieldPolicy {
    default_yield_interval: Millis,
    max_yield_interval: Millis,
    input_pending_enabled: bool,
    yield_interval: Cell<Millis>,
    window_start: Cell<Millis>,
    deadline: Cell<Millis>,
    needs_paint: Cell<bool>,
}

impl Default for YieldPolicy {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

impl YieldPolicy {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            default_yield_interval: config.yield_interval_ms,
            max_yield_interval: config.max_yield_interval_ms,
            input_pending_enabled: config.enable_input_pending,
            yield_interval: Cell::new(config.yield_interval_ms),
            window_start: Cell::new(0.0),
            deadline: Cell::new(0.0),
            needs_paint: Cell::new(false),
        }
    }

    pub fn yield_interval(&self) -> Millis {
        self.yield_interval.get()
    }

    pub fn deadline(&self) -> Millis {
        self.deadline.get()
    }

    pub fn needs_paint(&self) -> bool {
        self.needs_paint.get()
    }

    /// Start the clock for a freshly granted window.
    pub fn begin_window(&self, now: Millis) {
        self.window_start.set(now);
        self.deadline.set(now + self.yield_interval.get());
    }

    /// Yielding gives the host a chance to paint, so the request is spent.
    pub fn end_window(&self) {
        self.needs_paint.set(false);
    }

    /// Only meaningful when the host can report pending input; otherwise the
    /// window always ends at its deadline anyway.
    pub fn request_paint(&self, host_has_probe: bool) {
        if self.input_pending_enabled && host_has_probe {
            self.needs_paint.set(true);
        }
    }

    /// `input_pending` is `None` when the host has no probe.
    pub fn should_yield(&self, now: Millis, input_pending: Option<bool>) -> bool {
        if now < self.deadline.get() {
            return false;
        }
        match input_pending {
            Some(pending) if self.input_pending_enabled => {
                if self.needs_paint.get() || pending {
                    return true;
                }
                now >= self.window_start.get() + self.max_yield_interval
            }
            _ => true,
        }
    }

    /// Derive the slice length from a frame rate in `0..=125`; 0 restores
    /// the configured default.
    pub fn force_frame_rate(&self, fps: i32) -> Result<(), SchedulerError> {
        if !(0..=MAX_FRAME_RATE).contains(&fps) {
            error!(
                fps,
                "force_frame_rate takes an integer between 0 and 125, \
                 forcing frame rates higher than 125 fps is not supported"
            );
            return Err(SchedulerError::InvalidFrameRate(fps));
        }
        let interval = if fps > 0 {
            (1000.0 / fps as f64).floor().min(self.max_yield_interval)
        } else {
            self.default_yield_interval
        };
        debug!(fps, yield_interval_ms = interval, "Frame rate applied");
        self.yield_interval.set(interval);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_yield_before_deadline() {
        let policy = YieldPolicy::default();
        policy.begin_window(100.0);
        assert_eq!(policy.deadline(), 105.0);
        assert!(!policy.should_yield(104.9, None));
        assert!(!policy.should_yield(104.9, Some(true)));
    }

    #[test]
    fn without_probe_yields_at_deadline() {
        let policy = YieldPolicy::default();
        policy.begin_window(0.0);
        assert!(policy.should_yield(5.0, None));
    }

    #[test]
    fn with_probe_keeps_working_until_ceiling() {
        let policy = YieldPolicy::default();
        policy.begin_window(1000.0);
        assert!(!policy.should_yield(1006.0, Some(false)));
        assert!(!policy.should_yield(1299.0, Some(false)));
        assert!(policy.should_yield(1300.0, Some(false)));
    }

    #[test]
    fn with_probe_yields_for_input_or_paint() {
        let policy = YieldPolicy::default();
        policy.begin_window(0.0);
        assert!(policy.should_yield(6.0, Some(true)));

        policy.request_paint(true);
        assert!(policy.needs_paint());
        assert!(policy.should_yield(6.0, Some(false)));

        policy.end_window();
        assert!(!policy.needs_paint());
        assert!(!policy.should_yield(6.0, Some(false)));
    }

    #[test]
    fn paint_request_ignored_without_probe() {
        let policy = YieldPolicy::default();
        policy.request_paint(false);
        assert!(!policy.needs_paint());
    }

    #[test]
    fn disabled_probe_behaves_like_missing_probe() {
        let config = SchedulerConfig {
            enable_input_pending: false,
            ..SchedulerConfig::default()
        };
        let policy = YieldPolicy::from_config(&config);
        policy.begin_window(0.0);
        assert!(policy.should_yield(5.0, Some(false)));
        policy.request_paint(true);
        assert!(!policy.needs_paint());
    }

    #[test]
    fn force_frame_rate_sets_slice() {
        let policy = YieldPolicy::default();
        policy.force_frame_rate(60).unwrap();
        assert_eq!(policy.yield_interval(), 16.0);
        policy.force_frame_rate(125).unwrap();
        assert_eq!(policy.yield_interval(), 8.0);
        policy.force_frame_rate(1).unwrap();
        assert_eq!(policy.yield_interval(), MAX_YIELD_INTERVAL_MS);
        policy.force_frame_rate(0).unwrap();
        assert_eq!(policy.yield_interval(), 5.0);
    }

    #[test]
    fn force_frame_rate_rejects_out_of_range() {
        let policy = YieldPolicy::default();
        policy.force_frame_rate(30).unwrap();
        assert!(matches!(
            policy.force_frame_rate(126),
            Err(SchedulerError::InvalidFrameRate(126))
        ));
        assert!(matches!(
            policy.force_frame_rate(-1),
            Err(SchedulerError::InvalidFrameRate(-1))
        ));
        assert_eq!(policy.yield_interval(), 33.0);
    }
}
