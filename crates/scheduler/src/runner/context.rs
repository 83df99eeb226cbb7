use std::cell::Cell;

use crate::priority::PriorityLevel;

use super::Scheduler;

/// Sets the ambient priority and restores the previous one when dropped.
pub struct PriorityScope<'a> {
    current: &'a Cell<PriorityLevel>,
    previous: PriorityLevel,
}

impl<'a> PriorityScope<'a> {
    fn enter(current: &'a Cell<PriorityLevel>, level: PriorityLevel) -> Self {
        let previous = current.replace(level);
        Self { current, previous }
    }
}

impl Drop for PriorityScope<'_> {
    fn drop(&mut self) {
        self.current.set(self.previous);
    }
}

impl Scheduler {
    pub fn current_priority_level(&self) -> PriorityLevel {
        self.inner.current_priority.get()
    }

    /// Make `level` the ambient priority until the returned scope is dropped.
    pub fn enter_priority(&self, level: impl Into<PriorityLevel>) -> PriorityScope<'_> {
        PriorityScope::enter(&self.inner.current_priority, level.into())
    }

    /// Run `f` with `level` as the ambient priority. Raw levels outside
    /// the known range run at `Normal`.
    pub fn run_with_priority<R>(&self, level: impl Into<PriorityLevel>, f: impl FnOnce() -> R) -> R {
        let _scope = self.enter_priority(level);
        f()
    }

    /// Run `f` at `Normal` when the ambient priority is `Normal` or more
    /// urgent; `Low` and `Idle` are kept as they are.
    pub fn next<R>(&self, f: impl FnOnce() -> R) -> R {
        let level = match self.current_priority_level() {
            PriorityLevel::Immediate | PriorityLevel::UserBlocking | PriorityLevel::Normal => {
                PriorityLevel::Normal
            }
            lower => lower,
        };
        let _scope = self.enter_priority(level);
        f()
    }

    /// Capture the ambient priority now and re-establish it around every
    /// later call of the returned closure.
    pub fn wrap_callback<F, R>(&self, mut f: F) -> impl FnMut() -> R
    where
        F: FnMut() -> R,
    {
        let scheduler = self.clone();
        let parent_level = self.current_priority_level();
        move || {
            let _scope = PriorityScope::enter(&scheduler.inner.current_priority, parent_level);
            f()
        }
    }
}
