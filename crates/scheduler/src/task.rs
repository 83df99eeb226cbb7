use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use yieldpoint_core::{Millis, TaskError};

use crate::heap::HeapNode;
use crate::priority::PriorityLevel;

/// One-shot unit of work. Receives `did_timeout`: whether the task had
/// already expired when it was invoked.
pub type TaskCallback = Box<dyn FnOnce(bool) -> CallbackResult>;

pub type CallbackResult = Result<Step, TaskError>;

/// What a callback hands back to the scheduler.
pub enum Step {
    /// The task is finished.
    Done,
    /// More work remains; run this continuation on a later turn.
    Continue(TaskCallback),
}

impl Step {
    pub fn continue_with<F>(callback: F) -> Self
    where
        F: FnOnce(bool) -> CallbackResult + 'static,
    {
        Step::Continue(Box::new(callback))
    }

    pub fn is_continuation(&self) -> bool {
        matches!(self, Step::Continue(_))
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Done => f.write_str("Done"),
            Step::Continue(_) => f.write_str("Continue(..)"),
        }
    }
}

/// Scheduled task record. Timing fields are fixed at creation; the rest is
/// mutated in place while the task sits in a queue.
pub struct Task {
    id: u64,
    priority_level: PriorityLevel,
    start_time: Millis,
    expiration_time: Millis,
    sort_index: Cell<Millis>,
    callback: RefCell<Option<TaskCallback>>,
    is_queued: Cell<bool>,
}

/// Opaque, shared reference to a scheduled task. Compares by identity.
#[derive(Clone)]
pub struct TaskHandle(Rc<Task>);

impl TaskHandle {
    pub(crate) fn new(
        id: u64,
        priority_level: PriorityLevel,
        start_time: Millis,
        callback: TaskCallback,
    ) -> Self {
        Self(Rc::new(Task {
            id,
            priority_level,
            start_time,
            expiration_time: start_time + priority_level.timeout(),
            sort_index: Cell::new(-1.0),
            callback: RefCell::new(Some(callback)),
            is_queued: Cell::new(false),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn priority_level(&self) -> PriorityLevel {
        self.0.priority_level
    }

    pub fn start_time(&self) -> Millis {
        self.0.start_time
    }

    pub fn expiration_time(&self) -> Millis {
        self.0.expiration_time
    }

    pub fn is_queued(&self) -> bool {
        self.0.is_queued.get()
    }

    /// False once the task has been canceled, or while its callback is
    /// running.
    pub fn has_callback(&self) -> bool {
        self.0.callback.borrow().is_some()
    }

    pub(crate) fn set_sort_index(&self, value: Millis) {
        self.0.sort_index.set(value);
    }

    pub(crate) fn set_queued(&self, queued: bool) {
        self.0.is_queued.set(queued);
    }

    pub(crate) fn take_callback(&self) -> Option<TaskCallback> {
        self.0.callback.borrow_mut().take()
    }

    pub(crate) fn set_callback(&self, callback: TaskCallback) {
        *self.0.callback.borrow_mut() = Some(callback);
    }

    pub fn ptr_eq(&self, other: &TaskHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl HeapNode for TaskHandle {
    fn sort_index(&self) -> f64 {
        self.0.sort_index.get()
    }

    fn id(&self) -> u64 {
        self.0.id
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for TaskHandle {}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.0.id)
            .field("priority_level", &self.0.priority_level)
            .field("start_time", &self.0.start_time)
            .field("expiration_time", &self.0.expiration_time)
            .field("sort_index", &self.0.sort_index.get())
            .field("has_callback", &self.has_callback())
            .field("is_queued", &self.0.is_queued.get())
            .finish()
    }
}
