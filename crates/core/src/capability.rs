//! Event-capability probe.
//!
//! Answers whether a host environment can dispatch a named event natively.
//! This has no connection to the scheduler; it only needs a view of the
//! environment's object model.
//!
//! Does not give correct answers for non-generic events such as `change`,
//! `reset`, `load`, `error` and `select`.

/// Read-only view of a host environment's event object model.
pub trait EventEnvironment {
    /// Whether a document object model is available at all.
    fn can_use_dom(&self) -> bool;

    /// Whether the document exposes a handler property with this name
    /// (for example `onclick`).
    fn has_handler_property(&self, name: &str) -> bool;

    /// Create a scratch element, set the attribute `name` to a no-op handler
    /// body and report whether the element turned it into a callable.
    fn synthetic_attribute_is_callable(&self, name: &str) -> bool;
}

/// Check whether `event_name_suffix` (e.g. `"click"`) is supported.
pub fn is_event_supported<E: EventEnvironment + ?Sized>(env: &E, event_name_suffix: &str) -> bool {
    if !env.can_use_dom() {
        return false;
    }

    let event_name = format!("on{}", event_name_suffix);
    env.has_handler_property(&event_name) || env.synthetic_attribute_is_callable(&event_name)
}
