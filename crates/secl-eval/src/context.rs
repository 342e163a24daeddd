//! Per-evaluation context.
//!
//! A [`Context`] carries everything one evaluation needs: the event being
//! inspected, the register slots used by iterator-bound fields, and the
//! `now` reference for duration comparisons. One context serves exactly one
//! evaluation at a time; concurrent evaluations use distinct contexts over
//! the same compiled tree.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::event::Event;

/// The state passed into every evaluator closure.
pub struct Context<'a> {
    event: Event<'a>,
    /// Register id → current element index, written by the iteration
    /// wrapper and read by register-scoped accessors.
    registers: RefCell<HashMap<String, usize>>,
    /// Reference time in nanoseconds since the epoch.
    now: i64,
}

impl<'a> Context<'a> {
    /// A context over `event` with `now` taken from the system clock.
    pub fn new(event: &'a Value) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as i64);
        Context::with_now(event, now)
    }

    /// A context with an explicit `now`, in nanoseconds since the epoch.
    pub fn with_now(event: &'a Value, now: i64) -> Self {
        Context {
            event: Event::from_value(event),
            registers: RefCell::new(HashMap::new()),
            now,
        }
    }

    /// The event under evaluation.
    pub fn event(&self) -> Event<'a> {
        self.event
    }

    /// The reference time used by duration comparisons.
    pub fn now(&self) -> i64 {
        self.now
    }

    /// Bind a register to the element index it currently points at.
    pub fn set_register(&self, id: &str, idx: usize) {
        self.registers.borrow_mut().insert(id.to_string(), idx);
    }

    /// The current element index of a register, if bound.
    pub fn register(&self, id: &str) -> Option<usize> {
        self.registers.borrow().get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_slots_round_trip() {
        let v = json!({});
        let ctx = Context::with_now(&v, 0);
        assert_eq!(ctx.register("abcd1234"), None);
        ctx.set_register("abcd1234", 2);
        assert_eq!(ctx.register("abcd1234"), Some(2));
        ctx.set_register("abcd1234", 0);
        assert_eq!(ctx.register("abcd1234"), Some(0));
    }

    #[test]
    fn explicit_now_wins() {
        let v = json!({});
        let ctx = Context::with_now(&v, 1_000);
        assert_eq!(ctx.now(), 1_000);
    }

    #[test]
    fn system_now_is_nonzero() {
        let v = json!({});
        let ctx = Context::new(&v);
        assert!(ctx.now() > 0);
    }
}
