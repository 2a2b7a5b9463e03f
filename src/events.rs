//! Event subscriptions
//!
//! Handlers are registered against an event kind when a component starts and
//! removed when it shuts down. Dispatch runs the handlers for one kind in the
//! order they were registered, passing the owning component's state along.

use std::fmt::Debug;
use tracing::debug;

/// Handle returned by [`Subscriptions::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Handler<C, E> = Box<dyn Fn(&mut C, &E) + Send>;

pub struct Subscriptions<K, C, E> {
    next_id: u64,
    handlers: Vec<(SubscriptionId, K, Handler<C, E>)>,
}

impl<K, C, E> Default for Subscriptions<K, C, E>
where
    K: Copy + PartialEq + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, C, E> Subscriptions<K, C, E>
where
    K: Copy + PartialEq + Debug,
{
    pub fn new() -> Self {
        Self {
            next_id: 1,
            handlers: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, kind: K, handler: F) -> SubscriptionId
    where
        F: Fn(&mut C, &E) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        debug!("Subscribed {:?} as {:?}", kind, id);
        self.handlers.push((id, kind, Box::new(handler)));
        id
    }

    /// Remove one handler. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _, _)| *handler_id != id);
        before != self.handlers.len()
    }

    /// Remove every handler, returning how many were registered
    pub fn clear(&mut self) -> usize {
        let count = self.handlers.len();
        self.handlers.clear();
        count
    }

    /// Run every handler registered for `kind`. Returns how many ran.
    pub fn dispatch(&self, kind: K, ctx: &mut C, event: &E) -> usize {
        let mut ran = 0;
        for (_, handler_kind, handler) in &self.handlers {
            if *handler_kind == kind {
                handler(ctx, event);
                ran += 1;
            }
        }
        ran
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<K: Debug, C, E> Debug for Subscriptions<K, C, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<&K> = self.handlers.iter().map(|(_, kind, _)| kind).collect();
        f.debug_struct("Subscriptions")
            .field("kinds", &kinds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Kind {
        Up,
        Down,
    }

    #[test]
    fn test_dispatch_runs_matching_handlers_in_order() {
        let mut subs: Subscriptions<Kind, Vec<String>, &str> = Subscriptions::new();
        subs.subscribe(Kind::Up, |log: &mut Vec<String>, e: &&str| {
            log.push(format!("first {}", e))
        });
        subs.subscribe(Kind::Down, |log: &mut Vec<String>, _| log.push("down".to_string()));
        subs.subscribe(Kind::Up, |log: &mut Vec<String>, e: &&str| {
            log.push(format!("second {}", e))
        });

        let mut log = Vec::new();
        let ran = subs.dispatch(Kind::Up, &mut log, &"x");
        assert_eq!(ran, 2);
        assert_eq!(log, vec!["first x", "second x"]);
    }

    #[test]
    fn test_unsubscribe_removes_handler() {
        let mut subs: Subscriptions<Kind, u32, ()> = Subscriptions::new();
        let id = subs.subscribe(Kind::Up, |count: &mut u32, _| *count += 1);
        subs.subscribe(Kind::Up, |count: &mut u32, _| *count += 10);

        assert!(subs.unsubscribe(id));
        assert!(!subs.unsubscribe(id));

        let mut count = 0;
        subs.dispatch(Kind::Up, &mut count, &());
        assert_eq!(count, 10);

        assert_eq!(subs.clear(), 1);
        assert!(subs.is_empty());
        assert_eq!(subs.dispatch(Kind::Up, &mut count, &()), 0);
    }
}
