use std::collections::HashMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::Event;
use crate::model::Message;

/// A persistent handler bound to one event name.
pub type EventHandler = Arc<dyn Fn(Event) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

type Predicate = Box<dyn Fn(&Event) -> bool + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("timed out after {0:?} waiting for event")]
    Timeout(Duration),
    #[error("listener registry dropped the waiter")]
    Closed,
}

/// A one-shot waiter. Inert once its receiver is gone.
struct Waiter {
    predicate: Predicate,
    tx: oneshot::Sender<Event>,
}

/// Named event handlers plus one-shot waiters.
#[derive(Default)]
pub struct Listeners {
    handlers: RwLock<HashMap<String, Vec<EventHandler>>>,
    waiters: Mutex<HashMap<String, Vec<Waiter>>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to an event name. Every announcement runs it as its own task.
    pub fn on<F, Fut>(&self, event: &str, handler: F)
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: EventHandler = Arc::new(move |event| handler(event).boxed());
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    pub fn has_handlers(&self, event: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .is_some_and(|h| !h.is_empty())
    }

    /// Register a one-shot waiter; the receiver resolves with the next
    /// announcement of `event` that satisfies `predicate`.
    pub fn register_waiter<P>(&self, event: &str, predicate: P) -> oneshot::Receiver<Event>
    where
        P: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.to_string())
            .or_default()
            .push(Waiter {
                predicate: Box::new(predicate),
                tx,
            });
        rx
    }

    /// Wait for the next matching announcement. `None` waits forever.
    ///
    /// On timeout the waiter is abandoned; it is pruned the next time its
    /// event is announced.
    pub async fn wait_for<P>(&self, event: &str, predicate: P, timeout: Option<Duration>) -> Result<Event, WaitError>
    where
        P: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        let rx = self.register_waiter(event, predicate);
        match timeout {
            Some(limit) => tokio::time::timeout(limit, rx)
                .await
                .map_err(|_| WaitError::Timeout(limit))?
                .map_err(|_| WaitError::Closed),
            None => rx.await.map_err(|_| WaitError::Closed),
        }
    }

    /// Wait for the next `message` event whose message satisfies `predicate`.
    pub async fn wait_for_message<P>(&self, predicate: P, timeout: Option<Duration>) -> Result<Message, WaitError>
    where
        P: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        let event = self
            .wait_for(
                "message",
                move |event| event.as_message().is_some_and(&predicate),
                timeout,
            )
            .await?;
        event.into_message().ok_or(WaitError::Closed)
    }

    /// Resolve matching waiters, then spawn every handler bound to the event.
    /// Returns the number of handlers spawned. Must run inside a tokio runtime.
    pub fn dispatch(&self, event: Event) -> usize {
        let name = event.name();
        self.resolve_waiters(name, &event);

        let handlers: Vec<EventHandler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .unwrap_or_default();

        for handler in &handlers {
            let fut = handler(event.clone());
            tokio::spawn(async move {
                if let Err(e) = fut.await {
                    warn!(event = name, error = %e, "event handler failed");
                }
            });
        }
        if !handlers.is_empty() {
            debug!(event = name, handlers = handlers.len(), "event dispatched");
        }
        handlers.len()
    }

    /// Predicates run with the waiter map unlocked, so they may register
    /// further waiters. A panicking predicate only loses its own waiter.
    fn resolve_waiters(&self, name: &str, event: &Event) {
        let Some(pending) = self
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
        else {
            return;
        };

        let mut kept = Vec::with_capacity(pending.len());
        for waiter in pending {
            if waiter.tx.is_closed() {
                continue;
            }
            match panic::catch_unwind(AssertUnwindSafe(|| (waiter.predicate)(event))) {
                // The receiver may have timed out in between; nothing to do then.
                Ok(true) => {
                    let _ = waiter.tx.send(event.clone());
                }
                Ok(false) => kept.push(waiter),
                Err(_) => warn!(event = name, "waiter predicate panicked; dropping waiter"),
            }
        }
        if kept.is_empty() {
            return;
        }

        let mut waiters = self.waiters.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = waiters.entry(name.to_string()).or_default();
        // Waiters registered meanwhile go after the ones already queued.
        kept.append(slot);
        *slot = kept;
    }

    #[cfg(test)]
    pub(crate) fn pending_waiters(&self, event: &str) -> usize {
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cache::history::tests::message;

    #[tokio::test]
    async fn test_handlers_run_per_event() {
        let listeners = Listeners::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let counter = hits.clone();
        listeners.on("message", move |event| {
            let counter = counter.clone();
            let tx = tx.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tx.send(event.name())?;
                Ok(())
            }
        });

        assert_eq!(listeners.dispatch(Event::Message(message("m1", "c1"))), 1);
        assert_eq!(listeners.dispatch(Event::Ready), 0);
        assert_eq!(rx.recv().await, Some("message"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_others() {
        let listeners = Listeners::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        listeners.on("ready", |_| async { anyhow::bail!("boom") });
        listeners.on("ready", move |_| {
            let tx = tx.clone();
            async move {
                tx.send(())?;
                Ok(())
            }
        });

        assert_eq!(listeners.dispatch(Event::Ready), 2);
        assert_eq!(rx.recv().await, Some(()));
        assert!(listeners.has_handlers("ready"));
        assert!(!listeners.has_handlers("message"));
    }

    #[tokio::test]
    async fn test_wait_for_resolves_on_matching_event() {
        let listeners = Arc::new(Listeners::new());

        let waiter = {
            let listeners = listeners.clone();
            tokio::spawn(async move {
                listeners
                    .wait_for_message(|m| m.content.contains("m2"), Some(Duration::from_secs(5)))
                    .await
            })
        };
        while listeners.pending_waiters("message") == 0 {
            tokio::task::yield_now().await;
        }

        listeners.dispatch(Event::Message(message("m1", "c1")));
        assert_eq!(listeners.pending_waiters("message"), 1);
        listeners.dispatch(Event::Message(message("m2", "c1")));

        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got.id, "m2");
        assert_eq!(listeners.pending_waiters("message"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_times_out() {
        let listeners = Listeners::new();
        let err = listeners
            .wait_for("ready", |_| true, Some(Duration::from_secs(3)))
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Timeout(d) if d == Duration::from_secs(3)));

        // The abandoned waiter is inert and pruned on the next announcement.
        assert_eq!(listeners.pending_waiters("ready"), 1);
        listeners.dispatch(Event::Ready);
        assert_eq!(listeners.pending_waiters("ready"), 0);
    }

    #[tokio::test]
    async fn test_multiple_waiters_all_resolve() {
        let listeners = Listeners::new();
        let a = listeners.register_waiter("ready", |_| true);
        let b = listeners.register_waiter("ready", |_| true);
        listeners.dispatch(Event::Ready);
        assert!(matches!(a.await, Ok(Event::Ready)));
        assert!(matches!(b.await, Ok(Event::Ready)));
    }

    #[tokio::test]
    async fn test_predicate_may_register_waiters() {
        let listeners = Arc::new(Listeners::new());
        let inner = listeners.clone();
        let first = listeners.register_waiter("ready", move |_| {
            drop(inner.register_waiter("ready", |_| true));
            inner.register_waiter("message", |_| true);
            false
        });

        listeners.dispatch(Event::Ready);
        assert_eq!(listeners.pending_waiters("ready"), 2);
        assert_eq!(listeners.pending_waiters("message"), 1);
        drop(first);
    }

    #[tokio::test]
    async fn test_panicking_predicate_keeps_other_waiters() {
        let listeners = Listeners::new();
        let broken = listeners.register_waiter("ready", |_| panic!("bad predicate"));
        let later = listeners.register_waiter("ready", |event| matches!(event, Event::Message(_)));
        let now = listeners.register_waiter("ready", |_| true);

        listeners.dispatch(Event::Ready);
        assert!(broken.await.is_err());
        assert!(matches!(now.await, Ok(Event::Ready)));
        assert_eq!(listeners.pending_waiters("ready"), 1);
        drop(later);
    }
}
