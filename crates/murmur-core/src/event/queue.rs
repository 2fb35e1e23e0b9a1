//! Priority event queue with a reentrant-safe drain loop.
//!
//! Events (news, mood shifts, interaction prompts) are drained strictly by
//! priority — a critical event enqueued late still dispatches before an
//! earlier low-priority one — with insertion order as the tie-break within
//! equal priority, so dispatch is deterministic. Each event fans out
//! concurrently to the listeners registered for its exact kind plus the
//! wildcard listeners; one listener's failure is logged and never aborts
//! its siblings or the drain. A bounded history of dispatched events is
//! retained for introspection.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{debug, warn};

use murmur_types::error::PipelineError;
use murmur_types::event::{EventKind, PersonaEvent};

/// Dispatched events kept for introspection.
const HISTORY_CAP: usize = 100;

/// The future a listener returns for one event.
pub type ListenerFuture = Pin<Box<dyn Future<Output = Result<(), PipelineError>> + Send>>;

type Listener = Arc<dyn Fn(PersonaEvent) -> ListenerFuture + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ListenerKey {
    Kind(EventKind),
    /// Wildcard: receives every event.
    All,
}

struct QueuedEvent {
    seq: u64,
    event: PersonaEvent,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Max-heap: higher priority first, then lower sequence (earlier
        // insertion) first among equals.
        self.event
            .priority
            .cmp(&other.event.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct ScheduledEntry {
    due_at: DateTime<Utc>,
    event: PersonaEvent,
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<QueuedEvent>,
    scheduled: Vec<ScheduledEntry>,
    history: VecDeque<PersonaEvent>,
    next_seq: u64,
}

/// Priority queue of internal events with listener dispatch.
#[derive(Default)]
pub struct EventQueue {
    state: Mutex<QueueState>,
    listeners: RwLock<HashMap<ListenerKey, Vec<Listener>>>,
    draining: AtomicBool,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one event kind.
    pub fn on(
        &self,
        kind: EventKind,
        listener: impl Fn(PersonaEvent) -> ListenerFuture + Send + Sync + 'static,
    ) {
        self.listeners
            .write()
            .expect("listener registry poisoned")
            .entry(ListenerKey::Kind(kind))
            .or_default()
            .push(Arc::new(listener));
    }

    /// Register a wildcard listener that receives every event.
    pub fn on_all(
        &self,
        listener: impl Fn(PersonaEvent) -> ListenerFuture + Send + Sync + 'static,
    ) {
        self.listeners
            .write()
            .expect("listener registry poisoned")
            .entry(ListenerKey::All)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Enqueue without draining. Callers batching several events enqueue
    /// them all, then drain once.
    pub fn enqueue(&self, event: PersonaEvent) {
        let mut state = self.state.lock().expect("event queue poisoned");
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(QueuedEvent { seq, event });
    }

    /// Enqueue and drive the queue to idle.
    pub async fn create_event(&self, event: PersonaEvent) {
        self.enqueue(event);
        self.drain().await;
    }

    /// Hold the event in the scheduled-future list; it joins the immediate
    /// queue once `promote_due` passes its deadline.
    pub fn schedule_event(&self, event: PersonaEvent, delay: Duration) {
        let due_at = Utc::now()
            + chrono::Duration::milliseconds(i64::try_from(delay.as_millis()).unwrap_or(i64::MAX));
        let mut state = self.state.lock().expect("event queue poisoned");
        state.scheduled.push(ScheduledEntry { due_at, event });
    }

    /// Move due scheduled events into the immediate queue and drain.
    pub async fn promote_due(&self, now: DateTime<Utc>) {
        let promoted = {
            let mut state = self.state.lock().expect("event queue poisoned");
            let mut promoted = 0;
            let mut index = 0;
            while index < state.scheduled.len() {
                if state.scheduled[index].due_at <= now {
                    let entry = state.scheduled.swap_remove(index);
                    let seq = state.next_seq;
                    state.next_seq += 1;
                    state.heap.push(QueuedEvent {
                        seq,
                        event: entry.event,
                    });
                    promoted += 1;
                } else {
                    index += 1;
                }
            }
            promoted
        };
        if promoted > 0 {
            debug!(promoted, "scheduled events became due");
            self.drain().await;
        }
    }

    /// Process the whole queue to completion.
    ///
    /// Reentrant-safe: a drain triggered while another is running returns
    /// immediately, and the running drain picks up whatever was enqueued.
    pub async fn drain(&self) {
        loop {
            if self.draining.swap(true, Ordering::SeqCst) {
                // Another drain is active and will see our events.
                return;
            }

            while let Some(queued) = {
                let mut state = self.state.lock().expect("event queue poisoned");
                state.heap.pop()
            } {
                self.dispatch(queued.event).await;
            }

            self.draining.store(false, Ordering::SeqCst);

            // An enqueue may have slipped in between the last pop and the
            // flag clearing; loop back rather than leave it stranded.
            let idle = self
                .state
                .lock()
                .expect("event queue poisoned")
                .heap
                .is_empty();
            if idle {
                return;
            }
        }
    }

    /// Fan one event out to its kind listeners plus the wildcard listeners,
    /// concurrently, isolating individual failures.
    async fn dispatch(&self, event: PersonaEvent) {
        let listeners: Vec<Listener> = {
            let registry = self.listeners.read().expect("listener registry poisoned");
            let mut matched = Vec::new();
            if let Some(exact) = registry.get(&ListenerKey::Kind(event.kind)) {
                matched.extend(exact.iter().cloned());
            }
            if let Some(all) = registry.get(&ListenerKey::All) {
                matched.extend(all.iter().cloned());
            }
            matched
        };

        if listeners.is_empty() {
            debug!(kind = %event.kind, "event dispatched with no listeners");
        } else {
            let results = join_all(listeners.iter().map(|l| l(event.clone()))).await;
            for result in results {
                if let Err(e) = result {
                    warn!(kind = %event.kind, event_id = %event.id, error = %e, "event listener failed");
                }
            }
        }

        let mut state = self.state.lock().expect("event queue poisoned");
        state.history.push_back(event);
        while state.history.len() > HISTORY_CAP {
            state.history.pop_front();
        }
    }

    /// Dispatched events, oldest first, bounded at the history cap.
    pub fn history(&self) -> Vec<PersonaEvent> {
        self.state
            .lock()
            .expect("event queue poisoned")
            .history
            .iter()
            .cloned()
            .collect()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().expect("event queue poisoned").heap.len()
    }

    pub fn scheduled(&self) -> usize {
        self.state
            .lock()
            .expect("event queue poisoned")
            .scheduled
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_types::event::EventPriority;
    use serde_json::json;
    use std::sync::Arc as StdArc;

    fn event(kind: EventKind, priority: EventPriority, marker: &str) -> PersonaEvent {
        PersonaEvent::new(kind, json!({ "marker": marker })).with_priority(priority)
    }

    fn marker_of(event: &PersonaEvent) -> String {
        event.payload["marker"].as_str().unwrap_or("").to_string()
    }

    #[tokio::test]
    async fn drains_by_priority_not_insertion_order() {
        let queue = EventQueue::new();
        let seen = StdArc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        queue.on_all(move |event| {
            let sink = sink.clone();
            Box::pin(async move {
                sink.lock().unwrap().push(marker_of(&event));
                Ok(())
            })
        });

        queue.enqueue(event(EventKind::News, EventPriority::Low, "low"));
        queue.enqueue(event(EventKind::News, EventPriority::Critical, "critical"));
        queue.enqueue(event(EventKind::News, EventPriority::Normal, "normal"));
        queue.drain().await;

        assert_eq!(*seen.lock().unwrap(), vec!["critical", "normal", "low"]);
    }

    #[tokio::test]
    async fn equal_priority_preserves_insertion_order() {
        let queue = EventQueue::new();
        let seen = StdArc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        queue.on_all(move |event| {
            let sink = sink.clone();
            Box::pin(async move {
                sink.lock().unwrap().push(marker_of(&event));
                Ok(())
            })
        });

        for marker in ["first", "second", "third"] {
            queue.enqueue(event(EventKind::News, EventPriority::Normal, marker));
        }
        queue.drain().await;

        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn exact_kind_and_wildcard_listeners_both_fire() {
        let queue = EventQueue::new();
        let count = StdArc::new(Mutex::new(0usize));

        let c1 = count.clone();
        queue.on(EventKind::News, move |_| {
            let c1 = c1.clone();
            Box::pin(async move {
                *c1.lock().unwrap() += 1;
                Ok(())
            })
        });
        let c2 = count.clone();
        queue.on_all(move |_| {
            let c2 = c2.clone();
            Box::pin(async move {
                *c2.lock().unwrap() += 1;
                Ok(())
            })
        });
        let c3 = count.clone();
        queue.on(EventKind::MoodShift, move |_| {
            let c3 = c3.clone();
            Box::pin(async move {
                *c3.lock().unwrap() += 100;
                Ok(())
            })
        });

        queue
            .create_event(event(EventKind::News, EventPriority::Normal, "n"))
            .await;

        // News listener + wildcard, but not the mood-shift listener.
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn listener_failure_does_not_abort_siblings_or_drain() {
        let queue = EventQueue::new();
        let survived = StdArc::new(Mutex::new(Vec::new()));

        queue.on(EventKind::News, |_| {
            Box::pin(async {
                Err(PipelineError::UnknownAgent("ghost".to_string()))
            })
        });
        let sink = survived.clone();
        queue.on(EventKind::News, move |event| {
            let sink = sink.clone();
            Box::pin(async move {
                sink.lock().unwrap().push(marker_of(&event));
                Ok(())
            })
        });

        queue.enqueue(event(EventKind::News, EventPriority::Normal, "a"));
        queue.enqueue(event(EventKind::News, EventPriority::Normal, "b"));
        queue.drain().await;

        assert_eq!(*survived.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn enqueue_from_listener_is_drained_by_running_loop() {
        let queue = StdArc::new(EventQueue::new());
        let seen = StdArc::new(Mutex::new(Vec::new()));

        let reenqueue = queue.clone();
        let sink = seen.clone();
        queue.on(EventKind::News, move |event| {
            let reenqueue = reenqueue.clone();
            let sink = sink.clone();
            Box::pin(async move {
                sink.lock().unwrap().push(marker_of(&event));
                if marker_of(&event) == "seed" {
                    // Triggers a nested drain which must return immediately.
                    reenqueue
                        .create_event(PersonaEvent::new(
                            EventKind::News,
                            json!({ "marker": "follow-up" }),
                        ))
                        .await;
                }
                Ok(())
            })
        });

        queue
            .create_event(event(EventKind::News, EventPriority::Normal, "seed"))
            .await;

        assert_eq!(*seen.lock().unwrap(), vec!["seed", "follow-up"]);
    }

    #[tokio::test]
    async fn scheduled_events_wait_for_promotion() {
        let queue = EventQueue::new();
        let seen = StdArc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        queue.on_all(move |event| {
            let sink = sink.clone();
            Box::pin(async move {
                sink.lock().unwrap().push(marker_of(&event));
                Ok(())
            })
        });

        queue.schedule_event(
            event(EventKind::News, EventPriority::Normal, "later"),
            Duration::from_millis(50),
        );
        assert_eq!(queue.scheduled(), 1);

        queue.promote_due(Utc::now()).await;
        assert!(seen.lock().unwrap().is_empty(), "not due yet");

        queue
            .promote_due(Utc::now() + chrono::Duration::seconds(1))
            .await;
        assert_eq!(*seen.lock().unwrap(), vec!["later"]);
        assert_eq!(queue.scheduled(), 0);
    }

    #[tokio::test]
    async fn history_is_bounded_and_oldest_evicted() {
        let queue = EventQueue::new();
        for i in 0..(HISTORY_CAP + 10) {
            queue
                .create_event(event(
                    EventKind::News,
                    EventPriority::Normal,
                    &format!("e{i}"),
                ))
                .await;
        }

        let history = queue.history();
        assert_eq!(history.len(), HISTORY_CAP);
        assert_eq!(marker_of(&history[0]), "e10");
        assert_eq!(marker_of(history.last().unwrap()), "e109");
    }
}
