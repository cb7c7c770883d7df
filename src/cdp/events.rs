use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;

use futures_util::FutureExt;
use tracing::{debug, warn};

use super::types::Event;

/// Bound on the retained network log ring.
const NETWORK_LOG_LIMIT: usize = 10_000;

/// Event name whose occurrences are appended to the network log.
const NETWORK_REQUEST_EVENT: &str = "Network.requestWillBeSent";

/// Events maintaining the implicit dialog slot.
const DIALOG_OPENING_EVENT: &str = "Page.javascriptDialogOpening";
const DIALOG_CLOSED_EVENT: &str = "Page.javascriptDialogClosed";

type Handler = Arc<dyn Fn(Event) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct Subscription {
    event_name: String,
    handler: Handler,
    temporary: bool,
}

#[derive(Default)]
struct RouterState {
    subscriptions: BTreeMap<u64, Subscription>,
    next_id: u64,
    network_logs: VecDeque<Event>,
    current_dialog: Option<Event>,
}

/// Delivers protocol events to registered handlers and maintains the
/// implicit state the tab facade depends on: the bounded network request
/// log and the single-slot current dialog.
///
/// Handlers for a given event run sequentially in registration order on
/// the dispatching task. Subscriptions registered while a dispatch is in
/// flight are not invoked for that dispatch; removals from inside a
/// handler affect future events only. The internal lock is released
/// before any handler is awaited.
#[derive(Default)]
pub struct EventRouter {
    state: Mutex<RouterState>,
}

impl EventRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `event_name`. A temporary subscription is
    /// removed after its first invocation. Returns the subscription id.
    pub fn register_callback<F, Fut>(&self, event_name: &str, handler: F, temporary: bool) -> u64
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |event| Box::pin(handler(event)));
        let mut state = self.state.lock().expect("event router lock poisoned");
        state.next_id += 1;
        let id = state.next_id;
        state.subscriptions.insert(
            id,
            Subscription {
                event_name: event_name.to_owned(),
                handler,
                temporary,
            },
        );
        debug!(event = event_name, id, temporary, "registered callback");
        id
    }

    /// Remove a subscription by id. Returns whether it existed. A removal
    /// performed while the subscription's handler is running does not
    /// cancel that invocation.
    pub fn remove_callback(&self, id: u64) -> bool {
        let mut state = self.state.lock().expect("event router lock poisoned");
        state.subscriptions.remove(&id).is_some()
    }

    /// Remove every subscription.
    pub fn clear_callbacks(&self) {
        let mut state = self.state.lock().expect("event router lock poisoned");
        state.subscriptions.clear();
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        let state = self.state.lock().expect("event router lock poisoned");
        state.subscriptions.len()
    }

    /// Process one event: update implicit state, then invoke the matching
    /// handlers in registration order. A panicking handler is logged and
    /// does not prevent later handlers from running. Temporary
    /// subscriptions that fired are removed afterwards, each exactly once.
    pub async fn process_event(&self, event: Event) {
        let matching = {
            let mut state = self.state.lock().expect("event router lock poisoned");
            match event.method.as_str() {
                NETWORK_REQUEST_EVENT => {
                    state.network_logs.push_back(event.clone());
                    while state.network_logs.len() > NETWORK_LOG_LIMIT {
                        state.network_logs.pop_front();
                    }
                }
                DIALOG_OPENING_EVENT => state.current_dialog = Some(event.clone()),
                DIALOG_CLOSED_EVENT => state.current_dialog = None,
                _ => {}
            }

            state
                .subscriptions
                .iter()
                .filter(|(_, sub)| sub.event_name == event.method)
                .map(|(&id, sub)| (id, Arc::clone(&sub.handler), sub.temporary))
                .collect::<Vec<_>>()
        };

        let mut fired_temporaries = Vec::new();
        for (id, handler, temporary) in matching {
            let outcome = AssertUnwindSafe(handler(event.clone())).catch_unwind().await;
            if outcome.is_err() {
                warn!(event = %event.method, id, "event handler panicked");
            }
            if temporary {
                fired_temporaries.push(id);
            }
        }

        if !fired_temporaries.is_empty() {
            let mut state = self.state.lock().expect("event router lock poisoned");
            for id in fired_temporaries {
                state.subscriptions.remove(&id);
            }
        }
    }

    /// Snapshot of the retained network request events, newest last.
    #[must_use]
    pub fn network_logs(&self) -> Vec<Event> {
        let state = self.state.lock().expect("event router lock poisoned");
        state.network_logs.iter().cloned().collect()
    }

    /// The currently open JavaScript dialog event, if any.
    #[must_use]
    pub fn current_dialog(&self) -> Option<Event> {
        let state = self.state.lock().expect("event router lock poisoned");
        state.current_dialog.clone()
    }
}
