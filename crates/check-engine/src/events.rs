//! Check lifecycle events
//!
//! The evaluator announces every check it executes through an
//! [`EventBroadcaster`]: `PreCheck` before the body runs, then either
//! `PostCheck` with the result or `CheckError` when the body failed.
//! Cached results are reused silently.
//!
//! Listeners are held strongly or weakly. A weak listener stops receiving
//! events once its owner drops the last `Arc`, without unsubscribing.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::result::CheckResult;
use crate::types::{CheckHandle, WorkflowId, WorkflowInfo};

/// The three lifecycle channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    PreCheck,
    PostCheck,
    CheckError,
}

/// Event emitted while a workflow runs checks
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CheckEvent {
    /// The check is about to execute
    PreCheck { check: CheckHandle },

    /// The check completed normally
    PostCheck {
        check: CheckHandle,
        result: Arc<CheckResult>,
    },

    /// The check body failed; its cached result is null
    CheckError { check: CheckHandle, error: String },
}

impl CheckEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            CheckEvent::PreCheck { .. } => EventKind::PreCheck,
            CheckEvent::PostCheck { .. } => EventKind::PostCheck,
            CheckEvent::CheckError { .. } => EventKind::CheckError,
        }
    }

    /// The check the event is about
    pub fn check(&self) -> &CheckHandle {
        match self {
            CheckEvent::PreCheck { check }
            | CheckEvent::PostCheck { check, .. }
            | CheckEvent::CheckError { check, .. } => check,
        }
    }
}

/// Error raised by a listener
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ListenerError {
    pub message: String,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Receiver of check events
///
/// `sender` is the originating workflow when the channel is configured with
/// `sender_as_argument`, and `None` otherwise.
pub trait CheckListener: Send + Sync {
    fn on_event(
        &self,
        sender: Option<&WorkflowInfo>,
        event: &CheckEvent,
    ) -> Result<(), ListenerError>;
}

impl<F> CheckListener for F
where
    F: Fn(Option<&WorkflowInfo>, &CheckEvent) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_event(
        &self,
        sender: Option<&WorkflowInfo>,
        event: &CheckEvent,
    ) -> Result<(), ListenerError> {
        self(sender, event)
    }
}

/// How the broadcaster holds on to a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    Strong,
    Weak,
}

/// Handle returned by [`EventBroadcaster::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Per-channel delivery options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Pass the originating workflow to listeners
    pub sender_as_argument: bool,
    /// Unsubscribe a listener that returns an error instead of propagating it
    pub remove_failed: bool,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            sender_as_argument: true,
            remove_failed: false,
        }
    }
}

enum ListenerRef {
    Strong(Arc<dyn CheckListener>),
    Weak(Weak<dyn CheckListener>),
}

impl ListenerRef {
    fn upgrade(&self) -> Option<Arc<dyn CheckListener>> {
        match self {
            ListenerRef::Strong(listener) => Some(listener.clone()),
            ListenerRef::Weak(listener) => listener.upgrade(),
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            ListenerRef::Strong(_) => true,
            ListenerRef::Weak(listener) => listener.strong_count() > 0,
        }
    }
}

struct Slot {
    id: ListenerId,
    listener: ListenerRef,
}

#[derive(Default)]
struct Channel {
    config: BroadcastConfig,
    slots: Vec<Slot>,
}

impl Channel {
    fn prune(&mut self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|slot| slot.listener.is_alive());
        before - self.slots.len()
    }
}

/// Synchronous pub/sub channel for check events
#[derive(Default)]
pub struct EventBroadcaster {
    channels: HashMap<EventKind, Channel>,
    next_id: u64,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one event kind
    ///
    /// With [`Retention::Weak`] the broadcaster keeps only a non-owning
    /// reference; the caller's `Arc` decides how long delivery lasts.
    pub fn subscribe<L>(&mut self, kind: EventKind, listener: &Arc<L>, retention: Retention) -> ListenerId
    where
        L: CheckListener + 'static,
    {
        let listener: Arc<dyn CheckListener> = listener.clone();
        let listener = match retention {
            Retention::Strong => ListenerRef::Strong(listener),
            Retention::Weak => ListenerRef::Weak(Arc::downgrade(&listener)),
        };
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.channels
            .entry(kind)
            .or_default()
            .slots
            .push(Slot { id, listener });
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        for channel in self.channels.values_mut() {
            if let Some(pos) = channel.slots.iter().position(|slot| slot.id == id) {
                channel.slots.remove(pos);
                return true;
            }
        }
        false
    }

    /// Set delivery options for one event kind
    pub fn configure(&mut self, kind: EventKind, config: BroadcastConfig) {
        self.channels.entry(kind).or_default().config = config;
    }

    pub fn config(&self, kind: EventKind) -> BroadcastConfig {
        self.channels
            .get(&kind)
            .map(|channel| channel.config)
            .unwrap_or_default()
    }

    /// Deliver an event to the live listeners of its kind, in registration order
    ///
    /// Dead weak listeners are pruned first. A listener error stops
    /// delivery and is returned, unless the channel removes failed
    /// listeners, in which case delivery continues.
    pub fn fire(&mut self, sender: &WorkflowInfo, event: &CheckEvent) -> Result<(), ListenerError> {
        let Some(channel) = self.channels.get_mut(&event.kind()) else {
            return Ok(());
        };
        let pruned = channel.prune();
        if pruned > 0 {
            log::debug!("Pruned {} dropped {:?} listeners", pruned, event.kind());
        }

        let config = channel.config;
        let live: Vec<(ListenerId, Arc<dyn CheckListener>)> = channel
            .slots
            .iter()
            .filter_map(|slot| slot.listener.upgrade().map(|l| (slot.id, l)))
            .collect();
        let sender = config.sender_as_argument.then_some(sender);

        let mut failed = Vec::new();
        for (id, listener) in live {
            if let Err(e) = listener.on_event(sender, event) {
                if !config.remove_failed {
                    return Err(e);
                }
                log::warn!(
                    "Removing {:?} listener after error on '{}': {}",
                    event.kind(),
                    event.check(),
                    e
                );
                failed.push(id);
            }
        }
        channel.slots.retain(|slot| !failed.contains(&slot.id));
        Ok(())
    }

    /// Drop weak listeners whose owner is gone; returns how many were removed
    pub fn prune(&mut self) -> usize {
        let pruned = self.channels.values_mut().map(Channel::prune).sum();
        if pruned > 0 {
            log::debug!("Pruned {} dropped listeners", pruned);
        }
        pruned
    }

    /// Number of live listeners for one event kind
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.channels
            .get(&kind)
            .map(|channel| {
                channel
                    .slots
                    .iter()
                    .filter(|slot| slot.listener.is_alive())
                    .count()
            })
            .unwrap_or(0)
    }
}

/// A listener that collects every event it receives
///
/// Useful for testing to verify events were emitted correctly.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<(Option<WorkflowId>, CheckEvent)>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// All collected events
    pub fn events(&self) -> Vec<CheckEvent> {
        self.events.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    /// Workflow id passed with each event, in order
    pub fn senders(&self) -> Vec<Option<WorkflowId>> {
        self.events.lock().iter().map(|(s, _)| *s).collect()
    }

    /// Collected events of one kind
    pub fn of_kind(&self, kind: EventKind) -> Vec<CheckEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(_, e)| e.kind() == kind)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl CheckListener for RecordingListener {
    fn on_event(
        &self,
        sender: Option<&WorkflowInfo>,
        event: &CheckEvent,
    ) -> Result<(), ListenerError> {
        self.events
            .lock()
            .push((sender.map(|info| info.id), event.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn info() -> WorkflowInfo {
        WorkflowInfo {
            id: WorkflowId::new(),
            name: "scene-qa".to_string(),
        }
    }

    fn pre_check(info: &WorkflowInfo, process: &str) -> CheckEvent {
        CheckEvent::PreCheck {
            check: CheckHandle::new(info.id, process),
        }
    }

    #[test]
    fn test_listeners_called_in_registration_order() {
        let info = info();
        let mut broadcaster = EventBroadcaster::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = order.clone();
            let listener = Arc::new(move |_: Option<&WorkflowInfo>, _: &CheckEvent| -> Result<(), ListenerError> {
                order.lock().push(n);
                Ok(())
            });
            broadcaster.subscribe(EventKind::PreCheck, &listener, Retention::Strong);
        }

        broadcaster.fire(&info, &pre_check(&info, "a")).unwrap();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_weak_listener_dropped_with_owner() {
        let info = info();
        let mut broadcaster = EventBroadcaster::new();
        let recorder = Arc::new(RecordingListener::new());
        broadcaster.subscribe(EventKind::PreCheck, &recorder, Retention::Weak);
        assert_eq!(broadcaster.listener_count(EventKind::PreCheck), 1);

        broadcaster.fire(&info, &pre_check(&info, "a")).unwrap();
        assert_eq!(recorder.events().len(), 1);

        drop(recorder);
        assert_eq!(broadcaster.listener_count(EventKind::PreCheck), 0);
        assert_eq!(broadcaster.prune(), 1);
        broadcaster.fire(&info, &pre_check(&info, "b")).unwrap();
    }

    #[test]
    fn test_strong_listener_outlives_caller_reference() {
        let info = info();
        let mut broadcaster = EventBroadcaster::new();
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = calls.clone();
            let listener = Arc::new(move |_: Option<&WorkflowInfo>, _: &CheckEvent| -> Result<(), ListenerError> {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            broadcaster.subscribe(EventKind::PreCheck, &listener, Retention::Strong);
        }
        broadcaster.fire(&info, &pre_check(&info, "a")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sender_argument_is_configurable() {
        let info = info();
        let mut broadcaster = EventBroadcaster::new();
        let recorder = Arc::new(RecordingListener::new());
        broadcaster.subscribe(EventKind::PreCheck, &recorder, Retention::Strong);

        broadcaster.fire(&info, &pre_check(&info, "a")).unwrap();
        broadcaster.configure(
            EventKind::PreCheck,
            BroadcastConfig {
                sender_as_argument: false,
                remove_failed: false,
            },
        );
        broadcaster.fire(&info, &pre_check(&info, "b")).unwrap();

        assert_eq!(recorder.senders(), vec![Some(info.id), None]);
    }

    #[test]
    fn test_listener_error_propagates() {
        let info = info();
        let mut broadcaster = EventBroadcaster::new();
        let failing = Arc::new(
            |_: Option<&WorkflowInfo>, _: &CheckEvent| -> Result<(), ListenerError> {
                Err(ListenerError::new("panel closed"))
            },
        );
        let recorder = Arc::new(RecordingListener::new());
        broadcaster.subscribe(EventKind::PreCheck, &failing, Retention::Strong);
        broadcaster.subscribe(EventKind::PreCheck, &recorder, Retention::Strong);

        let err = broadcaster.fire(&info, &pre_check(&info, "a")).unwrap_err();
        assert_eq!(err.message, "panel closed");
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_remove_failed_unsubscribes_listener() {
        let info = info();
        let mut broadcaster = EventBroadcaster::new();
        broadcaster.configure(
            EventKind::PreCheck,
            BroadcastConfig {
                sender_as_argument: true,
                remove_failed: true,
            },
        );
        let failing = Arc::new(
            |_: Option<&WorkflowInfo>, _: &CheckEvent| -> Result<(), ListenerError> {
                Err(ListenerError::new("boom"))
            },
        );
        let recorder = Arc::new(RecordingListener::new());
        broadcaster.subscribe(EventKind::PreCheck, &failing, Retention::Strong);
        broadcaster.subscribe(EventKind::PreCheck, &recorder, Retention::Strong);

        broadcaster.fire(&info, &pre_check(&info, "a")).unwrap();
        assert_eq!(broadcaster.listener_count(EventKind::PreCheck), 1);
        assert_eq!(recorder.events().len(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let info = info();
        let mut broadcaster = EventBroadcaster::new();
        let recorder = Arc::new(RecordingListener::new());
        let id = broadcaster.subscribe(EventKind::PostCheck, &recorder, Retention::Strong);

        assert!(broadcaster.unsubscribe(id));
        assert!(!broadcaster.unsubscribe(id));
        let event = CheckEvent::PostCheck {
            check: CheckHandle::new(info.id, "a"),
            result: Arc::new(CheckResult::success()),
        };
        broadcaster.fire(&info, &event).unwrap();
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_event_serialization() {
        let info = info();
        let json = serde_json::to_value(pre_check(&info, "names")).unwrap();
        assert_eq!(json["type"], "preCheck");
        assert_eq!(json["check"]["process"], "names");
    }
}
