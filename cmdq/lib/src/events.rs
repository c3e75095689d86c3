//! Lifecycle events and the per-engine observer registry.
//!
//! Every [`QueueEngine`](crate::QueueEngine) owns one [`EventBus`]. Listeners
//! register for an [`EventKind`] and are invoked synchronously, in
//! subscription order, from inside the call that emits the event.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ConfigError;

/// The five lifecycle events an engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// `process()` was invoked.
    QueueBegin,
    /// A command is about to be handed to the runner.
    CommandStart,
    /// A command's runner completion has been observed.
    CommandDone,
    /// Concurrent mode only: every pending entry has been dispatched.
    AllDispatched,
    /// No work is left in flight for this cycle.
    QueueComplete,
}

impl EventKind {
    /// All event kinds in lifecycle order.
    pub const ALL: [EventKind; 5] = [
        EventKind::QueueBegin,
        EventKind::CommandStart,
        EventKind::CommandDone,
        EventKind::AllDispatched,
        EventKind::QueueComplete,
    ];

    /// Returns the kebab-case event name.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::QueueBegin => "queue-begin",
            EventKind::CommandStart => "command-start",
            EventKind::CommandDone => "command-done",
            EventKind::AllDispatched => "all-dispatched",
            EventKind::QueueComplete => "queue-complete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownEvent(s.to_string()))
    }
}

/// An emitted event with its payload.
///
/// Every variant carries the name of the engine that emitted it so that
/// listeners shared between engines can tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum QueueEvent {
    /// `process()` was invoked.
    QueueBegin {
        /// Engine name.
        queue: String,
    },
    /// A command is about to be dispatched.
    CommandStart {
        /// Engine name.
        queue: String,
        /// The command text.
        command: String,
        /// Directory the command runs in.
        working_dir: PathBuf,
    },
    /// A command finished (successfully or not).
    CommandDone {
        /// Engine name.
        queue: String,
        /// The command text.
        command: String,
        /// Directory the command ran in.
        working_dir: PathBuf,
        /// Whether the command launched and exited with status zero.
        success: bool,
    },
    /// Every entry of the cycle has been dispatched.
    AllDispatched {
        /// Engine name.
        queue: String,
    },
    /// The cycle is finished.
    QueueComplete {
        /// Engine name.
        queue: String,
    },
}

impl QueueEvent {
    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            QueueEvent::QueueBegin { .. } => EventKind::QueueBegin,
            QueueEvent::CommandStart { .. } => EventKind::CommandStart,
            QueueEvent::CommandDone { .. } => EventKind::CommandDone,
            QueueEvent::AllDispatched { .. } => EventKind::AllDispatched,
            QueueEvent::QueueComplete { .. } => EventKind::QueueComplete,
        }
    }

    /// Returns the name of the engine that emitted this event.
    pub fn queue(&self) -> &str {
        match self {
            QueueEvent::QueueBegin { queue }
            | QueueEvent::CommandStart { queue, .. }
            | QueueEvent::CommandDone { queue, .. }
            | QueueEvent::AllDispatched { queue }
            | QueueEvent::QueueComplete { queue } => queue,
        }
    }

    /// Returns the command text for per-command events.
    pub fn command(&self) -> Option<&str> {
        match self {
            QueueEvent::CommandStart { command, .. } | QueueEvent::CommandDone { command, .. } => {
                Some(command)
            }
            _ => None,
        }
    }
}

/// A boxed event listener.
pub type Listener = Box<dyn FnMut(&QueueEvent) + Send + 'static>;

/// Publish/subscribe registry keyed by [`EventKind`].
///
/// Listeners registered with [`on_all`](EventBus::on_all) run after the
/// kind-specific listeners of each event.
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<EventKind, Vec<Listener>>,
    catch_all: Vec<Listener>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in EventKind::ALL {
            map.entry(&kind.as_str(), &self.listener_count(kind));
        }
        map.finish()
    }
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for events of `kind`.
    pub fn on<F>(&mut self, kind: EventKind, listener: F)
    where
        F: FnMut(&QueueEvent) + Send + 'static,
    {
        self.listeners.entry(kind).or_default().push(Box::new(listener));
    }

    /// Registers one listener for every event kind.
    ///
    /// The listener is stored once and invoked once per emitted event,
    /// whatever its kind, so state it captures is shared across kinds.
    pub fn on_all<F>(&mut self, listener: F)
    where
        F: FnMut(&QueueEvent) + Send + 'static,
    {
        self.catch_all.push(Box::new(listener));
    }

    /// Invokes every listener registered for the event's kind, in order,
    /// then every catch-all listener.
    pub fn emit(&mut self, event: &QueueEvent) {
        if let Some(listeners) = self.listeners.get_mut(&event.kind()) {
            for listener in listeners.iter_mut() {
                listener(event);
            }
        }
        for listener in self.catch_all.iter_mut() {
            listener(event);
        }
    }

    /// Returns how many listeners will see an event of `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len) + self.catch_all.len()
    }
}

/// Builds a listener that forwards a clone of every event into `sender`.
///
/// Send failures (receiver dropped) are ignored.
///
/// ## Examples
///
/// ```
/// use cmdq_lib::{forward_to, EventBus, QueueEvent};
/// use tokio::sync::mpsc;
///
/// let (tx, mut rx) = mpsc::unbounded_channel();
/// let mut bus = EventBus::new();
/// bus.on_all(forward_to(tx));
///
/// bus.emit(&QueueEvent::QueueBegin { queue: "build".to_string() });
/// assert_eq!(rx.try_recv().unwrap().queue(), "build");
/// ```
pub fn forward_to(
    sender: mpsc::UnboundedSender<QueueEvent>,
) -> impl FnMut(&QueueEvent) + Clone + Send + 'static {
    move |event: &QueueEvent| {
        let _ = sender.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn begin(name: &str) -> QueueEvent {
        QueueEvent::QueueBegin {
            queue: name.to_string(),
        }
    }

    #[test]
    fn event_kind_names_round_trip_through_from_str() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert_eq!(
            "queue-finished".parse::<EventKind>(),
            Err(ConfigError::UnknownEvent("queue-finished".to_string()))
        );
    }

    #[test]
    fn event_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&EventKind::AllDispatched).unwrap();
        assert_eq!(json, r#""all-dispatched""#);
    }

    #[test]
    fn queue_event_serializes_with_event_tag() {
        let event = QueueEvent::CommandStart {
            queue: "build".to_string(),
            command: "echo 1".to_string(),
            working_dir: PathBuf::from("/tmp"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"event":"command-start","queue":"build","command":"echo 1","working_dir":"/tmp"}"#
        );
    }

    #[test]
    fn listeners_run_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        for label in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            bus.on(EventKind::QueueBegin, move |_| log.lock().unwrap().push(label));
        }

        bus.emit(&begin("q"));
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn listeners_only_see_their_kind() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();
        let c = Arc::clone(&count);
        bus.on(EventKind::QueueComplete, move |_| *c.lock().unwrap() += 1);

        bus.emit(&begin("q"));
        assert_eq!(*count.lock().unwrap(), 0);

        bus.emit(&QueueEvent::QueueComplete {
            queue: "q".to_string(),
        });
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn on_all_registers_for_every_kind() {
        let mut bus = EventBus::new();
        bus.on_all(|_| {});
        for kind in EventKind::ALL {
            assert_eq!(bus.listener_count(kind), 1);
        }
    }

    #[test]
    fn on_all_listener_keeps_its_state_across_kinds() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut count = 0;
        let mut bus = EventBus::new();
        bus.on_all(move |_| {
            count += 1;
            sink.lock().unwrap().push(count);
        });

        bus.emit(&begin("q"));
        bus.emit(&QueueEvent::CommandStart {
            queue: "q".to_string(),
            command: "true".to_string(),
            working_dir: PathBuf::from("."),
        });
        bus.emit(&QueueEvent::QueueComplete {
            queue: "q".to_string(),
        });

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn on_all_runs_after_kind_listeners() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        let all = Arc::clone(&log);
        bus.on_all(move |_| all.lock().unwrap().push("all"));
        let begin_only = Arc::clone(&log);
        bus.on(EventKind::QueueBegin, move |_| begin_only.lock().unwrap().push("begin"));

        bus.emit(&begin("q"));
        assert_eq!(*log.lock().unwrap(), vec!["begin", "all"]);
    }

    #[test]
    fn emit_without_listeners_is_a_no_op() {
        let mut bus = EventBus::new();
        bus.emit(&begin("q"));
        assert_eq!(bus.listener_count(EventKind::QueueBegin), 0);
    }

    #[test]
    fn forward_to_ignores_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut bus = EventBus::new();
        bus.on(EventKind::QueueBegin, forward_to(tx));
        bus.emit(&begin("q"));
    }

    #[test]
    fn event_accessors() {
        let event = QueueEvent::CommandDone {
            queue: "fanout".to_string(),
            command: "true".to_string(),
            working_dir: PathBuf::from("."),
            success: true,
        };
        assert_eq!(event.kind(), EventKind::CommandDone);
        assert_eq!(event.queue(), "fanout");
        assert_eq!(event.command(), Some("true"));
        assert_eq!(begin("x").command(), None);
    }
}
