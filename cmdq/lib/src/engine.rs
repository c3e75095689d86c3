//! The command queue engine.
//!
//! A [`QueueEngine`] owns a FIFO list of [`CommandEntry`] values and drains
//! it through a [`ProcessRunner`] in one of two disciplines:
//!
//! - [`QueueMode::Sequential`]: one command at a time, strictly in order.
//!   Command N+1 is not dispatched until command N has completed.
//! - [`QueueMode::Concurrent`]: every pending command is dispatched at once
//!   and completions are collected in whatever order they land.
//!
//! ## Event Flow
//!
//! 1. `queue-begin` is emitted when [`process`](QueueEngine::process) is called
//! 2. `command-start` is emitted before each dispatch, in FIFO order
//! 3. `command-done` is emitted after each completion, right after the
//!    entry's result handler ran
//! 4. `all-dispatched` is emitted once the dispatch loop has emptied the
//!    queue (concurrent mode only)
//! 5. `queue-complete` is emitted exactly once, when nothing is left in flight
//!
//! Concurrent mode does not cap the number of simultaneous subprocesses.
//! Large batches spawn as many processes as there are entries.
//!
//! ## Examples
//!
//! ```no_run
//! use cmdq_lib::{EventKind, QueueEngine, QueueMode};
//!
//! # async fn example() -> Result<(), cmdq_lib::ConfigError> {
//! let mut engine = QueueEngine::new("build", QueueMode::Sequential)?;
//! engine.on(EventKind::QueueComplete, |event| {
//!     println!("{} finished", event.queue());
//! });
//!
//! engine.enqueue_with("cargo build", ".", |output| {
//!     if let Some(error) = &output.error {
//!         eprintln!("build failed: {error}");
//!     }
//! });
//! engine.enqueue("cargo test", ".");
//!
//! let summary = engine.process().await;
//! println!("{} commands, {} failed", summary.dispatched, summary.failed);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, RunError};
use crate::events::{EventBus, EventKind, QueueEvent};
use crate::runner::{CommandOutput, ProcessRunner, RunFuture, ShellRunner};

/// Per-command callback receiving the command's output.
pub type ResultHandler = Box<dyn FnOnce(&CommandOutput) + Send + 'static>;

/// How an engine drains its queue. Fixed at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    /// Run commands one at a time in FIFO order.
    #[default]
    Sequential,
    /// Dispatch all commands at once and wait for every completion.
    Concurrent,
}

impl QueueMode {
    /// Returns the lowercase mode name.
    pub fn as_str(self) -> &'static str {
        match self {
            QueueMode::Sequential => "sequential",
            QueueMode::Concurrent => "concurrent",
        }
    }
}

impl fmt::Display for QueueMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" | "seq" | "sync" | "synchronous" => Ok(QueueMode::Sequential),
            "concurrent" | "parallel" | "async" | "asynchronous" => Ok(QueueMode::Concurrent),
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

/// One unit of work: a command, where to run it, and who to tell.
pub struct CommandEntry {
    command: String,
    working_dir: PathBuf,
    handler: Option<ResultHandler>,
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("command", &self.command)
            .field("working_dir", &self.working_dir)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

impl CommandEntry {
    /// Creates an entry with no result handler.
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.into(),
            handler: None,
        }
    }

    /// Attaches a handler invoked with the command's output once it finishes.
    #[must_use]
    pub fn on_result<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(&CommandOutput) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// The command text.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The directory the command runs in.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

/// Cloneable sender for adding entries to an engine from elsewhere.
///
/// Entries sent through a handle are appended to the engine's pending list,
/// in send order, before the next dequeue. A sequential drain picks them up
/// within the running cycle; a concurrent drain snapshots its batch when it
/// starts, so later arrivals wait for the next [`process`](QueueEngine::process).
#[derive(Debug, Clone)]
pub struct QueueHandle {
    sender: mpsc::UnboundedSender<CommandEntry>,
    outstanding: Arc<AtomicUsize>,
}

impl QueueHandle {
    /// Queues a command with no result handler.
    pub fn enqueue(&self, command: impl Into<String>, working_dir: impl Into<PathBuf>) {
        self.push(CommandEntry::new(command, working_dir));
    }

    /// Queues a prepared entry.
    pub fn push(&self, entry: CommandEntry) {
        // Only fails once the engine has been dropped.
        if self.sender.send(entry).is_err() {
            debug!("queue handle used after its engine was dropped");
        }
    }

    /// Number of the engine's dispatched entries whose completion has not
    /// been observed yet.
    ///
    /// Inside a result handler the entry being handled still counts; it is
    /// released right after its `command-done` event.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

/// Counts for one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Commands dispatched during the cycle.
    pub dispatched: usize,
    /// Commands that failed to launch or exited unsuccessfully.
    pub failed: usize,
}

impl DrainSummary {
    /// Returns true if every dispatched command succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// A named queue of shell commands with lifecycle events.
pub struct QueueEngine<R: ProcessRunner = ShellRunner> {
    name: String,
    mode: QueueMode,
    runner: R,
    pending: VecDeque<CommandEntry>,
    outstanding: Arc<AtomicUsize>,
    events: EventBus,
    inbox_tx: mpsc::UnboundedSender<CommandEntry>,
    inbox_rx: mpsc::UnboundedReceiver<CommandEntry>,
}

impl<R: ProcessRunner> fmt::Debug for QueueEngine<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueEngine")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("pending", &self.pending.len())
            .field("outstanding", &self.outstanding())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl QueueEngine<ShellRunner> {
    /// Creates an engine that runs commands through `/bin/sh`.
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError::EmptyName`] if `name` is empty or whitespace.
    ///
    /// ## Examples
    ///
    /// ```
    /// use cmdq_lib::{QueueEngine, QueueMode};
    ///
    /// let engine = QueueEngine::new("fanout", QueueMode::Concurrent).unwrap();
    /// assert_eq!(engine.name(), "fanout");
    /// assert!(QueueEngine::new("  ", QueueMode::Sequential).is_err());
    /// ```
    pub fn new(name: impl Into<String>, mode: QueueMode) -> Result<Self, ConfigError> {
        Self::with_runner(name, mode, ShellRunner::new())
    }
}

impl<R: ProcessRunner> QueueEngine<R> {
    /// Creates an engine that runs commands through `runner`.
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError::EmptyName`] if `name` is empty or whitespace.
    pub fn with_runner(name: impl Into<String>, mode: QueueMode, runner: R) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }

        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Ok(Self {
            name,
            mode,
            runner,
            pending: VecDeque::new(),
            outstanding: Arc::new(AtomicUsize::new(0)),
            events: EventBus::new(),
            inbox_tx,
            inbox_rx,
        })
    }

    /// The name carried by every event this engine emits.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The drain discipline.
    pub fn mode(&self) -> QueueMode {
        self.mode
    }

    /// Number of entries waiting to be dispatched, including any sent
    /// through a [`QueueHandle`] that have not been merged yet.
    pub fn pending_len(&self) -> usize {
        self.pending.len() + self.inbox_rx.len()
    }

    /// Number of dispatched entries whose completion has not been observed.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Returns true when no command is in flight.
    pub fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }

    /// Queues a command with no result handler.
    pub fn enqueue(&mut self, command: impl Into<String>, working_dir: impl Into<PathBuf>) {
        self.push(CommandEntry::new(command, working_dir));
    }

    /// Queues a command whose output is passed to `handler` when it finishes.
    pub fn enqueue_with<F>(&mut self, command: impl Into<String>, working_dir: impl Into<PathBuf>, handler: F)
    where
        F: FnOnce(&CommandOutput) + Send + 'static,
    {
        self.push(CommandEntry::new(command, working_dir).on_result(handler));
    }

    /// Queues a prepared entry.
    pub fn push(&mut self, entry: CommandEntry) {
        self.absorb_inbox();
        self.pending.push_back(entry);
    }

    /// Returns a handle that can add entries while a drain is running.
    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            sender: self.inbox_tx.clone(),
            outstanding: Arc::clone(&self.outstanding),
        }
    }

    /// Registers a listener for one event kind.
    pub fn on<F>(&mut self, kind: EventKind, listener: F)
    where
        F: FnMut(&QueueEvent) + Send + 'static,
    {
        self.events.on(kind, listener);
    }

    /// Registers one listener for every event kind.
    pub fn on_all<F>(&mut self, listener: F)
    where
        F: FnMut(&QueueEvent) + Send + 'static,
    {
        self.events.on_all(listener);
    }

    /// Runs one drain cycle and resolves once `queue-complete` was emitted.
    ///
    /// Calling it again after it resolved starts a fresh cycle over whatever
    /// was queued since. Command failures never abort the cycle; they are
    /// counted in the returned [`DrainSummary`] and passed to handlers.
    #[tracing::instrument(skip(self), fields(queue = %self.name, mode = %self.mode))]
    pub async fn process(&mut self) -> DrainSummary {
        self.absorb_inbox();
        info!(pending = self.pending.len(), "processing command queue");
        self.emit(QueueEvent::QueueBegin {
            queue: self.name.clone(),
        });

        let summary = match self.mode {
            QueueMode::Sequential => self.drain_sequential().await,
            QueueMode::Concurrent => self.drain_concurrent().await,
        };

        info!(
            dispatched = summary.dispatched,
            failed = summary.failed,
            "command queue processed"
        );
        summary
    }

    async fn drain_sequential(&mut self) -> DrainSummary {
        let mut summary = DrainSummary::default();

        loop {
            self.absorb_inbox();
            let Some(entry) = self.pending.pop_front() else {
                break;
            };

            self.outstanding.store(1, Ordering::SeqCst);
            let run = self.dispatch(&entry);
            summary.dispatched += 1;
            // A panicking runner stays on its own task instead of unwinding
            // through the drain.
            let output = match tokio::spawn(run).await {
                Ok(output) => output,
                Err(join_error) => join_failure(&entry.command, &join_error),
            };
            self.complete(entry, output, &mut summary);
        }

        self.emit(QueueEvent::QueueComplete {
            queue: self.name.clone(),
        });
        summary
    }

    async fn drain_concurrent(&mut self) -> DrainSummary {
        let mut summary = DrainSummary::default();
        let batch: Vec<CommandEntry> = self.pending.drain(..).collect();
        self.outstanding.store(batch.len(), Ordering::SeqCst);

        let mut in_flight = JoinSet::new();
        let mut dispatched = HashMap::with_capacity(batch.len());
        for entry in batch {
            let run = self.dispatch(&entry);
            let id = in_flight.spawn(run).id();
            dispatched.insert(id, entry);
            summary.dispatched += 1;
        }

        self.emit(QueueEvent::AllDispatched {
            queue: self.name.clone(),
        });
        debug!(in_flight = self.outstanding(), "waiting for commands to complete");

        if self.is_idle() {
            self.emit(QueueEvent::QueueComplete {
                queue: self.name.clone(),
            });
            return summary;
        }

        while let Some(joined) = in_flight.join_next_with_id().await {
            let (id, output) = match joined {
                Ok((id, output)) => (id, output),
                Err(join_error) => {
                    let id = join_error.id();
                    let command = dispatched.get(&id).map_or("", |entry| entry.command.as_str());
                    (id, join_failure(command, &join_error))
                }
            };

            let Some(entry) = dispatched.remove(&id) else {
                warn!(?id, "completion for an unknown command task");
                continue;
            };

            self.complete(entry, output, &mut summary);
            if self.is_idle() {
                self.emit(QueueEvent::QueueComplete {
                    queue: self.name.clone(),
                });
            }
        }

        summary
    }

    /// Emits `command-start` and hands the entry to the runner.
    fn dispatch(&mut self, entry: &CommandEntry) -> RunFuture {
        debug!(command = %entry.command, dir = %entry.working_dir.display(), "dispatching command");
        self.emit(QueueEvent::CommandStart {
            queue: self.name.clone(),
            command: entry.command.clone(),
            working_dir: entry.working_dir.clone(),
        });
        self.runner.run(&entry.command, &entry.working_dir)
    }

    /// Runs the entry's handler, emits `command-done` and releases its slot.
    fn complete(&mut self, entry: CommandEntry, output: CommandOutput, summary: &mut DrainSummary) {
        let CommandEntry {
            command,
            working_dir,
            handler,
        } = entry;

        match &output.error {
            Some(error) => {
                warn!(command = %command, error = %error, "command failed");
                summary.failed += 1;
            }
            None => debug!(command = %command, "command completed"),
        }

        if let Some(handler) = handler {
            handler(&output);
        }

        self.emit(QueueEvent::CommandDone {
            queue: self.name.clone(),
            command,
            working_dir,
            success: output.is_success(),
        });

        let previous = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| count.checked_sub(1));
        debug_assert!(previous.is_ok(), "completion observed with nothing outstanding");
    }

    fn emit(&mut self, event: QueueEvent) {
        self.events.emit(&event);
    }

    fn absorb_inbox(&mut self) {
        while let Ok(entry) = self.inbox_rx.try_recv() {
            self.pending.push_back(entry);
        }
    }
}

/// Reports a runner task that panicked or was cancelled as a failed command.
fn join_failure(command: &str, join_error: &JoinError) -> CommandOutput {
    let error = RunError::Join {
        command: command.to_string(),
        message: join_error.to_string(),
    };
    CommandOutput::failure(error, String::new(), String::new())
}
