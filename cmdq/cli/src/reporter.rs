//! Console and JSON-lines reporting of queue events.

use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use cmdq_lib::{CommandOutput, EventKind, ProcessRunner, QueueEngine, QueueEvent, QueueMode, Role, Theme};
use serde_json::json;

/// Output style selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Colored, human-readable lines.
    Console,
    /// One JSON object per event.
    Json,
}

/// Prints engine events and command output.
#[derive(Debug, Clone)]
pub struct Reporter {
    theme: Arc<Theme>,
    format: ReportFormat,
    quiet: bool,
}

impl Reporter {
    pub fn new(theme: Theme, format: ReportFormat, quiet: bool) -> Self {
        Self {
            theme: Arc::new(theme),
            format,
            quiet,
        }
    }

    /// Subscribes to every event the engine emits.
    pub fn attach<R: ProcessRunner>(&self, engine: &mut QueueEngine<R>) {
        let mode = engine.mode();
        for kind in EventKind::ALL {
            let reporter = self.clone();
            engine.on(kind, move |event| {
                if let Some(line) = reporter.render_event(event, mode) {
                    println!("{line}");
                }
            });
        }
    }

    /// Builds the per-command handler that prints captured output.
    pub fn result_handler(&self, command: &str) -> impl FnOnce(&CommandOutput) + Send + 'static {
        let reporter = self.clone();
        let command = command.to_string();
        move |output: &CommandOutput| {
            if let Some(text) = reporter.render_output(&command, output) {
                println!("{text}");
            }
        }
    }

    /// Renders one event, or `None` when the format has nothing to show.
    pub fn render_event(&self, event: &QueueEvent, mode: QueueMode) -> Option<String> {
        match self.format {
            ReportFormat::Json => serde_json::to_string(event).ok(),
            ReportFormat::Console => self.render_console_event(event, mode),
        }
    }

    fn render_console_event(&self, event: &QueueEvent, mode: QueueMode) -> Option<String> {
        let theme = &self.theme;
        match event {
            QueueEvent::QueueBegin { queue } => Some(format!(
                "{} : {}",
                theme.paint(Role::Help, queue),
                theme.paint(Role::Info, &format!("Processing {mode} command queue")),
            )),
            QueueEvent::CommandStart {
                command,
                working_dir,
                ..
            } => Some(render_start(theme, command, working_dir)),
            QueueEvent::CommandDone { .. } => None,
            QueueEvent::AllDispatched { queue } => Some(format!(
                "\n{} : {}",
                theme.paint(Role::Help, queue),
                theme.paint(
                    Role::Help,
                    "These tasks are running in parallel, this might take a minute..."
                ),
            )),
            QueueEvent::QueueComplete { queue } => Some(format!(
                "[{}] {} : {}",
                Local::now().format("%H:%M:%S"),
                theme.paint(Role::Help, queue),
                theme.paint(Role::Info, "command queue processed"),
            )),
        }
    }

    /// Renders a command's captured output, or `None` when there is nothing
    /// to show.
    pub fn render_output(&self, command: &str, output: &CommandOutput) -> Option<String> {
        match self.format {
            ReportFormat::Json => {
                let report = json!({
                    "event": "command-output",
                    "command": command,
                    "stdout": output.stdout,
                    "stderr": output.stderr,
                    "error": output.error.as_ref().map(ToString::to_string),
                });
                Some(report.to_string())
            }
            ReportFormat::Console => {
                let mut parts = Vec::new();
                if let Some(error) = &output.error {
                    parts.push(self.theme.paint(Role::Warn, &error.to_string()));
                }
                if !self.quiet {
                    if !output.stdout.is_empty() {
                        parts.push(self.theme.paint(Role::Data, output.stdout.trim_end()));
                    }
                    if !output.stderr.is_empty() {
                        parts.push(self.theme.paint(Role::Warn, output.stderr.trim_end()));
                    }
                }

                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("\n"))
                }
            }
        }
    }
}

fn render_start(theme: &Theme, command: &str, working_dir: &Path) -> String {
    format!(
        "\n{} : {}\n{} : {}\n",
        theme.paint(Role::Info, "Executing"),
        theme.paint(Role::Data, command),
        theme.paint(Role::Info, "From Dir"),
        theme.paint(Role::Data, &working_dir.display().to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdq_lib::RunError;
    use std::path::PathBuf;

    fn console(quiet: bool) -> Reporter {
        Reporter::new(Theme::plain(), ReportFormat::Console, quiet)
    }

    #[test]
    fn console_start_shows_command_and_directory() {
        let event = QueueEvent::CommandStart {
            queue: "build".to_string(),
            command: "make".to_string(),
            working_dir: PathBuf::from("/src"),
        };
        let line = console(false).render_event(&event, QueueMode::Sequential).unwrap();
        assert!(line.contains("Executing : make"));
        assert!(line.contains("From Dir : /src"));
    }

    #[test]
    fn console_begin_names_the_mode() {
        let event = QueueEvent::QueueBegin {
            queue: "fanout".to_string(),
        };
        let line = console(false).render_event(&event, QueueMode::Concurrent).unwrap();
        assert_eq!(line, "fanout : Processing concurrent command queue");
    }

    #[test]
    fn console_all_dispatched_mentions_parallel_work() {
        let event = QueueEvent::AllDispatched {
            queue: "fanout".to_string(),
        };
        let line = console(false).render_event(&event, QueueMode::Concurrent).unwrap();
        assert!(line.contains("running in parallel"));
    }

    #[test]
    fn console_skips_command_done() {
        let event = QueueEvent::CommandDone {
            queue: "q".to_string(),
            command: "true".to_string(),
            working_dir: PathBuf::from("."),
            success: true,
        };
        assert!(console(false).render_event(&event, QueueMode::Sequential).is_none());
    }

    #[test]
    fn json_events_are_tagged() {
        let reporter = Reporter::new(Theme::plain(), ReportFormat::Json, false);
        let event = QueueEvent::QueueComplete {
            queue: "q".to_string(),
        };
        let line = reporter.render_event(&event, QueueMode::Sequential).unwrap();
        assert_eq!(line, r#"{"event":"queue-complete","queue":"q"}"#);
    }

    #[test]
    fn console_output_includes_error_and_streams() {
        let output = CommandOutput::failure(
            RunError::NonZeroExit {
                command: "make".to_string(),
                code: Some(2),
                signal: None,
            },
            "partial\n",
            "boom\n",
        );
        let text = console(false).render_output("make", &output).unwrap();
        assert_eq!(text, "`make` failed (exit code 2)\npartial\nboom");
    }

    #[test]
    fn quiet_console_output_keeps_only_errors() {
        let ok = CommandOutput::success("noise\n", "");
        assert!(console(true).render_output("echo", &ok).is_none());

        let failed = CommandOutput::failure(
            RunError::NonZeroExit {
                command: "false".to_string(),
                code: Some(1),
                signal: None,
            },
            "noise\n",
            "",
        );
        let text = console(true).render_output("false", &failed).unwrap();
        assert!(!text.contains("noise"));
    }

    #[test]
    fn json_output_carries_streams() {
        let reporter = Reporter::new(Theme::plain(), ReportFormat::Json, false);
        let text = reporter
            .render_output("echo hi", &CommandOutput::success("hi\n", ""))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["event"], "command-output");
        assert_eq!(value["stdout"], "hi\n");
        assert!(value["error"].is_null());
    }
}
