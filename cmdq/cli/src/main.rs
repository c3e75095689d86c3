mod commands;
mod reporter;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use cmdq_lib::{ConfigError, DrainSummary, QueueEngine, QueueMode, Theme, ThemeError};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::collect_commands;
use crate::reporter::{ReportFormat, Reporter};

/// Run shell commands one after another or all at once.
///
/// Examples:
///   cmdq "cargo build" "cargo test"                # one at a time, in order
///   cmdq --mode concurrent -f lint-steps.txt       # all at once
///   cmdq --name docs -C ./docs "make html"         # run from another directory
#[derive(Debug, Parser)]
#[command(name = "cmdq")]
#[command(version)]
#[command(about = "Run shell commands one after another or all at once")]
struct Cli {
    /// Name reported with every queue event.
    #[arg(long, default_value = "cmdq")]
    name: String,

    /// Drain discipline: sequential or concurrent.
    #[arg(short, long, default_value_t = QueueMode::Sequential, value_name = "MODE")]
    mode: QueueMode,

    /// Working directory for every command (defaults to the current directory).
    #[arg(short = 'C', long = "dir", value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Read additional commands from a file, one per line.
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Color theme file (JSON object of role to color).
    #[arg(long, value_name = "FILE")]
    theme: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,

    /// Print events and command output as JSON lines.
    #[arg(long)]
    json: bool,

    /// Hide captured command output; failures are still reported.
    #[arg(short, long, conflicts_with = "json")]
    quiet: bool,

    /// Enable DEBUG-level logging on stderr.
    #[arg(long)]
    debug: bool,

    /// Shell commands to run.
    #[arg(value_name = "COMMAND")]
    commands: Vec<String>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("invalid queue configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Theme(#[from] ThemeError),

    #[error("failed to read command file {}: {source}", path.display())]
    CommandFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to determine working directory: {0}")]
    WorkingDir(std::io::Error),

    #[error("no commands given (pass them as arguments or with --file)")]
    NoCommands,

    #[error("failed to start async runtime: {0}")]
    Runtime(std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli) {
        Ok(summary) if summary.all_succeeded() => ExitCode::SUCCESS,
        Ok(summary) => {
            debug!(failed = summary.failed, "some commands failed");
            ExitCode::from(1)
        }
        Err(err) => {
            eprintln!("cmdq: {err}");
            ExitCode::from(2)
        }
    }
}

/// Logs go to stderr so they never mix with command output. `RUST_LOG`
/// overrides the default level unless `--debug` is given.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_theme(cli: &Cli) -> Result<Theme, CliError> {
    let theme = match &cli.theme {
        Some(path) => Theme::load(path)?,
        None => Theme::load_default()?,
    };
    Ok(theme.with_color(!cli.no_color))
}

fn build_engine(cli: &Cli, reporter: &Reporter) -> Result<QueueEngine, CliError> {
    let commands = collect_commands(&cli.commands, cli.file.as_ref())?;
    let working_dir = match &cli.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(CliError::WorkingDir)?,
    };

    let mut engine = QueueEngine::new(cli.name.clone(), cli.mode)?;
    reporter.attach(&mut engine);

    for command in commands {
        let handler = reporter.result_handler(&command);
        engine.enqueue_with(command, working_dir.clone(), handler);
    }
    Ok(engine)
}

#[tracing::instrument(skip(cli), fields(queue = %cli.name, mode = %cli.mode))]
fn run(cli: Cli) -> Result<DrainSummary, CliError> {
    let theme = load_theme(&cli)?;
    let format = if cli.json {
        ReportFormat::Json
    } else {
        ReportFormat::Console
    };
    let reporter = Reporter::new(theme, format, cli.quiet);
    let mut engine = build_engine(&cli, &reporter)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    Ok(runtime.block_on(engine.process()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_defaults_to_sequential() {
        let cli = Cli::try_parse_from(["cmdq", "echo hi"]).unwrap();
        assert_eq!(cli.mode, QueueMode::Sequential);
        assert_eq!(cli.name, "cmdq");
        assert_eq!(cli.commands, vec!["echo hi"]);
        assert!(!cli.json);
    }

    #[test]
    fn clap_accepts_mode_aliases() {
        let cli = Cli::try_parse_from(["cmdq", "--mode", "parallel", "a", "b"]).unwrap();
        assert_eq!(cli.mode, QueueMode::Concurrent);
        assert_eq!(cli.commands, vec!["a", "b"]);
    }

    #[test]
    fn clap_rejects_unknown_mode() {
        let result = Cli::try_parse_from(["cmdq", "--mode", "eventually", "echo hi"]);
        assert!(result.is_err());
    }

    #[test]
    fn clap_rejects_json_with_quiet() {
        let result = Cli::try_parse_from(["cmdq", "--json", "--quiet", "echo hi"]);
        assert!(result.is_err());
    }

    #[test]
    fn clap_accepts_short_flags() {
        let cli = Cli::try_parse_from(["cmdq", "-m", "concurrent", "-C", "/tmp", "-f", "steps.txt", "-q"]).unwrap();
        assert_eq!(cli.mode, QueueMode::Concurrent);
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp")));
        assert_eq!(cli.file, Some(PathBuf::from("steps.txt")));
        assert!(cli.quiet);
    }

    #[test]
    fn build_engine_rejects_blank_name() {
        let cli = Cli::try_parse_from(["cmdq", "--name", " ", "echo hi"]).unwrap();
        let reporter = Reporter::new(Theme::plain(), ReportFormat::Console, false);
        let result = build_engine(&cli, &reporter);
        assert!(matches!(result, Err(CliError::Config(ConfigError::EmptyName))));
    }

    #[test]
    fn build_engine_queues_every_command() {
        let cli = Cli::try_parse_from(["cmdq", "-C", "/tmp", "echo 1", "echo 2"]).unwrap();
        let reporter = Reporter::new(Theme::plain(), ReportFormat::Console, false);
        let engine = build_engine(&cli, &reporter).unwrap();
        assert_eq!(engine.pending_len(), 2);
        assert_eq!(engine.name(), "cmdq");
    }
}
