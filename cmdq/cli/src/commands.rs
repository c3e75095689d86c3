//! Assembles the command list from arguments and command files.

use std::path::{Path, PathBuf};

use crate::CliError;

/// Splits a command file into commands.
///
/// One command per line. Blank lines and lines starting with `#` are skipped.
pub fn parse_command_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Reads and parses a command file.
pub fn load_command_file(path: &Path) -> Result<Vec<String>, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::CommandFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_command_lines(&text))
}

/// Positional commands first, then the file's commands.
pub fn collect_commands(args: &[String], file: Option<&PathBuf>) -> Result<Vec<String>, CliError> {
    let mut commands: Vec<String> = args
        .iter()
        .map(|command| command.trim().to_string())
        .filter(|command| !command.is_empty())
        .collect();

    if let Some(path) = file {
        commands.extend(load_command_file(path)?);
    }

    if commands.is_empty() {
        return Err(CliError::NoCommands);
    }
    Ok(commands)
}
