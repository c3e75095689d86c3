//! Console color themes.
//!
//! A theme maps output roles (`info`, `data`, `warn`, ...) to colors. Themes
//! load from a JSON object of role name to color name, for example:
//!
//! ```json
//! { "info": "bright_green", "warn": "magenta" }
//! ```
//!
//! Roles missing from the file keep their default color.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use owo_colors::{OwoColorize, Style};

use crate::error::ThemeError;

/// Directory under the platform config dir holding `theme.json`.
const CONFIG_DIR_NAME: &str = "cmdq";

/// File name of the default theme.
const THEME_FILE_NAME: &str = "theme.json";

/// Output roles a theme assigns colors to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    /// Novelty output; unused by the console reporter.
    Silly,
    /// Echoed user input.
    Input,
    /// Extra detail shown only when asked for.
    Verbose,
    /// Interactive prompts.
    Prompt,
    /// Labels and status lines such as "Executing" and "From Dir".
    Info,
    /// Values: commands, directories and captured stdout.
    Data,
    /// Queue names and the parallel-work notice.
    Help,
    /// Captured stderr and command failure summaries.
    Warn,
    /// Diagnostic output.
    Debug,
    /// Fatal errors.
    Error,
}

impl Role {
    /// Every role, in the order they appear in theme files.
    pub const ALL: [Role; 10] = [
        Role::Silly,
        Role::Input,
        Role::Verbose,
        Role::Prompt,
        Role::Info,
        Role::Data,
        Role::Help,
        Role::Warn,
        Role::Debug,
        Role::Error,
    ];

    /// The role's name as written in theme files.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Silly => "silly",
            Role::Input => "input",
            Role::Verbose => "verbose",
            Role::Prompt => "prompt",
            Role::Info => "info",
            Role::Data => "data",
            Role::Help => "help",
            Role::Warn => "warn",
            Role::Debug => "debug",
            Role::Error => "error",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Role::ALL.into_iter().find(|role| role.as_str() == name)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named colors a theme may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorName {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    Grey,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
    /// Bold text in the terminal's default color.
    Bold,
    /// No styling at all.
    Plain,
}

impl ColorName {
    /// Parses a color name. Accepts `grey`/`gray` and both `bright_x` and
    /// `brightX` spellings.
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace(['_', '-', ' '], "");
        let color = match normalized.as_str() {
            "black" => ColorName::Black,
            "red" => ColorName::Red,
            "green" => ColorName::Green,
            "yellow" => ColorName::Yellow,
            "blue" => ColorName::Blue,
            "magenta" | "rainbow" => ColorName::Magenta,
            "cyan" => ColorName::Cyan,
            "white" => ColorName::White,
            "grey" | "gray" | "brightblack" => ColorName::Grey,
            "brightred" => ColorName::BrightRed,
            "brightgreen" => ColorName::BrightGreen,
            "brightyellow" => ColorName::BrightYellow,
            "brightblue" => ColorName::BrightBlue,
            "brightmagenta" => ColorName::BrightMagenta,
            "brightcyan" => ColorName::BrightCyan,
            "brightwhite" => ColorName::BrightWhite,
            "bold" => ColorName::Bold,
            "plain" | "none" | "default" => ColorName::Plain,
            _ => return None,
        };
        Some(color)
    }

    /// Builds the terminal style for this color.
    pub fn style(self) -> Style {
        let style = Style::new();
        match self {
            ColorName::Black => style.black(),
            ColorName::Red => style.red(),
            ColorName::Green => style.green(),
            ColorName::Yellow => style.yellow(),
            ColorName::Blue => style.blue(),
            ColorName::Magenta => style.magenta(),
            ColorName::Cyan => style.cyan(),
            ColorName::White => style.white(),
            ColorName::Grey => style.bright_black(),
            ColorName::BrightRed => style.bright_red(),
            ColorName::BrightGreen => style.bright_green(),
            ColorName::BrightYellow => style.bright_yellow(),
            ColorName::BrightBlue => style.bright_blue(),
            ColorName::BrightMagenta => style.bright_magenta(),
            ColorName::BrightCyan => style.bright_cyan(),
            ColorName::BrightWhite => style.bright_white(),
            ColorName::Bold => style.bold(),
            ColorName::Plain => style,
        }
    }
}

/// Role → color assignments plus a global on/off switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    colors: BTreeMap<Role, ColorName>,
    enabled: bool,
}

impl Default for Theme {
    fn default() -> Self {
        let colors = BTreeMap::from([
            (Role::Silly, ColorName::Magenta),
            (Role::Input, ColorName::Grey),
            (Role::Verbose, ColorName::Cyan),
            (Role::Prompt, ColorName::Grey),
            (Role::Info, ColorName::Green),
            (Role::Data, ColorName::Grey),
            (Role::Help, ColorName::Cyan),
            (Role::Warn, ColorName::Yellow),
            (Role::Debug, ColorName::Blue),
            (Role::Error, ColorName::Red),
        ]);
        Self {
            colors,
            enabled: true,
        }
    }
}

impl Theme {
    /// A theme that never emits escape codes.
    pub fn plain() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Parses a theme from JSON, layering it over the defaults.
    ///
    /// Unknown role names are ignored.
    ///
    /// ## Errors
    ///
    /// Returns an error if the JSON is not an object of strings or names an
    /// unknown color.
    ///
    /// ## Examples
    ///
    /// ```
    /// use cmdq_lib::{ColorName, Role, Theme};
    ///
    /// let theme = Theme::from_json_str(r#"{ "info": "blue" }"#).unwrap();
    /// assert_eq!(theme.color(Role::Info), ColorName::Blue);
    /// assert_eq!(theme.color(Role::Warn), ColorName::Yellow);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, ThemeError> {
        let overrides: BTreeMap<String, String> = serde_json::from_str(json)?;
        let mut theme = Self::default();

        for (role_name, color_name) in overrides {
            let Some(role) = Role::from_name(&role_name) else {
                continue;
            };
            let color = ColorName::parse(&color_name).ok_or_else(|| ThemeError::UnknownColor {
                role: role_name.clone(),
                color: color_name.clone(),
            })?;
            theme.colors.insert(role, color);
        }

        Ok(theme)
    }

    /// Loads a theme file.
    ///
    /// ## Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ThemeError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Loads the theme at [`default_path`](Self::default_path) if it exists,
    /// falling back to the built-in defaults otherwise.
    ///
    /// ## Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load_default() -> Result<Self, ThemeError> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `<config dir>/cmdq/theme.json`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(THEME_FILE_NAME))
    }

    /// Turns escape codes on or off.
    #[must_use]
    pub fn with_color(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns true if painting emits escape codes.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The color assigned to `role`.
    pub fn color(&self, role: Role) -> ColorName {
        self.colors.get(&role).copied().unwrap_or(ColorName::Plain)
    }

    /// The style assigned to `role`, or an empty style when color is off.
    pub fn style(&self, role: Role) -> Style {
        if self.enabled {
            self.color(role).style()
        } else {
            Style::new()
        }
    }

    /// Renders `text` in the role's style.
    pub fn paint(&self, role: Role, text: &str) -> String {
        if self.enabled {
            text.style(self.style(role)).to_string()
        } else {
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_palette() {
        let theme = Theme::default();
        assert_eq!(theme.color(Role::Info), ColorName::Green);
        assert_eq!(theme.color(Role::Data), ColorName::Grey);
        assert_eq!(theme.color(Role::Help), ColorName::Cyan);
        assert_eq!(theme.color(Role::Warn), ColorName::Yellow);
        assert_eq!(theme.color(Role::Error), ColorName::Red);
        assert!(theme.is_enabled());
    }

    #[test]
    fn json_overrides_layer_over_defaults() {
        let theme = Theme::from_json_str(r#"{"warn": "bright_red", "data": "white"}"#).unwrap();
        assert_eq!(theme.color(Role::Warn), ColorName::BrightRed);
        assert_eq!(theme.color(Role::Data), ColorName::White);
        assert_eq!(theme.color(Role::Info), ColorName::Green);
    }

    #[test]
    fn unknown_roles_are_ignored() {
        let theme = Theme::from_json_str(r#"{"sparkle": "red"}"#).unwrap();
        assert_eq!(theme, Theme::default());
    }

    #[test]
    fn unknown_color_is_an_error() {
        let err = Theme::from_json_str(r#"{"info": "chartreuse"}"#).unwrap_err();
        assert!(matches!(
            err,
            ThemeError::UnknownColor { ref role, ref color } if role == "info" && color == "chartreuse"
        ));
    }

    #[test]
    fn non_object_json_is_a_parse_error() {
        let err = Theme::from_json_str(r#"["red"]"#).unwrap_err();
        assert!(matches!(err, ThemeError::Parse(_)));
    }

    #[test]
    fn color_names_accept_common_spellings() {
        assert_eq!(ColorName::parse("gray"), Some(ColorName::Grey));
        assert_eq!(ColorName::parse("Bright-Blue"), Some(ColorName::BrightBlue));
        assert_eq!(ColorName::parse("brightCyan"), Some(ColorName::BrightCyan));
        assert_eq!(ColorName::parse("rainbow"), Some(ColorName::Magenta));
        assert_eq!(ColorName::parse("mauve"), None);
    }

    #[test]
    fn paint_adds_escape_codes_only_when_enabled() {
        let theme = Theme::default();
        let painted = theme.paint(Role::Info, "ok");
        assert!(painted.contains("ok"));
        assert!(painted.contains('\u{1b}'));

        let plain = Theme::plain().paint(Role::Info, "ok");
        assert_eq!(plain, "ok");
    }

    #[test]
    fn default_path_ends_with_theme_file() {
        if let Some(path) = Theme::default_path() {
            assert!(path.ends_with("cmdq/theme.json"));
        }
    }
}
