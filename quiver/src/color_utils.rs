//! Terminal styling for log output.
//!
//! Styling is off when `--no-color` is passed, when `NO_COLOR` or
//! `QUIVER_NO_COLOR` is set to a non-empty value, when `TERM=dumb`, or when
//! stderr is not a terminal. Markers fall back to bracketed text tags.

use colored::{ColoredString, Colorize};
use log::Level;
use std::io::{stderr, IsTerminal};
use std::sync::OnceLock;

static COLORS_ENABLED: OnceLock<bool> = OnceLock::new();

fn env_disables_colors() -> bool {
    let set = |name: &str| std::env::var(name).is_ok_and(|v| !v.is_empty());
    set("NO_COLOR")
        || set("QUIVER_NO_COLOR")
        || std::env::var("TERM").is_ok_and(|t| t == "dumb")
        || !stderr().is_terminal()
}

fn resolve(no_color_flag: bool) -> bool {
    !no_color_flag && !env_disables_colors()
}

/// Fix the color decision for the rest of the process. Later calls are ignored.
pub fn init_color_config(no_color_flag: bool) {
    if COLORS_ENABLED.set(resolve(no_color_flag)).is_err() {
        log::debug!("Color configuration already initialized");
    }
}

pub fn colors_enabled() -> bool {
    *COLORS_ENABLED.get_or_init(|| resolve(false))
}

fn paint(text: &str, style: impl FnOnce(&str) -> ColoredString) -> String {
    if colors_enabled() {
        style(text).to_string()
    } else {
        text.to_string()
    }
}

/// Level name as shown in the `[LEVEL]` log prefix.
pub fn level_tag(level: Level) -> String {
    let name = level.as_str();
    match level {
        Level::Error => paint(name, |s| s.red().bold()),
        Level::Warn => paint(name, |s| s.yellow()),
        Level::Info => paint(name, |s| s.green()),
        Level::Debug => paint(name, |s| s.blue()),
        Level::Trace => paint(name, |s| s.magenta()),
    }
}

/// Per-capture outcome text: scored results in green, unscored in yellow.
pub fn outcome(text: &str, scored: bool) -> String {
    if scored {
        paint(text, |s| s.green())
    } else {
        paint(text, |s| s.yellow())
    }
}

/// Events in a scoring run that get a leading marker in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    RunStart,
    Scored,
    NoScore,
    Skipped,
    PartialRun,
    Failed,
}

impl Marker {
    pub fn prefix(self) -> &'static str {
        if colors_enabled() {
            match self {
                Marker::RunStart => "🎯 ",
                Marker::Scored => "✅ ",
                Marker::NoScore => "➖ ",
                Marker::Skipped | Marker::PartialRun => "⚠️  ",
                Marker::Failed => "❌ ",
            }
        } else {
            match self {
                Marker::RunStart => "[SCORE] ",
                Marker::Scored => "[SCORED] ",
                Marker::NoScore => "[NO-SCORE] ",
                Marker::Skipped => "[SKIPPED] ",
                Marker::PartialRun => "[PARTIAL] ",
                Marker::Failed => "[FAILED] ",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_disables_colors() {
        assert!(!resolve(true));
    }

    #[test]
    fn test_env_disables_colors() {
        std::env::set_var("QUIVER_NO_COLOR", "1");
        assert!(!resolve(false));
        std::env::remove_var("QUIVER_NO_COLOR");

        std::env::set_var("NO_COLOR", "1");
        assert!(!resolve(false));
        std::env::remove_var("NO_COLOR");
    }

    #[test]
    fn test_plain_output_when_disabled() {
        COLORS_ENABLED.set(false).ok();

        assert_eq!(level_tag(Level::Warn), "WARN");
        assert_eq!(outcome("total 22", true), "total 22");
        assert_eq!(Marker::NoScore.prefix(), "[NO-SCORE] ");
        assert_eq!(Marker::Failed.prefix(), "[FAILED] ");
    }
}
