//! User-facing output for verification runs.
//!
//! Stages never write to the process streams. They receive an [`Output`]
//! that wraps any `Write` sink together with the requested verbosity and
//! colour preference, so compact and silent runs are decided here rather
//! than by redirecting streams.

use colored::Colorize;
use std::fmt::Display;
use std::io::Write;

/// How much the run prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Per-line stage detail plus the summary.
    #[default]
    Normal,
    /// One verdict line per head plus the summary.
    Compact,
    /// Nothing at all; the exit status is the only result.
    Silent,
}

/// Visual role of a line or fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// No decoration.
    Plain,
    /// Positive result.
    Success,
    /// Failure.
    Error,
    /// Non-fatal condition worth attention.
    Warning,
    /// Value found in the configured known strings.
    Known,
    /// Value not found in the configured known strings.
    Unknown,
    /// Headings.
    Emphasis,
}

/// Verbosity-aware, optionally colourised line writer.
pub struct Output<'w> {
    sink: &'w mut dyn Write,
    mode: OutputMode,
    color: bool,
}

impl<'w> Output<'w> {
    /// Creates an output over `sink`.
    pub fn new(sink: &'w mut dyn Write, mode: OutputMode, color: bool) -> Self {
        Self { sink, mode, color }
    }

    /// The active mode.
    #[must_use]
    pub const fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Applies `style` to `text` when colour is enabled.
    #[must_use]
    pub fn paint(&self, text: &str, style: Style) -> String {
        if !self.color {
            return text.to_owned();
        }
        match style {
            Style::Plain => text.to_owned(),
            Style::Success => text.green().bold().to_string(),
            Style::Error => text.red().bold().to_string(),
            Style::Warning => text.yellow().bold().to_string(),
            Style::Known => text.green().to_string(),
            Style::Unknown => text.yellow().to_string(),
            Style::Emphasis => text.cyan().bold().to_string(),
        }
    }

    /// Writes a stage detail line; shown in normal mode only.
    pub fn detail(&mut self, message: impl Display, style: Style) {
        if self.mode == OutputMode::Normal {
            let text = self.paint(&message.to_string(), style);
            self.write_line(text);
        }
    }

    /// Writes an already painted detail line; shown in normal mode only.
    pub fn detail_raw(&mut self, line: impl Display) {
        if self.mode == OutputMode::Normal {
            self.write_line(line);
        }
    }

    /// Positive stage result.
    pub fn success(&mut self, message: impl Display) {
        self.detail(message, Style::Success);
    }

    /// Stage failure.
    pub fn error(&mut self, message: impl Display) {
        self.detail(message, Style::Error);
    }

    /// Non-fatal condition.
    pub fn warn(&mut self, message: impl Display) {
        self.detail(message, Style::Warning);
    }

    /// Heading printed before each head in normal mode.
    pub fn head_banner(&mut self, ordinal: usize, total: usize, head: impl Display) {
        if self.mode == OutputMode::Normal {
            let text = self.paint(&format!("[{ordinal}/{total}] {head}"), Style::Emphasis);
            self.write_line("");
            self.write_line(text);
        }
    }

    /// Stage heading in normal mode.
    pub fn stage(&mut self, title: &str) {
        if self.mode == OutputMode::Normal {
            let text = self.paint(&format!("-- {title} --"), Style::Emphasis);
            self.write_line(text);
        }
    }

    /// Final per-head verdict; the only per-head line in compact mode.
    pub fn verdict(&mut self, head: impl Display, passed: bool) {
        if self.mode == OutputMode::Silent {
            return;
        }
        let status = if passed {
            self.paint("OK", Style::Success)
        } else {
            self.paint("FAILED", Style::Error)
        };
        self.write_line(format!("{head}: {status}"));
    }

    /// Summary text, shown unless silent.
    pub fn summary(&mut self, text: impl Display) {
        if self.mode != OutputMode::Silent {
            self.write_line(text);
        }
    }

    fn write_line(&mut self, message: impl Display) {
        if writeln!(self.sink, "{message}").is_err() {
            // Best-effort output; ignore write failures.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn render(mode: OutputMode, f: impl FnOnce(&mut Output<'_>)) -> String {
        let mut buf = Vec::new();
        {
            let mut out = Output::new(&mut buf, mode, false);
            f(&mut out);
        }
        String::from_utf8(buf).expect("utf-8 output")
    }

    #[rstest]
    #[case::normal(OutputMode::Normal, true)]
    #[case::compact(OutputMode::Compact, false)]
    #[case::silent(OutputMode::Silent, false)]
    fn details_only_in_normal_mode(#[case] mode: OutputMode, #[case] shown: bool) {
        let text = render(mode, |out| out.error("MISMATCH"));
        assert_eq!(text.contains("MISMATCH"), shown);
    }

    #[rstest]
    #[case::normal(OutputMode::Normal, true)]
    #[case::compact(OutputMode::Compact, true)]
    #[case::silent(OutputMode::Silent, false)]
    fn verdicts_hidden_only_when_silent(#[case] mode: OutputMode, #[case] shown: bool) {
        let text = render(mode, |out| out.verdict("setup_game.exe", false));
        assert_eq!(text.contains("setup_game.exe: FAILED"), shown);
    }

    #[test]
    fn no_color_leaves_text_untouched() {
        let mut buf = Vec::new();
        let out = Output::new(&mut buf, OutputMode::Normal, false);
        assert_eq!(out.paint("ok", Style::Success), "ok");
    }

    #[test]
    fn banner_shows_position() {
        let text = render(OutputMode::Normal, |out| out.head_banner(2, 3, "setup_b.exe"));
        assert!(text.contains("[2/3] setup_b.exe"));
    }
}
