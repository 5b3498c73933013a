//! CLI argument definitions for setupcheck.
//!
//! Kept apart from the binary so the flag-to-settings mapping can be tested
//! without spawning a process.

use crate::checksum::DigestMode;
use crate::extraction::ExtractionMode;
use crate::output::OutputMode;
use crate::pipeline::StageSelection;
use camino::Utf8PathBuf;
use clap::Parser;

/// Verify signatures, part checksums and payload integrity of installers.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "setupcheck")]
#[command(version, about)]
#[command(long_about = concat!(
    "Verify multi-part installer archives.\n\n",
    "Each installer head (setup_*.exe) is checked for a valid digital signature, ",
    "for MD5 digests of its setup_*-NN.bin parts matching the manifest embedded in ",
    "the head, and for a payload that lists and test-extracts cleanly.\n\n",
    "Without any of -s, -b, -B, -i or -I every stage runs, as with -sbi.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Check every installer in the current directory:\n",
    "    $ setupcheck\n\n",
    "  Only compare part checksums, recursing into subdirectories:\n",
    "    $ setupcheck -b -r ~/Downloads/gog\n\n",
    "  Use in scripts, exit status only:\n",
    "    $ setupcheck -S setup_game.exe && echo verified\n\n",
    "The exit status is 0 only when at least one installer was checked and no ",
    "errors were found.",
))]
pub struct Cli {
    /// Verify the digital signature of each head.
    #[arg(short = 's', long = "signature")]
    pub signature: bool,

    /// Verify part files against the checksums embedded in the head.
    #[arg(short = 'b', long = "bin-checksums")]
    pub bin_checksums: bool,

    /// Check part presence and count only, without computing digests.
    #[arg(short = 'B', long = "bin-presence")]
    pub bin_presence: bool,

    /// Probe and test-extract the embedded payload.
    #[arg(short = 'i', long = "extract")]
    pub extract: bool,

    /// Probe the embedded payload without test extraction.
    #[arg(short = 'I', long = "probe")]
    pub probe: bool,

    /// Treat every .exe as an installer head, regardless of prefix.
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Descend into subdirectories.
    #[arg(short = 'r', long)]
    pub recursive: bool,

    /// Do not attempt RAR-compatible extraction.
    #[arg(short = 'R', long = "no-rar")]
    pub no_rar: bool,

    /// One line per installer plus the summary.
    #[arg(short = 'c', long, conflicts_with = "silent")]
    pub compact: bool,

    /// Check the first installer only and print nothing.
    #[arg(short = 'S', long)]
    pub silent: bool,

    /// Disable coloured output.
    #[arg(short = 'C', long = "no-color")]
    pub no_color: bool,

    /// Show signature tool lines that are normally suppressed.
    #[arg(long)]
    pub unfiltered: bool,

    /// Print the report as JSON instead of the text summary.
    #[arg(long, conflicts_with = "silent")]
    pub json: bool,

    /// Configuration file [default: platform config directory].
    #[arg(long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Seconds before an external tool is killed; 0 waits forever.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Installer files or directories to scan.
    #[arg(value_name = "PATH", default_value = ".")]
    pub paths: Vec<Utf8PathBuf>,
}

impl Cli {
    /// Resolves the stage flags.
    ///
    /// No stage flag at all selects every stage in its full form. The
    /// reduced variants win when both forms of a stage are requested.
    ///
    /// # Examples
    ///
    /// ```
    /// use clap::Parser;
    /// use setupcheck::checksum::DigestMode;
    /// use setupcheck::cli::Cli;
    ///
    /// let cli = Cli::parse_from(["setupcheck", "-b", "-B"]);
    /// let stages = cli.stages();
    /// assert!(!stages.signature);
    /// assert_eq!(stages.checksums, Some(DigestMode::Skip));
    /// assert_eq!(stages.extraction, None);
    /// ```
    #[must_use]
    pub fn stages(&self) -> StageSelection {
        let any_selected =
            self.signature || self.bin_checksums || self.bin_presence || self.extract || self.probe;
        if !any_selected {
            return StageSelection::all();
        }

        let checksums = if self.bin_presence {
            Some(DigestMode::Skip)
        } else if self.bin_checksums {
            Some(DigestMode::Compute)
        } else {
            None
        };
        let extraction = if self.probe {
            Some(ExtractionMode::ProbeOnly)
        } else if self.extract {
            Some(ExtractionMode::Full)
        } else {
            None
        };

        StageSelection {
            signature: self.signature,
            checksums,
            extraction,
        }
    }

    /// Verbosity of user-facing output.
    #[must_use]
    pub const fn output_mode(&self) -> OutputMode {
        if self.silent || self.json {
            OutputMode::Silent
        } else if self.compact {
            OutputMode::Compact
        } else {
            OutputMode::Normal
        }
    }

    /// Default log filter for the requested verbosity.
    #[must_use]
    pub const fn log_level(&self) -> log::LevelFilter {
        if self.silent {
            return log::LevelFilter::Off;
        }
        match self.verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
