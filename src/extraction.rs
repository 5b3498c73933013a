//! Payload probing and test extraction.
//!
//! The extractor is run twice per head: once to list the payload with sizes
//! and checksums, once (optionally) to test-extract it. Installers whose
//! first part is a RAR archive need the extractor's RAR mode and an external
//! RAR helper; without them extraction is skipped rather than failed.

use crate::discovery::InstallerHead;
use crate::exec::{CommandExecutor, combined_text, tool_exists};
use crate::outcome::{CheckOutcome, Failure, FailureReason};
use crate::output::{Output, Style};
use log::{debug, warn};
use std::process::Output as ProcessOutput;

/// How far the extraction stage goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Probe, then test-extract.
    Full,
    /// Probe only.
    ProbeOnly,
}

/// Settings for the extraction stage.
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    /// Extractor executable.
    pub tool: String,
    /// Helper the extractor needs for RAR parts.
    pub rar_helper: String,
    /// Probe only or full test extraction.
    pub mode: ExtractionMode,
    /// Permit RAR-compatible extraction.
    pub allow_rar: bool,
}

/// Totals read from the extractor's listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    /// Listed files.
    pub files: usize,
    /// Sum of listed sizes in bytes.
    pub total_bytes: u64,
    /// Files with an MD5 checksum.
    pub md5: usize,
    /// Files with a SHA-1 checksum.
    pub sha1: usize,
}

impl ProbeSummary {
    /// Parses `--list --list-sizes --list-checksums` output.
    ///
    /// File lines start with `- "`; the first `<number> <unit>` pair after
    /// the quoted name is the size and the first `md5`/`sha1` token is the
    /// checksum type.
    ///
    /// # Examples
    ///
    /// ```
    /// use setupcheck::extraction::ProbeSummary;
    ///
    /// let text = concat!(
    ///     "Listing \"Game\"\n",
    ///     " - \"app/game.exe\" (1.5 KiB) [md5:0123]\n",
    ///     " - \"app/data.pak\" (2 MiB) [sha1:4567]\n",
    /// );
    /// let summary = ProbeSummary::parse(text);
    /// assert_eq!(summary.files, 2);
    /// assert_eq!(summary.total_bytes, 1536 + 2 * 1024 * 1024);
    /// assert!(summary.checksums_complete());
    /// ```
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut summary = Self::default();
        for line in text.lines().map(str::trim) {
            let Some(rest) = line.strip_prefix("- \"") else {
                continue;
            };
            summary.files += 1;
            let attributes = rest.rsplit_once('"').map_or("", |(_, tail)| tail);
            summary.total_bytes = summary
                .total_bytes
                .saturating_add(parse_size(attributes).unwrap_or(0));
            match checksum_kind(attributes) {
                Some(ChecksumKind::Md5) => summary.md5 += 1,
                Some(ChecksumKind::Sha1) => summary.sha1 += 1,
                None => {}
            }
        }
        summary
    }

    /// Every listed file carries a checksum.
    #[must_use]
    pub const fn checksums_complete(&self) -> bool {
        self.files == self.md5 + self.sha1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChecksumKind {
    Md5,
    Sha1,
}

fn checksum_kind(attributes: &str) -> Option<ChecksumKind> {
    attributes.split_whitespace().find_map(|token| {
        let token = token
            .trim_start_matches(['[', '('])
            .trim_end_matches([']', ')', ',']);
        let name = token.split_once(':').map_or(token, |(name, _)| name);
        if name.eq_ignore_ascii_case("md5") {
            Some(ChecksumKind::Md5)
        } else if name.eq_ignore_ascii_case("sha1") {
            Some(ChecksumKind::Sha1)
        } else {
            None
        }
    })
}

fn parse_size(attributes: &str) -> Option<u64> {
    let tokens: Vec<&str> = attributes.split_whitespace().collect();
    tokens.windows(2).find_map(|pair| {
        let [number, unit] = pair else {
            return None;
        };
        let multiplier = unit_multiplier(unit.trim_end_matches([')', ',']))?;
        scale(number.trim_start_matches('('), multiplier)
    })
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    match unit {
        "B" | "bytes" => Some(1),
        "KiB" => Some(1 << 10),
        "MiB" => Some(1 << 20),
        "GiB" => Some(1 << 30),
        "TiB" => Some(1 << 40),
        _ => None,
    }
}

/// Multiplies a decimal string such as `1.25` by `multiplier` without
/// going through floating point.
fn scale(number: &str, multiplier: u64) -> Option<u64> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() || !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: u128 = whole.parse().ok()?;
    let mut value = whole * u128::from(multiplier);
    if !fraction.is_empty() {
        let digits = u32::try_from(fraction.len()).ok()?;
        let denominator = 10_u128.checked_pow(digits)?;
        let numerator: u128 = fraction.parse().ok()?;
        value += numerator * u128::from(multiplier) / denominator;
    }
    u64::try_from(value).ok()
}

/// What the extraction stage found for one head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Outcome of each step that ran, in order.
    pub outcomes: Vec<CheckOutcome>,
    /// The head's first part is a RAR archive.
    pub rar_parts: bool,
    /// Listing totals, when the probe succeeded.
    pub summary: Option<ProbeSummary>,
}

impl ExtractionReport {
    /// Failures among the outcomes.
    pub fn failures(&self) -> impl Iterator<Item = &Failure> {
        self.outcomes.iter().filter_map(CheckOutcome::failure)
    }
}

/// Probes and, in full mode, test-extracts `head`.
pub fn check_extraction(
    executor: &dyn CommandExecutor,
    head: &InstallerHead,
    settings: &ExtractionSettings,
    out: &mut Output<'_>,
) -> ExtractionReport {
    let mut report = ExtractionReport::default();
    let head_arg = head.path().as_str();

    let listing = match run_tool(
        executor,
        &settings.tool,
        &["--list", "--list-sizes", "--list-checksums", head_arg],
    ) {
        Ok(text) => text,
        Err(detail) => {
            let failure = Failure::with_detail(FailureReason::ProbeFailed, detail);
            out.error(&failure);
            report.outcomes.push(CheckOutcome::Failed(failure));
            return report;
        }
    };

    let summary = ProbeSummary::parse(&listing);
    out.detail(
        format!(
            "{} file(s), {} bytes, {} md5, {} sha1",
            summary.files, summary.total_bytes, summary.md5, summary.sha1
        ),
        Style::Plain,
    );
    if summary.checksums_complete() {
        out.success("payload listing OK");
        report.outcomes.push(CheckOutcome::Passed);
    } else {
        let detail = format!(
            "{} file(s), {} checksum(s)",
            summary.files,
            summary.md5 + summary.sha1
        );
        let failure = Failure::with_detail(FailureReason::ChecksumInfoMismatch, detail);
        out.error(&failure);
        report.outcomes.push(CheckOutcome::Failed(failure));
    }
    report.summary = Some(summary);

    report.rar_parts = has_rar_parts(head);
    if report.rar_parts {
        out.detail("rar parts detected", Style::Warning);
    }

    if settings.mode == ExtractionMode::Full {
        let outcome = test_extract(executor, head_arg, report.rar_parts, settings, out);
        report.outcomes.push(outcome);
    }
    report
}

fn has_rar_parts(head: &InstallerHead) -> bool {
    head.has_rar_parts().unwrap_or_else(|err| {
        debug!("cannot list parts of {}: {err}", head.path());
        false
    })
}

fn test_extract(
    executor: &dyn CommandExecutor,
    head_arg: &str,
    rar: bool,
    settings: &ExtractionSettings,
    out: &mut Output<'_>,
) -> CheckOutcome {
    if rar {
        let skip = if !settings.allow_rar {
            Some("rar extraction disabled".to_owned())
        } else if !tool_exists(executor, &settings.rar_helper) {
            Some(format!("{} not available", settings.rar_helper))
        } else {
            None
        };
        if let Some(reason) = skip {
            warn!("skipping extraction of {head_arg}: {reason}");
            out.warn(format!("extraction skipped: {reason}"));
            return CheckOutcome::Skipped(reason);
        }
    }

    let mut args = vec!["--test"];
    if rar {
        args.push("--gog");
    }
    args.push(head_arg);

    match run_tool(executor, &settings.tool, &args) {
        Ok(_) => {
            out.success("test extraction OK");
            CheckOutcome::Passed
        }
        Err(detail) => {
            let failure = Failure::with_detail(FailureReason::ExtractionFailed, detail);
            out.error(&failure);
            CheckOutcome::Failed(failure)
        }
    }
}

/// Runs the extractor, returning its text or a one-line failure detail.
fn run_tool(
    executor: &dyn CommandExecutor,
    tool: &str,
    args: &[&str],
) -> std::result::Result<String, String> {
    let output = executor.run(tool, args).map_err(|err| err.to_string())?;
    if output.status.success() {
        Ok(combined_text(&output))
    } else {
        Err(failure_detail(&output))
    }
}

fn failure_detail(output: &ProcessOutput) -> String {
    let text = combined_text(output);
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map_or_else(|| format!("exit status {}", output.status), str::to_owned)
}

#[cfg(test)]
#[path = "extraction_tests.rs"]
mod tests;
