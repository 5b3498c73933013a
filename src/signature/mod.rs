//! Digital signature stage.
//!
//! The head is handed to an external verifier whose text output is
//! classified line by line. The verdict combines the tool's exit status
//! with the failure markers found in its output; when the two disagree a
//! warning is emitted so unexpected tool behaviour does not go unnoticed.

mod dialect;

pub use dialect::{FieldLabel, LineKind, Osslsigncode, SignatureDialect, VerifyRequest};

use crate::config::KnownStringSet;
use crate::discovery::InstallerHead;
use crate::exec::{CommandExecutor, combined_text};
use crate::outcome::{CheckOutcome, Failure, FailureReason};
use crate::output::{Output, Style};
use camino::Utf8PathBuf;
use log::{debug, warn};

/// Warning emitted when exit status and output markers contradict.
pub const DISAGREEMENT_WARNING: &str = "signature tool exit status disagrees with its output";

/// Settings for the signature stage.
#[derive(Debug, Clone)]
pub struct SignatureSettings {
    /// Verifier executable.
    pub tool: String,
    /// CA bundle passed to the verifier.
    pub ca_bundle: Option<Utf8PathBuf>,
    /// Show lines normally suppressed as noise.
    pub unfiltered: bool,
}

/// One classified output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    /// Original line text.
    pub text: String,
    /// Classification.
    pub kind: LineKind,
    /// For field lines, whether the value is a configured known string.
    pub known: bool,
}

/// Classifies every line of `text`.
#[must_use]
pub fn classify_output(
    dialect: &dyn SignatureDialect,
    text: &str,
    known: &KnownStringSet,
) -> Vec<ClassifiedLine> {
    text.lines()
        .map(|line| {
            let kind = dialect.classify(line);
            let is_known = match &kind {
                LineKind::Field { label, value } => known.is_known(*label, value),
                _ => false,
            };
            ClassifiedLine {
                text: line.to_owned(),
                kind,
                known: is_known,
            }
        })
        .collect()
}

/// Stage verdict plus whether exit status and output disagreed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// The stage outcome.
    pub outcome: CheckOutcome,
    /// Exit status and markers contradict each other.
    pub disagreement: bool,
}

/// Derives the verdict from classified lines and the exit status.
///
/// # Examples
///
/// ```
/// use setupcheck::outcome::CheckOutcome;
/// use setupcheck::signature::judge;
///
/// let verdict = judge(&[], true, false);
/// assert_eq!(verdict.outcome, CheckOutcome::Passed);
/// assert!(!verdict.disagreement);
/// ```
#[must_use]
pub fn judge(lines: &[ClassifiedLine], exit_success: bool, unsigned: bool) -> Verdict {
    let first_error = lines.iter().find(|line| line.kind == LineKind::Error);
    let any_success = lines.iter().any(|line| line.kind == LineKind::Success);

    let disagreement = (exit_success && first_error.is_some())
        || (!exit_success && any_success && first_error.is_none());

    let outcome = if unsigned {
        CheckOutcome::failed(FailureReason::NoSignatureFound)
    } else if let Some(line) = first_error {
        CheckOutcome::Failed(Failure::with_detail(
            FailureReason::SignatureError,
            line.text.trim(),
        ))
    } else if exit_success {
        CheckOutcome::Passed
    } else {
        CheckOutcome::Failed(Failure::with_detail(
            FailureReason::SignatureError,
            "verifier exited with an error",
        ))
    };

    Verdict {
        outcome,
        disagreement,
    }
}

/// Runs the signature verifier on `head` and classifies the result.
///
/// Spawn failures and timeouts become a `signature_error` outcome.
pub fn check_signature(
    executor: &dyn CommandExecutor,
    dialect: &dyn SignatureDialect,
    head: &InstallerHead,
    settings: &SignatureSettings,
    known: &KnownStringSet,
    out: &mut Output<'_>,
) -> CheckOutcome {
    let request = VerifyRequest {
        head: head.path().to_owned(),
        ca_bundle: settings.ca_bundle.clone(),
    };
    let args = dialect.command_args(&request);
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

    let output = match executor.run(&settings.tool, &arg_refs) {
        Ok(output) => output,
        Err(err) => {
            let failure = Failure::with_detail(FailureReason::SignatureError, err.to_string());
            out.error(&failure);
            return CheckOutcome::Failed(failure);
        }
    };

    let text = combined_text(&output);
    let lines = classify_output(dialect, &text, known);
    render_lines(&lines, settings.unfiltered, out);

    let verdict = judge(&lines, output.status.success(), dialect.is_unsigned(&text));
    if verdict.disagreement {
        warn!("{}: {DISAGREEMENT_WARNING} ({})", head.path(), output.status);
        out.warn(DISAGREEMENT_WARNING);
    }
    debug!("signature verdict for {}: {:?}", head.path(), verdict.outcome);

    match &verdict.outcome {
        CheckOutcome::Passed => out.success("signature OK"),
        CheckOutcome::Failed(failure) => out.error(failure),
        CheckOutcome::Skipped(_) => {}
    }
    verdict.outcome
}

fn render_lines(lines: &[ClassifiedLine], unfiltered: bool, out: &mut Output<'_>) {
    for line in lines {
        match &line.kind {
            LineKind::Field { label, value } => {
                let style = if line.known { Style::Known } else { Style::Unknown };
                let painted = out.paint(value, style);
                out.detail_raw(format!("{label}: {painted}"));
            }
            LineKind::Success => out.success(line.text.trim()),
            LineKind::Error => out.error(line.text.trim()),
            LineKind::Noise if !unfiltered => {}
            LineKind::Noise | LineKind::Plain => out.detail(line.text.trim_end(), Style::Plain),
        }
    }
}
