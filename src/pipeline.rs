//! Per-head orchestration of the verification stages.
//!
//! Each head runs through up to three independent stages (signature, part
//! checksums, extraction). A failing stage never prevents the next one from
//! running; every failure lands in the [`AggregateReport`] tagged with the
//! head's position. Heads are processed one at a time in discovery order.

use crate::checksum::{ChecksumSettings, DigestMode, check_checksums};
use crate::config::{Config, KnownStringSet};
use crate::discovery::InstallerHead;
use crate::exec::CommandExecutor;
use crate::extraction::{ExtractionMode, ExtractionSettings, check_extraction};
use crate::outcome::{CheckOutcome, Failure, FailureReason};
use crate::output::Output;
use crate::report::AggregateReport;
use crate::signature::{Osslsigncode, SignatureDialect, SignatureSettings, check_signature};
use log::{info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Which stages run and in what form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSelection {
    /// Run the signature stage.
    pub signature: bool,
    /// Run the checksum stage in the given mode.
    pub checksums: Option<DigestMode>,
    /// Run the extraction stage in the given mode.
    pub extraction: Option<ExtractionMode>,
}

impl StageSelection {
    /// Every stage in its full form.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            signature: true,
            checksums: Some(DigestMode::Compute),
            extraction: Some(ExtractionMode::Full),
        }
    }
}

/// Run-wide switches that do not come from the configuration file.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Stages to run.
    pub stages: StageSelection,
    /// Show suppressed signature tool lines.
    pub unfiltered: bool,
    /// Permit RAR-compatible extraction.
    pub allow_rar: bool,
    /// Stop after the first head.
    pub first_head_only: bool,
}

/// Drives the stages over a list of heads.
pub struct Verifier<'a> {
    executor: &'a dyn CommandExecutor,
    dialect: Box<dyn SignatureDialect + 'a>,
    known: &'a KnownStringSet,
    signature: Option<SignatureSettings>,
    checksums: Option<ChecksumSettings>,
    extraction: Option<ExtractionSettings>,
    first_head_only: bool,
    cancel: Arc<AtomicBool>,
}

impl<'a> Verifier<'a> {
    /// Creates a verifier using `osslsigncode` output conventions.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, config: &'a Config, options: RunOptions) -> Self {
        let stages = options.stages;
        Self {
            executor,
            dialect: Box::new(Osslsigncode),
            known: &config.known,
            signature: stages.signature.then(|| SignatureSettings {
                tool: config.tools.signature.clone(),
                ca_bundle: config.tools.ca_bundle.clone(),
                unfiltered: options.unfiltered,
            }),
            checksums: stages.checksums.map(|mode| ChecksumSettings {
                marker: config.trailer_marker.clone(),
                window: config.trailer_window,
                mode,
            }),
            extraction: stages.extraction.map(|mode| ExtractionSettings {
                tool: config.tools.extractor.clone(),
                rar_helper: config.tools.rar_helper.clone(),
                mode,
                allow_rar: options.allow_rar,
            }),
            first_head_only: options.first_head_only,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replaces the signature tool dialect.
    #[must_use]
    pub fn with_dialect(mut self, dialect: Box<dyn SignatureDialect + 'a>) -> Self {
        self.dialect = dialect;
        self
    }

    /// Shares a cancellation flag, typically set from a Ctrl-C handler.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Verifies `heads` in order and returns the accumulated report.
    ///
    /// Cancellation is honoured before each head and between stages; the
    /// report is then marked interrupted.
    pub fn run(&self, heads: &[InstallerHead], out: &mut Output<'_>) -> AggregateReport {
        let mut report = AggregateReport::default();
        let limit = if self.first_head_only {
            heads.len().min(1)
        } else {
            heads.len()
        };

        for (index, head) in heads.iter().take(limit).enumerate() {
            if self.cancelled() {
                report.interrupted = true;
                break;
            }
            let ordinal = index + 1;
            report.heads_checked += 1;
            info!("checking {} ({ordinal}/{limit})", head.path());
            out.head_banner(ordinal, limit, head.path());

            let completed = self.check_head(ordinal, head, &mut report, out);
            out.verdict(head.path(), !report.head_failed(ordinal));
            if !completed {
                report.interrupted = true;
                break;
            }
        }
        report
    }

    /// Runs the enabled stages on one head; `false` when cancelled midway.
    fn check_head(
        &self,
        ordinal: usize,
        head: &InstallerHead,
        report: &mut AggregateReport,
        out: &mut Output<'_>,
    ) -> bool {
        if let Some(settings) = &self.signature {
            out.stage("signature");
            let outcome = check_signature(
                self.executor,
                self.dialect.as_ref(),
                head,
                settings,
                self.known,
                out,
            );
            // An interrupt also reaches the child tool, so its result is void.
            if self.cancelled() {
                return false;
            }
            record(report, ordinal, head, outcome);
        }
        if self.cancelled() {
            return false;
        }

        if let Some(settings) = &self.checksums {
            out.stage("bin checksums");
            match check_checksums(head, settings, out) {
                Ok(checksums) => {
                    if checksums.rar_parts > 0 {
                        report.record_rar_head(head.path());
                    }
                    for failure in checksums.failures {
                        report.record_failure(ordinal, head.path(), failure);
                    }
                }
                Err(err) => {
                    warn!("cannot list part files of {}: {err}", head.path());
                    let failure = Failure::with_detail(
                        FailureReason::WrongPartCount,
                        format!("cannot list part files: {err}"),
                    );
                    out.error(&failure);
                    report.record_failure(ordinal, head.path(), failure);
                }
            }
        }
        if self.cancelled() {
            return false;
        }

        if let Some(settings) = &self.extraction {
            out.stage("extraction");
            let extraction = check_extraction(self.executor, head, settings, out);
            if self.cancelled() {
                return false;
            }
            if extraction.rar_parts {
                report.record_rar_head(head.path());
            }
            for outcome in extraction.outcomes {
                record(report, ordinal, head, outcome);
            }
        }
        true
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

fn record(report: &mut AggregateReport, ordinal: usize, head: &InstallerHead, outcome: CheckOutcome) {
    if let CheckOutcome::Failed(failure) = outcome {
        report.record_failure(ordinal, head.path(), failure);
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
