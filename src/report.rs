//! Run-wide results: failures per head, RAR heads and the exit status.

use crate::outcome::Failure;
use crate::output::{Output, Style};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

/// A failure attributed to one head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    /// 1-based position of the head in discovery order.
    pub ordinal: usize,
    /// Head path.
    pub path: Utf8PathBuf,
    /// What went wrong.
    #[serde(flatten)]
    pub failure: Failure,
}

/// Accumulated results of a verification run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateReport {
    /// Heads whose processing started.
    pub heads_checked: usize,
    /// Number of error records.
    pub error_count: usize,
    /// Failures in the order they were found.
    pub errors: Vec<ErrorRecord>,
    /// Heads whose parts are RAR archives.
    pub rar_heads: Vec<Utf8PathBuf>,
    /// The run was cancelled before every head was processed.
    pub interrupted: bool,
}

impl AggregateReport {
    /// Appends a failure for the head at `ordinal`.
    pub fn record_failure(&mut self, ordinal: usize, path: &Utf8Path, failure: Failure) {
        self.errors.push(ErrorRecord {
            ordinal,
            path: path.to_owned(),
            failure,
        });
        self.error_count = self.errors.len();
    }

    /// Notes that a head has RAR parts.
    pub fn record_rar_head(&mut self, path: &Utf8Path) {
        if !self.rar_heads.iter().any(|known| known == path) {
            self.rar_heads.push(path.to_owned());
        }
    }

    /// Returns whether the head at `ordinal` has any failure.
    #[must_use]
    pub fn head_failed(&self, ordinal: usize) -> bool {
        self.errors.iter().any(|record| record.ordinal == ordinal)
    }

    /// Process exit status: success only with no errors and at least one
    /// head checked.
    ///
    /// # Examples
    ///
    /// ```
    /// use setupcheck::report::AggregateReport;
    ///
    /// let mut report = AggregateReport::default();
    /// assert_eq!(report.exit_code(), 1);
    /// report.heads_checked = 1;
    /// assert_eq!(report.exit_code(), 0);
    /// ```
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.errors.is_empty() || self.heads_checked == 0)
    }

    /// Writes the summary block.
    pub fn render(&self, out: &mut Output<'_>) {
        let count_style = if self.errors.is_empty() {
            Style::Success
        } else {
            Style::Error
        };
        let count = out.paint(&format!("{} error(s)", self.errors.len()), count_style);
        out.summary("");
        out.summary(format!(
            "Checked {} installer(s), {count}",
            self.heads_checked
        ));
        if self.heads_checked == 0 && !self.interrupted {
            out.summary(out.paint("No installers found", Style::Warning));
        }

        if !self.rar_heads.is_empty() {
            out.summary(format!("RAR installers: {}", self.rar_heads.len()));
            for path in &self.rar_heads {
                out.summary(format!("  {path}"));
            }
        }

        if !self.errors.is_empty() {
            out.summary("Errors:");
            for record in &self.errors {
                let failure = out.paint(&record.failure.to_string(), Style::Error);
                out.summary(format!("  #{} {}: {failure}", record.ordinal, record.path));
            }
        }

        if self.interrupted {
            out.summary(out.paint(
                "Interrupted before all installers were checked",
                Style::Warning,
            ));
        }
    }

    /// Pretty JSON for `--json`.
    ///
    /// # Errors
    ///
    /// Returns a serialisation error; not expected for this type.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::FailureReason;
    use crate::output::OutputMode;
    use rstest::{fixture, rstest};

    #[fixture]
    fn failing() -> AggregateReport {
        let mut report = AggregateReport {
            heads_checked: 2,
            ..AggregateReport::default()
        };
        report.record_failure(
            2,
            Utf8Path::new("dl/setup_b.exe"),
            Failure::with_detail(FailureReason::WrongChecksum, "setup_b-01.bin"),
        );
        report.record_rar_head(Utf8Path::new("dl/setup_a.exe"));
        report.record_rar_head(Utf8Path::new("dl/setup_a.exe"));
        report
    }

    fn rendered(report: &AggregateReport, mode: OutputMode) -> String {
        let mut buf = Vec::new();
        {
            let mut out = Output::new(&mut buf, mode, false);
            report.render(&mut out);
        }
        String::from_utf8(buf).expect("utf-8 output")
    }

    #[rstest]
    #[case::none(0, false, 1)]
    #[case::clean(3, false, 0)]
    #[case::failed(3, true, 1)]
    fn exit_code_requires_heads_and_no_errors(
        #[case] heads: usize,
        #[case] with_error: bool,
        #[case] expected: i32,
    ) {
        let mut report = AggregateReport {
            heads_checked: heads,
            ..AggregateReport::default()
        };
        if with_error {
            report.record_failure(
                1,
                Utf8Path::new("setup_a.exe"),
                Failure::new(FailureReason::ProbeFailed),
            );
        }
        assert_eq!(report.exit_code(), expected);
    }

    #[rstest]
    fn summary_lists_errors_and_rar_heads(failing: AggregateReport) {
        let text = rendered(&failing, OutputMode::Compact);
        assert!(text.contains("Checked 2 installer(s), 1 error(s)"));
        assert!(text.contains("RAR installers: 1"));
        assert!(text.contains("#2 dl/setup_b.exe: wrong checksum (setup_b-01.bin)"));
        assert!(!text.contains("Interrupted"));
    }

    #[rstest]
    fn silent_summary_is_empty(failing: AggregateReport) {
        assert!(rendered(&failing, OutputMode::Silent).is_empty());
    }

    #[test]
    fn interruption_is_noted() {
        let report = AggregateReport {
            heads_checked: 1,
            interrupted: true,
            ..AggregateReport::default()
        };
        assert!(rendered(&report, OutputMode::Normal).contains("Interrupted"));
    }

    #[rstest]
    fn json_flattens_failures(failing: AggregateReport) {
        let json = failing.to_json().expect("serialise report");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");

        assert_eq!(value["heads_checked"], 2);
        assert_eq!(value["error_count"], 1);
        assert_eq!(value["errors"][0]["reason"], "wrong_checksum");
        assert_eq!(value["errors"][0]["detail"], "setup_b-01.bin");
        assert_eq!(value["errors"][0]["path"], "dl/setup_b.exe");
        assert_eq!(value["rar_heads"][0], "dl/setup_a.exe");
        assert_eq!(value["interrupted"], false);
    }

    #[test]
    fn head_failed_matches_ordinal() {
        let mut report = AggregateReport::default();
        report.record_failure(
            3,
            Utf8Path::new("setup_c.exe"),
            Failure::new(FailureReason::SignatureError),
        );
        assert!(report.head_failed(3));
        assert!(!report.head_failed(1));
    }
}
