//! Tests for payload probing and test extraction.

use super::*;
use crate::error::VerifyError;
use crate::output::OutputMode;
use crate::test_utils::{ExpectedCall, StubExecutor, failure_output, output_with, success_output};
use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::TempDir;

const LISTING: &str = "\
Target: Game
Listing \"Game\" - setup data version 5.5.7
 - \"app/game.exe\" (1.5 KiB) [md5:0123456789abcdef0123456789abcdef]
 - \"app/data 2 MiB.pak\" (3 MiB) [sha1:0123456789abcdef0123456789abcdef01234567]
Done.
";

const LISTING_WITHOUT_CHECKSUM: &str = "\
 - \"app/game.exe\" (10 bytes) [md5:0123456789abcdef0123456789abcdef]
 - \"app/readme.txt\" (20 bytes)
";

const PROBE: [&str; 3] = ["--list", "--list-sizes", "--list-checksums"];

struct Installer {
    _temp: TempDir,
    head: InstallerHead,
}

#[fixture]
fn installer() -> Installer {
    let temp = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_owned()).expect("utf-8 temp dir");
    let path = root.join("setup_game.exe");
    std::fs::write(&path, b"MZ").expect("write head");
    Installer {
        _temp: temp,
        head: InstallerHead::new(path),
    }
}

impl Installer {
    fn with_rar_part(self) -> Self {
        let part = self.head.directory().join("setup_game-01.bin");
        std::fs::write(part, b"Rar!\x1a\x07\x01\x00payload").expect("write part");
        self
    }

    fn arg(&self) -> String {
        self.head.path().to_string()
    }

    fn probe_call(&self, result: crate::error::Result<std::process::Output>) -> ExpectedCall {
        let mut args: Vec<String> = PROBE.iter().map(|arg| (*arg).to_owned()).collect();
        args.push(self.arg());
        ExpectedCall::new("innoextract", args.as_slice(), result)
    }
}

fn settings(mode: ExtractionMode, allow_rar: bool) -> ExtractionSettings {
    ExtractionSettings {
        tool: "innoextract".to_owned(),
        rar_helper: "unrar".to_owned(),
        mode,
        allow_rar,
    }
}

fn run(
    executor: &StubExecutor,
    head: &InstallerHead,
    settings: &ExtractionSettings,
) -> (ExtractionReport, String) {
    let mut buf = Vec::new();
    let report = {
        let mut out = Output::new(&mut buf, OutputMode::Normal, false);
        check_extraction(executor, head, settings, &mut out)
    };
    executor.assert_finished();
    (report, String::from_utf8(buf).expect("utf-8 output"))
}

fn reasons(report: &ExtractionReport) -> Vec<FailureReason> {
    report.failures().map(|failure| failure.reason).collect()
}

#[test]
fn listing_totals_are_parsed() {
    let summary = ProbeSummary::parse(LISTING);
    assert_eq!(
        summary,
        ProbeSummary {
            files: 2,
            total_bytes: 1536 + 3 * 1024 * 1024,
            md5: 1,
            sha1: 1,
        }
    );
}

#[test]
fn missing_checksum_is_detected() {
    let summary = ProbeSummary::parse(LISTING_WITHOUT_CHECKSUM);
    assert_eq!(summary.files, 2);
    assert_eq!(summary.total_bytes, 30);
    assert!(!summary.checksums_complete());
}

#[rstest]
#[case::bytes("(512 B)", Some(512))]
#[case::fraction("(0.25 KiB)", Some(256))]
#[case::gib("(2 GiB)", Some(2 << 30))]
#[case::unknown_unit("(3 parsecs)", None)]
#[case::no_number("(KiB)", None)]
fn sizes_are_scaled(#[case] attributes: &str, #[case] expected: Option<u64>) {
    assert_eq!(parse_size(attributes), expected);
}

#[rstest]
fn probe_only_runs_the_listing(installer: Installer) {
    let executor = StubExecutor::new(vec![installer.probe_call(Ok(output_with(0, LISTING)))]);
    let (report, text) = run(
        &executor,
        &installer.head,
        &settings(ExtractionMode::ProbeOnly, true),
    );
    assert_eq!(report.outcomes, vec![CheckOutcome::Passed]);
    assert!(text.contains("2 file(s)"));
    assert!(!report.rar_parts);
}

#[rstest]
fn probe_failure_ends_the_stage(installer: Installer) {
    let executor = StubExecutor::new(vec![
        installer.probe_call(Ok(failure_output("Not a supported Inno Setup installer!"))),
    ]);
    let (report, _) = run(&executor, &installer.head, &settings(ExtractionMode::Full, true));
    assert_eq!(reasons(&report), vec![FailureReason::ProbeFailed]);
    let detail = report.outcomes[0].failure().and_then(|f| f.detail.clone());
    assert_eq!(detail.as_deref(), Some("Not a supported Inno Setup installer!"));
}

#[rstest]
fn probe_timeout_is_probe_failure(installer: Installer) {
    let executor = StubExecutor::new(vec![installer.probe_call(Err(VerifyError::ToolTimeout {
        tool: "innoextract".to_owned(),
        seconds: 1,
    }))]);
    let (report, _) = run(
        &executor,
        &installer.head,
        &settings(ExtractionMode::ProbeOnly, true),
    );
    assert_eq!(reasons(&report), vec![FailureReason::ProbeFailed]);
}

#[rstest]
fn incomplete_checksums_continue_to_extraction(installer: Installer) {
    let arg = installer.arg();
    let executor = StubExecutor::new(vec![
        installer.probe_call(Ok(output_with(0, LISTING_WITHOUT_CHECKSUM))),
        ExpectedCall::new("innoextract", &["--test", arg.as_str()], Ok(success_output())),
    ]);
    let (report, _) = run(&executor, &installer.head, &settings(ExtractionMode::Full, true));
    assert_eq!(reasons(&report), vec![FailureReason::ChecksumInfoMismatch]);
    assert_eq!(report.outcomes.len(), 2);
}

#[rstest]
fn corrupt_payload_fails_extraction(installer: Installer) {
    let arg = installer.arg();
    let executor = StubExecutor::new(vec![
        installer.probe_call(Ok(output_with(0, LISTING))),
        ExpectedCall::new(
            "innoextract",
            &["--test", arg.as_str()],
            Ok(failure_output("Stream error: checksum mismatch\n")),
        ),
    ]);
    let (report, _) = run(&executor, &installer.head, &settings(ExtractionMode::Full, true));
    assert_eq!(reasons(&report), vec![FailureReason::ExtractionFailed]);
}

#[rstest]
fn rar_installers_extract_with_gog_mode(installer: Installer) {
    let installer = installer.with_rar_part();
    let arg = installer.arg();
    let executor = StubExecutor::new(vec![
        installer.probe_call(Ok(output_with(0, LISTING))),
        ExpectedCall::new("unrar", &["--version"], Ok(failure_output("usage"))),
        ExpectedCall::new(
            "innoextract",
            &["--test", "--gog", arg.as_str()],
            Ok(success_output()),
        ),
    ]);
    let (report, text) = run(&executor, &installer.head, &settings(ExtractionMode::Full, true));
    assert!(report.rar_parts);
    assert!(reasons(&report).is_empty());
    assert!(text.contains("rar parts detected"));
}

#[rstest]
fn rar_part_after_a_plain_first_part_is_detected(installer: Installer) {
    let dir = installer.head.directory().to_owned();
    std::fs::write(dir.join("setup_game-01.bin"), b"plain slice").expect("write part");
    std::fs::write(dir.join("setup_game-02.bin"), b"Rar!\x1a\x07\x00payload").expect("write part");
    let executor = StubExecutor::new(vec![installer.probe_call(Ok(output_with(0, LISTING)))]);
    let (report, _) = run(&executor, &installer.head, &settings(ExtractionMode::ProbeOnly, true));
    assert!(report.rar_parts);
}

#[rstest]
fn rar_extraction_skipped_when_disabled(installer: Installer) {
    let installer = installer.with_rar_part();
    let executor = StubExecutor::new(vec![installer.probe_call(Ok(output_with(0, LISTING)))]);
    let (report, text) = run(&executor, &installer.head, &settings(ExtractionMode::Full, false));
    assert!(reasons(&report).is_empty());
    assert!(matches!(report.outcomes.last(), Some(CheckOutcome::Skipped(_))));
    assert!(text.contains("extraction skipped"));
}

#[rstest]
fn rar_extraction_skipped_without_helper(installer: Installer) {
    let installer = installer.with_rar_part();
    let executor = StubExecutor::new(vec![
        installer.probe_call(Ok(output_with(0, LISTING))),
        ExpectedCall::new(
            "unrar",
            &["--version"],
            Err(VerifyError::ToolNotFound {
                tool: "unrar".to_owned(),
            }),
        ),
    ]);
    let (report, _) = run(&executor, &installer.head, &settings(ExtractionMode::Full, true));
    assert_eq!(
        report.outcomes.last(),
        Some(&CheckOutcome::Skipped("unrar not available".to_owned()))
    );
}
