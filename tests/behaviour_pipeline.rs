//! Behaviour-driven tests for whole verification runs.
//!
//! Scenarios cover discovery, output modes, per-head error attribution and
//! the signature stage driven through a stub executor. Tests use the
//! rstest-bdd v0.5.0 mutable world pattern.

mod support;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use setupcheck::checksum::DigestMode;
use setupcheck::config::Config;
use setupcheck::discovery::{DiscoveryOptions, discover_heads};
use setupcheck::output::{Output, OutputMode};
use setupcheck::pipeline::{RunOptions, StageSelection, Verifier};
use setupcheck::report::AggregateReport;
use setupcheck::test_utils::{ExpectedCall, StubExecutor, output_with};
use support::{Downloads, list};

// ---------------------------------------------------------------------------
// World types
// ---------------------------------------------------------------------------

struct RunWorld {
    downloads: Downloads,
    signature_reply: Option<(String, i32)>,
    report: Option<AggregateReport>,
    output: String,
}

impl Default for RunWorld {
    fn default() -> Self {
        Self {
            downloads: Downloads::new(),
            signature_reply: None,
            report: None,
            output: String::new(),
        }
    }
}

struct RunRequest {
    mode: OutputMode,
    any_executable: bool,
    signature: bool,
}

impl RunWorld {
    fn run(&mut self, request: &RunRequest) {
        let heads = discover_heads(
            &[self.downloads.root().to_owned()],
            &DiscoveryOptions {
                prefix: "setup_".to_owned(),
                any_executable: request.any_executable,
                recursive: false,
            },
        )
        .expect("discovery");

        let calls = match (&self.signature_reply, request.signature) {
            (Some((text, code)), true) => heads
                .iter()
                .map(|head| {
                    ExpectedCall::new(
                        "osslsigncode",
                        &["verify", "-in", head.path().as_str()],
                        Ok(output_with(*code, text)),
                    )
                })
                .collect(),
            _ => Vec::new(),
        };
        let executor = StubExecutor::new(calls);

        let config = Config::default();
        let options = RunOptions {
            stages: StageSelection {
                signature: request.signature,
                checksums: Some(DigestMode::Compute),
                extraction: None,
            },
            unfiltered: false,
            allow_rar: true,
            first_head_only: request.mode == OutputMode::Silent,
        };
        let verifier = Verifier::new(&executor, &config, options);

        let mut sink = Vec::new();
        let report = {
            let mut out = Output::new(&mut sink, request.mode, false);
            let report = verifier.run(&heads, &mut out);
            report.render(&mut out);
            report
        };
        self.output = String::from_utf8(sink).expect("utf-8 output");
        self.report = Some(report);
    }

    fn report(&self) -> &AggregateReport {
        self.report.as_ref().expect("run has finished")
    }
}

#[fixture]
fn world() -> RunWorld {
    RunWorld::default()
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("installers \"{names}\" with matching parts")]
fn given_installers(world: &mut RunWorld, names: String) {
    for name in list(&names) {
        let payload = format!("{name} payload");
        world.downloads.head(&name, &[payload.clone()]);
        world.downloads.part(&name, 1, payload.as_bytes());
    }
}

#[given("part {ordinal} of \"{name}\" is altered")]
fn given_altered_part(world: &mut RunWorld, ordinal: u32, name: String) {
    world.downloads.part(&name, ordinal, b"altered content");
}

#[given("the signature tool prints \"{text}\" and exits with {code}")]
fn given_signature_reply(world: &mut RunWorld, text: String, code: i32) {
    world.signature_reply = Some((format!("{text}\n"), code));
}

#[when("the directory is checked in compact mode")]
fn when_compact(world: &mut RunWorld) {
    world.run(&RunRequest {
        mode: OutputMode::Compact,
        any_executable: false,
        signature: false,
    });
}

#[when("the directory is checked in compact mode accepting any executable")]
fn when_compact_forced(world: &mut RunWorld) {
    world.run(&RunRequest {
        mode: OutputMode::Compact,
        any_executable: true,
        signature: false,
    });
}

#[when("the directory is checked silently")]
fn when_silent(world: &mut RunWorld) {
    world.run(&RunRequest {
        mode: OutputMode::Silent,
        any_executable: false,
        signature: false,
    });
}

#[when("the directory is checked with signatures")]
fn when_with_signatures(world: &mut RunWorld) {
    world.run(&RunRequest {
        mode: OutputMode::Normal,
        any_executable: false,
        signature: true,
    });
}

#[then("{count} installers are checked")]
fn then_installers_checked(world: &mut RunWorld, count: usize) {
    assert_eq!(world.report().heads_checked, count);
}

#[then("installer {ordinal} has error \"{code}\"")]
fn then_installer_error(world: &mut RunWorld, ordinal: usize, code: String) {
    let found = world
        .report()
        .errors
        .iter()
        .any(|record| record.ordinal == ordinal && record.failure.reason.code() == code);
    assert!(found, "{:?}", world.report().errors);
}

#[then("the output contains \"{text}\"")]
fn then_output_contains(world: &mut RunWorld, text: String) {
    assert!(world.output.contains(&text), "{}", world.output);
}

#[then("the output is empty")]
fn then_output_empty(world: &mut RunWorld) {
    assert!(world.output.is_empty(), "{}", world.output);
}

#[then("the exit status is {code}")]
fn then_exit_status(world: &mut RunWorld, code: i32) {
    assert_eq!(world.report().exit_code(), code);
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/pipeline.feature", name = "Every installer is reported")]
fn scenario_every_installer(world: RunWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/pipeline.feature",
    name = "Silent mode checks only the first installer"
)]
fn scenario_silent_mode(world: RunWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/pipeline.feature",
    name = "Executables without the prefix are ignored"
)]
fn scenario_prefix_required(world: RunWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/pipeline.feature",
    name = "Forced discovery accepts any executable"
)]
fn scenario_forced_discovery(world: RunWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/pipeline.feature", name = "Unsigned installer")]
fn scenario_unsigned(world: RunWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/pipeline.feature",
    name = "Tool exit status contradicting its output"
)]
fn scenario_exit_status_disagreement(world: RunWorld) {
    let _ = world;
}
