//! setupcheck CLI entrypoint.
//!
//! Loads the configuration, checks that the external tools exist, discovers
//! installer heads and runs the verification pipeline over them. The exit
//! status is the run's verdict.

use clap::Parser;
use setupcheck::cli::Cli;
use setupcheck::config::Config;
use setupcheck::deps::check_required_tools;
use setupcheck::discovery::{DiscoveryOptions, discover_heads};
use setupcheck::error::{Result, VerifyError};
use setupcheck::exec::{CommandExecutor, SystemCommandExecutor};
use setupcheck::output::Output;
use setupcheck::pipeline::{RunOptions, Verifier};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let cancel = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(&cancel);

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &cancel, &mut stdout);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn init_logging(cli: &Cli) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(cli.log_level());
    if !cli.silent {
        builder.parse_default_env();
    }
    if builder.try_init().is_err() {
        // A logger is already installed; keep it.
    }
}

fn install_interrupt_handler(cancel: &Arc<AtomicBool>) {
    let flag = Arc::clone(cancel);
    if let Err(err) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        log::warn!("cannot install interrupt handler: {err}");
    }
}

fn run(cli: &Cli, cancel: &Arc<AtomicBool>, stdout: &mut dyn Write) -> Result<i32> {
    let config = Config::load(cli.config.as_deref())?;
    let executor = SystemCommandExecutor::with_timeout(tool_timeout(cli, &config));
    let color = !cli.no_color && colored::control::SHOULD_COLORIZE.should_colorize();
    verify(cli, &config, &executor, cancel, color, stdout)
}

/// `--timeout` wins over the configuration; zero disables the deadline.
fn tool_timeout(cli: &Cli, config: &Config) -> Option<Duration> {
    match cli.timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.timeout(),
    }
}

fn verify(
    cli: &Cli,
    config: &Config,
    executor: &dyn CommandExecutor,
    cancel: &Arc<AtomicBool>,
    color: bool,
    stdout: &mut dyn Write,
) -> Result<i32> {
    let stages = cli.stages();
    check_required_tools(executor, &stages, &config.tools)?;

    let discovery = DiscoveryOptions {
        prefix: config.head_prefix.clone(),
        any_executable: cli.force,
        recursive: cli.recursive,
    };
    let heads = discover_heads(&cli.paths, &discovery)?;
    log::info!("found {} installer(s)", heads.len());

    let options = RunOptions {
        stages,
        unfiltered: cli.unfiltered,
        allow_rar: !cli.no_rar,
        first_head_only: cli.silent,
    };
    let verifier = Verifier::new(executor, config, options).with_cancel_flag(Arc::clone(cancel));

    let report = {
        let mut out = Output::new(&mut *stdout, cli.output_mode(), color);
        let report = verifier.run(&heads, &mut out);
        report.render(&mut out);
        report
    };

    if cli.json {
        let json = report.to_json()?;
        writeln!(stdout, "{json}").map_err(|source| VerifyError::WriteFailed { source })?;
    }
    Ok(report.exit_code())
}

fn exit_code_for_run_result(result: Result<i32>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(code) => code,
        Err(err) => {
            write_stderr_line(stderr, format!("setupcheck: {err}"));
            1
        }
    }
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}
