// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use streamboot_config::{BootStatus, StopReason, SystemConfig, TestAssertion, TestScript};
use streamboot_core::demo::{hello_image, HELLO_MESSAGE};
use streamboot_core::harness::{BootReport, StreamingBootBench};
use streamboot_core::peripherals::i3c::I3cCounters;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a test script and evaluate its assertions
    Test(TestArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Boot image to stream (ELF or raw binary)
    #[arg(short, long, conflicts_with = "demo")]
    image: Option<PathBuf>,

    /// Stream the built-in hello image instead of a file
    #[arg(long)]
    demo: bool,

    /// Path to the system description (YAML)
    #[arg(short, long)]
    system: Option<PathBuf>,

    /// Enable per-transition tracing
    #[arg(short, long)]
    trace: bool,

    /// Instruction budget for the booted image
    #[arg(long, default_value = "20000")]
    max_steps: u64,

    /// Unsatisfied polls tolerated at any wait point
    #[arg(long)]
    poll_limit: Option<u64>,
}

#[derive(Args, Debug)]
struct TestArgs {
    /// Test script (YAML)
    #[arg(long)]
    script: PathBuf,

    /// Directory that receives result.json
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Do not copy console UART output to stdout
    #[arg(long)]
    no_uart_stdout: bool,

    /// Enable per-transition tracing
    #[arg(short, long)]
    trace: bool,
}

fn init_tracing(trace: bool) {
    let level = if trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn load_system(path: Option<&Path>) -> Result<SystemConfig> {
    match path {
        Some(path) => {
            info!("Loading system config: {:?}", path);
            SystemConfig::from_file(path)
        }
        None => {
            info!("Using default SoC configuration");
            Ok(SystemConfig::default())
        }
    }
}

fn image_hash(image: &[u8]) -> String {
    Sha256::digest(image)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn set_uart_echo(bench: &mut StreamingBootBench, echo: bool) {
    if let Some(uart) = bench.machine.bus.uart_mut() {
        uart.set_echo(echo);
    }
}

fn log_report(report: &BootReport) {
    info!("Boot status: {:?}", report.status);
    info!("Initiator: {:?}", report.initiator);
    if let Some(run) = &report.run {
        info!("Image stopped: {:?} after {} steps", run.stop_reason, run.steps);
    }
    let c = &report.i3c;
    info!(
        "I3C: {} words pushed, {} popped, {} overflows, {} underflows",
        c.words_pushed, c.words_popped, c.overflows, c.underflows
    );
}

fn run(args: RunArgs) -> Result<ExitCode> {
    init_tracing(args.trace);
    info!("Starting StreamBoot");

    let config = load_system(args.system.as_deref())?;

    let image = match (&args.image, args.demo) {
        (Some(path), _) => {
            info!("Loading boot image: {:?}", path);
            streamboot_loader::load_boot_image(path)?
        }
        (None, true) => hello_image(HELLO_MESSAGE, config.soc.uart_base as u32),
        (None, false) => bail!("Either --image or --demo is required"),
    };
    info!("Image: {} bytes, sha256 {}", image.len(), image_hash(&image));

    let mut bench = StreamingBootBench::from_config(&config, args.poll_limit, args.max_steps)?;
    set_uart_echo(&mut bench, true);

    let report = bench.run(&image)?;
    log_report(&report);

    Ok(if report.status == BootStatus::Successful {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[derive(Debug, Serialize)]
struct AssertionResult {
    assertion: TestAssertion,
    passed: bool,
}

#[derive(Debug, Serialize)]
struct ResultConfig {
    script: String,
    image: String,
    system: Option<String>,
    max_steps: u64,
    poll_limit: Option<u64>,
}

#[derive(Debug, Serialize)]
struct TestResult {
    status: &'static str,
    boot_status: BootStatus,
    initiator: String,
    stop_reason: Option<StopReason>,
    steps: u64,
    image_hash: String,
    image_len: usize,
    staged_len: usize,
    uart: String,
    i3c: I3cCounters,
    status_history: Vec<u32>,
    assertions: Vec<AssertionResult>,
    config: ResultConfig,
}

fn evaluate(assertion: &TestAssertion, report: &BootReport) -> bool {
    match assertion {
        TestAssertion::UartContains(a) => report.uart.contains(&a.uart_contains),
        TestAssertion::ExpectedStatus(a) => report.status == a.expected_status,
        TestAssertion::ExpectedStopReason(a) => report.stop_reason() == Some(a.expected_stop_reason),
    }
}

/// Script inputs are relative to the script's directory.
fn resolve(base: &Path, input: &str) -> PathBuf {
    let path = Path::new(input);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn run_test(args: TestArgs) -> Result<ExitCode> {
    init_tracing(args.trace);

    let script = TestScript::from_file(&args.script)?;
    let base_dir = args.script.parent().unwrap_or_else(|| Path::new("."));
    let image_path = resolve(base_dir, &script.inputs.image);
    let system_path = script.inputs.system.as_deref().map(|s| resolve(base_dir, s));

    let config = load_system(system_path.as_deref())?;
    let image = streamboot_loader::load_boot_image(&image_path)?;

    let mut bench =
        StreamingBootBench::from_config(&config, script.limits.poll_limit, script.limits.max_steps)?;
    set_uart_echo(&mut bench, !args.no_uart_stdout);

    let report = bench.run(&image)?;
    log_report(&report);

    let assertions: Vec<AssertionResult> = script
        .assertions
        .iter()
        .map(|assertion| {
            let passed = evaluate(assertion, &report);
            if !passed {
                warn!("Assertion failed: {:?}", assertion);
            }
            AssertionResult {
                assertion: assertion.clone(),
                passed,
            }
        })
        .collect();
    let passed = assertions.iter().all(|a| a.passed);

    let result = TestResult {
        status: if passed { "pass" } else { "fail" },
        boot_status: report.status,
        initiator: format!("{:?}", report.initiator).to_lowercase(),
        stop_reason: report.stop_reason(),
        steps: report.run.as_ref().map_or(0, |r| r.steps),
        image_hash: image_hash(&image),
        image_len: report.image_len,
        staged_len: report.staged_len,
        uart: report.uart.clone(),
        i3c: report.i3c,
        status_history: report.status_history.clone(),
        assertions,
        config: ResultConfig {
            script: args.script.display().to_string(),
            image: image_path.display().to_string(),
            system: system_path.map(|p| p.display().to_string()),
            max_steps: script.limits.max_steps,
            poll_limit: script.limits.poll_limit,
        },
    };

    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {:?}", dir))?;
        let path = dir.join("result.json");
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
        info!("Wrote {:?}", path);
    }

    info!("Test {}", result.status);
    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Test(args)) => run_test(args),
        None => run(cli.run),
    }
}
