//! FanRunner CLI Entry Point
//!
//! Fans a shell command out over a list of inputs.
//!
//! # Usage
//!
//! ```bash
//! # One unit per line of urls.txt, 8 at a time
//! fanrunner urls.txt --command 'curl -s {input}' --parallel 8
//!
//! # 20 units over offsets 0, 500, 1000, ...
//! fanrunner --generate 20 --chunk-size 500 --command './fetch.sh {input}'
//!
//! # Dry run mode (preview commands)
//! fanrunner inputs.txt --command 'gzip {input}' --dry-run
//!
//! # Concurrency from a YAML file, JSON output
//! fanrunner inputs.txt --config fanout.yaml --json
//! ```

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use log::{error, info, warn};
use serde::Serialize;

use fanrunner::fanout::FanOutConfig;
use fanrunner::{
    AggregateOutcome, ExecutionContext, FanOut, FanOutError, ShellActivity, APP_NAME, VERSION,
};

/// Command run per input when none is specified.
const DEFAULT_COMMAND: &str = "echo {input}";

/// Default distance between generated offsets.
const DEFAULT_CHUNK_SIZE: usize = 1;

/// Where unit inputs come from.
#[derive(Debug, PartialEq)]
enum InputMode {
    /// One input per non-empty line of a file
    File(String),
    /// Offsets `i * chunk_size` for `i` in `0..count`
    Generate { count: usize, chunk_size: usize },
}

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    input_path: Option<String>,
    generate: Option<usize>,
    chunk_size: usize,
    command: String,
    parallel: Option<usize>,
    config_path: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    dry_run: bool,
    json: bool,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: None,
            generate: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            command: DEFAULT_COMMAND.to_string(),
            parallel: None,
            config_path: None,
            working_dir: None,
            dry_run: false,
            json: false,
            verbose: false,
        }
    }
}

impl Config {
    /// Resolves the input file / generator options into one source.
    fn input_mode(&self) -> Result<InputMode, String> {
        match (&self.input_path, self.generate) {
            (Some(path), None) => Ok(InputMode::File(path.clone())),
            (None, Some(count)) => {
                if count.saturating_sub(1).checked_mul(self.chunk_size).is_none() {
                    return Err(format!(
                        "--generate {} with --chunk-size {} overflows the largest offset",
                        count, self.chunk_size
                    ));
                }
                Ok(InputMode::Generate {
                    count,
                    chunk_size: self.chunk_size,
                })
            }
            (Some(_), Some(_)) => {
                Err("Give either an input file or --generate, not both".to_string())
            }
            (None, None) => Err("No inputs: give an input file or --generate N".to_string()),
        }
    }
}

/// Machine-readable form of an outcome.
#[derive(Serialize)]
struct Report<'a> {
    outputs: &'a [String],
    failures: Vec<FailureReport>,
    elapsed_ms: u128,
}

#[derive(Serialize)]
struct FailureReport {
    index: usize,
    error: String,
}

impl<'a> Report<'a> {
    fn from_outcome(outcome: &'a AggregateOutcome<String>) -> Self {
        let failures = outcome
            .error()
            .map(|e| {
                e.errors()
                    .iter()
                    .map(|unit| FailureReport {
                        index: unit.index,
                        error: unit.failure.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            outputs: outcome.outputs(),
            failures,
            elapsed_ms: outcome.timeline().elapsed().as_millis(),
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Bounded-Concurrency Fan-out Runner");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: fanrunner [OPTIONS] <INPUT_FILE>");
    println!("       fanrunner [OPTIONS] --generate N [--chunk-size S]");
    println!();
    println!("Arguments:");
    println!("  <INPUT_FILE>        File with one input per line");
    println!();
    println!("Options:");
    println!("  --command CMD       Command template, {{input}} is replaced (default: \"{}\")", DEFAULT_COMMAND);
    println!("  --generate N        Generate N inputs instead of reading a file");
    println!("  --chunk-size S      Distance between generated offsets (default: {})", DEFAULT_CHUNK_SIZE);
    println!("  --parallel N        Maximum outstanding units (default: {})", fanrunner::fanout::DEFAULT_CONCURRENCY);
    println!("  --config PATH       YAML configuration file");
    println!("  --working-dir PATH  Directory commands run in");
    println!("  --dry-run           Preview commands without execution");
    println!("  --json              Print the outcome as JSON");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  fanrunner hosts.txt --command 'ping -c1 {{input}}'");
    println!("  fanrunner --generate 10 --chunk-size 1000 --command './page.sh {{input}}' --parallel 4");
}

/// Returns the value following the option at `i`.
fn option_value<'a>(args: &'a [String], i: &mut usize, option: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires an argument", option))
}

fn parse_number(value: &str, option: &str) -> Result<usize, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid {} value: {}", option, value))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--dry-run" => {
                config.dry_run = true;
            }
            "--json" => {
                config.json = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--command" => {
                config.command = option_value(args, &mut i, "--command")?.to_string();
            }
            "--generate" => {
                let value = option_value(args, &mut i, "--generate")?;
                config.generate = Some(parse_number(value, "--generate")?);
            }
            "--chunk-size" => {
                let value = option_value(args, &mut i, "--chunk-size")?;
                config.chunk_size = parse_number(value, "--chunk-size")?;
            }
            "--parallel" => {
                let value = option_value(args, &mut i, "--parallel")?;
                config.parallel = Some(parse_number(value, "--parallel")?);
            }
            "--config" => {
                config.config_path = Some(PathBuf::from(option_value(args, &mut i, "--config")?));
            }
            "--working-dir" => {
                config.working_dir =
                    Some(PathBuf::from(option_value(args, &mut i, "--working-dir")?));
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.input_path.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.input_path = Some(arg.clone());
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Validates the directory commands run in.
fn setup_working_directory(
    working_dir: Option<PathBuf>,
) -> Result<Option<PathBuf>, Box<dyn std::error::Error>> {
    let Some(dir) = working_dir else {
        let current = env::current_dir()?;
        info!("Working directory: {}", current.display());
        return Ok(None);
    };

    if !dir.exists() {
        return Err(format!("Working directory does not exist: {}", dir.display()).into());
    }

    if !dir.is_dir() {
        return Err(format!("Path is not a directory: {}", dir.display()).into());
    }

    info!("Working directory: {}", dir.display());
    Ok(Some(dir))
}

/// Reads one input per non-empty line.
fn read_inputs(path: &str) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read input file '{}': {}", path, e))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Merges the configuration file (if any) with command-line overrides.
fn resolve_fan_out_config(config: &Config) -> Result<FanOutConfig, FanOutError> {
    let mut fan_out_config = match &config.config_path {
        Some(path) => FanOutConfig::load(path)?,
        None => FanOutConfig::default(),
    };

    if let Some(parallel) = config.parallel {
        fan_out_config = fan_out_config.with_concurrency(parallel);
    }

    fan_out_config.validate()?;
    Ok(fan_out_config)
}

/// Starts the fan-out, waits for it and reports the outcome.
///
/// Returns true if every unit succeeded.
async fn execute<T>(
    fan_out: FanOut<T, String>,
    ctx: &ExecutionContext,
    json: bool,
    verbose: bool,
) -> Result<bool, Box<dyn std::error::Error>>
where
    T: Clone + Send + Sync + 'static,
{
    let handle = fan_out.start(ctx)?;
    info!("Launched fan-out of {} units", handle.total());

    let outcome = handle.get().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&Report::from_outcome(&outcome))?);
        return Ok(outcome.is_success());
    }

    let failed = outcome
        .error()
        .map(|e| e.failed_indices())
        .unwrap_or_default();

    println!();
    for (index, output) in outcome.outputs().iter().enumerate() {
        if failed.binary_search(&index).is_err() {
            println!("[{}] {}", index, output);
        }
    }

    if let Some(e) = outcome.error() {
        println!();
        println!("Failed units ({}):", e.len());
        for unit in e.errors() {
            println!("  [{}] {}", unit.index, unit.failure);
        }
    }

    if verbose {
        println!();
        println!("{}", outcome.timeline().gantt_chart());
    }

    Ok(outcome.is_success())
}

/// Main application entry point.
///
/// Returns true if every unit succeeded.
fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;
    let input_mode = config.input_mode()?;

    // Setup logging
    setup_logging(config.verbose);

    if !config.json {
        print_banner();
    }

    if config.dry_run {
        info!("Mode: DRY RUN (commands will not execute)");
    }

    let fan_out_config = resolve_fan_out_config(&config)?;
    info!("Concurrency: {}", fan_out_config.concurrency);

    let mut activity = ShellActivity::new(&config.command).with_dry_run(config.dry_run);
    if let Some(dir) = setup_working_directory(config.working_dir.clone())? {
        activity = activity.with_working_dir(dir);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let ctx = ExecutionContext::new(runtime.handle().clone());

    // Ctrl-C cancels the fan-out
    let interrupt = ctx.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling outstanding units");
            interrupt.cancel();
        }
    });

    let succeeded = match input_mode {
        InputMode::File(path) => {
            let inputs = read_inputs(&path)?;
            info!("Loaded {} inputs from {}", inputs.len(), path);
            let fan_out = FanOut::<String, String>::new(activity)
                .with_config(fan_out_config)
                .with_inputs(inputs);
            runtime.block_on(execute(fan_out, &ctx, config.json, config.verbose))
        }
        InputMode::Generate { count, chunk_size } => {
            info!("Generating {} offsets (chunk size: {})", count, chunk_size);
            let fan_out = FanOut::<usize, String>::new(activity)
                .with_config(fan_out_config)
                .with_generator(count, move |i| i * chunk_size);
            runtime.block_on(execute(fan_out, &ctx, config.json, config.verbose))
        }
    }
    .map_err(|e| {
        error!("Fan-out failed: {}", e);
        e
    })?;

    Ok(succeeded)
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
