//! hookshort binary: extract a song's hook and optionally render a short.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hookshort_models::{EffectRequest, PipelineConfig};
use hookshort_pipeline::{config, Pipeline, ProcessOutcome, ProcessRequest};

#[derive(Parser, Debug)]
#[command(name = "hookshort")]
#[command(about = "Extract the hook of a song and turn it into a vertical short video")]
#[command(version)]
struct Cli {
    /// Audio track to extract the hook from
    #[arg(required_unless_present = "print_config")]
    input: Option<PathBuf>,

    /// Output file (defaults to <stem>_hook.<ext> or <stem>_short.mp4 next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Hook length in seconds
    #[arg(short = 'l', long = "length", value_name = "SECONDS")]
    hook_length: Option<f64>,

    /// Background video to compose with the hook
    #[arg(short, long, conflicts_with = "image")]
    background: Option<PathBuf>,

    /// Still image to compose with the hook
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Target platform preset (tiktok, reels, youtube, ...)
    #[arg(short, long)]
    platform: Option<String>,

    /// Effect to apply after composition, in order (repeatable)
    ///
    /// text=<TEXT>[@position], watermark=<PATH>[@position[:scale]],
    /// speed=<FACTOR>, fade=<IN>[:<OUT>]
    #[arg(long = "effect", value_name = "SPEC")]
    effects: Vec<EffectRequest>,

    /// JSON array of effects, applied before any --effect
    #[arg(long, value_name = "FILE")]
    effects_file: Option<PathBuf>,

    /// JSON configuration file (overrides HOOKSHORT_CONFIG)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => bail_out(e),
    };

    if cli.print_config {
        match serde_json::to_string_pretty(&config) {
            Ok(json) => println!("{}", json),
            Err(e) => bail_out(e.into()),
        }
        return;
    }

    let request = match build_request(&cli) {
        Ok(request) => request,
        Err(e) => bail_out(e),
    };

    let pipeline = Pipeline::with_ffmpeg(config);
    match pipeline.process(&request).await {
        Ok(outcome) => {
            info!(output = %outcome.output.display(), "Done");
            report(&outcome);
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Colored output for interactive use, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "hookshort=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    config::load(path).context("Failed to load configuration")
}

fn build_request(cli: &Cli) -> Result<ProcessRequest> {
    let input = cli
        .input
        .clone()
        .context("An input audio file is required")?;

    let mut request = ProcessRequest::new(input);
    if let Some(output) = &cli.output {
        request = request.with_output(output);
    }
    if let Some(length) = cli.hook_length {
        request = request.with_hook_length(length);
    }
    if let Some(background) = &cli.background {
        request = request.with_background(background);
    }
    if let Some(image) = &cli.image {
        request = request.with_image(image);
    }
    if let Some(platform) = &cli.platform {
        request = request.with_platform(platform);
    }

    let mut effects = match &cli.effects_file {
        Some(path) => read_effects_file(path)?,
        None => Vec::new(),
    };
    effects.extend(cli.effects.iter().cloned());

    Ok(request.with_effects(effects))
}

fn read_effects_file(path: &Path) -> Result<Vec<EffectRequest>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read effects file {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse effects file {}", path.display()))
}

fn report(outcome: &ProcessOutcome) {
    println!("{}", outcome.output.display());
    println!("  hook:     {} ({})", outcome.hook.window, outcome.hook.source);
    println!("  duration: {:.2}s", outcome.duration);
    if let Some(platform) = &outcome.platform {
        println!("  platform: {}", platform);
    }
    if let Some(warning) = &outcome.hook.short_track {
        println!("  warning:  {}", warning);
    }
}

fn bail_out(err: anyhow::Error) -> ! {
    error!("{:#}", err);
    eprintln!("error: {:#}", err);
    std::process::exit(1);
}
