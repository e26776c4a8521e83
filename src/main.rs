use clap::Parser;

use imagegen_daemon::cli::Cli;
use imagegen_daemon::client::JobClient;
use imagegen_daemon::config::{ClientConfig, WorkerConfig};
use imagegen_daemon::engine::{ProceduralEngine, SynthesisEngine};
use imagegen_daemon::error::{DaemonError, ErrorCode, Result};
use imagegen_daemon::worker::{serve, AppState};
use imagegen_daemon::{codec, pipeline};

fn main() {
    let cli = Cli::parse();

    let outcome = if cli.serve {
        run_serve()
    } else if cli.local {
        run_local(&cli)
    } else {
        run_remote(&cli)
    };

    if let Err(e) = outcome {
        eprintln!("[imagegen] Error: {}", e);
        std::process::exit(1);
    }
}

/// Worker mode: serve the HTTP protocol until killed.
fn run_serve() -> Result<()> {
    let config = WorkerConfig::from_env();
    let state = AppState::new(Box::new(ProceduralEngine::new()), &config);

    let runtime = tokio::runtime::Runtime::new().map_err(|e| {
        DaemonError::with_source(ErrorCode::Transport, "Failed to start async runtime", e)
    })?;
    runtime.block_on(serve(state, &config.bind_addr))
}

/// Local mode: generate in-process and save the PNG.
fn run_local(cli: &Cli) -> Result<()> {
    let config = cli.to_generation_config()?;
    let mut engine = ProceduralEngine::new();

    let caps = engine.capabilities();
    let plan = pipeline::compose(&config, &caps)?;
    let (image, warnings) = pipeline::run(&mut engine, &plan)?;
    for warning in &warnings {
        eprintln!("[imagegen] Warning: {}", warning);
    }

    image.save(&cli.output).map_err(|e| {
        DaemonError::with_source(
            ErrorCode::ImageCodec,
            format!("Failed to save {}", cli.output.display()),
            e,
        )
    })?;
    eprintln!("[imagegen] Saved {}", cli.output.display());
    Ok(())
}

/// Client mode: submit to the configured endpoint, poll, save the PNG.
fn run_remote(cli: &Cli) -> Result<()> {
    let config = ClientConfig::from_env()?;
    let input = cli.to_request_input()?;
    let mut client = JobClient::new(config)?;

    let result = client.generate(&input)?;
    let image = codec::decode_image(&result.image)?;
    image.save(&cli.output).map_err(|e| {
        DaemonError::with_source(
            ErrorCode::ImageCodec,
            format!("Failed to save {}", cli.output.display()),
            e,
        )
    })?;
    eprintln!(
        "[imagegen] Saved {} ({}x{}, seed {:?})",
        cli.output.display(),
        result.width,
        result.height,
        result.seed
    );
    Ok(())
}
