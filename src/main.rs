//! infiniband-sensor
//!
//! InfiniBand port counter sampler with tracing logging.
//! This is the main entry point that parses the command line and runs the
//! polling loop, the Prometheus server or one of the utility subcommands.

mod commands;
mod handlers;
mod metrics;
mod state;

use axum::{routing::get, Router};
use clap::Parser;
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::{net::TcpListener, signal};
use tracing::{debug, error, info, Level};

use infiniband_sensor::cli::{Args, Commands, LogLevel};
use infiniband_sensor::config::{render_config, resolve_config, validate_effective_config};
use infiniband_sensor::{Config, SensorModule, ShellCounterSource};

use commands::{command_config, command_descriptors, command_poll, command_test};
use handlers::{metrics_handler, root_handler};
use metrics::SensorMetrics;
use state::AppState;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    if matches!(args.log_level, LogLevel::Off) {
        return;
    }

    let log_level = match args.log_level {
        LogLevel::Off | LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    // Poll mode prints metric values on stdout
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    debug!("Logging initialized with level: {:?}", args.log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Serves `/` and `/metrics` until a shutdown signal arrives.
async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting infiniband-sensor exporter");

    let registry = Registry::new();
    let metrics = SensorMetrics::new(&registry, &config.group)?;
    debug!("All metrics registered successfully");

    // Performs the initial refresh and registers the descriptors
    let source = Arc::new(ShellCounterSource::from_config(&config));
    let module = SensorModule::init(&config, source).await?;

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;

    let state = Arc::new(AppState {
        registry,
        metrics,
        module: Arc::new(module),
        config: Arc::new(config),
        start_time: Instant::now(),
    });

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state.clone());

    let listener = TcpListener::bind(addr).await?;
    info!("infiniband-sensor listening on http://{}", addr);

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, exiting...");
        }
    }

    state.module.cleanup();
    info!("infiniband-sensor stopped gracefully");
    Ok(())
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        print!("{}", render_config(&config, args.config_format)?);
        return Ok(());
    }

    // Config generation doesn't need a valid effective config
    if let Some(Commands::Config {
        output,
        format,
        commented,
    }) = &args.command
    {
        return command_config(output.clone(), *format, *commented);
    }

    let config = load_validated_config(&args)?;
    setup_logging(&args);

    match &args.command {
        None => command_poll(None, &config).await?,
        Some(Commands::Poll { iterations }) => command_poll(*iterations, &config).await?,
        Some(Commands::Serve { .. }) => serve(config).await?,
        Some(Commands::Descriptors { format }) => command_descriptors(*format, &config).await?,
        Some(Commands::Test { verbose }) => command_test(*verbose, &config).await?,
        Some(Commands::Config { .. }) => unreachable!("Config handled above"),
    }

    Ok(())
}
