use anyhow::{Context, Result};
use clap::Parser;
use codescan::{
    DeviceCatalog, EngineKind, EventBus, EventFilter, EventReceiver, HttpReporter, MediaPlatform,
    MockPlatform, ScanMode, ScanSessionController, ScanState, ScannerConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "codescan")]
#[command(about = "Scan QR codes and barcodes from a camera or image and report them to a backend")]
#[command(version)]
#[command(long_about = "Opens a camera, decodes the first QR code or 1-D barcode of the \
selected mode and posts it to the configured backend. A still image can be decoded \
instead with --image when no camera is available.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "codescan.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long, help = "Print the effective configuration in TOML format and exit")]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without scanning")]
    validate_config: bool,

    /// List capture devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Scan mode: qrcode, barcode-ean or barcode-all
    #[arg(short, long, value_name = "MODE")]
    mode: Option<ScanMode>,

    /// Decode engine: continuous or still
    #[arg(short, long, value_name = "ENGINE")]
    engine: Option<EngineKind>,

    /// Decode this image file instead of opening a camera
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = init_logging(&args)?;

    info!("Starting codescan v{}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration file: {}", args.config);

    let mut config = ScannerConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;

    if let Some(mode) = args.mode {
        config.camera.default_mode = mode;
    }
    if let Some(engine) = args.engine {
        config.engine.kind = engine;
    }

    if args.print_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    config.validate().context("Invalid configuration")?;

    if args.list_devices {
        return list_devices().await;
    }

    let event_bus = Arc::new(if args.debug {
        EventBus::with_debug_logging(config.system.event_bus_capacity)
    } else {
        EventBus::new(config.system.event_bus_capacity)
    });
    spawn_event_logger(&event_bus);

    let reporter = Arc::new(HttpReporter::new(config.reporter.clone())?);
    let mode = config.camera.default_mode;

    let exit_code = match args.image {
        Some(path) => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let platform: Arc<dyn MediaPlatform> = Arc::new(MockPlatform::new(Vec::new()));
            let controller = ScanSessionController::new(platform, config, reporter, event_bus);
            decode_file(&controller, mode, bytes).await
        }
        None => {
            let controller =
                ScanSessionController::new(camera_platform()?, config, reporter, event_bus);
            scan_live(&controller, mode).await?
        }
    };

    info!("codescan exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

async fn decode_file(controller: &ScanSessionController, mode: ScanMode, bytes: Vec<u8>) -> i32 {
    match controller.decode_image(mode, bytes).await {
        Ok(_) => print_outcome(&controller.state()),
        Err(e) => {
            let message = e
                .kind()
                .map(|k| k.user_message().to_string())
                .unwrap_or_else(|| e.to_string());
            eprintln!("✗ {}", message);
            1
        }
    }
}

/// Scan until a code has been reported, the attempt fails or ctrl-c
async fn scan_live(controller: &Arc<ScanSessionController>, mode: ScanMode) -> Result<i32> {
    let mut states = controller.subscribe_state();

    if let Err(e) = controller.start(mode).await {
        error!("Failed to start scanning: {}", e);
        return Ok(print_outcome(&controller.state()));
    }

    let still = controller.config().engine.kind == EngineKind::Still;
    if still {
        println!("Press Enter to capture a frame");
    } else {
        println!("Scanning for {}... (ctrl-c to stop)", mode);
    }
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; stopping scan");
                controller.shutdown().await;
                return Ok(130);
            }
            line = lines.next_line(), if still => {
                match line {
                    Ok(Some(_)) => {
                        if let Err(e) = controller.capture().await {
                            let message = e
                                .kind()
                                .map(|k| k.user_message().to_string())
                                .unwrap_or_else(|| e.to_string());
                            println!("{}", message);
                        }
                    }
                    Ok(None) => {
                        controller.shutdown().await;
                        return Ok(1);
                    }
                    Err(e) => warn!("Failed to read stdin: {}", e),
                }
            }
            changed = states.changed() => {
                changed.context("Scan controller went away")?;
            }
        }

        let state = states.borrow_and_update().clone();
        match &state {
            ScanState::Detected {
                outcome: Some(_), ..
            }
            | ScanState::Error { .. } => {
                controller.shutdown().await;
                return Ok(print_outcome(&state));
            }
            _ => {}
        }
    }
}

fn print_outcome(state: &ScanState) -> i32 {
    match state {
        ScanState::Detected {
            result,
            outcome: Some(outcome),
        } => {
            println!("{} ({}): {}", result.format, result.source, result.text);
            if outcome.success {
                println!("✓ {}", outcome.message);
                0
            } else {
                println!("✗ {}", outcome.message);
                2
            }
        }
        ScanState::Error { message, .. } => {
            eprintln!("✗ {}", message);
            1
        }
        other => {
            eprintln!("Scan ended while {}", other.name());
            1
        }
    }
}

async fn list_devices() -> Result<()> {
    let catalog = DeviceCatalog::new(camera_platform()?);
    match catalog.list().await {
        Ok(devices) => {
            for (index, device) in devices.iter().enumerate() {
                println!(
                    "[{}] {} ({:?}) {}",
                    index, device.label, device.facing, device.id
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ {}", e.kind().user_message());
            std::process::exit(1);
        }
    }
}

fn spawn_event_logger(event_bus: &Arc<EventBus>) {
    let mut receiver = EventReceiver::new(event_bus.subscribe(), EventFilter::All, "cli");
    tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            debug!(event_type = event.event_type(), "{}", event.description());
        }
    });
}

#[cfg(all(target_os = "linux", feature = "camera"))]
fn camera_platform() -> Result<Arc<dyn MediaPlatform>> {
    Ok(Arc::new(codescan::GstPlatform::new()?))
}

#[cfg(not(all(target_os = "linux", feature = "camera")))]
fn camera_platform() -> Result<Arc<dyn MediaPlatform>> {
    anyhow::bail!("codescan was built without the `camera` feature; use --image to decode a file")
}

fn init_logging(args: &Args) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("codescan={}", log_level)));

    // Configure format based on options
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "codescan.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}
