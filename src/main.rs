use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use onvifcam::config::CameraConfig;
use onvifcam::{DeploymentMode, OnvifcamConfig, OnvifcamOrchestrator};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "onvifcam")]
#[command(about = "ONVIF motion-event subscriber and debounced recorder")]
#[command(version)]
#[command(long_about = "Subscribes to motion events pushed by ONVIF cameras and records \
the camera stream with ffmpeg while motion lasts. Detection and recording can run in one \
process or be split across hosts through an MQTT relay.")]
struct Args {
    #[command(subcommand)]
    mode: Option<Mode>,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "onvifcam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, global = true, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, global = true, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, global = true, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, global = true, help = "Validate configuration for the selected mode and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - initialize but don't start components
    #[arg(long, global = true, help = "Resolve the callback address and build components without contacting cameras")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, global = true, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write a daily-rolling log file into DIR
    #[arg(long, global = true, value_name = "DIR")]
    log_file: Option<String>,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Mode {
    /// Subscribe to cameras and record locally
    Standalone,
    /// Subscribe to cameras and publish motion to the relay
    Detect,
    /// Record motion received from the relay
    Record,
}

impl From<Mode> for DeploymentMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Standalone => DeploymentMode::Standalone,
            Mode::Detect => DeploymentMode::Detect,
            Mode::Record => DeploymentMode::Record,
        }
    }
}

/// Command line values that take precedence over the configuration file
#[derive(clap::Args, Debug)]
struct Overrides {
    /// Camera as ADDRESS or ADDRESS=NAME; replaces configured cameras
    #[arg(long = "camera", global = true, value_name = "ADDR[=NAME]")]
    cameras: Vec<CameraConfig>,

    /// Camera topic consumed in record mode; replaces configured topics
    #[arg(long = "topic", global = true, value_name = "TOPIC")]
    topics: Vec<String>,

    /// Event server port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Recording output directory
    #[arg(long, global = true, value_name = "DIR")]
    output: Option<String>,

    /// Relay broker as HOST[:PORT]
    #[arg(long, global = true)]
    broker: Option<String>,

    /// Topic arming or disarming recording
    #[arg(long, global = true, value_name = "TOPIC")]
    arm_topic: Option<String>,

    /// Address cameras should push events to
    #[arg(long, global = true, value_name = "IP")]
    callback_ip: Option<String>,

    /// Delete recordings older than DAYS; 0 disables the sweep
    #[arg(long, global = true, value_name = "DAYS")]
    save_days: Option<u32>,
}

impl Overrides {
    fn apply(&self, config: &mut OnvifcamConfig) {
        if !self.cameras.is_empty() {
            config.cameras = self.cameras.clone();
        }
        if !self.topics.is_empty() {
            config.relay.topics = self.topics.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(output) = &self.output {
            config.recording.output_path = output.clone();
        }
        if let Some(broker) = &self.broker {
            config.relay.broker = broker.clone();
        }
        if let Some(arm_topic) = &self.arm_topic {
            config.relay.arm_topic = Some(arm_topic.clone());
        }
        if let Some(callback_ip) = &self.callback_ip {
            config.server.callback_ip = Some(callback_ip.clone());
        }
        if let Some(days) = self.save_days {
            config.system.trim_old = days > 0;
            if days > 0 {
                config.system.retention_days = days;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let Some(mode) = args.mode.map(DeploymentMode::from) else {
        Args::command()
            .error(
                clap::error::ErrorKind::MissingSubcommand,
                "a mode is required: standalone, detect or record",
            )
            .exit();
    };

    let loaded = OnvifcamConfig::load_from_file(&args.config);
    let debug = args.debug || matches!(&loaded, Ok(config) if config.system.debug);

    // Initialize logging; the guard flushes the log file on exit
    let log_guard = init_logging(&args, debug)?;

    info!("Starting onvifcam v{} in {} mode", env!("CARGO_PKG_VERSION"), mode);
    info!("Configuration file: {}", args.config);

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    args.overrides.apply(&mut config);

    // Validate configuration if requested
    if args.validate_config {
        match config.validate(mode) {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid for {} mode", mode);
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut orchestrator = OnvifcamOrchestrator::new(config, mode).map_err(|e| {
        error!("Failed to create orchestrator: {}", e);
        e
    })?;

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize: {}", e);
        e
    })?;

    if args.dry_run {
        info!("Dry run mode - components initialized but not started");
        if let Some(url) = orchestrator.callback_url() {
            println!("✓ Dry run completed - cameras would push events to {}", url);
        } else {
            println!("✓ Dry run completed successfully");
        }
        return Ok(());
    }

    orchestrator.start().await.map_err(|e| {
        error!("Failed to start: {}", e);
        e
    })?;

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("Error during execution: {}", e);
        e
    })?;

    info!("onvifcam exited with code: {}", exit_code);

    // Flush buffered log lines before exiting
    drop(log_guard);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args, debug: bool) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("onvifcam={}", log_level)));

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
            .with_thread_ids(debug)
            .with_file(debug)
            .with_line_number(debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(debug)
                .with_file(debug)
                .with_line_number(debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match args.log_file.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "onvifcam.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .try_init()?;

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# onvifcam configuration file");
    println!("# Default values for every option. Cameras are listed as:");
    println!("#");
    println!("# [[cameras]]");
    println!("# address = \"192.168.1.20\"");
    println!("# name = \"front-door\"");
    println!("# post_motion_seconds = 10");
    println!();

    let rendered = toml::to_string_pretty(&OnvifcamConfig::default())?;
    println!("{}", rendered);
    Ok(())
}
