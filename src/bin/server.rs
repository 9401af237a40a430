use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tfsh::{config::{Config, SandboxConfig}, server::TfshServer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tfsh-server")]
#[command(about = "TFSH (Telnet Folder Shell) Server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the TFSH server
    Start {
        /// Override server host
        #[arg(long)]
        host: Option<String>,

        /// Override server port
        #[arg(long)]
        port: Option<u16>,

        /// Override the served root directory
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Generate default configuration file
    Config {
        /// Output path for config file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration file
    Validate,
}

// One task multiplexes every session
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config_path = cli.config.unwrap_or_else(|| {
        Config::get_default_config_path().unwrap_or_else(|_| PathBuf::from("tfsh_config.toml"))
    });

    let result = match cli.command {
        Commands::Start { host, port, root } => start_server(config_path, host, port, root).await,
        Commands::Config { output, force } => generate_config(output.unwrap_or(config_path), force),
        Commands::Validate => validate_config(config_path),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("tfsh={},tfsh_server={}", level, level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn start_server(
    config_path: PathBuf,
    host_override: Option<String>,
    port_override: Option<u16>,
    root_override: Option<PathBuf>,
) -> anyhow::Result<()> {
    info!("Starting TFSH server...");

    let mut config = if config_path.exists() {
        Config::load_from_file(&config_path)?
    } else {
        warn!("Configuration file not found at {:?}, using defaults", config_path);
        Config::default()
    };

    if let Some(host) = host_override {
        config.server.host = host;
    }
    if let Some(port) = port_override {
        config.server.port = port;
    }
    if let Some(root) = root_override {
        config.sandbox = SandboxConfig::new(root);
    }

    config.validate().context("Configuration validation failed")?;

    let mut server = TfshServer::new(config)?;
    server.bind().await?;

    info!("Press Ctrl+C to stop the server");

    tokio::select! {
        result = server.start() => {
            match result {
                Ok(_) => info!("TFSH server stopped normally"),
                Err(e) => error!("TFSH server error: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            if let Err(e) = server.stop().await {
                error!("Error during shutdown: {}", e);
            }
        }
    }

    Ok(())
}

fn generate_config(output_path: PathBuf, force: bool) -> anyhow::Result<()> {
    if output_path.exists() && !force {
        bail!("Configuration file already exists at {:?}. Use --force to overwrite.", output_path);
    }

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }

    let config = Config::default();
    config.save_to_file(&output_path)?;

    println!("Default configuration file generated at {:?}", output_path);
    Ok(())
}

fn validate_config(config_path: PathBuf) -> anyhow::Result<()> {
    println!("Validating configuration file: {:?}", config_path);

    let config = Config::load_from_file(&config_path)?;
    config.validate()?;

    println!("✓ Configuration is valid");
    println!("Server settings:");
    println!("  Listen address: {}", config.server.bind_addr());
    println!("  Max connections: {}", config.server.max_connections);
    println!("  Max line length: {}", config.server.max_line_length);
    println!("Sandbox root: {}", config.sandbox.root);
    if !config.sandbox.get_path().exists() {
        println!("  (will be created on start)");
    }

    Ok(())
}
