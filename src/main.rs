//! rust-balancer: diagnostic entry point
//!
//! Loads a configuration, builds its outbounds and groups, starts every
//! group and prints what each one would currently select.
//!
//! # Usage
//!
//! ```bash
//! # Inspect groups of a configuration
//! ./rust-balancer -c /path/to/config.json
//!
//! # Open a connection through the first group
//! ./rust-balancer -c /path/to/config.json --dial example.com:443
//!
//! # Run with environment overrides
//! RUST_BALANCER_LOG_LEVEL=debug ./rust-balancer
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use rust_balancer::adapter::{Destination, Network};
use rust_balancer::config::{load_config_with_env, Config};
use rust_balancer::connection::RelayConnectionManager;
use rust_balancer::context::RequestContext;
use rust_balancer::group::{GroupDeps, GroupRegistry, OutboundGroup};
use rust_balancer::outbound::{OutboundManager, OutboundManagerBuilder};
use rust_balancer::provider::ProviderManager;

/// Command-line arguments
struct Args {
    /// Configuration file path
    config_path: PathBuf,
    /// Generate default configuration
    generate_config: bool,
    /// Check configuration only
    check_config: bool,
    /// Destination to dial through the first group
    dial: Option<Destination>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config_path = PathBuf::from("/etc/rust-balancer/config.json");
        let mut generate_config = false;
        let mut check_config = false;
        let mut dial = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-c" | "--config" => {
                    if let Some(path) = args.next() {
                        config_path = PathBuf::from(path);
                    }
                }
                "-g" | "--generate-config" => {
                    generate_config = true;
                }
                "--check" => {
                    check_config = true;
                }
                "--dial" => match args.next().map(|d| d.parse::<Destination>()) {
                    Some(Ok(destination)) => dial = Some(destination),
                    Some(Err(e)) => {
                        eprintln!("Invalid --dial destination: {e}");
                        std::process::exit(1);
                    }
                    None => {
                        eprintln!("--dial requires <HOST:PORT>");
                        std::process::exit(1);
                    }
                },
                "-h" | "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "-v" | "--version" => {
                    println!("rust-balancer v{}", rust_balancer::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {arg}");
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        Self {
            config_path,
            generate_config,
            check_config,
            dial,
        }
    }
}

fn print_help() {
    println!(
        r#"rust-balancer v{}

Load-balancing outbound group with bounded failover.

USAGE:
    rust-balancer [OPTIONS]

OPTIONS:
    -c, --config <PATH>     Configuration file path [default: /etc/rust-balancer/config.json]
    -g, --generate-config   Generate default configuration and exit
    --check                 Check configuration and exit
    --dial <HOST:PORT>      Open a TCP connection through the first group
    -h, --help              Print help information
    -v, --version           Print version information

ENVIRONMENT:
    RUST_BALANCER_LOG_LEVEL        Override log level (trace, debug, info, warn, error)
    RUST_BALANCER_MAX_CONNECTIONS  Override maximum connections
"#,
        rust_balancer::VERSION
    );
}

/// Initialize logging
fn init_logging(config: &Config) {
    let level = match config.log.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    if let Ok(directive) = "tokio=warn".parse() {
        filter = filter.add_directive(directive);
    }

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.log.target);

    if config.log.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Build outbound manager from configuration
fn build_outbound_manager(config: &Config) -> Arc<OutboundManager> {
    let mut builder = OutboundManagerBuilder::new();
    builder.add_all_from_config(&config.outbounds);
    let manager = builder.build();

    info!(
        "Initialized {} outbounds: {:?}",
        manager.len(),
        manager.tags()
    );

    Arc::new(manager)
}

/// Print the current selection state of a group
fn print_group(group: &dyn OutboundGroup) {
    let networks: Vec<&str> = group.network().iter().map(Network::as_str).collect();
    println!("{} ({})", group.tag(), group.outbound_type());
    println!("  now:      {}", group.now());
    println!("  all:      {}", group.all().join(", "));
    println!("  networks: {}", networks.join(", "));
}

/// Open one connection through `group`
async fn dial_through(group: &dyn OutboundGroup, destination: &Destination) -> Result<()> {
    let started = Instant::now();
    let _stream = group
        .dial(&RequestContext::new(), Network::Tcp, destination)
        .await
        .with_context(|| format!("dial {destination} via {}", group.tag()))?;
    println!(
        "Connected to {} via {} in {:.2}ms",
        destination,
        group.tag(),
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}

/// Main application entry point
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle generate-config
    if args.generate_config {
        rust_balancer::config::create_default_config(&args.config_path)?;
        println!("Generated default configuration at {:?}", args.config_path);
        return Ok(());
    }

    // Load configuration
    let config = load_config_with_env(&args.config_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration from {:?}: {}",
            args.config_path,
            e
        )
    })?;

    // Handle check-config
    if args.check_config {
        println!("Configuration is valid");
        return Ok(());
    }

    init_logging(&config);

    info!("rust-balancer v{}", rust_balancer::VERSION);
    info!("Configuration loaded from {:?}", args.config_path);

    let connections = Arc::new(RelayConnectionManager::new(&config.connection));
    let deps = GroupDeps::new(
        build_outbound_manager(&config),
        Arc::new(ProviderManager::new()),
        Arc::clone(&connections) as _,
    );

    let groups = GroupRegistry::with_defaults().create_all(&config.groups, &deps)?;
    for group in &groups {
        group
            .start()
            .await
            .with_context(|| format!("start group {}", group.tag()))?;
    }

    for group in &groups {
        print_group(group.as_ref());
    }

    let result = match (&args.dial, groups.first()) {
        (Some(destination), Some(group)) => dial_through(group.as_ref(), destination).await,
        (Some(_), None) => Err(anyhow::anyhow!("No group configured to dial through")),
        (None, _) => Ok(()),
    };

    connections.shutdown();
    for group in &groups {
        if let Err(e) = group.close().await {
            error!("Failed to close group {}: {}", group.tag(), e);
        }
    }

    result
}
