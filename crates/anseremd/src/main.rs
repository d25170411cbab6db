// # anseremd - anserem daemon
//
// Thin integration layer over `anserem-core`:
// 1. Read configuration from flags and environment variables
// 2. Initialize logging and the runtime
// 3. Register resolvers and providers
// 4. Run the refresh scheduler until SIGINT/SIGTERM
//
// No refresh logic lives here.
//
// ## Configuration
//
// Every flag can also be set through the environment variable shown in
// `anseremd --help`. A provider is enabled when both its host and token are
// set, and at least one provider must be enabled.
//
// ## Example
//
// ```bash
// export DYNV6_HOST=myhost.dynv6.net
// export DYNV6_TOKEN=your_token
// export IP_PREFIX=2a02:
//
// anseremd --refresh-interval 1m --forced-refresh-interval 1h
// ```

use anserem_core::config::{DEFAULT_IP_PREFIX, DEFAULT_LOOKUP_URL, DEFAULT_SUBNET_MASK, parse_duration};
use anserem_core::{AgentConfig, ComponentRegistry, ProviderConfig, ResolverConfig, SchedulerConfig};
use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum AnseremExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<AnseremExitCode> for ExitCode {
    fn from(code: AnseremExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ResolverKind {
    /// Scan local interfaces
    Interface,
    /// Ask an external client-ip service
    Http,
}

/// Keeps dynamic-DNS records pointed at this host's public IPv6 address
#[derive(Parser)]
#[command(name = "anseremd", version, about)]
struct Cli {
    /// How the public address is discovered
    #[arg(long, env = "RESOLVER", value_enum, default_value_t = ResolverKind::Interface)]
    resolver: ResolverKind,

    /// Time between checks
    #[arg(long, env = "REFRESH_INTERVAL", default_value = "1m", value_parser = duration_arg)]
    refresh_interval: Duration,

    /// Publish at least this often, even without a change
    #[arg(long, env = "FORCED_REFRESH_INTERVAL", default_value = "1h", value_parser = duration_arg)]
    forced_refresh_interval: Duration,

    /// Only consider interface addresses starting with this text (empty disables the filter)
    #[arg(long, env = "IP_PREFIX", default_value = DEFAULT_IP_PREFIX)]
    ip_prefix: String,

    /// Only consider interface addresses that have a PTR record
    #[arg(long, env = "REVERSE_DNS_CHECK", default_value_t = true, action = ArgAction::Set)]
    reverse_dns_check: bool,

    /// Client-ip service used by the http resolver
    #[arg(long, env = "LOOKUP_URL", default_value = DEFAULT_LOOKUP_URL)]
    lookup_url: String,

    /// Prefix length attached by the http resolver
    #[arg(
        long,
        env = "SUBNET_MASK",
        default_value_t = DEFAULT_SUBNET_MASK,
        value_parser = clap::value_parser!(u8).range(0..=128)
    )]
    subnet_mask: u8,

    /// Timeout for every outbound request
    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "30s", value_parser = duration_arg)]
    request_timeout: Duration,

    /// dynv6 hostname
    #[arg(long, env = "DYNV6_HOST", default_value = "")]
    dynv6_host: String,

    /// dynv6 HTTP token
    #[arg(long, env = "DYNV6_TOKEN", default_value = "", hide_env_values = true)]
    dynv6_token: String,

    /// DuckDNS subdomain
    #[arg(long, env = "DUCK_HOST", default_value = "")]
    duck_host: String,

    /// DuckDNS token
    #[arg(long, env = "DUCK_TOKEN", default_value = "", hide_env_values = true)]
    duck_token: String,

    /// trace, debug, info, warn or error
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn duration_arg(s: &str) -> std::result::Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

impl Cli {
    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Build and validate the agent configuration
    fn agent_config(&self) -> Result<AgentConfig> {
        let resolver = match self.resolver {
            ResolverKind::Interface => ResolverConfig::Interface {
                ip_prefix: Some(self.ip_prefix.clone()).filter(|p| !p.is_empty()),
                reverse_dns_check: self.reverse_dns_check,
            },
            ResolverKind::Http => ResolverConfig::Http {
                url: self.lookup_url.clone(),
                subnet_mask: self.subnet_mask,
            },
        };

        let mut config = AgentConfig::new(resolver);

        if let Some(provider) = provider_from("dynv6", &self.dynv6_host, &self.dynv6_token, |h, t| {
            ProviderConfig::dynv6(h, t)
        }) {
            config = config.with_provider(provider);
        }
        if let Some(provider) = provider_from("DuckDNS", &self.duck_host, &self.duck_token, |h, t| {
            ProviderConfig::duckdns(h, t)
        }) {
            config = config.with_provider(provider);
        }

        config.scheduler = SchedulerConfig {
            refresh_interval_secs: self.refresh_interval.as_secs(),
            forced_refresh_interval_secs: self.forced_refresh_interval.as_secs(),
            request_timeout_secs: self.request_timeout.as_secs(),
            ..SchedulerConfig::default()
        };

        config.validate()?;
        Ok(config)
    }
}

/// A provider is enabled only when both host and token are set
fn provider_from(
    label: &str,
    host: &str,
    token: &str,
    build: fn(String, String) -> ProviderConfig,
) -> Option<ProviderConfig> {
    match (host.is_empty(), token.is_empty()) {
        (false, false) => Some(build(host.to_string(), token.to_string())),
        (true, true) => None,
        _ => {
            warn!("{} needs both host and token; ignoring it", label);
            None
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version also land here
            let _ = e.print();
            return if e.use_stderr() {
                AnseremExitCode::ConfigError.into()
            } else {
                AnseremExitCode::CleanShutdown.into()
            };
        }
    };

    let log_level = match cli.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return AnseremExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return AnseremExitCode::ConfigError.into();
    }

    let config = match cli.agent_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return AnseremExitCode::ConfigError.into();
        }
    };

    info!("Starting anseremd v{}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return AnseremExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

/// Register components, build the scheduler and run it until shutdown
async fn run_daemon(config: AgentConfig) -> AnseremExitCode {
    let registry = ComponentRegistry::new();
    register_components(&registry);

    let (scheduler, mut events) = match registry.build_scheduler(&config) {
        Ok(built) => built,
        Err(e) => {
            error!("Startup error: {}", e);
            return AnseremExitCode::ConfigError;
        }
    };

    info!("Resolver: {}", config.resolver.type_name());
    for provider in &config.providers {
        info!("Publishing to: {}", provider.type_name());
    }

    let shutdown_rx = match install_shutdown_handler() {
        Ok(rx) => rx,
        Err(e) => {
            error!("Startup error: {}", e);
            return AnseremExitCode::ConfigError;
        }
    };

    // Events are only of interest at debug level here
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::debug!(?event, "scheduler event");
        }
    });

    match scheduler.run_with_shutdown(shutdown_rx).await {
        Ok(()) => {
            info!("Shutting down daemon");
            AnseremExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Daemon error: {}", e);
            AnseremExitCode::RuntimeError
        }
    }
}

fn register_components(registry: &ComponentRegistry) {
    #[cfg(feature = "interface")]
    anserem_resolver_interface::register(registry);

    #[cfg(feature = "http")]
    anserem_resolver_http::register(registry);

    #[cfg(feature = "dynv6")]
    anserem_provider_dynv6::register(registry);

    #[cfg(feature = "duckdns")]
    anserem_provider_duckdns::register(registry);

    tracing::debug!(
        "Registered resolvers {:?}, providers {:?}",
        registry.list_resolvers(),
        registry.list_providers()
    );
}

/// Forward SIGTERM or SIGINT to the scheduler
#[cfg(unix)]
fn install_shutdown_handler() -> Result<Option<oneshot::Receiver<()>>> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
        let _ = tx.send(());
    });

    Ok(Some(rx))
}

/// The scheduler falls back to CTRL-C on its own
#[cfg(not(unix))]
fn install_shutdown_handler() -> Result<Option<oneshot::Receiver<()>>> {
    Ok(None)
}
