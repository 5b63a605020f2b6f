// # fipd - Floating-IP Harvester Daemon
//
// Thin integration layer: reads configuration, initializes the runtime and
// tracing, wires the driver/notifier/classifier into the engine and maps
// its outcome to a process exit code. All orchestration logic lives in
// fip-core.
//
// ## Configuration
//
// - `FIP_CONFIG`: path to a JSON file deserialized into `HarvestConfig`;
//   unset means built-in defaults
// - `FIP_PANEL_URL`: panel API base URL (required)
// - `FIP_PANEL_TOKEN`: panel API bearer token (required)
// - `FIP_PANEL_REGION`: region to order floating IPs in (default "moscow")
// - `FIP_LOG_LEVEL`: trace|debug|info|warn|error (default "info")
// - `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`: optional notifications
//
// ## Exit codes
//
// - 0: goal reached, or interrupted by the user
// - 1: configuration error or unclassified fatal exception
// - 2: fatal service error during a create operation
// - 3: fatal service error during a delete operation

use anyhow::Result;
use fip_core::{HarvestConfig, HarvestEngine, MarkerClassifier};
use fip_driver_http::PanelDriver;
use fip_notify_telegram::TelegramNotifier;
use std::env;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Application configuration from environment variables
struct DaemonConfig {
    config_path: Option<String>,
    panel_url: String,
    panel_token: String,
    panel_region: String,
    log_level: String,
}

impl DaemonConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            config_path: env::var("FIP_CONFIG").ok(),
            panel_url: env::var("FIP_PANEL_URL")
                .map_err(|_| anyhow::anyhow!("FIP_PANEL_URL is required"))?,
            panel_token: env::var("FIP_PANEL_TOKEN")
                .map_err(|_| anyhow::anyhow!("FIP_PANEL_TOKEN is required"))?,
            panel_region: env::var("FIP_PANEL_REGION").unwrap_or_else(|_| "moscow".to_string()),
            log_level: env::var("FIP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.panel_token.is_empty() {
            anyhow::bail!(
                "FIP_PANEL_TOKEN is empty. Set it via: export FIP_PANEL_TOKEN=your_token"
            );
        }

        let token_lower = self.panel_token.to_lowercase();
        if token_lower.contains("your_token")
            || token_lower.contains("replace_me")
            || token_lower.contains("example")
        {
            anyhow::bail!("FIP_PANEL_TOKEN appears to be a placeholder");
        }

        if !self.panel_url.starts_with("https://") && !self.panel_url.starts_with("http://") {
            anyhow::bail!(
                "FIP_PANEL_URL must use HTTP or HTTPS scheme. Got: {}",
                self.panel_url
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => anyhow::bail!(
                "FIP_LOG_LEVEL '{other}' is not valid. \
                Valid levels: trace, debug, info, warn, error"
            ),
        }
    }

    /// Load the harvest configuration file, or defaults when unset
    fn load_harvest_config(&self) -> Result<HarvestConfig> {
        let config = match &self.config_path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    anyhow::anyhow!("failed to read config file {path}: {e}")
                })?;
                serde_json::from_str(&text)
                    .map_err(|e| anyhow::anyhow!("failed to parse config file {path}: {e}"))?
            }
            None => HarvestConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn main() -> ExitCode {
    let daemon_config = match DaemonConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = daemon_config.validate() {
        eprintln!("Configuration validation error: {e}");
        return ExitCode::from(1);
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&daemon_config.log_level))
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
        return ExitCode::from(1);
    }

    let harvest_config = match daemon_config.load_harvest_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {e}");
            return ExitCode::from(1);
        }
    };

    info!("Starting fipd daemon");
    info!(
        "Strategy mode: {}, account limit: {}, target ranges: {}",
        harvest_config.strategy_mode,
        harvest_config.account_limit,
        harvest_config.target_cidrs.len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let code = rt.block_on(run_daemon(daemon_config, harvest_config));
    ExitCode::from(code)
}

/// Wire the engine and drive it until a goal, a fatal error or an interrupt
async fn run_daemon(daemon_config: DaemonConfig, harvest_config: HarvestConfig) -> u8 {
    let driver = match PanelDriver::new(
        &daemon_config.panel_url,
        &daemon_config.panel_token,
        &daemon_config.panel_region,
    ) {
        Ok(driver) => driver,
        Err(e) => {
            error!("Failed to build panel driver: {e}");
            return 1;
        }
    };

    let notifier = TelegramNotifier::from_env();
    let classifier = MarkerClassifier::new(harvest_config.fatal_error_markers.clone());

    let mut engine = match HarvestEngine::new(
        Box::new(driver),
        Box::new(notifier),
        Box::new(classifier),
        harvest_config,
    ) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to build engine: {e}");
            return 1;
        }
    };

    // cooperative cancellation: an interrupt between operations is an
    // orderly, successful exit
    tokio::select! {
        result = engine.run() => match result {
            Ok(()) => {
                info!("Engine finished successfully");
                0
            }
            Err(e) => {
                error!("Engine failed: {e}");
                e.exit_code()
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received; stopping");
            0
        }
    }
}
