//! CLI argument parsing shared by all seven binaries, overlaid on a
//! [`SharedConfig`] loaded from an optional TOML file.

use std::path::PathBuf;

use chatmesh_types::config::SharedConfig;
use clap::Args;

/// Options every binary accepts: where to find config, where data lives,
/// which model/concurrency/log-level to use. Flattened into each binary's
/// `clap::Parser` struct.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Path to a TOML file overlaying the default `SharedConfig`.
    #[arg(long, env = "CHATMESH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the SQLite database and LanceDB tables.
    #[arg(long, env = "CHATMESH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Chat completion model identifier, overriding the config file.
    #[arg(long, env = "CHATMESH_MODEL")]
    pub model: Option<String>,

    /// Worker parallelism for Generator/Writer instances.
    #[arg(long, env = "CHATMESH_MAX_CONCURRENCY")]
    pub max_concurrency: Option<usize>,

    /// Log level, parsed by `tracing_subscriber::EnvFilter`.
    #[arg(long, env = "CHATMESH_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Export spans via the stdout OpenTelemetry exporter.
    #[arg(long, env = "CHATMESH_OTEL")]
    pub otel: bool,
}

impl CommonArgs {
    /// Load the `SharedConfig`: start from the TOML file at `--config` (or
    /// built-in defaults if absent), then overlay any CLI/env overrides.
    pub fn load(&self) -> anyhow::Result<SharedConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
                toml::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("parsing config file {}: {e}", path.display()))?
            }
            None => SharedConfig::default(),
        };

        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(max_concurrency) = self.max_concurrency {
            config.max_concurrency = max_concurrency;
        }
        if let Some(log_level) = &self.log_level {
            config.log_level = log_level.clone();
        }

        Ok(config)
    }

    /// Resolve the data directory: `--data-dir`, else `~/.chatmesh`.
    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.clone(),
            None => {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".chatmesh")
            }
        }
    }
}

/// CLI for a plain bus-consumer worker (Generator, History Writer, Memory
/// Writer): no HTTP surface, just the common options.
#[derive(Debug, clap::Parser)]
pub struct WorkerArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// CLI for an HTTP-facing binary (Ingress, Egress, History Reader, Memory
/// Reader): the common options plus a bind address.
#[derive(Debug, clap::Parser)]
pub struct HttpArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Address to bind the HTTP listener to.
    #[arg(long, env = "CHATMESH_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind the HTTP listener to.
    #[arg(long, env = "CHATMESH_PORT")]
    pub port: u16,
}

impl HttpArgs {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
