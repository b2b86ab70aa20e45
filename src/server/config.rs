use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::db::writer::ResultWriterConfig;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub database_url: String,

    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_reconcile_interval_seconds")]
    pub reconcile_interval_seconds: u64,

    #[serde(default = "default_result_batch_size")]
    pub result_batch_size: usize,

    #[serde(default = "default_result_flush_interval_seconds")]
    pub result_flush_interval_seconds: u64,

    #[serde(default = "default_result_queue_capacity")]
    pub result_queue_capacity: usize,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    database_url: Option<String>,
    database_host: Option<String>,
    database_port: Option<u16>,
    database_name: Option<String>,
    database_user: Option<String>,
    database_password: Option<String>,
    database_max_connections: Option<u32>,
    listen_address: Option<String>,
    request_timeout_seconds: Option<u64>,
    reconcile_interval_seconds: Option<u64>,
    result_batch_size: Option<usize>,
    result_flush_interval_seconds: Option<u64>,
    result_queue_capacity: Option<usize>,
    log_dir: Option<String>,
}

fn default_database_max_connections() -> u32 {
    10
}

fn default_listen_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_reconcile_interval_seconds() -> u64 {
    5
}

fn default_result_batch_size() -> usize {
    100
}

fn default_result_flush_interval_seconds() -> u64 {
    3
}

fn default_result_queue_capacity() -> usize {
    1024
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();
        Self::load_from(config_path, std::env::vars())
    }

    /// Layers the optional TOML file under the given environment variables.
    pub fn load_from<I>(config_path: Option<&str>, env: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        // 1. Load from file (optional)
        let file_config: PartialServerConfig = if let Some(path_str) = config_path {
            let path = Path::new(path_str);
            if path.exists() {
                let contents = fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
                toml::from_str(&contents)
                    .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))?
            } else {
                return Err(format!("Config file not found at {path:?}"));
            }
        } else {
            PartialServerConfig::default()
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_iter(env)
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        let config = ServerConfig {
            database_url: env_config
                .database_url
                .clone()
                .or(file_config.database_url.clone())
                .unwrap_or_else(|| compose_database_url(&env_config, &file_config)),
            database_max_connections: env_config
                .database_max_connections
                .or(file_config.database_max_connections)
                .unwrap_or_else(default_database_max_connections),
            listen_address: env_config
                .listen_address
                .or(file_config.listen_address)
                .unwrap_or_else(default_listen_address),
            request_timeout_seconds: env_config
                .request_timeout_seconds
                .or(file_config.request_timeout_seconds)
                .unwrap_or_else(default_request_timeout_seconds),
            reconcile_interval_seconds: env_config
                .reconcile_interval_seconds
                .or(file_config.reconcile_interval_seconds)
                .unwrap_or_else(default_reconcile_interval_seconds),
            result_batch_size: env_config
                .result_batch_size
                .or(file_config.result_batch_size)
                .unwrap_or_else(default_result_batch_size),
            result_flush_interval_seconds: env_config
                .result_flush_interval_seconds
                .or(file_config.result_flush_interval_seconds)
                .unwrap_or_else(default_result_flush_interval_seconds),
            result_queue_capacity: env_config
                .result_queue_capacity
                .or(file_config.result_queue_capacity)
                .unwrap_or_else(default_result_queue_capacity),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.request_timeout_seconds == 0 {
            return Err("REQUEST_TIMEOUT_SECONDS must be greater than 0".to_string());
        }
        if self.reconcile_interval_seconds == 0 {
            return Err("RECONCILE_INTERVAL_SECONDS must be greater than 0".to_string());
        }
        if self.result_flush_interval_seconds == 0 {
            return Err("RESULT_FLUSH_INTERVAL_SECONDS must be greater than 0".to_string());
        }
        if self.result_batch_size == 0 || self.result_queue_capacity == 0 {
            return Err("RESULT_BATCH_SIZE and RESULT_QUEUE_CAPACITY must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_seconds)
    }

    pub fn result_writer_config(&self) -> ResultWriterConfig {
        ResultWriterConfig {
            batch_size: self.result_batch_size,
            flush_interval: Duration::from_secs(self.result_flush_interval_seconds),
            queue_capacity: self.result_queue_capacity,
        }
    }
}

fn compose_database_url(env: &PartialServerConfig, file: &PartialServerConfig) -> String {
    let host = env.database_host.clone().or(file.database_host.clone());
    let port = env.database_port.or(file.database_port);
    let name = env.database_name.clone().or(file.database_name.clone());
    let user = env.database_user.clone().or(file.database_user.clone());
    let password = env.database_password.clone().or(file.database_password.clone());
    format!(
        "postgres://{}:{}@{}:{}/{}",
        user.as_deref().unwrap_or("postgres"),
        password.as_deref().unwrap_or("password"),
        host.as_deref().unwrap_or("localhost"),
        port.unwrap_or(5432),
        name.as_deref().unwrap_or("postgres"),
    )
}
