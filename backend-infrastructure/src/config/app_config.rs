use std::env;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use backend_domain::{BusConfig, RuntimeConfig, DEFAULT_ROOM_CAPACITY, DEFAULT_ROOM_TTL_SECONDS};

use super::validation::{bus_scheme, validate_socket_path};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub cors_origins: Vec<String>,
    pub bus_url: String,
    pub socket_path: String,
    pub room_ttl_seconds: u64,
    pub room_capacity: usize,
    pub cookie_name: String,
    pub secure_cookies: bool,
    pub expiry_sweep_seconds: u64,
    pub bus_reconnect_seconds: u64,
    pub connection_buffer: usize,
    pub max_body_bytes: u64,
    pub request_timeout_seconds: u64,
    pub log_format: String,
    pub log_dir: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
            cors_origins: vec!["http://localhost:3000".to_string()],
            bus_url: "memory://".to_string(),
            socket_path: "/socket".to_string(),
            room_ttl_seconds: DEFAULT_ROOM_TTL_SECONDS,
            room_capacity: DEFAULT_ROOM_CAPACITY,
            cookie_name: "x-auth-token".to_string(),
            secure_cookies: false,
            expiry_sweep_seconds: 15,
            bus_reconnect_seconds: 2,
            connection_buffer: 256,
            max_body_bytes: 64 * 1024,
            request_timeout_seconds: 15,
            log_format: "text".to_string(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    pub async fn load() -> Result<Self> {
        let path = env::var("BURNROOM_CONFIG").unwrap_or_else(|_| "./config.toml".to_string());
        Self::load_from(&path).await
    }

    pub async fn load_from(path: &str) -> Result<Self> {
        let file_path = Path::new(path);
        let mut config = if file_path.exists() {
            let content = fs::read_to_string(file_path).await?;
            toml::from_str(&content)?
        } else {
            warn!("config file {} not found, using defaults", path);
            AppConfig::default()
        };
        config.apply_env_overrides();
        config.resolve_paths(file_path.parent());
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn normalize(&mut self) {
        self.cors_origins = normalize_list(std::mem::take(&mut self.cors_origins));
        self.bus_url = self.bus_url.trim().to_string();
        self.socket_path = self.socket_path.trim().trim_end_matches('/').to_string();
        self.cookie_name = self.cookie_name.trim().to_string();
        self.log_format = self.log_format.trim().to_lowercase();
        if let Some(dir) = &self.log_dir {
            if dir.trim().is_empty() {
                self.log_dir = None;
            }
        }
        if self.connection_buffer == 0 {
            self.connection_buffer = 1;
        }
    }

    fn resolve_paths(&mut self, base_dir: Option<&Path>) {
        let (Some(base), Some(dir)) = (base_dir, &self.log_dir) else {
            return;
        };
        self.log_dir = Some(resolve_path(base, dir));
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|err| anyhow!("invalid bind_addr: {}", err))?;
        validate_socket_path(&self.socket_path)?;
        bus_scheme(&self.bus_url)?;
        if self.room_ttl_seconds == 0 {
            return Err(anyhow!("room_ttl_seconds must be greater than 0"));
        }
        if self.room_capacity == 0 {
            return Err(anyhow!("room_capacity must be at least 1"));
        }
        if self.max_body_bytes == 0 {
            return Err(anyhow!("max_body_bytes must be greater than 0"));
        }
        if self.cookie_name.is_empty()
            || self
                .cookie_name
                .chars()
                .any(|ch| ch.is_whitespace() || matches!(ch, ';' | '=' | ','))
        {
            return Err(anyhow!("cookie_name '{}' is not a valid cookie name", self.cookie_name));
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(anyhow!("log_format must be 'text' or 'json'"));
        }
        Ok(())
    }

    pub fn to_runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            bind_addr: self.bind_addr.clone(),
            cors_origins: self.cors_origins.clone(),
            socket_path: self.socket_path.clone(),
            room_ttl_seconds: self.room_ttl_seconds,
            room_capacity: self.room_capacity,
            cookie_name: self.cookie_name.clone(),
            secure_cookies: self.secure_cookies,
            expiry_sweep_seconds: self.expiry_sweep_seconds,
            connection_buffer: self.connection_buffer,
            max_body_bytes: self.max_body_bytes,
            request_timeout_seconds: self.request_timeout_seconds,
        }
    }

    pub fn to_bus_config(&self) -> BusConfig {
        BusConfig {
            bus_url: self.bus_url.clone(),
            bus_reconnect_seconds: self.bus_reconnect_seconds,
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("BURNROOM_BIND_ADDR") {
            self.bind_addr = value;
        }
        if let Ok(value) = env::var("BURNROOM_CORS_ORIGINS") {
            self.cors_origins = parse_env_list(&value);
        }
        if let Ok(value) = env::var("REDIS_URL") {
            self.bus_url = value;
        }
        if let Ok(value) = env::var("BURNROOM_BUS_URL") {
            self.bus_url = value;
        }
        if let Ok(value) = env::var("BURNROOM_SOCKET_PATH") {
            self.socket_path = value;
        }
        if let Ok(value) = env::var("BURNROOM_ROOM_TTL_SECONDS") {
            self.room_ttl_seconds = value.parse().unwrap_or(self.room_ttl_seconds);
        }
        if let Ok(value) = env::var("BURNROOM_ROOM_CAPACITY") {
            self.room_capacity = value.parse().unwrap_or(self.room_capacity);
        }
        if let Ok(value) = env::var("BURNROOM_COOKIE_NAME") {
            self.cookie_name = value;
        }
        if let Ok(value) = env::var("BURNROOM_SECURE_COOKIES") {
            self.secure_cookies = value.parse().unwrap_or(self.secure_cookies);
        }
        if let Ok(value) = env::var("BURNROOM_EXPIRY_SWEEP_SECONDS") {
            self.expiry_sweep_seconds = value.parse().unwrap_or(self.expiry_sweep_seconds);
        }
        if let Ok(value) = env::var("BURNROOM_BUS_RECONNECT_SECONDS") {
            self.bus_reconnect_seconds = value.parse().unwrap_or(self.bus_reconnect_seconds);
        }
        if let Ok(value) = env::var("BURNROOM_CONNECTION_BUFFER") {
            self.connection_buffer = value.parse().unwrap_or(self.connection_buffer);
        }
        if let Ok(value) = env::var("BURNROOM_MAX_BODY_BYTES") {
            self.max_body_bytes = value.parse().unwrap_or(self.max_body_bytes);
        }
        if let Ok(value) = env::var("BURNROOM_REQUEST_TIMEOUT_SECONDS") {
            self.request_timeout_seconds = value.parse().unwrap_or(self.request_timeout_seconds);
        }
        if let Ok(value) = env::var("BURNROOM_LOG_FORMAT") {
            self.log_format = value;
        }
        if let Ok(value) = env::var("BURNROOM_LOG_DIR") {
            self.log_dir = Some(value);
        }
    }
}

fn resolve_path(base: &Path, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return trimmed.to_string();
    }
    let path = Path::new(trimmed);
    if path.is_absolute() {
        trimmed.to_string()
    } else {
        base.join(path).to_string_lossy().to_string()
    }
}

fn parse_env_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn normalize_list(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = values
        .into_iter()
        .map(|item| item.trim().trim_end_matches('/').to_string())
        .filter(|item| !item.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}
