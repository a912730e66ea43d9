// Runtime configuration consumed by the application layer

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub bind_addr: String,
    pub cors_origins: Vec<String>,
    pub socket_path: String,
    pub room_ttl_seconds: u64,
    pub room_capacity: usize,
    pub cookie_name: String,
    pub secure_cookies: bool,
    pub expiry_sweep_seconds: u64,
    pub connection_buffer: usize,
    pub max_body_bytes: u64,
    pub request_timeout_seconds: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
            cors_origins: vec!["http://localhost:3000".to_string()],
            socket_path: "/socket".to_string(),
            room_ttl_seconds: super::DEFAULT_ROOM_TTL_SECONDS,
            room_capacity: super::DEFAULT_ROOM_CAPACITY,
            cookie_name: "x-auth-token".to_string(),
            secure_cookies: false,
            expiry_sweep_seconds: 15,
            connection_buffer: 256,
            max_body_bytes: 64 * 1024,
            request_timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub bus_url: String,
    pub bus_reconnect_seconds: u64,
}
