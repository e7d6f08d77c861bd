// src/config.rs

use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    /// How long the results screen stays up before auto-advancing when every
    /// connected player answered, in seconds.
    pub results_delay_secs: u64,
    /// How long a room with zero attached connections survives before the
    /// registry evicts it, in seconds.
    pub room_idle_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let results_delay_secs = env::var("RESULTS_DELAY_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let room_idle_secs = env::var("ROOM_IDLE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);

        Self {
            bind_addr,
            jwt_secret,
            jwt_expiration,
            rust_log,
            results_delay_secs,
            room_idle_secs,
        }
    }
}
