use std::time::Duration;

use pool_shared::config::{PhysicsConfig, RuleConfig};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Physics/rules ticks per second for every room
    pub tick_rate_hz: u32,
    /// Room snapshots per second
    pub broadcast_rate_hz: u32,
    /// Inactivity lease; a join or a shot extends it
    pub room_lease: Duration,
    pub max_rooms: usize,
    /// Larger client frames close the socket
    pub max_message_bytes: usize,
    /// Unparseable frames tolerated per connection before closing it
    pub max_parse_errors: u32,
    /// Seed for room id generation; None draws from the OS
    pub rng_seed: Option<u64>,
    pub physics: PhysicsConfig,
    pub rules: RuleConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9002".to_string(),
            tick_rate_hz: 60,
            broadcast_rate_hz: 10,
            room_lease: Duration::from_secs(600),
            max_rooms: 256,
            max_message_bytes: 1024,
            max_parse_errors: 5,
            rng_seed: None,
            physics: PhysicsConfig::default(),
            rules: RuleConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `POOL_*` environment variables.
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default();
        if let Ok(addr) = std::env::var("POOL_LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(secs) = parse_env::<u64>("POOL_ROOM_LEASE_SECS")? {
            config.room_lease = Duration::from_secs(secs);
        }
        if let Some(max) = parse_env::<usize>("POOL_MAX_ROOMS")? {
            config.max_rooms = max;
        }
        if let Some(seed) = parse_env::<u64>("POOL_RNG_SEED")? {
            config.rng_seed = Some(seed);
        }
        if let Some(ms) = parse_env::<i64>("POOL_SHOT_CLOCK_MS")? {
            config.rules.shot_clock_ms = ms;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.is_empty() {
            return Err("listen_addr must not be empty".to_string());
        }
        if self.tick_rate_hz == 0 || self.tick_rate_hz > 1000 {
            return Err("tick_rate_hz must be in 1..=1000".to_string());
        }
        if self.broadcast_rate_hz == 0 || self.broadcast_rate_hz > self.tick_rate_hz {
            return Err("broadcast_rate_hz must be in 1..=tick_rate_hz".to_string());
        }
        if self.room_lease.is_zero() {
            return Err("room_lease must be > 0".to_string());
        }
        if self.max_rooms == 0 {
            return Err("max_rooms must be > 0".to_string());
        }
        if self.max_message_bytes < 64 {
            return Err("max_message_bytes must be >= 64".to_string());
        }
        self.physics.validate()?;
        self.rules.validate()?;
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, String> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("{name} is not a valid value: {raw}")),
        Err(_) => Ok(None),
    }
}
