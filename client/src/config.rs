use pool_shared::config::{PhysicsConfig, RuleConfig, ShotConfig};
use url::Url;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base websocket URL of the server, without the `/ws/{room}` path
    pub server_url: String,
    pub room: Option<String>,
    pub player_id: String,
    pub secret: String,
    /// Play hot-seat locally instead of joining a room
    pub offline: bool,
    /// Local simulation rate
    pub tick_rate_hz: u32,
    pub physics: PhysicsConfig,
    pub rules: RuleConfig,
    pub shot: ShotConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:9002".to_string(),
            room: None,
            player_id: "player".to_string(),
            secret: "secret".to_string(),
            offline: false,
            tick_rate_hz: 60,
            physics: PhysicsConfig::default(),
            rules: RuleConfig::default(),
            shot: ShotConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `POOL_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("POOL_SERVER_URL") {
            config.server_url = url;
        }
        if let Ok(room) = std::env::var("POOL_ROOM") {
            config.room = Some(room).filter(|r| !r.is_empty());
        }
        if let Ok(id) = std::env::var("POOL_PLAYER_ID") {
            config.player_id = id;
        }
        if let Ok(secret) = std::env::var("POOL_SECRET") {
            config.secret = secret;
        }
        if let Ok(offline) = std::env::var("POOL_OFFLINE") {
            config.offline = matches!(offline.as_str(), "1" | "true" | "yes");
        }
        config
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tick_rate_hz == 0 || self.tick_rate_hz > 1000 {
            return Err("tick_rate_hz must be in 1..=1000".to_string());
        }
        if !self.offline {
            if self.room.is_none() {
                return Err("POOL_ROOM is required for networked play".to_string());
            }
            if self.player_id.is_empty() || self.secret.is_empty() {
                return Err("player id and secret must not be empty".to_string());
            }
            self.room_url()?;
        }
        self.physics.validate()?;
        self.rules.validate()?;
        self.shot.validate()?;
        Ok(())
    }

    /// `{server_url}/ws/{room}?id=..&secret=..`
    pub fn room_url(&self) -> Result<Url, String> {
        let room = self.room.as_deref().ok_or("no room configured")?;
        let mut url = Url::parse(&self.server_url).map_err(|e| format!("invalid server url: {e}"))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(format!("server url must be ws:// or wss://, got {}", url.scheme()));
        }
        url.path_segments_mut()
            .map_err(|_| "server url cannot be a base".to_string())?
            .pop_if_empty()
            .extend(["ws", room]);
        url.query_pairs_mut()
            .append_pair("id", &self.player_id)
            .append_pair("secret", &self.secret);
        Ok(url)
    }
}
