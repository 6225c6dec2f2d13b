/// Rigid-body simulation tuning for the table.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhysicsConfig {
    /// Fixed sub-step length (seconds)
    pub sub_step: f32,
    /// Upper bound on sub-steps run for a single frame; the remainder is dropped
    pub max_sub_steps: u32,
    /// Ball mass (kg)
    pub ball_mass: f32,
    pub ball_restitution: f32,
    pub ball_friction: f32,
    pub rail_restitution: f32,
    pub rail_friction: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Below this speed (m/s) a ball is snapped to rest
    pub stop_speed: f32,
    /// Contacts slower than this (m/s) produce no collision event
    pub min_impact_speed: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            sub_step: 1.0 / 480.0,
            max_sub_steps: 120,
            ball_mass: 0.17,
            ball_restitution: 0.99,
            ball_friction: 0.05,
            rail_restitution: 0.9,
            rail_friction: 0.1,
            linear_damping: 0.8,
            angular_damping: 0.8,
            stop_speed: 0.015,
            min_impact_speed: 0.05,
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.sub_step.is_finite() || self.sub_step <= 0.0 || self.sub_step > 0.02 {
            return Err("sub_step must be in (0, 0.02]".to_string());
        }
        if self.max_sub_steps == 0 {
            return Err("max_sub_steps must be > 0".to_string());
        }
        if !self.ball_mass.is_finite() || self.ball_mass <= 0.0 {
            return Err("ball_mass must be finite and > 0".to_string());
        }
        for (name, value) in [
            ("ball_restitution", self.ball_restitution),
            ("rail_restitution", self.rail_restitution),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} must be in [0, 1]"));
            }
        }
        if self.ball_friction < 0.0 || self.rail_friction < 0.0 {
            return Err("friction must be >= 0".to_string());
        }
        if self.linear_damping < 0.0 || self.angular_damping < 0.0 {
            return Err("damping must be >= 0".to_string());
        }
        if !self.stop_speed.is_finite() || self.stop_speed <= 0.0 {
            return Err("stop_speed must be finite and > 0".to_string());
        }
        if self.min_impact_speed < 0.0 {
            return Err("min_impact_speed must be >= 0".to_string());
        }
        Ok(())
    }
}

/// Cue-stick input mapping.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShotConfig {
    /// Pull-back distance (m) that maps to full power
    pub max_pull: f32,
    /// Impulse magnitude at full power (N·s)
    pub max_force: f32,
    /// Releases at or below this force are discarded
    pub min_force: f32,
}

impl Default for ShotConfig {
    fn default() -> Self {
        Self {
            max_pull: 0.3,
            max_force: 1.2,
            min_force: 0.01,
        }
    }
}

impl ShotConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.max_pull.is_finite() || self.max_pull <= 0.0 {
            return Err("max_pull must be finite and > 0".to_string());
        }
        if !self.max_force.is_finite() || self.max_force <= 0.0 {
            return Err("max_force must be finite and > 0".to_string());
        }
        if self.min_force < 0.0 || self.min_force >= self.max_force {
            return Err("min_force must be in [0, max_force)".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    /// Time a player has to take a shot before the turn passes (ms)
    pub shot_clock_ms: i64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            shot_clock_ms: 60_000,
        }
    }
}

impl RuleConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.shot_clock_ms <= 0 {
            return Err("shot_clock_ms must be > 0".to_string());
        }
        Ok(())
    }
}
