use std::fs;
use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::ConfigError;

const ENV_PREFIX: &str = "COUP_AI_";

/// Artificial thinking time for the heuristic player: `base_ms` plus or minus up to
/// `spread_ms`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    pub base_ms: u64,
    pub spread_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        DelayConfig { base_ms: 1000, spread_ms: 500 }
    }
}

impl DelayConfig {
    pub fn none() -> Self {
        DelayConfig { base_ms: 0, spread_ms: 0 }
    }

    /// The longest delay this config can produce.
    pub fn max(&self) -> Duration {
        Duration::from_millis(self.base_ms + self.spread_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// turns looked ahead by the end-game simulator
    pub search_horizon: usize,
    /// chance that bluffing is switched on for a match
    pub chance_to_bluff: f64,
    /// fallback rate for challenging a claim worth challenging
    pub chance_to_challenge: f64,
    pub max_bluffed_roles: usize,
    /// treasury size at which embezzling is worth it
    pub embezzle_reserve: u32,
    pub delay: DelayConfig,
    /// secret ally, by player name
    pub friend: Option<String>,
    /// cooperating bots, by player name
    pub allies: Vec<String>,
    /// only chat from this player is forwarded
    pub chat_partner: Option<String>,
    pub seed: Option<u64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            search_horizon: 7,
            chance_to_bluff: 0.5,
            chance_to_challenge: 0.1,
            max_bluffed_roles: 2,
            embezzle_reserve: 3,
            delay: DelayConfig::default(),
            friend: None,
            allies: vec![],
            chat_partner: None,
            seed: None,
        }
    }
}

/// Knobs of the search evaluation.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalWeights {
    pub influence: f64,
    pub opponent_influence: f64,
    pub cash: f64,
    pub opponent_cash: f64,
    pub opponents: f64,
}

impl Default for EvalWeights {
    fn default() -> Self {
        EvalWeights {
            influence: 40.0,
            opponent_influence: 30.0,
            cash: 3.0,
            opponent_cash: 2.0,
            opponents: 50.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub depth: usize,
    pub weights: EvalWeights,
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            depth: 5,
            weights: EvalWeights::default(),
            seed: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub policy: PolicyConfig,
    pub search: SearchConfig,
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Config, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            source,
            path: path.to_path_buf(),
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            source,
            path: path.to_path_buf(),
        })?;
        config.with_env().validate()
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::default().with_env().validate()
    }

    pub fn with_env(self) -> Config {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `COUP_AI_*` overrides looked up through `read`. Unparseable values are
    /// ignored.
    pub fn with_overrides<F>(mut self, mut read: F) -> Config
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut read = |name: &str| read(&format!("{ENV_PREFIX}{name}"));

        if let Some(value) = read("SEARCH_HORIZON").and_then(|raw| raw.trim().parse().ok()) {
            self.policy.search_horizon = value;
        }
        if let Some(value) = read("CHANCE_TO_BLUFF").and_then(|raw| raw.trim().parse().ok()) {
            self.policy.chance_to_bluff = value;
        }
        if let Some(value) = read("CHANCE_TO_CHALLENGE").and_then(|raw| raw.trim().parse().ok()) {
            self.policy.chance_to_challenge = value;
        }
        if let Some(value) = read("DELAY_MS").and_then(|raw| raw.trim().parse().ok()) {
            self.policy.delay.base_ms = value;
        }
        if let Some(value) = read("DELAY_SPREAD_MS").and_then(|raw| raw.trim().parse().ok()) {
            self.policy.delay.spread_ms = value;
        }
        if let Some(value) = read("FRIEND").filter(|raw| !raw.trim().is_empty()) {
            self.policy.friend = Some(value.trim().to_string());
        }
        if let Some(value) = read("SEARCH_DEPTH").and_then(|raw| raw.trim().parse().ok()) {
            self.search.depth = value;
        }
        if let Some(seed) = read("SEED").and_then(|raw| raw.trim().parse().ok()) {
            self.policy.seed = Some(seed);
            self.search.seed = Some(seed);
        }

        self
    }

    pub fn validate(self) -> Result<Config, ConfigError> {
        let policy = &self.policy;
        for (name, value) in [
            ("chance_to_bluff", policy.chance_to_bluff),
            ("chance_to_challenge", policy.chance_to_challenge),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{name} must be within [0, 1], got {value}")));
            }
        }
        if policy.search_horizon == 0 {
            return Err(ConfigError::Invalid("search_horizon must be at least 1".to_string()));
        }
        if policy.delay.spread_ms > policy.delay.base_ms {
            return Err(ConfigError::Invalid("delay spread cannot exceed the base delay".to_string()));
        }
        if self.search.depth == 0 {
            return Err(ConfigError::Invalid("search depth must be at least 1".to_string()));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use crate::config::{Config, PolicyConfig};
    use crate::error::ConfigError;

    #[test]
    fn overrides_default_fallbacks() {
        let config = Config::default().with_overrides(|_| None);
        assert_eq!(config, Config::default());
        assert_eq!(config.policy.search_horizon, 7);
        assert_eq!(config.search.depth, 5);
    }

    #[test]
    fn overrides_respect_prefixed_keys() {
        let mut vars = HashMap::new();
        vars.insert("COUP_AI_CHANCE_TO_BLUFF".to_string(), "0.25".to_string());
        vars.insert("COUP_AI_SEARCH_DEPTH".to_string(), " 3 ".to_string());
        vars.insert("COUP_AI_SEED".to_string(), "42".to_string());
        vars.insert("COUP_AI_SEARCH_HORIZON".to_string(), "lots".to_string());

        let config = Config::default().with_overrides(|key| vars.get(key).cloned());
        assert!((config.policy.chance_to_bluff - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.search.depth, 3);
        assert_eq!(config.policy.seed, Some(42));
        assert_eq!(config.search.seed, Some(42));
        // unparseable values are ignored
        assert_eq!(config.policy.search_horizon, 7);
    }

    #[test]
    fn probabilities_are_validated() {
        let mut config = Config::default();
        config.policy.chance_to_challenge = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{"policy": {"friend": "alice", "delay": {"base_ms": 10}}}"#).unwrap();
        assert_eq!(config.policy.friend.as_deref(), Some("alice"));
        assert_eq!(config.policy.delay.base_ms, 10);
        assert_eq!(config.policy.delay.spread_ms, 500);
        assert_eq!(config.policy.max_bluffed_roles, PolicyConfig::default().max_bluffed_roles);
    }
}
