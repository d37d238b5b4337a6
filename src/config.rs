//! TOML run settings.
//!
//! Every section and key is optional:
//! ```toml
//! [strategy]
//! algorithm = "expectimax"   # or "minimax"
//! max_depth = 3
//! cache_enabled = true
//! prob_cutoff = 0.0
//!
//! [weights]
//! snake = 1.0
//! monotonicity = -4.0
//!
//! [run]
//! seed = 42
//! max_steps = 5000
//! time_budget_ms = 200
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::search::{Algorithm, ConfigError, HeuristicWeights, SearchBudget, StrategyConfig};

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid search settings: {0}")]
    Invalid(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategySection {
    pub algorithm: Algorithm,
    /// Kept signed so a negative value reaches validation instead of failing to parse.
    pub max_depth: i64,
    pub cache_enabled: bool,
    pub prob_cutoff: f64,
}

impl Default for StrategySection {
    fn default() -> Self {
        Self { algorithm: Algorithm::default(), max_depth: 3, cache_enabled: true, prob_cutoff: 0.0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSection {
    pub seed: Option<u64>,
    pub max_steps: Option<u64>,
    pub time_budget_ms: Option<u64>,
    pub node_budget: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub strategy: StrategySection,
    pub weights: HeuristicWeights,
    pub run: RunSection,
}

impl Settings {
    /// Read and parse a settings file. Values are validated by [`Settings::strategy`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|source| SettingsError::Io { path: path.to_path_buf(), source })?;
        let settings = Self::from_toml_str(&content)?;
        info!(path = %path.display(), algorithm = %settings.strategy.algorithm, depth = settings.strategy.max_depth, "loaded settings");
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Validated search configuration.
    pub fn strategy(&self) -> Result<StrategyConfig, SettingsError> {
        let s = &self.strategy;
        let cfg = StrategyConfig::new(s.algorithm, s.max_depth, self.weights.clone())?
            .with_cache(s.cache_enabled)
            .with_prob_cutoff(s.prob_cutoff)?;
        Ok(cfg)
    }

    pub fn budget(&self) -> SearchBudget {
        SearchBudget {
            max_nodes: self.run.node_budget,
            time_limit: self.run.time_budget_ms.map(Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_gives_defaults() {
        let s = Settings::from_toml_str("").unwrap();
        assert_eq!(s, Settings::default());
        let cfg = s.strategy().unwrap();
        assert_eq!(cfg.algorithm(), Algorithm::Expectimax);
        assert_eq!(cfg.max_depth(), 3);
        assert!(s.budget().is_unlimited());
    }

    #[test]
    fn load_from_file() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
[strategy]
algorithm = "minimax"
max_depth = 5

[weights]
merges = 10.0

[run]
seed = 7
time_budget_ms = 150
node_budget = 100000
"#
        )
        .unwrap();
        let s = Settings::load(f.path()).unwrap();
        let cfg = s.strategy().unwrap();
        assert_eq!(cfg.algorithm(), Algorithm::Minimax);
        assert_eq!(cfg.max_depth(), 5);
        assert_eq!(cfg.weights().merges, 10.0);
        assert_eq!(cfg.weights().snake, HeuristicWeights::default().snake);
        assert_eq!(s.run.seed, Some(7));
        assert_eq!(
            s.budget(),
            SearchBudget { max_nodes: Some(100_000), time_limit: Some(Duration::from_millis(150)) }
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let s = Settings::from_toml_str("[strategy]\nmax_depth = -2\n").unwrap();
        assert!(matches!(s.strategy(), Err(SettingsError::Invalid(ConfigError::NegativeDepth(-2)))));
        let s = Settings::from_toml_str("[strategy]\nprob_cutoff = 2.0\n").unwrap();
        assert!(matches!(s.strategy(), Err(SettingsError::Invalid(ConfigError::ProbCutoff(_)))));
        let s = Settings::from_toml_str("[weights]\nsnake = 0.0\nmonotonicity = 0.0\nmerges = 0.0\nfree_tiles = 0.0\n").unwrap();
        assert!(matches!(s.strategy(), Err(SettingsError::Invalid(ConfigError::EmptyWeights))));
    }

    #[test]
    fn unknown_keys_and_bad_syntax() {
        assert!(matches!(Settings::from_toml_str("[strategy]\ndepth = 3\n"), Err(SettingsError::Parse(_))));
        assert!(matches!(Settings::from_toml_str("[strategy\n"), Err(SettingsError::Parse(_))));
        assert!(matches!(Settings::from_toml_str("[strategy]\nalgorithm = \"greedy\"\n"), Err(SettingsError::Parse(_))));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }
}
