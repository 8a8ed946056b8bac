//! Loader for Theater configuration with file + environment overlays.
//!
//! Sources are merged in order: files and inline snippets as they were
//! attached, then `THEATER__`-prefixed environment variables (nesting with
//! `__`, e.g. `THEATER__TRAVERSAL__STALL_THRESHOLD=4`), so the environment
//! always wins. String values may reference `${VAR}`; references are expanded
//! recursively up to a fixed depth before the tree is deserialised.
use config::{Config, Environment, File};
use serde_json::Value;
use std::path::Path;

mod model;

pub use model::{
    BrowserConfig, BrowserKind, ControlMatcher, DownloadConfig, FallbackClick, LoggingConfig,
    MatcherConfig, Pauses, ScoringConfig, ServerConfig, SessionConfig, StealthLevel,
    TheaterConfig, TraversalConfig, ViewportConfig,
};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "THEATER";

/// A configuration value the engine cannot run with.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} must not be negative")]
    Negative(&'static str),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("traversal.fallback_click.{name} must be within [0, 1], got {value}")]
    Ratio { name: &'static str, value: f64 },
    #[error("matchers.position_pattern does not compile: {0}")]
    Pattern(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),
    #[error("configuration does not match schema: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring.
pub struct TheaterConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env: bool,
}

impl Default for TheaterConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TheaterConfigLoader {
    /// Start with no files and `THEATER__` environment overrides enabled.
    ///
    /// ```
    /// use theater_config::TheaterConfigLoader;
    ///
    /// let config = TheaterConfigLoader::new()
    ///     .without_env()
    ///     .load()
    ///     .expect("defaults are valid");
    ///
    /// assert_eq!(config.traversal.stall_threshold, 8);
    /// assert_eq!(config.scoring.max_entry_attempts, 5);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env: true,
        }
    }

    /// Ignore the process environment (tests, embedded use).
    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Attach a YAML/TOML/JSON file that must exist; format inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is skipped when absent.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use theater_config::{ControlMatcher, TheaterConfigLoader};
    ///
    /// let cfg = TheaterConfigLoader::new()
    ///     .without_env()
    ///     .with_yaml_str(
    ///         r#"
    /// matchers:
    ///   next_controls:
    ///     - label: "Suivant"
    ///     - selector: "div.next-arrow"
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.matchers.next_controls[0], ControlMatcher::label("Suivant"));
    /// assert_eq!(cfg.matchers.next_controls[1].css(), "div.next-arrow");
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` references, deserialise and validate.
    pub fn load(self) -> Result<TheaterConfig, LoadError> {
        let mut builder = self.builder;
        if self.env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        }
        let cfg = builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: TheaterConfig = serde_json::from_value(v)?;
        typed.validate()?;
        Ok(typed)
    }
}
