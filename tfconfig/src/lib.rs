//! # TuneFuse configuration
//!
//! One YAML tree per process. The embedded `tunefuse.yaml` provides every
//! default; `config.yaml` in the configuration directory is merged over it
//! and `TUNEFUSE_CONFIG__SECTION__KEY` variables win over both. The
//! `engine` section decodes into [`EngineSettings`].
//!
//! ## Usage
//!
//! ```no_run
//! use tfconfig::get_config;
//!
//! let config = get_config();
//! let engine = config.get_engine_settings()?;
//! println!("{} provider endpoint(s)", engine.provider_endpoints.len());
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde_yaml::{Mapping, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::info;

pub mod engine;

pub use engine::{EngineSection, EngineSettings, ProviderEndpoint};

// Embedded default configuration
const DEFAULT_CONFIG: &str = include_str!("tunefuse.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load TuneFuse configuration"));
}

const ENV_CONFIG_DIR: &str = "TUNEFUSE_CONFIG";
const ENV_PREFIX: &str = "TUNEFUSE_CONFIG__";
const CONFIG_DIR_NAME: &str = ".tunefuse";

const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration manager for TuneFuse
///
/// Holds the merged YAML tree behind a mutex. Keys are stored lowercased,
/// so lookups are case-insensitive.
///
/// # Examples
///
/// ```no_run
/// use tfconfig::get_config;
///
/// let config = get_config();
/// let level = config.get_log_level();
/// println!("log level: {}", level);
/// ```
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: Option<PathBuf>,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(self.data.lock().clone()),
        }
    }
}

impl Config {
    /// First candidate directory; nothing is created here
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        if Path::new(CONFIG_DIR_NAME).exists() {
            return CONFIG_DIR_NAME.to_string();
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        CONFIG_DIR_NAME.to_string()
    }

    /// Creates `path` if needed and checks it is a writable directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        fs::read_dir(path)?;

        Ok(())
    }

    /// Configuration directory: `directory` when given, else
    /// `$TUNEFUSE_CONFIG`, else an existing `./.tunefuse` or `~/.tunefuse`,
    /// else a new `./.tunefuse`
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir_path))?;
        Ok(dir_path)
    }

    /// Reads `config.yaml` from the configuration directory (see
    /// [`Config::config_dir`]) over the embedded defaults, applies the
    /// environment overrides and writes the merged tree back
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir = %config_dir, "Using config directory");

        let path = Path::new(&config_dir).join("config.yaml");

        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path.display(), "Loaded config file");
                let external: Value = serde_yaml::from_slice(&data)?;
                merge_yaml(&mut value, &lower_keys_value(external));
            }
            Err(_) => {
                info!(config_file = %path.display(), "Config file not found, using default embedded config");
            }
        }

        let mut value = lower_keys_value(value);
        apply_env_overrides(&mut value, env::vars());

        let config = Config {
            config_dir,
            path: Some(path),
            data: Mutex::new(value),
        };

        config.save()?;
        Ok(config)
    }

    /// Builds an in-memory configuration from a YAML document
    ///
    /// The document is merged over the embedded defaults; nothing is read
    /// from or written to disk and environment overrides are not applied.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        let external: Value = serde_yaml::from_str(yaml)?;
        merge_yaml(&mut value, &lower_keys_value(external));

        Ok(Config {
            config_dir: String::new(),
            path: None,
            data: Mutex::new(lower_keys_value(value)),
        })
    }

    /// Directory the configuration was loaded from (empty when in-memory)
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    /// Writes the tree back to `config.yaml`; no-op for in-memory configs
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let yaml = serde_yaml::to_string(&*self.data.lock())?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Stores `value` under `path` (e.g. `&["engine", "cacheTtlMs"]`) and saves
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.data.lock();
            set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock();
        get_value_internal(&data, path)
    }

    /// Returns the engine settings, defaults filled in and values clamped
    pub fn get_engine_settings(&self) -> Result<EngineSettings> {
        let section = match self.get_value(&["engine"]) {
            Ok(value @ Value::Mapping(_)) => serde_yaml::from_value::<EngineSection>(value)?,
            Ok(Value::Null) | Err(_) => EngineSection::default(),
            Ok(_) => return Err(anyhow!("engine section is not a mapping")),
        };
        Ok(section.into_settings())
    }

    /// Replaces the configured provider endpoints
    pub fn set_provider_endpoints(&self, endpoints: &[ProviderEndpoint]) -> Result<()> {
        let value = serde_yaml::to_value(endpoints)?;
        self.set_value(&["engine", "providerEndpoints"], value)
    }

    /// Returns the configured log level, `info` when unset
    pub fn get_log_level(&self) -> String {
        match self.get_value(&["logging", "level"]) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            Ok(_) | Err(_) => DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    /// Sets the log level
    pub fn set_log_level(&self, level: &str) -> Result<()> {
        self.set_value(&["logging", "level"], Value::String(level.to_string()))
    }
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    if path.is_empty() {
        *data = value;
        return Ok(());
    }
    if let Value::Mapping(map) = data {
        let key_value = Value::String(path[0].to_lowercase());
        if path.len() == 1 {
            map.insert(key_value, lower_keys_value(value));
        } else {
            let entry = map
                .entry(key_value)
                .or_insert(Value::Mapping(Mapping::new()));
            set_value_internal(entry, &path[1..], value)?;
        }
        Ok(())
    } else {
        Err(anyhow!("cannot set {}: parent is not a mapping", path.join(".")))
    }
}

fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
    let mut current = data;
    for (i, key) in path.iter().enumerate() {
        if let Value::Mapping(map) = current {
            match map.get(&Value::String(key.to_lowercase())) {
                Some(next) => current = next,
                None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
            }
        } else {
            return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
        }
    }
    Ok(current.clone())
}

fn apply_env_overrides(config: &mut Value, vars: impl Iterator<Item = (String, String)>) {
    for (key, value) in vars {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let key_path = stripped.split("__").collect::<Vec<_>>();
            let _ = set_value_internal(config, &key_path, convert_env_value(&value));
        }
    }
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut new_map = Mapping::new();
            for (k, v) in map {
                let key = match k {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                new_map.insert(key, lower_keys_value(v));
            }
            Value::Mapping(new_map)
        }
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

/// Process-wide configuration, loaded from the default directory on first use
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Mappings merge key by key; any other `external` value replaces the default
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_embedded_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        let engine = config.get_engine_settings().unwrap();
        assert_eq!(engine.provider_endpoints.len(), 2);
        assert_eq!(engine.provider_endpoints[0].platform, "netease");
        assert_eq!(engine.cache_max_entries, 200);
        assert_eq!(engine.validation_timeout, Duration::from_millis(2500));
        assert_eq!(config.get_log_level(), "info");
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let config = Config::from_yaml("engine:\n  CacheTTLms: 60000\n").unwrap();
        let engine = config.get_engine_settings().unwrap();
        assert_eq!(engine.cache_ttl, Duration::from_secs(60));
        assert_eq!(
            config.get_value(&["ENGINE", "cachettlms"]).unwrap(),
            Value::Number(60000.into())
        );
    }

    #[test]
    fn test_sequences_replace_defaults() {
        let yaml = r#"
engine:
  providerEndpoints:
    - name: mirror-a
      platform: netease
      baseUrl: http://a.example
    - name: mirror-b
      platform: netease
      baseUrl: http://b.example
      timeoutMs: 5000
    - name: mirror-c
      platform: netease
      baseUrl: http://c.example
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let engine = config.get_engine_settings().unwrap();
        let names: Vec<_> = engine
            .provider_endpoints
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, ["mirror-a", "mirror-b", "mirror-c"]);
        assert_eq!(engine.provider_endpoints[1].timeoutms, Some(5000));
    }

    #[test]
    fn test_env_overrides() {
        let mut value = lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG).unwrap());
        let vars = vec![
            ("TUNEFUSE_CONFIG__ENGINE__CACHEMAXENTRIES".to_string(), "42".to_string()),
            ("TUNEFUSE_CONFIG__LOGGING__LEVEL".to_string(), "debug".to_string()),
            ("UNRELATED".to_string(), "1".to_string()),
        ];
        apply_env_overrides(&mut value, vars.into_iter());

        assert_eq!(
            get_value_internal(&value, &["engine", "cachemaxentries"]).unwrap(),
            Value::Number(42.into())
        );
        assert_eq!(
            get_value_internal(&value, &["logging", "level"]).unwrap(),
            Value::String("debug".into())
        );
    }

    #[test]
    fn test_set_value_and_missing_path() {
        let config = Config::from_yaml("{}").unwrap();
        config.set_log_level("trace").unwrap();
        assert_eq!(config.get_log_level(), "trace");
        assert!(config.get_value(&["nope", "missing"]).is_err());
    }
}
