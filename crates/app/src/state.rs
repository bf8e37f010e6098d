use std::fs;
use std::path::{Path, PathBuf};

use common::crypto::{Secret, SecretKey};
use common::pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "sealbatch";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const OWNER_KEY_FILE_NAME: &str = "owner.pem";
pub const ORACLE_KEY_FILE_NAME: &str = "oracle.pem";
pub const MASKING_KEY_FILE_NAME: &str = "masking.key";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Settings for every pipeline this directory drives
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the sealbatch directory (~/.sealbatch)
    pub dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Path to the owner key PEM file
    pub owner_key_path: PathBuf,
    /// Path to the oracle signing key PEM file
    pub oracle_key_path: PathBuf,
    /// Path to the hex-encoded masking key
    pub masking_key_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the sealbatch directory path (custom or default ~/.sealbatch)
    pub fn dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    fn paths(dir: PathBuf, config: AppConfig) -> Self {
        Self {
            config_path: dir.join(CONFIG_FILE_NAME),
            owner_key_path: dir.join(OWNER_KEY_FILE_NAME),
            oracle_key_path: dir.join(ORACLE_KEY_FILE_NAME),
            masking_key_path: dir.join(MASKING_KEY_FILE_NAME),
            dir,
            config,
        }
    }

    /// Initialize a new state directory with fresh keys.
    ///
    /// With `force`, an existing directory is overwritten in place.
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
        force: bool,
    ) -> Result<Self, StateError> {
        let dir = Self::dir(custom_path)?;

        if dir.exists() && !force {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&dir)?;
        let state = Self::paths(dir, config.unwrap_or_default());

        fs::write(&state.owner_key_path, SecretKey::generate().to_pem())?;
        fs::write(&state.oracle_key_path, SecretKey::generate().to_pem())?;
        fs::write(&state.masking_key_path, Secret::generate().to_hex())?;

        let config_toml = toml::to_string_pretty(&state.config)?;
        fs::write(&state.config_path, config_toml)?;

        tracing::info!("initialized sealbatch directory at {}", state.dir.display());
        Ok(state)
    }

    /// Load existing state from the sealbatch directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let dir = Self::dir(custom_path)?;

        if !dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let mut state = Self::paths(dir, AppConfig::default());
        for (path, name) in [
            (&state.config_path, CONFIG_FILE_NAME),
            (&state.owner_key_path, OWNER_KEY_FILE_NAME),
            (&state.oracle_key_path, ORACLE_KEY_FILE_NAME),
            (&state.masking_key_path, MASKING_KEY_FILE_NAME),
        ] {
            if !path.exists() {
                return Err(StateError::MissingFile(name.to_string()));
            }
        }

        let config_toml = fs::read_to_string(&state.config_path)?;
        state.config = toml::from_str(&config_toml)?;
        Ok(state)
    }

    pub fn load_owner_key(&self) -> Result<SecretKey, StateError> {
        Self::load_pem_key(&self.owner_key_path)
    }

    pub fn load_oracle_key(&self) -> Result<SecretKey, StateError> {
        Self::load_pem_key(&self.oracle_key_path)
    }

    pub fn load_masking_key(&self) -> Result<Secret, StateError> {
        let hex = fs::read_to_string(&self.masking_key_path)?;
        Secret::from_hex(&hex).map_err(|e| StateError::InvalidKey(e.to_string()))
    }

    fn load_pem_key(path: &Path) -> Result<SecretKey, StateError> {
        let pem = fs::read_to_string(path)?;
        let key = SecretKey::from_pem(&pem).map_err(|e| StateError::InvalidKey(e.to_string()))?;
        Ok(key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("sealbatch directory not initialized. Run 'sealbatch init' first")]
    NotInitialized,

    #[error("sealbatch directory already initialized (use --force to overwrite)")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn state_dir(temp: &TempDir) -> Option<PathBuf> {
        Some(temp.path().join("state"))
    }

    #[test]
    fn test_init_then_load() {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.pipeline.cooldown_secs = 5;

        let created = AppState::init(state_dir(&temp), Some(config.clone()), false).unwrap();
        let loaded = AppState::load(state_dir(&temp)).unwrap();

        assert_eq!(loaded.config.pipeline, config.pipeline);
        assert_eq!(
            loaded.load_owner_key().unwrap().public(),
            created.load_owner_key().unwrap().public()
        );
        assert_ne!(
            loaded.load_owner_key().unwrap().public(),
            loaded.load_oracle_key().unwrap().public()
        );
        assert!(loaded.load_masking_key().is_ok());
    }

    #[test]
    fn test_init_refuses_existing_dir_without_force() {
        let temp = TempDir::new().unwrap();
        let first = AppState::init(state_dir(&temp), None, false).unwrap();
        let first_owner = first.load_owner_key().unwrap().public();

        assert!(matches!(
            AppState::init(state_dir(&temp), None, false),
            Err(StateError::AlreadyInitialized)
        ));

        let second = AppState::init(state_dir(&temp), None, true).unwrap();
        assert_ne!(
            first.config.pipeline.instance_id,
            second.config.pipeline.instance_id
        );
        assert_ne!(
            AppState::load(state_dir(&temp))
                .unwrap()
                .load_owner_key()
                .unwrap()
                .public(),
            first_owner
        );
    }

    #[test]
    fn test_load_errors() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            AppState::load(state_dir(&temp)),
            Err(StateError::NotInitialized)
        ));

        let state = AppState::init(state_dir(&temp), None, false).unwrap();
        fs::remove_file(&state.oracle_key_path).unwrap();
        assert!(matches!(
            AppState::load(state_dir(&temp)),
            Err(StateError::MissingFile(name)) if name == ORACLE_KEY_FILE_NAME
        ));
    }

    #[test]
    fn test_config_without_pipeline_table_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.pipeline.restrict_callback_caller);
    }
}
