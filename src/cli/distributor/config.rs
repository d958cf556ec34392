use std::{fs, path::PathBuf};

use reward_distribution::config::DistributorConfig;

use crate::commands::Error;

/// Settings file of the distributor CLI.
#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub settings: DistributorConfig,
}

impl Config {
    /// `<config dir>/reward-distributor/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_default()
            .join("reward-distributor")
            .join("config.toml")
    }

    /// Load the default settings file, creating it when missing.
    pub fn load() -> Result<Self, Error> {
        let path = Self::default_path();
        if !path.exists() {
            let config = Self {
                path,
                settings: DistributorConfig::default(),
            };
            config.save()?;
            return Ok(config);
        }
        Self::load_from(path)
    }

    pub fn load_from(path: PathBuf) -> Result<Self, Error> {
        let raw = fs::read_to_string(&path)?;
        let settings = DistributorConfig::from_toml_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(Self { path, settings })
    }

    pub fn save(&self) -> Result<(), Error> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let toml = self
            .settings
            .to_toml_string()
            .map_err(|e| Error::Config(e.to_string()))?;
        fs::write(&self.path, toml)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_settings_load_back() {
        let path = std::env::temp_dir()
            .join(format!("reward-distributor-{}", std::process::id()))
            .join("config.toml");
        let mut settings = DistributorConfig::default();
        settings.batching.batch_size = 7;
        settings.rewards.unlocked_reward_cap = Some(10u128.pow(24));

        Config {
            path: path.clone(),
            settings: settings.clone(),
        }
        .save()
        .unwrap();
        let loaded = Config::load_from(path.clone()).unwrap();
        assert_eq!(loaded.settings, settings);

        fs::write(&path, "[batching]\nbatch_size = 0\n").unwrap();
        assert!(matches!(Config::load_from(path.clone()), Err(Error::Config(_))));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
