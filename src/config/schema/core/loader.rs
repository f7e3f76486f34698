use super::types::Config;
use crate::error::{ConfigError, Result};
use directories::UserDirs;
use std::fs;
use std::path::Path;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigError + '_ {
    move |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn parse(contents: &str, path: &Path) -> Result<Config> {
    toml::from_str(contents)
        .map_err(|err| ConfigError::Load(format!("parse {}: {err}", path.display())).into())
}

impl Config {
    /// Load `~/.reportgate/config.toml`, writing defaults on first run.
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .ok_or_else(|| ConfigError::Load("could not find home directory".into()))?;
        let reportgate_dir = home.join(".reportgate");
        let config_path = reportgate_dir.join("config.toml");

        if !reportgate_dir.exists() {
            fs::create_dir_all(&reportgate_dir).map_err(io_error(&reportgate_dir))?;
        }

        let mut config = if config_path.exists() {
            let contents = fs::read_to_string(&config_path).map_err(io_error(&config_path))?;
            let mut config = parse(&contents, &config_path)?;
            config.config_path.clone_from(&config_path);
            config.data_dir.clone_from(&reportgate_dir);
            config
        } else {
            let config = Self {
                config_path: config_path.clone(),
                data_dir: reportgate_dir.clone(),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load an explicit config file. Its directory becomes the data directory.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(io_error(path))?;
        let mut config = parse(&contents, path)?;
        config.config_path = path.to_path_buf();
        config.data_dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or_else(|| Path::new(".").to_path_buf(), Path::to_path_buf);

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|err| ConfigError::Load(format!("serialize config: {err}")))?;
        fs::write(&self.config_path, toml_str).map_err(io_error(&self.config_path))?;
        Ok(())
    }
}
