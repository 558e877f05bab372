use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::consts::{
    DEFAULT_BASE_URL, DEFAULT_MAX_SESSIONS, DEFAULT_PEST_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS,
};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Config {
    #[serde(default)]
    pub(crate) base_urls: Vec<String>,
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
    #[serde(default)]
    pub(crate) pest_timeout_secs: Option<u64>,
    #[serde(default)]
    pub(crate) max_sessions: Option<usize>,
    #[serde(default)]
    pub(crate) data_dir: Option<PathBuf>,
    #[serde(default)]
    pub(crate) no_color: bool,
    #[serde(default)]
    pub(crate) debug: bool,
}

/// Where the active configuration came from, reported once logging is up
#[derive(Debug)]
pub(crate) enum ConfigSource {
    Defaults,
    File(PathBuf),
    Invalid { path: PathBuf, message: String },
}

impl Config {
    pub(crate) fn load() -> (Self, ConfigSource) {
        let paths = match std::env::var_os("CROPCARE_CONFIG") {
            Some(explicit) => vec![PathBuf::from(explicit)],
            None => Self::get_config_paths(),
        };
        Self::load_from(&paths)
    }

    fn load_from(paths: &[PathBuf]) -> (Self, ConfigSource) {
        let mut invalid = None;
        for path in paths {
            if path.exists()
                && let Ok(content) = fs::read_to_string(path)
            {
                match toml::from_str::<Config>(&content) {
                    Ok(config) => return (config, ConfigSource::File(path.clone())),
                    Err(e) => {
                        if invalid.is_none() {
                            invalid = Some(ConfigSource::Invalid {
                                path: path.clone(),
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        (Self::default(), invalid.unwrap_or(ConfigSource::Defaults))
    }

    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. XDG config: ~/.config/cropcare/config.toml (Linux/cross-platform)
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("cropcare").join("config.toml"));
        }

        // 2. Platform config dir (macOS Application Support, Windows AppData)
        if let Some(config_dir) = dirs::config_dir() {
            let platform_path = config_dir.join("cropcare").join("config.toml");
            if !paths.contains(&platform_path) {
                paths.push(platform_path);
            }
        }

        // 3. Home directory: ~/.cropcare.toml
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".cropcare.toml"));
        }

        paths
    }

    pub(crate) fn base_urls(&self) -> Vec<String> {
        if self.base_urls.is_empty() {
            vec![DEFAULT_BASE_URL.to_string()]
        } else {
            self.base_urls.clone()
        }
    }

    pub(crate) fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    pub(crate) fn pest_timeout_secs(&self) -> u64 {
        self.pest_timeout_secs.unwrap_or(DEFAULT_PEST_TIMEOUT_SECS)
    }

    pub(crate) fn max_sessions(&self) -> usize {
        self.max_sessions.unwrap_or(DEFAULT_MAX_SESSIONS)
    }

    /// `CROPCARE_DATA_DIR` wins over the file; the fallback is the platform
    /// data dir.
    pub(crate) fn data_dir(&self) -> PathBuf {
        if let Some(dir) = std::env::var_os("CROPCARE_DATA_DIR") {
            return PathBuf::from(dir);
        }
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cropcare")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_paths() {
        let paths = Config::get_config_paths();
        assert!(!paths.is_empty());
        assert!(paths.iter().all(|p| p.to_string_lossy().contains("cropcare")));
    }

    #[test]
    fn defaults_when_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let (config, source) = Config::load_from(&[dir.path().join("absent.toml")]);
        assert!(matches!(source, ConfigSource::Defaults));
        assert_eq!(config.base_urls(), vec![DEFAULT_BASE_URL.to_string()]);
        assert_eq!(config.timeout_secs(), DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.max_sessions(), DEFAULT_MAX_SESSIONS);
    }

    #[test]
    fn parses_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
base_urls = ["http://10.0.2.2:8000", "http://192.168.1.5:8000"]
timeout_secs = 5
max_sessions = 20
debug = true
"#,
        )
        .unwrap();
        let (config, source) = Config::load_from(&[path.clone()]);
        assert!(matches!(source, ConfigSource::File(p) if p == path));
        assert_eq!(config.base_urls().len(), 2);
        assert_eq!(config.timeout_secs(), 5);
        assert_eq!(config.pest_timeout_secs(), DEFAULT_PEST_TIMEOUT_SECS);
        assert_eq!(config.max_sessions(), 20);
        assert!(config.debug);
    }

    #[test]
    fn invalid_file_falls_through_to_next() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.toml");
        let good = dir.path().join("good.toml");
        fs::write(&bad, "timeout_secs = \"soon\"").unwrap();
        fs::write(&good, "timeout_secs = 9").unwrap();

        let (config, source) = Config::load_from(&[bad.clone(), good]);
        assert!(matches!(source, ConfigSource::File(_)));
        assert_eq!(config.timeout_secs(), 9);

        let (config, source) = Config::load_from(&[bad]);
        assert!(matches!(source, ConfigSource::Invalid { .. }));
        assert_eq!(config.timeout_secs(), DEFAULT_TIMEOUT_SECS);
    }
}
