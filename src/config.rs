use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How many ticks the driver runs before exiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Tick forever until interrupted
    Continuous,
    /// Run a fixed number of ticks, then exit
    Batch(u32),
    /// A single tick
    Once,
}

impl RunMode {
    /// Build a run mode from its name and an optional batch size
    pub fn from_parts(name: &str, checks: Option<u32>) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "continuous" | "loop" => Ok(RunMode::Continuous),
            "batch" => match checks.unwrap_or(1) {
                0 => Err(ConfigError::Invalid("batch mode needs at least one check".into())),
                n => Ok(RunMode::Batch(n)),
            },
            "once" | "single" => Ok(RunMode::Once),
            other => Err(ConfigError::Invalid(format!("unknown run mode {other:?}"))),
        }
    }
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_parts(s, None)
    }
}

/// Settings read from the JSON config document
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub search_url: String,
    /// Seconds between ticks
    pub check_interval: u64,
    pub listings_cache_file: PathBuf,
    /// Origin prepended to relative listing links. Defaults to the origin of `search_url`.
    #[serde(default)]
    pub site_origin: Option<String>,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Replace `check_interval`, applying the same rule as the config file
    pub fn override_interval(&mut self, secs: Option<u64>) -> Result<(), ConfigError> {
        match secs {
            Some(0) => Err(ConfigError::Invalid("interval must be positive".into())),
            Some(secs) => {
                self.check_interval = secs;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Load the config file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json(&raw)?;

        if let Ok(cache_file) = std::env::var("LISTINGS_CACHE_FILE") {
            if !cache_file.trim().is_empty() {
                config.listings_cache_file = PathBuf::from(cache_file);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.check_interval == 0 {
            return Err(ConfigError::Invalid("check_interval must be positive".into()));
        }
        Url::parse(&self.search_url)
            .map_err(|e| ConfigError::Invalid(format!("search_url {:?}: {e}", self.search_url)))?;
        if let Some(origin) = &self.site_origin {
            Url::parse(origin)
                .map_err(|e| ConfigError::Invalid(format!("site_origin {origin:?}: {e}")))?;
        }
        Ok(())
    }

    /// Origin used to absolutize relative links
    pub fn origin(&self) -> Result<Url, ConfigError> {
        if let Some(origin) = &self.site_origin {
            return Url::parse(origin)
                .map_err(|e| ConfigError::Invalid(format!("site_origin {origin:?}: {e}")));
        }

        let search = Url::parse(&self.search_url)
            .map_err(|e| ConfigError::Invalid(format!("search_url {:?}: {e}", self.search_url)))?;
        Url::parse(&search.origin().ascii_serialization())
            .map_err(|e| ConfigError::Invalid(format!("search_url has no usable origin: {e}")))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Pick the run mode from CLI values, falling back to `RUN_MODE` / `MAX_CHECKS`
pub fn resolve_run_mode(
    cli_mode: Option<&str>,
    cli_checks: Option<u32>,
) -> Result<RunMode, ConfigError> {
    resolve_run_mode_from(
        cli_mode,
        cli_checks,
        std::env::var("RUN_MODE").ok(),
        std::env::var("MAX_CHECKS").ok(),
    )
}

/// CLI beats environment for both the mode name and the batch size.
/// A batch size with no mode anywhere means batch mode.
fn resolve_run_mode_from(
    cli_mode: Option<&str>,
    cli_checks: Option<u32>,
    env_mode: Option<String>,
    env_checks: Option<String>,
) -> Result<RunMode, ConfigError> {
    let checks = match cli_checks {
        Some(n) => Some(n),
        None => env_checks
            .map(|raw| {
                raw.trim()
                    .parse::<u32>()
                    .map_err(|_| ConfigError::Invalid(format!("MAX_CHECKS {raw:?} is not a number")))
            })
            .transpose()?,
    };

    let name = match (cli_mode, env_mode) {
        (Some(name), _) => name.to_string(),
        (None, Some(name)) if !name.trim().is_empty() => name,
        _ if checks.is_some() => "batch".to_string(),
        _ => "continuous".to_string(),
    };

    RunMode::from_parts(&name, checks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "search_url": "https://www.boligportal.dk/lejeboliger/k%C3%B8benhavn/?max_monthly_rent=12000",
        "check_interval": 300,
        "listings_cache_file": "data/seen_listings.txt"
    }"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::from_json(MINIMAL).unwrap();
        assert_eq!(config.check_interval, 300);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.listings_cache_file, PathBuf::from("data/seen_listings.txt"));
        assert_eq!(config.origin().unwrap().as_str(), "https://www.boligportal.dk/");
    }

    #[test]
    fn explicit_origin_wins() {
        let raw = MINIMAL.replace(
            "\"check_interval\": 300,",
            "\"check_interval\": 300, \"site_origin\": \"https://mirror.example.com\",",
        );
        let config = Config::from_json(&raw).unwrap();
        assert_eq!(config.origin().unwrap().as_str(), "https://mirror.example.com/");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let raw = MINIMAL.replace("300", "0");
        assert!(matches!(Config::from_json(&raw), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn relative_search_url_is_rejected() {
        let raw = r#"{"search_url": "/lejeboliger/", "check_interval": 5, "listings_cache_file": "x"}"#;
        assert!(matches!(Config::from_json(raw), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_field_is_a_parse_error() {
        let raw = r#"{"search_url": "https://a.dk/", "check_interval": 5}"#;
        assert!(matches!(Config::from_json(raw), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn run_modes_parse() {
        assert_eq!(RunMode::from_parts("continuous", None).unwrap(), RunMode::Continuous);
        assert_eq!(RunMode::from_parts("Batch", Some(3)).unwrap(), RunMode::Batch(3));
        assert_eq!(RunMode::from_parts("batch", None).unwrap(), RunMode::Batch(1));
        assert_eq!("once".parse::<RunMode>().unwrap(), RunMode::Once);
        assert!(RunMode::from_parts("batch", Some(0)).is_err());
        assert!(RunMode::from_parts("sometimes", None).is_err());
    }

    #[test]
    fn cli_interval_override() {
        let mut config = Config::from_json(MINIMAL).unwrap();
        config.override_interval(None).unwrap();
        assert_eq!(config.check_interval, 300);
        config.override_interval(Some(60)).unwrap();
        assert_eq!(config.check_interval, 60);
        assert!(matches!(config.override_interval(Some(0)), Err(ConfigError::Invalid(_))));
        assert_eq!(config.check_interval, 60);
    }

    #[test]
    fn cli_run_mode_beats_environment() {
        let env = |s: &str| Some(s.to_string());

        assert_eq!(
            resolve_run_mode_from(None, Some(5), env("batch"), env("3")).unwrap(),
            RunMode::Batch(5)
        );
        assert_eq!(
            resolve_run_mode_from(Some("once"), None, env("batch"), env("3")).unwrap(),
            RunMode::Once
        );
        assert_eq!(
            resolve_run_mode_from(None, None, env("batch"), env("3")).unwrap(),
            RunMode::Batch(3)
        );
        assert_eq!(
            resolve_run_mode_from(Some("batch"), None, None, env("4")).unwrap(),
            RunMode::Batch(4)
        );
        assert_eq!(resolve_run_mode_from(None, Some(5), None, None).unwrap(), RunMode::Batch(5));
        assert_eq!(resolve_run_mode_from(None, None, None, None).unwrap(), RunMode::Continuous);
        assert!(resolve_run_mode_from(None, None, env("batch"), env("many")).is_err());
    }

    #[test]
    fn cache_file_env_override() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("bolig_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, MINIMAL).unwrap();

        std::env::set_var("LISTINGS_CACHE_FILE", "/srv/bolig/seen.txt");
        let overridden = Config::load(&path).unwrap();
        std::env::set_var("LISTINGS_CACHE_FILE", "   ");
        let blank = Config::load(&path).unwrap();
        std::env::remove_var("LISTINGS_CACHE_FILE");
        let plain = Config::load(&path).unwrap();

        assert_eq!(overridden.listings_cache_file, PathBuf::from("/srv/bolig/seen.txt"));
        assert_eq!(blank.listings_cache_file, PathBuf::from("data/seen_listings.txt"));
        assert_eq!(plain.listings_cache_file, PathBuf::from("data/seen_listings.txt"));
    }
}
