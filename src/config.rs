use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

const DEFAULT_ELEVENLABS_URL: &str = "https://api.elevenlabs.io";
const DEFAULT_TOPMEDIA_URL: &str = "https://api.topmediai.com";
const DEFAULT_TRANSLATE_URL: &str = "https://translate.googleapis.com";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Set {0} in the environment")]
    MissingApiKey(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

#[derive(Clone)]
pub enum ProviderConfig {
    ElevenLabs { api_key: String, base_url: Url },
    TopMedia { api_key: String, base_url: Url },
}

impl ProviderConfig {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderConfig::ElevenLabs { .. } => "elevenlabs",
            ProviderConfig::TopMedia { .. } => "topmedia",
        }
    }

    fn base_url(&self) -> &Url {
        match self {
            ProviderConfig::ElevenLabs { base_url, .. } | ProviderConfig::TopMedia { base_url, .. } => {
                base_url
            }
        }
    }
}

// Keys never end up in logs.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.name())
            .field("base_url", &self.base_url().as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub audio_dir: PathBuf,
    pub provider: ProviderConfig,
    pub translate_base_url: Url,
    pub chunk_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match var("PORT") {
            Some(port) => port.parse().map_err(|e| ConfigError::InvalidValue {
                name: "PORT",
                reason: format!("{}", e),
            })?,
            None => 3000,
        };
        let audio_dir: PathBuf = var("AUDIO_DIR")
            .unwrap_or_else(|| "./audio_files".to_string())
            .into();

        let provider_name = var("TTS_PROVIDER").unwrap_or_else(|| "elevenlabs".to_string());
        let provider = match provider_name.to_ascii_lowercase().as_str() {
            "elevenlabs" => ProviderConfig::ElevenLabs {
                api_key: var("ELEVENLABS_API_KEY")
                    .ok_or(ConfigError::MissingApiKey("ELEVENLABS_API_KEY"))?,
                base_url: parse_url(
                    "ELEVENLABS_BASE_URL",
                    var("ELEVENLABS_BASE_URL").as_deref().unwrap_or(DEFAULT_ELEVENLABS_URL),
                )?,
            },
            "topmedia" | "topmediai" => ProviderConfig::TopMedia {
                api_key: var("TOPMEDIA_API_KEY")
                    .or_else(|| var("API_KEY"))
                    .ok_or(ConfigError::MissingApiKey("TOPMEDIA_API_KEY"))?,
                base_url: parse_url(
                    "TOPMEDIA_BASE_URL",
                    var("TOPMEDIA_BASE_URL").as_deref().unwrap_or(DEFAULT_TOPMEDIA_URL),
                )?,
            },
            other => {
                return Err(ConfigError::InvalidValue {
                    name: "TTS_PROVIDER",
                    reason: format!("unknown provider '{}'", other),
                })
            }
        };

        let translate_base_url = parse_url(
            "TRANSLATE_BASE_URL",
            var("TRANSLATE_BASE_URL").as_deref().unwrap_or(DEFAULT_TRANSLATE_URL),
        )?;

        let chunk_timeout = match var("CHUNK_TIMEOUT_SECS") {
            Some(secs) => {
                let secs: u64 = secs.parse().map_err(|e| ConfigError::InvalidValue {
                    name: "CHUNK_TIMEOUT_SECS",
                    reason: format!("{}", e),
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        name: "CHUNK_TIMEOUT_SECS",
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(30),
        };

        Ok(Self {
            host,
            port,
            audio_dir,
            provider,
            translate_base_url,
            chunk_timeout,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                name: "HOST",
                reason: format!("{}", e),
            })
    }
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        name,
        reason: format!("{}", e),
    })?;

    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidValue {
            name,
            reason: format!("'{}' is not a base URL", value),
        });
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("ELEVENLABS_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.audio_dir, PathBuf::from("./audio_files"));
        assert_eq!(config.chunk_timeout, Duration::from_secs(30));
        assert_eq!(config.provider.name(), "elevenlabs");
        assert_eq!(config.socket_addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey("ELEVENLABS_API_KEY")));

        let err = Config::from_lookup(lookup(&[("ELEVENLABS_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey(_)));
    }

    #[test]
    fn test_topmedia_accepts_legacy_key_name() {
        let config = Config::from_lookup(lookup(&[
            ("TTS_PROVIDER", "topmedia"),
            ("API_KEY", "legacy"),
        ]))
        .unwrap();

        match config.provider {
            ProviderConfig::TopMedia { api_key, base_url } => {
                assert_eq!(api_key, "legacy");
                assert_eq!(base_url.as_str(), "https://api.topmediai.com/");
            }
            other => panic!("unexpected provider {:?}", other),
        }
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_lookup(lookup(&[
            ("ELEVENLABS_API_KEY", "k"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "PORT", .. }));

        let err = Config::from_lookup(lookup(&[
            ("ELEVENLABS_API_KEY", "k"),
            ("TTS_PROVIDER", "polly"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "TTS_PROVIDER", .. }));

        let err = Config::from_lookup(lookup(&[
            ("ELEVENLABS_API_KEY", "k"),
            ("CHUNK_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "CHUNK_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = Config::from_lookup(lookup(&[("ELEVENLABS_API_KEY", "sk-secret")])).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
