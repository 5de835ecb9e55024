use crate::core::errors::{ConfigError, ConfigResult};
use crate::core::types::LanguageProfile;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// OCR engine configuration
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub language: LanguageProfile,
    pub tesseract_path: String,
    pub timeout_seconds: u64,
}

/// Translation chain configuration
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    /// Presence of this key is what enables the Google tier at start-up
    pub google_api_key: Option<String>,
    pub mymemory_enabled: bool,
    pub source_language: String,
    pub target_language: String,
    pub request_timeout_seconds: u64,
    pub max_retries: u32,
    pub cache_entries: usize,
}

/// Chapter and image source configuration
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub mangadex_api_base: String,
    pub image_referer: String,
    pub image_user_agent: String,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub translation: TranslationConfig,
    pub source: SourceConfig,
}

impl Config {
    pub fn new() -> ConfigResult<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::from_lookup(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config from any key/value lookup (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| Parsed(lookup(key));
        let non_empty = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let log_level = lookup("LOG_LEVEL")
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        let language = match non_empty("OCR_LANGUAGE") {
            Some(value) => value.parse()?,
            None => LanguageProfile::Latin,
        };

        Ok(Self {
            server: ServerConfig {
                port: parsed("SERVER_PORT").or(3001),
                host: non_empty("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                log_level,
            },
            ocr: OcrConfig {
                language,
                tesseract_path: non_empty("TESSERACT_PATH")
                    .unwrap_or_else(|| "tesseract".to_string()),
                timeout_seconds: parsed("OCR_TIMEOUT_SECONDS").or(120),
            },
            translation: TranslationConfig {
                google_api_key: non_empty("GOOGLE_TRANSLATE_API_KEY"),
                mymemory_enabled: parsed("MYMEMORY_ENABLED").or(true),
                source_language: non_empty("TRANSLATION_SOURCE_LANGUAGE")
                    .unwrap_or_else(|| "en".to_string()),
                target_language: non_empty("TRANSLATION_TARGET_LANGUAGE")
                    .unwrap_or_else(|| "th".to_string()),
                request_timeout_seconds: parsed("API_TIMEOUT_SECONDS").or(30),
                max_retries: parsed("MAX_RETRIES").or(1),
                cache_entries: parsed("TRANSLATION_CACHE_ENTRIES").or(1000),
            },
            source: SourceConfig {
                mangadex_api_base: non_empty("MANGADEX_API_BASE")
                    .unwrap_or_else(|| "https://api.mangadex.org".to_string()),
                image_referer: non_empty("IMAGE_REFERER")
                    .unwrap_or_else(|| "https://mangadex.org/".to_string()),
                image_user_agent: non_empty("IMAGE_USER_AGENT").unwrap_or_else(|| {
                    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
                }),
            },
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidServerConfig(
                "server port must be > 0".to_string(),
            ));
        }

        if self.ocr.timeout_seconds == 0 {
            return Err(ConfigError::InvalidOcrConfig(
                "OCR timeout must be > 0 seconds".to_string(),
            ));
        }

        if self.translation.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidTranslationConfig(
                "API timeout must be > 0 seconds".to_string(),
            ));
        }

        if self.translation.max_retries > 5 {
            return Err(ConfigError::InvalidTranslationConfig(format!(
                "max_retries must be between 0 and 5, got {}",
                self.translation.max_retries
            )));
        }

        if self.translation.cache_entries == 0 {
            return Err(ConfigError::InvalidTranslationConfig(
                "translation cache must hold at least one entry".to_string(),
            ));
        }

        for (name, code) in [
            ("source", &self.translation.source_language),
            ("target", &self.translation.target_language),
        ] {
            if !(2..=8).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphabetic() || c == '-') {
                return Err(ConfigError::InvalidTranslationConfig(format!(
                    "{} language must be a language code like 'th', got '{}'",
                    name, code
                )));
            }
        }

        if !self.source.mangadex_api_base.starts_with("http") {
            return Err(ConfigError::InvalidSourceConfig(format!(
                "MangaDex API base must be an http(s) URL, got '{}'",
                self.source.mangadex_api_base
            )));
        }

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn ocr_language(&self) -> LanguageProfile {
        self.ocr.language
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr.timeout_seconds)
    }

    pub fn google_api_key(&self) -> Option<&str> {
        self.translation.google_api_key.as_deref()
    }

    pub fn target_language(&self) -> &str {
        &self.translation.target_language
    }

    pub fn source_language(&self) -> &str {
        &self.translation.source_language
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.translation.request_timeout_seconds)
    }

    pub fn max_retries(&self) -> u32 {
        self.translation.max_retries
    }
}

/// Raw environment value, parsed on demand into whatever type the field needs
struct Parsed(Option<String>);

impl Parsed {
    fn or<T: FromStr>(self, default: T) -> T {
        self.0
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(default)
    }
}

// No Default: Config::new() validates and can fail
