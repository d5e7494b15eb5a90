//! API and processing settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default cloud API base.
pub const DEFAULT_API_BASE: &str = "https://api.libraxis.cloud";
/// Default STT model name.
pub const DEFAULT_STT_MODEL: &str = "whisper-1";
/// Default LLM model name; the API router serves vision on the same model.
pub const DEFAULT_LLM_MODEL: &str = "ai-suggestions";
/// Default vision model name.
pub const DEFAULT_VISION_MODEL: &str = "ai-suggestions";
/// Local STT server used by `--local`.
pub const LOCAL_STT_URL: &str = "http://localhost:8237/transcribe";

/// API path suffixes stripped when normalizing a base URL.
const BASE_SUFFIXES: [&str; 4] = [
    "/v1/responses",
    "/v1/audio/transcriptions",
    "/v1/chat/completions",
    "/v1",
];

/// Per-operation HTTP timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    pub transcription_secs: u64,
    pub llm_secs: u64,
    pub vlm_secs: u64,
    pub preflight_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            transcription_secs: 600,
            llm_secs: 60,
            vlm_secs: 120,
            preflight_secs: 10,
        }
    }
}

impl Timeouts {
    pub fn transcription(&self) -> Duration {
        Duration::from_secs(self.transcription_secs)
    }

    pub fn llm(&self) -> Duration {
        Duration::from_secs(self.llm_secs)
    }

    pub fn vlm(&self) -> Duration {
        Duration::from_secs(self.vlm_secs)
    }

    pub fn preflight(&self) -> Duration {
        Duration::from_secs(self.preflight_secs)
    }
}

/// Application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Primary API key, shared by every role unless overridden below.
    pub api_key: String,
    /// Per-role key overrides.
    pub stt_api_key: Option<String>,
    pub llm_api_key: Option<String>,
    pub vision_api_key: Option<String>,

    pub api_base: String,
    pub stt_endpoint: String,
    pub llm_endpoint: String,
    pub vision_endpoint: String,

    pub stt_model: String,
    pub llm_model: String,
    pub vision_model: String,

    /// IETF language code for transcription and prompts.
    pub language: String,
    pub use_semantic: bool,
    pub use_vision: bool,
    pub max_tokens: u32,

    /// Analyzer worker pool size.
    pub workers: usize,
    /// Delay between analyzer task starts, in milliseconds.
    pub stagger_ms: u64,

    /// Mean no-speech probability above which a warning is logged.
    pub no_speech_warn_threshold: f64,
    /// Mean no-speech probability above which the video is rejected.
    /// The STT backends disagree on calibration, so this is configuration
    /// rather than a constant; 0.9 keeps borderline recordings processable.
    pub no_speech_fatal_threshold: f64,

    pub timeouts: Timeouts,
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let base = DEFAULT_API_BASE.to_string();
        Self {
            api_key: String::new(),
            stt_api_key: None,
            llm_api_key: None,
            vision_api_key: None,
            stt_endpoint: format!("{base}/v1/audio/transcriptions"),
            llm_endpoint: format!("{base}/v1/responses"),
            vision_endpoint: format!("{base}/v1/responses"),
            api_base: base,
            stt_model: DEFAULT_STT_MODEL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            language: "pl".to_string(),
            use_semantic: true,
            use_vision: true,
            max_tokens: 4096,
            workers: 5,
            stagger_ms: 500,
            no_speech_warn_threshold: 0.5,
            no_speech_fatal_threshold: 0.9,
            timeouts: Timeouts::default(),
            verbose: false,
        }
    }
}

impl Settings {
    /// Load settings from the first config file found, then let environment
    /// variables override.
    pub fn load() -> Self {
        let mut settings = Settings::default();

        for path in Self::config_paths() {
            if path.exists() {
                if let Err(err) = settings.apply_file(&path) {
                    tracing::warn!(path = %path.display(), %err, "skipping unreadable config file");
                }
                break;
            }
        }

        settings.apply_env();
        settings
    }

    /// Config file locations, checked in order.
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".env")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("reviewscribe").join("config.env"));
            paths.push(home.join(".reviewscribe.env"));
        }
        paths.push(PathBuf::from("/etc/reviewscribe/config.env"));
        paths
    }

    /// Apply a `KEY=value` config file.
    pub fn apply_file(&mut self, path: &Path) -> std::io::Result<()> {
        let content = std::fs::read_to_string(path)?;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().trim_matches('"').trim_matches('\'');
                self.set_from_key(key.trim(), value);
            }
        }
        Ok(())
    }

    /// Apply environment variables. Environment wins over config files.
    pub fn apply_env(&mut self) {
        const ENV_KEYS: [&str; 15] = [
            "LIBRAXIS_API_KEY",
            "REVIEWSCRIBE_API_KEY",
            "REVIEWSCRIBE_STT_API_KEY",
            "REVIEWSCRIBE_LLM_API_KEY",
            "REVIEWSCRIBE_VISION_API_KEY",
            "LIBRAXIS_API_BASE",
            "REVIEWSCRIBE_STT_ENDPOINT",
            "REVIEWSCRIBE_LLM_ENDPOINT",
            "REVIEWSCRIBE_VISION_ENDPOINT",
            "REVIEWSCRIBE_STT_MODEL",
            "REVIEWSCRIBE_LLM_MODEL",
            "REVIEWSCRIBE_VISION_MODEL",
            "REVIEWSCRIBE_LANGUAGE",
            "REVIEWSCRIBE_SEMANTIC",
            "REVIEWSCRIBE_VISION",
        ];
        for key in ENV_KEYS {
            if let Ok(value) = std::env::var(key) {
                if !value.is_empty() {
                    self.set_from_key(key, &value);
                }
            }
        }
    }

    /// Map a config key (file or environment form) onto a setting.
    pub fn set_from_key(&mut self, key: &str, value: &str) {
        let key = key.to_lowercase();

        // Role-specific keys first: they also contain the generic substrings.
        if key.contains("stt_api_key") {
            self.stt_api_key = Some(value.to_string());
        } else if key.contains("llm_api_key") {
            self.llm_api_key = Some(value.to_string());
        } else if key.contains("vision_api_key") {
            self.vision_api_key = Some(value.to_string());
        } else if key.contains("api_key") {
            self.api_key = value.to_string();
        } else if key.contains("api_base") {
            self.set_api_base(value);
        } else if key.contains("stt_endpoint") {
            self.stt_endpoint = value.to_string();
        } else if key.contains("llm_endpoint") {
            self.llm_endpoint = value.to_string();
        } else if key.contains("vision_endpoint") {
            self.vision_endpoint = value.to_string();
        } else if key.contains("stt_model") {
            self.stt_model = value.to_string();
        } else if key.contains("llm_model") {
            self.llm_model = value.to_string();
        } else if key.contains("vision_model") {
            self.vision_model = value.to_string();
        } else if key.contains("language") {
            self.language = value.to_string();
        } else if key.contains("semantic") {
            self.use_semantic = parse_bool(value);
        } else if key.contains("vision") {
            self.use_vision = parse_bool(value);
        }
    }

    /// Normalize a base URL by stripping common API path suffixes.
    pub fn normalize_api_base(value: &str) -> String {
        let mut normalized = value.trim_end_matches('/').to_string();
        for suffix in BASE_SUFFIXES {
            if let Some(stripped) = normalized.strip_suffix(suffix) {
                normalized = stripped.to_string();
                break;
            }
        }
        normalized
    }

    /// Set the API base and re-derive all endpoints from it.
    pub fn set_api_base(&mut self, value: &str) {
        let base = Self::normalize_api_base(value);
        self.stt_endpoint = format!("{base}/v1/audio/transcriptions");
        self.llm_endpoint = format!("{base}/v1/responses");
        self.vision_endpoint = format!("{base}/v1/responses");
        self.api_base = base;
    }

    pub fn stt_key(&self) -> &str {
        self.stt_api_key.as_deref().unwrap_or(&self.api_key)
    }

    pub fn llm_key(&self) -> &str {
        self.llm_api_key.as_deref().unwrap_or(&self.api_key)
    }

    pub fn vision_key(&self) -> &str {
        self.vision_api_key.as_deref().unwrap_or(&self.api_key)
    }

    /// Sanity-check the endpoint wiring; returns human-readable problems.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.stt_endpoint.contains("/responses") || self.stt_endpoint.contains("/chat/completions")
        {
            problems.push(format!(
                "STT endpoint points at a text-model path: {}",
                self.stt_endpoint
            ));
        }
        if self.llm_endpoint.contains("/audio/") {
            problems.push(format!(
                "LLM endpoint points at an audio path: {}",
                self.llm_endpoint
            ));
        }
        if self.vision_endpoint.contains("/audio/") {
            problems.push(format!(
                "Vision endpoint points at an audio path: {}",
                self.vision_endpoint
            ));
        }
        problems
    }

    /// Write the current settings as a config file in the user config dir.
    pub fn save_default_config(&self) -> std::io::Result<PathBuf> {
        let config_dir = dirs::home_dir()
            .ok_or_else(|| std::io::Error::other("no home directory"))?
            .join(".config")
            .join("reviewscribe");
        std::fs::create_dir_all(&config_dir)?;
        let config_path = config_dir.join("config.env");

        let content = format!(
            "# reviewscribe configuration\n\
             \n\
             # API Key (required)\n\
             LIBRAXIS_API_KEY={}\n\
             \n\
             # API Base URL\n\
             LIBRAXIS_API_BASE={}\n\
             \n\
             # Models\n\
             REVIEWSCRIBE_STT_MODEL={}\n\
             REVIEWSCRIBE_LLM_MODEL={}\n\
             REVIEWSCRIBE_VISION_MODEL={}\n\
             \n\
             # Processing\n\
             REVIEWSCRIBE_LANGUAGE={}\n\
             REVIEWSCRIBE_SEMANTIC={}\n\
             REVIEWSCRIBE_VISION={}\n",
            self.api_key,
            self.api_base,
            self.stt_model,
            self.llm_model,
            self.vision_model,
            self.language,
            self.use_semantic,
            self.use_vision,
        );
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints_derive_from_base() {
        let s = Settings::default();
        assert_eq!(s.stt_endpoint, "https://api.libraxis.cloud/v1/audio/transcriptions");
        assert_eq!(s.llm_endpoint, "https://api.libraxis.cloud/v1/responses");
    }

    #[test]
    fn test_normalize_api_base_strips_suffixes() {
        for input in [
            "https://api.example.com/v1/responses",
            "https://api.example.com/v1/audio/transcriptions",
            "https://api.example.com/v1/chat/completions",
            "https://api.example.com/v1",
            "https://api.example.com/",
            "https://api.example.com",
        ] {
            assert_eq!(Settings::normalize_api_base(input), "https://api.example.com");
        }
    }

    #[test]
    fn test_set_api_base_rederives_endpoints() {
        let mut s = Settings::default();
        s.set_from_key("LIBRAXIS_API_BASE", "http://localhost:8000/v1");
        assert_eq!(s.api_base, "http://localhost:8000");
        assert_eq!(s.stt_endpoint, "http://localhost:8000/v1/audio/transcriptions");
        assert_eq!(s.vision_endpoint, "http://localhost:8000/v1/responses");
    }

    #[test]
    fn test_role_keys_override_primary() {
        let mut s = Settings::default();
        s.set_from_key("LIBRAXIS_API_KEY", "primary");
        s.set_from_key("REVIEWSCRIBE_VISION_API_KEY", "vision-only");
        assert_eq!(s.stt_key(), "primary");
        assert_eq!(s.vision_key(), "vision-only");
    }

    #[test]
    fn test_bool_keys() {
        let mut s = Settings::default();
        s.set_from_key("REVIEWSCRIBE_SEMANTIC", "false");
        s.set_from_key("REVIEWSCRIBE_VISION", "yes");
        assert!(!s.use_semantic);
        assert!(s.use_vision);
    }

    #[test]
    fn test_vision_model_key_does_not_flip_vision_flag() {
        let mut s = Settings::default();
        s.use_vision = true;
        s.set_from_key("REVIEWSCRIBE_VISION_MODEL", "some-model");
        assert!(s.use_vision);
        assert_eq!(s.vision_model, "some-model");
    }

    #[test]
    fn test_apply_file_parses_env_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.env");
        std::fs::write(
            &path,
            "# comment\nLIBRAXIS_API_KEY=\"secret\"\nREVIEWSCRIBE_LANGUAGE=en\n\n",
        )
        .unwrap();
        let mut s = Settings::default();
        s.apply_file(&path).unwrap();
        assert_eq!(s.api_key, "secret");
        assert_eq!(s.language, "en");
    }

    #[test]
    fn test_validate_flags_crossed_endpoints() {
        let mut s = Settings::default();
        s.stt_endpoint = "https://api.example.com/v1/responses".to_string();
        let problems = s.validate();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("STT endpoint"));
    }
}
