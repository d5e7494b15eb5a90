//! Keyword configuration for issue detection.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Embedded default keywords, used when no override file is found.
const DEFAULT_KEYWORDS_YAML: &str = include_str!("../data/default_keywords.yaml");

/// Locations searched for a keywords override, in priority order.
const SEARCH_PATHS: [&str; 3] = [
    "keywords.yaml",
    "reviewscribe_keywords.yaml",
    ".reviewscribe/keywords.yaml",
];

/// Keyword patterns per category, as loaded from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordsConfig {
    #[serde(default)]
    pub bug: Vec<String>,
    #[serde(default)]
    pub change: Vec<String>,
    #[serde(default)]
    pub ui: Vec<String>,
}

impl KeywordsConfig {
    /// Load keyword configuration.
    ///
    /// Priority: explicit file, then the search path in the working
    /// directory, then the embedded defaults. A missing explicit file falls
    /// back to defaults with a warning rather than failing the run.
    pub fn load(keywords_file: Option<&Path>) -> Self {
        if let Some(path) = keywords_file {
            if path.exists() {
                match Self::from_file(path) {
                    Ok(config) => return config,
                    Err(err) => {
                        tracing::warn!(%err, "falling back to default keywords");
                    }
                }
            } else {
                tracing::warn!(path = %path.display(), "keywords file not found, using defaults");
            }
        }

        for candidate in SEARCH_PATHS {
            let path = PathBuf::from(candidate);
            if path.exists() {
                match Self::from_file(&path) {
                    Ok(config) => {
                        tracing::debug!(path = %path.display(), "using keywords override");
                        return config;
                    }
                    Err(err) => tracing::warn!(%err, "ignoring bad keywords override"),
                }
            }
        }

        Self::defaults()
    }

    /// The embedded default keyword set.
    pub fn defaults() -> Self {
        serde_yaml::from_str(DEFAULT_KEYWORDS_YAML)
            .expect("embedded default keywords are well-formed")
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::InvalidKeywords {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn total_keywords(&self) -> usize {
        self.bug.len() + self.change.len() + self.ui.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "Keywords: {} bug, {} change, {} UI",
            self.bug.len(),
            self.change.len(),
            self.ui.len()
        )
    }

    /// Compile every pattern case-insensitively.
    pub fn compile(&self) -> Result<CompiledKeywords, ConfigError> {
        Ok(CompiledKeywords {
            bug: compile_patterns(&self.bug)?,
            change: compile_patterns(&self.change)?,
            ui: compile_patterns(&self.ui)?,
        })
    }

    /// Write the embedded defaults to a file for user customization.
    pub fn save_defaults(path: &Path) -> std::io::Result<()> {
        std::fs::write(path, DEFAULT_KEYWORDS_YAML)
    }
}

/// Compiled keyword regexes, ready for per-segment scanning.
#[derive(Debug)]
pub struct CompiledKeywords {
    pub bug: Vec<(String, Regex)>,
    pub change: Vec<(String, Regex)>,
    pub ui: Vec<(String, Regex)>,
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<(String, Regex)>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(&format!("(?i){p}"))
                .map(|re| (p.clone(), re))
                .map_err(|e| ConfigError::InvalidPattern {
                    pattern: p.clone(),
                    message: e.to_string(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load_and_compile() {
        let config = KeywordsConfig::defaults();
        assert!(config.total_keywords() > 20);
        let compiled = config.compile().unwrap();
        assert!(!compiled.bug.is_empty());
        assert!(!compiled.ui.is_empty());
    }

    #[test]
    fn test_defaults_match_canonical_phrases() {
        let compiled = KeywordsConfig::defaults().compile().unwrap();
        let hits = |rules: &[(String, Regex)], text: &str| {
            rules.iter().any(|(_, re)| re.is_match(text))
        };
        assert!(hits(&compiled.bug, "to nie działa."));
        assert!(hits(&compiled.change, "trzeba to poprawić."));
        assert!(hits(&compiled.ui, "layout jest ok."));
        assert!(!hits(&compiled.bug, "layout jest ok."));
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keywords.yaml");
        std::fs::write(&path, "- just\n- a list\n").unwrap();
        assert!(KeywordsConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_from_file_partial_categories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keywords.yaml");
        std::fs::write(&path, "bug:\n  - kaput\n").unwrap();
        let config = KeywordsConfig::from_file(&path).unwrap();
        assert_eq!(config.bug, vec!["kaput"]);
        assert!(config.change.is_empty());
    }

    #[test]
    fn test_explicit_missing_file_falls_back() {
        let config = KeywordsConfig::load(Some(Path::new("/nonexistent/keywords.yaml")));
        assert!(config.total_keywords() > 0);
    }
}
