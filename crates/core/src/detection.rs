//! Detection types produced by the keyword detector and semantic pre-filter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::transcript::Segment;

/// Finding category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bug,
    Change,
    Ui,
    Performance,
    Accessibility,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Bug => "bug",
            Category::Change => "change",
            Category::Ui => "ui",
            Category::Performance => "performance",
            Category::Accessibility => "accessibility",
            Category::Other => "other",
        }
    }

    /// Parse a category from model output, falling back to `Other` on
    /// anything unrecognized.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "bug" => Category::Bug,
            "change" => Category::Change,
            "ui" => Category::Ui,
            "performance" => Category::Performance,
            "accessibility" => Category::Accessibility,
            _ => Category::Other,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected issue or change request in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub segment: Segment,
    pub category: Category,
    /// Patterns that matched, insertion-ordered and deduplicated.
    pub keywords_found: Vec<String>,
    /// Concatenated text of the surrounding segments.
    pub context: String,
}

impl Detection {
    pub fn start(&self) -> f64 {
        self.segment.start
    }

    pub fn end(&self) -> f64 {
        self.segment.end
    }
}

/// Detection filter level for the pipeline.
///
/// - `Keywords`: regex keyword detection only (fastest, fewest findings)
/// - `Base`: LLM pre-filter on the entire transcript, keyword fallback
/// - `Combined`: keywords + semantic pre-filter, merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterLevel {
    Keywords,
    #[default]
    Base,
    Combined,
}

impl FilterLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterLevel::Keywords => "keywords",
            FilterLevel::Base => "base",
            FilterLevel::Combined => "combined",
        }
    }
}

impl FromStr for FilterLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keywords" => Ok(FilterLevel::Keywords),
            "base" => Ok(FilterLevel::Base),
            "combined" => Ok(FilterLevel::Combined),
            other => Err(format!("unknown filter level: {other}")),
        }
    }
}

impl fmt::Display for FilterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Category::Bug).unwrap(), "\"bug\"");
        let c: Category = serde_json::from_str("\"accessibility\"").unwrap();
        assert_eq!(c, Category::Accessibility);
    }

    #[test]
    fn test_category_parse_fallback() {
        assert_eq!(Category::parse("BUG"), Category::Bug);
        assert_eq!(Category::parse("weird"), Category::Other);
    }

    #[test]
    fn test_filter_level_from_str() {
        assert_eq!("combined".parse::<FilterLevel>().unwrap(), FilterLevel::Combined);
        assert!("fancy".parse::<FilterLevel>().is_err());
    }
}
