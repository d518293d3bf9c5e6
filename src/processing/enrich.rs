//! Category and topic tagging for chunks.
//!
//! Categories come from the source file name, topics from the chunk text. Both are pure functions
//! of their inputs, so enriching an already-enriched chunk reproduces the same metadata.

use super::types::ChunkMetadata;
use crate::store::payload::SOURCE_FILE_KEY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Metadata key holding the assigned category.
pub const CATEGORY_KEY: &str = "category";
/// Metadata key holding the comma-joined topic tags.
pub const TOPICS_KEY: &str = "topics";
/// Value used when no category or topic rule matches.
pub const GENERAL: &str = "general";

/// Maps file-name keywords to a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Category assigned on match.
    pub category: String,
    /// Lowercase substrings looked up in the file name.
    pub keywords: Vec<String>,
}

/// Maps text keywords to a topic tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRule {
    /// Tag added on match.
    pub topic: String,
    /// Lowercase substrings looked up in the chunk text.
    pub keywords: Vec<String>,
}

/// Ordered rule tables used by [`MetadataEnricher`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRules {
    /// Category rules; the first match wins.
    #[serde(default)]
    pub categories: Vec<CategoryRule>,
    /// Topic rules; every match contributes a tag, in rule order.
    #[serde(default)]
    pub topics: Vec<TopicRule>,
}

/// Failure while reading a rules file.
#[derive(Debug, Error)]
pub enum RulesError {
    /// File could not be read.
    #[error("Failed to read enrichment rules {path}: {source}")]
    Io {
        /// Rules file path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// File is not a valid rules document.
    #[error("Invalid enrichment rules {path}: {source}")]
    Parse {
        /// Rules file path.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    ("resume", &["resume", "cv", "curriculum"]),
    ("projects", &["project", "portfolio"]),
    ("experience", &["experience", "work", "employment", "career"]),
    ("education", &["education", "degree", "university", "course"]),
    ("skills", &["skill", "stack", "tech"]),
    ("about", &["about", "bio", "profile", "intro"]),
    ("contact", &["contact"]),
];

const DEFAULT_TOPICS: &[(&str, &[&str])] = &[
    (
        "programming",
        &["python", "rust", "java", "typescript", "golang", "c++", "programming"],
    ),
    (
        "web",
        &["react", "fastapi", "django", "flask", "frontend", "backend", "api", "html", "css"],
    ),
    (
        "ai_ml",
        &[
            "machine learning",
            "deep learning",
            "llm",
            "nlp",
            "neural",
            "pytorch",
            "tensorflow",
            "langchain",
            "retrieval-augmented",
            "embedding",
        ],
    ),
    (
        "data",
        &["data", "sql", "pandas", "spark", "etl", "analytics", "database"],
    ),
    (
        "cloud_devops",
        &["aws", "azure", "gcp", "docker", "kubernetes", "ci/cd", "terraform", "devops"],
    ),
    ("leadership", &["lead", "mentor", "manage", "team", "stakeholder"]),
    (
        "education",
        &["university", "degree", "bachelor", "master", "phd", "course", "certification"],
    ),
];

fn owned(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(|keyword| keyword.to_string()).collect()
}

impl Default for EnrichmentRules {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES
                .iter()
                .map(|(category, keywords)| CategoryRule {
                    category: category.to_string(),
                    keywords: owned(keywords),
                })
                .collect(),
            topics: DEFAULT_TOPICS
                .iter()
                .map(|(topic, keywords)| TopicRule {
                    topic: topic.to_string(),
                    keywords: owned(keywords),
                })
                .collect(),
        }
    }
}

impl EnrichmentRules {
    /// Load rules from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, RulesError> {
        let raw = fs::read_to_string(path).map_err(|source| RulesError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| RulesError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Applies [`EnrichmentRules`] to chunk metadata.
#[derive(Debug, Clone, Default)]
pub struct MetadataEnricher {
    rules: EnrichmentRules,
}

impl MetadataEnricher {
    /// Build an enricher over the given rules.
    pub fn new(rules: EnrichmentRules) -> Self {
        Self { rules }
    }

    /// Set `source_file`, `category`, and `topics` on `metadata`.
    pub fn enrich(&self, metadata: &mut ChunkMetadata, source_path: &Path, text: &str) {
        let file_name = source_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_path.display().to_string());
        metadata.insert(CATEGORY_KEY.to_string(), self.category_for(&file_name));
        metadata.insert(TOPICS_KEY.to_string(), self.topics_for(text));
        metadata.insert(SOURCE_FILE_KEY.to_string(), file_name);
    }

    /// Category for a file name, or [`GENERAL`].
    pub fn category_for(&self, file_name: &str) -> String {
        let lowered = file_name.to_lowercase();
        self.rules
            .categories
            .iter()
            .find(|rule| rule.keywords.iter().any(|keyword| lowered.contains(keyword.as_str())))
            .map(|rule| rule.category.clone())
            .unwrap_or_else(|| GENERAL.to_string())
    }

    /// Comma-joined topic tags for a chunk text, or [`GENERAL`].
    pub fn topics_for(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let mut topics: Vec<&str> = Vec::new();
        for rule in &self.rules.topics {
            let matched = rule.keywords.iter().any(|keyword| lowered.contains(keyword.as_str()));
            if matched && !topics.contains(&rule.topic.as_str()) {
                topics.push(&rule.topic);
            }
        }
        if topics.is_empty() {
            GENERAL.to_string()
        } else {
            topics.join(",")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn assigns_category_from_file_name() {
        let enricher = MetadataEnricher::default();
        assert_eq!(enricher.category_for("Diego_Resume_2024.pdf"), "resume");
        assert_eq!(enricher.category_for("side-projects.md"), "projects");
        assert_eq!(enricher.category_for("random.txt"), GENERAL);
    }

    #[test]
    fn topics_follow_rule_order() {
        let enricher = MetadataEnricher::default();
        let topics = enricher.topics_for("Built a retrieval-augmented service with FastAPI and PostgreSQL data models");
        assert_eq!(topics, "web,ai_ml,data");
        assert_eq!(enricher.topics_for("Enjoys hiking."), GENERAL);
    }

    #[test]
    fn enrich_sets_source_file_name_only() {
        let enricher = MetadataEnricher::default();
        let mut metadata = ChunkMetadata::new();
        enricher.enrich(&mut metadata, &PathBuf::from("data/nested/about_me.md"), "I write Rust.");
        assert_eq!(metadata[SOURCE_FILE_KEY], "about_me.md");
        assert_eq!(metadata[CATEGORY_KEY], "about");
        assert_eq!(metadata[TOPICS_KEY], "programming");
    }

    #[test]
    fn enrichment_is_idempotent() {
        let enricher = MetadataEnricher::default();
        let path = PathBuf::from("data/experience.txt");
        let text = "Led a data team building Spark pipelines on AWS.";
        let mut once = ChunkMetadata::new();
        once.insert("Header 2".into(), "Work".into());
        enricher.enrich(&mut once, &path, text);
        let mut twice = once.clone();
        enricher.enrich(&mut twice, &path, text);
        assert_eq!(once, twice);
    }

    #[test]
    fn loads_custom_rules_from_json() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{"categories":[{{"category":"talks","keywords":["talk"]}}],"topics":[{{"topic":"speaking","keywords":["keynote"]}}]}}"#
        )
        .expect("write");
        let rules = EnrichmentRules::from_path(file.path()).expect("rules");
        let enricher = MetadataEnricher::new(rules);
        assert_eq!(enricher.category_for("TalkNotes.md"), "talks");
        assert_eq!(enricher.topics_for("Gave a keynote"), "speaking");
        assert_eq!(enricher.category_for("resume.pdf"), GENERAL);
    }

    #[test]
    fn malformed_rules_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "not json").expect("write");
        let error = EnrichmentRules::from_path(file.path()).expect_err("invalid");
        assert!(matches!(error, RulesError::Parse { .. }));
    }
}
