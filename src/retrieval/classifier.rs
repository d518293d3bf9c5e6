//! Keyword-based query intent classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Intent class of a user query. Drives the generation temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryClass {
    /// Asks for facts about the corpus.
    Factual,
    /// Small talk or open questions; the default.
    Conversational,
    /// Asks for invented or stylised output.
    Creative,
}

impl QueryClass {
    /// Lowercase label of the class.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Conversational => "conversational",
            Self::Creative => "creative",
        }
    }
}

impl fmt::Display for QueryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryClass {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "factual" => Ok(Self::Factual),
            "conversational" => Ok(Self::Conversational),
            "creative" => Ok(Self::Creative),
            _ => Err(()),
        }
    }
}

const FACTUAL_KEYWORDS: &[&str] = &[
    "what",
    "which",
    "when",
    "where",
    "who",
    "how many",
    "how long",
    "list",
    "skills",
    "experience",
    "worked",
    "used",
    "degree",
    "certification",
];

const CREATIVE_KEYWORDS: &[&str] = &[
    "imagine",
    "story",
    "poem",
    "creative",
    "invent",
    "brainstorm",
    "pitch",
    "write a",
    "pretend",
];

/// Maps a query to a [`QueryClass`] by keyword containment.
///
/// Factual keywords are checked first, then creative ones; anything else is conversational.
#[derive(Debug, Clone)]
pub struct QueryClassifier {
    factual: Vec<String>,
    creative: Vec<String>,
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new(
            FACTUAL_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            CREATIVE_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        )
    }
}

impl QueryClassifier {
    /// Build a classifier from custom keyword sets. Keywords are matched lowercase.
    pub fn new(factual: Vec<String>, creative: Vec<String>) -> Self {
        let lower = |keywords: Vec<String>| -> Vec<String> {
            keywords.into_iter().map(|k| k.to_lowercase()).collect()
        };
        Self {
            factual: lower(factual),
            creative: lower(creative),
        }
    }

    /// Classify `query`. Deterministic for a given keyword set.
    pub fn classify(&self, query: &str) -> QueryClass {
        let lowered = query.to_lowercase();
        let matches =
            |keywords: &[String]| keywords.iter().any(|keyword| lowered.contains(keyword.as_str()));
        if matches(&self.factual) {
            QueryClass::Factual
        } else if matches(&self.creative) {
            QueryClass::Creative
        } else {
            QueryClass::Conversational
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framework_question_is_factual() {
        let classifier = QueryClassifier::default();
        assert_eq!(
            classifier.classify("what frameworks has Diego used"),
            QueryClass::Factual
        );
    }

    #[test]
    fn factual_beats_creative() {
        let classifier = QueryClassifier::default();
        assert_eq!(
            classifier.classify("Write a poem listing which languages he knows"),
            QueryClass::Factual
        );
        assert_eq!(
            classifier.classify("Tell me a story about his hackathon"),
            QueryClass::Creative
        );
    }

    #[test]
    fn defaults_to_conversational() {
        let classifier = QueryClassifier::default();
        assert_eq!(classifier.classify("hi there!"), QueryClass::Conversational);
        assert_eq!(classifier.classify(""), QueryClass::Conversational);
    }

    #[test]
    fn custom_keywords_are_case_insensitive() {
        let classifier = QueryClassifier::new(vec!["SALARY".into()], vec!["Haiku".into()]);
        assert_eq!(classifier.classify("expected salary?"), QueryClass::Factual);
        assert_eq!(classifier.classify("a HAIKU please"), QueryClass::Creative);
        assert_eq!(classifier.classify("what is up"), QueryClass::Conversational);
    }

    #[test]
    fn labels_round_trip_through_from_str() {
        for class in [QueryClass::Factual, QueryClass::Conversational, QueryClass::Creative] {
            assert_eq!(class.as_str().parse::<QueryClass>(), Ok(class));
        }
        assert!("unknown".parse::<QueryClass>().is_err());
    }
}
