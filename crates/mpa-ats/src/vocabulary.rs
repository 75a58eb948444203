//! Curated domain vocabulary (technologies, tools, practices)
//!
//! Terms are matched case-insensitively at token boundaries, so multi-word
//! and punctuated terms such as `machine learning`, `node.js` or `c++` work.

use mpa_core::{AgentError, AtsConfig, Result};
use std::collections::BTreeSet;
use std::path::Path;

/// Built-in vocabulary
const BUILTIN_TERMS: &[&str] = &[
    // Languages
    "python", "java", "javascript", "typescript", "rust", "golang", "c++", "c#", "scala",
    "kotlin", "swift", "ruby", "php", "sql", "html", "css",
    // Frameworks and libraries
    "react", "angular", "vue", "node.js", "django", "flask", "spring", "tensorflow", "pytorch",
    "pandas", "numpy", "scikit-learn",
    // Data stores
    "mongodb", "postgresql", "mysql", "redis", "elasticsearch", "kafka", "spark", "hadoop",
    "snowflake",
    // Cloud and operations
    "docker", "kubernetes", "aws", "azure", "gcp", "terraform", "ansible", "jenkins", "ci/cd",
    "linux", "git",
    // APIs
    "rest api", "graphql", "grpc",
    // Disciplines and practices
    "machine learning", "deep learning", "data science", "agile", "scrum",
    "project management",
    // Analytics tools
    "tableau", "power bi", "excel",
];

/// Case-insensitive set of domain terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    terms: BTreeSet<String>,
}

impl Vocabulary {
    /// The built-in vocabulary
    pub fn builtin() -> Self {
        Self {
            terms: BUILTIN_TERMS.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Build from arbitrary terms; blank terms are ignored
    pub fn from_terms<I, S>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms: BTreeSet<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        if terms.is_empty() {
            return Err(AgentError::Config("Domain vocabulary is empty".to_string()));
        }
        Ok(Self { terms })
    }

    /// Load from a file with one term per line; `#` starts a comment
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Config(format!(
                "Cannot read domain vocabulary {}: {e}",
                path.display()
            ))
        })?;

        let terms = content
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default());

        let vocabulary = Self::from_terms(terms).map_err(|_| {
            AgentError::Config(format!("Domain vocabulary {} has no terms", path.display()))
        })?;

        tracing::info!(
            path = %path.display(),
            terms = vocabulary.len(),
            "Domain vocabulary loaded"
        );
        Ok(vocabulary)
    }

    /// Vocabulary selected by config: the configured file, else the built-in list
    pub fn from_config(config: &AtsConfig) -> Result<Self> {
        match &config.vocabulary_path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains(&term.to_lowercase())
    }

    /// Vocabulary terms that occur in `text`
    pub fn terms_in(&self, text: &str) -> BTreeSet<String> {
        let lower = text.to_lowercase();
        self.terms
            .iter()
            .filter(|term| occurs_at_boundary(&lower, term))
            .cloned()
            .collect()
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

fn is_term_char(c: char) -> bool {
    c.is_alphanumeric() || c == '+' || c == '#'
}

/// Whether `term` occurs in `haystack` without touching other term characters
fn occurs_at_boundary(haystack: &str, term: &str) -> bool {
    haystack.match_indices(term).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();

        // A leading '.' would make "js" match inside "node.js"
        let clean_before = before.map_or(true, |c| !is_term_char(c) && c != '.');
        let clean_after = after.map_or(true, |c| !is_term_char(c));
        clean_before && clean_after
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_matching() {
        let vocab = Vocabulary::builtin();
        let found = vocab.terms_in("Built APIs in Node.js and C++; some Java, no JavaScript.");

        assert!(found.contains("node.js"));
        assert!(found.contains("c++"));
        assert!(found.contains("java"));
        assert!(found.contains("javascript"));
        assert!(!found.contains("c#"));
    }

    #[test]
    fn test_no_substring_false_positives() {
        let vocab = Vocabulary::builtin();
        let found = vocab.terms_in("Gitter and Scalability and rusty pythonic code");
        assert!(found.is_empty(), "unexpected terms: {found:?}");
    }

    #[test]
    fn test_multi_word_terms() {
        let vocab = Vocabulary::builtin();
        let found = vocab.terms_in("Applied Machine Learning to project management data.");
        assert!(found.contains("machine learning"));
        assert!(found.contains("project management"));
    }

    #[test]
    fn test_from_file_with_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        std::fs::write(&path, "# tools\nRust\n\nTokio  # runtime\n").unwrap();

        let vocab = Vocabulary::from_file(&path).unwrap();
        assert_eq!(vocab.len(), 2);
        assert!(vocab.contains("rust"));
        assert!(vocab.contains("TOKIO"));
    }

    #[test]
    fn test_missing_or_empty_file_is_config_error() {
        let err = Vocabulary::from_file("/no/such/vocab.txt").unwrap_err();
        assert_eq!(err.collaborator(), "configuration");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "# nothing here\n\n").unwrap();
        let err = Vocabulary::from_file(&path).unwrap_err();
        assert_eq!(err.collaborator(), "configuration");
    }

    #[test]
    fn test_from_config_defaults_to_builtin() {
        let vocab = Vocabulary::from_config(&AtsConfig::default()).unwrap();
        assert_eq!(vocab, Vocabulary::builtin());
    }
}
