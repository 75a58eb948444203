//! Compatibility scorer
//!
//! Scores a candidate text (resume) against a target text (job description)
//! with four weighted components:
//!
//! | Component | Weight | Measures                                        |
//! |-----------|--------|-------------------------------------------------|
//! | keyword   | 0.40   | share of target keywords present in candidate   |
//! | domain    | 0.30   | same ratio restricted to the domain vocabulary  |
//! | section   | 0.20   | canonical resume sections found                 |
//! | format    | 0.10   | line length, bullets, e-mail, phone             |
//!
//! A blank target scores 100 on keyword and domain: there is nothing the
//! candidate could be missing. This is a policy, not a fallback.

use mpa_core::{AtsConfig, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::vocabulary::Vocabulary;

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z][a-z0-9+#]*").expect("unreachable: token regex is valid"));

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
        .expect("unreachable: email regex is valid")
});

static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[\s.-]?)?(?:\(\d{3}\)|\d{3})[\s.-]?\d{3}[\s.-]?\d{4}")
        .expect("unreachable: phone regex is valid")
});

static NUMBERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+[.)]\s").expect("unreachable: list regex is valid"));

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "must", "can", "this", "that",
    "these", "those", "i", "you", "he", "she", "it", "we", "they",
];

const MIN_TOKEN_LEN: usize = 3;
const MAX_LINE_LEN: usize = 100;
const SHORT_LINE_RATIO: f64 = 0.8;
const BULLET_RATIO: f64 = 0.15;
const MAX_HEADER_WORDS: usize = 4;

// ============================================================================
// Components and Sections
// ============================================================================

/// A scored component of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Keyword,
    Domain,
    Section,
    Format,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Keyword,
        Component::Domain,
        Component::Section,
        Component::Format,
    ];

    /// Fixed weight of the component in the overall score
    pub fn weight(self) -> f64 {
        match self {
            Self::Keyword => 0.40,
            Self::Domain => 0.30,
            Self::Section => 0.20,
            Self::Format => 0.10,
        }
    }
}

/// Canonical resume section
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Experience,
    Education,
    Skills,
    Summary,
    Projects,
}

impl Section {
    /// Canonical order
    pub const ALL: [Section; 5] = [
        Section::Experience,
        Section::Education,
        Section::Skills,
        Section::Summary,
        Section::Projects,
    ];

    /// Lower-case header spellings recognised for this section
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Experience => &[
                "experience",
                "work experience",
                "professional experience",
                "employment history",
                "work history",
                "employment",
            ],
            Self::Education => &["education", "academic background", "academics"],
            Self::Skills => &["skills", "technical skills", "core competencies", "competencies"],
            Self::Summary => &[
                "summary",
                "professional summary",
                "objective",
                "profile",
                "about me",
            ],
            Self::Projects => &["projects", "project experience", "personal projects"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Experience => "Experience",
            Self::Education => "Education",
            Self::Skills => "Skills",
            Self::Summary => "Summary",
            Self::Projects => "Projects",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Score Report
// ============================================================================

/// Result of scoring a candidate against a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Weighted sum of the components, rounded to the nearest integer
    pub overall_score: f64,

    pub component_scores: BTreeMap<Component, f64>,
    pub weights: BTreeMap<Component, f64>,

    pub matched_keywords: BTreeSet<String>,
    pub missing_keywords: BTreeSet<String>,
    pub extra_keywords: BTreeSet<String>,

    /// Occurrences of each target keyword in the target text
    pub keyword_frequencies: BTreeMap<String, usize>,

    pub matched_skills: BTreeSet<String>,
    pub missing_skills: BTreeSet<String>,

    /// Sections present in the candidate, canonical order
    pub sections_found: Vec<Section>,
    pub missing_sections: Vec<Section>,
}

impl ScoreReport {
    /// Score of one component (0 when absent)
    pub fn component(&self, component: Component) -> f64 {
        self.component_scores
            .get(&component)
            .copied()
            .unwrap_or_default()
    }

    /// Rounded weighted sum of `component_scores`
    pub fn weighted_total(&self) -> f64 {
        weighted_total(&self.component_scores, &self.weights)
    }
}

fn weighted_total(scores: &BTreeMap<Component, f64>, weights: &BTreeMap<Component, f64>) -> f64 {
    weights
        .iter()
        .map(|(c, w)| w * scores.get(c).copied().unwrap_or_default())
        .sum::<f64>()
        .round()
}

// ============================================================================
// Scorer
// ============================================================================

/// Stateless scoring service holding only its domain vocabulary
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    vocabulary: Vocabulary,
}

impl Scorer {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    /// Create from config (custom vocabulary file when configured)
    pub fn from_config(config: &AtsConfig) -> Result<Self> {
        Ok(Self::new(Vocabulary::from_config(config)?))
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Score `candidate` against `target`
    pub fn score(&self, candidate: &str, target: &str) -> ScoreReport {
        let target_blank = target.trim().is_empty();

        // Keywords
        let candidate_keywords = keyword_set(candidate);
        let target_tokens = tokenize(target);
        let target_keywords: BTreeSet<String> = target_tokens.iter().cloned().collect();

        let mut keyword_frequencies = BTreeMap::new();
        for token in target_tokens {
            *keyword_frequencies.entry(token).or_insert(0) += 1;
        }

        let keyword = if target_blank {
            100.0
        } else {
            overlap_score(&candidate_keywords, &target_keywords)
        };

        // Domain skills
        let candidate_skills = self.vocabulary.terms_in(candidate);
        let target_skills = self.vocabulary.terms_in(target);
        let domain = if target_blank || target_skills.is_empty() {
            100.0
        } else {
            overlap_score(&candidate_skills, &target_skills)
        };

        // Sections
        let sections_found = detect_sections(candidate);
        let missing_sections: Vec<Section> = Section::ALL
            .into_iter()
            .filter(|s| !sections_found.contains(s))
            .collect();
        let section = 100.0 * sections_found.len() as f64 / Section::ALL.len() as f64;

        let format = format_score(candidate);

        let component_scores = BTreeMap::from([
            (Component::Keyword, keyword),
            (Component::Domain, domain),
            (Component::Section, section),
            (Component::Format, format),
        ]);
        let weights: BTreeMap<Component, f64> =
            Component::ALL.into_iter().map(|c| (c, c.weight())).collect();
        let overall_score = weighted_total(&component_scores, &weights);

        tracing::debug!(
            overall_score,
            keyword,
            domain,
            section,
            format,
            "Compatibility scored"
        );

        ScoreReport {
            overall_score,
            matched_keywords: candidate_keywords
                .intersection(&target_keywords)
                .cloned()
                .collect(),
            missing_keywords: target_keywords
                .difference(&candidate_keywords)
                .cloned()
                .collect(),
            extra_keywords: candidate_keywords
                .difference(&target_keywords)
                .cloned()
                .collect(),
            keyword_frequencies,
            matched_skills: candidate_skills
                .intersection(&target_skills)
                .cloned()
                .collect(),
            missing_skills: target_skills.difference(&candidate_skills).cloned().collect(),
            component_scores,
            weights,
            sections_found,
            missing_sections,
        }
    }
}

// ============================================================================
// Pure helpers
// ============================================================================

/// Lower-cased keyword tokens in document order, stop words removed
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Distinct keywords of `text`
pub fn keyword_set(text: &str) -> BTreeSet<String> {
    tokenize(text).into_iter().collect()
}

/// `100 * |candidate ∩ target| / |target|`, 0 for an empty target
fn overlap_score(candidate: &BTreeSet<String>, target: &BTreeSet<String>) -> f64 {
    if target.is_empty() {
        return 0.0;
    }
    let matched = candidate.intersection(target).count();
    (100.0 * matched as f64 / target.len() as f64).min(100.0)
}

/// Canonical sections whose header appears in `text`
pub fn detect_sections(text: &str) -> Vec<Section> {
    let headers: Vec<String> = text
        .lines()
        .map(normalize_header)
        .filter(|line| !line.is_empty() && line.split_whitespace().count() <= MAX_HEADER_WORDS)
        .collect();

    Section::ALL
        .into_iter()
        .filter(|section| {
            headers
                .iter()
                .any(|line| section.aliases().iter().any(|alias| is_header(line, alias)))
        })
        .collect()
}

/// Strip markdown/decoration around a header line and lower-case it
fn normalize_header(line: &str) -> String {
    line.trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

fn is_header(line: &str, alias: &str) -> bool {
    match line.strip_prefix(alias) {
        Some(rest) => rest.chars().next().map_or(true, |c| !c.is_alphanumeric()),
        None => false,
    }
}

fn is_bullet(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with(['-', '*', '•', '–', '·', '▪']) || NUMBERED_ITEM.is_match(line)
}

/// Format quality in [0, 100]: four checks worth 25 points each
pub fn format_score(text: &str) -> f64 {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return 0.0;
    }
    let total = lines.len() as f64;

    let short_lines = lines
        .iter()
        .filter(|l| l.trim().chars().count() <= MAX_LINE_LEN)
        .count() as f64;
    let bullets = lines.iter().filter(|l| is_bullet(l)).count() as f64;

    let checks = [
        short_lines / total >= SHORT_LINE_RATIO,
        bullets / total >= BULLET_RATIO,
        EMAIL.is_match(text),
        PHONE.is_match(text),
    ];

    25.0 * checks.iter().filter(|passed| **passed).count() as f64
}
