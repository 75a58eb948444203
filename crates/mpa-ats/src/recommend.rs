//! Recommendation generator
//!
//! Derives prioritized, actionable gap statements from a [`ScoreReport`].
//! Rules are evaluated in a fixed order and each fires at most once; the
//! output is ordered high, medium, low and stable within a tier.

use serde::{Deserialize, Serialize};

use crate::scorer::{Component, ScoreReport};

/// Overall score below which the resume needs realignment
pub const REALIGN_THRESHOLD: f64 = 50.0;

/// Format score below which formatting advice is given
pub const FORMAT_THRESHOLD: f64 = 70.0;

/// Maximum number of missing keywords named
pub const MAX_NAMED_KEYWORDS: usize = 5;

/// Recommendation priority; declaration order is output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// A single actionable suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub text: String,
    pub priority: Priority,
}

impl Recommendation {
    pub fn new(priority: Priority, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            priority,
        }
    }
}

/// Missing keywords by descending target frequency, ties lexicographic
pub fn top_missing_keywords(report: &ScoreReport, limit: usize) -> Vec<&str> {
    let mut missing: Vec<(&str, usize)> = report
        .missing_keywords
        .iter()
        .map(|k| {
            let freq = report.keyword_frequencies.get(k).copied().unwrap_or(0);
            (k.as_str(), freq)
        })
        .collect();

    missing.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    missing.into_iter().take(limit).map(|(k, _)| k).collect()
}

/// Generate recommendations for a report
pub fn recommend(report: &ScoreReport) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if report.overall_score < REALIGN_THRESHOLD {
        out.push(Recommendation::new(
            Priority::High,
            format!(
                "Overall match is low ({:.0}/100). Fundamentally realign the resume with this \
                 role: rework the summary and experience around the job's core requirements.",
                report.overall_score
            ),
        ));
    }

    if !report.missing_keywords.is_empty() {
        let named = top_missing_keywords(report, MAX_NAMED_KEYWORDS);
        out.push(Recommendation::new(
            Priority::Medium,
            format!(
                "Add missing keywords from the job description where they truthfully apply: {}",
                named.join(", ")
            ),
        ));
    }

    if report.component(Component::Section) < 100.0 && !report.missing_sections.is_empty() {
        let mut sections = report.missing_sections.clone();
        sections.sort();
        let names: Vec<&str> = sections.iter().map(|s| s.as_str()).collect();
        out.push(Recommendation::new(
            Priority::Medium,
            format!("Add the missing resume sections: {}", names.join(", ")),
        ));
    }

    if report.component(Component::Format) < FORMAT_THRESHOLD {
        out.push(Recommendation::new(
            Priority::Low,
            "Improve formatting for ATS parsing: keep lines short, present achievements as \
             bullet points and include an e-mail address and phone number.",
        ));
    }

    // Stable sort keeps rule order within a tier
    out.sort_by_key(|r| r.priority);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::{Scorer, Section};
    use std::collections::{BTreeMap, BTreeSet};

    fn report(overall: f64, section: f64, format: f64) -> ScoreReport {
        ScoreReport {
            overall_score: overall,
            component_scores: BTreeMap::from([
                (Component::Keyword, 50.0),
                (Component::Domain, 50.0),
                (Component::Section, section),
                (Component::Format, format),
            ]),
            weights: Component::ALL.into_iter().map(|c| (c, c.weight())).collect(),
            matched_keywords: BTreeSet::new(),
            missing_keywords: BTreeSet::new(),
            extra_keywords: BTreeSet::new(),
            keyword_frequencies: BTreeMap::new(),
            matched_skills: BTreeSet::new(),
            missing_skills: BTreeSet::new(),
            sections_found: Vec::new(),
            missing_sections: Vec::new(),
        }
    }

    #[test]
    fn test_strong_report_has_no_recommendations() {
        assert!(recommend(&report(90.0, 100.0, 100.0)).is_empty());
    }

    #[test]
    fn test_keywords_ranked_by_frequency_then_name() {
        let mut r = report(90.0, 100.0, 100.0);
        for (term, freq) in [
            ("zeta", 1),
            ("alpha", 1),
            ("beta", 4),
            ("gamma", 2),
            ("delta", 2),
            ("eta", 1),
        ] {
            r.missing_keywords.insert(term.to_string());
            r.keyword_frequencies.insert(term.to_string(), freq);
        }

        assert_eq!(
            top_missing_keywords(&r, MAX_NAMED_KEYWORDS),
            vec!["beta", "delta", "gamma", "alpha", "eta"]
        );

        let recs = recommend(&r);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].text.ends_with("beta, delta, gamma, alpha, eta"));
        assert!(!recs[0].text.contains("zeta"));
    }

    #[test]
    fn test_sections_named_in_canonical_order() {
        let mut r = report(90.0, 60.0, 100.0);
        r.missing_sections = vec![Section::Projects, Section::Education];

        let recs = recommend(&r);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].text.ends_with("Education, Projects"));
    }

    #[test]
    fn test_priority_order_with_format_advice() {
        let mut r = report(30.0, 80.0, 50.0);
        r.missing_sections = vec![Section::Skills];
        r.missing_keywords.insert("rust".to_string());

        let priorities: Vec<Priority> = recommend(&r).iter().map(|r| r.priority).collect();
        assert_eq!(
            priorities,
            vec![Priority::High, Priority::Medium, Priority::Medium, Priority::Low]
        );
    }

    #[test]
    fn test_end_to_end_weak_resume() {
        let recs = recommend(&Scorer::default().score(
            "I like cooking.",
            "Senior engineer with Kubernetes and Terraform experience.",
        ));

        assert_eq!(recs.first().map(|r| r.priority), Some(Priority::High));
        assert_eq!(recs.last().map(|r| r.priority), Some(Priority::Low));
    }
}
