//! Resume analysis
//!
//! Combines the deterministic compatibility score and recommendations with
//! an optional free-text review from the generative backend.

use std::fmt;
use std::sync::Arc;

use mpa_ats::{recommend, Component, Priority, Recommendation, ScoreReport, Scorer};
use mpa_core::{AgentError, ChatMessage, GenerativeBackend, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters of each text sent to the reviewer
pub const REVIEW_EXCERPT_CHARS: usize = 2000;

/// Temperature used for the review request
pub const REVIEW_TEMPERATURE: f32 = 0.7;

/// Reviewer suggestions appended to the recommendations
pub const MAX_REVIEW_SUGGESTIONS: usize = 3;

const REVIEW_SYSTEM_PROMPT: &str = "You are an expert resume reviewer and ATS (Applicant \
Tracking System) specialist. Analyze resumes and job descriptions to provide actionable feedback.";

static FIT_SLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\s*/\s*10\b").expect("unreachable: fit regex is valid"));

static FIT_ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[-/]10\b").expect("unreachable: fit regex is valid"));

static LIST_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+").expect("unreachable: marker regex is valid")
});

// ============================================================================
// Rating
// ============================================================================

/// Coarse label for an overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Excellent,
    Good,
    NeedsImprovement,
    Poor,
}

impl Rating {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Excellent
        } else if score >= 60.0 {
            Self::Good
        } else if score >= 40.0 {
            Self::NeedsImprovement
        } else {
            Self::Poor
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excellent => write!(f, "Excellent"),
            Self::Good => write!(f, "Good"),
            Self::NeedsImprovement => write!(f, "Needs Improvement"),
            Self::Poor => write!(f, "Poor"),
        }
    }
}

// ============================================================================
// Review
// ============================================================================

/// Structured view of the reviewer's reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeReview {
    /// Unparsed reply
    pub raw: String,

    /// Overall fit on a 0-10 scale, when the reply states one
    pub fit_score: Option<u8>,

    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Clone, Copy)]
enum ReviewSection {
    Strengths,
    Weaknesses,
    Suggestions,
}

/// Parse a free-text review into fit score and bullet sections.
///
/// Headers are short lines or lines ending in `:` naming strengths,
/// weaknesses/gaps or suggestions/improvements; list items that follow are
/// collected until the next header.
pub fn parse_review(reply: &str) -> ResumeReview {
    let mut review = ResumeReview {
        raw: reply.to_string(),
        fit_score: parse_fit_score(reply),
        ..Default::default()
    };

    let mut current: Option<ReviewSection> = None;
    for line in reply.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let is_item = LIST_MARKER.is_match(trimmed);
        let body = LIST_MARKER.replace(trimmed, "").replace("**", "");
        let body = body.trim_matches(|c: char| c == '#' || c == '*' || c.is_whitespace());

        if is_header(body, is_item) {
            let lower = body.to_lowercase();
            current = if lower.contains("strength") {
                Some(ReviewSection::Strengths)
            } else if lower.contains("weakness") || lower.contains("gap") {
                Some(ReviewSection::Weaknesses)
            } else if lower.contains("suggestion") || lower.contains("improvement") {
                Some(ReviewSection::Suggestions)
            } else {
                None
            };
            continue;
        }

        if !is_item || body.is_empty() {
            continue;
        }
        let item = body.to_string();
        match current {
            Some(ReviewSection::Strengths) => review.strengths.push(item),
            Some(ReviewSection::Weaknesses) => review.weaknesses.push(item),
            Some(ReviewSection::Suggestions) => review.suggestions.push(item),
            None => {}
        }
    }

    review
}

/// List items only count as headers when they end with a colon
fn is_header(body: &str, is_item: bool) -> bool {
    body.ends_with(':') || (!is_item && body.split_whitespace().count() <= 4)
}

/// `N/10` is preferred over `N-10` so an echoed "1-10 scale" is not read as a score
fn parse_fit_score(reply: &str) -> Option<u8> {
    [&*FIT_SLASH, &*FIT_ANY].into_iter().find_map(|re| {
        re.captures_iter(reply)
            .filter_map(|c| c[1].parse::<u8>().ok())
            .find(|n| *n <= 10)
    })
}

fn excerpt(text: &str) -> String {
    text.chars().take(REVIEW_EXCERPT_CHARS).collect()
}

fn review_prompt(resume: &str, job: &str) -> String {
    format!(
        "Analyze this resume against the job description.\n\n\
         Job Description:\n{}\n\n\
         Resume:\n{}\n\n\
         Provide:\n\
         1. Overall fit assessment (1-10 scale)\n\
         2. Strengths that match the job\n\
         3. Gaps or weaknesses\n\
         4. Specific suggestions for improvement\n\
         5. ATS compatibility concerns\n\n\
         Format your response in a structured way.",
        excerpt(job),
        excerpt(resume)
    )
}

// ============================================================================
// Analyzer
// ============================================================================

/// Full result of a resume analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeAnalysis {
    pub report: ScoreReport,
    pub recommendations: Vec<Recommendation>,
    pub rating: Rating,
    pub review: Option<ResumeReview>,
}

impl ResumeAnalysis {
    /// Short human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "ATS Score: {:.0}/100 ({})\nKeyword Match: {:.1}%\nMissing Skills: {}",
            self.report.overall_score,
            self.rating,
            self.report.component(Component::Keyword),
            self.report.missing_skills.len()
        )
    }
}

/// Scores resumes and, when a backend is attached, asks it for a review
pub struct ResumeAnalyzer {
    scorer: Scorer,
    backend: Option<Arc<dyn GenerativeBackend>>,
}

impl ResumeAnalyzer {
    pub fn new(scorer: Scorer) -> Self {
        Self {
            scorer,
            backend: None,
        }
    }

    /// Attach the backend used for reviews
    pub fn with_backend(mut self, backend: Arc<dyn GenerativeBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Analyze `resume` against `job`; `review` adds a generative review
    pub async fn analyze(&self, resume: &str, job: &str, review: bool) -> Result<ResumeAnalysis> {
        if resume.trim().is_empty() {
            return Err(AgentError::Validation("Resume text is empty".to_string()));
        }

        let report = self.scorer.score(resume, job);
        let mut recommendations = recommend(&report);
        let rating = Rating::from_score(report.overall_score);

        tracing::info!(
            overall = report.overall_score,
            rating = %rating,
            recommendations = recommendations.len(),
            "Resume scored"
        );

        let review = if review {
            Some(self.review(resume, job).await?)
        } else {
            None
        };

        // Low tier sorts last, so appending keeps the priority order
        if let Some(review) = &review {
            recommendations.extend(
                review
                    .suggestions
                    .iter()
                    .take(MAX_REVIEW_SUGGESTIONS)
                    .map(|s| Recommendation::new(Priority::Low, s.clone())),
            );
        }

        Ok(ResumeAnalysis {
            report,
            recommendations,
            rating,
            review,
        })
    }

    /// Ask the backend for a structured review
    pub async fn review(&self, resume: &str, job: &str) -> Result<ResumeReview> {
        let backend = self.backend.as_ref().ok_or_else(|| {
            AgentError::Config("Resume review requires a generative backend".to_string())
        })?;

        let messages = vec![
            ChatMessage::system(REVIEW_SYSTEM_PROMPT),
            ChatMessage::user(review_prompt(resume, job)),
        ];

        let reply = backend.complete_text(&messages, REVIEW_TEMPERATURE).await?;
        let review = parse_review(&reply);
        tracing::debug!(
            fit_score = ?review.fit_score,
            strengths = review.strengths.len(),
            weaknesses = review.weaknesses.len(),
            suggestions = review.suggestions.len(),
            "Review parsed"
        );
        Ok(review)
    }
}
