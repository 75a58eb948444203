//! MPA ATS - Resume compatibility scoring
//!
//! Pure, network-free scoring of a candidate text against a target text and
//! the rule-based recommendations derived from the resulting report.

pub mod recommend;
pub mod scorer;
pub mod vocabulary;

pub use recommend::{recommend, top_missing_keywords, Priority, Recommendation};
pub use scorer::{
    detect_sections, format_score, keyword_set, tokenize, Component, ScoreReport, Scorer,
    Section,
};
pub use vocabulary::Vocabulary;
