//! MPA Assist - Task-level assistants
//!
//! - [`ResumeAnalyzer`]: compatibility score, recommendations and an optional review
//! - [`VehicleDiagnostics`]: dashboard photo diagnosis with roadside guidance

pub mod resume;
pub mod vehicle;

pub use resume::{parse_review, Rating, ResumeAnalysis, ResumeAnalyzer, ResumeReview};
pub use vehicle::{Diagnosis, EmergencyContact, Solution, VehicleDiagnostics};
