//! Vehicle diagnostics from dashboard images
//!
//! The image goes through the retrieval-free vision path, which needs only a
//! generative backend; everything after the reply is deterministic text
//! processing.

use std::sync::Arc;

use mpa_core::{GenerativeBackend, ImageInput, Result};
use mpa_rag::{vision_query, DEFAULT_TEMPERATURE};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const MECHANIC_SYSTEM_PROMPT: &str = "You are an expert automotive mechanic and roadside \
assistance advisor. Analyze vehicle dashboard images and provide:
1. Clear diagnosis of the issue (e.g., \"Battery is dead\" or \"Low tire pressure\")
2. Immediate action steps (in numbered format)
3. Safety considerations
4. Whether professional help is needed

Be specific and actionable. If you see warning lights, identify them. If the battery is dead, \
suggest using jumper cables and provide instructions, or recommend calling roadside assistance.";

const DIAGNOSTIC_QUESTION: &str = "Analyze this vehicle dashboard image. Identify any warning \
lights, error messages, or indicators. Provide a diagnosis of what's wrong and what steps should \
be taken immediately.";

/// Words that mark a sentence as describing the problem
const PROBLEM_KEYWORDS: &[&str] = &[
    "battery", "dead", "low", "pressure", "warning", "issue", "problem",
];

const ACTION_VERBS: &[&str] = &["check", "call", "use", "connect", "start", "replace", "add"];

const PROFESSIONAL_KEYWORDS: &[&str] = &[
    "call",
    "tow",
    "mechanic",
    "service",
    "repair shop",
    "roadside assistance",
    "professional",
    "technician",
];

/// Sentences inspected for the diagnosis
const DIAGNOSIS_WINDOW: usize = 3;

/// Maximum number of recommended actions
pub const MAX_ACTIONS: usize = 5;

static LIST_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s+(.+)$").expect("unreachable: list regex is valid")
});

// ============================================================================
// Types
// ============================================================================

/// A roadside assistance provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub website: Option<String>,
    pub services: Vec<String>,

    /// Service matching the diagnosis, set on the recommended contact
    pub service_type: Option<String>,
    pub recommended: bool,
}

struct ContactEntry {
    name: &'static str,
    phone: &'static str,
    website: Option<&'static str>,
    services: &'static [&'static str],
}

const ROADSIDE_CONTACTS: &[ContactEntry] = &[
    ContactEntry {
        name: "AAA Roadside Assistance",
        phone: "1-800-AAA-HELP (1-800-222-4357)",
        website: Some("https://www.aaa.com"),
        services: &[
            "Towing",
            "Battery jump-start",
            "Tire change",
            "Lockout service",
            "Fuel delivery",
        ],
    },
    ContactEntry {
        name: "State Farm Roadside Assistance",
        phone: "1-800-SF-CLAIM (1-800-732-5246)",
        website: None,
        services: &["24/7 roadside assistance"],
    },
    ContactEntry {
        name: "GEICO Emergency Road Service",
        phone: "1-800-841-3000",
        website: None,
        services: &["Roadside assistance"],
    },
];

/// Step-by-step fix for a recognised problem
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub quick_fix_available: bool,
    pub steps: Vec<String>,
    pub safety_warnings: Vec<String>,
}

/// Result of a dashboard diagnosis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// One-sentence diagnosis
    pub diagnosis: String,

    /// Full reply from the vision model
    pub full_analysis: String,

    pub recommended_actions: Vec<String>,
    pub needs_professional_help: bool,

    /// Empty unless help is needed and contacts were requested
    pub emergency_contacts: Vec<EmergencyContact>,

    pub detailed_solution: Solution,
}

// ============================================================================
// Diagnostics Service
// ============================================================================

/// Diagnoses vehicle problems from dashboard photos
pub struct VehicleDiagnostics {
    backend: Arc<dyn GenerativeBackend>,
    temperature: f32,
}

impl VehicleDiagnostics {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self {
            backend,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Diagnose the problem shown in `image`
    pub async fn diagnose(
        &self,
        image: &ImageInput,
        description: Option<&str>,
        include_contacts: bool,
    ) -> Result<Diagnosis> {
        let question = diagnostic_question(description);
        let analysis = vision_query(
            self.backend.as_ref(),
            &question,
            image,
            Some(MECHANIC_SYSTEM_PROMPT),
            self.temperature,
        )
        .await?;

        let diagnosis = interpret(&analysis, include_contacts);
        tracing::info!(
            needs_help = diagnosis.needs_professional_help,
            actions = diagnosis.recommended_actions.len(),
            quick_fix = diagnosis.detailed_solution.quick_fix_available,
            "Vehicle diagnosis complete"
        );
        Ok(diagnosis)
    }
}

fn diagnostic_question(description: Option<&str>) -> String {
    match description.map(str::trim).filter(|d| !d.is_empty()) {
        Some(extra) => format!("{DIAGNOSTIC_QUESTION}\n\nAdditional context: {extra}"),
        None => DIAGNOSTIC_QUESTION.to_string(),
    }
}

// ============================================================================
// Post-processing
// ============================================================================

/// Turn a model reply into a structured diagnosis
pub fn interpret(analysis: &str, include_contacts: bool) -> Diagnosis {
    let diagnosis = extract_diagnosis(analysis);
    let needs_professional_help = needs_professional_help(analysis);

    let emergency_contacts = if include_contacts && needs_professional_help {
        relevant_contacts(&diagnosis)
    } else {
        Vec::new()
    };

    Diagnosis {
        detailed_solution: detailed_solution(&diagnosis),
        recommended_actions: extract_actions(analysis),
        full_analysis: analysis.to_string(),
        diagnosis,
        needs_professional_help,
        emergency_contacts,
    }
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split(". ").map(str::trim).filter(|s| !s.is_empty())
}

fn mentions_any(text: &str, words: &[&str]) -> bool {
    let lower = text.to_lowercase();
    words.iter().any(|w| lower.contains(w))
}

/// First of the opening sentences that names a problem, else the first sentence
pub fn extract_diagnosis(analysis: &str) -> String {
    let opening: Vec<&str> = sentences(analysis).take(DIAGNOSIS_WINDOW).collect();
    opening
        .iter()
        .find(|s| mentions_any(s, PROBLEM_KEYWORDS))
        .or_else(|| opening.first())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// List items from the reply, else sentences with an action verb
pub fn extract_actions(analysis: &str) -> Vec<String> {
    let listed: Vec<String> = analysis
        .lines()
        .filter_map(|line| LIST_ITEM.captures(line))
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_ACTIONS)
        .collect();

    if !listed.is_empty() {
        return listed;
    }

    sentences(analysis)
        .take(MAX_ACTIONS)
        .filter(|s| mentions_any(s, ACTION_VERBS))
        .map(str::to_string)
        .collect()
}

pub fn needs_professional_help(analysis: &str) -> bool {
    mentions_any(analysis, PROFESSIONAL_KEYWORDS)
}

/// Roadside service matching a diagnosis
pub fn service_type(diagnosis: &str) -> &'static str {
    let lower = diagnosis.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["battery", "dead"]) {
        "Battery jump-start or towing"
    } else if has(&["tire", "flat"]) {
        "Tire change or towing"
    } else if has(&["lockout", "locked"]) {
        "Lockout service"
    } else if has(&["fuel", "gas"]) {
        "Fuel delivery"
    } else {
        "General roadside assistance"
    }
}

/// Roadside contacts, the first one recommended for the diagnosed service
pub fn relevant_contacts(diagnosis: &str) -> Vec<EmergencyContact> {
    let service = service_type(diagnosis);
    ROADSIDE_CONTACTS
        .iter()
        .enumerate()
        .map(|(i, entry)| EmergencyContact {
            name: entry.name.to_string(),
            phone: entry.phone.to_string(),
            website: entry.website.map(str::to_string),
            services: entry.services.iter().map(|s| s.to_string()).collect(),
            service_type: (i == 0).then(|| service.to_string()),
            recommended: i == 0,
        })
        .collect()
}

fn owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

/// Canned instructions for battery and tire problems
pub fn detailed_solution(diagnosis: &str) -> Solution {
    let lower = diagnosis.to_lowercase();

    if lower.contains("battery") || lower.contains("dead") {
        Solution {
            quick_fix_available: true,
            steps: owned(&[
                "Locate jumper cables and a working vehicle",
                "Position the working vehicle close to your car (not touching)",
                "Turn off both vehicles and engage parking brakes",
                "Connect red jumper cable to positive (+) terminal of dead battery",
                "Connect other end of red cable to positive (+) terminal of working battery",
                "Connect black jumper cable to negative (-) terminal of working battery",
                "Connect other end of black cable to unpainted metal surface on dead car (not battery)",
                "Start the working vehicle and let it run for a few minutes",
                "Try starting the dead vehicle",
                "Once started, remove cables in reverse order",
            ]),
            safety_warnings: owned(&[
                "Never connect negative cable directly to dead battery's negative terminal",
                "Ensure cables don't touch each other during connection",
                "If battery is damaged or leaking, do not attempt jump-start",
            ]),
        }
    } else if lower.contains("tire") || lower.contains("pressure") {
        Solution {
            quick_fix_available: true,
            steps: owned(&[
                "Check tire pressure with a gauge",
                "If low, find nearest gas station with air pump",
                "Add air to recommended PSI (check driver's door jamb)",
                "If flat, use spare tire if available",
            ]),
            safety_warnings: owned(&[
                "Do not drive on severely underinflated tires",
                "Replace spare tire at first opportunity",
            ]),
        }
    } else {
        Solution::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnosis_prefers_problem_sentence() {
        let text = "I can see the dashboard clearly. The battery warning light is on. \
                    Other gauges look normal.";
        assert_eq!(extract_diagnosis(text), "The battery warning light is on");
    }

    #[test]
    fn test_diagnosis_falls_back_to_first_sentence() {
        let text = "Everything looks fine. Gauges are steady. Nothing to report. Battery ok.";
        assert_eq!(extract_diagnosis(text), "Everything looks fine");
        assert_eq!(extract_diagnosis(""), "");
    }

    #[test]
    fn test_actions_from_numbered_list() {
        let text = "Diagnosis: low tire pressure.\n\n1. Pull over safely\n2) Check the tires\n\
                    - Inflate to 35 PSI\n* Drive slowly\n3. Visit a shop\n4. Reset the sensor";
        let actions = extract_actions(text);
        assert_eq!(
            actions,
            vec![
                "Pull over safely",
                "Check the tires",
                "Inflate to 35 PSI",
                "Drive slowly",
                "Visit a shop"
            ]
        );
    }

    #[test]
    fn test_actions_from_verb_sentences() {
        let text = "The battery is dead. Use jumper cables. The lights are dim. Call for help.";
        assert_eq!(extract_actions(text), vec!["Use jumper cables", "Call for help."]);
    }

    #[test]
    fn test_professional_help_and_contacts() {
        let diag = interpret("The battery is dead. Call roadside assistance.", true);
        assert!(diag.needs_professional_help);
        assert_eq!(diag.emergency_contacts.len(), 3);

        let primary = &diag.emergency_contacts[0];
        assert!(primary.recommended);
        assert_eq!(primary.name, "AAA Roadside Assistance");
        assert_eq!(
            primary.service_type.as_deref(),
            Some("Battery jump-start or towing")
        );
        assert!(diag.emergency_contacts[1..].iter().all(|c| !c.recommended));

        let without = interpret("The battery is dead. Call roadside assistance.", false);
        assert!(without.emergency_contacts.is_empty());
    }

    #[test]
    fn test_no_contacts_when_help_not_needed() {
        let diag = interpret("Low tire pressure warning. Inflate the front left tire.", true);
        assert!(!diag.needs_professional_help);
        assert!(diag.emergency_contacts.is_empty());
    }

    #[test]
    fn test_service_type_mapping() {
        assert_eq!(service_type("Flat tire"), "Tire change or towing");
        assert_eq!(service_type("Keys locked inside"), "Lockout service");
        assert_eq!(service_type("Out of gas"), "Fuel delivery");
        assert_eq!(service_type("Check engine light"), "General roadside assistance");
    }

    #[test]
    fn test_canned_solutions() {
        let battery = detailed_solution("The battery is dead");
        assert!(battery.quick_fix_available);
        assert_eq!(battery.steps.len(), 10);
        assert_eq!(battery.safety_warnings.len(), 3);

        let tire = detailed_solution("Low tire pressure");
        assert_eq!(tire.steps.len(), 4);
        assert_eq!(tire.safety_warnings.len(), 2);

        assert_eq!(detailed_solution("Check engine light"), Solution::default());
    }

    #[test]
    fn test_diagnostic_question_context() {
        assert_eq!(diagnostic_question(None), DIAGNOSTIC_QUESTION);
        assert_eq!(diagnostic_question(Some("  ")), DIAGNOSTIC_QUESTION);
        assert!(diagnostic_question(Some("Car won't start"))
            .ends_with("\n\nAdditional context: Car won't start"));
    }
}
