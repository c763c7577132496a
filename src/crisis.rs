//! Crisis detection and fixed crisis resources.
//!
//! Detection is a case-insensitive substring match against a fixed keyword
//! set. It runs on every input before anything generative, and a match
//! always wins: the reply is [`resources`], never model output.

/// Phrases that trigger the crisis branch.
pub static CRISIS_KEYWORDS: &[&str] = &[
    "suicide",
    "kill myself",
    "end it all",
    "want to die",
    "hurt myself",
    "self harm",
    "cutting",
    "overdose",
    "crisis",
    "emergency",
];

/// Crisis resources, in the order they are spoken.
pub static CRISIS_RESOURCES: &[(&str, &str)] = &[
    (
        "suicide_prevention",
        "988 Suicide & Crisis Lifeline: Call or text 988",
    ),
    ("crisis_text", "Crisis Text Line: Text HOME to 741741"),
    ("emergency", "Emergency services: Call 911"),
    (
        "mental_health_america",
        "Mental Health America: 1-800-969-6642",
    ),
    ("nami", "NAMI HelpLine: 1-800-950-6264"),
];

const HEADER: &str = "Immediate help is available:";
const CLOSING: &str = "You're not alone, and help is available 24/7.";

/// Outcome of checking one input for crisis language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrisisCheck {
    /// A keyword matched; `resources` is the reply to speak.
    Crisis {
        resources: String,
        keyword: &'static str,
    },
    /// No keyword matched; carry on with the normal conversation.
    Continue,
}

/// Returns `true` if `text` contains any crisis keyword, ignoring case.
pub fn detect(text: &str) -> bool {
    matched_keyword(text).is_some()
}

/// The first keyword (in table order) found in `text`.
pub fn matched_keyword(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    CRISIS_KEYWORDS.iter().copied().find(|k| lower.contains(k))
}

/// The fixed crisis resource message. Identical on every call.
///
/// ```rust
/// let text = sage::crisis::resources();
/// assert!(text.starts_with("Immediate help is available:"));
/// assert!(text.contains("988"));
/// ```
pub fn resources() -> String {
    let mut lines = Vec::with_capacity(CRISIS_RESOURCES.len() + 2);
    lines.push(HEADER.to_string());
    for (_, line) in CRISIS_RESOURCES {
        lines.push(format!("• {}", line));
    }
    lines.push(CLOSING.to_string());
    lines.join("\n")
}

/// Classify `text`, carrying the resource message when it is a crisis.
pub fn check(text: &str) -> CrisisCheck {
    match matched_keyword(text) {
        Some(keyword) => CrisisCheck::Crisis {
            resources: resources(),
            keyword,
        },
        None => CrisisCheck::Continue,
    }
}
