//! Coping-strategy lookup.
//!
//! A small curated table maps an emotion label to three strategies. Lookup
//! lower-cases the label and takes the first category (in table order)
//! whose key or one of whose trigger terms appears in it. Anything else
//! gets the general list, so the result is never empty.

/// One row of the strategy table.
#[derive(Debug)]
pub struct Category {
    pub key: &'static str,
    /// Extra words that select this category besides `key`.
    pub triggers: &'static [&'static str],
    pub strategies: &'static [&'static str],
}

pub static CATEGORIES: &[Category] = &[
    Category {
        key: "anxiety",
        triggers: &["anxious", "panic", "nervous", "worried"],
        strategies: &[
            "Try the 5-4-3-2-1 grounding technique: Name 5 things you see, 4 you can touch, 3 you hear, 2 you smell, 1 you taste",
            "Practice deep breathing: Breathe in for 4, hold for 4, exhale for 6",
            "Progressive muscle relaxation can help release physical tension",
        ],
    },
    Category {
        key: "depression",
        triggers: &["depressed", "hopeless", "sad", "empty"],
        strategies: &[
            "Start with small, achievable goals for today",
            "Try to get some sunlight or fresh air, even briefly",
            "Reach out to one trusted person, even if it's just a text",
        ],
    },
    Category {
        key: "stress",
        triggers: &["overwhelmed", "pressure", "burned out", "burnt out"],
        strategies: &[
            "Take a 5-minute break and focus only on your breathing",
            "List three things you can control in this situation",
            "Consider if this will matter in 5 years - sometimes perspective helps",
        ],
    },
    Category {
        key: "anger",
        triggers: &["angry", "furious", "frustrated", "mad"],
        strategies: &[
            "Try counting to 10 slowly before responding",
            "Physical activity can help release anger energy safely",
            "Journal about what's triggering the anger",
        ],
    },
];

pub static GENERAL_STRATEGIES: &[&str] = &[
    "Deep breathing exercises",
    "Going for a short walk",
    "Talking to someone you trust",
    "Writing down your thoughts",
];

/// The category `label` selects, if any.
pub fn category_for(label: &str) -> Option<&'static Category> {
    let lower = label.to_lowercase();
    CATEGORIES.iter().find(|c| {
        lower.contains(c.key) || c.triggers.iter().any(|t| contains_word(&lower, t))
    })
}

/// Strategies for `label` as speakable text.
///
/// ```rust
/// let text = sage::coping::strategies_for("purple");
/// assert!(text.starts_with("Here are some general coping strategies:"));
/// ```
pub fn strategies_for(label: &str) -> String {
    match category_for(label) {
        Some(category) => format!(
            "Here are some strategies that might help with {}:\n{}",
            label,
            bullets(category.strategies)
        ),
        None => format!(
            "Here are some general coping strategies:\n{}",
            bullets(GENERAL_STRATEGIES)
        ),
    }
}

fn bullets(items: &[&str]) -> String {
    items
        .iter()
        .map(|s| format!("• {}", s))
        .collect::<Vec<_>>()
        .join("\n")
}

// Trigger terms match whole words so "mad" does not fire on "made".
fn contains_word(haystack: &str, term: &str) -> bool {
    haystack.match_indices(term).any(|(start, _)| {
        let end = start + term.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
