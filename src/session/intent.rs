//! Purchase intent detection
//!
//! A coarse, local heuristic: any configured trigger term appearing in the
//! utterance, ignoring case, marks it as a purchase intent. Negations such as
//! "I don't want to buy yet" still match.

use crate::config::IntentConfig;

/// Classification of a user utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// The user wants to buy a policy; answered locally
    Purchase,
    /// Anything else; forwarded to the assistant service
    Generic,
}

/// Case-insensitive substring classifier
///
/// # Examples
///
/// ```
/// use milo::session::{Intent, IntentClassifier};
///
/// let classifier = IntentClassifier::new(["buy"]);
/// assert_eq!(classifier.classify("I want to BUY insurance"), Intent::Purchase);
/// assert_eq!(classifier.classify("What does baggage cover?"), Intent::Generic);
/// ```
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    triggers: Vec<String>,
}

impl IntentClassifier {
    /// Build a classifier from trigger terms; blank terms are ignored
    pub fn new<I, S>(triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let triggers = triggers
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { triggers }
    }

    /// Build a classifier from configuration
    pub fn from_config(config: &IntentConfig) -> Self {
        Self::new(&config.purchase_triggers)
    }

    /// Classify `text`
    pub fn classify(&self, text: &str) -> Intent {
        let lowered = text.to_lowercase();
        if self.triggers.iter().any(|t| lowered.contains(t.as_str())) {
            Intent::Purchase
        } else {
            Intent::Generic
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::from_config(&IntentConfig::default())
    }
}
