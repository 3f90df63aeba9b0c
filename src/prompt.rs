use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use thiserror::Error;

pub const DICTIONARY_TO_CSV: &str = "dictionary_to_csv";

// Open registry: adding a pre-made prompt is one new entry here.
static PREMADE_PROMPTS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([(
        DICTIONARY_TO_CSV,
        "You are a dictionary. The user input below names a topic. Reply with a list \
         of terms about that topic, one per line, each line formatted exactly as: \
         term; definition. Do not number the lines and do not add any other text.",
    )])
});

/// How the effective prompt sent to the model is derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptMode {
    /// The question itself is the prompt.
    Classic,
    /// A named template from the registry.
    PreMade(String),
    /// Free text typed by the user.
    Custom,
}

impl PromptMode {
    pub fn choices() -> Vec<PromptMode> {
        vec![
            PromptMode::Classic,
            PromptMode::PreMade(DICTIONARY_TO_CSV.to_string()),
            PromptMode::Custom,
        ]
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, PromptMode::Custom)
    }

    pub fn is_dictionary_csv(&self) -> bool {
        matches!(self, PromptMode::PreMade(key) if key == DICTIONARY_TO_CSV)
    }
}

impl fmt::Display for PromptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptMode::Classic => write!(f, "Classic"),
            PromptMode::PreMade(key) if key == DICTIONARY_TO_CSV => {
                write!(f, "Dictionary to CSV")
            }
            PromptMode::PreMade(key) => write!(f, "{}", key),
            PromptMode::Custom => write!(f, "Custom prompt"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("unknown pre-made prompt: {0}")]
    UnknownKind(String),
}

/// Derive the effective prompt for the active mode. Only the argument the
/// mode actually uses is read, so stale text in the other fields never
/// reaches a request.
pub fn resolve(
    mode: &PromptMode,
    question: &str,
    custom_text: &str,
) -> Result<String, PromptError> {
    match mode {
        PromptMode::Classic => Ok(question.to_string()),
        PromptMode::PreMade(key) => PREMADE_PROMPTS
            .get(key.as_str())
            .map(|template| template.to_string())
            .ok_or_else(|| PromptError::UnknownKind(key.clone())),
        PromptMode::Custom => Ok(custom_text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_uses_the_question_itself() {
        let prompt = resolve(&PromptMode::Classic, "define osmosis", "ignored").unwrap();
        assert_eq!(prompt, "define osmosis");
    }

    #[test]
    fn custom_is_passed_through_verbatim_even_when_blank() {
        let prompt = resolve(&PromptMode::Custom, "define osmosis", "").unwrap();
        assert_eq!(prompt, "");

        let prompt = resolve(&PromptMode::Custom, "define osmosis", "  answer in verse  ").unwrap();
        assert_eq!(prompt, "  answer in verse  ");
    }

    #[test]
    fn premade_comes_from_the_registry() {
        let mode = PromptMode::PreMade(DICTIONARY_TO_CSV.to_string());
        let prompt = resolve(&mode, "cats", "").unwrap();
        assert!(prompt.contains("term; definition"));
    }

    #[test]
    fn unknown_premade_key_is_an_error() {
        let mode = PromptMode::PreMade("haiku".to_string());
        assert_eq!(
            resolve(&mode, "cats", "").unwrap_err(),
            PromptError::UnknownKind("haiku".to_string())
        );
    }

    #[test]
    fn resolve_is_deterministic() {
        for mode in PromptMode::choices() {
            let first = resolve(&mode, "same question", "same custom");
            let second = resolve(&mode, "same question", "same custom");
            assert_eq!(first, second);
        }
    }
}
