//! Persona preamble builder.
//!
//! [`PersonaPrompt`] turns the user's [`Preferences`] into the system
//! instruction sent alongside every request: who the assistant is, who it is
//! talking to, which language it answers in, and the tone it takes.
//!
//! The reply language is fixed at construction time; Bangla (`"bn"`), English
//! (`"en"`) and Hindi (`"hi"`) have named instructions, any other code is passed
//! through verbatim.

use crate::conversation::Preferences;

/// Builds the system instruction for one turn.
///
/// # Example
/// ```rust
/// use shohayok::conversation::Preferences;
/// use shohayok::llm::PersonaPrompt;
///
/// let prompt = PersonaPrompt::new("bn").build(&Preferences::default());
/// assert!(prompt.contains("You are Shohayok"));
/// assert!(prompt.contains("Bangla"));
/// ```
#[derive(Debug, Clone)]
pub struct PersonaPrompt {
    language: String,
}

impl PersonaPrompt {
    /// Create a builder replying in the given ISO-639-1 language.
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Build the preamble for `prefs`.
    pub fn build(&self, prefs: &Preferences) -> String {
        let (language_name, language_rule) = self.language_rule();

        let mut prompt = String::with_capacity(512);
        prompt.push_str("SYSTEM IDENTITY:\n");
        prompt.push_str(&format!(
            "You are {}, a tactical holographic AI assistant.\n",
            prefs.ai_name
        ));
        prompt.push_str(&format!(
            "User: {} (Admin). Address the user as {}.\n",
            prefs.user_name, prefs.user_name
        ));

        prompt.push_str("\nPRIMARY PROTOCOL:\n");
        prompt.push_str(&format!("1. LANGUAGE: {language_rule}\n"));
        prompt.push_str("2. PERSONA: You are a tactical OS interface.\n");
        prompt.push_str(&format!("3. TONE: {}\n", prefs.tone.instruction()));

        prompt.push_str("\nRULES:\n");
        prompt.push_str("- Keep responses short.\n");
        prompt.push_str(&format!(
            "- Confirm tool actions immediately in {language_name}.\n"
        ));
        prompt
    }

    fn language_rule(&self) -> (String, String) {
        match self.language.as_str() {
            "bn" => ("Bangla".into(), "Fluent Bangla (Bengali script).".into()),
            "en" => ("English".into(), "Clear, natural English.".into()),
            "hi" => ("Hindi".into(), "Fluent Hindi (Devanagari script).".into()),
            other => (other.to_string(), format!("Reply in the language '{other}'.")),
        }
    }
}

impl Default for PersonaPrompt {
    fn default() -> Self {
        Self::new("bn")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
