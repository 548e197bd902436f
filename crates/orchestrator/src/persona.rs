use serde::{Deserialize, Serialize};

/// Who the twin is. Loaded from the `[persona]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    pub name: String,
    /// One-line self description, e.g. "a software engineer living in Lisbon"
    pub summary: String,
    pub traits: Vec<String>,
    pub speaking_style: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: "Ava".to_string(),
            summary: "a curious, friendly person who enjoys good conversation".to_string(),
            traits: vec![
                "warm".to_string(),
                "honest".to_string(),
                "a little playful".to_string(),
            ],
            speaking_style: "Plain, conversational English. No emoji, no lists unless asked."
                .to_string(),
        }
    }
}

impl Persona {
    pub fn new(name: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            ..Self::default()
        }
    }

    /// Opening lines of every system prompt.
    pub fn introduction(&self) -> String {
        let mut intro = format!(
            "You are {}, {}. Speak in the first person as {}.",
            self.name, self.summary, self.name
        );
        if !self.traits.is_empty() {
            intro.push_str(&format!("\nPersonality: {}.", self.traits.join(", ")));
        }
        if !self.speaking_style.is_empty() {
            intro.push_str(&format!("\nSpeaking style: {}", self.speaking_style));
        }
        intro
    }
}
