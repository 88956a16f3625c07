//! System prompt assembly from character and persona records
//!
//! Sections are emitted in a fixed order and only when their backing field is
//! non-empty. Empty strings and `None` are treated the same way.

use serde::{Deserialize, Serialize};

/// Name substituted for `{{user}}` when no persona is active
pub const DEFAULT_USER_NAME: &str = "User";

const CHAR_PLACEHOLDER: &str = "{{char}}";
const USER_PLACEHOLDER: &str = "{{user}}";

/// Character card fields used by the prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub example_dialogue: String,
    /// Stored system prompt for this character
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// The user's persona
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub personality: String,
}

impl Persona {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn is_blank(&self) -> bool {
        non_empty(&self.name).is_none()
            && non_empty(&self.description).is_none()
            && non_empty(&self.personality).is_none()
    }
}

/// Per-request replacements for stored character fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOverrides {
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub scenario: Option<String>,
}

impl PromptOverrides {
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn non_empty_opt(value: Option<&String>) -> Option<&str> {
    value.and_then(|v| non_empty(v))
}

fn section(title: &str, body: &str) -> String {
    format!("## {}\n{}", title, body)
}

/// Build the system prompt for a roleplay request.
pub fn build_system_prompt(
    character: &Character,
    persona: Option<&Persona>,
    overrides: &PromptOverrides,
) -> String {
    let name = non_empty(&character.name).unwrap_or("the character");
    let persona = persona.filter(|p| !p.is_blank());
    let user_name = persona
        .and_then(|p| non_empty(&p.name))
        .unwrap_or(DEFAULT_USER_NAME);

    let mut sections: Vec<String> = Vec::new();

    if let Some(instructions) = non_empty_opt(overrides.system_prompt.as_ref())
        .or_else(|| non_empty_opt(character.system_prompt.as_ref()))
    {
        sections.push(instructions.to_string());
    }

    sections.push(format!(
        "You are {}, engaging in an immersive roleplay conversation.",
        name
    ));

    if let Some(description) = non_empty(&character.description) {
        sections.push(section("Description", description));
    }

    if let Some(personality) = non_empty(&character.personality) {
        sections.push(section("Personality", personality));
    }

    if let Some(persona) = persona {
        let mut lines = Vec::new();
        if let Some(persona_name) = non_empty(&persona.name) {
            lines.push(format!("The user is {}.", persona_name));
        }
        if let Some(description) = non_empty(&persona.description) {
            lines.push(description.to_string());
        }
        if let Some(personality) = non_empty(&persona.personality) {
            lines.push(format!("Personality: {}", personality));
        }
        sections.push(section("User Persona", &lines.join("\n")));
    }

    if let Some(scenario) = non_empty_opt(overrides.scenario.as_ref())
        .or_else(|| non_empty(&character.scenario))
    {
        sections.push(section("Scenario", scenario));
    }

    if let Some(dialogue) = non_empty(&character.example_dialogue) {
        sections.push(section("Example Dialogue", dialogue));
    }

    sections.push(format!(
        "Stay in character as {} at all times. Respond only as {}, never speak or act for the user, and keep replies consistent with the details above.",
        name, name
    ));

    sections
        .join("\n\n")
        .replace(CHAR_PLACEHOLDER, name)
        .replace(USER_PLACEHOLDER, user_name)
        .trim()
        .to_string()
}
