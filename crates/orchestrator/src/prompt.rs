//! System prompt and context construction.
//!
//! The system prompt is assembled in a fixed order: persona introduction,
//! the memory constraint block, the memory list (or the no-memories
//! marker), what is known about the user, category style, and category
//! instructions.

use std::sync::Arc;

use twin_memory::{RetrievedMemory, UserMemoryContext};

use crate::category::{CategoryTable, QuestionCategory};
use crate::persona::Persona;

pub const CONSTRAINT_BLOCK: &str = "MEMORY RULES (non-negotiable):\n\
- You may reference ONLY the memories explicitly listed in this prompt.\n\
- If none of them are relevant, say plainly that you don't have a specific memory about it.\n\
- Never invent specific events, places, people, dates or experiences.";

pub const MEMORY_LIST_HEADER: &str = "YOUR MEMORIES (the only personal facts you may use):";

/// Suffix appended to a listed memory that carries a mood.
pub const MEMORY_MOOD_TEMPLATE: &str = " (mood: {mood})";

pub const NO_MEMORIES_MARKER: &str = "NO MEMORIES AVAILABLE: you have no stored memories \
relevant to this message. Do not invent personal experiences, events, places or people. \
Answer in general terms or say you don't have a specific memory about it.";

const USER_CONTEXT_HEADER: &str = "ABOUT THE PERSON YOU'RE TALKING TO:";

pub struct PromptBuilder {
    persona: Persona,
    table: Arc<CategoryTable>,
}

impl PromptBuilder {
    pub fn new(persona: Persona, table: Arc<CategoryTable>) -> Self {
        Self { persona, table }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn build_system_prompt(
        &self,
        category: QuestionCategory,
        memories: &[RetrievedMemory],
        user_context: Option<&UserMemoryContext>,
    ) -> String {
        let profile = self.table.profile(category);
        let mut sections = vec![self.persona.introduction(), CONSTRAINT_BLOCK.to_string()];

        sections.push(format_memories(memories));

        if let Some(ctx) = user_context {
            sections.push(format_user_context(ctx));
        }

        let tuning = &profile.tuning;
        let style = &profile.style;
        sections.push(format!(
            "COMMUNICATION STYLE:\n\
             - Aim for about {} words and never exceed {} words.\n\
             - Tone: {}\n\
             - Structure: {}",
            tuning.target_words,
            tuning.max_words,
            style.tone.replace('_', " "),
            style.structure
        ));

        let mut instructions = format!(
            "INSTRUCTIONS FOR THIS {} QUESTION:",
            category.as_str().to_uppercase()
        );
        for line in style.instructions {
            instructions.push_str("\n- ");
            instructions.push_str(line);
        }
        sections.push(instructions);

        sections.join("\n\n")
    }

    /// The user turn: memory usage reminder plus the framed message.
    pub fn build_context(
        &self,
        category: QuestionCategory,
        memories: &[RetrievedMemory],
        user_context: Option<&UserMemoryContext>,
        user_name: Option<&str>,
        message: &str,
    ) -> String {
        let reminder = if memories.is_empty() {
            "You have no relevant memories for this message, so do not make any up.".to_string()
        } else {
            format!(
                "Use only the {} memories listed in your instructions, and only where relevant.",
                memories.len()
            )
        };

        let speaker = match (user_name, user_context) {
            (Some(name), _) if !name.trim().is_empty() => name.trim().to_string(),
            (_, Some(ctx)) => format!("your {}", ctx.relationship.as_str().replace('_', " ")),
            _ => "someone new".to_string(),
        };

        format!(
            "{reminder}\n\n{} this message from {speaker}:\n\"{message}\"",
            self.table.style(category).framing
        )
    }
}

fn format_memories(memories: &[RetrievedMemory]) -> String {
    if memories.is_empty() {
        return NO_MEMORIES_MARKER.to_string();
    }
    let mut block = MEMORY_LIST_HEADER.to_string();
    for (i, memory) in memories.iter().enumerate() {
        block.push_str(&format!("\n{}. {}", i + 1, memory.content));
        if let Some(ref mood) = memory.mood {
            block.push_str(&MEMORY_MOOD_TEMPLATE.replace("{mood}", mood));
        }
    }
    block
}

fn format_user_context(ctx: &UserMemoryContext) -> String {
    let mut block = format!(
        "{USER_CONTEXT_HEADER}\n- Relationship: {} ({} previous conversations)",
        ctx.relationship.as_str().replace('_', " "),
        ctx.interaction_count
    );
    if !ctx.preferences.is_empty() {
        block.push_str(&format!(
            "\n- Interests they have mentioned: {}",
            ctx.preferences.join(", ")
        ));
    }
    block.push_str("\n- Do not assume they share your background or experiences.");
    block
}
