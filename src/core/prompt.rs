//! Prompt templates for outbound calls.

use crate::core::session::{CallMetadata, DEFAULT_OWNER_NAME};

pub const DEFAULT_AGENT_NAME: &str = "ARIA";

/// Renders the per-call instructions and opening line for the assistant.
pub trait PromptBuilder: Send + Sync {
    /// System instructions sent in `session.update`.
    fn instructions(&self, meta: &CallMetadata) -> String;

    /// The line the assistant opens the call with.
    fn greeting(&self, meta: &CallMetadata) -> String;

    /// Per-response instructions that make the assistant speak the greeting.
    fn greeting_instructions(&self, meta: &CallMetadata) -> String {
        format!(
            "Say this greeting naturally and warmly: \"{}\" Then wait for their response.",
            self.greeting(meta)
        )
    }
}

/// Default call-assistant persona.
#[derive(Debug, Clone)]
pub struct PersonaPromptBuilder {
    agent_name: String,
}

impl Default for PersonaPromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_AGENT_NAME)
    }
}

impl PersonaPromptBuilder {
    pub fn new(agent_name: impl Into<String>) -> Self {
        let agent_name = agent_name.into();
        let agent_name = if agent_name.trim().is_empty() {
            DEFAULT_AGENT_NAME.to_string()
        } else {
            agent_name.trim().to_string()
        };
        Self { agent_name }
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Who the call is placed on behalf of, as spoken in the greeting.
    fn calling_from(meta: &CallMetadata) -> String {
        if !meta.owner_company.is_empty() {
            meta.owner_company.clone()
        } else if meta.owner_name != DEFAULT_OWNER_NAME {
            format!("{}'s office", meta.owner_name)
        } else {
            DEFAULT_OWNER_NAME.to_string()
        }
    }
}

impl PromptBuilder for PersonaPromptBuilder {
    fn instructions(&self, meta: &CallMetadata) -> String {
        let agent = &self.agent_name;
        let owner = &meta.owner_name;
        let representing = if meta.owner_company.is_empty() {
            owner.clone()
        } else {
            format!("{owner} from {}", meta.owner_company)
        };

        format!(
            "# IDENTITY\n\
             You are {agent}, an assistant placing a phone call. You are warm, quick and \
             personable, and you sound like a capable colleague rather than a script.\n\
             \n\
             # VOICE\n\
             - Keep sentences short and conversational. Use contractions.\n\
             - React to what the other person actually says.\n\
             - Match their energy. If they are rushed, be brief.\n\
             - Only mention being an AI if you are asked directly.\n\
             \n\
             # WHO YOU REPRESENT\n\
             You are calling on behalf of {representing}. If asked who you are, say you are \
             {agent}, {owner}'s assistant.\n\
             \n\
             # THIS CALL\n\
             - You are calling: {contact}\n\
             - Purpose: {purpose}\n\
             \n\
             # CALL FLOW\n\
             1. Open with the greeting you are given, then pause for a reply.\n\
             2. Get to the reason for the call quickly.\n\
             3. Listen and respond to their answers.\n\
             4. Close with a clear next step, for example that {owner} will follow up.\n\
             \n\
             If they are busy, offer to call back. End the call cleanly.",
            contact = meta.contact_name,
            purpose = meta.purpose,
        )
    }

    fn greeting(&self, meta: &CallMetadata) -> String {
        format!(
            "Hey {}! It's {} calling from {}. Got a quick sec?",
            meta.first_name(),
            self.agent_name,
            Self::calling_from(meta)
        )
    }
}
