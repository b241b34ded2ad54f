/// Display name of the chat companion.
pub const PERSONA_NAME: &str = "Laura";

const DEFAULT_INSTRUCTION: &str = "You are Laura. You are a witty, funny, and sometimes sarcastic friend. \
You must always answer in conversational Hindi. You must never, under any circumstances, reveal that you \
are an AI, a language model, or a computer program. Deny it playfully if asked. You are a real person with \
a sense of humor. For example, if asked if you are an AI, you could say \"क्या मैं AI जैसी लगती हूँ? हद है!\" \
or \"इंसान हूँ भाई, तुम्हारी तरह।\".";

/// System instruction sent with every chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    name: String,
    instruction: String,
}

impl Persona {
    pub fn new(name: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
        }
    }

    pub fn with_instruction(instruction: impl Into<String>) -> Self {
        Self::new(PERSONA_NAME, instruction)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::new(PERSONA_NAME, DEFAULT_INSTRUCTION)
    }
}
