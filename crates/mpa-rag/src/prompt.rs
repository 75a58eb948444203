//! Prompt construction and context assembly

use mpa_core::{ChatMessage, DocumentRecord};

/// System prompt used when a query does not supply one
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful personal assistant. Use the provided \
context to answer questions. If the context doesn't contain enough information, say so and \
provide the best answer you can.";

/// System prompt used on the vision path when none is supplied
pub const DEFAULT_VISION_PROMPT: &str = "You are a helpful assistant that can analyze images and \
provide detailed, actionable advice. Provide specific solutions and next steps when relevant.";

/// Separator placed between context entries
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

const CONTEXT_INSTRUCTION: &str =
    "Please provide a comprehensive answer based on the context above.";
const PLAIN_INSTRUCTION: &str = "Please provide a comprehensive answer.";

// ============================================================================
// Context Assembly
// ============================================================================

/// Context block built from ranked records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextBlock {
    /// Rendered text handed to the backend
    pub text: String,

    /// Records that entered the block, in ranked order
    pub sources: Vec<DocumentRecord>,

    /// Whether the last entry was cut to fit the budget
    pub truncated: bool,
}

impl ContextBlock {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Render ranked records into a context block of at most `budget` chars.
///
/// Each entry is `[Source: <label>]\n<text>`. The entry that would overflow
/// the budget is cut on a char boundary and assembly stops there; if not even
/// its header fits, it is left out.
pub fn assemble_context(records: Vec<DocumentRecord>, budget: usize) -> ContextBlock {
    let mut block = ContextBlock::default();
    let mut used = 0usize;

    for record in records {
        let separator = if block.sources.is_empty() {
            ""
        } else {
            CONTEXT_DELIMITER
        };
        let header = format!("[Source: {}]\n", record.source_label());
        let overhead = separator.chars().count() + header.chars().count();
        let body_len = record.text.chars().count();

        let remaining = budget.saturating_sub(used);
        if overhead >= remaining {
            block.truncated = true;
            break;
        }

        block.text.push_str(separator);
        block.text.push_str(&header);

        if overhead + body_len <= remaining {
            block.text.push_str(&record.text);
            used += overhead + body_len;
            block.sources.push(record);
        } else {
            let keep = remaining - overhead;
            block.text.extend(record.text.chars().take(keep));
            block.sources.push(record);
            block.truncated = true;
            break;
        }
    }

    block
}

// ============================================================================
// Prompt Builder
// ============================================================================

/// Builder for the chat messages of a query
#[derive(Debug, Default)]
pub struct PromptBuilder {
    system_instruction: String,
    context: String,
    question: String,
    instruction: Option<String>,
}

impl PromptBuilder {
    /// Create a new prompt builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set system instruction
    pub fn system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    /// Set the context block
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Set the question
    pub fn question(mut self, q: impl Into<String>) -> Self {
        self.question = q.into();
        self
    }

    /// Override the closing answer instruction
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Build the system and user messages
    pub fn build(self) -> Vec<ChatMessage> {
        let mut user = String::new();

        let default_instruction = if self.context.is_empty() {
            PLAIN_INSTRUCTION
        } else {
            user.push_str("Context:\n");
            user.push_str(&self.context);
            user.push_str("\n\n");
            CONTEXT_INSTRUCTION
        };

        user.push_str("Question: ");
        user.push_str(&self.question);
        user.push_str("\n\n");
        user.push_str(self.instruction.as_deref().unwrap_or(default_instruction));

        let mut messages = Vec::with_capacity(2);
        if !self.system_instruction.is_empty() {
            messages.push(ChatMessage::system(self.system_instruction));
        }
        messages.push(ChatMessage::user(user));
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpa_core::Role;

    fn record(id: &str, text: &str) -> DocumentRecord {
        DocumentRecord::new(id, text, vec![1.0])
    }

    #[test]
    fn test_context_format() {
        let block = assemble_context(vec![record("a", "alpha"), record("b", "beta")], 8000);

        assert_eq!(block.text, "[Source: a]\nalpha\n\n---\n\n[Source: b]\nbeta");
        assert_eq!(block.sources.len(), 2);
        assert!(!block.truncated);
    }

    #[test]
    fn test_context_uses_source_metadata() {
        let r = record("chunk-7", "text").with_metadata("source", "manual.pdf");
        let block = assemble_context(vec![r], 8000);
        assert!(block.text.starts_with("[Source: manual.pdf]\n"));
    }

    #[test]
    fn test_context_budget_truncates_and_stops() {
        // "[Source: a]\n" is 12 chars, leaving 8 for the body
        let block = assemble_context(
            vec![record("a", "0123456789abcdef"), record("b", "never")],
            20,
        );

        assert_eq!(block.text, "[Source: a]\n01234567");
        assert_eq!(block.text.chars().count(), 20);
        assert_eq!(block.sources.len(), 1);
        assert!(block.truncated);
    }

    #[test]
    fn test_context_budget_skips_entry_without_room() {
        let first = "[Source: a]\nalpha".chars().count();
        let block = assemble_context(
            vec![record("a", "alpha"), record("b", "beta")],
            first + CONTEXT_DELIMITER.len() + 3,
        );

        assert_eq!(block.sources.len(), 1);
        assert_eq!(block.text, "[Source: a]\nalpha");
    }

    #[test]
    fn test_context_truncates_on_char_boundary() {
        let block = assemble_context(vec![record("a", "héllo wörld")], 12 + 4);
        assert_eq!(block.text, "[Source: a]\nhéll");
    }

    #[test]
    fn test_empty_context() {
        let block = assemble_context(Vec::new(), 8000);
        assert!(block.is_empty());
        assert!(block.sources.is_empty());
    }

    #[test]
    fn test_prompt_builder_with_context() {
        let messages = PromptBuilder::new()
            .system(DEFAULT_SYSTEM_PROMPT)
            .context("[Source: a]\nalpha")
            .question("What is alpha?")
            .build();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(
            messages[1].content,
            "Context:\n[Source: a]\nalpha\n\nQuestion: What is alpha?\n\n\
             Please provide a comprehensive answer based on the context above."
        );
    }

    #[test]
    fn test_prompt_builder_without_context() {
        let messages = PromptBuilder::new().question("Hi?").build();

        assert_eq!(messages.len(), 1);
        assert!(!messages[0].content.contains("Context:"));
        assert!(messages[0].content.starts_with("Question: Hi?"));
    }
}
