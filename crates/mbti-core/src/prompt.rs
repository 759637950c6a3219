//! Prompt assembly for a single persona turn.

use std::fmt::Write as _;

use mbti_memory::RetrievedChunk;

use crate::persona::Mbti;
use crate::session::Exchange;

/// Rendered in place of reference material when retrieval found nothing.
pub const NO_CONTEXT_MARKER: &str = "(no relevant reference data)";

const NO_HISTORY_MARKER: &str = "(no previous conversation)";

const HISTORY_HEADER: &str = "[Previous conversation]\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub text: String,
    /// Oldest exchanges left out to respect the character limit.
    pub dropped_history: usize,
}

#[derive(Debug, Clone)]
pub struct PromptComposer {
    max_chars: usize,
}

impl PromptComposer {
    #[must_use]
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    #[must_use]
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Build the prompt for `query`.
    ///
    /// Sections appear in a fixed order: persona, reference material, history,
    /// question, instructions, answer cue. If the result exceeds the character limit
    /// the oldest exchanges are dropped one at a time; reference material and the
    /// query are never cut, so the prompt may still exceed the limit once history
    /// is exhausted. The no-history marker only stands in for a session that never
    /// had any exchanges.
    #[must_use]
    pub fn compose(
        &self,
        code: Mbti,
        description: &str,
        history: &[Exchange],
        chunks: &[RetrievedChunk],
        query: &str,
    ) -> ComposedPrompt {
        let head = render_head(code, description, chunks);
        let tail = render_tail(code, query);
        let exchanges: Vec<String> = history.iter().map(|e| render_exchange(code, e)).collect();

        // Header plus the blank line closing the history section.
        let fixed = head.chars().count() + HISTORY_HEADER.len() + 1 + tail.chars().count();
        let mut history_chars: usize = exchanges.iter().map(|e| e.chars().count()).sum();
        let mut dropped = 0;
        while dropped < exchanges.len() && fixed + history_chars > self.max_chars {
            history_chars -= exchanges[dropped].chars().count();
            dropped += 1;
        }

        let mut text = head;
        text.push_str(HISTORY_HEADER);
        if exchanges.is_empty() {
            text.push_str(NO_HISTORY_MARKER);
            text.push('\n');
        } else {
            // Fully dropped history leaves the section empty.
            for exchange in &exchanges[dropped..] {
                text.push_str(exchange);
            }
        }
        text.push('\n');
        text.push_str(&tail);

        let total = text.chars().count();
        if total > self.max_chars {
            tracing::warn!(
                persona = %code,
                dropped,
                chars = total,
                max_chars = self.max_chars,
                "prompt over limit even without history"
            );
        } else if dropped > 0 {
            tracing::warn!(
                persona = %code,
                dropped,
                kept = exchanges.len() - dropped,
                max_chars = self.max_chars,
                "prompt over limit, dropped oldest history"
            );
        }

        ComposedPrompt {
            text,
            dropped_history: dropped,
        }
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new(12_000)
    }
}

fn render_head(code: Mbti, description: &str, chunks: &[RetrievedChunk]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "You are a person with the {code} personality type.");
    let _ = writeln!(out, "Traits of {code}: {description}");
    out.push('\n');
    let _ = writeln!(out, "[Reference material about {code}]");
    if chunks.is_empty() {
        out.push_str(NO_CONTEXT_MARKER);
    } else {
        let joined = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        out.push_str(&joined);
    }
    out.push_str("\n\n");
    out
}

fn render_exchange(code: Mbti, exchange: &Exchange) -> String {
    format!("User: {}\n{code}: {}\n", exchange.user, exchange.assistant)
}

fn render_tail(code: Mbti, query: &str) -> String {
    format!(
        "[Current question]\n\
         {query}\n\
         \n\
         [Instructions]\n\
         - Answer as an {code} would, drawing on the traits, the reference material and the previous conversation.\n\
         - Keep a natural, friendly tone, as in a chat between friends.\n\
         - Keep the answer short and light.\n\
         - The user is not an {code}; do not assume they think the way you do.\n\
         - For abstract questions, answer in the direction an {code} would prefer.\n\
         - Build on the previous conversation whenever it is relevant.\n\
         \n\
         {code}:"
    )
}
