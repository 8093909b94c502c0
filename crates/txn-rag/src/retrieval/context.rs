//! Bounded context assembly
//!
//! Rebuilds the context text for a question from its neighbours, nearest
//! first, joined by newlines. The budget is counted in characters and covers
//! the separators. The nearest record is always present (cut to the budget if
//! it alone is too long); every further record is either included whole or,
//! together with all farther records, left out.

use serde::Serialize;

use super::Corpus;
use crate::embeddings::shared::truncate_chars;
use crate::index::Neighbor;

/// Separator between record texts in the context
pub const CONTEXT_SEPARATOR: &str = "\n";

/// Context handed to the prompt builder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssembledContext {
    pub text: String,
    /// Number of records contributing to `text`
    pub records_used: usize,
    /// Whether anything retrieved was cut or dropped
    pub truncated: bool,
}

/// Builds context strings under a character budget
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_chars: usize,
}

impl ContextAssembler {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Assemble the context for `neighbors`, which must already be in
    /// retrieval order
    pub fn assemble(&self, corpus: &Corpus, neighbors: &[Neighbor]) -> AssembledContext {
        let mut texts = neighbors.iter().filter_map(|n| {
            let text = corpus.text(n.position);
            if text.is_none() {
                tracing::warn!("Neighbor position {} is outside the corpus", n.position);
            }
            text
        });

        let Some(nearest) = texts.next() else {
            return AssembledContext::default();
        };

        let separator_chars = CONTEXT_SEPARATOR.chars().count();
        let head = truncate_chars(nearest, self.max_chars);

        let mut context = AssembledContext {
            text: head.to_string(),
            records_used: 1,
            truncated: head.len() < nearest.len(),
        };
        let mut used = head.chars().count();

        for text in texts {
            let cost = separator_chars + text.chars().count();
            if used + cost > self.max_chars {
                context.truncated = true;
                break;
            }
            context.text.push_str(CONTEXT_SEPARATOR);
            context.text.push_str(text);
            context.records_used += 1;
            used += cost;
        }

        if context.truncated {
            tracing::debug!(
                "Context limited to {} of {} records ({} chars)",
                context.records_used,
                neighbors.len(),
                used
            );
        }

        context
    }
}
