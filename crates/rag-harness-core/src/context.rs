//! Budget-bounded context assembly.
//!
//! Turns ranked chunk texts into the single context string handed to a
//! prompt template.
//!
//! # Algorithm
//!
//! ```text
//! total = 0
//! for text in ranked:
//!     t = trim(text)
//!     if t is empty: continue
//!     if total >= max_chars: stop
//!     admit t; total += chars(t)
//! join admitted with "\n\n"
//! ```
//!
//! The running total counts chunk characters only, never the separators.
//! Chunks are admitted whole, so the last admitted chunk may carry the
//! result past `max_chars`.

/// Separator placed between admitted chunks.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Join ranked chunk texts into one context string bounded by `max_chars`.
///
/// The result can exceed `max_chars` by up to one whole chunk: with the
/// default 800-char chunks and 1500-char budget, two full chunks come back.
pub fn assemble_context<S: AsRef<str>>(texts: &[S], max_chars: usize) -> String {
    let mut admitted: Vec<&str> = Vec::new();
    let mut total = 0usize;

    for text in texts {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if total >= max_chars {
            break;
        }
        total += trimmed.chars().count();
        admitted.push(trimmed);
    }

    admitted.join(CONTEXT_SEPARATOR)
}
