//! Shared scaffolding every streaming direction embeds: the commit-point
//! tracker (§4.4 rule 4) and a doc-level description of `TransformState`'s
//! fields, each direction's concrete state struct (see
//! `claude_openai::stream::{OpenAiToClaudeStreamState, ClaudeToOpenAiStreamState}`,
//! `gemini_claude::stream::GeminiToClaudeStreamState`,
//! `kiro_claude::stream::KiroToClaudeStreamState`) carries the subset it
//! actually needs rather than one shared god-struct.

/// Whether the converter has emitted any byte downstream yet. The Executor
/// consults this to decide retryability on failure past this point (§4.4
/// rule 4, §4.6): once true, a failure is never retryable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitTracker {
    committed: bool,
}

impl CommitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self) {
        self.committed = true;
    }

    pub fn is_committed(self) -> bool {
        self.committed
    }
}

/// Conceptual shape of the per-attempt converter state described by the
/// design (input buffer, message id, current block type, block index
/// counter, tool-call accumulators, stop reason, usage) — see the per-module
/// `...StreamState` types for the concrete, direction-specific layouts this
/// takes in practice.
pub struct TransformState;
