use thiserror::Error;

/// Per-item error taxonomy for one (job description, resume) evaluation.
///
/// Both kinds are terminal for the item: a transport failure is never
/// retried inline, and a repair failure is only retried by the background
/// sweep, via the failure record the caller upserts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    /// The LLM client failed before any reply text existed. The repair
    /// pipeline is never invoked for these.
    #[error("LLM call failed: {0}")]
    LlmCallFailed(String),

    /// Every repair pass was exhausted. Carries the last parser error and
    /// a bounded excerpt of the cleaned reply for later inspection.
    #[error("JSON repair failed: {diagnostic}")]
    JsonRepairFailed {
        diagnostic: String,
        truncated_raw: String,
    },
}
