//! Evaluation core: scores one resume against one job description, wraps
//! the result in a uniform [`MatchOutcome`], and fans a folder of resumes
//! out under a bounded concurrency cap.
//!
//! Every evaluation yields exactly one outcome; transport failures and
//! unrecoverable parses ride in the outcome's `result` instead of being
//! dropped. All persistence side effects are delegated to the
//! [`PersistenceSink`](crate::sink::PersistenceSink) seam so the core
//! stays pure and testable.

pub mod prompts;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::MatchError;
use crate::extract::extract_text;
use crate::llm::{LlmError, LlmProvider};
use crate::repair::{repair, RepairOutcome};
use crate::sink::PersistenceSink;

/// Per-resume evaluation record.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub filename: String,
    /// Caller-supplied correlation id, if any (batch uploads tag each
    /// resume with one).
    pub correlation_id: Option<Uuid>,
    pub evaluated_at: DateTime<Utc>,
    pub result: Result<Value, MatchError>,
}

impl MatchOutcome {
    pub fn document(&self) -> Option<&Value> {
        self.result.as_ref().ok()
    }
}

/// Wraps an upstream transport failure into an outcome. The repair
/// pipeline is never consulted for these.
pub fn outcome_from_transport_failure(
    filename: impl Into<String>,
    correlation_id: Option<Uuid>,
    err: &LlmError,
) -> MatchOutcome {
    MatchOutcome {
        filename: filename.into(),
        correlation_id,
        evaluated_at: Utc::now(),
        result: Err(MatchError::LlmCallFailed(err.to_string())),
    }
}

/// Wraps a repair attempt into an outcome.
pub fn outcome_from_repair(
    filename: impl Into<String>,
    correlation_id: Option<Uuid>,
    repaired: RepairOutcome,
) -> MatchOutcome {
    let result = match repaired {
        RepairOutcome::Parsed(document) => Ok(document),
        RepairOutcome::Unrecoverable {
            diagnostic,
            truncated_raw,
        } => Err(MatchError::JsonRepairFailed {
            diagnostic,
            truncated_raw,
        }),
    };
    MatchOutcome {
        filename: filename.into(),
        correlation_id,
        evaluated_at: Utc::now(),
        result,
    }
}

/// Evaluates one resume against one job description.
///
/// Errors only when the resume file itself cannot be read; once the LLM is
/// in play, every failure mode is folded into the returned outcome.
pub async fn evaluate_one(
    jd_text: &str,
    resume_path: &Path,
    correlation_id: Option<Uuid>,
    llm: &dyn LlmProvider,
) -> Result<MatchOutcome> {
    let filename = resume_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let resume_text = extract_text(resume_path)?;
    let prompt = prompts::build_user_prompt(jd_text, &resume_text);

    let outcome = match llm.complete(&prompt).await {
        Ok(raw) => outcome_from_repair(filename, correlation_id, repair(&raw)),
        Err(err) => outcome_from_transport_failure(filename, correlation_id, &err),
    };
    Ok(outcome)
}

/// Applies the sink side effects an outcome calls for: insert and clear
/// the failure record on success, upsert the failure record when repair
/// was exhausted, nothing for a transport failure.
pub async fn persist_outcome(sink: &dyn PersistenceSink, outcome: &MatchOutcome) -> Result<()> {
    match &outcome.result {
        Ok(document) => {
            sink.insert_success(outcome, document).await?;
            sink.clear_failure(&outcome.filename).await?;
        }
        Err(MatchError::JsonRepairFailed {
            diagnostic,
            truncated_raw,
        }) => {
            sink.upsert_failure(&outcome.filename, diagnostic, truncated_raw)
                .await?;
        }
        Err(MatchError::LlmCallFailed(_)) => {}
    }
    Ok(())
}

/// Evaluates and persists one resume. A sink failure is logged and does
/// not destroy the computed outcome.
pub async fn evaluate_and_persist(
    jd_text: &str,
    resume_path: &Path,
    correlation_id: Option<Uuid>,
    llm: &dyn LlmProvider,
    sink: &dyn PersistenceSink,
) -> Result<MatchOutcome> {
    let outcome = evaluate_one(jd_text, resume_path, correlation_id, llm).await?;
    match &outcome.result {
        Ok(_) => info!(filename = %outcome.filename, "scored resume"),
        Err(err) => warn!(filename = %outcome.filename, "evaluation failed: {err}"),
    }
    if let Err(err) = persist_outcome(sink, &outcome).await {
        error!(filename = %outcome.filename, "persistence failed: {err:#}");
    }
    Ok(outcome)
}

/// Scores every regular file in `resume_dir` against the job description
/// at `jd_path`, at most `max_concurrency` evaluations in flight at once.
/// Outcome order is not significant.
pub async fn evaluate_batch(
    jd_path: &Path,
    resume_dir: &Path,
    llm: Arc<dyn LlmProvider>,
    sink: Arc<dyn PersistenceSink>,
    max_concurrency: usize,
) -> Result<Vec<MatchOutcome>> {
    let jd_text = Arc::new(
        extract_text(jd_path)
            .with_context(|| format!("failed to read job description {}", jd_path.display()))?,
    );
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();

    let entries = std::fs::read_dir(resume_dir)
        .with_context(|| format!("failed to read resume folder {}", resume_dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let jd_text = Arc::clone(&jd_text);
        let llm = Arc::clone(&llm);
        let sink = Arc::clone(&sink);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| anyhow!("concurrency semaphore closed"))?;
            evaluate_and_persist(&jd_text, &path, None, llm.as_ref(), sink.as_ref()).await
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined.context("evaluation task panicked")? {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => error!("skipping unreadable resume: {err:#}"),
        }
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::tests::RecordingSink;
    use async_trait::async_trait;
    use serde_json::json;
    use std::fs;

    struct FakeLlm {
        reply: Option<String>,
    }

    impl FakeLlm {
        fn replies_with(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
            }
        }

        fn fails() -> Self {
            Self { reply: None }
        }
    }

    #[async_trait]
    impl LlmProvider for FakeLlm {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => Err(LlmError::Api {
                    status: 503,
                    message: "upstream down".to_string(),
                }),
            }
        }
    }

    fn write_resume(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, "Ten years of Rust and Postgres.").unwrap();
        path
    }

    #[test]
    fn test_envelope_from_repair_success() {
        let outcome = outcome_from_repair(
            "a.txt",
            None,
            RepairOutcome::Parsed(json!({"score": {"value": 80}})),
        );
        assert_eq!(outcome.filename, "a.txt");
        assert_eq!(outcome.document().unwrap()["score"]["value"], json!(80));
    }

    #[test]
    fn test_envelope_from_repair_failure() {
        let outcome = outcome_from_repair(
            "a.txt",
            Some(Uuid::nil()),
            RepairOutcome::Unrecoverable {
                diagnostic: "expected value".to_string(),
                truncated_raw: "{{".to_string(),
            },
        );
        assert_eq!(outcome.correlation_id, Some(Uuid::nil()));
        assert!(matches!(
            outcome.result,
            Err(MatchError::JsonRepairFailed { .. })
        ));
    }

    #[test]
    fn test_envelope_from_transport_failure() {
        let outcome = outcome_from_transport_failure("a.txt", None, &LlmError::EmptyContent);
        match outcome.result {
            Err(MatchError::LlmCallFailed(message)) => {
                assert!(message.contains("empty content"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_never_touches_the_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_resume(&dir, "a.txt");
        let llm = FakeLlm::fails();
        let sink = RecordingSink::default();

        let outcome = evaluate_and_persist("jd", &path, None, &llm, &sink)
            .await
            .unwrap();

        assert!(matches!(outcome.result, Err(MatchError::LlmCallFailed(_))));
        assert!(sink.inserted().is_empty());
        assert!(sink.failures().is_empty());
        assert!(sink.cleared().is_empty());
    }

    #[tokio::test]
    async fn test_repairable_reply_is_inserted_and_failure_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_resume(&dir, "a.txt");
        let llm = FakeLlm::replies_with("```json\n{\"score\": 87\", \"name\": \"A B\",}\n```");
        let sink = RecordingSink::default();

        let outcome = evaluate_and_persist("jd", &path, None, &llm, &sink)
            .await
            .unwrap();

        assert_eq!(
            outcome.document().unwrap(),
            &json!({"score": 87, "name": "A B"})
        );
        assert_eq!(sink.inserted(), vec!["a.txt".to_string()]);
        assert_eq!(sink.cleared(), vec!["a.txt".to_string()]);
        assert!(sink.failures().is_empty());
    }

    #[tokio::test]
    async fn test_unrecoverable_reply_upserts_failure_and_counts_retries() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_resume(&dir, "a.txt");
        let llm = FakeLlm::replies_with("the candidate looks great, trust me");
        let sink = RecordingSink::default();

        for _ in 0..2 {
            let outcome = evaluate_and_persist("jd", &path, None, &llm, &sink)
                .await
                .unwrap();
            assert!(matches!(
                outcome.result,
                Err(MatchError::JsonRepairFailed { .. })
            ));
        }

        assert!(sink.inserted().is_empty());
        let failures = sink.failures();
        let (diagnostic, retry_count) = failures.get("a.txt").unwrap();
        assert!(!diagnostic.is_empty());
        assert_eq!(*retry_count, 2);
    }

    #[tokio::test]
    async fn test_batch_produces_one_outcome_per_resume() {
        let dir = tempfile::tempdir().unwrap();
        write_resume(&dir, "a.txt");
        write_resume(&dir, "b.txt");
        let jd_path = dir.path().join("jd.txt");
        fs::write(&jd_path, "needs Rust").unwrap();

        let llm: Arc<dyn LlmProvider> =
            Arc::new(FakeLlm::replies_with("{\"score\": {\"value\": 50}}"));
        let sink = Arc::new(RecordingSink::default());

        let outcomes = evaluate_batch(
            &jd_path,
            dir.path(),
            llm,
            Arc::clone(&sink) as Arc<dyn PersistenceSink>,
            1,
        )
        .await
        .unwrap();

        // jd.txt sits in the same folder and is scored too, matching the
        // original folder-glob behavior
        assert_eq!(outcomes.len(), 3);
        assert_eq!(sink.inserted().len(), 3);
    }
}
