mod config;
mod errors;
mod extract;
mod llm;
mod matching;
mod repair;
mod retry;
mod sink;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm::{GroqClient, LlmProvider};
use crate::matching::{evaluate_batch, prompts};
use crate::retry::RetrySweep;
use crate::sink::{create_pool, PersistenceSink, PgSink};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume matcher v{}", env!("CARGO_PKG_VERSION"));

    let pool = create_pool(&config.database_url).await?;
    let pg_sink = PgSink::new(pool);
    pg_sink.init_schema().await?;
    let sink: Arc<dyn PersistenceSink> = Arc::new(pg_sink);

    let llm: Arc<dyn LlmProvider> = Arc::new(GroqClient::new(
        config.groq_api_key.clone(),
        prompts::SYSTEM_PROMPT.to_string(),
    ));
    info!("LLM client initialized (model: {})", llm::MODEL);

    let outcomes = evaluate_batch(
        &config.jd_path,
        &config.resume_dir,
        Arc::clone(&llm),
        Arc::clone(&sink),
        config.max_concurrency,
    )
    .await?;

    let scored = outcomes.iter().filter(|o| o.document().is_some()).count();
    info!(
        "batch complete: {} scored, {} failed",
        scored,
        outcomes.len() - scored
    );

    if config.retry_sweep {
        let jd_text = extract::extract_text(&config.jd_path)?;
        let handle = retry::spawn(
            RetrySweep {
                interval: Duration::from_secs(config.retry_interval_secs),
                jd_text,
                resume_dir: config.resume_dir.clone(),
            },
            llm,
            sink,
        );
        info!(
            "retry sweep running every {}s, press Ctrl-C to stop",
            config.retry_interval_secs
        );
        tokio::signal::ctrl_c().await?;
        handle.shutdown().await;
        info!("retry sweep stopped");
    }

    Ok(())
}
