use bytes::Bytes;
use futures::StreamExt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{Instrument, Span, debug, error, info, warn};

use crate::cache::{MAX_HISTORY, clean_generated_html};
use crate::error::BackendError;
use crate::llm::TokenStream;
use crate::metrics::{
    CACHE_SKIPPED, CACHE_WRITE_FAILURES, CACHE_WRITES, GENERATIONS_COMPLETED, GENERATIONS_FAILED,
    REQUEST_LATENCY,
};
use crate::store::PageStore;

// Chunk handed to the response body
pub type BodyChunk = Result<Bytes, io::Error>;

// One accepted generation, ready to be driven in the background
pub struct GenerationJob {
    pub tokens: TokenStream,
    pub cache_key: Option<String>,
    pub store: Arc<dyn PageStore>,
    pub started: Instant,
    pub max_duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    Stored,
    NotCached,
    CacheWriteFailed,
    Failed,
    TimedOut,
}

// Start driving the stream; the receiver feeds the response body
pub fn spawn_generation(job: GenerationJob) -> mpsc::Receiver<BodyChunk> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(run_generation(job, tx).instrument(Span::current()));
    rx
}

pub async fn run_generation(job: GenerationJob, tx: mpsc::Sender<BodyChunk>) -> GenerationOutcome {
    let GenerationJob {
        mut tokens,
        cache_key,
        store,
        started,
        max_duration,
    } = job;

    let mut text = String::new();
    let mut client_gone = false;
    let budget = max_duration.saturating_sub(started.elapsed());

    // keep reading after a disconnect so the finished page still gets cached
    let streamed = tokio::time::timeout(budget, async {
        while let Some(item) = tokens.next().await {
            let delta = item?;
            text.push_str(&delta);
            if !client_gone && tx.send(Ok(Bytes::from(delta))).await.is_err() {
                client_gone = true;
                debug!("client disconnected, finishing generation anyway");
            }
        }
        Ok::<(), BackendError>(())
    })
    .await;

    let outcome = match streamed {
        Err(_) => {
            GENERATIONS_FAILED.inc();
            warn!(
                limit_secs = max_duration.as_secs(),
                received_chars = text.len(),
                "generation hit the execution limit, nothing cached"
            );
            let _ = tx
                .send(Err(io::Error::new(io::ErrorKind::TimedOut, "generation timed out")))
                .await;
            GenerationOutcome::TimedOut
        }
        Ok(Err(e)) => {
            GENERATIONS_FAILED.inc();
            error!(error = %e, received_chars = text.len(), "model stream failed, nothing cached");
            let _ = tx.send(Err(io::Error::other(e.to_string()))).await;
            GenerationOutcome::Failed
        }
        Ok(Ok(())) => {
            // close the body before touching the store
            drop(tx);
            GENERATIONS_COMPLETED.inc();
            info!(chars = text.len(), "generation complete");
            finish_generation(store.as_ref(), cache_key.as_deref(), &text).await
        }
    };

    REQUEST_LATENCY.observe(started.elapsed().as_secs_f64());
    info!(duration_ms = started.elapsed().as_millis() as u64, ?outcome, "request finished");
    outcome
}

/// Clean the finished text and push it onto the history for `cache_key`.
///
/// Store failures are logged and swallowed.
pub async fn finish_generation(
    store: &dyn PageStore,
    cache_key: Option<&str>,
    text: &str,
) -> GenerationOutcome {
    let cleaned = clean_generated_html(text);

    let Some(key) = cache_key else {
        CACHE_SKIPPED.inc();
        info!("url or year missing, skipping cache write");
        return GenerationOutcome::NotCached;
    };

    match store.push_capped(key, &cleaned, MAX_HISTORY).await {
        Ok(()) => {
            CACHE_WRITES.inc();
            info!(cache_key = key, "cached generated page");
            GenerationOutcome::Stored
        }
        Err(e) => {
            CACHE_WRITE_FAILURES.inc();
            error!(cache_key = key, error = %e, "failed to cache generated page");
            GenerationOutcome::CacheWriteFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use futures::stream;

    fn tokens(parts: Vec<Result<&'static str, BackendError>>) -> TokenStream {
        Box::pin(stream::iter(
            parts.into_iter().map(|p| p.map(|s| s.to_string())),
        ))
    }

    fn job(tokens: TokenStream, key: Option<&str>, store: Arc<dyn PageStore>) -> GenerationJob {
        GenerationJob {
            tokens,
            cache_key: key.map(str::to_string),
            store,
            started: Instant::now(),
            max_duration: Duration::from_secs(5),
        }
    }

    async fn drain(mut rx: mpsc::Receiver<BodyChunk>) -> (String, bool) {
        let mut body = String::new();
        let mut errored = false;
        while let Some(chunk) = rx.recv().await {
            match chunk {
                Ok(bytes) => body.push_str(std::str::from_utf8(&bytes).unwrap()),
                Err(_) => errored = true,
            }
        }
        (body, errored)
    }

    struct BrokenStore;

    #[async_trait]
    impl PageStore for BrokenStore {
        async fn push_capped(&self, _: &str, _: &str, _: usize) -> Result<(), StoreError> {
            Err(StoreError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            ))))
        }

        async fn history(&self, _: &str) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn streams_raw_text_and_caches_cleaned_page() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = mpsc::channel(16);
        let parts = vec![Ok("```html\n"), Ok("<!-- TITLE: X -->\n"), Ok("<div>hi</div>\n```")];

        let job = job(tokens(parts), Some("ie:cache:x:1995"), store.clone());
        let outcome = run_generation(job, tx).await;
        let (body, errored) = drain(rx).await;

        assert_eq!(outcome, GenerationOutcome::Stored);
        assert!(!errored);
        assert_eq!(body, "```html\n<!-- TITLE: X -->\n<div>hi</div>\n```");
        assert_eq!(
            store.history("ie:cache:x:1995").await.unwrap(),
            vec!["<!-- TITLE: X -->\n<div>hi</div>"]
        );
    }

    #[tokio::test]
    async fn disconnected_client_still_gets_cached() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let parts = vec![Ok("<p>a</p>"), Ok("<p>b</p>")];
        let outcome = run_generation(job(tokens(parts), Some("k"), store.clone()), tx).await;

        assert_eq!(outcome, GenerationOutcome::Stored);
        assert_eq!(store.history("k").await.unwrap(), vec!["<p>a</p><p>b</p>"]);
    }

    #[tokio::test]
    async fn upstream_failure_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = mpsc::channel(16);
        let parts = vec![Ok("<div>"), Err(BackendError::Network("reset".into()))];

        let outcome = run_generation(job(tokens(parts), Some("k"), store.clone()), tx).await;
        let (body, errored) = drain(rx).await;

        assert_eq!(outcome, GenerationOutcome::Failed);
        assert_eq!(body, "<div>");
        assert!(errored);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn execution_limit_aborts_without_caching() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = mpsc::channel(16);
        let never = stream::pending::<Result<String, BackendError>>();
        let mut job = job(Box::pin(never), Some("k"), store.clone());
        job.max_duration = Duration::from_millis(20);

        let outcome = run_generation(job, tx).await;
        let (_, errored) = drain(rx).await;

        assert_eq!(outcome, GenerationOutcome::TimedOut);
        assert!(errored);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn missing_key_skips_the_store() {
        let store = Arc::new(MemoryStore::new());
        let outcome = finish_generation(store.as_ref(), None, "<div>x</div>").await;

        assert_eq!(outcome, GenerationOutcome::NotCached);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_contained() {
        let (tx, rx) = mpsc::channel(16);
        let parts = vec![Ok("<div>ok</div>")];
        let outcome = run_generation(job(tokens(parts), Some("k"), Arc::new(BrokenStore)), tx).await;
        let (body, errored) = drain(rx).await;

        assert_eq!(outcome, GenerationOutcome::CacheWriteFailed);
        assert_eq!(body, "<div>ok</div>");
        assert!(!errored);
    }
}
