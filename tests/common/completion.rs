use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mockable::cache::CacheStore;
use mockable::error::{AppError, AppResult};
use mockable::services::{CompletionClient, CompletionError};

/// Completion client that replays scripted outputs and counts calls.
///
/// Once the script runs out, the last entry repeats.
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Option<Result<String, String>>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(String, String)>>,
    delay: Option<Duration>,
}

impl ScriptedCompletion {
    pub fn new<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(outputs.into_iter().map(|o| Ok(o.into())))
    }

    /// Always answer with `output`
    pub fn always(output: impl Into<String>) -> Self {
        Self::new([output.into()])
    }

    /// Always fail with a transport error
    pub fn failing() -> Self {
        Self::from_results([Err("connection refused".to_string())])
    }

    /// Answer with `output`, but only after `delay`
    pub fn slow(output: impl Into<String>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::always(output)
        }
    }

    pub fn from_results(results: impl IntoIterator<Item = Result<String, String>>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// (system, user) prompts received, in call order
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = {
            let mut script = self.script.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            match script.pop_front() {
                Some(entry) => {
                    *last = Some(entry.clone());
                    entry
                }
                None => last
                    .clone()
                    .unwrap_or_else(|| Err("script is empty".to_string())),
            }
        };

        next.map_err(CompletionError::Request)
    }
}

/// Cache backend that is always unavailable
pub struct FailingCacheStore;

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn get(&self, _key: &str) -> AppResult<Option<String>> {
        Err(AppError::Cache("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl_seconds: u64) -> AppResult<()> {
        Err(AppError::Cache("connection refused".to_string()))
    }
}
