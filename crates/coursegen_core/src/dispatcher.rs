//! crates/coursegen_core/src/dispatcher.rs
//!
//! Round-robin failover across generation backends, one backend per API key.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::ports::{PortError, TextGenerationService};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No generation API keys configured")]
    NoCredentials,
    #[error("Invalid prompt for generation")]
    EmptyPrompt,
    #[error("All generation API keys are exhausted after {attempts} attempt(s). Please try again later.")]
    Exhausted {
        attempts: usize,
        #[source]
        source: PortError,
    },
}

/// Tries every backend once per call, starting one slot further along than
/// the previous call.
pub struct KeyRotationDispatcher {
    backends: Vec<Arc<dyn TextGenerationService>>,
    cursor: AtomicUsize,
}

impl KeyRotationDispatcher {
    pub fn new(backends: Vec<Arc<dyn TextGenerationService>>) -> Self {
        Self::with_cursor(backends, 0)
    }

    /// Creates a dispatcher whose first call starts at slot `start`.
    pub fn with_cursor(backends: Vec<Arc<dyn TextGenerationService>>, start: usize) -> Self {
        Self {
            backends,
            cursor: AtomicUsize::new(start),
        }
    }

    pub fn credential_count(&self) -> usize {
        self.backends.len()
    }

    /// Returns the first non-blank reply.
    ///
    /// The cursor moves once per call, not per attempt. Concurrent calls may
    /// interleave their increments, which only changes which slot goes first.
    pub async fn dispatch(&self, prompt_parts: &[String]) -> Result<String, DispatchError> {
        if prompt_parts.is_empty() {
            return Err(DispatchError::EmptyPrompt);
        }
        let count = self.backends.len();
        if count == 0 {
            return Err(DispatchError::NoCredentials);
        }

        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % count;
        let mut last_err = PortError::Unexpected("no attempt made".to_string());

        for attempt in 0..count {
            let slot = (start + attempt) % count;
            match self.backends[slot].generate(prompt_parts).await {
                Ok(text) if !text.trim().is_empty() => {
                    if attempt > 0 {
                        warn!(
                            "Generation succeeded using key #{} after {} failover(s)",
                            slot + 1,
                            attempt
                        );
                    } else {
                        debug!("Generation succeeded using key #{}", slot + 1);
                    }
                    return Ok(text);
                }
                Ok(_) => {
                    warn!("Key #{} returned an empty response, trying the next key", slot + 1);
                    last_err = PortError::Unexpected("Empty response from generation backend".to_string());
                }
                Err(e) => {
                    warn!("Key #{} failed to generate, trying the next key: {}", slot + 1, e);
                    last_err = e;
                }
            }
        }

        error!("All generation keys failed. Last error: {}", last_err);
        Err(DispatchError::Exhausted {
            attempts: count,
            source: last_err,
        })
    }
}
