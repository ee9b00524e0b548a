//! Serialized token refresh shared by all acquirers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use super::{AccessToken, AuthError, TokenProvider};

struct TokenState {
    current: Option<AccessToken>,
    generation: u64,
}

/// Hands out freshly refreshed tokens, one refresh in flight at a time.
///
/// A caller that queued behind a refresh which completed while it waited
/// reuses that token instead of issuing another refresh.
pub struct SharedToken {
    provider: Arc<dyn TokenProvider>,
    state: Mutex<TokenState>,
    generation: AtomicU64,
}

impl SharedToken {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            state: Mutex::new(TokenState {
                current: None,
                generation: 0,
            }),
            generation: AtomicU64::new(0),
        }
    }

    /// A token obtained no earlier than this call started.
    pub async fn fresh(&self) -> Result<AccessToken, AuthError> {
        let seen = self.generation.load(Ordering::Acquire);
        let mut state = self.state.lock().await;

        if state.generation != seen {
            if let Some(token) = &state.current {
                debug!(generation = state.generation, "Reusing token refreshed while waiting");
                return Ok(token.clone());
            }
        }

        let token = if state.current.is_none() {
            self.provider.token().await?
        } else {
            self.provider.refresh().await?
        };

        state.generation += 1;
        state.current = Some(token.clone());
        self.generation.store(state.generation, Ordering::Release);
        debug!(provider = self.provider.name(), generation = state.generation, "Token refreshed");
        Ok(token)
    }

    /// Number of completed issuances/refreshes.
    pub fn refresh_count(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}
