use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Caller identity shared by clones.
///
/// Invalidating one clone invalidates all of them, so a `401` seen by any
/// request ends the session everywhere.
#[derive(Clone)]
pub struct Session {
    token: Arc<RwLock<Option<String>>>,
}

impl Session {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(Some(token.into()))),
        }
    }

    /// The bearer token, or `None` once the session was invalidated.
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn is_active(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub async fn invalidate(&self) {
        if self.token.write().await.take().is_some() {
            tracing::debug!("Session invalidated");
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}
