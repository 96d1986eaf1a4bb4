//! Threshold state storage
//!
//! The adaptive threshold lives behind a store abstraction so the gate and
//! the adjuster can be tested with an in-memory fake, while production
//! persists the value in Redis and survives restarts.

use crate::cache::{RedisCache, THRESHOLD_STATE_KEY};
use crate::models::ThresholdState;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait ThresholdStore: Send + Sync {
    async fn get(&self)
        -> Result<Option<ThresholdState>, Box<dyn std::error::Error + Send + Sync>>;

    /// Write `new` only when the stored threshold still matches
    /// `expected`. Returns false on a mismatch (a concurrent writer won).
    /// Writers are additionally serialized by the adjuster's single-flight
    /// guard; the compare step catches lost updates across processes.
    async fn compare_and_set(
        &self,
        expected: Option<f64>,
        new: ThresholdState,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

/// In-memory store for tests and cache-less deployments
#[derive(Default)]
pub struct InMemoryThresholdStore {
    state: RwLock<Option<ThresholdState>>,
}

impl InMemoryThresholdStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: ThresholdState) -> Self {
        Self {
            state: RwLock::new(Some(state)),
        }
    }
}

#[async_trait]
impl ThresholdStore for InMemoryThresholdStore {
    async fn get(
        &self,
    ) -> Result<Option<ThresholdState>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(*self.state.read().await)
    }

    async fn compare_and_set(
        &self,
        expected: Option<f64>,
        new: ThresholdState,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut state = self.state.write().await;
        let current = state.map(|s| s.current_threshold);
        if current != expected {
            return Ok(false);
        }
        *state = Some(new);
        Ok(true)
    }
}

/// Redis-backed store under the well-known `threshold:state` key
pub struct RedisThresholdStore {
    cache: Arc<RedisCache>,
}

impl RedisThresholdStore {
    pub fn new(cache: Arc<RedisCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl ThresholdStore for RedisThresholdStore {
    async fn get(
        &self,
    ) -> Result<Option<ThresholdState>, Box<dyn std::error::Error + Send + Sync>> {
        self.cache.get_json(THRESHOLD_STATE_KEY).await
    }

    async fn compare_and_set(
        &self,
        expected: Option<f64>,
        new: ThresholdState,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let current: Option<ThresholdState> = self.cache.get_json(THRESHOLD_STATE_KEY).await?;
        if current.map(|s| s.current_threshold) != expected {
            return Ok(false);
        }
        self.cache.set_json(THRESHOLD_STATE_KEY, &new, None).await?;
        Ok(true)
    }
}
