//! Host interpreter memoizing immutable lookups.
//!
//! Job specs are read from a commit, so the answer for a given sha never
//! changes. [`CachingHost`] serves repeated `FetchJobSpecs` from a [`Cache`]
//! and forwards everything else.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use super::{Cache, CacheError, Storage};
use crate::effects::{EffectError, HostEffect, HostInterpreter, HostResponse};

pub struct CachingHost<H, S> {
    inner: H,
    cache: Mutex<Cache<S>>,
}

impl<H, S: Storage> CachingHost<H, S> {
    pub fn new(inner: H, cache: Cache<S>) -> Self {
        CachingHost {
            inner,
            cache: Mutex::new(cache),
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Drops entries not revalidated recently.
    pub fn purge(&self) -> Result<usize, CacheError> {
        self.lock().purge()
    }

    fn lock(&self) -> MutexGuard<'_, Cache<S>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn cache_key(effect: &HostEffect) -> Option<String> {
    match effect {
        HostEffect::FetchJobSpecs { sha } => Some(format!("job-specs:{}", sha)),
        _ => None,
    }
}

impl<H, S> HostInterpreter for CachingHost<H, S>
where
    H: HostInterpreter + Sync,
    S: Storage + Send,
{
    type Error = EffectError;

    fn interpret(
        &self,
        effect: HostEffect,
    ) -> impl Future<Output = Result<HostResponse, Self::Error>> + Send {
        async move {
            let key = cache_key(&effect);
            if let Some(key) = &key {
                let hit = self.lock().get(key);
                if let Some(value) = hit {
                    match serde_json::from_value::<HostResponse>(value) {
                        Ok(response) => return Ok(response),
                        Err(e) => warn!(key, error = %e, "Ignoring malformed cache entry"),
                    }
                }
            }

            let response = self.inner.interpret(effect).await.map_err(Into::into)?;

            if let Some(key) = key {
                match serde_json::to_value(&response) {
                    Ok(value) => {
                        self.lock().set(&key, value);
                    }
                    Err(e) => warn!(key, error = %e, "Failed to cache response"),
                }
            }
            Ok(response)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::effects::{HostState, RecordingHost};
    use crate::types::{JobSpec, Sha};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn caching(state: HostState) -> CachingHost<RecordingHost, crate::cache::MemoryStorage> {
        CachingHost::new(
            RecordingHost::new(state),
            MemoryCache::in_memory(Duration::from_secs(600)),
        )
    }

    #[tokio::test]
    async fn job_specs_are_fetched_once_per_sha() {
        let specs = BTreeMap::from([("app".to_string(), JobSpec::new("app"))]);
        let host = caching(HostState {
            job_specs: Some(specs.clone()),
            ..HostState::default()
        });
        let effect = HostEffect::FetchJobSpecs { sha: Sha::new("d0d0") };

        let first = host.interpret(effect.clone()).await.unwrap();
        let second = host.interpret(effect).await.unwrap();

        assert_eq!(first, HostResponse::JobSpecs(specs));
        assert_eq!(second, first);
        assert_eq!(host.inner().effects().len(), 1);
    }

    #[tokio::test]
    async fn other_effects_are_forwarded() {
        let host = caching(HostState::default());
        let effect = HostEffect::FetchStatuses { sha: Sha::new("d0d0") };

        host.interpret(effect.clone()).await.unwrap();
        host.interpret(effect).await.unwrap();

        assert_eq!(host.inner().effects().len(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let host = caching(HostState::default());
        let effect = HostEffect::FetchJobSpecs { sha: Sha::new("d0d0") };

        assert!(host.interpret(effect.clone()).await.unwrap_err().is_not_found());
        assert!(host.interpret(effect).await.is_err());
        assert_eq!(host.inner().effects().len(), 2);
    }
}
