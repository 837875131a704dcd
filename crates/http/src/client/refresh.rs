//! Single-flight access token refresh
//!
//! Concurrent 401s share one refresh call. The slot holds the in-flight
//! future until it resolves; whoever arrives meanwhile awaits the same
//! outcome.

use futures::FutureExt;
use futures::future::Shared;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::error::ClientError;

pub(crate) type RefreshOutcome = Result<String, Arc<ClientError>>;

#[cfg(not(target_arch = "wasm32"))]
type RefreshFuture = futures::future::BoxFuture<'static, RefreshOutcome>;
#[cfg(target_arch = "wasm32")]
type RefreshFuture = futures::future::LocalBoxFuture<'static, RefreshOutcome>;

#[derive(Default)]
pub(crate) struct RefreshSlot {
    inflight: Mutex<Option<Shared<RefreshFuture>>>,
}

impl RefreshSlot {
    fn lock(&self) -> MutexGuard<'_, Option<Shared<RefreshFuture>>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the in-flight refresh, or start `start()` if there is none.
    pub(crate) fn join_or_start<F, Fut>(&self, start: F) -> Shared<RefreshFuture>
    where
        F: FnOnce() -> Fut,
        Fut: RefreshTask,
    {
        let mut slot = self.lock();
        if let Some(inflight) = slot.as_ref() {
            tracing::debug!("Joining in-flight token refresh");
            return inflight.clone();
        }

        let shared = start().boxed_refresh().shared();
        *slot = Some(shared.clone());
        shared
    }

    /// Drop the finished refresh so the next 401 starts a new one
    pub(crate) fn clear(&self) {
        self.lock().take();
    }

    #[cfg(test)]
    pub(crate) fn is_idle(&self) -> bool {
        self.lock().is_none()
    }
}

/// Future that produces a refresh outcome and can be boxed for sharing
pub(crate) trait RefreshTask: Future<Output = RefreshOutcome> + 'static {
    fn boxed_refresh(self) -> RefreshFuture;
}

#[cfg(not(target_arch = "wasm32"))]
impl<T> RefreshTask for T
where
    T: Future<Output = RefreshOutcome> + Send + 'static,
{
    fn boxed_refresh(self) -> RefreshFuture {
        self.boxed()
    }
}

#[cfg(target_arch = "wasm32")]
impl<T> RefreshTask for T
where
    T: Future<Output = RefreshOutcome> + 'static,
{
    fn boxed_refresh(self) -> RefreshFuture {
        self.boxed_local()
    }
}
