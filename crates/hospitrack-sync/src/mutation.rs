//! 变更原语
//!
//! `Mutation` 从不自动触发。多个变更重叠时，最后发起的那个决定最终状态，
//! 被取代的变更仍把自己的结果返回给调用方，但不会触发回调。

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hospitrack_core::Result;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::state::{FetchError, FetchState, Phase};

type SuccessCallback<T> = Box<dyn FnOnce(&T) + Send>;
type ErrorCallback = Box<dyn FnOnce(&FetchError) + Send>;

/// 变更回调，每次 `mutate` 至多触发一次，且在状态更新之后
pub struct MutationCallbacks<T> {
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
}

impl<T> Default for MutationCallbacks<T> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }
}

impl<T> MutationCallbacks<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, callback: impl FnOnce(&T) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl FnOnce(&FetchError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }
}

/// 变更
pub struct Mutation<T> {
    state: watch::Sender<FetchState<T>>,
    generation: AtomicU64,
}

impl<T> Default for Mutation<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mutation<T> {
    pub fn new() -> Self {
        let (state, _) = watch::channel(FetchState::idle());
        Self {
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> FetchState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.state.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().phase == Phase::Loading
    }

    /// 执行一次变更
    pub async fn mutate<F, Fut>(&self, call: F, callbacks: MutationCallbacks<T>) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let request_id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(FetchState::begin);
        debug!(request_id, "Mutation started");

        let result = call().await.map(Arc::new);

        let mut latest = false;
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != request_id {
                return false;
            }
            latest = true;
            match &result {
                Ok(data) => state.succeed(data.clone()),
                Err(e) => state.fail(FetchError::from(e)),
            }
            true
        });

        if !latest {
            debug!(request_id, "Mutation superseded, callbacks skipped");
            return result;
        }

        match &result {
            Ok(data) => {
                if let Some(callback) = callbacks.on_success {
                    callback(data);
                }
            }
            Err(e) => {
                warn!(request_id, error = %e, "Mutation failed");
                if let Some(callback) = callbacks.on_error {
                    callback(&FetchError::from(e));
                }
            }
        }

        result
    }

    /// 清除成功/错误标记
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_modify(|state| *state = FetchState::idle());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hospitrack_core::{ErrorKind, HospitalError};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_success_then_reset() {
        let mutation = Mutation::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let value = mutation
            .mutate(
                || async { Ok("saved") },
                MutationCallbacks::new().on_success(move |v: &&str| {
                    assert_eq!(*v, "saved");
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await
            .unwrap();

        assert_eq!(*value, "saved");
        assert!(mutation.state().is_success());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        mutation.reset();
        let state = mutation.state();
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_new_mutation_clears_success() {
        let mutation: Mutation<u32> = Mutation::new();
        mutation.mutate(|| async { Ok(1) }, MutationCallbacks::new()).await.unwrap();
        assert!(mutation.state().is_success());

        let mut rx = mutation.subscribe();
        let pending = mutation.mutate(
            || async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(2)
            },
            MutationCallbacks::new(),
        );
        tokio::pin!(pending);

        tokio::select! {
            _ = &mut pending => panic!("mutation finished before observing loading"),
            _ = rx.changed() => {}
        }
        assert_eq!(rx.borrow().phase, Phase::Loading);
        pending.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_issued_mutation_wins() {
        let mutation: Mutation<&'static str> = Mutation::new();
        let first_fired = Arc::new(AtomicUsize::new(0));
        let second_fired = Arc::new(AtomicUsize::new(0));

        let first = mutation.mutate(
            || async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok("first")
            },
            MutationCallbacks::new().on_success({
                let fired = first_fired.clone();
                move |_| {
                    fired.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );
        let second = mutation.mutate(
            || async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok("second")
            },
            MutationCallbacks::new().on_success({
                let fired = second_fired.clone();
                move |_| {
                    fired.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );

        let (first, second) = tokio::join!(first, second);
        assert_eq!(*first.unwrap(), "first");
        assert_eq!(*second.unwrap(), "second");

        assert_eq!(mutation.state().data(), Some(&"second"));
        assert_eq!(first_fired.load(Ordering::SeqCst), 0);
        assert_eq!(second_fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_callback_receives_message() {
        let mutation: Mutation<()> = Mutation::new();
        let (tx, rx) = std::sync::mpsc::channel();

        let result = mutation
            .mutate(
                || async { Err(HospitalError::InvalidRole("janitor".to_string())) },
                MutationCallbacks::new().on_error(move |e| {
                    tx.send(e.clone()).unwrap();
                }),
            )
            .await;

        assert!(result.is_err());
        let error = rx.recv().unwrap();
        assert_eq!(error.kind, ErrorKind::InvalidRole);
        assert_eq!(error.message, "Invalid role specified: janitor");
        assert_eq!(mutation.state().phase, Phase::Error);
    }
}
