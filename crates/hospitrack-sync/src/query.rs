//! 查询原语
//!
//! `Query` 负责一次性的数据获取：挂载时拉取，之后按需 `refetch`。
//! 每次发起请求都会分配新的请求代数，只有最新发起的请求可以写入状态，
//! 与各请求完成的先后顺序无关。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use hospitrack_client::{ApiClient, ApiRequest, Session};
use hospitrack_core::{HospitalError, Result};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::state::{BoxFuture, FetchError, FetchState, SessionChange, SessionStamp};

/// 可重复调用的取数函数
pub type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

struct QueryInner<T> {
    name: String,
    fetcher: RwLock<Fetcher<T>>,
    state: watch::Sender<FetchState<T>>,
    generation: AtomicU64,
    active: AtomicBool,
    session: Option<Arc<Session>>,
}

/// 查询
pub struct Query<T> {
    inner: Arc<QueryInner<T>>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Query<T> {
    /// 使用任意取数函数创建查询
    pub fn new<F>(name: impl Into<String>, fetcher: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<T>> + Send + Sync + 'static,
    {
        let (state, _) = watch::channel(FetchState::idle());
        Self {
            inner: Arc::new(QueryInner {
                name: name.into(),
                fetcher: RwLock::new(Arc::new(fetcher)),
                state,
                generation: AtomicU64::new(0),
                active: AtomicBool::new(true),
                session: None,
            }),
        }
    }

    /// 关联会话：会话代数变化后，旧会话发出的请求结果被丢弃并清空缓存数据
    pub fn with_session(self, session: Arc<Session>) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.session = Some(session);
                Self { inner: Arc::new(inner) }
            }
            Err(inner) => {
                warn!(query = %inner.name, "Session can only be attached before the query is shared");
                Self { inner }
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> FetchState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.inner.state.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// 挂载：首次拉取
    pub async fn start(&self) -> Result<Arc<T>> {
        self.refetch().await
    }

    /// 重新拉取；返回本次调用自身的结果，是否写入状态取决于它是否仍是最新请求
    pub async fn refetch(&self) -> Result<Arc<T>> {
        let inner = &self.inner;
        if !self.is_active() {
            debug!(query = %inner.name, "Refetch on inactive query ignored");
            return Err(HospitalError::Internal(format!("Query {} is no longer active", inner.name)));
        }

        let request_id = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let stamp = inner.session.as_ref().map(SessionStamp::observe);
        inner.state.send_modify(FetchState::begin);
        debug!(query = %inner.name, request_id, "Fetch started");

        let fetcher = self.fetcher();
        let result = fetcher().await.map(Arc::new);

        if !self.is_active() {
            debug!(query = %inner.name, request_id, "Result arrived after deactivation, dropped");
            return result;
        }

        let change = stamp.as_ref().map_or(SessionChange::Unchanged, SessionStamp::change);

        inner.state.send_if_modified(|state| {
            if inner.generation.load(Ordering::SeqCst) != request_id {
                debug!(query = %inner.name, request_id, "Superseded result discarded");
                return false;
            }
            match change {
                SessionChange::Unchanged => {}
                SessionChange::SignedIn => {
                    debug!(query = %inner.name, "Signed in during fetch, previous session result discarded");
                    *state = FetchState::idle();
                    return true;
                }
                SessionChange::Expired => {
                    warn!(query = %inner.name, "Session expired during fetch, cached data invalidated");
                    state.data = None;
                    state.fail(match &result {
                        Err(e) if e.is_unauthorized() => FetchError::from(e),
                        _ => FetchError::session_expired(),
                    });
                    return true;
                }
            }
            match &result {
                Ok(data) => state.succeed(data.clone()),
                Err(e) => {
                    warn!(query = %inner.name, error = %e, "Fetch failed");
                    state.fail(FetchError::from(e));
                }
            }
            true
        });

        result
    }

    /// 替换取数函数（依赖变化）并立即重新拉取
    pub async fn reload_with<F>(&self, fetcher: F) -> Result<Arc<T>>
    where
        F: Fn() -> BoxFuture<'static, Result<T>> + Send + Sync + 'static,
    {
        *self
            .inner
            .fetcher
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(fetcher);
        self.refetch().await
    }

    /// 卸载：此后到达的结果不再修改状态
    pub fn deactivate(&self) {
        if self.inner.active.swap(false, Ordering::SeqCst) {
            debug!(query = %self.inner.name, "Query deactivated");
        }
    }

    fn fetcher(&self) -> Fetcher<T> {
        self.inner
            .fetcher
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl<T: DeserializeOwned + Send + Sync + 'static> Query<T> {
    /// 基于领域接口请求创建查询，自动关联客户端的会话
    pub fn from_request(client: &ApiClient, request: ApiRequest<T>) -> Self {
        let name = request.to_string();
        let session = client.session().clone();
        let client = client.clone();
        Self::new(name, move || {
            let client = client.clone();
            let request = request.clone();
            Box::pin(async move { client.execute(&request).await })
        })
        .with_session(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Phase;
    use hospitrack_client::ClientConfig;
    use hospitrack_core::{Bed, ErrorKind, Page};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn counting_query(counter: Arc<AtomicUsize>) -> Query<usize> {
        Query::new("counter", move || {
            let counter = counter.clone();
            Box::pin(async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1) })
        })
    }

    #[tokio::test]
    async fn test_start_transitions_to_success() {
        let query = counting_query(Arc::new(AtomicUsize::new(0)));
        assert_eq!(query.state().phase, Phase::Idle);

        query.start().await.unwrap();
        let state = query.state();
        assert_eq!(state.phase, Phase::Success);
        assert_eq!(state.data(), Some(&1));
    }

    #[tokio::test]
    async fn test_latest_fetch_wins_regardless_of_order() {
        let (slow_tx, slow_rx) = oneshot::channel::<usize>();
        let slow_rx = Arc::new(tokio::sync::Mutex::new(Some(slow_rx)));
        let calls = Arc::new(AtomicUsize::new(0));

        let query = {
            let calls = calls.clone();
            Query::new("ordering", move || {
                let slow_rx = slow_rx.clone();
                let call = calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move {
                    if call == 0 {
                        let rx = slow_rx.lock().await.take().unwrap();
                        Ok(rx.await.unwrap())
                    } else {
                        Ok(2)
                    }
                })
            })
        };

        let first = tokio::spawn({
            let query = query.clone();
            async move { query.refetch().await }
        });
        tokio::task::yield_now().await;

        // 第二个请求先完成
        query.refetch().await.unwrap();
        assert_eq!(query.state().data(), Some(&2));

        // 第一个请求随后完成，但不能覆盖
        slow_tx.send(1).unwrap();
        assert_eq!(*first.await.unwrap().unwrap(), 1);
        assert_eq!(query.state().data(), Some(&2));
    }

    #[tokio::test]
    async fn test_deactivated_query_ignores_late_result() {
        let (tx, rx) = oneshot::channel::<usize>();
        let rx = Arc::new(tokio::sync::Mutex::new(Some(rx)));
        let query = Query::new("late", move || {
            let rx = rx.clone();
            Box::pin(async move {
                let rx = rx.lock().await.take().unwrap();
                Ok(rx.await.unwrap())
            })
        });

        let pending = tokio::spawn({
            let query = query.clone();
            async move { query.start().await }
        });
        tokio::task::yield_now().await;

        query.deactivate();
        tx.send(7).unwrap();
        pending.await.unwrap().unwrap();

        assert_eq!(query.state().phase, Phase::Loading);
        assert!(query.state().data.is_none());
        assert!(query.refetch().await.is_err());
    }

    #[tokio::test]
    async fn test_error_message_is_normalized() {
        let query: Query<usize> = Query::new("failing", || {
            Box::pin(async {
                Err(HospitalError::Http {
                    status: 400,
                    body: Some(json!({"error": "Ward not found"})),
                })
            })
        });

        assert!(query.start().await.is_err());
        let state = query.state();
        assert_eq!(state.phase, Phase::Error);
        assert_eq!(state.error_message(), Some("Ward not found"));
        assert_eq!(state.error.unwrap().kind, ErrorKind::Http(400));
    }

    #[tokio::test]
    async fn test_reload_with_replaces_fetcher() {
        let query = counting_query(Arc::new(AtomicUsize::new(10)));
        query.start().await.unwrap();
        assert_eq!(query.state().data(), Some(&11));

        query.reload_with(|| Box::pin(async { Ok(42) })).await.unwrap();
        assert_eq!(query.state().data(), Some(&42));
    }

    #[tokio::test]
    async fn test_unauthorized_invalidates_cached_data() {
        let server = MockServer::start().await;
        let beds = json!([{"id": 1, "number": "101", "ward": "ICU", "status": "Available"}]);
        Mock::given(method("GET"))
            .and(path("/beds/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(beds))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/beds/"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"message": "Token expired"}))
                    .set_delay(Duration::from_millis(20)),
            )
            .mount(&server)
            .await;

        let session = Arc::new(Session::with_token("t"));
        let client = ApiClient::new(ClientConfig::new(server.uri()), session.clone()).unwrap();
        let query: Query<Page<Bed>> = Query::from_request(&client, hospitrack_client::api::beds::list(&Default::default()));

        query.start().await.unwrap();
        assert_eq!(query.state().data().map(|p| p.results.len()), Some(1));

        assert!(query.refetch().await.is_err());
        let state = query.state();
        assert!(state.data.is_none());
        assert_eq!(state.error.unwrap().kind, ErrorKind::Unauthorized);
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_in_during_fetch_is_not_reported_as_expiry() {
        let session = Arc::new(Session::new());
        let (tx, rx) = oneshot::channel::<usize>();
        let rx = Arc::new(tokio::sync::Mutex::new(Some(rx)));
        let query = Query::new("anonymous", move || {
            let rx = rx.clone();
            Box::pin(async move {
                let rx = rx.lock().await.take().unwrap();
                Ok(rx.await.unwrap())
            })
        })
        .with_session(session.clone());

        let pending = tokio::spawn({
            let query = query.clone();
            async move { query.start().await }
        });
        tokio::task::yield_now().await;

        session.sign_in(&hospitrack_core::LoginResponse {
            access: "mock_jwt_token_nurse".to_string(),
            refresh: "mock_refresh_token".to_string(),
            user: hospitrack_core::AuthUser {
                id: 2,
                name: Some("Nurse A".to_string()),
                email: "nurse@x.com".to_string(),
                role: hospitrack_core::UserRole::Nurse,
            },
        });
        tx.send(5).unwrap();
        pending.await.unwrap().unwrap();

        let state = query.state();
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.data.is_none());
        assert!(state.error.is_none());
    }
}
