//! 分页查询
//!
//! 按页累积条目。`load_more` 只有在还有下一页且没有请求进行中时才生效；
//! `refresh` 与 `update_params` 回到第一页并替换全部条目，同时使进行中的翻页失效。
//! 关联会话后，请求期间会话失效时结果作废，已累积的条目一并清空。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hospitrack_client::{ApiClient, ApiRequest, QueryParams, Session};
use hospitrack_core::{HospitalError, Page, Result};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::state::{BoxFuture, FetchError, SessionChange, SessionStamp};

/// 按参数取一页
pub type PageFetcher<T> = Arc<dyn Fn(QueryParams) -> BoxFuture<'static, Result<Page<T>>> + Send + Sync>;

/// 分页状态快照
#[derive(Debug)]
pub struct PageState<T> {
    pub items: Arc<Vec<T>>,
    pub page: u32,
    pub has_more: bool,
    pub loading: bool,
    pub params: QueryParams,
    pub error: Option<FetchError>,
}

impl<T> Clone for PageState<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            page: self.page,
            has_more: self.has_more,
            loading: self.loading,
            params: self.params.clone(),
            error: self.error.clone(),
        }
    }
}

impl<T> PageState<T> {
    fn initial(params: QueryParams) -> Self {
        Self {
            items: Arc::new(Vec::new()),
            page: 1,
            has_more: true,
            loading: false,
            params,
            error: None,
        }
    }

    /// 会话变化后丢弃旧会话的条目；返回是否做了处理
    fn reset_for_session(&mut self, change: SessionChange) -> bool {
        if change == SessionChange::Unchanged {
            return false;
        }
        *self = Self::initial(std::mem::take(&mut self.params));
        if change == SessionChange::Expired {
            warn!("Session expired during page load, items cleared");
            self.error = Some(FetchError::session_expired());
        }
        true
    }

    /// 带页码的当前参数
    fn params_for(&self, page: u32) -> QueryParams {
        let mut params = self.params.clone();
        params.set_page(page);
        params
    }
}

/// 分页查询
pub struct PaginatedQuery<T> {
    fetcher: PageFetcher<T>,
    state: watch::Sender<PageState<T>>,
    generation: AtomicU64,
    session: Option<Arc<Session>>,
}

impl<T: Clone + Send + Sync + 'static> PaginatedQuery<T> {
    pub fn new<F>(fetcher: F, initial_params: QueryParams) -> Self
    where
        F: Fn(QueryParams) -> BoxFuture<'static, Result<Page<T>>> + Send + Sync + 'static,
    {
        let mut params = initial_params;
        params.remove(QueryParams::PAGE);
        let (state, _) = watch::channel(PageState::initial(params));
        Self {
            fetcher: Arc::new(fetcher),
            state,
            generation: AtomicU64::new(0),
            session: None,
        }
    }

    /// 关联会话
    pub fn with_session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn state(&self) -> PageState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PageState<T>> {
        self.state.subscribe()
    }

    pub fn items(&self) -> Arc<Vec<T>> {
        self.state.borrow().items.clone()
    }

    /// 从第一页重新加载
    pub async fn refresh(&self) -> Result<()> {
        let request_id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let stamp = self.stamp();
        let mut params = QueryParams::new();
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
            params = state.params_for(1);
        });

        debug!(%params, request_id, "Loading first page");
        let result = (self.fetcher)(params).await;
        let change = session_change(&stamp);

        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != request_id {
                return false;
            }
            if state.reset_for_session(change) {
                return true;
            }
            state.loading = false;
            match &result {
                Ok(page) => {
                    state.items = Arc::new(page.results.clone());
                    state.page = 1;
                    state.has_more = page.has_more();
                }
                Err(e) => {
                    warn!(error = %e, "First page failed");
                    state.error = Some(FetchError::from(e));
                }
            }
            true
        });

        discard_expired(result, change).map(|_| ())
    }

    /// 加载下一页；返回是否真正发起了请求
    pub async fn load_more(&self) -> Result<bool> {
        let mut request = None;
        let stamp = self.stamp();
        self.state.send_if_modified(|state| {
            if state.loading || !state.has_more {
                return false;
            }
            let request_id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            state.loading = true;
            state.error = None;
            request = Some((request_id, state.page + 1, state.params_for(state.page + 1)));
            true
        });
        let Some((request_id, next_page, params)) = request else {
            debug!("load_more ignored: already loading or no more pages");
            return Ok(false);
        };

        debug!(%params, request_id, "Loading next page");
        let result = (self.fetcher)(params).await;
        let change = session_change(&stamp);

        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != request_id {
                debug!(request_id, "Page superseded by refresh");
                return false;
            }
            if state.reset_for_session(change) {
                return true;
            }
            state.loading = false;
            match &result {
                Ok(page) => {
                    let mut items = Vec::with_capacity(state.items.len() + page.results.len());
                    items.extend_from_slice(&state.items);
                    items.extend_from_slice(&page.results);
                    state.items = Arc::new(items);
                    state.page = next_page;
                    state.has_more = page.has_more();
                }
                Err(e) => {
                    warn!(error = %e, page = next_page, "Page load failed");
                    state.error = Some(FetchError::from(e));
                }
            }
            true
        });

        discard_expired(result, change).map(|_| true)
    }

    /// 合并新参数后从第一页重新加载
    pub async fn update_params(&self, params: &QueryParams) -> Result<()> {
        self.state.send_modify(|state| {
            state.params.merge(params);
            state.params.remove(QueryParams::PAGE);
        });
        self.refresh().await
    }

    fn stamp(&self) -> Option<SessionStamp> {
        self.session.as_ref().map(SessionStamp::observe)
    }
}

fn session_change(stamp: &Option<SessionStamp>) -> SessionChange {
    stamp.as_ref().map_or(SessionChange::Unchanged, SessionStamp::change)
}

/// 会话失效后，旧会话的成功结果也按失效处理
fn discard_expired<P>(result: Result<P>, change: SessionChange) -> Result<P> {
    match result {
        Ok(_) if change == SessionChange::Expired => Err(HospitalError::session_expired()),
        other => other,
    }
}

impl<T: DeserializeOwned + Clone + Send + Sync + 'static> PaginatedQuery<T> {
    /// 基于列表接口创建，例如 `api::beds::list`
    pub fn from_endpoint(
        client: &ApiClient,
        endpoint: fn(&QueryParams) -> ApiRequest<Page<T>>,
        initial_params: QueryParams,
    ) -> Self {
        let session = client.session().clone();
        let client = client.clone();
        Self::new(
            move |params| {
                let client = client.clone();
                let request = endpoint(&params);
                Box::pin(async move { client.execute(&request).await })
            },
            initial_params,
        )
        .with_session(session)
    }
}
