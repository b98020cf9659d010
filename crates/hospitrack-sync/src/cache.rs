//! 实体缓存
//!
//! 集合整体以 `Arc<Vec<T>>` 发布，任何修改都生成新集合后整体替换（写时复制），
//! 读取方拿到的快照永远不会被原地修改。

use std::sync::Arc;

use hospitrack_core::{Entity, EntityId, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::reducers::{upsert, Reducible};
use crate::state::{FetchState, Phase};

/// 共享的实体集合缓存
pub struct CollectionCache<T> {
    tx: Arc<watch::Sender<Arc<Vec<T>>>>,
}

impl<T> Clone for CollectionCache<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T: Reducible> Default for CollectionCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Reducible> CollectionCache<T> {
    pub fn new() -> Self {
        Self::from_items(Vec::new())
    }

    pub fn from_items(items: Vec<T>) -> Self {
        let (tx, _) = watch::channel(Arc::new(items));
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> Arc<Vec<T>> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<T>>> {
        self.tx.subscribe()
    }

    pub fn get(&self, id: EntityId) -> Option<T> {
        self.tx.borrow().iter().find(|item| item.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    /// 以服务器数据整体替换
    pub fn replace(&self, items: Vec<T>) {
        debug!(kind = T::KIND, count = items.len(), "Cache replaced");
        self.tx.send_replace(Arc::new(items));
    }

    /// 写入服务器确认的单个实体
    pub fn upsert(&self, entity: T) {
        self.tx.send_modify(|items| *items = Arc::new(upsert(items, entity)));
    }

    /// 应用归约动作；失败时缓存保持不变
    pub fn apply(&self, action: &T::Action) -> Result<Arc<Vec<T>>> {
        let mut outcome = None;
        self.tx.send_if_modified(|items| match T::reduce(items, action) {
            Ok(next) => {
                let next = Arc::new(next);
                *items = next.clone();
                outcome = Some(Ok(next));
                true
            }
            Err(e) => {
                outcome = Some(Err(e));
                false
            }
        });
        outcome.unwrap_or_else(|| Ok(self.snapshot()))
    }

    /// 乐观应用动作，返回可确认或回滚的句柄
    pub fn optimistic(&self, action: T::Action) -> Result<Optimistic<T>> {
        let mut outcome = None;
        self.tx.send_if_modified(|items| match T::reduce(items, &action) {
            Ok(next) => {
                let applied = Arc::new(next);
                outcome = Some(Ok((items.clone(), applied.clone())));
                *items = applied;
                true
            }
            Err(e) => {
                outcome = Some(Err(e));
                false
            }
        });

        let (before, applied) = match outcome {
            Some(Ok(pair)) => pair,
            Some(Err(e)) => {
                warn!(kind = T::KIND, ?action, error = %e, "Optimistic update rejected");
                return Err(e);
            }
            None => (self.snapshot(), self.snapshot()),
        };
        debug!(kind = T::KIND, ?action, "Optimistic update applied");

        Ok(Optimistic {
            cache: self.clone(),
            before,
            applied,
            action,
        })
    }

    /// 跟随查询结果：每次成功都整体替换缓存
    pub fn follow<S, F>(&self, mut rx: watch::Receiver<FetchState<S>>, extract: F) -> JoinHandle<()>
    where
        S: Send + Sync + 'static,
        F: Fn(&S) -> Vec<T> + Send + 'static,
    {
        let cache = self.clone();
        tokio::spawn(async move {
            loop {
                let items = {
                    let state = rx.borrow_and_update();
                    match (&state.phase, &state.data) {
                        (Phase::Success, Some(data)) => Some(extract(data)),
                        _ => None,
                    }
                };
                if let Some(items) = items {
                    cache.replace(items);
                }
                if rx.changed().await.is_err() {
                    debug!(kind = T::KIND, "Source query dropped, cache stops following");
                    break;
                }
            }
        })
    }
}

/// 已应用但尚未被服务器确认的修改
#[derive(Debug)]
#[must_use = "an optimistic update must be confirmed or rolled back"]
pub struct Optimistic<T: Reducible> {
    cache: CollectionCache<T>,
    before: Arc<Vec<T>>,
    applied: Arc<Vec<T>>,
    action: T::Action,
}

impl<T: Reducible> Optimistic<T> {
    pub fn action(&self) -> &T::Action {
        &self.action
    }

    /// 用服务器返回的实体替换乐观值
    pub fn confirm(self, entity: T) {
        debug!(kind = T::KIND, id = entity.id(), "Optimistic update confirmed");
        self.cache.upsert(entity);
    }

    /// 撤销修改。只有缓存仍是本次乐观写入的结果时才恢复，
    /// 否则说明已有更新的服务器数据，保持不动并返回 false。
    pub fn rollback(self) -> bool {
        let restored = self.cache.tx.send_if_modified(|items| {
            if Arc::ptr_eq(items, &self.applied) {
                *items = self.before.clone();
                true
            } else {
                false
            }
        });
        if restored {
            info!(kind = T::KIND, action = ?self.action, "Optimistic update rolled back");
        } else {
            warn!(kind = T::KIND, action = ?self.action, "Cache changed since optimistic update, rollback skipped");
        }
        restored
    }
}

impl<T> std::fmt::Debug for CollectionCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionCache").field("len", &self.tx.borrow().len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use crate::reducers::fixtures::{alert, bed};
    use crate::reducers::{AlertAction, BedAction};
    use chrono::Utc;
    use hospitrack_core::{AlertSeverity, Alert, Bed, BedStatus, Page};

    #[test]
    fn test_apply_is_copy_on_write() {
        let cache = CollectionCache::from_items(vec![bed(1, "101", BedStatus::Occupied, Some(4))]);
        let before = cache.snapshot();

        cache.apply(&BedAction::Release { bed_id: 1 }).unwrap();

        assert_eq!(before[0].status, BedStatus::Occupied);
        assert_eq!(cache.get(1).unwrap().status, BedStatus::Cleaning);
    }

    #[test]
    fn test_failed_apply_leaves_cache() {
        let cache = CollectionCache::from_items(vec![bed(1, "101", BedStatus::Maintenance, None)]);
        let before = cache.snapshot();

        assert!(cache.apply(&BedAction::Assign { bed_id: 1, patient_id: 2 }).is_err());
        assert!(Arc::ptr_eq(&before, &cache.snapshot()));
    }

    #[test]
    fn test_optimistic_confirm_and_rollback() {
        let cache = CollectionCache::from_items(vec![alert(1, AlertSeverity::Critical)]);
        let at = Utc::now();

        let pending = cache
            .optimistic(AlertAction::Acknowledge { id: 1, by: "Nurse A".to_string(), at })
            .unwrap();
        assert!(cache.get(1).unwrap().acknowledged);
        assert!(pending.rollback());
        assert!(!cache.get(1).unwrap().acknowledged);

        let pending = cache
            .optimistic(AlertAction::Acknowledge { id: 1, by: "Nurse A".to_string(), at })
            .unwrap();
        let mut confirmed: Alert = cache.get(1).unwrap();
        confirmed.acknowledged_at = None;
        pending.confirm(confirmed.clone());
        assert_eq!(cache.get(1).unwrap(), confirmed);
    }

    #[test]
    fn test_rollback_skipped_after_newer_data() {
        let cache = CollectionCache::from_items(vec![bed(2, "102", BedStatus::Available, None)]);
        let pending = cache.optimistic(BedAction::Assign { bed_id: 2, patient_id: 7 }).unwrap();

        let server_copy = bed(2, "102", BedStatus::Occupied, Some(8));
        cache.replace(vec![server_copy.clone()]);

        assert!(!pending.rollback());
        assert_eq!(cache.get(2).unwrap(), server_copy);
    }

    #[tokio::test]
    async fn test_follow_replaces_on_success() {
        let query: Query<Page<Bed>> = Query::new("beds", || {
            Box::pin(async { Ok(Page::new(vec![bed(1, "101", BedStatus::Available, None)], None)) })
        });
        let cache: CollectionCache<Bed> = CollectionCache::new();
        let handle = cache.follow(query.subscribe(), |page: &Page<Bed>| page.results.clone());

        let mut rx = cache.subscribe();
        query.start().await.unwrap();
        rx.wait_for(|items| items.len() == 1).await.unwrap();

        assert_eq!(cache.get(1).unwrap().number, "101");
        handle.abort();
    }
}
