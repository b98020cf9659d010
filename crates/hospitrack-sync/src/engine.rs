//! 看板同步引擎
//!
//! 把客户端、实体缓存和归约器组合在一起，提供带乐观更新的业务操作：
//! 先在本地应用修改，再调用后端；成功时以服务器返回值确认，失败时回滚。
//! 本地没有缓存的实体直接发请求，成功后写入服务器返回值。
//!
//! 跨实体操作（分配床位同时更新患者）没有补偿写入：任一步失败时两边的乐观修改都回滚，
//! 并重新拉取相关集合与服务器对齐。

use chrono::Utc;
use hospitrack_client::{api, ApiClient, ApiRequest, QueryParams};
use hospitrack_core::stats::{self, BedStats};
use hospitrack_core::{
    Alert, Bed, BedStatus, EntityId, HospitalError, NewAlert, Page, Patient, PatientNotesUpdate, Result, Transfer,
    VitalSigns,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::cache::CollectionCache;
use crate::reducers::{AlertAction, BedAction, PatientAction, Reducible, TransferAction};
use crate::state::{SessionChange, SessionStamp};

/// 看板同步引擎
#[derive(Debug, Clone)]
pub struct DashboardEngine {
    client: ApiClient,
    beds: CollectionCache<Bed>,
    patients: CollectionCache<Patient>,
    alerts: CollectionCache<Alert>,
    transfers: CollectionCache<Transfer>,
}

/// 看板汇总
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardOverview {
    pub beds: BedStats,
    pub active_alerts: usize,
    pub pending_alerts: usize,
    pub critical_patients: usize,
    pub pending_transfers: usize,
}

impl DashboardEngine {
    /// 创建新的同步引擎
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            beds: CollectionCache::new(),
            patients: CollectionCache::new(),
            alerts: CollectionCache::new(),
            transfers: CollectionCache::new(),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn beds(&self) -> &CollectionCache<Bed> {
        &self.beds
    }

    pub fn patients(&self) -> &CollectionCache<Patient> {
        &self.patients
    }

    pub fn alerts(&self) -> &CollectionCache<Alert> {
        &self.alerts
    }

    pub fn transfers(&self) -> &CollectionCache<Transfer> {
        &self.transfers
    }

    /// 拉取床位列表并替换缓存
    pub async fn refresh_beds(&self, params: &QueryParams) -> Result<usize> {
        load_into(&self.client, &self.beds, api::beds::list(params)).await
    }

    pub async fn refresh_patients(&self, params: &QueryParams) -> Result<usize> {
        load_into(&self.client, &self.patients, api::patients::list(params)).await
    }

    pub async fn refresh_alerts(&self, params: &QueryParams) -> Result<usize> {
        load_into(&self.client, &self.alerts, api::alerts::list(params)).await
    }

    pub async fn refresh_transfers(&self, params: &QueryParams) -> Result<usize> {
        load_into(&self.client, &self.transfers, api::transfers::list(params)).await
    }

    /// 刷新全部集合；单个集合失败只记录日志
    pub async fn refresh_all(&self) -> Result<()> {
        let all = QueryParams::new();
        let (beds, patients, alerts, transfers) = tokio::join!(
            self.refresh_beds(&all),
            self.refresh_patients(&all),
            self.refresh_alerts(&all),
            self.refresh_transfers(&all),
        );
        for (name, result) in [
            ("beds", beds),
            ("patients", patients),
            ("alerts", alerts),
            ("transfers", transfers),
        ] {
            if let Err(e) = result {
                warn!(collection = name, error = %e, "Refresh failed");
                if e.is_unauthorized() {
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// 基于缓存计算看板汇总，可按病区过滤（"all" 表示不过滤）
    pub fn overview(&self, ward: &str) -> DashboardOverview {
        let beds = self.beds.snapshot();
        let patients = self.patients.snapshot();
        let alerts = self.alerts.snapshot();

        let beds: Vec<Bed> = stats::filter_by_ward(&beds, ward).into_iter().cloned().collect();
        let patients: Vec<Patient> = stats::filter_by_ward(&patients, ward).into_iter().cloned().collect();
        let alerts: Vec<Alert> = stats::filter_by_ward(&alerts, ward).into_iter().cloned().collect();

        DashboardOverview {
            beds: BedStats::from_beds(&beds),
            active_alerts: stats::active_alert_count(&alerts),
            pending_alerts: stats::pending_alert_count(&alerts),
            critical_patients: stats::critical_patient_count(&patients),
            pending_transfers: stats::pending_transfer_requests(&patients),
        }
    }

    /// 确认告警
    pub async fn acknowledge_alert(&self, id: EntityId, by: &str) -> Result<Alert> {
        let action = AlertAction::Acknowledge { id, by: by.to_string(), at: Utc::now() };
        optimistic_call(&self.client, &self.alerts, action, api::alerts::acknowledge(id, by)).await
    }

    /// 解决告警
    pub async fn resolve_alert(&self, id: EntityId, by: &str, resolution: &str) -> Result<Alert> {
        let action = AlertAction::Resolve {
            id,
            by: by.to_string(),
            resolution: resolution.to_string(),
            at: Utc::now(),
        };
        optimistic_call(&self.client, &self.alerts, action, api::alerts::resolve(id, by, resolution)).await
    }

    /// 上报告警（含护士升级），成功后插入缓存
    pub async fn raise_alert(&self, alert: &NewAlert) -> Result<Alert> {
        let created = self.client.execute(&api::alerts::create(alert)?).await?;
        self.alerts.apply(&AlertAction::Insert(created.clone()))?;
        info!(id = created.id, severity = %created.severity, "Alert raised");
        Ok(created)
    }

    /// 修改床位状态
    pub async fn update_bed_status(&self, bed_id: EntityId, status: BedStatus) -> Result<Bed> {
        let action = BedAction::SetStatus { bed_id, status };
        optimistic_call(&self.client, &self.beds, action, api::beds::update_status(bed_id, status)).await
    }

    /// 床位清洁完成
    pub async fn mark_bed_cleaned(&self, bed_id: EntityId, cleaned_by: Option<&str>) -> Result<Bed> {
        let at = Utc::now();
        let update = hospitrack_core::BedCleaningUpdate {
            last_cleaned: at,
            cleaned_by: cleaned_by.map(str::to_string),
            status: Some(BedStatus::Available),
        };
        let action = BedAction::MarkCleaned { bed_id, at };
        optimistic_call(&self.client, &self.beds, action, api::beds::update_cleaning(bed_id, &update)?).await
    }

    /// 患者离床，床位进入清洁
    pub async fn release_bed(&self, bed_id: EntityId) -> Result<Bed> {
        let pending_patient = self.beds.get(bed_id).and_then(|bed| bed.patient_id).and_then(|patient_id| {
            self.patients
                .optimistic(PatientAction::MoveToBed { id: patient_id, bed: None, ward: None })
                .ok()
        });

        let result = optimistic_call(
            &self.client,
            &self.beds,
            BedAction::Release { bed_id },
            api::beds::release_patient(bed_id),
        )
        .await;

        if let Some(pending) = pending_patient {
            if result.is_err() {
                pending.rollback();
            } else {
                // 患者一侧没有服务器返回值，乐观值保留到下次刷新
                drop(pending);
            }
        }
        result
    }

    /// 分配床位：床位与患者两侧同时乐观更新，失败时全部回滚并重新对齐
    pub async fn assign_bed(&self, bed_id: EntityId, patient_id: EntityId) -> Result<Bed> {
        let pending_bed = self.beds.optimistic(BedAction::Assign { bed_id, patient_id })?;
        let (number, ward) = self
            .beds
            .get(bed_id)
            .map(|bed| (Some(bed.number), Some(bed.ward)))
            .unwrap_or((None, None));
        let pending_patient = self
            .patients
            .optimistic(PatientAction::MoveToBed { id: patient_id, bed: number, ward })
            .ok();

        match self.client.execute(&api::beds::assign_patient(bed_id, patient_id)).await {
            Ok(bed) => {
                pending_bed.confirm(bed.clone());
                drop(pending_patient);
                info!(bed_id, patient_id, "Bed assigned");
                Ok(bed)
            }
            Err(e) => {
                warn!(bed_id, patient_id, error = %e, "Bed assignment failed, reconciling");
                pending_bed.rollback();
                if let Some(pending) = pending_patient {
                    pending.rollback();
                }
                self.reconcile_beds_and_patients().await;
                Err(e)
            }
        }
    }

    /// 更新病程记录
    pub async fn update_patient_notes(&self, patient_id: EntityId, update: &PatientNotesUpdate) -> Result<Patient> {
        let action = PatientAction::UpdateNotes {
            id: patient_id,
            notes: update.notes.clone(),
            status: update.status,
        };
        optimistic_call(
            &self.client,
            &self.patients,
            action,
            api::patients::update_notes(patient_id, update)?,
        )
        .await
    }

    /// 更新生命体征
    pub async fn update_vital_signs(&self, patient_id: EntityId, vitals: &VitalSigns) -> Result<Patient> {
        let action = PatientAction::UpdateVitals { id: patient_id, vitals: vitals.clone() };
        optimistic_call(
            &self.client,
            &self.patients,
            action,
            api::patients::update_vital_signs(patient_id, vitals)?,
        )
        .await
    }

    /// 批准转床申请
    pub async fn approve_transfer(&self, id: EntityId, by: &str) -> Result<Transfer> {
        let action = TransferAction::Approve { id, by: by.to_string() };
        optimistic_call(&self.client, &self.transfers, action, api::transfers::approve(id, by)).await
    }

    /// 驳回转床申请
    pub async fn reject_transfer(&self, id: EntityId, by: &str, reason: &str) -> Result<Transfer> {
        let action = TransferAction::Reject {
            id,
            by: by.to_string(),
            reason: reason.to_string(),
        };
        optimistic_call(&self.client, &self.transfers, action, api::transfers::reject(id, by, reason)).await
    }

    async fn reconcile_beds_and_patients(&self) {
        let all = QueryParams::new();
        let (beds, patients) = tokio::join!(self.refresh_beds(&all), self.refresh_patients(&all));
        if let Err(e) = beds.and(patients) {
            warn!(error = %e, "Reconciliation refetch failed");
        }
    }
}

async fn load_into<T>(client: &ApiClient, cache: &CollectionCache<T>, request: ApiRequest<Page<T>>) -> Result<usize>
where
    T: Reducible + DeserializeOwned,
{
    let stamp = SessionStamp::observe(client.session());
    let result = client.execute(&request).await;

    match stamp.change() {
        SessionChange::Unchanged => {}
        SessionChange::SignedIn => {
            debug!(kind = T::KIND, "Signed in during load, previous session result discarded");
            cache.replace(Vec::new());
            return Ok(0);
        }
        SessionChange::Expired => {
            warn!(kind = T::KIND, "Session expired during load, cache cleared");
            cache.replace(Vec::new());
            return Err(match result {
                Err(e) if e.is_unauthorized() => e,
                _ => HospitalError::session_expired(),
            });
        }
    }

    let page = result?;
    let count = page.results.len();
    cache.replace(page.into_items());
    Ok(count)
}

async fn optimistic_call<T>(
    client: &ApiClient,
    cache: &CollectionCache<T>,
    action: T::Action,
    request: ApiRequest<T>,
) -> Result<T>
where
    T: Reducible + DeserializeOwned,
{
    let pending = match cache.optimistic(action) {
        Ok(pending) => Some(pending),
        Err(HospitalError::NotFound(what)) => {
            debug!(%what, "Not cached, sending update without optimistic step");
            None
        }
        Err(e) => return Err(e),
    };

    match client.execute(&request).await {
        Ok(entity) => {
            match pending {
                Some(pending) => pending.confirm(entity.clone()),
                None => cache.upsert(entity.clone()),
            }
            Ok(entity)
        }
        Err(e) => {
            warn!(request = %request, error = %e, "Server rejected update, rolling back");
            if let Some(pending) = pending {
                pending.rollback();
            }
            Err(e)
        }
    }
}
