//! 核心数据模型定义
//!
//! 实体均由服务器持有，客户端仅保存缓存副本。线上格式为 snake_case，
//! 同时兼容看板模拟数据使用的 camelCase 字段名。

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{HospitalError, Result};
use crate::utils::lenient_timestamp;

/// 实体标识符
pub type EntityId = u64;

/// 可按ID定位的实体
pub trait Entity {
    fn id(&self) -> EntityId;
}

/// 隶属于病区的实体
pub trait WardScoped {
    fn ward(&self) -> Option<&str>;
}

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Doctor,
    Nurse,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Doctor => "doctor",
            UserRole::Nurse => "nurse",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = HospitalError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "admin" => Ok(UserRole::Admin),
            "doctor" => Ok(UserRole::Doctor),
            "nurse" => Ok(UserRole::Nurse),
            other => Err(HospitalError::InvalidRole(other.to_string())),
        }
    }
}

/// 患者状态；部分后端以 `condition` 字段下发，缺省为 Stable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PatientStatus {
    #[default]
    #[serde(alias = "stable")]
    Stable,
    #[serde(alias = "critical")]
    Critical,
    #[serde(alias = "recovering")]
    Recovering,
    #[serde(rename = "Under Observation", alias = "UnderObservation", alias = "under observation")]
    UnderObservation,
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatientStatus::Stable => write!(f, "Stable"),
            PatientStatus::Critical => write!(f, "Critical"),
            PatientStatus::Recovering => write!(f, "Recovering"),
            PatientStatus::UnderObservation => write!(f, "Under Observation"),
        }
    }
}

impl FromStr for PatientStatus {
    type Err = HospitalError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stable" => Ok(PatientStatus::Stable),
            "critical" => Ok(PatientStatus::Critical),
            "recovering" => Ok(PatientStatus::Recovering),
            "under observation" | "under_observation" | "observation" => {
                Ok(PatientStatus::UnderObservation)
            }
            other => Err(HospitalError::Validation(
                crate::validation::ValidationErrors::single("status", format!("Unknown patient status: {}", other)),
            )),
        }
    }
}

/// 生命体征
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    #[serde(alias = "heartRate", skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<u32>,
    #[serde(alias = "bloodPressure", skip_serializing_if = "Option::is_none")]
    pub blood_pressure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(alias = "oxygenLevel", skip_serializing_if = "Option::is_none")]
    pub oxygen_level: Option<u32>,
}

/// 住院患者
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: EntityId,
    pub name: String,
    pub age: Option<u32>,
    pub ward: Option<String>,
    #[serde(alias = "bed_number")]
    pub bed: Option<String>,
    #[serde(default, alias = "condition")]
    pub status: PatientStatus,
    pub diagnosis: Option<String>,
    #[serde(alias = "admissionDate", alias = "admitted_date")]
    pub admission_date: Option<NaiveDate>,
    #[serde(alias = "vitalSigns")]
    pub vital_signs: Option<VitalSigns>,
    pub notes: Option<String>,
    #[serde(alias = "lastNotes")]
    pub last_notes: Option<String>,
    #[serde(alias = "doctorAssigned")]
    pub doctor_assigned: Option<String>,
    #[serde(default, alias = "transferRequested")]
    pub transfer_requested: bool,
}

impl Entity for Patient {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl WardScoped for Patient {
    fn ward(&self) -> Option<&str> {
        self.ward.as_deref()
    }
}

/// 患者登记请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub age: u32,
    pub ward: String,
    pub condition_notes: String,
    pub emergency_contact: String,
    pub contact_phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergies: Option<String>,
    pub admission_type: String,
}

/// 护士/医生病程记录更新
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientNotesUpdate {
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PatientStatus>,
}

/// 床位状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BedStatus {
    #[serde(alias = "available")]
    Available,
    #[serde(alias = "occupied")]
    Occupied,
    #[serde(alias = "cleaning")]
    Cleaning,
    #[serde(alias = "maintenance")]
    Maintenance,
}

impl BedStatus {
    /// 查询参数中使用的小写形式
    pub fn as_query_value(&self) -> &'static str {
        match self {
            BedStatus::Available => "available",
            BedStatus::Occupied => "occupied",
            BedStatus::Cleaning => "cleaning",
            BedStatus::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for BedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BedStatus::Available => write!(f, "Available"),
            BedStatus::Occupied => write!(f, "Occupied"),
            BedStatus::Cleaning => write!(f, "Cleaning"),
            BedStatus::Maintenance => write!(f, "Maintenance"),
        }
    }
}

impl FromStr for BedStatus {
    type Err = HospitalError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(BedStatus::Available),
            "occupied" => Ok(BedStatus::Occupied),
            "cleaning" => Ok(BedStatus::Cleaning),
            "maintenance" => Ok(BedStatus::Maintenance),
            other => Err(HospitalError::Validation(
                crate::validation::ValidationErrors::single("status", format!("Unknown bed status: {}", other)),
            )),
        }
    }
}

/// 床位
///
/// 床号只在病区内唯一。`patient_id` 为弱引用，只用于查找。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bed {
    pub id: EntityId,
    pub number: String,
    pub ward: String,
    pub status: BedStatus,
    #[serde(alias = "patientId")]
    pub patient_id: Option<EntityId>,
    #[serde(alias = "assignedNurse")]
    pub assigned_nurse: Option<String>,
    #[serde(default, alias = "lastCleaned", deserialize_with = "lenient_timestamp")]
    pub last_cleaned: Option<DateTime<Utc>>,
    #[serde(alias = "emergencyAlert")]
    pub emergency_alert: Option<String>,
}

impl Bed {
    /// 占用 ⇔ 恰好引用一名患者
    pub fn is_consistent(&self) -> bool {
        match self.status {
            BedStatus::Occupied => self.patient_id.is_some(),
            _ => self.patient_id.is_none(),
        }
    }

    pub fn check_invariants(&self) -> Result<()> {
        if self.is_consistent() {
            Ok(())
        } else {
            Err(HospitalError::Internal(format!(
                "Bed {} in ward {} is {} with patient reference {:?}",
                self.number, self.ward, self.status, self.patient_id
            )))
        }
    }

    /// 生成切换到新状态后的副本；离开占用状态时清除患者引用
    pub fn with_status(&self, status: BedStatus) -> Bed {
        let mut next = self.clone();
        next.status = status;
        if status != BedStatus::Occupied {
            next.patient_id = None;
        }
        next
    }

    pub fn with_patient(&self, patient_id: EntityId) -> Bed {
        let mut next = self.clone();
        next.status = BedStatus::Occupied;
        next.patient_id = Some(patient_id);
        next
    }
}

impl Entity for Bed {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl WardScoped for Bed {
    fn ward(&self) -> Option<&str> {
        Some(&self.ward)
    }
}

/// 床位清洁记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BedCleaningUpdate {
    pub last_cleaned: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaned_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BedStatus>,
}

/// 告警严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = HospitalError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(AlertSeverity::Low),
            "medium" => Ok(AlertSeverity::Medium),
            "high" => Ok(AlertSeverity::High),
            "critical" => Ok(AlertSeverity::Critical),
            other => Err(HospitalError::Validation(
                crate::validation::ValidationErrors::single("severity", format!("Unknown severity: {}", other)),
            )),
        }
    }
}

/// 告警生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
}

/// 紧急告警
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: EntityId,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    #[serde(default, alias = "created_at", deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub ward: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub bed: Option<String>,
    pub patient: Option<String>,
    #[serde(alias = "reportedBy")]
    pub reported_by: Option<String>,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(alias = "acknowledgedBy")]
    pub acknowledged_by: Option<String>,
    #[serde(default, alias = "acknowledgedAt", deserialize_with = "lenient_timestamp")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(alias = "resolvedBy")]
    pub resolved_by: Option<String>,
    #[serde(default, alias = "resolvedAt", deserialize_with = "lenient_timestamp")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
}

impl Alert {
    pub fn status(&self) -> AlertStatus {
        if self.resolved {
            AlertStatus::Resolved
        } else if self.acknowledged {
            AlertStatus::Acknowledged
        } else {
            AlertStatus::Open
        }
    }

    pub fn is_active(&self) -> bool {
        !self.resolved
    }

    /// resolved ⇒ acknowledged；未确认时不得带确认人
    pub fn check_invariants(&self) -> Result<()> {
        if self.resolved && !self.acknowledged {
            return Err(HospitalError::Internal(format!(
                "Alert {} is resolved but not acknowledged",
                self.id
            )));
        }
        if !self.acknowledged && self.acknowledged_by.is_some() {
            return Err(HospitalError::Internal(format!(
                "Alert {} carries acknowledged_by without being acknowledged",
                self.id
            )));
        }
        Ok(())
    }
}

impl Entity for Alert {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl WardScoped for Alert {
    fn ward(&self) -> Option<&str> {
        self.ward.as_deref().or(self.location.as_deref())
    }
}

/// 新建告警（含护士上报的升级事件）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ward: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub reported_by: String,
}

impl NewAlert {
    /// 护士对患者发起的升级告警
    pub fn escalation(patient: &Patient, severity: AlertSeverity, notes: &str, reported_by: &str) -> Self {
        Self {
            severity,
            title: format!("Patient Escalation - {}", patient.name),
            message: notes.to_string(),
            ward: patient.ward.clone(),
            bed: patient.bed.clone(),
            patient: Some(patient.name.clone()),
            location: None,
            reported_by: reported_by.to_string(),
        }
    }
}

/// 转床申请状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Pending => write!(f, "pending"),
            TransferStatus::Approved => write!(f, "approved"),
            TransferStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// 转床申请
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: EntityId,
    #[serde(alias = "patientId")]
    pub patient_id: EntityId,
    #[serde(alias = "patientName")]
    pub patient_name: Option<String>,
    #[serde(alias = "fromBed")]
    pub from_bed: Option<String>,
    #[serde(alias = "toBed")]
    pub to_bed: String,
    pub reason: Option<String>,
    pub status: TransferStatus,
    #[serde(alias = "requestedBy")]
    pub requested_by: Option<String>,
    #[serde(alias = "approvedBy")]
    pub approved_by: Option<String>,
    #[serde(alias = "rejectedBy")]
    pub rejected_by: Option<String>,
    #[serde(alias = "rejectionReason")]
    pub rejection_reason: Option<String>,
    #[serde(default, alias = "createdAt", deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Entity for Transfer {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// 新建转床申请
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransfer {
    pub patient_id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_bed: Option<String>,
    pub to_bed: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
}

/// 门诊预约状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    #[serde(alias = "canceled")]
    Cancelled,
}

/// 门诊预约
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: EntityId,
    #[serde(alias = "doctorId")]
    pub doctor_id: EntityId,
    #[serde(alias = "doctorName")]
    pub doctor_name: Option<String>,
    #[serde(alias = "patientName")]
    pub patient_name: String,
    pub date: NaiveDate,
    #[serde(alias = "timeSlot")]
    pub time_slot: String,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

impl Entity for Appointment {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// 新建或修改门诊预约
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRequest {
    pub doctor_id: EntityId,
    pub patient_name: String,
    pub date: NaiveDate,
    pub time_slot: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// 某日门诊排班
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpdSchedule {
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
}

/// 排班信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShiftSchedule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift: Option<String>,
    #[serde(alias = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(alias = "endTime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub days: Vec<String>,
}

/// 医护人员
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: EntityId,
    pub name: String,
    pub role: UserRole,
    pub ward: Option<String>,
    #[serde(default, alias = "onDuty")]
    pub on_duty: bool,
    pub schedule: Option<ShiftSchedule>,
}

impl Entity for StaffMember {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl WardScoped for StaffMember {
    fn ward(&self) -> Option<&str> {
        self.ward.as_deref()
    }
}

/// 登录请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// 登录用户信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: EntityId,
    pub name: Option<String>,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

/// 登录响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: AuthUser,
}

/// 注册请求；`role` 只用于选择注册端点，不会出现在请求体中
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

impl RegisterRequest {
    pub fn payload(&self) -> RegistrationPayload {
        RegistrationPayload {
            name: self.name.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}

/// 注册请求体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationPayload {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// 令牌刷新响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRefreshResponse {
    pub access: String,
    pub refresh: Option<String>,
}

/// 分页结果
///
/// 兼容 `{results, next}` 信封与裸数组（视为最后一页）两种格式。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub next: Option<String>,
    pub count: Option<u64>,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, next: Option<String>) -> Self {
        Self { results, next, count: None }
    }

    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }

    pub fn into_items(self) -> Vec<T> {
        self.results
    }
}

// 手写访问器而不是 untagged 枚举，条目解析失败时保留原始错误
struct PageVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for PageVisitor<T> {
    type Value = Page<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list or a {results, next} envelope")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Page<T>, A::Error> {
        let mut results = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            results.push(item);
        }
        Ok(Page::new(results, None))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Page<T>, A::Error> {
        let mut results = None;
        let mut next = None;
        let mut count = None;
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "results" => results = Some(map.next_value()?),
                "next" => next = map.next_value()?,
                "count" => count = map.next_value()?,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        let results = results.ok_or_else(|| de::Error::missing_field("results"))?;
        Ok(Page { results, next, count })
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Page<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(PageVisitor(PhantomData))
    }
}

// 床号在模拟数据中可能是数字
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn occupied_bed() -> Bed {
        serde_json::from_value(json!({
            "id": 1,
            "number": "101",
            "ward": "ICU",
            "status": "Occupied",
            "patient_id": 4,
            "assignedNurse": "Nurse Sarah"
        }))
        .unwrap()
    }

    #[test]
    fn test_bed_status_change_clears_patient() {
        let bed = occupied_bed();
        assert!(bed.is_consistent());

        let cleaning = bed.with_status(BedStatus::Cleaning);
        assert_eq!(cleaning.status, BedStatus::Cleaning);
        assert_eq!(cleaning.patient_id, None);
        assert!(cleaning.check_invariants().is_ok());
        // 原副本保持不变
        assert_eq!(bed.patient_id, Some(4));
    }

    #[test]
    fn test_inconsistent_bed_detected() {
        let mut bed = occupied_bed();
        bed.status = BedStatus::Available;
        assert!(!bed.is_consistent());
        assert!(bed.check_invariants().is_err());
    }

    #[test]
    fn test_patient_accepts_camel_case() {
        let patient: Patient = serde_json::from_value(json!({
            "id": 4,
            "name": "Amit Singh",
            "age": 35,
            "ward": "ICU",
            "bed": "103",
            "status": "Under Observation",
            "admissionDate": "2025-01-15",
            "vitalSigns": {"heartRate": 110, "bloodPressure": "160/100", "temperature": 100.2, "oxygenLevel": 92}
        }))
        .unwrap();

        assert_eq!(patient.status, PatientStatus::UnderObservation);
        assert_eq!(patient.vital_signs.unwrap().oxygen_level, Some(92));
        assert!(!patient.transfer_requested);
    }

    #[test]
    fn test_alert_status_and_invariants() {
        let mut alert: Alert = serde_json::from_value(json!({
            "id": 1,
            "severity": "critical",
            "title": "Oxygen Level Drop",
            "message": "Patient in ICU bed 103 showing decreased oxygen saturation",
            "bed": 103,
            "acknowledged": false
        }))
        .unwrap();

        assert_eq!(alert.bed.as_deref(), Some("103"));
        assert_eq!(alert.status(), AlertStatus::Open);
        assert!(alert.check_invariants().is_ok());

        alert.resolved = true;
        assert!(alert.check_invariants().is_err());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("doctor".parse::<UserRole>().unwrap(), UserRole::Doctor);
        assert!(matches!("surgeon".parse::<UserRole>(), Err(HospitalError::InvalidRole(r)) if r == "surgeon"));
    }

    #[test]
    fn test_page_envelope_and_bare_array() {
        let page: Page<u32> = serde_json::from_value(json!({
            "results": [1, 2],
            "next": "http://localhost:8000/api/beds/?page=2"
        }))
        .unwrap();
        assert!(page.has_more());
        assert_eq!(page.results, vec![1, 2]);

        let bare: Page<u32> = serde_json::from_value(json!([3, 4, 5])).unwrap();
        assert!(!bare.has_more());
        assert_eq!(bare.into_items(), vec![3, 4, 5]);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Critical > AlertSeverity::High);
        assert!(AlertSeverity::Low < AlertSeverity::Medium);
    }

    #[test]
    fn test_naive_and_mock_timestamps() {
        let beds: Page<Bed> = serde_json::from_value(json!([
            {"id": 1, "number": "101", "ward": "ICU", "status": "Available", "last_cleaned": "2025-01-16T08:00:00"},
            {"id": 2, "number": "102", "ward": "ICU", "status": "Cleaning", "lastCleaned": "2025-01-16 08:00"}
        ]))
        .unwrap();
        let expected = "2025-01-16T08:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert!(beds.results.iter().all(|bed| bed.last_cleaned == Some(expected)));

        let alert: Alert = serde_json::from_value(json!({
            "id": 1, "severity": "high", "title": "Equipment Check",
            "message": "Ventilator needs maintenance", "timestamp": "2025-01-16 09:15:30.123456"
        }))
        .unwrap();
        assert!(alert.timestamp.is_some());
    }

    #[test]
    fn test_patient_condition_field() {
        let patients: Page<Patient> = serde_json::from_value(json!([
            {"id": 1, "name": "John Doe", "age": 45, "ward": "ICU", "bed_number": "101", "condition": "Critical"},
            {"id": 2, "name": "Jane Smith", "age": 32, "ward": "General", "bed_number": "205"}
        ]))
        .unwrap();
        assert_eq!(patients.results[0].status, PatientStatus::Critical);
        assert_eq!(patients.results[0].bed.as_deref(), Some("101"));
        assert_eq!(patients.results[1].status, PatientStatus::Stable);
    }

    #[test]
    fn test_page_keeps_item_error() {
        let err = serde_json::from_value::<Page<Bed>>(json!({
            "results": [{"id": 1, "number": "101", "ward": "ICU", "status": "Broken"}],
            "next": null
        }))
        .unwrap_err();
        assert!(err.to_string().contains("Broken"), "{}", err);

        let missing = serde_json::from_value::<Page<u32>>(json!({"count": 0})).unwrap_err();
        assert!(missing.to_string().contains("results"));
    }
}
