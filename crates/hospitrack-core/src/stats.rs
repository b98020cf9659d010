//! 看板统计
//!
//! 服务器汇总接口的响应结构，以及基于本地缓存计算的派生统计。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Alert, Bed, BedStatus, Patient, PatientStatus, WardScoped};
use crate::utils::lenient_timestamp;

/// 系统总览
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemStats {
    pub total_patients: u64,
    pub available_beds: u64,
    pub total_beds: u64,
    pub emergency_alerts: u64,
    pub staff_on_duty: u64,
    pub total_staff: u64,
    pub system_uptime: Option<String>,
    pub avg_response_time: Option<String>,
}

/// 床位占用
///
/// 后端有两种格式：整体汇总，或按病区给出 `{icu: {total, occupied, available}}`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BedOccupancy {
    Summary(OccupancySummary),
    ByWard(BTreeMap<String, WardOccupancy>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancySummary {
    pub occupancy_rate: f64,
    pub available_beds: u64,
    pub occupied_beds: u64,
    pub total_beds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardOccupancy {
    pub total: u64,
    pub occupied: u64,
    pub available: u64,
}

impl BedOccupancy {
    /// 全院合计
    pub fn totals(&self) -> WardOccupancy {
        match self {
            BedOccupancy::Summary(summary) => WardOccupancy {
                total: summary.total_beds,
                occupied: summary.occupied_beds,
                available: summary.available_beds,
            },
            BedOccupancy::ByWard(wards) => wards.values().fold(
                WardOccupancy { total: 0, occupied: 0, available: 0 },
                |acc, ward| WardOccupancy {
                    total: acc.total + ward.total,
                    occupied: acc.occupied + ward.occupied,
                    available: acc.available + ward.available,
                },
            ),
        }
    }

    /// 占用率（百分比）；汇总格式直接使用服务器给出的值
    pub fn occupancy_rate(&self) -> f64 {
        match self {
            BedOccupancy::Summary(summary) => summary.occupancy_rate,
            BedOccupancy::ByWard(_) => {
                let totals = self.totals();
                if totals.total == 0 {
                    0.0
                } else {
                    totals.occupied as f64 * 100.0 / totals.total as f64
                }
            }
        }
    }
}

/// 患者统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientStats {
    pub total_patients: u64,
    pub critical_patients: u64,
    pub stable_patients: u64,
    pub discharges_today: u64,
}

/// 告警统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertStats {
    pub total_alerts: u64,
    pub critical_alerts: u64,
    pub unresolved_alerts: u64,
    pub acknowledged_alerts: u64,
}

/// 门诊预约量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpdStats {
    pub today: u64,
    pub yesterday: u64,
    pub this_week: u64,
    pub last_week: u64,
    pub this_month: u64,
    pub last_month: u64,
}

impl OpdStats {
    /// 周环比增长（百分比），上周为0时为0
    pub fn weekly_growth(&self) -> f64 {
        if self.last_week == 0 {
            0.0
        } else {
            (self.this_week as f64 - self.last_week as f64) * 100.0 / self.last_week as f64
        }
    }
}

/// 最近动态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Option<u64>,
    #[serde(rename = "type", alias = "kind")]
    pub kind: Option<String>,
    pub description: String,
    pub actor: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// 按床位状态汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BedStats {
    pub total: usize,
    pub available: usize,
    pub occupied: usize,
    pub cleaning: usize,
    pub maintenance: usize,
}

impl BedStats {
    pub fn from_beds(beds: &[Bed]) -> Self {
        beds.iter().fold(Self::default(), |mut stats, bed| {
            stats.total += 1;
            match bed.status {
                BedStatus::Available => stats.available += 1,
                BedStatus::Occupied => stats.occupied += 1,
                BedStatus::Cleaning => stats.cleaning += 1,
                BedStatus::Maintenance => stats.maintenance += 1,
            }
            stats
        })
    }

    /// 占用率（百分比）
    pub fn occupancy_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.occupied as f64 * 100.0 / self.total as f64
        }
    }
}

/// 未解决的告警数
pub fn active_alert_count(alerts: &[Alert]) -> usize {
    alerts.iter().filter(|alert| !alert.resolved).count()
}

/// 未确认的告警数
pub fn pending_alert_count(alerts: &[Alert]) -> usize {
    alerts.iter().filter(|alert| !alert.acknowledged).count()
}

pub fn critical_patient_count(patients: &[Patient]) -> usize {
    patients
        .iter()
        .filter(|patient| patient.status == PatientStatus::Critical)
        .count()
}

pub fn pending_transfer_requests(patients: &[Patient]) -> usize {
    patients.iter().filter(|patient| patient.transfer_requested).count()
}

/// 按病区过滤（忽略大小写），`all` 表示不过滤
pub fn filter_by_ward<'a, T: WardScoped>(items: &'a [T], ward: &str) -> Vec<&'a T> {
    if ward.eq_ignore_ascii_case("all") {
        return items.iter().collect();
    }
    items
        .iter()
        .filter(|item| item.ward().is_some_and(|w| w.eq_ignore_ascii_case(ward)))
        .collect()
}
