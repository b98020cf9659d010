//! 看板统计接口

use hospitrack_core::stats::{ActivityEntry, AlertStats, BedOccupancy, OpdStats, PatientStats, SystemStats};
use hospitrack_core::Page;

use crate::request::ApiRequest;

pub fn system_stats() -> ApiRequest<SystemStats> {
    ApiRequest::get("/dashboard/system-stats/")
}

pub fn bed_occupancy() -> ApiRequest<BedOccupancy> {
    ApiRequest::get("/dashboard/bed-occupancy/")
}

pub fn patient_stats() -> ApiRequest<PatientStats> {
    ApiRequest::get("/dashboard/patient-stats/")
}

pub fn alert_stats() -> ApiRequest<AlertStats> {
    ApiRequest::get("/dashboard/alert-stats/")
}

pub fn opd_stats() -> ApiRequest<OpdStats> {
    ApiRequest::get("/dashboard/opd-stats/")
}

pub fn recent_activity() -> ApiRequest<Page<ActivityEntry>> {
    ApiRequest::get("/dashboard/recent-activity/")
}
