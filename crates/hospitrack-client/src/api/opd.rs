//! 门诊接口

use chrono::NaiveDate;
use hospitrack_core::{Appointment, AppointmentRequest, EntityId, OpdSchedule, Page, Result};

use super::{action_path, item_path};
use crate::request::{ApiRequest, QueryParams};

const APPOINTMENTS: &str = "opd/appointments";

fn date_params(date: Option<NaiveDate>) -> QueryParams {
    let mut params = QueryParams::new();
    if let Some(date) = date {
        params.insert("date", date.format("%Y-%m-%d"));
    }
    params
}

pub fn schedule(date: Option<NaiveDate>) -> ApiRequest<OpdSchedule> {
    ApiRequest::get("/opd/schedule/").with_params(&date_params(date))
}

pub fn appointments(params: &QueryParams) -> ApiRequest<Page<Appointment>> {
    ApiRequest::get("/opd/appointments/").with_params(params)
}

pub fn create_appointment(appointment: &AppointmentRequest) -> Result<ApiRequest<Appointment>> {
    ApiRequest::post("/opd/appointments/").with_json(appointment)
}

pub fn update_appointment(id: EntityId, appointment: &AppointmentRequest) -> Result<ApiRequest<Appointment>> {
    ApiRequest::put(item_path(APPOINTMENTS, id)).with_json(appointment)
}

pub fn cancel_appointment(id: EntityId) -> ApiRequest<Appointment> {
    ApiRequest::patch(action_path(APPOINTMENTS, id, "cancel"))
}

pub fn doctor_schedule(doctor_id: EntityId, date: Option<NaiveDate>) -> ApiRequest<OpdSchedule> {
    ApiRequest::get(format!("/opd/doctors/{}/schedule/", doctor_id)).with_params(&date_params(date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_date_is_optional() {
        assert_eq!(schedule(None).to_string(), "GET /opd/schedule/");

        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert_eq!(
            doctor_schedule(2, Some(date)).to_string(),
            "GET /opd/doctors/2/schedule/?date=2025-01-15"
        );
    }

    #[test]
    fn test_cancel_path() {
        let request = cancel_appointment(11);
        assert_eq!(request.method(), &reqwest::Method::PATCH);
        assert_eq!(request.path(), "/opd/appointments/11/cancel/");
    }
}
