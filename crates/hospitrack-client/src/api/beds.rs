//! 床位接口

use hospitrack_core::{Bed, BedCleaningUpdate, BedStatus, EntityId, Page, Result};
use serde_json::json;

use super::{action_path, item_path};
use crate::request::{ApiRequest, QueryParams};

const COLLECTION: &str = "beds";

pub fn list(params: &QueryParams) -> ApiRequest<Page<Bed>> {
    ApiRequest::get("/beds/").with_params(params)
}

pub fn get(id: EntityId) -> ApiRequest<Bed> {
    ApiRequest::get(item_path(COLLECTION, id))
}

pub fn update_status(id: EntityId, status: BedStatus) -> ApiRequest<Bed> {
    ApiRequest::patch(action_path(COLLECTION, id, "status")).with_body(json!({ "status": status }))
}

pub fn by_ward_params(ward: &str) -> QueryParams {
    QueryParams::new().with("ward", ward)
}

pub fn by_ward(ward: &str) -> ApiRequest<Page<Bed>> {
    list(&by_ward_params(ward))
}

pub fn available_params() -> QueryParams {
    QueryParams::new().with("status", BedStatus::Available.as_query_value())
}

pub fn available() -> ApiRequest<Page<Bed>> {
    list(&available_params())
}

pub fn assign_patient(bed_id: EntityId, patient_id: EntityId) -> ApiRequest<Bed> {
    ApiRequest::post(action_path(COLLECTION, bed_id, "assign")).with_body(json!({ "patient_id": patient_id }))
}

pub fn release_patient(bed_id: EntityId) -> ApiRequest<Bed> {
    ApiRequest::post(action_path(COLLECTION, bed_id, "release"))
}

pub fn update_cleaning(bed_id: EntityId, update: &BedCleaningUpdate) -> Result<ApiRequest<Bed>> {
    ApiRequest::patch(action_path(COLLECTION, bed_id, "cleaning")).with_json(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;

    #[test]
    fn test_assign_and_release() {
        let assign = assign_patient(2, 9);
        assert_eq!(assign.method(), &Method::POST);
        assert_eq!(assign.path(), "/beds/2/assign/");
        assert_eq!(assign.body().unwrap()["patient_id"], 9);

        let release = release_patient(2);
        assert_eq!(release.path(), "/beds/2/release/");
        assert!(release.body().is_none());
    }

    #[test]
    fn test_available_filter_is_lowercase() {
        assert_eq!(available().to_string(), "GET /beds/?status=available");
    }
}
