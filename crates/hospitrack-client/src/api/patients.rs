//! 患者接口

use hospitrack_core::{EntityId, NewPatient, Page, Patient, PatientNotesUpdate, Result, VitalSigns};
use serde_json::Value;

use super::{action_path, item_path};
use crate::request::{ApiRequest, QueryParams};

const COLLECTION: &str = "patients";

pub fn list(params: &QueryParams) -> ApiRequest<Page<Patient>> {
    ApiRequest::get("/patients/").with_params(params)
}

pub fn get(id: EntityId) -> ApiRequest<Patient> {
    ApiRequest::get(item_path(COLLECTION, id))
}

pub fn create(patient: &NewPatient) -> Result<ApiRequest<Patient>> {
    ApiRequest::post("/patients/").with_json(patient)
}

pub fn update(id: EntityId, patient: &Patient) -> Result<ApiRequest<Patient>> {
    ApiRequest::put(item_path(COLLECTION, id)).with_json(patient)
}

/// 出院
pub fn delete(id: EntityId) -> ApiRequest<Value> {
    ApiRequest::delete(item_path(COLLECTION, id))
}

pub fn by_ward_params(ward: &str) -> QueryParams {
    QueryParams::new().with("ward", ward)
}

pub fn by_ward(ward: &str) -> ApiRequest<Page<Patient>> {
    list(&by_ward_params(ward))
}

pub fn update_vital_signs(id: EntityId, vitals: &VitalSigns) -> Result<ApiRequest<Patient>> {
    ApiRequest::patch(action_path(COLLECTION, id, "vital-signs")).with_json(vitals)
}

pub fn update_notes(id: EntityId, update: &PatientNotesUpdate) -> Result<ApiRequest<Patient>> {
    ApiRequest::patch(action_path(COLLECTION, id, "notes")).with_json(update)
}
