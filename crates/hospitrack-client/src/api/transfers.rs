//! 转床申请接口

use hospitrack_core::{EntityId, NewTransfer, Page, Result, Transfer, TransferStatus};
use serde_json::json;

use super::action_path;
use crate::request::{ApiRequest, QueryParams};

const COLLECTION: &str = "transfers";

pub fn list(params: &QueryParams) -> ApiRequest<Page<Transfer>> {
    ApiRequest::get("/transfers/").with_params(params)
}

pub fn create(transfer: &NewTransfer) -> Result<ApiRequest<Transfer>> {
    ApiRequest::post("/transfers/").with_json(transfer)
}

pub fn approve(id: EntityId, approved_by: &str) -> ApiRequest<Transfer> {
    ApiRequest::patch(action_path(COLLECTION, id, "approve")).with_body(json!({ "approved_by": approved_by }))
}

pub fn reject(id: EntityId, rejected_by: &str, reason: &str) -> ApiRequest<Transfer> {
    ApiRequest::patch(action_path(COLLECTION, id, "reject"))
        .with_body(json!({ "rejected_by": rejected_by, "reason": reason }))
}

pub fn pending_params() -> QueryParams {
    QueryParams::new().with("status", TransferStatus::Pending)
}

pub fn pending() -> ApiRequest<Page<Transfer>> {
    list(&pending_params())
}
