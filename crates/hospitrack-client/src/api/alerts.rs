//! 紧急告警接口

use hospitrack_core::{Alert, AlertSeverity, EntityId, NewAlert, Page, Result};
use serde_json::json;

use super::{action_path, item_path};
use crate::request::{ApiRequest, QueryParams};

const COLLECTION: &str = "alerts";

pub fn list(params: &QueryParams) -> ApiRequest<Page<Alert>> {
    ApiRequest::get("/alerts/").with_params(params)
}

pub fn get(id: EntityId) -> ApiRequest<Alert> {
    ApiRequest::get(item_path(COLLECTION, id))
}

pub fn create(alert: &NewAlert) -> Result<ApiRequest<Alert>> {
    ApiRequest::post("/alerts/").with_json(alert)
}

pub fn update(id: EntityId, alert: &Alert) -> Result<ApiRequest<Alert>> {
    ApiRequest::put(item_path(COLLECTION, id)).with_json(alert)
}

pub fn acknowledge(id: EntityId, acknowledged_by: &str) -> ApiRequest<Alert> {
    ApiRequest::patch(action_path(COLLECTION, id, "acknowledge"))
        .with_body(json!({ "acknowledged_by": acknowledged_by }))
}

pub fn resolve(id: EntityId, resolved_by: &str, resolution: &str) -> ApiRequest<Alert> {
    ApiRequest::patch(action_path(COLLECTION, id, "resolve"))
        .with_body(json!({ "resolved_by": resolved_by, "resolution": resolution }))
}

pub fn by_ward_params(ward: &str) -> QueryParams {
    QueryParams::new().with("ward", ward)
}

pub fn by_ward(ward: &str) -> ApiRequest<Page<Alert>> {
    list(&by_ward_params(ward))
}

pub fn unresolved_params() -> QueryParams {
    QueryParams::new().with("resolved", false)
}

pub fn unresolved() -> ApiRequest<Page<Alert>> {
    list(&unresolved_params())
}

pub fn by_severity_params(severity: AlertSeverity) -> QueryParams {
    QueryParams::new().with("severity", severity)
}

pub fn by_severity(severity: AlertSeverity) -> ApiRequest<Page<Alert>> {
    list(&by_severity_params(severity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_body() {
        let request = resolve(3, "Dr. Smith", "Oxygen restored");
        assert_eq!(request.path(), "/alerts/3/resolve/");
        assert_eq!(
            request.body().unwrap(),
            &json!({"resolved_by": "Dr. Smith", "resolution": "Oxygen restored"})
        );
    }

    #[test]
    fn test_filters() {
        assert_eq!(unresolved().to_string(), "GET /alerts/?resolved=false");
        assert_eq!(by_severity(AlertSeverity::Critical).params().get("severity"), Some("critical"));
    }
}
