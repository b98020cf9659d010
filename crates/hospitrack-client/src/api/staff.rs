//! 医护人员接口

use hospitrack_core::{EntityId, Page, Result, ShiftSchedule, StaffMember, UserRole};

use super::{action_path, item_path};
use crate::request::{ApiRequest, QueryParams};

const COLLECTION: &str = "staff";

pub fn list(params: &QueryParams) -> ApiRequest<Page<StaffMember>> {
    ApiRequest::get("/staff/").with_params(params)
}

pub fn get(id: EntityId) -> ApiRequest<StaffMember> {
    ApiRequest::get(item_path(COLLECTION, id))
}

pub fn by_role(role: UserRole) -> ApiRequest<Page<StaffMember>> {
    list(&QueryParams::new().with("role", role))
}

pub fn update_schedule(id: EntityId, schedule: &ShiftSchedule) -> Result<ApiRequest<StaffMember>> {
    ApiRequest::patch(action_path(COLLECTION, id, "schedule")).with_json(schedule)
}

pub fn on_duty() -> ApiRequest<Page<StaffMember>> {
    list(&QueryParams::new().with("on_duty", true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staff_filters() {
        assert_eq!(by_role(UserRole::Nurse).to_string(), "GET /staff/?role=nurse");
        assert_eq!(on_duty().to_string(), "GET /staff/?on_duty=true");
        assert_eq!(update_schedule(5, &ShiftSchedule::default()).unwrap().path(), "/staff/5/schedule/");
    }
}
