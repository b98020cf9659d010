//! 认证接口

use hospitrack_core::{
    HospitalError, LoginRequest, LoginResponse, RegisterRequest, RegistrationPayload, Result,
    TokenRefreshResponse, UserRole,
};
use serde_json::{json, Value};
use tracing::warn;

use crate::request::ApiRequest;

pub fn login(credentials: &LoginRequest) -> Result<ApiRequest<LoginResponse>> {
    ApiRequest::post("/auth/login/").with_json(credentials)
}

/// 按 `role` 字段选择注册端点，请求体中不携带角色
pub fn register(request: &RegisterRequest) -> Result<ApiRequest<Value>> {
    let role: UserRole = request.role.parse().map_err(|e: HospitalError| {
        warn!(role = %request.role, "Registration rejected before sending");
        e
    })?;
    register_as(role, &request.payload())
}

pub fn register_as(role: UserRole, payload: &RegistrationPayload) -> Result<ApiRequest<Value>> {
    ApiRequest::post(format!("/auth/{}/register/", role)).with_json(payload)
}

pub fn register_admin(payload: &RegistrationPayload) -> Result<ApiRequest<Value>> {
    register_as(UserRole::Admin, payload)
}

pub fn register_doctor(payload: &RegistrationPayload) -> Result<ApiRequest<Value>> {
    register_as(UserRole::Doctor, payload)
}

pub fn register_nurse(payload: &RegistrationPayload) -> Result<ApiRequest<Value>> {
    register_as(UserRole::Nurse, payload)
}

pub fn logout() -> ApiRequest<Value> {
    ApiRequest::post("/auth/logout/")
}

pub fn refresh_token(refresh: &str) -> ApiRequest<TokenRefreshResponse> {
    ApiRequest::post("/auth/refresh/").with_body(json!({ "refresh": refresh }))
}

/// 当前登录用户的角色档案
pub fn profile(role: UserRole) -> ApiRequest<Value> {
    ApiRequest::get(format!("/auth/{}/profile/", role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;

    fn signup(role: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Nurse Joy".to_string(),
            email: "joy@x.com".to_string(),
            password: "secret".to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn test_register_dispatches_on_role() {
        let request = register(&signup("nurse")).unwrap();
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.path(), "/auth/nurse/register/");

        let body = request.body().unwrap();
        assert_eq!(body["email"], "joy@x.com");
        assert!(body.get("role").is_none());
    }

    #[test]
    fn test_register_rejects_unknown_role() {
        let err = register(&signup("janitor")).unwrap_err();
        assert!(matches!(err, HospitalError::InvalidRole(role) if role == "janitor"));
    }

    #[test]
    fn test_refresh_and_profile_paths() {
        assert_eq!(refresh_token("r1").body().unwrap()["refresh"], "r1");
        assert_eq!(profile(UserRole::Doctor).path(), "/auth/doctor/profile/");
    }
}
