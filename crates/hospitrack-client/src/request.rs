//! 请求描述
//!
//! 领域接口只负责生成 (方法, 路径, 请求体, 查询参数)，真正的发送由 [`crate::ApiClient`] 完成。

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use hospitrack_core::Result;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 有序查询参数，保证同样的过滤条件总是产生同样的参数串
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub const PAGE: &'static str = "page";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// 合并参数，后者覆盖前者
    pub fn merge(&mut self, other: &QueryParams) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn page(&self) -> Option<u32> {
        self.get(Self::PAGE).and_then(|page| page.parse().ok())
    }

    pub fn set_page(&mut self, page: u32) {
        self.insert(Self::PAGE, page);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.0 {
            write!(f, "{}{}={}", if first { "" } else { "&" }, key, value)?;
            first = false;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// 一次接口调用的完整描述，`T` 为期望的响应类型
pub struct ApiRequest<T> {
    method: Method,
    path: String,
    body: Option<Value>,
    params: QueryParams,
    _response: PhantomData<fn() -> T>,
}

impl<T> ApiRequest<T> {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            params: QueryParams::new(),
            _response: PhantomData,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// 序列化类型化的请求体
    pub fn with_json<B: Serialize>(self, body: &B) -> Result<Self> {
        Ok(self.with_body(serde_json::to_value(body)?))
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key, value);
        self
    }

    pub fn with_params(mut self, params: &QueryParams) -> Self {
        self.params.merge(params);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    /// 改变期望的响应类型
    pub fn expecting<U>(self) -> ApiRequest<U> {
        ApiRequest {
            method: self.method,
            path: self.path,
            body: self.body,
            params: self.params,
            _response: PhantomData,
        }
    }
}

impl<T> Clone for ApiRequest<T> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            path: self.path.clone(),
            body: self.body.clone(),
            params: self.params.clone(),
            _response: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ApiRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body", &self.body)
            .field("params", &self.params)
            .finish()
    }
}

impl<T> fmt::Display for ApiRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "{} {}", self.method, self.path)
        } else {
            write!(f, "{} {}?{}", self.method, self.path, self.params)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_are_canonical() {
        let a = QueryParams::new().with("ward", "ICU").with("status", "available");
        let b = QueryParams::new().with("status", "available").with("ward", "ICU");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "status=available&ward=ICU");
    }

    #[test]
    fn test_merge_overrides_and_page() {
        let mut params = QueryParams::new().with("ward", "ICU").with("page", 3);
        params.merge(&QueryParams::new().with("ward", "General"));
        assert_eq!(params.get("ward"), Some("General"));
        assert_eq!(params.page(), Some(3));

        params.set_page(1);
        assert_eq!(params.page(), Some(1));
    }

    #[test]
    fn test_request_display() {
        let request: ApiRequest<Value> = ApiRequest::get("/alerts/").with_param("resolved", false);
        assert_eq!(request.to_string(), "GET /alerts/?resolved=false");
    }
}
