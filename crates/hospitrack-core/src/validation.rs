//! 表单校验
//!
//! 校验只在客户端进行，失败的表单不会发往服务器。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HospitalError, Result};
use crate::models::{LoginRequest, NewPatient, RegisterRequest};
use crate::utils::{is_valid_phone, non_blank};

/// 字段名 -> 错误文案
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.insert(field.to_string(), message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 无错误时返回 Ok
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(HospitalError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

/// 患者登记表单（原始输入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRegistrationForm {
    pub full_name: String,
    pub age: String,
    pub ward: String,
    pub condition_notes: String,
    pub emergency_contact: String,
    pub contact_phone: String,
    pub blood_group: String,
    pub allergies: String,
    pub admission_type: String,
}

impl Default for PatientRegistrationForm {
    fn default() -> Self {
        Self {
            full_name: String::new(),
            age: String::new(),
            ward: String::new(),
            condition_notes: String::new(),
            emergency_contact: String::new(),
            contact_phone: String::new(),
            blood_group: String::new(),
            allergies: String::new(),
            admission_type: "regular".to_string(),
        }
    }
}

impl PatientRegistrationForm {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();

        let name = self.full_name.trim();
        if name.is_empty() {
            errors.add("full_name", "Full name is required");
        } else if name.chars().count() < 2 {
            errors.add("full_name", "Name must be at least 2 characters");
        }

        let age = self.age.trim();
        if age.is_empty() {
            errors.add("age", "Age is required");
        } else if !matches!(age.parse::<i64>(), Ok(value) if (0..=150).contains(&value)) {
            errors.add("age", "Please enter a valid age");
        }

        if self.ward.trim().is_empty() {
            errors.add("ward", "Please select a ward");
        }

        let notes = self.condition_notes.trim();
        if notes.is_empty() {
            errors.add("condition_notes", "Condition notes are required");
        } else if notes.chars().count() < 10 {
            errors.add("condition_notes", "Please provide more detailed condition notes");
        }

        if self.emergency_contact.trim().is_empty() {
            errors.add("emergency_contact", "Emergency contact name is required");
        }

        let phone = self.contact_phone.trim();
        if phone.is_empty() {
            errors.add("contact_phone", "Contact phone is required");
        } else if !is_valid_phone(phone) {
            errors.add("contact_phone", "Please enter a valid 10-digit phone number");
        }

        if !errors.is_empty() {
            debug!(fields = errors.len(), "Patient registration form rejected");
        }
        errors.into_result()
    }

    /// 校验并转换为登记请求体
    pub fn into_new_patient(self) -> Result<NewPatient> {
        self.validate()?;

        let age = self
            .age
            .trim()
            .parse::<u32>()
            .map_err(|_| HospitalError::Validation(ValidationErrors::single("age", "Please enter a valid age")))?;

        Ok(NewPatient {
            name: self.full_name.trim().to_string(),
            age,
            ward: self.ward.trim().to_string(),
            condition_notes: self.condition_notes.trim().to_string(),
            emergency_contact: self.emergency_contact.trim().to_string(),
            contact_phone: self.contact_phone.trim().to_string(),
            blood_group: non_blank(&self.blood_group),
            allergies: non_blank(&self.allergies),
            admission_type: non_blank(&self.admission_type).unwrap_or_else(|| "regular".to_string()),
        })
    }
}

/// 注册表单：所有字段必填
pub fn validate_signup(request: &RegisterRequest) -> Result<()> {
    let mut errors = ValidationErrors::new();
    for (field, value) in [
        ("name", &request.name),
        ("email", &request.email),
        ("password", &request.password),
        ("role", &request.role),
    ] {
        if value.trim().is_empty() {
            errors.add(field, "Please fill in all fields");
        }
    }
    errors.into_result()
}

/// 登录表单：邮箱和密码必填
pub fn validate_login(request: &LoginRequest) -> Result<()> {
    let mut errors = ValidationErrors::new();
    if request.email.trim().is_empty() {
        errors.add("email", "Email is required");
    }
    if request.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.into_result()
}
