//! # HospiTrack Core
//!
//! 医院运营看板的核心模块，提供实体模型、错误定义、表单校验和统计工具。

pub mod error;
pub mod models;
pub mod stats;
pub mod utils;
pub mod validation;

pub use error::{
    normalize_error_message, ErrorKind, HospitalError, Result, DEFAULT_ERROR_MESSAGE, SESSION_EXPIRED_MESSAGE,
};
pub use models::*;
pub use validation::{PatientRegistrationForm, ValidationErrors};
