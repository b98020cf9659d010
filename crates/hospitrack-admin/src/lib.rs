//! HospiTrack 运行配置
//!
//! 分层配置加载、校验与日志初始化，供命令行和演示程序共用。

pub mod config;
pub mod logging;

pub use config::{
    BackendConfig, ConfigManager, ConfigValidator, CorsConfig, HospitrackConfig, LoggingConfig, PollingConfig,
};
pub use logging::{init_logging, LogFormat};
