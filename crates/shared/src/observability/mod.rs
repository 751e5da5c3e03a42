//! 可观测性模块
//!
//! 所有二进制通过单一入口初始化日志输出。

pub mod tracing;

use ::tracing::info;
use anyhow::Result;

pub use crate::config::ObservabilityConfig;

/// 初始化日志
///
/// `RUST_LOG` 存在时优先于配置中的日志级别。
///
/// # Example
///
/// ```ignore
/// use rules_shared::config::AppConfig;
/// use rules_shared::observability;
///
/// fn main() -> anyhow::Result<()> {
///     let config = AppConfig::load("rule-engine")?;
///     observability::init(&config.service_name, &config.observability)?;
///     Ok(())
/// }
/// ```
pub fn init(service_name: &str, config: &ObservabilityConfig) -> Result<()> {
    tracing::init(config)?;

    info!(
        service = %service_name,
        log_level = %config.log_level,
        log_format = %config.log_format,
        "Observability initialized"
    );
    Ok(())
}
