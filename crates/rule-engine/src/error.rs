//! 规则引擎错误类型
//!
//! 评估过程中的绝大多数异常（字段不存在、类型不匹配、表达式解析失败）都会就地
//! 降级为布尔结果，只有规则级别的结构化拒绝 [`Rejection`] 会返回给调用方。

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::expression::ExpressionError;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("无效的数据: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;

/// 结构化拒绝
///
/// 规则配置了 `error_action` 且数据未通过时返回。`error_msg` 已经按原始记录
/// 渲染完成。`Display` 输出为 JSON，与外部桥接层约定的序列化格式一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub error_msg: String,
    /// 例如 "warning"、"restrict"、"restrict+warning"
    pub error_action: String,
}

impl Rejection {
    pub fn new(error_msg: impl Into<String>, error_action: impl Into<String>) -> Self {
        Self {
            error_msg: error_msg.into(),
            error_action: error_action.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl std::error::Error for Rejection {}
