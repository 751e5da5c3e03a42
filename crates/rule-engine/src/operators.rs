//! 规则操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 条件操作符
///
/// 未知的操作符字符串反序列化为 [`Operator::Unknown`]，评估结果恒为 false。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    // 通用比较
    Eq,
    Neq,

    // 数值 / 时间比较
    Gt,
    Lt,
    Gte,
    Lte,
    Between,

    // 包含检查
    In,
    NotIn,

    // 字符串操作
    Contains,
    NotContains,
    StartsWith,
    EndsWith,

    // 零值与空值
    IsZero,
    NotZero,
    IsNull,
    NotNull,

    // 数量比较
    EqCount,
    NeqCount,
    GtCount,
    LtCount,
    GteCount,
    LteCount,

    #[serde(other)]
    Unknown,
}

impl Operator {
    /// 是否为数量比较操作符
    pub fn is_count(self) -> bool {
        matches!(
            self,
            Self::EqCount
                | Self::NeqCount
                | Self::GtCount
                | Self::LtCount
                | Self::GteCount
                | Self::LteCount
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::Between => "between",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::IsZero => "is_zero",
            Self::NotZero => "not_zero",
            Self::IsNull => "is_null",
            Self::NotNull => "not_null",
            Self::EqCount => "eq_count",
            Self::NeqCount => "neq_count",
            Self::GtCount => "gt_count",
            Self::LtCount => "lt_count",
            Self::GteCount => "gte_count",
            Self::LteCount => "lte_count",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// 逻辑操作符
///
/// `Not` 仅作为构造辅助保留，求值时等同于 `And`。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinOperator {
    #[default]
    And,
    Or,
    Not,
}

impl JoinOperator {
    /// 折叠的初始值：AND 为 true，OR 为 false
    pub fn seed(self) -> bool {
        !matches!(self, Self::Or)
    }

    /// 使用当前操作符合并两个结果
    pub fn combine(self, acc: bool, next: bool) -> bool {
        match self {
            Self::And | Self::Not => acc && next,
            Self::Or => acc || next,
        }
    }
}

impl fmt::Display for JoinOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
            Self::Not => write!(f, "NOT"),
        }
    }
}
