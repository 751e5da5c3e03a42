//! 动态值的类型分类
//!
//! 记录中的值统一使用 `serde_json::Value` 存储，比较时先归类为 [`Kind`]，
//! 再由评估器按 `(操作符, 左值类型, 右值类型)` 查表选择比较策略。

use serde_json::Value;

/// 值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    String,
    Integer,
    Float,
    Boolean,
    Null,
    Sequence,
    Mapping,
}

impl Kind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => Self::String,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Float,
            Value::Bool(_) => Self::Boolean,
            Value::Null => Self::Null,
            Value::Array(_) => Self::Sequence,
            Value::Object(_) => Self::Mapping,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
        }
    }
}

/// 数值统一转为 f64，字符串不做隐式转换
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// 数值跨 int/float 相等，其余类型按结构相等
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// 是否为该类型的零值
///
/// 空序列与空映射同样视为零值。
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(arr) => arr.is_empty(),
        Value::Object(obj) => obj.is_empty(),
    }
}

/// 表达式求值中的真值判断
pub fn is_truthy(value: &Value) -> bool {
    !is_zero(value)
}

/// 值的字符串形式：字符串原样输出，其余使用 JSON 文本
pub fn display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
