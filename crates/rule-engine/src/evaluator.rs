//! 条件评估器
//!
//! 实现各操作符的比较逻辑。比较策略由 `(操作符, 左值类型, 右值类型)` 查表得到，
//! 表中没有的组合一律返回 false，不产生错误。

use serde_json::Value;
use std::cmp::Ordering;

use crate::datetime::parse_datetime;
use crate::operators::Operator;
use crate::value::{Kind, as_number, display_string, is_zero};

/// 比较策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// 忽略大小写的字符串比较
    Text,
    /// 跨 int/float 的数值比较
    Numeric,
    /// 两侧字符串均解析为时间后比较
    Temporal,
    Boolean,
    /// 字符串在序列中（忽略大小写）
    TextMembership,
    /// 数值在序列中
    NumericMembership,
    /// 时间闭区间
    TemporalRange,
    /// 数值闭区间
    NumericRange,
    /// 子串、前缀、后缀
    Substring,
}

/// 查找比较策略
pub fn resolve(operator: Operator, left: Kind, right: Kind) -> Option<Comparison> {
    use Kind::*;
    use Operator::*;

    let numeric = left.is_numeric() && right.is_numeric();
    match operator {
        Eq | Neq => match (left, right) {
            (String, String) => Some(Comparison::Text),
            (Boolean, Boolean) => Some(Comparison::Boolean),
            _ if numeric => Some(Comparison::Numeric),
            _ => None,
        },
        Gt | Gte | Lt | Lte => match (left, right) {
            (String, String) => Some(Comparison::Temporal),
            _ if numeric => Some(Comparison::Numeric),
            _ => None,
        },
        Between => match (left, right) {
            (String, Sequence) => Some(Comparison::TemporalRange),
            (l, Sequence) if l.is_numeric() => Some(Comparison::NumericRange),
            _ => None,
        },
        In | NotIn => match (left, right) {
            (String, Sequence) => Some(Comparison::TextMembership),
            (l, Sequence) if l.is_numeric() => Some(Comparison::NumericMembership),
            _ => None,
        },
        Contains | NotContains | StartsWith | EndsWith => match (left, right) {
            (String, String) => Some(Comparison::Substring),
            _ => None,
        },
        IsZero | NotZero | IsNull | NotNull | EqCount | NeqCount | GtCount | LtCount
        | GteCount | LteCount | Unknown => None,
    }
}

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    ///
    /// # Arguments
    /// * `field_value` - 记录中字段的值，`None` 表示字段不存在
    /// * `operator` - 操作符
    /// * `expected_value` - 条件中配置的比较值
    pub fn evaluate(field_value: Option<&Value>, operator: Operator, expected_value: &Value) -> bool {
        // 空值操作符需要区分"字段不存在"与"字段为 null"
        match operator {
            Operator::IsNull => return matches!(field_value, Some(Value::Null)),
            Operator::NotNull => return field_value.is_some(),
            _ => {}
        }

        let Some(field) = field_value else {
            return false;
        };

        if operator.is_count() {
            return Self::count(field, operator, expected_value);
        }

        match operator {
            Operator::IsZero => return is_zero(field),
            Operator::NotZero => return !is_zero(field),
            _ => {}
        }

        let Some(strategy) = resolve(operator, Kind::of(field), Kind::of(expected_value)) else {
            return false;
        };

        match operator {
            Operator::Eq => Self::equals(strategy, field, expected_value),
            Operator::Neq => !Self::equals(strategy, field, expected_value),
            Operator::Gt => Self::order(strategy, field, expected_value).is_some_and(Ordering::is_gt),
            Operator::Gte => Self::order(strategy, field, expected_value).is_some_and(Ordering::is_ge),
            Operator::Lt => Self::order(strategy, field, expected_value).is_some_and(Ordering::is_lt),
            Operator::Lte => Self::order(strategy, field, expected_value).is_some_and(Ordering::is_le),
            Operator::Between => Self::between(strategy, field, expected_value),
            Operator::In => Self::member(strategy, field, expected_value),
            Operator::NotIn => !Self::member(strategy, field, expected_value),
            Operator::Contains => Self::text_pair(field, expected_value, |s, p| s.contains(p)),
            Operator::NotContains => Self::text_pair(field, expected_value, |s, p| !s.contains(p)),
            Operator::StartsWith => Self::text_pair(field, expected_value, |s, p| s.starts_with(p)),
            Operator::EndsWith => Self::text_pair(field, expected_value, |s, p| s.ends_with(p)),
            _ => false,
        }
    }

    fn equals(strategy: Comparison, field: &Value, expected: &Value) -> bool {
        match (strategy, field, expected) {
            (Comparison::Text, Value::String(a), Value::String(b)) => eq_ignore_case(a, b),
            (Comparison::Boolean, Value::Bool(a), Value::Bool(b)) => a == b,
            (Comparison::Numeric, _, _) => match (as_number(field), as_number(expected)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            _ => false,
        }
    }

    fn order(strategy: Comparison, field: &Value, expected: &Value) -> Option<Ordering> {
        match strategy {
            Comparison::Temporal => {
                let left = parse_datetime(field.as_str()?)?;
                let right = parse_datetime(expected.as_str()?)?;
                Some(left.cmp(&right))
            }
            Comparison::Numeric => as_number(field)?.partial_cmp(&as_number(expected)?),
            _ => None,
        }
    }

    /// 闭区间判断，`expected` 必须是两个元素的序列
    fn between(strategy: Comparison, field: &Value, expected: &Value) -> bool {
        let Some([low, high]) = expected.as_array().map(Vec::as_slice) else {
            return false;
        };

        match strategy {
            Comparison::TemporalRange => {
                let parsed = (
                    field.as_str().and_then(parse_datetime),
                    low.as_str().and_then(parse_datetime),
                    high.as_str().and_then(parse_datetime),
                );
                match parsed {
                    (Some(v), Some(lo), Some(hi)) => lo <= v && v <= hi,
                    _ => false,
                }
            }
            Comparison::NumericRange => match (as_number(field), as_number(low), as_number(high)) {
                (Some(v), Some(lo), Some(hi)) => lo <= v && v <= hi,
                _ => false,
            },
            _ => false,
        }
    }

    fn member(strategy: Comparison, field: &Value, expected: &Value) -> bool {
        let Some(items) = expected.as_array() else {
            return false;
        };
        match (strategy, field) {
            (Comparison::TextMembership, Value::String(needle)) => items.iter().any(|item| match item {
                Value::String(s) => eq_ignore_case(needle, s),
                Value::Number(_) | Value::Bool(_) => eq_ignore_case(needle, &display_string(item)),
                _ => false,
            }),
            (Comparison::NumericMembership, _) => {
                let Some(needle) = as_number(field) else {
                    return false;
                };
                items.iter().any(|item| match item {
                    Value::Number(n) => n.as_f64() == Some(needle),
                    Value::String(s) => s.trim().parse::<f64>().ok() == Some(needle),
                    _ => false,
                })
            }
            _ => false,
        }
    }

    fn text_pair(field: &Value, expected: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
        match (field.as_str(), expected.as_str()) {
            (Some(s), Some(p)) => test(s, p),
            _ => false,
        }
    }

    /// 数量比较
    ///
    /// 标量视为单元素序列，null 不参与比较。长度为 0 时任何数量操作符都不成立。
    fn count(field: &Value, operator: Operator, expected: &Value) -> bool {
        let len = match field {
            Value::Array(items) => items.len(),
            Value::Null => return false,
            _ => 1,
        };
        if len == 0 {
            return false;
        }
        let Some(target) = expected_count(expected) else {
            return false;
        };
        let len = len as i64;

        match operator {
            Operator::EqCount => len == target,
            Operator::NeqCount => len != target,
            Operator::GtCount => len > target,
            Operator::LtCount => len < target,
            Operator::GteCount => len >= target,
            Operator::LteCount => len <= target,
            _ => false,
        }
    }
}

/// 比较值对应的期望数量：序列取长度，其余取整数形式
fn expected_count(expected: &Value) -> Option<i64> {
    match expected {
        Value::Array(items) => i64::try_from(items.len()).ok(),
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}
