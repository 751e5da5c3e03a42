use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

use super::Scope;
use super::ast::{CompareOp, Expr};
use super::error::ExpressionError;
use crate::datetime::parse_datetime;
use crate::path;
use crate::value::{display_string, is_truthy, loose_eq};

/// 对语法树求值
///
/// 行上缺失的字段与记录中缺失的路径均求值为 null。
pub(super) fn evaluate(expr: &Expr, row: &Value, scope: &Scope<'_>) -> Result<Value, ExpressionError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Field(name) => Ok(lookup(row, name)),
        Expr::Record(path) => Ok(lookup(scope.record, path)),
        Expr::List(items) => items
            .iter()
            .map(|item| evaluate(item, row, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Call { name, args } => {
            let function = scope
                .functions
                .get(name)
                .ok_or_else(|| ExpressionError::UnknownFunction(name.clone()))?;
            let args = args
                .iter()
                .map(|arg| evaluate(arg, row, scope))
                .collect::<Result<Vec<_>, _>>()?;
            function(&args)
        }
        Expr::Compare { op, left, right } => {
            let left = evaluate(left, row, scope)?;
            let right = evaluate(right, row, scope)?;
            Ok(Value::Bool(compare(*op, &left, &right)))
        }
        Expr::Not(inner) => Ok(Value::Bool(!is_truthy(&evaluate(inner, row, scope)?))),
        Expr::And(left, right) => {
            if !is_truthy(&evaluate(left, row, scope)?) {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(is_truthy(&evaluate(right, row, scope)?)))
        }
        Expr::Or(left, right) => {
            if is_truthy(&evaluate(left, row, scope)?) {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(is_truthy(&evaluate(right, row, scope)?)))
        }
    }
}

fn lookup(value: &Value, path: &str) -> Value {
    path::get(value, path)
        .map(Cow::into_owned)
        .unwrap_or(Value::Null)
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> bool {
    match op {
        CompareOp::Eq => lenient_eq(left, right),
        CompareOp::Neq => !lenient_eq(left, right),
        CompareOp::Gt => ordering(left, right) == Some(Ordering::Greater),
        CompareOp::Gte => matches!(
            ordering(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::Lt => ordering(left, right) == Some(Ordering::Less),
        CompareOp::Lte => matches!(
            ordering(left, right),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::In => membership(left, right),
        CompareOp::NotIn => !membership(left, right),
    }
}

/// 数字与数字字符串按数值比较
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_eq(left: &Value, right: &Value) -> bool {
    if loose_eq(left, right) {
        return true;
    }
    match (left, right) {
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            matches!((numeric(left), numeric(right)), (Some(a), Some(b)) if a == b)
        }
        _ => false,
    }
}

fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (numeric(left), numeric(right)) {
        return a.partial_cmp(&b);
    }
    let (Value::String(a), Value::String(b)) = (left, right) else {
        return None;
    };
    match (parse_datetime(a), parse_datetime(b)) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        _ => Some(a.cmp(b)),
    }
}

fn membership(needle: &Value, haystack: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| lenient_eq(needle, item)),
        Value::String(s) => !needle.is_null() && s.contains(display_string(needle).as_str()),
        Value::Object(map) => map.contains_key(display_string(needle).as_str()),
        _ => false,
    }
}
