//! 路径访问
//!
//! 支持点号分隔的路径（如 `user.profile.age`）、数组下标（如 `items.0.name`）
//! 以及数组通配段（如 `items.[].code`，收集每个元素上的 `code`）。
//! 读取结果使用 `Option` 区分"字段不存在"与"字段存在但为 null"。

use serde_json::{Map, Value};
use std::borrow::Cow;
use thiserror::Error;

use crate::value::loose_eq;

/// 数组通配段
pub const WILDCARD: &str = "[]";

/// 父路径与元素路径之间的通配分隔符
pub const WILDCARD_SEPARATOR: &str = ".[].";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("路径为空")]
    EmptyPath,

    #[error("路径不存在: {0}")]
    NotFound(String),

    #[error("路径 '{0}' 不是数组")]
    NotASequence(String),

    #[error("路径 '{0}' 无法写入：中间节点不是对象或数组")]
    NotAContainer(String),

    #[error("路径 '{path}' 中的下标无效: {segment}")]
    InvalidIndex { path: String, segment: String },
}

/// 读取路径上的值
///
/// 普通路径返回借用；包含通配段时返回收集后的新数组。
pub fn get<'a>(value: &'a Value, path: &str) -> Option<Cow<'a, Value>> {
    if path.is_empty() {
        return Some(Cow::Borrowed(value));
    }
    let segments: Vec<&str> = path.split('.').collect();
    get_segments(value, &segments)
}

fn get_segments<'a>(value: &'a Value, segments: &[&str]) -> Option<Cow<'a, Value>> {
    let mut current = value;

    for (i, segment) in segments.iter().enumerate() {
        if *segment == WILDCARD {
            let items = current.as_array()?;
            let rest = &segments[i + 1..];
            if rest.is_empty() {
                return Some(Cow::Borrowed(current));
            }
            let collected = items
                .iter()
                .filter_map(|item| get_segments(item, rest))
                .map(Cow::into_owned)
                .collect();
            return Some(Cow::Owned(Value::Array(collected)));
        }
        current = step(current, segment)?;
    }

    Some(Cow::Borrowed(current))
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

/// 写入路径，缺失或为 null 的中间节点自动创建为对象
pub fn set(target: &mut Value, path: &str, value: Value) -> Result<(), PathError> {
    if path.is_empty() {
        return Err(PathError::EmptyPath);
    }
    let segments: Vec<&str> = path.split('.').collect();
    set_segments(target, &segments, value, path)
}

fn set_segments(
    current: &mut Value,
    segments: &[&str],
    value: Value,
    path: &str,
) -> Result<(), PathError> {
    let Some((head, rest)) = segments.split_first() else {
        *current = value;
        return Ok(());
    };

    if *head == WILDCARD {
        let items = current
            .as_array_mut()
            .ok_or_else(|| PathError::NotASequence(path.to_string()))?;
        for item in items.iter_mut() {
            set_segments(item, rest, value.clone(), path)?;
        }
        return Ok(());
    }

    if current.is_null() {
        *current = Value::Object(Map::new());
    }

    match current {
        Value::Object(map) => {
            let slot = map.entry(head.to_string()).or_insert(Value::Null);
            set_segments(slot, rest, value, path)
        }
        Value::Array(items) => {
            let invalid = || PathError::InvalidIndex {
                path: path.to_string(),
                segment: head.to_string(),
            };
            let index: usize = head.parse().map_err(|_| invalid())?;
            let slot = items.get_mut(index).ok_or_else(invalid)?;
            set_segments(slot, rest, value, path)
        }
        _ => Err(PathError::NotAContainer(path.to_string())),
    }
}

/// 将通配路径拆分为父路径与元素路径
pub fn split_wildcard(path: &str) -> Option<(&str, &str)> {
    path.split_once(WILDCARD_SEPARATOR)
}

/// 去掉末尾的通配段：`tags.[]` 与 `tags` 指向同一个序列
fn strip_trailing_wildcard(path: &str) -> &str {
    path.strip_suffix(".[]").unwrap_or(path)
}

/// 过滤后的序列应写回的位置
///
/// 通配路径写回父路径；父路径为空时不写回。
pub fn rewrite_target(path: &str) -> Option<&str> {
    let path = strip_trailing_wildcard(path);
    if path.is_empty() || path == WILDCARD {
        return None;
    }
    match split_wildcard(path) {
        Some(("", _)) => None,
        Some((parent, _)) => Some(parent),
        None => Some(path),
    }
}

/// 返回 `path` 处序列中出现在 `allowed` 内的元素
///
/// 通配路径（`items.[].code`）按元素路径上的值过滤父序列，保留原始元素。
pub fn filter_sequence(record: &Value, path: &str, allowed: &[Value]) -> Result<Value, PathError> {
    let path = strip_trailing_wildcard(path);
    if let Some((parent, element_path)) = split_wildcard(path) {
        let items = get(record, parent).ok_or_else(|| PathError::NotFound(path.to_string()))?;
        let items = items
            .as_array()
            .ok_or_else(|| PathError::NotASequence(parent.to_string()))?;
        let kept = items
            .iter()
            .filter(|item| {
                get(item, element_path).is_some_and(|v| matches_allowed(&v, allowed))
            })
            .cloned()
            .collect();
        return Ok(Value::Array(kept));
    }

    let items = get(record, path).ok_or_else(|| PathError::NotFound(path.to_string()))?;
    let items = items
        .as_array()
        .ok_or_else(|| PathError::NotASequence(path.to_string()))?;
    let kept = items
        .iter()
        .filter(|item| is_member(item, allowed))
        .cloned()
        .collect();
    Ok(Value::Array(kept))
}

fn matches_allowed(value: &Value, allowed: &[Value]) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|v| is_member(v, allowed)),
        other => is_member(other, allowed),
    }
}

fn is_member(value: &Value, allowed: &[Value]) -> bool {
    allowed.iter().any(|a| loose_eq(value, a))
}
