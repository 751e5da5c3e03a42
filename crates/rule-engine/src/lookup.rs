//! 查找过滤
//!
//! 在条件比较之前执行：
//!
//! 1. 取得查找数据集（`lookup_data`，或调用一次 `lookup_handler` 并缓存）
//! 2. 若存在过滤表达式，逐行求值并保留结果为真的行；`[data.<path>]` 引用目标记录
//! 3. 按 `filter.key` 投影
//! 4. 投影结果为非空序列时，将目标记录在 `field` 处的序列收窄为与其交集并写回；
//!    为空序列时写回 null。通配字段（`items.[].code`）写回父路径，末尾通配段（`tags.[]`）写回序列本身
//! 5. 返回投影结果，供条件替换比较值
//!
//! 表达式解析失败时不做行过滤，使用原始数据集。

use serde_json::Value;
use std::borrow::Cow;
use tracing::{debug, warn};

use crate::condition::Condition;
use crate::context::EvalContext;
use crate::expression::Expression;
use crate::path::{self, WILDCARD};

pub(crate) fn apply(
    condition: &Condition,
    expression: Option<&str>,
    record: &mut Value,
    ctx: &EvalContext,
) -> Option<Value> {
    let filter = &condition.filter;
    if filter.key.is_empty() {
        return None;
    }
    let dataset = filter.dataset()?;

    let rows = match expression {
        Some(source) => filter_rows(dataset, source, record, ctx),
        None => Cow::Borrowed(dataset),
    };

    let projected = project(&rows, &filter.key)?;
    rewrite(record, &condition.field, &projected);
    Some(projected)
}

/// 逐行求值过滤表达式，非对象行与求值出错的行被丢弃
fn filter_rows<'a>(
    dataset: &'a Value,
    source: &str,
    record: &Value,
    ctx: &EvalContext,
) -> Cow<'a, Value> {
    let expression = match Expression::parse(source) {
        Ok(expression) => expression,
        Err(e) => {
            warn!(expression = %source, error = %e, "过滤表达式解析失败，使用未过滤的查找数据");
            return Cow::Borrowed(dataset);
        }
    };

    let Some(rows) = dataset.as_array() else {
        return Cow::Borrowed(dataset);
    };

    let scope = ctx.scope(record);
    let kept: Vec<Value> = rows
        .iter()
        .filter(|row| row.is_object())
        .filter(|row| match expression.eval(row, &scope) {
            Ok(keep) => keep,
            Err(e) => {
                debug!(expression = %source, error = %e, "过滤表达式求值失败，跳过该行");
                false
            }
        })
        .cloned()
        .collect();

    debug!(total = rows.len(), kept = kept.len(), "查找数据过滤完成");
    Cow::Owned(Value::Array(kept))
}

/// 按 key 投影；数据集为数组且 key 不以通配段开头时对每行投影
fn project(rows: &Value, key: &str) -> Option<Value> {
    if let Some(value) = path::get(rows, key) {
        return Some(value.into_owned());
    }
    if rows.is_array() && !key.starts_with(WILDCARD) {
        return path::get(rows, &format!("{WILDCARD}.{key}")).map(Cow::into_owned);
    }
    None
}

fn rewrite(record: &mut Value, field: &str, projected: &Value) {
    let Value::Array(allowed) = projected else {
        return;
    };
    let Some(target) = path::rewrite_target(field) else {
        return;
    };

    let replacement = if allowed.is_empty() {
        Value::Null
    } else {
        match path::filter_sequence(record, field, allowed) {
            Ok(narrowed) => narrowed,
            Err(e) => {
                debug!(field = %field, error = %e, "目标字段不是序列，跳过改写");
                return;
            }
        }
    };

    if let Err(e) = path::set(record, target, replacement) {
        debug!(field = %field, error = %e, "写回目标字段失败");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Filter;
    use crate::operators::Operator;
    use serde_json::json;

    fn codes() -> Value {
        json!([
            {"code": "A", "status": "active", "region": "north"},
            {"code": "B", "status": "inactive", "region": "north"},
            {"code": "C", "status": "active", "region": "south"},
            "not a row"
        ])
    }

    fn run(condition: &Condition, record: &mut Value) -> Option<Value> {
        apply(condition, condition.expression(), record, &EvalContext::default())
    }

    #[test]
    fn test_no_key_means_no_lookup() {
        let condition = Condition::new("codes", Operator::In, json!([]))
            .with_filter(Filter::from_data(codes(), ""));
        let mut record = json!({"codes": ["A"]});
        assert_eq!(run(&condition, &mut record), None);
        assert_eq!(record, json!({"codes": ["A"]}));
    }

    #[test]
    fn test_projection_without_expression_rewrites_field() {
        let condition = Condition::new("codes", Operator::EqCount, 1)
            .with_filter(Filter::from_data(json!([{"code": "A"}, {"code": "C"}]), "code"));
        let mut record = json!({"codes": ["A", "B", "C", "D"]});
        let projected = run(&condition, &mut record);
        assert_eq!(projected, Some(json!(["A", "C"])));
        assert_eq!(record, json!({"codes": ["A", "C"]}));
    }

    #[test]
    fn test_expression_filters_rows_with_record_reference() {
        let condition = Condition::new("codes", Operator::In, json!({"expr": "status == 'active' && region == [data.region]"}))
            .with_filter(Filter::from_data(codes(), "[].code"));
        let mut record = json!({"region": "north", "codes": ["A", "B", "C"]});
        let projected = run(&condition, &mut record);
        assert_eq!(projected, Some(json!(["A"])));
        assert_eq!(record["codes"], json!(["A"]));
    }

    #[test]
    fn test_empty_projection_writes_null() {
        let condition = Condition::new("codes", Operator::In, json!({"expr": "status == 'archived'"}))
            .with_filter(Filter::from_data(codes(), "code"));
        let mut record = json!({"codes": ["A"]});
        assert_eq!(run(&condition, &mut record), Some(json!([])));
        assert_eq!(record, json!({"codes": null}));
    }

    #[test]
    fn test_wildcard_field_rewrites_parent() {
        let condition = Condition::new("order.items.[].sku", Operator::NotNull, Value::Null)
            .with_filter(Filter::from_data(json!([{"sku": "T-1"}]), "sku"));
        let mut record = json!({"order": {"items": [
            {"sku": "T-1", "qty": 1},
            {"sku": "F-9", "qty": 2}
        ]}});
        run(&condition, &mut record);
        assert_eq!(record["order"]["items"], json!([{"sku": "T-1", "qty": 1}]));
    }

    #[test]
    fn test_trailing_wildcard_field_narrows_sequence() {
        let condition = Condition::new("tags.[]", Operator::EqCount, 1)
            .with_filter(Filter::from_data(json!([{"t": "a"}]), "t"));
        let mut record = json!({"tags": ["a", "b"]});
        assert!(condition.validate(&mut record));
        assert_eq!(record, json!({"tags": ["a"]}));
    }

    #[test]
    fn test_parse_failure_uses_unfiltered_data() {
        let condition = Condition::new("codes", Operator::In, json!([]))
            .with_filter(Filter::from_data(codes(), "code").with_condition("status =="));
        let mut record = json!({"codes": ["A", "B", "Z"]});
        let projected = run(&condition, &mut record);
        assert_eq!(projected, Some(json!(["A", "B", "C"])));
        assert_eq!(record["codes"], json!(["A", "B"]));
    }

    #[test]
    fn test_target_not_a_sequence_is_left_alone() {
        let condition = Condition::new("code", Operator::Eq, "A")
            .with_filter(Filter::from_data(codes(), "code"));
        let mut record = json!({"code": "A"});
        run(&condition, &mut record);
        assert_eq!(record, json!({"code": "A"}));
    }
}
