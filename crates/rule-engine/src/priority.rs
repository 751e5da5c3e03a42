//! 按优先级排序的规则组
//!
//! 规则列表由读写锁保护。`add_rule` 持有写锁追加；应用时只在读锁下
//! 拍摄快照，释放锁之后再逐条评估，多个应用调用可以并行执行。

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::context::EvalContext;
use crate::error::{Result, RuleError};
use crate::rule::{ApplyResult, Rule};

/// 评估顺序
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityOrder {
    /// 优先级数值大的先评估
    Highest,
    /// 优先级数值小的先评估
    #[default]
    Lowest,
}

impl FromStr for PriorityOrder {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "highest" | "desc" => Ok(Self::Highest),
            "lowest" | "asc" => Ok(Self::Lowest),
            other => Err(RuleError::InvalidData(format!("未知的优先级顺序: {}", other))),
        }
    }
}

impl fmt::Display for PriorityOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Highest => write!(f, "highest"),
            Self::Lowest => write!(f, "lowest"),
        }
    }
}

/// 带优先级的规则
#[derive(Debug, Clone)]
pub struct PriorityRule {
    pub rule: Arc<Rule>,
    pub priority: i32,
}

/// 规则组文档
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriorityGroupDef {
    #[serde(default)]
    pub key: String,

    #[serde(default)]
    pub order: PriorityOrder,

    #[serde(default)]
    pub rules: Vec<PriorityRuleDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityRuleDef {
    pub rule: Rule,

    #[serde(default)]
    pub priority: i32,
}

impl PriorityGroupDef {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// 规则组
#[derive(Debug, Default)]
pub struct PriorityGroup {
    key: String,
    order: PriorityOrder,
    rules: RwLock<Vec<PriorityRule>>,
}

impl PriorityGroup {
    pub fn new(order: PriorityOrder) -> Self {
        Self {
            order,
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn from_def(def: PriorityGroupDef) -> Self {
        let rules = def
            .rules
            .into_iter()
            .map(|r| PriorityRule {
                rule: Arc::new(r.rule),
                priority: r.priority,
            })
            .collect();
        Self {
            key: def.key,
            order: def.order,
            rules: RwLock::new(rules),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn order(&self) -> PriorityOrder {
        self.order
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }

    /// 追加规则
    #[instrument(skip(self, rule), fields(group = %self.key, rule_id = %rule.id))]
    pub fn add_rule(&self, rule: Rule, priority: i32) {
        self.add_shared(Arc::new(rule), priority);
    }

    /// 追加共享的规则
    pub fn add_shared(&self, rule: Arc<Rule>, priority: i32) {
        let rule_id = rule.id.clone();
        self.rules.write().push(PriorityRule { rule, priority });
        info!("规则已加入规则组: {} (优先级 {})", rule_id, priority);
    }

    /// 按优先级排序的规则快照，相同优先级保持加入顺序
    pub fn sort_by_priority(&self, order: PriorityOrder) -> Vec<Arc<Rule>> {
        let mut snapshot: Vec<PriorityRule> = self.rules.read().clone();
        match order {
            PriorityOrder::Lowest => snapshot.sort_by(|a, b| a.priority.cmp(&b.priority)),
            PriorityOrder::Highest => snapshot.sort_by(|a, b| b.priority.cmp(&a.priority)),
        }
        snapshot.into_iter().map(|r| r.rule).collect()
    }

    /// 按配置的顺序应用
    pub fn apply(&self, data: &Value) -> ApplyResult {
        self.apply_in(EvalContext::shared_default(), data, self.order)
    }

    pub fn apply_highest_priority(&self, data: &Value) -> ApplyResult {
        self.apply_in(EvalContext::shared_default(), data, PriorityOrder::Highest)
    }

    pub fn apply_lowest_priority(&self, data: &Value) -> ApplyResult {
        self.apply_in(EvalContext::shared_default(), data, PriorityOrder::Lowest)
    }

    /// 按配置的顺序应用，每条规则的结果交给 `callback` 处理
    pub fn apply_with<F>(&self, data: &Value, callback: F) -> ApplyResult
    where
        F: Fn(Option<&Value>) -> Option<Value>,
    {
        self.apply_in_with(EvalContext::shared_default(), data, self.order, callback)
    }

    /// 依次应用规则，返回第一个非空结果或第一个拒绝
    pub fn apply_in(&self, ctx: &EvalContext, data: &Value, order: PriorityOrder) -> ApplyResult {
        self.apply_in_with(ctx, data, order, |d| d.cloned())
    }

    /// 依次应用规则，`callback` 逐条传给 [`Rule::apply_in`]
    ///
    /// 回调结果为 `null` 或空数组时视为未匹配，继续评估下一条。
    /// 全部未匹配时返回 `Ok(None)`。
    pub fn apply_in_with<F>(
        &self,
        ctx: &EvalContext,
        data: &Value,
        order: PriorityOrder,
        callback: F,
    ) -> ApplyResult
    where
        F: Fn(Option<&Value>) -> Option<Value>,
    {
        let rules = self.sort_by_priority(order);
        debug!(group = %self.key, %order, count = rules.len(), "开始评估规则组");

        for rule in rules {
            match rule.apply_in(ctx, data, &callback)? {
                Some(result) if !is_empty_result(&result) => {
                    debug!(group = %self.key, rule_id = %rule.id, "规则组命中");
                    return Ok(Some(result));
                }
                _ => continue,
            }
        }
        Ok(None)
    }
}

fn is_empty_result(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::operators::Operator;
    use serde_json::json;

    fn tagged(id: &str, field: &str, expected: i64) -> Rule {
        let mut rule = Rule::with_id(id);
        rule.and(vec![Condition::new(field, Operator::Eq, expected)]);
        rule
    }

    fn ids(rules: &[Arc<Rule>]) -> Vec<&str> {
        rules.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_sort_by_priority_is_stable() {
        let group = PriorityGroup::new(PriorityOrder::Lowest);
        group.add_rule(Rule::with_id("a"), 1);
        group.add_rule(Rule::with_id("b"), 5);
        group.add_rule(Rule::with_id("c"), 3);
        group.add_rule(Rule::with_id("d"), 3);

        assert_eq!(ids(&group.sort_by_priority(PriorityOrder::Highest)), ["b", "c", "d", "a"]);
        assert_eq!(ids(&group.sort_by_priority(PriorityOrder::Lowest)), ["a", "c", "d", "b"]);
    }

    #[test]
    fn test_first_match_wins() {
        let group = PriorityGroup::new(PriorityOrder::Highest);
        group.add_rule(tagged("low", "x", 1), 1);
        group.add_rule(tagged("high", "x", 2), 10);
        group.add_rule(tagged("mid", "x", 1), 5);

        let data = json!({"x": 1});
        // high 不匹配，mid 先于 low 命中
        assert_eq!(group.apply(&data), Ok(Some(data.clone())));
        assert_eq!(group.apply_lowest_priority(&data), Ok(Some(data.clone())));
        assert_eq!(group.apply(&json!({"x": 9})), Ok(None));
    }

    #[test]
    fn test_rejection_stops_evaluation() {
        let group = PriorityGroup::new(PriorityOrder::Highest);
        group.add_rule(tagged("strict", "x", 2).with_error("x={{ x }}", "restrict"), 10);
        group.add_rule(tagged("loose", "x", 1), 1);

        let err = group.apply(&json!({"x": 1})).unwrap_err();
        assert_eq!(err.error_msg, "x=1");
    }

    #[test]
    fn test_empty_collection_result_is_skipped() {
        let group = PriorityGroup::new(PriorityOrder::Highest);
        group.add_rule(tagged("none", "x", 5), 9);
        group.add_rule(tagged("some", "x", 1), 1);

        let data = json!([{"x": 1}, {"x": 2}]);
        assert_eq!(group.apply(&data), Ok(Some(json!([{"x": 1}]))));
    }

    #[test]
    fn test_apply_with_returns_transformed_result() {
        let group = PriorityGroup::new(PriorityOrder::Highest);
        group.add_rule(tagged("high", "x", 2), 10);
        group.add_rule(tagged("mid", "x", 1), 5);
        group.add_rule(tagged("low", "x", 1), 1);

        let calls = std::cell::Cell::new(0);
        let result = group.apply_with(&json!({"x": 1, "name": "n"}), |d| {
            calls.set(calls.get() + 1);
            d.map(|v| json!({"picked": v["name"]}))
        });
        // high 以 None 调用回调后被跳过，mid 的转换结果即为首个命中
        assert_eq!(result, Ok(Some(json!({"picked": "n"}))));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_apply_with_skips_null_callback_result() {
        let group = PriorityGroup::new(PriorityOrder::Lowest);
        group.add_rule(tagged("first", "x", 1), 1);
        group.add_rule(tagged("second", "x", 1), 2);

        let seen = std::cell::Cell::new(0);
        let result = group.apply_in_with(
            &EvalContext::default(),
            &json!({"x": 1}),
            PriorityOrder::Lowest,
            |d| {
                seen.set(seen.get() + 1);
                if seen.get() == 1 { Some(Value::Null) } else { d.map(|_| json!("second")) }
            },
        );
        assert_eq!(result, Ok(Some(json!("second"))));
    }

    #[test]
    fn test_from_def_document() {
        let def = PriorityGroupDef::from_json(
            r#"{"key": "checkout", "order": "highest", "rules": [
                {"priority": 1, "rule": {"id": "r1", "conditions": [
                    {"operator": "AND", "condition": [{"field": "x", "operator": "gt", "value": 0}]}
                ]}}
            ]}"#,
        )
        .unwrap();
        let group = PriorityGroup::from_def(def);
        assert_eq!(group.key(), "checkout");
        assert_eq!(group.order(), PriorityOrder::Highest);
        assert_eq!(group.len(), 1);
        assert!(group.apply(&json!({"x": 3})).unwrap().is_some());
    }

    #[test]
    fn test_priority_order_from_str() {
        assert_eq!("HIGHEST".parse::<PriorityOrder>().unwrap(), PriorityOrder::Highest);
        assert_eq!("asc".parse::<PriorityOrder>().unwrap(), PriorityOrder::Lowest);
        assert!("sideways".parse::<PriorityOrder>().is_err());
    }
}
