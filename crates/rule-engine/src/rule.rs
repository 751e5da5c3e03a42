//! 规则
//!
//! 规则持有三层互相独立的节点列表，按固定优先级决定最终结果：
//! `joins` 非空时只看 joins；否则 `groups` 非空时只看 groups；否则看 `conditions`。
//! 三者皆空的规则永不匹配。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::condition::Condition;
use crate::context::EvalContext;
use crate::error::{Rejection, Result};
use crate::ident::new_id;
use crate::node::{self, Conditions, Group, Join};
use crate::operators::JoinOperator;
use crate::template;

/// 规则应用结果：`Ok(None)` 表示未匹配且无需拒绝
pub type ApplyResult = std::result::Result<Option<Value>, Rejection>;

/// 记录被接受时调用
pub type SuccessHandler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Clone, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default = "new_id")]
    pub id: String,

    /// 拒绝消息模板，按原始记录渲染
    #[serde(default)]
    pub error_msg: String,

    /// 非空时，不匹配的记录产生结构化拒绝
    #[serde(default)]
    pub error_action: String,

    #[serde(default)]
    pub conditions: Vec<Conditions>,

    #[serde(default)]
    pub groups: Vec<Group>,

    #[serde(default)]
    pub joins: Vec<Join>,

    #[serde(skip)]
    success_handler: Option<SuccessHandler>,
}

impl Rule {
    pub fn new() -> Self {
        Self::with_id(new_id())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error_msg: String::new(),
            error_action: String::new(),
            conditions: Vec::new(),
            groups: Vec::new(),
            joins: Vec::new(),
            success_handler: None,
        }
    }

    /// 从 JSON 文档解析规则
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_error(mut self, error_msg: impl Into<String>, error_action: impl Into<String>) -> Self {
        self.error_msg = error_msg.into();
        self.error_action = error_action.into();
        self
    }

    fn add_node(&mut self, operator: JoinOperator, condition: Vec<Condition>) -> Conditions {
        let node = Conditions::new(operator, condition);
        self.conditions.push(node.clone());
        node
    }

    /// 追加一个 AND 聚合节点，返回其副本以便继续组合成 Group
    pub fn and(&mut self, condition: Vec<Condition>) -> Conditions {
        self.add_node(JoinOperator::And, condition)
    }

    pub fn or(&mut self, condition: Vec<Condition>) -> Conditions {
        self.add_node(JoinOperator::Or, condition)
    }

    pub fn not(&mut self, condition: Vec<Condition>) -> Conditions {
        self.add_node(JoinOperator::Not, condition)
    }

    pub fn group(&mut self, left: Conditions, operator: JoinOperator, right: Conditions) -> Group {
        let group = Group::new(left, operator, right);
        self.groups.push(group.clone());
        group
    }

    pub fn join(&mut self, left: Group, operator: JoinOperator, right: Group) -> Join {
        let join = Join::new(left, operator, right);
        self.joins.push(join.clone());
        join
    }

    /// 设置成功回调，每条被接受的记录调用一次
    pub fn add_handler<F>(&mut self, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.success_handler = Some(Arc::new(handler));
    }

    /// 在已隔离的记录副本上判定规则是否匹配
    pub fn matches(&self, ctx: &EvalContext, record: &mut Value) -> bool {
        if !self.joins.is_empty() {
            node::fold(&self.joins, ctx, record)
        } else if !self.groups.is_empty() {
            node::fold(&self.groups, ctx, record)
        } else {
            node::fold(&self.conditions, ctx, record)
        }
    }

    /// 使用默认上下文应用规则，匹配时返回原始数据
    pub fn apply(&self, data: &Value) -> ApplyResult {
        self.apply_in(EvalContext::shared_default(), data, |d| d.cloned())
    }

    /// 使用默认上下文应用规则，单条记录的结果交给 `callback` 处理
    pub fn apply_with<F>(&self, data: &Value, callback: F) -> ApplyResult
    where
        F: FnOnce(Option<&Value>) -> Option<Value>,
    {
        self.apply_in(EvalContext::shared_default(), data, callback)
    }

    /// 应用规则
    ///
    /// - 单条记录：匹配时以原始记录调用 `callback`；不匹配时以 `None` 调用，
    ///   若配置了 `error_action` 则丢弃回调结果并返回拒绝
    /// - 记录数组：逐条在独立副本上判定，返回匹配的原始记录（保持顺序）；
    ///   结果为空且配置了 `error_action` 时返回拒绝。非对象元素被忽略
    /// - 其他形状：返回 `None`
    #[instrument(level = "debug", skip_all, fields(rule_id = %self.id))]
    pub fn apply_in<F>(
        &self,
        ctx: &EvalContext,
        data: &Value,
        callback: F,
    ) -> ApplyResult
    where
        F: FnOnce(Option<&Value>) -> Option<Value>,
    {
        match data {
            Value::Object(_) => {
                let mut working = data.clone();
                if self.matches(ctx, &mut working) {
                    self.accepted(data);
                    return Ok(callback(Some(data)));
                }
                let fallback = callback(None);
                if self.error_action.is_empty() {
                    Ok(fallback)
                } else {
                    Err(self.reject(data))
                }
            }
            Value::Array(items) => {
                let matched: Vec<Value> = items
                    .iter()
                    .filter(|item| item.is_object())
                    .filter(|item| {
                        let mut working = (*item).clone();
                        self.matches(ctx, &mut working)
                    })
                    .inspect(|item| self.accepted(item))
                    .cloned()
                    .collect();

                if matched.is_empty() && !self.error_action.is_empty() {
                    return Err(self.reject(data));
                }
                Ok(Some(Value::Array(matched)))
            }
            _ => Ok(None),
        }
    }

    fn accepted(&self, record: &Value) {
        if let Some(handler) = &self.success_handler {
            handler(record);
        }
    }

    /// 渲染失败时消息为空串
    fn reject(&self, data: &Value) -> Rejection {
        let error_msg = template::render(&self.error_msg, data).unwrap_or_else(|e| {
            warn!(rule_id = %self.id, error = %e, "错误消息模板渲染失败");
            String::new()
        });
        Rejection::new(error_msg, self.error_action.clone())
    }
}

impl Default for Rule {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("error_msg", &self.error_msg)
            .field("error_action", &self.error_action)
            .field("conditions", &self.conditions)
            .field("groups", &self.groups)
            .field("joins", &self.joins)
            .field("has_success_handler", &self.success_handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::Operator;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn age_rule() -> Rule {
        let mut rule = Rule::with_id("adult").with_error("{{ name }} 未成年", "restrict");
        rule.and(vec![Condition::new("age", Operator::Gte, 18)]);
        rule
    }

    #[test]
    fn test_apply_single_record() {
        let rule = age_rule();
        let data = json!({"name": "Bob", "age": 30});
        assert_eq!(rule.apply(&data), Ok(Some(data.clone())));
    }

    #[test]
    fn test_apply_rejection_renders_template() {
        let rule = age_rule();
        let err = rule.apply(&json!({"name": "Tim", "age": 12})).unwrap_err();
        assert_eq!(err, Rejection::new("Tim 未成年", "restrict"));
    }

    #[test]
    fn test_apply_without_error_action_returns_callback_result() {
        let mut rule = Rule::new();
        rule.and(vec![Condition::new("age", Operator::Gte, 18)]);
        assert_eq!(rule.apply(&json!({"age": 3})), Ok(None));

        let result = rule.apply_with(&json!({"age": 3}), |d| {
            Some(json!({"matched": d.is_some()}))
        });
        assert_eq!(result, Ok(Some(json!({"matched": false}))));
    }

    #[test]
    fn test_template_failure_yields_empty_message() {
        let mut rule = Rule::new().with_error("broken {{ name", "warning");
        rule.and(vec![Condition::new("age", Operator::Gte, 18)]);
        let err = rule.apply(&json!({"age": 1})).unwrap_err();
        assert_eq!(err.error_msg, "");
        assert_eq!(err.error_action, "warning");
    }

    #[test]
    fn test_empty_rule_never_matches() {
        let rule = Rule::new();
        assert_eq!(rule.apply(&json!({"a": 1})), Ok(None));
        assert_eq!(rule.apply(&json!([{"a": 1}])), Ok(Some(json!([]))));
    }

    #[test]
    fn test_non_record_input() {
        assert_eq!(age_rule().apply(&json!("text")), Ok(None));
    }

    #[test]
    fn test_success_handler_called_per_accepted_record() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut rule = age_rule();
        rule.add_handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        rule.apply(&json!([{"age": 20}, {"age": 5}, {"age": 40}])).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_groups_take_precedence_over_conditions() {
        let mut rule = Rule::new();
        let never = rule.and(vec![Condition::new("a", Operator::Eq, "nope")]);
        let always = rule.and(vec![Condition::new("a", Operator::Eq, "yes")]);
        rule.group(never, JoinOperator::Or, always);
        // conditions 层按 AND 折叠为 false，groups 层为 true
        assert!(rule.apply(&json!({"a": "yes"})).unwrap().is_some());
    }

    #[test]
    fn test_from_json_generates_id() {
        let rule = Rule::from_json(
            r#"{"error_msg": "", "error_action": "", "conditions": [
                {"operator": "OR", "condition": [{"field": "a", "operator": "eq", "value": 1}]}
            ]}"#,
        )
        .unwrap();
        assert!(!rule.id.is_empty());
        assert!(rule.groups.is_empty());
        assert!(rule.apply(&json!({"a": 1})).unwrap().is_some());
    }

    #[test]
    fn test_rule_round_trips_through_json() {
        let rule = age_rule();
        let json = serde_json::to_string(&rule).unwrap();
        let back = Rule::from_json(&json).unwrap();
        assert_eq!(back.id, "adult");
        assert_eq!(back.conditions.len(), 1);
        assert_eq!(back.conditions[0].id, rule.conditions[0].id);
    }
}
