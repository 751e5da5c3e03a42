//! 条件树节点
//!
//! - [`Conditions`]：对一组条件做 AND/OR 聚合，可整体取反
//! - [`Group`]：对两个 `Conditions` 做 AND/OR
//! - [`Join`]：对两个 `Group` 做 AND/OR
//!
//! 聚合不做短路求值，每个子节点都会被评估，以保证查找过滤对记录的改写全部生效。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::Condition;
use crate::context::EvalContext;
use crate::ident::new_id;
use crate::operators::JoinOperator;

/// 节点评估结果
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// 结果为真时为（可能已被查找过滤改写的）记录
    pub data: Option<Value>,
    pub processed: bool,
    pub result: bool,
}

impl Response {
    fn new(result: bool, record: &Value) -> Self {
        Self {
            data: result.then(|| record.clone()),
            processed: true,
            result,
        }
    }
}

/// 条件树中的一层
pub trait Node {
    fn id(&self) -> &str;

    fn operator(&self) -> JoinOperator;

    /// 评估节点，`record` 可能被查找过滤改写
    fn evaluate(&self, ctx: &EvalContext, record: &mut Value) -> bool;

    /// 节点是否不含任何条件，规则折叠时跳过
    fn is_vacant(&self) -> bool {
        false
    }

    fn apply(&self, ctx: &EvalContext, record: &mut Value) -> Response {
        let result = self.evaluate(ctx, record);
        Response::new(result, record)
    }
}

/// 条件聚合
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conditions {
    #[serde(default)]
    pub operator: JoinOperator,

    #[serde(default = "new_id")]
    pub id: String,

    #[serde(default)]
    pub condition: Vec<Condition>,

    #[serde(default)]
    pub reverse: bool,
}

impl Conditions {
    pub fn new(operator: JoinOperator, condition: Vec<Condition>) -> Self {
        Self {
            operator,
            id: new_id(),
            condition,
            reverse: false,
        }
    }

    pub fn and(condition: Vec<Condition>) -> Self {
        Self::new(JoinOperator::And, condition)
    }

    pub fn or(condition: Vec<Condition>) -> Self {
        Self::new(JoinOperator::Or, condition)
    }

    pub fn not(condition: Vec<Condition>) -> Self {
        Self::new(JoinOperator::Not, condition)
    }

    /// 对聚合结果取反
    pub fn reversed(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }
}

impl Node for Conditions {
    fn id(&self) -> &str {
        &self.id
    }

    fn operator(&self) -> JoinOperator {
        self.operator
    }

    fn evaluate(&self, ctx: &EvalContext, record: &mut Value) -> bool {
        let operator = self.operator;
        let result = self.condition.iter().fold(operator.seed(), |acc, condition| {
            let passed = condition.validate_in(ctx, record);
            operator.combine(acc, passed)
        });
        result != self.reverse
    }

    fn is_vacant(&self) -> bool {
        self.condition.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub left: Conditions,

    #[serde(default)]
    pub operator: JoinOperator,

    pub right: Conditions,

    #[serde(default = "new_id")]
    pub id: String,
}

impl Group {
    pub fn new(left: Conditions, operator: JoinOperator, right: Conditions) -> Self {
        Self {
            left,
            operator,
            right,
            id: new_id(),
        }
    }
}

impl Node for Group {
    fn id(&self) -> &str {
        &self.id
    }

    fn operator(&self) -> JoinOperator {
        self.operator
    }

    fn evaluate(&self, ctx: &EvalContext, record: &mut Value) -> bool {
        let left = self.left.evaluate(ctx, record);
        let right = self.right.evaluate(ctx, record);
        self.operator.combine(left, right)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Join {
    pub left: Group,

    #[serde(default)]
    pub operator: JoinOperator,

    pub right: Group,

    #[serde(default = "new_id")]
    pub id: String,
}

impl Join {
    pub fn new(left: Group, operator: JoinOperator, right: Group) -> Self {
        Self {
            left,
            operator,
            right,
            id: new_id(),
        }
    }
}

impl Node for Join {
    fn id(&self) -> &str {
        &self.id
    }

    fn operator(&self) -> JoinOperator {
        self.operator
    }

    fn evaluate(&self, ctx: &EvalContext, record: &mut Value) -> bool {
        let left = self.left.evaluate(ctx, record);
        let right = self.right.evaluate(ctx, record);
        self.operator.combine(left, right)
    }
}

/// 按节点自身的操作符从左到右折叠
///
/// 初始值由第一个非空节点的操作符决定（AND 为 true，OR 为 false）。
/// 没有非空节点时结果为 false。
pub(crate) fn fold<N: Node>(nodes: &[N], ctx: &EvalContext, record: &mut Value) -> bool {
    let mut verdict: Option<bool> = None;
    for node in nodes.iter().filter(|n| !n.is_vacant()) {
        let operator = node.operator();
        let acc = verdict.unwrap_or_else(|| operator.seed());
        verdict = Some(operator.combine(acc, node.evaluate(ctx, record)));
    }
    verdict.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::Operator;
    use serde_json::json;

    fn ctx() -> EvalContext {
        EvalContext::default()
    }

    fn gt(field: &str, value: i64) -> Condition {
        Condition::new(field, Operator::Gt, value)
    }

    #[test]
    fn test_conditions_and_or() {
        let mut record = json!({"a": 5, "b": 1});
        assert!(!Conditions::and(vec![gt("a", 1), gt("b", 3)]).evaluate(&ctx(), &mut record));
        assert!(Conditions::or(vec![gt("a", 1), gt("b", 3)]).evaluate(&ctx(), &mut record));
        assert!(Conditions::not(vec![gt("a", 1)]).evaluate(&ctx(), &mut record));
    }

    #[test]
    fn test_conditions_reverse() {
        let mut record = json!({"a": 5});
        let node = Conditions::and(vec![gt("a", 1)]).reversed();
        assert!(!node.evaluate(&ctx(), &mut record));
    }

    #[test]
    fn test_and_evaluates_every_child() {
        // 第一个条件失败后，第二个条件的查找过滤仍然改写记录
        let rewrite = Condition::new("codes", Operator::NotNull, Value::Null).with_filter(
            crate::condition::Filter::from_data(json!([{"code": "A"}]), "code"),
        );
        let node = Conditions::and(vec![gt("a", 100), rewrite]);
        let mut record = json!({"a": 1, "codes": ["A", "B"]});
        assert!(!node.evaluate(&ctx(), &mut record));
        assert_eq!(record["codes"], json!(["A"]));
    }

    #[test]
    fn test_response_data_only_on_match() {
        let mut record = json!({"a": 5});
        let hit = Conditions::and(vec![gt("a", 1)]).apply(&ctx(), &mut record);
        assert!(hit.processed && hit.result);
        assert_eq!(hit.data, Some(json!({"a": 5})));

        let miss = Conditions::and(vec![gt("a", 10)]).apply(&ctx(), &mut record);
        assert!(miss.processed && !miss.result);
        assert_eq!(miss.data, None);
    }

    #[test]
    fn test_group_and_join() {
        let mut record = json!({"a": 5, "b": 1});
        let yes = || Conditions::and(vec![gt("a", 1)]);
        let no = || Conditions::and(vec![gt("b", 3)]);

        let or_group = Group::new(yes(), JoinOperator::Or, no());
        let and_group = Group::new(yes(), JoinOperator::And, no());
        assert!(or_group.evaluate(&ctx(), &mut record));
        assert!(!and_group.evaluate(&ctx(), &mut record));

        let join = Join::new(or_group.clone(), JoinOperator::And, and_group.clone());
        assert!(!join.evaluate(&ctx(), &mut record));
        let join = Join::new(or_group, JoinOperator::Or, and_group);
        assert!(join.evaluate(&ctx(), &mut record));
    }

    #[test]
    fn test_fold_skips_vacant_and_seeds_from_first() {
        let mut record = json!({"a": 5});
        let nodes = vec![
            Conditions::or(vec![]),
            Conditions::and(vec![gt("a", 1)]),
            Conditions::or(vec![gt("a", 100)]),
        ];
        assert!(fold(&nodes, &ctx(), &mut record));
        assert!(!fold::<Conditions>(&[], &ctx(), &mut record));
        assert!(!fold(&[Conditions::and(vec![])], &ctx(), &mut record));

        // 空的 OR 不参与折叠，由 AND 决定初始值
        let leading_vacant = vec![Conditions::or(vec![]), Conditions::and(vec![gt("a", 1)])];
        assert!(fold(&leading_vacant, &ctx(), &mut record));
    }

    #[test]
    fn test_deserialize_group_document() {
        let group: Group = serde_json::from_value(json!({
            "left": {"operator": "AND", "condition": [{"field": "a", "operator": "gt", "value": 1}]},
            "operator": "OR",
            "right": {"operator": "OR", "condition": [], "reverse": true}
        }))
        .unwrap();
        assert_eq!(group.operator, JoinOperator::Or);
        assert!(group.right.reverse);
        assert!(!group.id.is_empty());
    }
}
