//! 记录规则引擎
//!
//! 对动态类型的记录（或记录数组）评估由条件树构成的规则：
//! - 类型化的条件比较，包含相等、排序、区间、包含、子串、数量、空值等操作符
//! - 查找过滤：用内嵌表达式收窄外部参考数据集后再作为比较值
//! - Conditions / Group / Join 三层聚合与规则的层级优先级
//! - 按优先级顺序首个命中的规则组
//! - 结构化拒绝与错误消息模板

pub mod bridge;
pub mod condition;
pub mod context;
pub mod datetime;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod ident;
pub mod lookup;
pub mod node;
pub mod operators;
pub mod path;
pub mod priority;
pub mod rule;
pub mod template;
pub mod value;

pub use bridge::Bridge;
pub use condition::{Condition, Filter, LookupHandler};
pub use context::EvalContext;
pub use error::{Rejection, Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use expression::{Expression, ExpressionError, FunctionRegistry};
pub use node::{Conditions, Group, Join, Node, Response};
pub use operators::{JoinOperator, Operator};
pub use priority::{PriorityGroup, PriorityGroupDef, PriorityOrder, PriorityRule, PriorityRuleDef};
pub use rule::{ApplyResult, Rule, SuccessHandler};
pub use value::Kind;
