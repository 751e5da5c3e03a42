//! 单个条件
//!
//! 条件对记录中的一个字段做一次类型化比较，可选地先经过查找过滤
//! （见 [`crate::lookup`]）改写字段并替换比较值。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::context::EvalContext;
use crate::evaluator::ConditionEvaluator;
use crate::lookup;
use crate::operators::Operator;
use crate::path;

/// 延迟产生查找数据的回调，每个条件实例最多调用一次
#[derive(Clone)]
pub struct LookupHandler(Arc<dyn Fn() -> Value + Send + Sync>);

impl LookupHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    fn call(&self) -> Value {
        (self.0)()
    }
}

impl fmt::Debug for LookupHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LookupHandler(..)")
    }
}

/// 查找过滤配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    /// 查找数据集，通常是对象数组
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_data: Option<Value>,

    /// `lookup_data` 缺失时调用
    #[serde(skip)]
    pub lookup_handler: Option<LookupHandler>,

    /// 从（过滤后的）数据集中投影出的路径
    #[serde(default)]
    pub key: String,

    /// 逐行过滤表达式
    #[serde(default)]
    pub condition: String,

    /// 数据来源描述，仅作记录
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lookup_source: String,

    #[serde(skip)]
    resolved: OnceLock<Value>,
}

impl Filter {
    pub fn from_data(data: impl Into<Value>, key: impl Into<String>) -> Self {
        Self {
            lookup_data: Some(data.into()),
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn from_handler<F>(handler: F, key: impl Into<String>) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            lookup_handler: Some(LookupHandler::new(handler)),
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = condition.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.lookup_source = source.into();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.lookup_data.is_none()
            && self.lookup_handler.is_none()
            && self.key.is_empty()
            && self.condition.is_empty()
    }

    /// 查找数据集：优先使用 `lookup_data`，否则调用一次回调并缓存结果
    pub(crate) fn dataset(&self) -> Option<&Value> {
        if let Some(data) = &self.lookup_data {
            return Some(data);
        }
        let handler = self.lookup_handler.as_ref()?;
        Some(self.resolved.get_or_init(|| {
            debug!(key = %self.key, "调用查找数据回调");
            handler.call()
        }))
    }
}

/// 单个比较条件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Filter::is_empty")]
    pub filter: Filter,

    /// 比较值：标量、区间二元组、成员序列，或 `{"expr": "..."}` 过滤表达式
    #[serde(default)]
    pub value: Value,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub condition_key: String,

    pub field: String,

    pub operator: Operator,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            filter: Filter::default(),
            value: value.into(),
            key: String::new(),
            condition_key: String::new(),
            field: field.into(),
            operator,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_key(mut self, key: impl Into<String>, condition_key: impl Into<String>) -> Self {
        self.key = key.into();
        self.condition_key = condition_key.into();
        self
    }

    /// 生效的过滤表达式
    ///
    /// 比较值形如 `{"expr": "..."}` 时优先，其次为 `filter.condition`。
    pub fn expression(&self) -> Option<&str> {
        let from_value = self
            .value
            .get("expr")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());
        from_value.or_else(|| Some(self.filter.condition.as_str()).filter(|s| !s.is_empty()))
    }

    /// 使用默认上下文评估
    pub fn validate(&self, record: &mut Value) -> bool {
        self.validate_in(EvalContext::shared_default(), record)
    }

    /// 对记录评估条件
    ///
    /// 查找过滤可能改写 `record` 中的字段，调用方负责传入隔离的副本。
    /// 非对象记录恒为 false。
    pub fn validate_in(&self, ctx: &EvalContext, record: &mut Value) -> bool {
        if !record.is_object() {
            return false;
        }
        if self.operator == Operator::Unknown {
            debug!(field = %self.field, "未知操作符，条件不成立");
            return false;
        }

        let expression = self.expression();
        let looked_up = lookup::apply(self, expression, record, ctx);
        let expected = match expression {
            Some(_) => Cow::Owned(looked_up.unwrap_or(Value::Null)),
            None => Cow::Borrowed(&self.value),
        };

        let field = path::get(record, &self.field);
        ConditionEvaluator::evaluate(field.as_deref(), self.operator, &expected)
    }
}
