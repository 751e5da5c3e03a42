//! JSON 桥接
//!
//! 面向外部调用方：输入 JSON 编码的记录与规则列表，依次应用每条规则，
//! 返回结果列表或序列化后的错误。

use serde_json::Value;

use crate::context::EvalContext;
use crate::error::Result;
use crate::rule::Rule;

#[derive(Debug, Clone, Default)]
pub struct Bridge {
    ctx: EvalContext,
}

impl Bridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(ctx: EvalContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &EvalContext {
        &self.ctx
    }

    /// 应用规则列表
    ///
    /// 未匹配的规则在结果中为 `null`；第一个结构化拒绝会中止处理并返回。
    pub fn apply_json(&self, record_json: &str, rules_json: &str) -> Result<Vec<Value>> {
        let rules: Vec<Rule> = serde_json::from_str(rules_json)?;
        let record: Value = serde_json::from_str(record_json)?;
        self.apply(&record, &rules)
    }

    pub fn apply(&self, record: &Value, rules: &[Rule]) -> Result<Vec<Value>> {
        let mut results = Vec::with_capacity(rules.len());
        for rule in rules {
            let result = rule.apply_in(&self.ctx, record, |d| d.cloned())?;
            results.push(result.unwrap_or(Value::Null));
        }
        Ok(results)
    }

    /// 返回结果列表的 JSON 文本，出错时返回错误文本
    pub fn apply_json_to_string(&self, record_json: &str, rules_json: &str) -> String {
        match self.apply_json(record_json, rules_json) {
            Ok(results) => Value::Array(results).to_string(),
            Err(e) => e.to_string(),
        }
    }
}
