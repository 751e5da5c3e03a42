//! 评估上下文
//!
//! 表达式函数注册表通过上下文显式传入规则评估，多个上下文可以并存。

use serde_json::Value;
use std::sync::{Arc, LazyLock};

use crate::expression::{FunctionRegistry, Scope};

static DEFAULT_CONTEXT: LazyLock<EvalContext> =
    LazyLock::new(|| EvalContext::new(FunctionRegistry::with_builtins()));

#[derive(Debug, Clone)]
pub struct EvalContext {
    functions: Arc<FunctionRegistry>,
}

impl EvalContext {
    pub fn new(functions: FunctionRegistry) -> Self {
        Self {
            functions: Arc::new(functions),
        }
    }

    /// 共享同一个注册表
    pub fn with_shared(functions: Arc<FunctionRegistry>) -> Self {
        Self { functions }
    }

    /// 仅包含内置函数的进程级默认上下文（只读）
    pub fn shared_default() -> &'static EvalContext {
        &DEFAULT_CONTEXT
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// 以 `record` 为目标记录构造表达式作用域
    pub fn scope<'a>(&'a self, record: &'a Value) -> Scope<'a> {
        Scope::new(record, &self.functions)
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        DEFAULT_CONTEXT.clone()
    }
}
