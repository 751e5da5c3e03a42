//! 查找过滤表达式
//!
//! 一个小型布尔表达式语言，用于在比较前对查找数据逐行过滤：
//!
//! ```text
//! status == 'active' && region in ['north', 'south']
//! code == [data.order.code] or age(birthday) >= 18
//! ```
//!
//! `[data.<path>]` 是语法树中的记录引用节点，求值时直接从目标记录读取，
//! 不做源码文本替换。

pub mod ast;
mod error;
mod eval;
mod functions;
mod grammar;

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use winnow::Parser;

pub use ast::{CompareOp, Expr};
pub use error::ExpressionError;
pub use functions::{Function, FunctionRegistry};

use crate::value::is_truthy;

/// 求值作用域：目标记录与可用函数
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub record: &'a Value,
    pub functions: &'a FunctionRegistry,
}

impl<'a> Scope<'a> {
    pub fn new(record: &'a Value, functions: &'a FunctionRegistry) -> Self {
        Self { record, functions }
    }
}

/// 已解析的表达式
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    /// 解析表达式源码
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let root = grammar::parse_expression
            .parse(source)
            .map_err(|e| ExpressionError::Parse(e.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// 对一行数据求值，结果按真值规则转为布尔
    pub fn eval(&self, row: &Value, scope: &Scope<'_>) -> Result<bool, ExpressionError> {
        eval::evaluate(&self.root, row, scope).map(|v| is_truthy(&v))
    }

    /// 表达式引用的目标记录路径
    pub fn record_paths(&self) -> Vec<&str> {
        self.root.record_paths()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }
}

impl FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(source: &str, row: &Value, record: &Value) -> bool {
        let functions = FunctionRegistry::with_builtins();
        let scope = Scope::new(record, &functions);
        Expression::parse(source).unwrap().eval(row, &scope).unwrap()
    }

    #[test]
    fn test_eval_against_row() {
        let row = json!({"status": "active", "region": "north", "score": 80});
        let record = json!({});
        assert!(eval("status == 'active'", &row, &record));
        assert!(eval("score >= 60 && region in ['north', 'east']", &row, &record));
        assert!(!eval("score > 90 || status != 'active'", &row, &record));
    }

    #[test]
    fn test_eval_record_reference() {
        let row = json!({"code": "A1", "qty": 5});
        let record = json!({"order": {"code": "A1", "qty": "5"}});
        assert!(eval("code == [data.order.code]", &row, &record));
        // 记录中的数字字符串与行中的数字比较
        assert!(eval("qty == [data.order.qty]", &row, &record));
        assert!(!eval("code == [data.order.missing]", &row, &record));
    }

    #[test]
    fn test_record_paths() {
        let expr = Expression::parse("a == [data.x] && b == [data.y.z] || c == [data.x]").unwrap();
        assert_eq!(expr.record_paths(), vec!["x", "y.z"]);
    }

    #[test]
    fn test_from_str_and_display() {
        let expr: Expression = "a > 1".parse().unwrap();
        assert_eq!(expr.to_string(), "a > 1");
        assert!("a >".parse::<Expression>().is_err());
    }

    #[test]
    fn test_unknown_function_is_error() {
        let functions = FunctionRegistry::new();
        let record = json!({});
        let scope = Scope::new(&record, &functions);
        let expr = Expression::parse("nope(a)").unwrap();
        assert_eq!(
            expr.eval(&json!({"a": 1}), &scope),
            Err(ExpressionError::UnknownFunction("nope".to_string()))
        );
    }
}
