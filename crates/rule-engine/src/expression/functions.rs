//! 表达式函数注册表
//!
//! 注册表作为求值上下文的一部分显式传入，不存在进程级的全局注册，
//! 不同的上下文可以各自注册函数而互不影响。

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::error::ExpressionError;
use crate::datetime::{parse_datetime, years_between};
use crate::value::display_string;

/// 表达式函数
pub type Function = Arc<dyn Fn(&[Value]) -> Result<Value, ExpressionError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Function>,
}

impl FunctionRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建包含内置函数的注册表：`age`、`string`、`len`、`lower`、`upper`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register("age", builtin_age)
            .register("string", builtin_string)
            .register("len", builtin_len)
            .register("lower", builtin_lower)
            .register("upper", builtin_upper);
        registry
    }

    /// 注册函数，同名函数会被覆盖
    pub fn register<F>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: Fn(&[Value]) -> Result<Value, ExpressionError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

fn single_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value, ExpressionError> {
    match args {
        [arg] => Ok(arg),
        _ => Err(ExpressionError::InvalidArguments {
            name: name.to_string(),
            message: format!("需要 1 个参数，实际 {} 个", args.len()),
        }),
    }
}

/// 从给定日期到现在的整年数
fn builtin_age(args: &[Value]) -> Result<Value, ExpressionError> {
    let arg = single_arg("age", args)?;
    let date = arg
        .as_str()
        .and_then(parse_datetime)
        .ok_or_else(|| ExpressionError::InvalidArguments {
            name: "age".to_string(),
            message: format!("无法解析日期: {}", arg),
        })?;
    Ok(Value::from(years_between(date, Utc::now())))
}

fn builtin_string(args: &[Value]) -> Result<Value, ExpressionError> {
    let arg = single_arg("string", args)?;
    Ok(Value::String(display_string(arg)))
}

fn builtin_len(args: &[Value]) -> Result<Value, ExpressionError> {
    let len = match single_arg("len", args)? {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::Null => 0,
        _ => 1,
    };
    Ok(Value::from(len))
}

fn builtin_lower(args: &[Value]) -> Result<Value, ExpressionError> {
    let arg = single_arg("lower", args)?;
    Ok(Value::String(display_string(arg).to_lowercase()))
}

fn builtin_upper(args: &[Value]) -> Result<Value, ExpressionError> {
    let arg = single_arg("upper", args)?;
    Ok(Value::String(display_string(arg).to_uppercase()))
}
