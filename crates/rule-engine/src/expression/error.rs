use thiserror::Error;

/// 过滤表达式错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("表达式解析失败: {0}")]
    Parse(String),

    #[error("未知函数: {0}")]
    UnknownFunction(String),

    #[error("函数 {name} 参数无效: {message}")]
    InvalidArguments { name: String, message: String },
}
