//! 错误消息模板
//!
//! 替换消息中的 `{{ path }}` 占位符（允许 `{{ .path }}` 写法），路径按记录解析。
//! 字符串原样输出，其他值输出 JSON 文本，缺失路径输出空串。

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

use crate::path;
use crate::value::display_string;

static RENDERER: LazyLock<TemplateRenderer> = LazyLock::new(TemplateRenderer::new);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("模板在位置 {position} 处有未闭合的占位符")]
    Unterminated { position: usize },
}

/// 模板渲染器
pub struct TemplateRenderer {
    /// 匹配 {{ path }} 格式的占位符
    placeholder_regex: Regex,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self {
            placeholder_regex: Regex::new(r"\{\{\s*\.?([A-Za-z0-9_.\-\[\]]*)\s*\}\}")
                .expect("placeholder pattern is a valid regex"),
        }
    }

    pub fn render(&self, template: &str, data: &Value) -> Result<String, TemplateError> {
        let mut output = String::with_capacity(template.len());
        let mut last = 0;

        for caps in self.placeholder_regex.captures_iter(template) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            push_literal(&mut output, template, last, whole.start())?;

            let path = caps.get(1).map_or("", |m| m.as_str());
            if let Some(value) = path::get(data, path) {
                output.push_str(&display_string(&value));
            }
            last = whole.end();
        }

        push_literal(&mut output, template, last, template.len())?;
        Ok(output)
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// 占位符之间的文本不能再包含 `{{`
fn push_literal(
    output: &mut String,
    template: &str,
    start: usize,
    end: usize,
) -> Result<(), TemplateError> {
    let literal = &template[start..end];
    if let Some(offset) = literal.find("{{") {
        return Err(TemplateError::Unterminated {
            position: start + offset,
        });
    }
    output.push_str(literal);
    Ok(())
}

/// 使用共享的渲染器渲染模板
pub fn render(template: &str, data: &Value) -> Result<String, TemplateError> {
    RENDERER.render(template, data)
}
