//! 模板渲染 - 处理 `${...}` 插值

use crate::dom::{Document, NodeId};
use serde_json::Value;

pub const RENDER_ATTRIBUTE: &str = "@render";
pub const RENDER_EVAL_ATTRIBUTE: &str = "@render.eval";

/// 占位符求值方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// 路径取值
    Path,
    /// 交给表达式求值器
    Eval,
}

impl RenderMode {
    /// 节点上的渲染标记，`@render.eval` 优先
    pub fn of(doc: &Document, node: NodeId) -> Option<Self> {
        if doc.has_attribute(node, RENDER_EVAL_ATTRIBUTE) {
            Some(RenderMode::Eval)
        } else if doc.has_attribute(node, RENDER_ATTRIBUTE) {
            Some(RenderMode::Path)
        } else {
            None
        }
    }
}

/// 渲染目标，模板在第一次渲染时捕获且之后不再改变
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    pub node: NodeId,
    pub template: String,
    pub mode: RenderMode,
}

impl RenderTarget {
    pub fn capture(doc: &Document, node: NodeId, mode: RenderMode) -> Self {
        Self {
            node,
            template: doc.text_content(node),
            mode,
        }
    }

    /// 基于捕获的模板生成新文本
    pub fn materialize<F: FnMut(&str) -> String>(&self, substitute: F) -> String {
        interpolate(&self.template, substitute)
    }
}

/// 替换 `${expr}`；未闭合的占位符原样保留，替换结果不会再次扫描
pub fn interpolate<F: FnMut(&str) -> String>(template: &str, mut substitute: F) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("${") {
        let Some(close) = rest[open + 2..].find('}') else {
            break;
        };
        let close = open + 2 + close;
        result.push_str(&rest[..open]);
        result.push_str(&substitute(&rest[open + 2..close]));
        rest = &rest[close + 1..];
    }

    result.push_str(rest);
    result
}

/// 值转文本：null 为空串，数组用逗号连接
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}
