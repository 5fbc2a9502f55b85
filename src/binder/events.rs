//! 事件绑定扫描
//!
//! 属性格式 `@{eventType}[.modifier...]="this.method()"`，修饰符顺序任意：
//! - `.prevent`: 先调用 `prevent_default()`
//! - `.eval`: 把属性值当作代码交给求值器

use super::ScanScope;
use crate::dom::NodeId;
use crate::event::EventType;

pub const MODIFIER_PREVENT: &str = "prevent";
pub const MODIFIER_EVAL: &str = "eval";

/// 修饰符集合
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub prevent: bool,
    pub eval: bool,
}

/// 解析事件属性名；未知事件、未知或重复的修饰符都不匹配
pub fn parse_event_attribute(name: &str) -> Option<(EventType, Modifiers)> {
    let rest = name.strip_prefix('@')?;
    let mut parts = rest.split('.');
    let event_type: EventType = parts.next()?.parse().ok()?;

    let mut modifiers = Modifiers::default();
    for part in parts {
        let flag = match part {
            MODIFIER_PREVENT => &mut modifiers.prevent,
            MODIFIER_EVAL => &mut modifiers.eval,
            _ => return None,
        };
        if *flag {
            return None;
        }
        *flag = true;
    }

    Some((event_type, modifiers))
}

/// 事件触发时执行的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// 调用实例方法，事件作为参数
    Method(String),
    /// 原样交给求值器执行
    Eval(String),
}

impl Dispatch {
    pub fn parse(value: &str, modifiers: Modifiers) -> Self {
        if modifiers.eval {
            return Dispatch::Eval(value.to_string());
        }
        Dispatch::Method(method_name(value))
    }
}

/// `this.method()` / `this.method` -> `method`
pub fn method_name(value: &str) -> String {
    let value = value.trim();
    let value = value.strip_prefix("this.").unwrap_or(value);
    let value = match value.find('(') {
        Some(paren) => &value[..paren],
        None => value,
    };
    value.trim_end_matches(';').trim().to_string()
}

/// 一条事件绑定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBinding {
    pub node: NodeId,
    pub event_type: EventType,
    pub modifiers: Modifiers,
    pub dispatch: Dispatch,
}

/// 扫描根节点及归属于本实例的后代
pub fn scan(scope: &ScanScope<'_>) -> Vec<EventBinding> {
    let mut bindings = Vec::new();
    for node in scope.owned_nodes() {
        for attr in scope.doc.attributes(node) {
            if let Some((event_type, modifiers)) = parse_event_attribute(&attr.name) {
                bindings.push(EventBinding {
                    node,
                    event_type,
                    modifiers,
                    dispatch: Dispatch::parse(&attr.value, modifiers),
                });
            }
        }
    }
    bindings
}
