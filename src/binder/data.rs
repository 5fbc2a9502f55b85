//! 双向数据绑定：`@bind[.reactive]="this.field"`

use super::ScanScope;
use crate::dom::{Document, NodeId};
use crate::event::EventType;
use serde_json::Value;

pub const BIND_ATTRIBUTE: &str = "@bind";
pub const BIND_REACTIVE_ATTRIBUTE: &str = "@bind.reactive";

/// 会按键更新的 input 类型
const TEXT_INPUT_TYPES: [&str; 6] = ["text", "search", "email", "password", "url", "tel"];

/// 控件种类，决定监听的事件和更新方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    TextInput,
    Checkbox,
    MultiSelect,
    Other,
}

impl ControlKind {
    pub fn of(doc: &Document, node: NodeId) -> Self {
        match doc.tag_name(node) {
            Some("input") => match doc.attribute(node, "type").map(str::to_ascii_lowercase) {
                None => ControlKind::TextInput,
                Some(kind) if TEXT_INPUT_TYPES.contains(&kind.as_str()) => ControlKind::TextInput,
                Some(kind) if kind == "checkbox" => ControlKind::Checkbox,
                Some(_) => ControlKind::Other,
            },
            Some("select") if doc.has_attribute(node, "multiple") => ControlKind::MultiSelect,
            _ => ControlKind::Other,
        }
    }

    /// 文本输入监听按键，其余监听 change
    pub fn event_type(&self) -> EventType {
        match self {
            ControlKind::TextInput => EventType::KeyUp,
            _ => EventType::Change,
        }
    }
}

/// 一条数据绑定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBinding {
    pub node: NodeId,
    pub field: String,
    pub kind: ControlKind,
    pub reactive: bool,
}

impl DataBinding {
    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// 根据控件当前状态计算字段的新值
    pub fn next_value(&self, doc: &Document, current: Option<&Value>) -> Value {
        match self.kind {
            ControlKind::Checkbox => {
                let value = doc.control_value(self.node);
                let mut items: Vec<Value> = match current {
                    Some(Value::Array(items)) => items.clone(),
                    _ => Vec::new(),
                };
                let present = items.iter().any(|item| item.as_str() == Some(value.as_str()));
                if doc.is_checked(self.node) {
                    if !present {
                        items.push(Value::String(value));
                    }
                } else {
                    items.retain(|item| item.as_str() != Some(value.as_str()));
                }
                Value::Array(items)
            }
            ControlKind::MultiSelect => Value::Array(
                doc.selected_values(self.node)
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            ),
            ControlKind::TextInput | ControlKind::Other => Value::String(doc.control_value(self.node)),
        }
    }
}

/// `this.field` -> `field`
pub fn field_name(value: &str) -> String {
    let value = value.trim();
    value.strip_prefix("this.").unwrap_or(value).to_string()
}

/// 扫描根节点及归属于本实例的后代
pub fn scan(scope: &ScanScope<'_>) -> Vec<DataBinding> {
    let mut bindings = Vec::new();
    for node in scope.owned_nodes() {
        for (name, reactive) in [(BIND_ATTRIBUTE, false), (BIND_REACTIVE_ATTRIBUTE, true)] {
            let Some(value) = scope.doc.attribute(node, name) else {
                continue;
            };
            let field = field_name(value);
            if field.is_empty() {
                continue;
            }
            bindings.push(DataBinding {
                node,
                field,
                kind: ControlKind::of(scope.doc, node),
                reactive,
            });
        }
    }
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn first(doc: &Document, selector: &str) -> NodeId {
        doc.select_first(doc.root(), selector).unwrap()
    }

    #[test]
    fn test_control_kinds() {
        let doc = Document::parse(
            r#"<div>
                <input id="a"><input id="b" type="email"><input id="c" type="checkbox">
                <input id="d" type="range"><select id="e" multiple></select><select id="f"></select>
                <textarea id="g"></textarea>
            </div>"#,
        )
        .unwrap();
        assert_eq!(ControlKind::of(&doc, first(&doc, "#a")), ControlKind::TextInput);
        assert_eq!(ControlKind::of(&doc, first(&doc, "#b")), ControlKind::TextInput);
        assert_eq!(ControlKind::of(&doc, first(&doc, "#c")), ControlKind::Checkbox);
        assert_eq!(ControlKind::of(&doc, first(&doc, "#d")), ControlKind::Other);
        assert_eq!(ControlKind::of(&doc, first(&doc, "#e")), ControlKind::MultiSelect);
        assert_eq!(ControlKind::of(&doc, first(&doc, "#f")), ControlKind::Other);
        assert_eq!(ControlKind::of(&doc, first(&doc, "#g")), ControlKind::Other);
        assert_eq!(ControlKind::TextInput.event_type(), EventType::KeyUp);
        assert_eq!(ControlKind::Checkbox.event_type(), EventType::Change);
    }

    #[test]
    fn test_checkbox_keeps_ordered_set() {
        let mut doc = Document::parse(r#"<input type="checkbox" value="a">"#).unwrap();
        let node = first(&doc, "input");
        let binding = DataBinding { node, field: "selected".into(), kind: ControlKind::Checkbox, reactive: false };

        doc.set_checked(node, true);
        let current = json!(["b"]);
        assert_eq!(binding.next_value(&doc, Some(&current)), json!(["b", "a"]));

        let current = json!(["a", "b"]);
        assert_eq!(binding.next_value(&doc, Some(&current)), json!(["a", "b"]));

        doc.set_checked(node, false);
        assert_eq!(binding.next_value(&doc, Some(&current)), json!(["b"]));
        assert_eq!(binding.next_value(&doc, None), json!([]));
    }

    #[test]
    fn test_scan_reads_field_and_reactive_flag() {
        let doc = Document::parse(
            r#"<x-a data-controller="x-a"><input @bind.reactive="this.name"><select @bind="pick"></select></x-a>"#,
        )
        .unwrap();
        let host = first(&doc, "x-a");
        let scope = ScanScope { doc: &doc, host, root: host, tag: "x-a", isolated: false };

        let bindings = scan(&scope);
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].field, "name");
        assert!(bindings[0].reactive);
        assert_eq!(bindings[1].field, "pick");
        assert!(!bindings[1].reactive);
    }
}
