//! 简单选择器：`tag`、`#id`、`.class`、`[attr]`、`[attr=value]`

use super::{Document, NodeId};

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Tag(String),
    Id(String),
    Class(String),
    Attribute { name: String, value: Option<String> },
}

impl Selector {
    pub fn parse(selector: &str) -> Option<Self> {
        let selector = selector.trim();
        if selector.is_empty() {
            return None;
        }

        if let Some(id) = selector.strip_prefix('#') {
            return Some(Selector::Id(id.to_string()));
        }
        if let Some(class) = selector.strip_prefix('.') {
            return Some(Selector::Class(class.to_string()));
        }
        if let Some(inner) = selector.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            let inner = inner.replace('\\', "");
            return Some(match inner.split_once('=') {
                Some((name, value)) => Selector::Attribute {
                    name: name.trim().to_string(),
                    value: Some(value.trim().trim_matches(|c| c == '"' || c == '\'').to_string()),
                },
                None => Selector::Attribute {
                    name: inner.trim().to_string(),
                    value: None,
                },
            });
        }
        Some(Selector::Tag(selector.to_ascii_lowercase()))
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(el) = doc.element(node) else {
            return false;
        };
        match self {
            Selector::Tag(tag) => el.tag == *tag,
            Selector::Id(id) => el.get_attr("id") == Some(id.as_str()),
            Selector::Class(class) => el.has_class(class),
            Selector::Attribute { name, value } => match (el.get_attr(name), value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            },
        }
    }
}
