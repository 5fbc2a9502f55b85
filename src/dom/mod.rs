//! 内存中的标记树
//!
//! 使用 `indextree` 的 arena 存储节点。`<template>` 的内容和隔离作用域
//! (shadow) 都是独立的 fragment 根节点，普通查询不会进入。

mod select;

pub use indextree::NodeId;
pub use select::Selector;

use crate::error::ParseError;
use crate::parser::markup::{escape_attribute, escape_text, MarkupNode, MarkupParser};
use indextree::Arena;
use log::debug;

/// 属性
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// 元素节点数据
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub tag: String,
    attrs: Vec<Attribute>,
    /// 复选框 / 单选框状态
    pub checked: bool,
    /// option 选中状态
    pub selected: bool,
    /// 表单控件的当前值，未设置时回退到 value 属性
    pub value: Option<String>,
    content: Option<NodeId>,
    shadow_root: Option<NodeId>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attrs
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    pub fn has_class(&self, class_name: &str) -> bool {
        self.get_attr("class")
            .map(|classes| classes.split_whitespace().any(|c| c == class_name))
            .unwrap_or(false)
    }
}

/// 节点类型
#[derive(Debug, Clone)]
pub enum NodeData {
    Document,
    Element(Element),
    Text(String),
    /// 模板内容或隔离作用域，host 为所属元素
    Fragment { host: Option<NodeId> },
}

/// 文档树
#[derive(Debug)]
pub struct Document {
    arena: Arena<NodeData>,
    root: NodeId,
    /// 被替换下来的子树根，`sweep` 时释放
    garbage: Vec<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeData::Document);
        Self {
            arena,
            root,
            garbage: Vec::new(),
        }
    }

    /// 从标记构建文档
    pub fn parse(markup: &str) -> Result<Self, ParseError> {
        let mut doc = Self::new();
        let root = doc.root;
        doc.append_markup(root, markup)?;
        Ok(doc)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// 节点仍在 arena 中（未被释放）
    pub fn is_live(&self, node: NodeId) -> bool {
        !node.is_removed(&self.arena)
    }

    /// arena 中存活的节点数
    pub fn node_count(&self) -> usize {
        self.arena.iter().filter(|node| !node.is_removed()).count()
    }

    pub fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.arena.get(node).map(|n| n.get())
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match self.data(node)? {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        match self.arena.get_mut(node)?.get_mut() {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.tag.as_str())
    }

    // ---- 结构 ----

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.arena.new_node(NodeData::Element(Element::new(tag)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.arena.new_node(NodeData::Text(text.to_string()))
    }

    fn create_fragment(&mut self, host: Option<NodeId>) -> NodeId {
        self.arena.new_node(NodeData::Fragment { host })
    }

    /// 追加为最后一个子节点；已释放的节点或成环的插入被忽略
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        if let Err(e) = parent.checked_append(child, &mut self.arena) {
            debug!("append {:?} to {:?} skipped: {}", child, parent, e);
        }
    }

    pub fn prepend(&mut self, parent: NodeId, child: NodeId) {
        if let Err(e) = parent.checked_prepend(child, &mut self.arena) {
            debug!("prepend {:?} to {:?} skipped: {}", child, parent, e);
        }
    }

    /// 从树中摘除节点；节点仍保留在 arena 中，由调用方持有
    pub fn detach(&mut self, node: NodeId) {
        if self.is_live(node) {
            node.detach(&mut self.arena);
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena.get(node)?.parent()
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        if !self.is_live(node) {
            return Vec::new();
        }
        node.children(&self.arena).collect()
    }

    /// 移除所有子节点，移除的子树在下次 `sweep` 时释放
    pub fn clear_children(&mut self, node: NodeId) {
        for child in self.children(node) {
            self.detach(child);
            self.garbage.push(child);
        }
    }

    /// 释放被替换下来且仍未重新挂载的子树，返回释放的节点数
    ///
    /// 调用方需先处理好仍指向这些节点的引用。
    pub fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for node in std::mem::take(&mut self.garbage) {
            if self.is_live(node) && self.parent(node).is_none() {
                freed += self.free_subtree(node);
            }
        }
        freed
    }

    /// 连同挂在元素上的模板内容与隔离作用域一起释放
    fn free_subtree(&mut self, node: NodeId) -> usize {
        let nodes: Vec<NodeId> = node.descendants(&self.arena).collect();
        let fragments: Vec<NodeId> = nodes
            .iter()
            .filter_map(|n| self.element(*n))
            .flat_map(|el| [el.content, el.shadow_root])
            .flatten()
            .collect();
        node.remove_subtree(&mut self.arena);
        nodes.len() + fragments.into_iter().map(|f| self.free_subtree(f)).sum::<usize>()
    }

    /// 先序遍历 scope 的后代（不含自身，不进入模板内容和隔离作用域）
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        if !self.is_live(scope) {
            return Vec::new();
        }
        scope.descendants(&self.arena).skip(1).collect()
    }

    /// 与 `descendants` 相同，但同时进入隔离作用域
    pub fn composed_descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for node in self.descendants(scope) {
            out.push(node);
            if let Some(shadow) = self.shadow_root(node) {
                out.push(shadow);
                out.extend(self.composed_descendants(shadow));
            }
        }
        out
    }

    /// 组合树中的父节点：隔离作用域的父节点是它的 host
    pub fn composed_parent(&self, node: NodeId) -> Option<NodeId> {
        match self.parent(node) {
            Some(parent) => Some(parent),
            None => match self.data(node)? {
                NodeData::Fragment { host } => *host,
                _ => None,
            },
        }
    }

    /// 节点是否挂在活动文档上
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = self.composed_parent(current);
        }
        false
    }

    // ---- 属性 ----

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.get_attr(name)
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    pub fn attributes(&self, node: NodeId) -> &[Attribute] {
        self.element(node).map(|el| el.attributes()).unwrap_or(&[])
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(node) {
            match el.attrs.iter().position(|attr| attr.name == name) {
                Some(index) => el.attrs[index].value = value.to_string(),
                None => el.attrs.push(Attribute {
                    name: name.to_string(),
                    value: value.to_string(),
                }),
            }
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(el) = self.element_mut(node) {
            el.attrs.retain(|attr| attr.name != name);
        }
    }

    /// 向上查找第一个带有指定属性的节点（含自身）
    pub fn closest_with_attribute(&self, node: NodeId, name: &str) -> Option<NodeId> {
        if !self.is_live(node) {
            return None;
        }
        node.ancestors(&self.arena)
            .find(|candidate| self.has_attribute(*candidate, name))
    }

    // ---- 文本与内容 ----

    /// 后代文本节点拼接
    pub fn text_content(&self, node: NodeId) -> String {
        if !self.is_live(node) {
            return String::new();
        }
        node.descendants(&self.arena)
            .filter_map(|n| match self.data(n) {
                Some(NodeData::Text(text)) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// 没有子节点或只有空白文本
    pub fn is_blank(&self, node: NodeId) -> bool {
        self.children(node).into_iter().all(|child| match self.data(child) {
            Some(NodeData::Text(text)) => text.trim().is_empty(),
            _ => false,
        })
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.clear_children(node);
        let text_node = self.create_text(text);
        self.append(node, text_node);
    }

    /// 解析标记并替换子节点；解析失败时保持原样
    pub fn set_inner_markup(&mut self, node: NodeId, markup: &str) -> Result<Vec<NodeId>, ParseError> {
        let parsed = MarkupParser::new(markup).parse()?;
        self.clear_children(node);
        Ok(self.insert_nodes(node, &parsed))
    }

    /// 解析标记并追加到末尾
    pub fn append_markup(&mut self, node: NodeId, markup: &str) -> Result<Vec<NodeId>, ParseError> {
        let parsed = MarkupParser::new(markup).parse()?;
        Ok(self.insert_nodes(node, &parsed))
    }

    /// 解析标记并插入到开头
    pub fn prepend_markup(&mut self, node: NodeId, markup: &str) -> Result<Vec<NodeId>, ParseError> {
        let parsed = MarkupParser::new(markup).parse()?;
        let fragment = self.create_fragment(None);
        let inserted = self.insert_nodes(fragment, &parsed);
        for child in inserted.iter().rev() {
            self.detach(*child);
            self.prepend(node, *child);
        }
        self.garbage.push(fragment);
        Ok(inserted)
    }

    fn insert_nodes(&mut self, parent: NodeId, nodes: &[MarkupNode]) -> Vec<NodeId> {
        let mut inserted = Vec::with_capacity(nodes.len());
        for node in nodes {
            let id = match node {
                MarkupNode::Text(text) => self.create_text(text),
                MarkupNode::Element {
                    tag,
                    attributes,
                    children,
                } => {
                    let id = self.create_element(tag);
                    for (name, value) in attributes {
                        self.set_attribute(id, name, value);
                    }
                    if let Some(el) = self.element_mut(id) {
                        el.checked = el.get_attr("checked").is_some();
                        el.selected = el.get_attr("selected").is_some();
                    }
                    if tag == "template" {
                        // 模板子节点进入独立的内容片段
                        let content = self.create_fragment(None);
                        self.insert_nodes(content, children);
                        if let Some(el) = self.element_mut(id) {
                            el.content = Some(content);
                        }
                    } else {
                        self.insert_nodes(id, children);
                    }
                    id
                }
            };
            self.append(parent, id);
            inserted.push(id);
        }
        inserted
    }

    // ---- 模板与隔离作用域 ----

    pub fn template_content(&self, node: NodeId) -> Option<NodeId> {
        self.element(node)?.content
    }

    pub fn shadow_root(&self, node: NodeId) -> Option<NodeId> {
        self.element(node)?.shadow_root
    }

    /// 为 host 创建隔离作用域，已存在时直接返回
    pub fn attach_shadow(&mut self, host: NodeId) -> NodeId {
        if let Some(existing) = self.shadow_root(host) {
            return existing;
        }
        let shadow = self.create_fragment(Some(host));
        if let Some(el) = self.element_mut(host) {
            el.shadow_root = Some(shadow);
        }
        shadow
    }

    /// 深拷贝 source 的所有子节点并追加到 dest
    pub fn clone_children_into(&mut self, source: NodeId, dest: NodeId) {
        for child in self.children(source) {
            let copy = self.deep_clone(child);
            self.append(dest, copy);
        }
    }

    fn deep_clone(&mut self, node: NodeId) -> NodeId {
        let data = match self.data(node) {
            Some(NodeData::Element(el)) => {
                let mut el = el.clone();
                el.shadow_root = None;
                NodeData::Element(el)
            }
            Some(other) => other.clone(),
            None => NodeData::Text(String::new()),
        };
        let template = self.template_content(node);
        let copy = self.arena.new_node(data);
        if let Some(content) = template {
            let fragment = self.create_fragment(None);
            self.clone_children_into(content, fragment);
            if let Some(el) = self.element_mut(copy) {
                el.content = Some(fragment);
            }
        }
        for child in self.children(node) {
            let child_copy = self.deep_clone(child);
            self.append(copy, child_copy);
        }
        copy
    }

    // ---- 查询 ----

    /// 第一个匹配选择器的后代
    pub fn select_first(&self, scope: NodeId, selector: &str) -> Option<NodeId> {
        let selector = Selector::parse(selector)?;
        self.descendants(scope)
            .into_iter()
            .find(|node| selector.matches(self, *node))
    }

    // ---- 表单控件 ----

    pub fn is_checked(&self, node: NodeId) -> bool {
        self.element(node).map(|el| el.checked).unwrap_or(false)
    }

    pub fn set_checked(&mut self, node: NodeId, checked: bool) {
        if let Some(el) = self.element_mut(node) {
            el.checked = checked;
        }
    }

    pub fn set_value(&mut self, node: NodeId, value: &str) {
        if let Some(el) = self.element_mut(node) {
            el.value = Some(value.to_string());
        }
    }

    /// 控件当前值
    pub fn control_value(&self, node: NodeId) -> String {
        let Some(el) = self.element(node) else {
            return String::new();
        };
        match el.tag.as_str() {
            "select" => self.selected_values(node).into_iter().next().unwrap_or_default(),
            "textarea" => el.value.clone().unwrap_or_else(|| self.text_content(node)),
            "input" if el.value.is_none() && el.get_attr("value").is_none() => {
                // 浏览器中复选框默认值为 "on"
                match el.get_attr("type") {
                    Some("checkbox") | Some("radio") => "on".to_string(),
                    _ => String::new(),
                }
            }
            _ => el
                .value
                .clone()
                .or_else(|| el.get_attr("value").map(str::to_string))
                .unwrap_or_default(),
        }
    }

    pub fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.descendants(select)
            .into_iter()
            .filter(|node| self.tag_name(*node) == Some("option"))
            .collect()
    }

    pub fn option_value(&self, option: NodeId) -> String {
        match self.attribute(option, "value") {
            Some(value) => value.to_string(),
            None => self.text_content(option).trim().to_string(),
        }
    }

    /// select 中所有选中 option 的值（按文档顺序）
    pub fn selected_values(&self, select: NodeId) -> Vec<String> {
        self.options(select)
            .into_iter()
            .filter(|option| self.element(*option).map(|el| el.selected).unwrap_or(false))
            .map(|option| self.option_value(option))
            .collect()
    }

    /// 按值选中 option；非 multiple 时只保留第一个
    pub fn select_values(&mut self, select: NodeId, values: &[&str]) {
        let multiple = self.has_attribute(select, "multiple");
        let mut picked = false;
        for option in self.options(select) {
            let value = self.option_value(option);
            let selected = values.contains(&value.as_str()) && (multiple || !picked);
            picked |= selected;
            if let Some(el) = self.element_mut(option) {
                el.selected = selected;
            }
        }
    }

    // ---- 序列化 ----

    pub fn inner_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_markup(child, &mut out);
        }
        out
    }

    pub fn outer_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    fn write_markup(&self, node: NodeId, out: &mut String) {
        match self.data(node) {
            Some(NodeData::Text(text)) => out.push_str(&escape_text(text)),
            Some(NodeData::Element(el)) => {
                out.push('<');
                out.push_str(&el.tag);
                for attr in &el.attrs {
                    out.push(' ');
                    out.push_str(&attr.name);
                    if !attr.value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape_attribute(&attr.value));
                        out.push('"');
                    }
                }
                out.push('>');
                if let Some(content) = el.content {
                    out.push_str(&self.inner_markup(content));
                }
                out.push_str(&self.inner_markup(node));
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
            Some(NodeData::Document) | Some(NodeData::Fragment { .. }) => {
                out.push_str(&self.inner_markup(node));
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize() {
        let doc = Document::parse(r#"<div id="a"><span>Hi</span></div>"#).unwrap();
        assert_eq!(doc.inner_markup(doc.root()), r#"<div id="a"><span>Hi</span></div>"#);
    }

    #[test]
    fn test_template_content_hidden_from_queries() {
        let doc = Document::parse("<x-a><template><b>inner</b></template></x-a>").unwrap();
        let tags: Vec<&str> = doc
            .descendants(doc.root())
            .into_iter()
            .filter_map(|n| doc.tag_name(n))
            .collect();
        assert_eq!(tags, vec!["x-a", "template"]);

        let template = doc.select_first(doc.root(), "template").unwrap();
        let content = doc.template_content(template).unwrap();
        assert_eq!(doc.inner_markup(content), "<b>inner</b>");
    }

    #[test]
    fn test_sweep_frees_replaced_children() {
        let mut doc = Document::parse("<div><p>old</p></div>").unwrap();
        let div = doc.select_first(doc.root(), "div").unwrap();
        let before = doc.node_count();
        let old = doc.children(div)[0];

        doc.set_inner_markup(div, "<template><i>t</i></template>").unwrap();
        assert!(doc.is_live(old));
        assert_eq!(doc.sweep(), 2);
        assert!(!doc.is_live(old));
        assert!(doc.data(old).is_none());
        assert!(doc.children(old).is_empty());
        assert!(!doc.is_connected(old));

        // 模板内容片段随模板一起释放
        doc.set_text(div, "x");
        assert_eq!(doc.sweep(), 4);
        assert_eq!(doc.node_count(), before - 1);

        doc.prepend_markup(div, "<b>y</b>").unwrap();
        assert_eq!(doc.sweep(), 1);
        assert_eq!(doc.inner_markup(div), "<b>y</b>x");
    }

    #[test]
    fn test_detached_nodes_survive_sweep() {
        let mut doc = Document::parse("<div><p>kept</p></div>").unwrap();
        let p = doc.select_first(doc.root(), "p").unwrap();
        doc.detach(p);
        assert_eq!(doc.sweep(), 0);
        assert_eq!(doc.text_content(p), "kept");

        // 重新挂载的子节点不会被释放
        let div = doc.select_first(doc.root(), "div").unwrap();
        doc.append(div, p);
        let q = doc.create_element("q");
        doc.append(q, p);
        doc.clear_children(q);
        doc.append(div, p);
        assert_eq!(doc.sweep(), 0);
        assert_eq!(doc.inner_markup(div), "<p>kept</p>");
    }

    #[test]
    fn test_shadow_scope_connected_through_host() {
        let mut doc = Document::parse("<x-a></x-a>").unwrap();
        let host = doc.select_first(doc.root(), "x-a").unwrap();
        let shadow = doc.attach_shadow(host);
        let inner = doc.create_element("p");
        doc.append(shadow, inner);

        assert!(doc.is_connected(inner));
        assert!(doc.select_first(doc.root(), "p").is_none());
        assert_eq!(doc.composed_descendants(doc.root()).len(), 3);
    }

    #[test]
    fn test_detached_nodes_not_connected() {
        let mut doc = Document::parse("<div><p>x</p></div>").unwrap();
        let p = doc.select_first(doc.root(), "p").unwrap();
        assert!(doc.is_connected(p));
        let div = doc.select_first(doc.root(), "div").unwrap();
        doc.clear_children(div);
        assert!(!doc.is_connected(p));
    }

    #[test]
    fn test_set_inner_markup_keeps_content_on_error() {
        let mut doc = Document::parse("<div>old</div>").unwrap();
        let div = doc.select_first(doc.root(), "div").unwrap();
        assert!(doc.set_inner_markup(div, "<a></b>").is_err());
        assert_eq!(doc.text_content(div), "old");
    }

    #[test]
    fn test_prepend_markup_keeps_order() {
        let mut doc = Document::parse("<div><i>c</i></div>").unwrap();
        let div = doc.select_first(doc.root(), "div").unwrap();
        doc.prepend_markup(div, "<i>a</i><i>b</i>").unwrap();
        assert_eq!(doc.text_content(div), "abc");
    }

    #[test]
    fn test_select_values() {
        let mut doc = Document::parse(
            r#"<select multiple><option value="x">X</option><option>y</option><option value="z">Z</option></select>"#,
        )
        .unwrap();
        let select = doc.select_first(doc.root(), "select").unwrap();
        doc.select_values(select, &["x", "y"]);
        assert_eq!(doc.selected_values(select), vec!["x", "y"]);
    }

    #[test]
    fn test_checkbox_default_value() {
        let doc = Document::parse(r#"<input type="checkbox">"#).unwrap();
        let input = doc.select_first(doc.root(), "input").unwrap();
        assert_eq!(doc.control_value(input), "on");
    }
}
