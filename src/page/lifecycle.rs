//! 组件生命周期：构造、升级与销毁

use super::Page;
use crate::binder::OWNER_ATTRIBUTE;
use crate::component::{ComponentInstance, Context, InstanceId, InstanceState};
use crate::dom::NodeId;
use crate::registry::RegistryEntry;
use crate::util::{attribute_to_field, parse_duration};
use log::{debug, warn};
use serde_json::{Map, Value};

/// 空组件默认插入的内容锚点
const SELF_TAG: &str = "self";
const USE_SHADOW_ATTRIBUTE: &str = ":use-shadow";

impl Page {
    /// 升级 scope（含自身）下所有已注册但尚未构造的元素
    ///
    /// 每轮先为所有待升级节点打上归属标记再逐个构造，
    /// 这样外层组件绑定时不会误认内层组件的节点。
    pub fn upgrade(&mut self, scope: NodeId) -> Vec<InstanceId> {
        let mut created = Vec::new();
        for _ in 0..self.config.max_upgrade_passes {
            let mut candidates = vec![scope];
            candidates.extend(self.doc.composed_descendants(scope));

            let pending: Vec<(NodeId, RegistryEntry)> = candidates
                .into_iter()
                .filter(|node| !self.by_node.contains_key(node))
                .filter_map(|node| {
                    self.registry
                        .lookup(&self.doc, node)
                        .map(|entry| (node, entry.clone()))
                })
                .collect();
            if pending.is_empty() {
                return created;
            }

            for (node, entry) in &pending {
                self.doc.set_attribute(*node, OWNER_ATTRIBUTE, &entry.tag);
            }
            for (node, entry) in pending {
                // 前面的构造可能已经升级或移除了这个节点
                if self.by_node.contains_key(&node) || !self.contains(scope, node) {
                    continue;
                }
                created.push(self.construct(node, &entry, &Value::Null));
            }
        }
        warn!(
            "Stopped upgrading after {} passes, nested components may be left unconstructed",
            self.config.max_upgrade_passes
        );
        created
    }

    /// 为节点构造实例
    pub(crate) fn construct(&mut self, node: NodeId, entry: &RegistryEntry, args: &Value) -> InstanceId {
        let tag = entry.tag.clone();

        if self.doc.is_blank(node) {
            if let Err(e) = self.doc.set_inner_markup(node, "<self></self>") {
                warn!("[{}] Failed to insert <self>: {}", tag, e);
            }
        }
        let anchor = self.doc.select_first(node, SELF_TAG);

        self.doc.set_attribute(node, OWNER_ATTRIBUTE, &tag);

        let mut fields = Map::new();
        fields.insert(
            "renderOnInit".to_string(),
            Value::String(self.config.render_on_init.to_string()),
        );
        for attr in self.doc.attributes(node) {
            if attr.name.starts_with('@') {
                continue;
            }
            fields.insert(attribute_to_field(&attr.name), Value::String(attr.value.clone()));
        }

        let (scope_root, isolated) = self.instantiate_template(node);

        let id = InstanceId(self.next_id);
        self.next_id += 1;
        let state = InstanceState {
            id,
            tag: tag.clone(),
            host: node,
            anchor,
            scope_root,
            isolated,
            fields,
        };
        self.instances.insert(id, ComponentInstance::new(state, entry.create()));
        self.by_node.insert(node, id);
        debug!("[{}] constructed {:?}", tag, id);

        self.rebind(id);
        self.with_context(id, |controller, cx| controller.init(cx, args));

        let auto_render = self.field(id, "autoRender").and_then(Value::as_str).map(parse_duration);
        if let Some(interval) = auto_render {
            self.set_auto_render(id, interval);
        }
        self.apply_effects(id);

        // 连接到文档时的首次渲染
        let render_on_init = self.field(id, "renderOnInit").and_then(Value::as_str) == Some("true");
        if self.doc.is_connected(node) && render_on_init && self.instances.contains_key(&id) {
            self.render(id);
        }
        id
    }

    /// 克隆第一个 `<template>` 的内容；带 `:use-shadow` 时放入隔离作用域
    fn instantiate_template(&mut self, node: NodeId) -> (NodeId, bool) {
        let Some(template) = self.doc.select_first(node, "template") else {
            return (node, false);
        };
        let content = self.doc.template_content(template);
        let (target, isolated) = if self.doc.has_attribute(template, USE_SHADOW_ATTRIBUTE) {
            (self.doc.attach_shadow(node), true)
        } else {
            (node, false)
        };
        if let Some(content) = content {
            self.doc.clone_children_into(content, target);
        }
        (target, isolated)
    }

    /// 从文档移除节点，销毁随之离开文档的实例
    pub fn remove_node(&mut self, node: NodeId) -> Vec<InstanceId> {
        self.doc.detach(node);
        self.collect_detached()
    }

    /// 销毁根节点已不在文档中的实例
    pub fn collect_detached(&mut self) -> Vec<InstanceId> {
        let mut detached: Vec<InstanceId> = self
            .instances
            .values()
            .filter(|inst| !self.doc.is_connected(inst.state.host))
            .map(|inst| inst.id())
            .collect();
        detached.sort();
        for id in &detached {
            self.teardown(*id);
        }
        self.sweep();
        detached
    }

    /// 释放被替换下来的节点，并清理仍指向它们的记录
    fn sweep(&mut self) {
        if self.doc.sweep() == 0 {
            return;
        }
        let doc = &self.doc;
        self.listeners.retain(|listener| doc.is_live(listener.node()));
        for inst in self.instances.values_mut() {
            inst.render_targets.retain(|node, _| doc.is_live(*node));
            if inst.loader.mount_point.is_some_and(|node| !doc.is_live(node)) {
                inst.loader.mount_point = None;
            }
            if inst.state.anchor.is_some_and(|node| !doc.is_live(node)) {
                inst.state.anchor = None;
            }
        }
        debug!("swept document, {} nodes live", doc.node_count());
    }

    /// 取消定时器与加载、移除监听，然后调用 `disconnected`
    pub fn teardown(&mut self, id: InstanceId) -> bool {
        let Some(mut inst) = self.instances.remove(&id) else {
            return false;
        };
        self.by_node.remove(&inst.state.host);
        self.timers.cancel_all(id);
        inst.loader.invalidate();
        self.listeners.retain(|listener| listener.owner != id);
        self.pending_loads.retain(|request| request.instance != id);

        let ComponentInstance {
            state,
            controller,
            effects,
            ..
        } = &mut inst;
        let mut cx = Context::new(&mut self.doc, state, effects);
        controller.disconnected(&mut cx);
        debug!("[{}] torn down {:?}", inst.state.tag, id);
        true
    }

    /// node 是否在 ancestor 的组合子树中（含自身）
    pub(crate) fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.doc.composed_parent(current);
        }
        false
    }
}
