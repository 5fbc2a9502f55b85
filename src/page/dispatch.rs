//! 事件分发与交互
//!
//! 监听以数据记录的形式保存，分发时按 (节点, 事件类型) 匹配。
//! 除 `load` 外的事件沿组合树冒泡，穿过隔离作用域的 host。

use super::Page;
use crate::binder::{DataBinding, Dispatch, EventBinding};
use crate::component::{InsertMode, InstanceId};
use crate::dom::NodeId;
use crate::event::{Event, EventType};
use log::warn;
use serde_json::Map;

/// 监听的动作
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Event(EventBinding),
    Data(DataBinding),
}

/// 一条已挂载的监听
#[derive(Debug, Clone, PartialEq)]
pub struct Listener {
    pub owner: InstanceId,
    pub binding: Binding,
}

impl Listener {
    pub fn node(&self) -> NodeId {
        match &self.binding {
            Binding::Event(binding) => binding.node,
            Binding::Data(binding) => binding.node,
        }
    }

    pub fn event_type(&self) -> EventType {
        match &self.binding {
            Binding::Event(binding) => binding.event_type,
            Binding::Data(binding) => binding.event_type(),
        }
    }
}

impl Page {
    /// 分发事件；返回 false 表示默认行为被阻止
    ///
    /// 冒泡路径在分发前确定，处理器改动文档不会改变后续经过的节点。
    pub fn dispatch(&mut self, event: &Event) -> bool {
        let path = self.propagation_path(event);
        for node in path {
            event.set_current_target(node);
            let matching: Vec<Listener> = self
                .listeners
                .iter()
                .filter(|listener| listener.node() == node && listener.event_type() == event.kind)
                .cloned()
                .collect();
            for listener in matching {
                // 前面的监听可能已经销毁了实例或移除了这条监听
                if !self.instances.contains_key(&listener.owner) || !self.listeners.contains(&listener) {
                    continue;
                }
                match &listener.binding {
                    Binding::Event(binding) => self.run_event_binding(listener.owner, binding, event),
                    Binding::Data(binding) => self.run_data_binding(listener.owner, binding),
                }
            }
            if event.propagation_stopped() {
                break;
            }
        }
        !event.default_prevented()
    }

    /// 目标节点及其组合树祖先；不冒泡的事件只有目标
    fn propagation_path(&self, event: &Event) -> Vec<NodeId> {
        let mut path = vec![event.target];
        if event.kind.bubbles() {
            let mut current = self.doc.composed_parent(event.target);
            while let Some(node) = current {
                path.push(node);
                current = self.doc.composed_parent(node);
            }
        }
        path
    }

    fn run_event_binding(&mut self, owner: InstanceId, binding: &EventBinding, event: &Event) {
        if binding.modifiers.prevent {
            event.prevent_default();
        }
        match &binding.dispatch {
            Dispatch::Method(method) => {
                self.call(owner, method, event);
            }
            Dispatch::Eval(code) => {
                let Page {
                    instances,
                    evaluator,
                    ..
                } = self;
                let Some(inst) = instances.get_mut(&owner) else {
                    return;
                };
                let calls = match evaluator.execute(code, &mut inst.state.fields) {
                    Ok(calls) => calls,
                    Err(e) => {
                        warn!("[{}] Failed to execute `{}`: {}", inst.state.tag, code, e);
                        return;
                    }
                };
                for method in calls {
                    self.call(owner, &method, event);
                }
            }
        }
    }

    fn run_data_binding(&mut self, owner: InstanceId, binding: &DataBinding) {
        let Some(inst) = self.instances.get_mut(&owner) else {
            return;
        };
        let value = binding.next_value(&self.doc, inst.state.fields.get(&binding.field));
        inst.state.fields.insert(binding.field.clone(), value);
        if binding.reactive {
            self.render(owner);
        }
    }

    /// 调用实例方法：先查内置方法，再交给控制器
    pub fn call(&mut self, id: InstanceId, method: &str, event: &Event) -> bool {
        let Some(inst) = self.instances.get(&id) else {
            return false;
        };
        let is_frame = inst.is_frame();
        let handled = match method {
            "render" => self.render(id),
            "rebind" => self.rebind(id),
            "refresh" if is_frame => self.refresh(id),
            "loadContent" if is_frame => {
                self.queue_load(id, InsertMode::Replace, Map::new());
                true
            }
            _ => self
                .with_context(id, |controller, cx| controller.call(cx, method, event))
                .unwrap_or(false),
        };
        if !handled {
            if let Some(inst) = self.instances.get(&id) {
                warn!("[{}] Unknown method `{}`", inst.tag(), method);
            }
        }
        self.apply_effects(id);
        handled
    }

    // ---- 交互 ----

    /// 在节点上触发事件
    pub fn fire(&mut self, node: NodeId, kind: EventType) -> bool {
        self.dispatch(&Event::new(kind, node))
    }

    pub fn click(&mut self, node: NodeId) -> bool {
        self.fire(node, EventType::Click)
    }

    /// 写入文本并触发 keyup
    pub fn type_text(&mut self, node: NodeId, text: &str) -> bool {
        self.doc.set_value(node, text);
        let event = match text.chars().last() {
            Some(last) => Event::new(EventType::KeyUp, node).with_key(&last.to_string()),
            None => Event::new(EventType::KeyUp, node),
        };
        self.dispatch(&event)
    }

    pub fn set_checked(&mut self, node: NodeId, checked: bool) -> bool {
        self.doc.set_checked(node, checked);
        self.fire(node, EventType::Change)
    }

    pub fn select_values(&mut self, node: NodeId, values: &[&str]) -> bool {
        self.doc.select_values(node, values);
        self.fire(node, EventType::Change)
    }

    pub fn set_value(&mut self, node: NodeId, value: &str) -> bool {
        self.doc.set_value(node, value);
        self.fire(node, EventType::Change)
    }
}
