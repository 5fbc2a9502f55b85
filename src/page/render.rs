//! 渲染与重新绑定

use super::{Binding, Listener, Page};
use crate::binder::template::stringify;
use crate::binder::{data, events, path, RenderMode, RenderTarget};
use crate::component::{InstanceId, InstanceScope};
use crate::dom::NodeId;
use crate::eval::Evaluator;
use log::{debug, warn};

impl Page {
    /// 用捕获的模板重新生成所有归属于实例的 `@render` 节点，然后重新绑定
    pub fn render(&mut self, id: InstanceId) -> bool {
        let Page {
            doc,
            instances,
            evaluator,
            ..
        } = self;
        let Some(inst) = instances.get_mut(&id) else {
            return false;
        };

        let targets = inst.state.scan_scope(doc).render_targets();
        inst.render_targets
            .retain(|node, _| targets.iter().any(|(target, _)| target == node));
        for (node, mode) in targets {
            let target = match inst.render_targets.get(&node) {
                Some(target) => target.clone(),
                None => {
                    let target = RenderTarget::capture(doc, node, mode);
                    inst.render_targets.insert(node, target.clone());
                    target
                }
            };
            let scope = inst.scope();
            let text = target.materialize(|expr| substitute(&**evaluator, &scope, target.mode, expr));
            if doc.set_inner_markup(node, &text).is_err() {
                doc.set_text(node, &text);
            }
        }

        self.with_context(id, |controller, cx| controller.rendered(cx));

        let Some(scope_root) = self.instances.get(&id).map(|inst| inst.state.scope_root) else {
            return false;
        };
        self.upgrade(scope_root);
        self.collect_detached();
        self.rebind(id);
        self.apply_effects(id);
        true
    }

    /// 移除实例记录的所有监听，重新扫描事件与数据绑定
    pub fn rebind(&mut self, id: InstanceId) -> bool {
        let Some(inst) = self.instances.get(&id) else {
            return false;
        };
        let scope = inst.state.scan_scope(&self.doc);
        let event_bindings = events::scan(&scope);
        let data_bindings = data::scan(&scope);
        let is_frame = inst.is_frame();

        self.listeners.retain(|listener| listener.owner != id);
        self.listeners.extend(
            event_bindings
                .into_iter()
                .map(Binding::Event)
                .chain(data_bindings.into_iter().map(Binding::Data))
                .map(|binding| Listener { owner: id, binding }),
        );

        if is_frame {
            self.resolve_mount_point(id);
        }
        true
    }

    /// 当前有效的挂载点；离开实例子树后重新查找
    pub(crate) fn resolve_mount_point(&mut self, id: InstanceId) -> Option<NodeId> {
        let inst = self.instances.get(&id)?;
        let host = inst.state.host;
        if let Some(current) = inst.loader.mount_point {
            if self.contains(host, current) {
                return Some(current);
            }
        }

        let state = &inst.state;
        let selected = state
            .field_str("mountPoint")
            .and_then(|selector| self.doc.select_first(state.scope_root, selector));
        let resolved = match selected {
            Some(node) => node,
            None => {
                debug!("{}: No mount point specified, defaulting to self", state.tag);
                state
                    .anchor
                    .filter(|anchor| self.contains(host, *anchor))
                    .unwrap_or(state.scope_root)
            }
        };

        if let Some(inst) = self.instances.get_mut(&id) {
            inst.loader.mount_point = Some(resolved);
        }
        Some(resolved)
    }

    /// 实例当前的监听数量
    pub fn listener_count(&self, id: InstanceId) -> usize {
        self.listeners.iter().filter(|listener| listener.owner == id).count()
    }

    pub fn listeners_of(&self, id: InstanceId) -> Vec<&Listener> {
        self.listeners.iter().filter(|listener| listener.owner == id).collect()
    }
}

/// 求值单个占位符，失败时替换为空串
fn substitute(evaluator: &dyn Evaluator, scope: &InstanceScope<'_>, mode: RenderMode, expr: &str) -> String {
    match mode {
        RenderMode::Path => path::resolve(scope, expr)
            .map(|value| stringify(&value))
            .unwrap_or_default(),
        RenderMode::Eval => match evaluator.evaluate(expr, scope) {
            Ok(value) => stringify(&value),
            Err(e) => {
                warn!("[{}] Failed to evaluate `{}`: {}", scope.state.tag, expr, e);
                String::new()
            }
        },
    }
}
