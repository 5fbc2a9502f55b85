//! 组件实例

use super::{Controller, Effect, InstanceId};
use crate::binder::{PathScope, RenderTarget, ScanScope};
use crate::dom::{Document, NodeId};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// 钩子可见的实例状态
#[derive(Debug, Clone)]
pub struct InstanceState {
    pub id: InstanceId,
    pub tag: String,
    /// 组件根节点
    pub host: NodeId,
    /// 第一个 `<self>` 元素
    pub anchor: Option<NodeId>,
    /// 查询根：自身或隔离作用域
    pub scope_root: NodeId,
    pub isolated: bool,
    /// 由属性注入的字段，键为 camelCase
    pub fields: Map<String, Value>,
}

impl InstanceState {
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub(crate) fn scan_scope<'a>(&'a self, doc: &'a Document) -> ScanScope<'a> {
        ScanScope {
            doc,
            host: self.host,
            root: self.scope_root,
            tag: &self.tag,
            isolated: self.isolated,
        }
    }
}

/// 加载器状态：只有当前代的请求可以写入挂载点
#[derive(Debug, Default)]
pub struct LoaderState {
    pub generation: u64,
    pub pending: Vec<CancellationToken>,
    pub mount_point: Option<NodeId>,
}

impl LoaderState {
    /// 取消所有未完成的请求并开始新的一代
    pub fn begin(&mut self) -> (u64, CancellationToken) {
        for token in self.pending.drain(..) {
            token.cancel();
        }
        self.generation += 1;
        let token = CancellationToken::new();
        self.pending.push(token.clone());
        (self.generation, token)
    }

    pub fn is_current(&self, generation: u64, token: &CancellationToken) -> bool {
        self.generation == generation && !token.is_cancelled()
    }

    /// 当前代结束后不再需要保留它的 token
    pub fn settle(&mut self, generation: u64) {
        if self.generation == generation {
            self.pending.clear();
        }
    }

    /// 使所有进行中的请求失效
    pub fn invalidate(&mut self) {
        for token in self.pending.drain(..) {
            token.cancel();
        }
        self.generation += 1;
    }
}

/// 一个活动的组件实例
pub struct ComponentInstance {
    pub state: InstanceState,
    pub(crate) controller: Box<dyn Controller>,
    pub(crate) effects: Vec<Effect>,
    /// 每个渲染目标只捕获一次模板
    pub(crate) render_targets: HashMap<NodeId, RenderTarget>,
    pub(crate) loader: LoaderState,
}

impl ComponentInstance {
    pub(crate) fn new(state: InstanceState, controller: Box<dyn Controller>) -> Self {
        Self {
            state,
            controller,
            effects: Vec::new(),
            render_targets: HashMap::new(),
            loader: LoaderState::default(),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.state.id
    }

    pub fn tag(&self) -> &str {
        &self.state.tag
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.state.fields.get(name)
    }

    pub fn is_frame(&self) -> bool {
        self.controller.frame().is_some()
    }

    pub fn scope(&self) -> InstanceScope<'_> {
        InstanceScope {
            state: &self.state,
            controller: self.controller.as_ref(),
        }
    }
}

/// 路径解析与求值器看到的实例
pub struct InstanceScope<'a> {
    pub state: &'a InstanceState,
    pub controller: &'a dyn Controller,
}

impl PathScope for InstanceScope<'_> {
    fn field(&self, name: &str) -> Option<&Value> {
        self.state.fields.get(name)
    }

    fn has_callable(&self, name: &str) -> bool {
        self.controller.computed(self.state, name).is_some()
    }

    fn call(&self, name: &str) -> Option<Value> {
        self.controller.computed(self.state, name)
    }

    fn snapshot(&self) -> Value {
        Value::Object(self.state.fields.clone())
    }
}
