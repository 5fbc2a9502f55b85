//! 组件 - 控制器接口、钩子上下文与实例状态
//!
//! 控制器是实现 [`Controller`] 的普通结构体。钩子通过 [`Context`] 读写字段和
//! 自身子树，并以 [`Effect`] 的形式请求渲染、重新绑定、加载等操作；
//! 这些操作在钩子返回后由 `Page` 统一执行。

mod instance;

pub use instance::{ComponentInstance, InstanceScope, InstanceState, LoaderState};

use crate::dom::{Document, NodeId};
use crate::event::Event;
use crate::loader::ContentFrame;
use log::error;
use serde_json::{Map, Value};
use std::time::Duration;

/// 实例标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

/// 加载内容写入挂载点的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertMode {
    #[default]
    Replace,
    Append,
}

/// 钩子请求的后续操作
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Render,
    Rebind,
    /// 重新渲染并重新加载
    Refresh,
    Load {
        mode: InsertMode,
        values: Map<String, Value>,
    },
    AutoRender(Duration),
    AutoRefresh(Duration),
}

/// 控制器接口
///
/// 所有钩子都有默认实现，控制器只需实现自己关心的部分。
pub trait Controller {
    /// 构造完成、首次绑定之后调用
    fn init(&mut self, _cx: &mut Context<'_>, _args: &Value) {}

    /// 标记中 `@event="this.method()"` 调用的方法；未处理返回 false
    fn call(&mut self, _cx: &mut Context<'_>, _method: &str, _event: &Event) -> bool {
        false
    }

    /// 模板中可调用的计算属性 `${this.total()}`
    fn computed(&self, _state: &InstanceState, _name: &str) -> Option<Value> {
        None
    }

    /// 每次模板渲染之后调用
    fn rendered(&mut self, _cx: &mut Context<'_>) {}

    /// 实例离开文档后调用
    fn disconnected(&mut self, _cx: &mut Context<'_>) {}

    /// 异步加载能力
    fn frame(&self) -> Option<&dyn ContentFrame> {
        None
    }

    /// 扩展的内置标签，如 `button` 对应 `<button is="...">`
    fn extends_tag() -> Option<&'static str>
    where
        Self: Sized,
    {
        None
    }
}

/// 钩子上下文
pub struct Context<'a> {
    doc: &'a mut Document,
    state: &'a mut InstanceState,
    effects: &'a mut Vec<Effect>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(doc: &'a mut Document, state: &'a mut InstanceState, effects: &'a mut Vec<Effect>) -> Self {
        Self { doc, state, effects }
    }

    pub fn id(&self) -> InstanceId {
        self.state.id
    }

    pub fn tag(&self) -> &str {
        &self.state.tag
    }

    pub fn host(&self) -> NodeId {
        self.state.host
    }

    /// `<self>` 锚点
    pub fn anchor(&self) -> Option<NodeId> {
        self.state.anchor
    }

    pub fn scope_root(&self) -> NodeId {
        self.state.scope_root
    }

    pub fn state(&self) -> &InstanceState {
        &*self.state
    }

    // ---- 字段 ----

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.state.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) {
        self.state.fields.insert(name.to_string(), value.into());
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.state.fields
    }

    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.state.fields
    }

    // ---- 文档 ----

    pub fn doc(&self) -> &Document {
        &*self.doc
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        &mut *self.doc
    }

    /// `data-tag="name"` 或 `:tag="name"` 的第一个节点
    pub fn get_tag(&self, name: &str) -> Option<NodeId> {
        self.get_tag_all(name).into_iter().next()
    }

    /// 先列出全部 `data-tag`，再列出全部 `:tag`
    pub fn get_tag_all(&self, name: &str) -> Vec<NodeId> {
        let root = self.state.scope_root;
        let mut found = Vec::new();
        for attr in ["data-tag", ":tag"] {
            found.extend(
                self.doc
                    .descendants(root)
                    .into_iter()
                    .filter(|node| self.doc.attribute(*node, attr) == Some(name)),
            );
        }
        found
    }

    /// 用标记替换锚点（没有锚点时为作用域根）的内容
    pub fn set_self_markup(&mut self, markup: &str) -> bool {
        let target = self.state.anchor.unwrap_or(self.state.scope_root);
        match self.doc.set_inner_markup(target, markup) {
            Ok(_) => true,
            Err(e) => {
                error!("[{}] Failed to write markup: {}", self.state.tag, e);
                false
            }
        }
    }

    // ---- 请求操作 ----

    pub fn render(&mut self) {
        self.effects.push(Effect::Render);
    }

    pub fn rebind(&mut self) {
        self.effects.push(Effect::Rebind);
    }

    pub fn refresh(&mut self) {
        self.effects.push(Effect::Refresh);
    }

    pub fn load_content(&mut self, mode: InsertMode, values: Map<String, Value>) {
        self.effects.push(Effect::Load { mode, values });
    }

    /// 周期渲染，替换之前的设置
    pub fn set_auto_render(&mut self, interval: Option<Duration>) {
        match interval {
            Some(interval) => self.effects.push(Effect::AutoRender(interval)),
            None => error!("[{}] Undefined interval passed to setAutoRender", self.state.tag),
        }
    }

    /// 周期刷新，替换之前的设置
    pub fn set_auto_refresh(&mut self, interval: Option<Duration>) {
        match interval {
            Some(interval) => self.effects.push(Effect::AutoRefresh(interval)),
            None => error!("[{}] Undefined interval passed to setAutoRefresh", self.state.tag),
        }
    }
}
