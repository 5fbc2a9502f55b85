//! 页面 - 文档树、注册表与所有活动实例的唯一持有者
//!
//! 所有可变状态都在 `Page` 内部。异步加载通过 [`SharedPage`] 共享，
//! 借用从不跨越 await。

mod dispatch;
mod lifecycle;
mod render;

pub use dispatch::{Binding, Listener};

use crate::component::{ComponentInstance, Context, Controller, Effect, InsertMode, InstanceId};
use crate::config::EngineConfig;
use crate::dom::{Document, NodeId};
use crate::error::{ParseError, RegistryError};
use crate::eval::{Evaluator, PathEvaluator};
use crate::loader::{Fetcher, UreqFetcher};
use crate::registry::{Registry, RegistryEntry};
use crate::timer::{TimerPurpose, Timers};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub type SharedPage = Rc<RefCell<Page>>;

/// 排队等待执行的加载请求
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub instance: InstanceId,
    pub mode: InsertMode,
    pub values: Map<String, Value>,
}

pub struct Page {
    pub(crate) doc: Document,
    pub(crate) registry: Registry,
    pub(crate) config: EngineConfig,
    pub(crate) instances: HashMap<InstanceId, ComponentInstance>,
    pub(crate) by_node: HashMap<NodeId, InstanceId>,
    pub(crate) listeners: Vec<Listener>,
    pub(crate) timers: Timers,
    pub(crate) evaluator: Box<dyn Evaluator>,
    pub(crate) fetcher: Rc<dyn Fetcher>,
    pub(crate) pending_loads: Vec<LoadRequest>,
    next_id: u64,
}

impl Page {
    /// 从标记创建页面，使用默认配置
    pub fn new(markup: &str) -> Result<Self, ParseError> {
        Ok(Self::from_document(Document::parse(markup)?, EngineConfig::default()))
    }

    pub fn from_document(doc: Document, config: EngineConfig) -> Self {
        let fetcher = Rc::new(UreqFetcher::new(config.fetch_timeout()));
        Self {
            doc,
            registry: Registry::new(),
            config,
            instances: HashMap::new(),
            by_node: HashMap::new(),
            listeners: Vec::new(),
            timers: Timers::new(),
            evaluator: Box::new(PathEvaluator),
            fetcher,
            pending_loads: Vec::new(),
            next_id: 1,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Box<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Rc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn into_shared(self) -> SharedPage {
        Rc::new(RefCell::new(self))
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ---- 注册 ----

    /// 注册一个控制器并升级文档中已有的节点
    pub fn register<C: Controller + Default + 'static>(&mut self) -> Result<Vec<InstanceId>, RegistryError> {
        self.register_entry(RegistryEntry::of::<C>())
    }

    pub fn register_entry(&mut self, entry: RegistryEntry) -> Result<Vec<InstanceId>, RegistryError> {
        self.registry.register(entry)?;
        let root = self.doc.root();
        Ok(self.upgrade(root))
    }

    /// 批量注册：先为所有待注册标签的现有节点打上归属标记，再逐个注册
    pub fn register_all(&mut self, entries: Vec<RegistryEntry>) -> Vec<InstanceId> {
        let root = self.doc.root();
        for node in self.doc.composed_descendants(root) {
            if let Some(entry) = entries.iter().find(|entry| entry.matches(&self.doc, node)) {
                let tag = entry.tag.clone();
                self.doc.set_attribute(node, crate::binder::OWNER_ATTRIBUTE, &tag);
            }
        }
        let mut created = Vec::new();
        for entry in entries {
            if let Ok(ids) = self.register_entry(entry) {
                created.extend(ids);
            }
        }
        created
    }

    // ---- 实例 ----

    pub fn instance(&self, id: InstanceId) -> Option<&ComponentInstance> {
        self.instances.get(&id)
    }

    /// 节点上的实例
    pub fn instance_at(&self, node: NodeId) -> Option<InstanceId> {
        self.by_node.get(&node).copied()
    }

    /// 指定标签的所有实例，按创建顺序
    pub fn instances_of(&self, tag: &str) -> Vec<InstanceId> {
        let mut ids: Vec<InstanceId> = self
            .instances
            .values()
            .filter(|inst| inst.tag() == tag)
            .map(|inst| inst.id())
            .collect();
        ids.sort();
        ids
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn field(&self, id: InstanceId, name: &str) -> Option<&Value> {
        self.instances.get(&id)?.field(name)
    }

    pub fn set_field(&mut self, id: InstanceId, name: &str, value: impl Into<Value>) -> bool {
        match self.instances.get_mut(&id) {
            Some(inst) => {
                inst.state.fields.insert(name.to_string(), value.into());
                true
            }
            None => false,
        }
    }

    /// 组件内 `data-tag` / `:tag` 查找
    pub fn get_tag(&mut self, id: InstanceId, name: &str) -> Option<NodeId> {
        self.with_context(id, |_, cx| cx.get_tag(name)).flatten()
    }

    pub fn get_tag_all(&mut self, id: InstanceId, name: &str) -> Vec<NodeId> {
        self.with_context(id, |_, cx| cx.get_tag_all(name)).unwrap_or_default()
    }

    /// 加载内容写入的节点
    pub fn mount_point(&self, id: InstanceId) -> Option<NodeId> {
        self.instances.get(&id)?.loader.mount_point
    }

    // ---- 定时器 ----

    pub fn set_auto_render(&mut self, id: InstanceId, interval: Option<Duration>) {
        if self.with_context(id, |_, cx| cx.set_auto_render(interval)).is_some() {
            self.apply_effects(id);
        }
    }

    pub fn set_auto_refresh(&mut self, id: InstanceId, interval: Option<Duration>) {
        if self.with_context(id, |_, cx| cx.set_auto_refresh(interval)).is_some() {
            self.apply_effects(id);
        }
    }

    pub fn timer_interval(&self, id: InstanceId, purpose: TimerPurpose) -> Option<Duration> {
        self.timers.interval(id, purpose)
    }

    /// 执行到期的定时器；刷新产生的加载请求留在队列中
    pub fn fire_timers(&mut self, now: Instant) -> usize {
        let due = self.timers.due(now);
        for (id, purpose) in &due {
            match purpose {
                TimerPurpose::AutoRender => {
                    self.render(*id);
                }
                TimerPurpose::AutoRefresh => {
                    self.refresh(*id);
                }
            }
        }
        due.len()
    }

    // ---- 加载队列 ----

    /// 重新渲染并排队一次替换加载
    pub fn refresh(&mut self, id: InstanceId) -> bool {
        if !self.instances.contains_key(&id) {
            return false;
        }
        self.queue_load(id, InsertMode::Replace, Map::new());
        self.render(id)
    }

    pub fn queue_load(&mut self, id: InstanceId, mode: InsertMode, values: Map<String, Value>) {
        self.pending_loads.push(LoadRequest {
            instance: id,
            mode,
            values,
        });
    }

    pub fn pending_loads(&self) -> &[LoadRequest] {
        &self.pending_loads
    }

    pub fn take_pending_loads(&mut self) -> Vec<LoadRequest> {
        std::mem::take(&mut self.pending_loads)
    }

    // ---- 钩子与副作用 ----

    /// 以实例上下文调用控制器
    pub(crate) fn with_context<R>(
        &mut self,
        id: InstanceId,
        f: impl FnOnce(&mut dyn Controller, &mut Context<'_>) -> R,
    ) -> Option<R> {
        let Page { doc, instances, .. } = self;
        let ComponentInstance {
            state,
            controller,
            effects,
            ..
        } = instances.get_mut(&id)?;
        let mut cx = Context::new(doc, state, effects);
        Some(f(controller.as_mut(), &mut cx))
    }

    /// 执行钩子排队的副作用，直到队列为空
    pub(crate) fn apply_effects(&mut self, id: InstanceId) {
        loop {
            let effects = match self.instances.get_mut(&id) {
                Some(inst) if !inst.effects.is_empty() => std::mem::take(&mut inst.effects),
                _ => return,
            };
            for effect in effects {
                match effect {
                    Effect::Render => {
                        self.render(id);
                    }
                    Effect::Rebind => {
                        self.rebind(id);
                    }
                    Effect::Refresh => {
                        self.refresh(id);
                    }
                    Effect::Load { mode, values } => self.queue_load(id, mode, values),
                    Effect::AutoRender(interval) => {
                        self.timers
                            .schedule(id, TimerPurpose::AutoRender, interval, now());
                    }
                    Effect::AutoRefresh(interval) => {
                        self.timers
                            .schedule(id, TimerPurpose::AutoRefresh, interval, now());
                    }
                }
            }
        }
    }
}

/// 与 tokio 时钟一致的当前时间，测试中可被暂停和推进
pub(crate) fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
