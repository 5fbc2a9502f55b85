//! 事件系统 - 声明式绑定支持的事件

use crate::dom::NodeId;
use std::cell::Cell;
use std::fmt;
use std::str::FromStr;

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Click,
    Change,
    MouseOver,
    MouseOut,
    KeyDown,
    KeyUp,
    Load,
}

impl EventType {
    pub const ALL: [EventType; 7] = [
        EventType::Click,
        EventType::Change,
        EventType::MouseOver,
        EventType::MouseOut,
        EventType::KeyDown,
        EventType::KeyUp,
        EventType::Load,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Click => "click",
            EventType::Change => "change",
            EventType::MouseOver => "mouseover",
            EventType::MouseOut => "mouseout",
            EventType::KeyDown => "keydown",
            EventType::KeyUp => "keyup",
            EventType::Load => "load",
        }
    }

    /// load 不冒泡
    pub fn bubbles(&self) -> bool {
        !matches!(self, EventType::Load)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or(())
    }
}

/// 分发中的事件
#[derive(Debug)]
pub struct Event {
    pub kind: EventType,
    /// 事件源节点
    pub target: NodeId,
    /// 键盘事件的按键
    pub key: Option<String>,
    current_target: Cell<NodeId>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

impl Event {
    pub fn new(kind: EventType, target: NodeId) -> Self {
        Self {
            kind,
            target,
            key: None,
            current_target: Cell::new(target),
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    /// 当前正在处理事件的节点
    pub fn current_target(&self) -> NodeId {
        self.current_target.get()
    }

    pub(crate) fn set_current_target(&self, node: NodeId) {
        self.current_target.set(node);
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}
