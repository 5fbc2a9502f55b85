//! 声明式绑定：归属判定、路径解析、模板渲染、事件与数据绑定扫描

pub mod data;
pub mod events;
pub mod ownership;
pub mod path;
pub mod template;

pub use data::{ControlKind, DataBinding};
pub use events::{Dispatch, EventBinding, Modifiers};
pub use ownership::{belongs_to, TreeView, OWNER_ATTRIBUTE};
pub use path::PathScope;
pub use template::{RenderMode, RenderTarget};

use crate::dom::{Document, NodeId};

/// 一次扫描的范围
#[derive(Debug, Clone, Copy)]
pub struct ScanScope<'a> {
    pub doc: &'a Document,
    /// 组件根节点
    pub host: NodeId,
    /// 查询根：组件自身或隔离作用域
    pub root: NodeId,
    pub tag: &'a str,
    pub isolated: bool,
}

impl<'a> ScanScope<'a> {
    pub fn owns(&self, node: NodeId) -> bool {
        belongs_to(self.doc, node, self.tag, self.isolated)
    }

    /// 作用域内归属于本实例的后代，按文档顺序
    pub fn owned_descendants(&self) -> Vec<NodeId> {
        self.doc
            .descendants(self.root)
            .into_iter()
            .filter(|node| self.doc.is_element(*node) && self.owns(*node))
            .collect()
    }

    /// 根节点加上归属于本实例的后代
    pub fn owned_nodes(&self) -> Vec<NodeId> {
        let mut nodes = vec![self.host];
        nodes.extend(
            self.owned_descendants()
                .into_iter()
                .filter(|node| *node != self.host),
        );
        nodes
    }

    /// 归属于本实例的渲染目标
    pub fn render_targets(&self) -> Vec<(NodeId, RenderMode)> {
        self.owned_descendants()
            .into_iter()
            .filter_map(|node| RenderMode::of(self.doc, node).map(|mode| (node, mode)))
            .collect()
    }
}
