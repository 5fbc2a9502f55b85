//! 归属判定：某个节点上的声明式属性属于哪个组件实例

use crate::dom::{Document, NodeId};

/// 组件根节点上的归属标记属性
pub const OWNER_ATTRIBUTE: &str = "data-controller";

/// 归属判定所需的最小树接口
pub trait TreeView {
    type Node: Copy;

    fn parent(&self, node: Self::Node) -> Option<Self::Node>;
    fn attribute(&self, node: Self::Node, name: &str) -> Option<&str>;
}

impl TreeView for Document {
    type Node = NodeId;

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        Document::parent(self, node)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        Document::attribute(self, node, name)
    }
}

/// 向上查找最近的归属标记（含自身）
pub fn nearest_owner<T: TreeView>(tree: &T, node: T::Node) -> Option<&str> {
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        if let Some(tag) = tree.attribute(current, OWNER_ATTRIBUTE) {
            return Some(tag);
        }
        cursor = tree.parent(current);
    }
    None
}

/// 隔离作用域内的节点无条件归属；否则最近的归属标记必须等于实例标签
pub fn belongs_to<T: TreeView>(tree: &T, node: T::Node, owner_tag: &str, isolated: bool) -> bool {
    if isolated {
        return true;
    }
    nearest_owner(tree, node) == Some(owner_tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// 不依赖 Document 的最小树
    struct MockTree {
        parents: HashMap<u32, u32>,
        owners: HashMap<u32, &'static str>,
    }

    impl TreeView for MockTree {
        type Node = u32;

        fn parent(&self, node: u32) -> Option<u32> {
            self.parents.get(&node).copied()
        }

        fn attribute(&self, node: u32, name: &str) -> Option<&str> {
            if name == OWNER_ATTRIBUTE {
                self.owners.get(&node).copied()
            } else {
                None
            }
        }
    }

    // 1 <x-parent> -> 2 <div> -> 3 <x-child> -> 4 <button>
    fn nested() -> MockTree {
        MockTree {
            parents: HashMap::from([(2, 1), (3, 2), (4, 3)]),
            owners: HashMap::from([(1, "x-parent"), (3, "x-child")]),
        }
    }

    #[test]
    fn test_nested_child_owns_its_subtree() {
        let tree = nested();
        assert!(belongs_to(&tree, 4, "x-child", false));
        assert!(!belongs_to(&tree, 4, "x-parent", false));
        assert!(belongs_to(&tree, 2, "x-parent", false));
    }

    #[test]
    fn test_component_root_belongs_to_itself() {
        let tree = nested();
        assert!(belongs_to(&tree, 3, "x-child", false));
        assert!(!belongs_to(&tree, 3, "x-parent", false));
    }

    #[test]
    fn test_isolated_scope_owns_everything() {
        let tree = nested();
        assert!(belongs_to(&tree, 4, "x-parent", true));
    }

    #[test]
    fn test_unowned_node() {
        let tree = MockTree {
            parents: HashMap::from([(2, 1)]),
            owners: HashMap::new(),
        };
        assert!(!belongs_to(&tree, 2, "x-any", false));
    }

    #[test]
    fn test_document_implementation() {
        let doc = Document::parse(
            r#"<x-parent data-controller="x-parent"><x-child data-controller="x-child"><b>in</b></x-child></x-parent>"#,
        )
        .unwrap();
        let b = doc.select_first(doc.root(), "b").unwrap();
        assert_eq!(nearest_owner(&doc, b), Some("x-child"));
    }
}
