//! 控制器注册表 - 标签名到控制器工厂的映射

use crate::component::Controller;
use crate::dom::{Document, NodeId};
use crate::error::RegistryError;
use crate::util::pascal_to_kebab;
use log::{debug, error};
use std::rc::Rc;

pub type Factory = Rc<dyn Fn() -> Box<dyn Controller>>;

const CONTROLLER_SUFFIX: &str = "Controller";

/// 注册项
#[derive(Clone)]
pub struct RegistryEntry {
    /// 控制器的声明名，用于日志
    pub name: String,
    pub tag: String,
    /// 扩展的内置标签
    pub extends: Option<String>,
    factory: Factory,
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("extends", &self.extends)
            .finish()
    }
}

impl RegistryEntry {
    pub fn new(name: &str, tag: &str, extends: Option<&str>, factory: Factory) -> Self {
        Self {
            name: name.to_string(),
            tag: tag.to_ascii_lowercase(),
            extends: extends.map(str::to_string),
            factory,
        }
    }

    /// 标签名由类型名推导
    pub fn of<C: Controller + Default + 'static>() -> Self {
        let name = type_name::<C>();
        let tag = controller_tag(&name);
        Self::new(&name, &tag, C::extends_tag(), Rc::new(|| Box::new(C::default())))
    }

    /// 显式指定标签名
    pub fn named<C: Controller + Default + 'static>(tag: &str) -> Self {
        Self::new(&type_name::<C>(), tag, C::extends_tag(), Rc::new(|| Box::new(C::default())))
    }

    pub fn create(&self) -> Box<dyn Controller> {
        (self.factory)()
    }

    /// 节点是否由本项升级：自定义标签，或 `<button is="tag">`
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag_name(node) else {
            return false;
        };
        match &self.extends {
            Some(base) => tag == base && doc.attribute(node, "is") == Some(self.tag.as_str()),
            None => tag == self.tag,
        }
    }
}

/// `my_crate::ui::WordGridController<T>` -> `WordGridController`
fn type_name<C>() -> String {
    let full = std::any::type_name::<C>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// `WordGridController` -> `word-grid`
pub fn controller_tag(name: &str) -> String {
    let name = name.strip_suffix(CONTROLLER_SUFFIX).filter(|s| !s.is_empty()).unwrap_or(name);
    pascal_to_kebab(name)
}

/// 注册表
#[derive(Debug, Default, Clone)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 校验并加入注册项；标签必须包含连字符
    pub fn register(&mut self, entry: RegistryEntry) -> Result<(), RegistryError> {
        if !entry.tag.contains('-') {
            let err = RegistryError::MissingHyphen {
                name: entry.name.clone(),
                tag: entry.tag.clone(),
            };
            error!("{}", err);
            return Err(err);
        }
        if self.get(&entry.tag).is_some() {
            let err = RegistryError::Duplicate(entry.tag.clone());
            error!("[{}] {}", entry.name, err);
            return Err(err);
        }
        debug!("[{}] registered as <{}>", entry.name, entry.tag);
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|entry| entry.tag == tag)
    }

    /// 节点对应的注册项
    pub fn lookup(&self, doc: &Document, node: NodeId) -> Option<&RegistryEntry> {
        self.entries.iter().find(|entry| entry.matches(doc, node))
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.tag.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
