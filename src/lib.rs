//! Mini Binder - 声明式绑定引擎
//! 把普通标记节点升级为有状态、可响应的组件：属性注入、事件与数据绑定、
//! 模板渲染，以及可取消的异步内容加载

// 标记树与解析器
pub mod dom;
pub mod parser;

// 声明式绑定
pub mod binder;

// 组件与控制器
pub mod component;
pub mod registry;

// 事件系统
pub mod event;

// 表达式求值
pub mod eval;

// 页面运行时
pub mod page;
pub mod timer;

// 异步加载
pub mod loader;

pub mod config;
pub mod error;
pub mod util;

pub use component::{Context, Controller, Effect, InsertMode, InstanceId, InstanceState};
pub use config::EngineConfig;
pub use dom::{Document, NodeId};
pub use error::{ConfigError, EvalError, FetchError, ParseError, RegistryError};
pub use eval::{Evaluator, PathEvaluator, QuickJsEvaluator};
pub use event::{Event, EventType};
pub use loader::{ContentFrame, DynamicFrame, Fetcher, UreqFetcher};
pub use page::{Page, SharedPage};
pub use registry::{Registry, RegistryEntry};

// 单元测试
#[cfg(test)]
mod tests;
