//! 动态内容框架
//!
//! 根节点通过 `:url` 指定地址，`:param-*` 指定查询参数：
//!
//! ```html
//! <dynamic-frame :url="/some/url" :param-day="Monday"></dynamic-frame>
//! ```
//!
//! 可选属性：
//! - `mount-point`: 挂载点选择器，默认 `<self>` 或根节点
//! - `auto-refresh`: 周期刷新间隔，如 `10s`
//! - `delay`: 内容显示前的人为延迟

use crate::component::{Context, Controller, InsertMode};
use crate::util::parse_duration;
use serde_json::{Map, Value};

/// 加载能力：提供默认查询参数
pub trait ContentFrame {
    /// 调用方参数合并之前的默认参数
    fn params(&self, _fields: &Map<String, Value>) -> Map<String, Value> {
        Map::new()
    }
}

/// 框架初始化：默认延迟、自动刷新，并排队第一次加载
pub fn start(cx: &mut Context<'_>) {
    if cx.field("delay").is_none() {
        cx.set_field("delay", 0);
    }
    if let Some(interval) = cx.field_str("autoRefresh").map(str::to_string) {
        cx.set_auto_refresh(parse_duration(&interval));
    }
    cx.load_content(InsertMode::Replace, Map::new());
}

/// 默认框架控制器
#[derive(Debug, Default)]
pub struct DynamicFrame;

impl ContentFrame for DynamicFrame {}

impl Controller for DynamicFrame {
    fn init(&mut self, cx: &mut Context<'_>, _args: &Value) {
        start(cx);
    }

    fn frame(&self) -> Option<&dyn ContentFrame> {
        Some(self)
    }
}
