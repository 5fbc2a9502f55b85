//! 单元测试模块
//! 覆盖组件生命周期、事件与数据绑定、渲染、归属判定和异步加载

pub mod loader_tests;

use crate::component::{Context, Controller, InstanceState};
use crate::error::FetchError;
use crate::event::Event;
use crate::loader::Fetcher;
use futures::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;
use url::Url;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 整数字段，兼容属性注入的字符串
pub fn int_field(cx: &Context<'_>, name: &str) -> i64 {
    match cx.field(name) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// 计数器：`increment` 加一并渲染，`total()` 为计算属性
#[derive(Default)]
pub struct CounterBox;

impl Controller for CounterBox {
    fn init(&mut self, cx: &mut Context<'_>, _args: &Value) {
        let count = int_field(cx, "count");
        cx.set_field("count", count);
    }

    fn call(&mut self, cx: &mut Context<'_>, method: &str, _event: &Event) -> bool {
        match method {
            "increment" => {
                let count = int_field(cx, "count");
                cx.set_field("count", count + 1);
                cx.render();
                true
            }
            "hit" => {
                let hits = int_field(cx, "hits");
                cx.set_field("hits", hits + 1);
                true
            }
            _ => false,
        }
    }

    fn computed(&self, state: &InstanceState, name: &str) -> Option<Value> {
        match name {
            "total" => {
                let count = state.fields.get("count").and_then(Value::as_i64).unwrap_or(0);
                Some(Value::from(count * 10))
            }
            _ => None,
        }
    }
}

/// 记录请求的假网络层，每个路径按顺序返回预设响应
#[derive(Default)]
pub struct FakeFetcher {
    routes: RefCell<HashMap<String, VecDeque<Route>>>,
    requests: RefCell<Vec<String>>,
}

struct Route {
    latency: Duration,
    /// None 表示网络错误
    body: Option<String>,
}

impl FakeFetcher {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn respond(&self, path: &str, latency: Duration, body: &str) {
        self.push(path, latency, Some(body.to_string()));
    }

    pub fn fail(&self, path: &str, latency: Duration) {
        self.push(path, latency, None);
    }

    fn push(&self, path: &str, latency: Duration, body: Option<String>) {
        self.routes
            .borrow_mut()
            .entry(path.to_string())
            .or_default()
            .push_back(Route { latency, body });
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, url: &Url) -> LocalBoxFuture<'static, Result<String, FetchError>> {
        self.requests.borrow_mut().push(url.to_string());
        let route = self
            .routes
            .borrow_mut()
            .get_mut(url.path())
            .and_then(VecDeque::pop_front);
        async move {
            match route {
                Some(route) => {
                    tokio::time::sleep(route.latency).await;
                    route
                        .body
                        .ok_or_else(|| FetchError::Transport("connection refused".to_string()))
                }
                None => Err(FetchError::Transport("no route".to_string())),
            }
        }
        .boxed_local()
    }
}
