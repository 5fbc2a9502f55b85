//! 异步内容加载
//!
//! 每次加载先取消实例所有未完成的请求并开始新的一代，
//! 然后同时等待请求与 `delay` 计时器。两者都结束后，
//! 只有仍是当前代的请求才会写入挂载点。

mod fetch;
mod frame;

pub use fetch::{Fetcher, UreqFetcher};
pub use frame::{start as start_frame, ContentFrame, DynamicFrame};

use crate::binder::template::stringify;
use crate::component::{InsertMode, InstanceId};
use crate::dom::Attribute;
use crate::error::FetchError;
use crate::page::{Page, SharedPage};
use crate::util::parse_duration;
use futures::future::{join, join_all};
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, error, warn};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

const PARAM_PREFIX: &str = ":param-";

/// 一次已开始的请求
struct Request {
    url: Url,
    delay: Duration,
    generation: u64,
    token: CancellationToken,
    fetcher: Rc<dyn Fetcher>,
}

/// 加载内容到实例的挂载点；被取代、失败或取消时返回 false
pub async fn load_content(page: &SharedPage, id: InstanceId, mode: InsertMode, values: Map<String, Value>) -> bool {
    let request = match page.borrow_mut().begin_load(id, &values) {
        Some(request) => request,
        None => return false,
    };
    debug!("{:?} loading {}", id, request.url);

    let token = request.token.clone();
    let fetch = request.fetcher.fetch(&request.url);
    let fetch = async move {
        tokio::select! {
            _ = token.cancelled() => Err(FetchError::Cancelled),
            result = fetch => result,
        }
    };
    let (result, ()) = join(fetch, tokio::time::sleep(request.delay)).await;

    page.borrow_mut()
        .finish_load(id, request.generation, &request.token, mode, result)
}

/// 重新渲染并重新加载
pub async fn refresh(page: &SharedPage, id: InstanceId) -> bool {
    if !page.borrow_mut().render(id) {
        return false;
    }
    load_content(page, id, InsertMode::Replace, Map::new()).await
}

/// 并发执行所有排队的加载，直到队列为空
pub async fn flush(page: &SharedPage) -> Vec<bool> {
    let mut results = Vec::new();
    loop {
        let requests = page.borrow_mut().take_pending_loads();
        if requests.is_empty() {
            return results;
        }
        let loads = requests
            .into_iter()
            .map(|request| load_content(page, request.instance, request.mode, request.values));
        results.extend(join_all(loads).await);
    }
}

/// 触发到期的定时器，然后执行它们排队的加载
pub async fn tick(page: &SharedPage, now: Instant) -> Vec<bool> {
    page.borrow_mut().fire_timers(now);
    flush(page).await
}

/// 按固定间隔驱动定时器，页面被释放后退出
///
/// 排队的加载在每次 tick 时立即开始，与定时器并发执行；
/// 进行中的加载不会推迟任何实例的定时器。
pub async fn run_timers(page: Weak<RefCell<Page>>, resolution: Duration) {
    let mut interval = tokio::time::interval(resolution);
    let mut loads = FuturesUnordered::new();
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let Some(page) = page.upgrade() else {
                    return;
                };
                let requests = {
                    let mut page = page.borrow_mut();
                    page.fire_timers(crate::page::now());
                    page.take_pending_loads()
                };
                for request in requests {
                    let page = page.clone();
                    loads.push(async move {
                        load_content(&page, request.instance, request.mode, request.values).await
                    });
                }
            }
            Some(_) = loads.next(), if !loads.is_empty() => {}
        }
    }
}

/// 查询参数：默认参数与调用方参数合并，数组展开为重复键，最后追加 `:param-*` 属性
pub fn query_pairs(defaults: Map<String, Value>, values: &Map<String, Value>, attributes: &[Attribute]) -> Vec<(String, String)> {
    let mut merged = defaults;
    for (key, value) in values {
        merged.insert(key.clone(), value.clone());
    }

    let mut pairs = Vec::new();
    for (key, value) in &merged {
        match value {
            Value::Array(items) => pairs.extend(items.iter().map(|item| (key.clone(), stringify(item)))),
            other => pairs.push((key.clone(), stringify(other))),
        }
    }
    for attr in attributes {
        if let Some(name) = attr.name.strip_prefix(PARAM_PREFIX) {
            pairs.push((name.to_string(), attr.value.clone()));
        }
    }
    pairs
}

/// 相对地址基于 base 解析，查询串整体替换
pub fn request_url(base: &str, raw: &str, pairs: &[(String, String)]) -> Result<Url, FetchError> {
    let mut url = Url::parse(base)?.join(raw)?;
    url.set_query(None);
    if !pairs.is_empty() {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key, value);
        }
    }
    Ok(url)
}

/// `delay` 字段：数字按毫秒，字符串按时长格式
fn delay_of(tag: &str, value: Option<&Value>) -> Duration {
    match value {
        None | Some(Value::Null) => Duration::ZERO,
        Some(Value::Number(n)) => Duration::from_millis(n.as_u64().unwrap_or(0)),
        Some(Value::String(text)) => parse_duration(text).unwrap_or_else(|| {
            warn!("[{}] Invalid delay `{}`, using 0", tag, text);
            Duration::ZERO
        }),
        Some(other) => {
            warn!("[{}] Invalid delay `{}`, using 0", tag, other);
            Duration::ZERO
        }
    }
}

impl Page {
    /// 组装请求并开始新的一代
    fn begin_load(&mut self, id: InstanceId, values: &Map<String, Value>) -> Option<Request> {
        let base_url = self.config.base_url.clone();
        let fetcher = self.fetcher.clone();
        let attributes = {
            let inst = self.instances.get(&id)?;
            self.doc.attributes(inst.state.host).to_vec()
        };
        let inst = self.instances.get_mut(&id)?;
        let tag = inst.state.tag.clone();

        let Some(raw) = inst.state.field_str("url").map(str::to_string) else {
            error!("{}: No :url attribute specified", tag);
            return None;
        };
        let defaults = inst
            .controller
            .frame()
            .map(|frame| frame.params(&inst.state.fields))
            .unwrap_or_default();
        let pairs = query_pairs(defaults, values, &attributes);
        let url = match request_url(&base_url, &raw, &pairs) {
            Ok(url) => url,
            Err(e) => {
                error!("[{}] {}", tag, e);
                return None;
            }
        };
        let delay = delay_of(&tag, inst.state.fields.get("delay"));
        let (generation, token) = inst.loader.begin();

        Some(Request {
            url,
            delay,
            generation,
            token,
            fetcher,
        })
    }

    /// 请求结束后写入挂载点，只接受当前代
    fn finish_load(
        &mut self,
        id: InstanceId,
        generation: u64,
        token: &CancellationToken,
        mode: InsertMode,
        result: Result<String, FetchError>,
    ) -> bool {
        let Some(inst) = self.instances.get_mut(&id) else {
            debug!("{:?} was torn down before its load finished", id);
            return false;
        };
        let tag = inst.state.tag.clone();
        if !inst.loader.is_current(generation, token) {
            debug!("[{}] discarding superseded response", tag);
            return false;
        }
        inst.loader.settle(generation);

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                error!("[{}] {}", tag, e);
                return false;
            }
        };

        let Some(mount) = self.resolve_mount_point(id) else {
            return false;
        };
        let written = match mode {
            InsertMode::Replace => self.doc.set_inner_markup(mount, &body),
            InsertMode::Append => self.doc.append_markup(mount, &body),
        };
        if let Err(e) = written {
            warn!("[{}] Response is not valid markup, inserting as text: {}", tag, e);
            if mode == InsertMode::Replace {
                self.doc.clear_children(mount);
            }
            let text = self.doc.create_text(&body);
            self.doc.append(mount, text);
        }

        self.upgrade(mount);
        self.collect_detached();
        true
    }
}
