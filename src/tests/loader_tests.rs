//! 异步加载测试
//! 使用暂停的 tokio 时钟和假网络层，时间推进是确定的

use super::{init_logger, CounterBox, FakeFetcher};
use crate::component::{Context, Controller, InsertMode, InstanceId};
use crate::dom::NodeId;
use crate::loader::{flush, load_content, refresh, run_timers, tick, ContentFrame, DynamicFrame};
use crate::page::{Page, SharedPage};
use crate::registry::RegistryEntry;
use crate::timer::TimerPurpose;
use futures::future::join;
use serde_json::{json, Map, Value};
use std::rc::Rc;
use std::time::Duration;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn frame_page(markup: &str, fetcher: &Rc<FakeFetcher>) -> (SharedPage, InstanceId) {
    init_logger();
    let mut page = Page::new(markup).unwrap().with_fetcher(fetcher.clone());
    let ids = page.register::<DynamicFrame>().unwrap();
    (page.into_shared(), ids[0])
}

fn first(page: &SharedPage, selector: &str) -> NodeId {
    let page = page.borrow();
    page.doc().select_first(page.doc().root(), selector).unwrap()
}

fn values(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// 带默认参数的框架
#[derive(Default)]
struct PagedList;

impl ContentFrame for PagedList {
    fn params(&self, _fields: &Map<String, Value>) -> Map<String, Value> {
        values(json!({ "page": 1 }))
    }
}

impl Controller for PagedList {
    fn init(&mut self, cx: &mut Context<'_>, _args: &Value) {
        crate::loader::start_frame(cx);
    }

    fn frame(&self) -> Option<&dyn ContentFrame> {
        Some(self)
    }
}

/// 记录渲染次数
#[derive(Default)]
struct RenderCount;

impl Controller for RenderCount {
    fn rendered(&mut self, cx: &mut Context<'_>) {
        let renders = super::int_field(cx, "renders");
        cx.set_field("renders", renders + 1);
    }
}

/// 测试初始化排队的加载写入 <self> 锚点
#[tokio::test(start_paused = true)]
async fn test_initial_load_fills_anchor() {
    let fetcher = FakeFetcher::new();
    fetcher.respond("/feed", ms(20), "<p>hello</p>");
    let (page, id) = frame_page(r#"<dynamic-frame :url="/feed"></dynamic-frame>"#, &fetcher);

    assert_eq!(page.borrow().pending_loads().len(), 1);
    assert_eq!(flush(&page).await, vec![true]);

    let anchor = first(&page, "self");
    assert_eq!(page.borrow().mount_point(id), Some(anchor));
    assert_eq!(page.borrow().doc().inner_markup(anchor), "<p>hello</p>");
    assert_eq!(fetcher.requests(), vec!["http://localhost/feed".to_string()]);
}

/// 测试后发起的请求取代先发起的，先发起的即使后返回也不会写入
#[tokio::test(start_paused = true)]
async fn test_superseded_generation_never_writes() {
    let fetcher = FakeFetcher::new();
    fetcher.respond("/feed", ms(300), "<p>G1</p>");
    fetcher.respond("/feed", ms(50), "<p>G2</p>");
    let (page, id) = frame_page(r#"<dynamic-frame :url="/feed"></dynamic-frame>"#, &fetcher);
    page.borrow_mut().take_pending_loads();

    let g1 = load_content(&page, id, InsertMode::Replace, Map::new());
    let g2 = async {
        tokio::time::sleep(ms(10)).await;
        load_content(&page, id, InsertMode::Replace, Map::new()).await
    };
    let (first_result, second_result) = join(g1, g2).await;

    assert!(!first_result);
    assert!(second_result);
    let anchor = first(&page, "self");
    assert_eq!(page.borrow().doc().inner_markup(anchor), "<p>G2</p>");

    // G1 的响应时间过去后内容仍然是 G2
    tokio::time::sleep(ms(500)).await;
    assert_eq!(page.borrow().doc().inner_markup(anchor), "<p>G2</p>");
}

/// 测试参数组装：数组展开为重复键，:param-* 属性追加在后
#[tokio::test(start_paused = true)]
async fn test_query_parameter_assembly() {
    let fetcher = FakeFetcher::new();
    fetcher.respond("/list", ms(1), "a");
    fetcher.respond("/list", ms(1), "b");
    let (page, id) = frame_page(r#"<dynamic-frame :url="/list" :param-sort="asc"></dynamic-frame>"#, &fetcher);
    page.borrow_mut().take_pending_loads();

    assert!(load_content(&page, id, InsertMode::Replace, values(json!({ "day": "Monday", "tags": ["a", "b"] }))).await);
    assert_eq!(
        fetcher.requests()[0],
        "http://localhost/list?day=Monday&tags=a&tags=b&sort=asc"
    );

    let host = first(&page, "dynamic-frame");
    page.borrow_mut().doc_mut().remove_attribute(host, ":param-sort");
    assert!(load_content(&page, id, InsertMode::Replace, values(json!({ "day": "Monday", "tags": ["a", "b"] }))).await);
    assert_eq!(fetcher.requests()[1], "http://localhost/list?day=Monday&tags=a&tags=b");
}

/// 测试框架默认参数与调用方参数合并
#[tokio::test(start_paused = true)]
async fn test_frame_default_params() {
    init_logger();
    let fetcher = FakeFetcher::new();
    fetcher.respond("/items", ms(1), "1");
    fetcher.respond("/items", ms(1), "2");
    let mut page = Page::new(r#"<paged-list :url="/items"></paged-list>"#)
        .unwrap()
        .with_fetcher(fetcher.clone());
    let id = page.register::<PagedList>().unwrap()[0];
    let page = page.into_shared();

    flush(&page).await;
    assert!(load_content(&page, id, InsertMode::Replace, values(json!({ "page": 2 }))).await);

    assert_eq!(
        fetcher.requests(),
        vec![
            "http://localhost/items?page=1".to_string(),
            "http://localhost/items?page=2".to_string(),
        ]
    );
}

/// 测试请求失败时挂载点保持不变
#[tokio::test(start_paused = true)]
async fn test_failure_leaves_mount_point_untouched() {
    let fetcher = FakeFetcher::new();
    fetcher.fail("/broken", ms(5));
    let (page, _) = frame_page(
        r#"<dynamic-frame :url="/broken" mount-point=".mount"><div class="mount">old</div></dynamic-frame>"#,
        &fetcher,
    );

    assert_eq!(flush(&page).await, vec![false]);
    let mount = first(&page, ".mount");
    assert_eq!(page.borrow().doc().inner_markup(mount), "old");
}

/// 测试缺少 :url 时不发请求
#[tokio::test(start_paused = true)]
async fn test_missing_url_is_not_fatal() {
    let fetcher = FakeFetcher::new();
    let (page, _) = frame_page(r#"<dynamic-frame></dynamic-frame>"#, &fetcher);

    assert_eq!(flush(&page).await, vec![false]);
    assert!(fetcher.requests().is_empty());
}

/// 测试 delay 与请求同时等待，两者都结束后才写入
#[tokio::test(start_paused = true)]
async fn test_delay_applies_before_write() {
    let fetcher = FakeFetcher::new();
    fetcher.respond("/slow", ms(10), "done");
    let (page, _) = frame_page(r#"<dynamic-frame :url="/slow" delay="200ms"></dynamic-frame>"#, &fetcher);

    let start = tokio::time::Instant::now();
    assert_eq!(flush(&page).await, vec![true]);
    assert!(start.elapsed() >= ms(200));
    assert!(start.elapsed() < ms(300));
}

/// 测试追加模式
#[tokio::test(start_paused = true)]
async fn test_append_mode() {
    let fetcher = FakeFetcher::new();
    fetcher.respond("/log", ms(1), "<li>1</li>");
    fetcher.respond("/log", ms(1), "<li>2</li>");
    let (page, id) = frame_page(r#"<dynamic-frame :url="/log" mount-point="ul"><ul></ul></dynamic-frame>"#, &fetcher);

    flush(&page).await;
    assert!(load_content(&page, id, InsertMode::Append, Map::new()).await);

    let list = first(&page, "ul");
    assert_eq!(page.borrow().doc().inner_markup(list), "<li>1</li><li>2</li>");
}

/// 测试挂载点离开实例子树后重新查找
#[tokio::test(start_paused = true)]
async fn test_mount_point_re_resolved() {
    let fetcher = FakeFetcher::new();
    fetcher.respond("/a", ms(1), "first");
    fetcher.respond("/a", ms(1), "second");
    let (page, id) = frame_page(
        r#"<dynamic-frame :url="/a" mount-point=".slot"><section><div class="slot"></div></section></dynamic-frame>"#,
        &fetcher,
    );
    flush(&page).await;
    let old_slot = first(&page, ".slot");

    let section = first(&page, "section");
    page.borrow_mut()
        .doc_mut()
        .set_inner_markup(section, r#"<div class="slot"></div>"#)
        .unwrap();
    assert!(load_content(&page, id, InsertMode::Replace, Map::new()).await);

    let new_slot = first(&page, ".slot");
    assert_ne!(old_slot, new_slot);
    assert_eq!(page.borrow().mount_point(id), Some(new_slot));
    assert_eq!(page.borrow().doc().inner_markup(new_slot), "second");
}

/// 测试加载的内容中的组件会被升级
#[tokio::test(start_paused = true)]
async fn test_loaded_components_are_upgraded() {
    init_logger();
    let fetcher = FakeFetcher::new();
    fetcher.respond("/widgets", ms(1), r#"<counter-box count="2"><b @render>${this.count}</b></counter-box>"#);
    let mut page = Page::new(r#"<dynamic-frame :url="/widgets"></dynamic-frame>"#)
        .unwrap()
        .with_fetcher(fetcher.clone());
    page.register_all(vec![RegistryEntry::of::<DynamicFrame>(), RegistryEntry::of::<CounterBox>()]);
    let page = page.into_shared();

    flush(&page).await;

    let counters = page.borrow().instances_of("counter-box");
    assert_eq!(counters.len(), 1);
    assert_eq!(page.borrow().doc().text_content(first(&page, "b")), "2");
}

/// 测试自动刷新由定时器驱动
#[tokio::test(start_paused = true)]
async fn test_auto_refresh_tick() {
    let fetcher = FakeFetcher::new();
    fetcher.respond("/clock", ms(1), "1");
    fetcher.respond("/clock", ms(1), "2");
    let (page, id) = frame_page(r#"<dynamic-frame :url="/clock" auto-refresh="1s"></dynamic-frame>"#, &fetcher);
    assert_eq!(page.borrow().timer_interval(id, TimerPurpose::AutoRefresh), Some(ms(1000)));

    flush(&page).await;
    assert!(tick(&page, crate::page::now()).await.is_empty());

    tokio::time::advance(ms(1000)).await;
    assert_eq!(tick(&page, crate::page::now()).await, vec![true]);

    let anchor = first(&page, "self");
    assert_eq!(page.borrow().doc().inner_markup(anchor), "2");
    assert_eq!(fetcher.requests().len(), 2);
}

/// 测试 refresh 重新渲染并重新加载
#[tokio::test(start_paused = true)]
async fn test_refresh_reloads() {
    let fetcher = FakeFetcher::new();
    fetcher.respond("/r", ms(1), "one");
    fetcher.respond("/r", ms(1), "two");
    let (page, id) = frame_page(r#"<dynamic-frame :url="/r"></dynamic-frame>"#, &fetcher);

    flush(&page).await;
    assert!(refresh(&page, id).await);
    assert_eq!(page.borrow().doc().inner_markup(first(&page, "self")), "two");
}

/// 测试销毁实例会使进行中的加载失效
#[tokio::test(start_paused = true)]
async fn test_teardown_invalidates_pending_load() {
    let fetcher = FakeFetcher::new();
    fetcher.respond("/gone", ms(100), "late");
    let (page, id) = frame_page(r#"<div><dynamic-frame :url="/gone"></dynamic-frame></div>"#, &fetcher);
    page.borrow_mut().take_pending_loads();
    let host = first(&page, "dynamic-frame");

    let load = load_content(&page, id, InsertMode::Replace, Map::new());
    let remove = async {
        tokio::time::sleep(ms(10)).await;
        page.borrow_mut().remove_node(host)
    };
    let (loaded, removed) = join(load, remove).await;

    assert!(!loaded);
    assert_eq!(removed, vec![id]);
    assert!(page.borrow().instance(id).is_none());
}

/// 测试慢请求进行中时其他实例的定时器照常触发
#[tokio::test(start_paused = true)]
async fn test_timers_keep_firing_while_a_load_is_pending() {
    init_logger();
    let fetcher = FakeFetcher::new();
    fetcher.respond("/slow", ms(2000), "late");
    let mut page = Page::new(
        r#"<render-count auto-render="100ms"></render-count><dynamic-frame :url="/slow"></dynamic-frame>"#,
    )
    .unwrap()
    .with_fetcher(fetcher.clone());
    page.register_all(vec![RegistryEntry::of::<RenderCount>(), RegistryEntry::of::<DynamicFrame>()]);
    let counter = page.instances_of("render-count")[0];
    let page = page.into_shared();
    assert_eq!(page.borrow().field(counter, "renders"), Some(&json!(1)));

    let driver = run_timers(Rc::downgrade(&page), ms(10));
    assert!(tokio::time::timeout(ms(1000), driver).await.is_err());

    let renders = page.borrow().field(counter, "renders").and_then(Value::as_i64).unwrap_or(0);
    assert!(renders >= 9, "auto-render fired {} times", renders);
    assert_eq!(fetcher.requests().len(), 1);
}

/// 测试自动刷新开始的新请求取代仍在进行的慢请求
#[tokio::test(start_paused = true)]
async fn test_auto_refresh_supersedes_slow_load() {
    let fetcher = FakeFetcher::new();
    fetcher.respond("/feed", ms(2000), "<p>slow</p>");
    fetcher.respond("/feed", ms(10), "<p>fast</p>");
    let (page, _) = frame_page(r#"<dynamic-frame :url="/feed" auto-refresh="500ms"></dynamic-frame>"#, &fetcher);

    let driver = run_timers(Rc::downgrade(&page), ms(10));
    assert!(tokio::time::timeout(ms(2500), driver).await.is_err());

    // 之后的刷新没有预设响应，失败后不改动内容
    assert!(fetcher.requests().len() >= 3);
    assert_eq!(page.borrow().doc().inner_markup(first(&page, "self")), "<p>fast</p>");
}

/// 测试页面释放后驱动结束
#[tokio::test(start_paused = true)]
async fn test_run_timers_stops_when_page_dropped() {
    let fetcher = FakeFetcher::new();
    let (page, _) = frame_page(r#"<dynamic-frame></dynamic-frame>"#, &fetcher);
    let weak = Rc::downgrade(&page);
    drop(page);

    assert!(tokio::time::timeout(ms(100), run_timers(weak, ms(10))).await.is_ok());
}
