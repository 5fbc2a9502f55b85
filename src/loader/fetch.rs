//! 网络请求

use crate::error::FetchError;
use futures::future::{FutureExt, LocalBoxFuture};
use log::warn;
use std::io::Read;
use std::time::Duration;
use url::Url;

/// 响应体上限
const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// 获取远程内容
pub trait Fetcher {
    fn fetch(&self, url: &Url) -> LocalBoxFuture<'static, Result<String, FetchError>>;
}

/// 基于 ureq 的实现，阻塞请求放在 tokio 的阻塞线程池中执行
#[derive(Debug, Clone)]
pub struct UreqFetcher {
    timeout: Duration,
}

impl UreqFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Fetcher for UreqFetcher {
    fn fetch(&self, url: &Url) -> LocalBoxFuture<'static, Result<String, FetchError>> {
        let url = url.to_string();
        let timeout = self.timeout;
        async move {
            tokio::task::spawn_blocking(move || fetch_blocking(&url, timeout))
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))
                .and_then(|result| result)
        }
        .boxed_local()
    }
}

fn fetch_blocking(url: &str, timeout: Duration) -> Result<String, FetchError> {
    let response = match ureq::get(url).timeout(timeout).call() {
        Ok(response) => response,
        // 与浏览器 fetch 一致：非 2xx 的响应体照常返回
        Err(ureq::Error::Status(code, response)) => {
            warn!("{} responded with status {}", url, code);
            response
        }
        Err(e) => return Err(FetchError::Transport(e.to_string())),
    };

    let mut body = String::new();
    response
        .into_reader()
        .take(MAX_BODY_BYTES)
        .read_to_string(&mut body)?;
    Ok(body)
}
