//! 引擎配置

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 引擎配置，JSON 键使用 camelCase
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// 相对 `:url` 拼接的基础地址
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,
    /// `render-on-init` 未设置时的默认值
    #[serde(default = "default_render_on_init")]
    pub render_on_init: bool,
    /// 嵌套组件升级的最大轮数
    #[serde(default = "default_max_upgrade_passes")]
    pub max_upgrade_passes: usize,
}

fn default_base_url() -> String { "http://localhost".to_string() }
fn default_fetch_timeout() -> u64 { 10_000 }
fn default_render_on_init() -> bool { true }
fn default_max_upgrade_passes() -> usize { 32 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            fetch_timeout_ms: default_fetch_timeout(),
            render_on_init: default_render_on_init(),
            max_upgrade_passes: default_max_upgrade_passes(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
