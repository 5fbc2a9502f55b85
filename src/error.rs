//! 错误类型
//!
//! 引擎对外的操作大多是非致命的：出错时记录日志并返回 `false` / `None`。
//! 这里的类型用于库边界上的构造函数和内部传递。

use thiserror::Error;

/// 标记解析错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("empty tag name at {pos}")]
    EmptyTagName { pos: usize },
    #[error("mismatched tags: <{expected}> closed by </{found}>")]
    MismatchedTag { expected: String, found: String },
    #[error("expected '{expected}', got '{found}'")]
    Expected { expected: String, found: char },
    #[error("unexpected end of input inside <{tag}>")]
    UnexpectedEof { tag: String },
    #[error("unexpected closing tag at {pos}")]
    UnexpectedClosingTag { pos: usize },
}

/// 表达式求值错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unsupported expression: {0}")]
    Unsupported(String),
    #[error("script error: {0}")]
    Script(String),
    #[error("invalid state: {0}")]
    State(String),
}

/// 网络请求错误
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request cancelled")]
    Cancelled,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("failed to read response body: {0}")]
    Body(#[from] std::io::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// 注册错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("[{name}] Controller tag name must contain a hyphen but got <{tag}>")]
    MissingHyphen { name: String, tag: String },
    #[error("tag <{0}> is already registered")]
    Duplicate(String),
}
