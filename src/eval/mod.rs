//! 表达式求值 - `@render.eval` 与 `@event.eval` 的执行策略
//!
//! 默认的 [`PathEvaluator`] 只支持路径取值、简单赋值和方法调用；
//! 需要完整表达式时显式换成 [`QuickJsEvaluator`]。

mod quickjs;

pub use quickjs::QuickJsEvaluator;

use crate::binder::path::{self, PathScope};
use crate::error::EvalError;
use serde_json::{Map, Value};

/// 可注入的求值器
pub trait Evaluator {
    /// 求值表达式，`this` 为实例
    fn evaluate(&self, expr: &str, scope: &dyn PathScope) -> Result<Value, EvalError>;

    /// 执行语句，可修改字段；返回按顺序需要调用的实例方法
    fn execute(&self, code: &str, fields: &mut Map<String, Value>) -> Result<Vec<String>, EvalError>;
}

/// 受限求值器
#[derive(Debug, Default, Clone, Copy)]
pub struct PathEvaluator;

impl Evaluator for PathEvaluator {
    fn evaluate(&self, expr: &str, scope: &dyn PathScope) -> Result<Value, EvalError> {
        if let Some(value) = literal(expr) {
            return Ok(value);
        }
        if path::is_path(expr) {
            return Ok(path::resolve(scope, expr).unwrap_or(Value::Null));
        }
        Err(EvalError::Unsupported(expr.trim().to_string()))
    }

    /// 先解析全部语句，在副本上执行，全部成功才写回
    fn execute(&self, code: &str, fields: &mut Map<String, Value>) -> Result<Vec<String>, EvalError> {
        let statements = split_statements(code)
            .into_iter()
            .map(Statement::parse)
            .collect::<Result<Vec<_>, _>>()?;

        let mut staged = fields.clone();
        let mut calls = Vec::new();
        for statement in statements {
            match statement {
                Statement::Assign { target, source } => {
                    let value = self.rhs(source, &staged)?;
                    assign(&mut staged, target, value)?;
                }
                Statement::Call(method) => calls.push(method),
            }
        }
        *fields = staged;
        Ok(calls)
    }
}

impl PathEvaluator {
    fn rhs(&self, source: &str, fields: &Map<String, Value>) -> Result<Value, EvalError> {
        let source = source.trim();
        if let Some(value) = literal(source) {
            return Ok(value);
        }
        if let Some(negated) = source.strip_prefix('!') {
            return Ok(Value::Bool(!truthy(&self.rhs(negated, fields)?)));
        }
        if path::is_path(source) {
            let scope = FieldScope(fields);
            return Ok(path::resolve(&scope, source).unwrap_or(Value::Null));
        }
        Err(EvalError::Unsupported(source.to_string()))
    }
}

/// 受限求值器支持的语句
enum Statement<'a> {
    Assign { target: &'a str, source: &'a str },
    Call(String),
}

impl<'a> Statement<'a> {
    fn parse(statement: &'a str) -> Result<Self, EvalError> {
        match split_assignment(statement) {
            Some((target, source)) if path::is_path(target) && !target.ends_with(')') => {
                Ok(Statement::Assign { target, source })
            }
            Some(_) => Err(EvalError::Unsupported(statement.to_string())),
            None => call_name(statement).map(Statement::Call),
        }
    }
}

/// 只有字段的作用域
struct FieldScope<'a>(&'a Map<String, Value>);

impl PathScope for FieldScope<'_> {
    fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    fn has_callable(&self, _name: &str) -> bool {
        false
    }

    fn call(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// JSON 字面量或单引号字符串
fn literal(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        let inner = &text[1..text.len() - 1];
        return (!inner.contains('\'')).then(|| Value::String(inner.to_string()));
    }
    if text.starts_with("this") {
        return None;
    }
    serde_json::from_str(text).ok()
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// 按分号切分，忽略引号内的分号
fn split_statements(code: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in code.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, ';') => {
                statements.push(&code[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    statements.push(&code[start..]);
    statements
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// `this.a = b`，排除 `==`、`!=`、`<=`、`>=`
fn split_assignment(statement: &str) -> Option<(&str, &str)> {
    let bytes = statement.as_bytes();
    let mut quote: Option<u8> = None;
    for (i, b) in bytes.iter().enumerate() {
        match (quote, *b) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(*b),
            (None, b'=') => {
                let prev = i.checked_sub(1).map(|p| bytes[p]);
                let next = bytes.get(i + 1).copied();
                if next == Some(b'=') || matches!(prev, Some(b'=') | Some(b'!') | Some(b'<') | Some(b'>')) {
                    return None;
                }
                return Some((statement[..i].trim(), statement[i + 1..].trim()));
            }
            _ => {}
        }
    }
    None
}

/// `this.method()` -> `method`，不支持参数
fn call_name(statement: &str) -> Result<String, EvalError> {
    let name = statement
        .strip_prefix("this.")
        .and_then(|rest| rest.strip_suffix(')'))
        .and_then(|rest| rest.split_once('('))
        .filter(|(_, args)| args.trim().is_empty())
        .map(|(name, _)| name.trim())
        .filter(|name| !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_'));
    name.map(str::to_string)
        .ok_or_else(|| EvalError::Unsupported(statement.to_string()))
}

/// 按路径写入字段，中间对象不存在时创建
fn assign(fields: &mut Map<String, Value>, target: &str, value: Value) -> Result<(), EvalError> {
    let tokens = path::tokenize(target);
    let mut tokens = tokens.iter();
    if tokens.next().map(String::as_str) != Some("this") {
        return Err(EvalError::Unsupported(target.to_string()));
    }
    let tokens: Vec<&String> = tokens.collect();
    let Some((last, parents)) = tokens.split_last() else {
        return Err(EvalError::Unsupported(target.to_string()));
    };

    let mut cursor = fields;
    for token in parents {
        let entry = cursor
            .entry(token.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        cursor = entry
            .as_object_mut()
            .ok_or_else(|| EvalError::State(format!("{token} is not an object")))?;
    }
    cursor.insert(last.to_string(), value);
    Ok(())
}
