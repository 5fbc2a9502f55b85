//! 路径解析：`this.a.b[0]["c"]` 在实例上的取值

use serde_json::Value;

/// 路径解析看到的实例
pub trait PathScope {
    /// 实例字段
    fn field(&self, name: &str) -> Option<&Value>;
    /// 是否存在同名的可调用成员
    fn has_callable(&self, name: &str) -> bool;
    /// 以实例为接收者调用
    fn call(&self, name: &str) -> Option<Value>;
    /// 全部字段的快照，供完整求值器构造 `this`
    fn snapshot(&self) -> Value {
        Value::Null
    }
}

/// 按 `.`、`[`、`]` 切分，去掉空片段、引号与调用括号
pub fn tokenize(expr: &str) -> Vec<String> {
    expr.trim()
        .split(['.', '[', ']'])
        .filter(|part| !part.trim().is_empty())
        .map(|part| part.trim().replace(['"', '\''], "").replace("()", ""))
        .collect()
}

/// 是否为纯路径：`this` 后跟 `.name`、`[0]`、`["key"]`，末尾可带一个 `()`
pub fn is_path(expr: &str) -> bool {
    let Some(mut rest) = expr.trim().strip_prefix("this") else {
        return false;
    };
    if let Some(stripped) = rest.strip_suffix("()") {
        rest = stripped;
    }
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let len = after
                .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
                .unwrap_or(after.len());
            if len == 0 {
                return false;
            }
            rest = &after[len..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let Some(close) = after.find(']') else {
                return false;
            };
            if !is_index_key(after[..close].trim()) {
                return false;
            }
            rest = &after[close + 1..];
        } else {
            return false;
        }
    }
    true
}

fn is_index_key(key: &str) -> bool {
    let quoted = |q: char| {
        key.len() >= 2 && key.starts_with(q) && key.ends_with(q) && !key[1..key.len() - 1].contains(['"', '\''])
    };
    (!key.is_empty() && key.chars().all(|c| c.is_ascii_digit())) || quoted('"') || quoted('\'')
}

enum Cursor<'a> {
    Instance,
    Value(&'a Value),
    Callable(&'a str),
}

/// 解析路径；任意一段不存在则整体为 None
pub fn resolve(scope: &dyn PathScope, expr: &str) -> Option<Value> {
    let tokens = tokenize(expr);
    let mut tokens = tokens.iter();

    if tokens.next().map(String::as_str) != Some("this") {
        return None;
    }

    let mut cursor = Cursor::Instance;
    for token in tokens {
        cursor = match cursor {
            Cursor::Instance => match scope.field(token) {
                Some(value) => Cursor::Value(value),
                None if scope.has_callable(token) => Cursor::Callable(token),
                None => return None,
            },
            Cursor::Value(value) => Cursor::Value(property(value, token)?),
            // 可调用成员只在路径末尾才会被调用
            Cursor::Callable(_) => return None,
        };
    }

    match cursor {
        Cursor::Instance => None,
        Cursor::Value(value) => Some(value.clone()),
        Cursor::Callable(name) => scope.call(name),
    }
}

fn property<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    struct Scope {
        fields: Map<String, Value>,
    }

    impl PathScope for Scope {
        fn field(&self, name: &str) -> Option<&Value> {
            self.fields.get(name)
        }

        fn has_callable(&self, name: &str) -> bool {
            name == "total"
        }

        fn call(&self, name: &str) -> Option<Value> {
            (name == "total").then(|| json!(42))
        }
    }

    fn scope() -> Scope {
        let fields = json!({
            "count": 5,
            "user": { "name": "Ada", "tags": ["a", "b"] },
            "rows": [[1, 2], [3, 4]],
        });
        Scope {
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("this.user['name']"), vec!["this", "user", "name"]);
        assert_eq!(tokenize("this.rows[1][0]"), vec!["this", "rows", "1", "0"]);
        assert_eq!(tokenize(" this.total() "), vec!["this", "total"]);
    }

    #[test]
    fn test_resolve_paths() {
        let scope = scope();
        assert_eq!(resolve(&scope, "this.count"), Some(json!(5)));
        assert_eq!(resolve(&scope, "this.user.name"), Some(json!("Ada")));
        assert_eq!(resolve(&scope, r#"this.user["tags"][1]"#), Some(json!("b")));
        assert_eq!(resolve(&scope, "this.rows[1][0]"), Some(json!(3)));
    }

    #[test]
    fn test_missing_segments_resolve_to_none() {
        let scope = scope();
        assert_eq!(resolve(&scope, "this.nope"), None);
        assert_eq!(resolve(&scope, "this.user.age"), None);
        assert_eq!(resolve(&scope, "this.rows[9]"), None);
        assert_eq!(resolve(&scope, "count"), None);
        assert_eq!(resolve(&scope, "this"), None);
    }

    #[test]
    fn test_callable_invoked_at_end_only() {
        let scope = scope();
        assert_eq!(resolve(&scope, "this.total()"), Some(json!(42)));
        assert_eq!(resolve(&scope, "this.total"), Some(json!(42)));
        assert_eq!(resolve(&scope, "this.total.value"), None);
    }

    #[test]
    fn test_is_path() {
        assert!(is_path("this.count"));
        assert!(is_path(r#" this.user["tags"][1] "#));
        assert!(is_path("this.rows[1][0]"));
        assert!(is_path("this.total()"));

        assert!(!is_path("this.count + 1"));
        assert!(!is_path("this.pick('x')"));
        assert!(!is_path("this.a()()"));
        assert!(!is_path("this.rows[i]"));
        assert!(!is_path("this..a"));
        assert!(!is_path("count"));
    }
}
