//! QuickJS 求值器
//!
//! 字段以 JSON 注入为 `this`，执行后再以 JSON 取回。
//! 表达式中的任意代码都会被执行，只应在可信标记上启用。

use super::Evaluator;
use crate::binder::path::PathScope;
use crate::error::EvalError;
use rquickjs::{Context, Runtime};
use serde::Deserialize;
use serde_json::{Map, Value};

pub struct QuickJsEvaluator {
    _runtime: Runtime,
    context: Context,
}

#[derive(Deserialize)]
struct Evaluated {
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize)]
struct Executed {
    fields: Map<String, Value>,
    calls: Vec<String>,
}

impl QuickJsEvaluator {
    pub fn new() -> Result<Self, EvalError> {
        let runtime = Runtime::new().map_err(|e| EvalError::Script(e.to_string()))?;
        let context = Context::full(&runtime).map_err(|e| EvalError::Script(e.to_string()))?;
        Ok(Self {
            _runtime: runtime,
            context,
        })
    }

    fn run(&self, script: String) -> Result<String, EvalError> {
        self.context.with(|ctx| {
            ctx.eval::<String, _>(script)
                .map_err(|e| EvalError::Script(format!("{:?}", e)))
        })
    }
}

impl Evaluator for QuickJsEvaluator {
    fn evaluate(&self, expr: &str, scope: &dyn PathScope) -> Result<Value, EvalError> {
        let this = match scope.snapshot() {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let script = format!(
            r#"(function() {{
                var __this = {this};
                var __value = (function() {{ return ({expr}); }}).call(__this);
                return JSON.stringify({{ value: __value === undefined ? null : __value }});
            }})()"#
        );
        let output = self.run(script)?;
        let evaluated: Evaluated =
            serde_json::from_str(&output).map_err(|e| EvalError::State(e.to_string()))?;
        Ok(evaluated.value)
    }

    fn execute(&self, code: &str, fields: &mut Map<String, Value>) -> Result<Vec<String>, EvalError> {
        let this = Value::Object(fields.clone());
        // 未知成员被当作实例方法，调用时记录下来交回宿主
        let script = format!(
            r#"(function() {{
                var __calls = [];
                var __this = {this};
                var __proxy = new Proxy(__this, {{
                    get: function(target, key) {{
                        if (key in target || typeof key !== "string") return target[key];
                        return function() {{ __calls.push(key); }};
                    }}
                }});
                (function() {{ {code} ;}}).call(__proxy);
                var __fields = {{}};
                for (var key in __this) {{
                    if (typeof __this[key] !== "function") __fields[key] = __this[key];
                }}
                return JSON.stringify({{ fields: __fields, calls: __calls }});
            }})()"#
        );
        let output = self.run(script)?;
        let executed: Executed =
            serde_json::from_str(&output).map_err(|e| EvalError::State(e.to_string()))?;
        *fields = executed.fields;
        Ok(executed.calls)
    }
}
