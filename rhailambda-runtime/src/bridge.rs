//! Handler bridge
//!
//! Loads a `.rhai` handler module into a fresh engine and calls its entry
//! point with `(payload, context)`. The entry point returns `[response, error]`.

use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, Map, Scope, AST};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use rhailambda_core::{Context, ErrorReport, InvocationResult, Payload};

/// Nested function calls allowed inside a handler
const MAX_CALL_LEVELS: usize = 64;

/// A runtime error raised while the handler was executing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error_type}: {message}")]
pub struct HandlerError {
    pub message: String,
    pub error_type: String,
    /// One line per nested call, innermost last
    pub stack_trace: Vec<String>,
}

impl HandlerError {
    fn from_eval(err: &EvalAltResult) -> Self {
        let mut stack_trace = Vec::new();
        let mut current = err;
        while let EvalAltResult::ErrorInFunctionCall(name, source, inner, pos) = current {
            if source.is_empty() {
                stack_trace.push(format!("in function '{}' ({})", name, pos));
            } else {
                stack_trace.push(format!("in function '{}' @ '{}' ({})", name, source, pos));
            }
            current = &**inner;
        }

        let error_type = match current {
            EvalAltResult::ErrorRuntime(..) => "HandlerError",
            EvalAltResult::ErrorFunctionNotFound(..) => "FunctionNotFound",
            EvalAltResult::ErrorVariableNotFound(..) => "VariableNotFound",
            EvalAltResult::ErrorMismatchDataType(..) | EvalAltResult::ErrorMismatchOutputType(..) => {
                "TypeError"
            }
            EvalAltResult::ErrorStackOverflow(..) => "StackOverflow",
            _ => "RuntimeError",
        };

        Self {
            message: current.to_string(),
            error_type: error_type.to_string(),
            stack_trace,
        }
    }

    /// Body for an `invocation/{id}/error` report
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            error_message: self.message.clone(),
            error_type: format!("Runtime.{}", self.error_type),
            stack_trace: self.stack_trace.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Missing module file, syntax error or a failing top level
    #[error("Failed to load module {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    #[error(transparent)]
    Runtime(#[from] HandlerError),
}

/// A loaded handler that can be called with an invocation
pub trait Handler {
    fn invoke(&mut self, payload: &Payload, context: &Context)
        -> Result<InvocationResult, HandlerError>;
}

/// Handler backed by a rhai module
pub struct RhaiHandler {
    engine: Engine,
    ast: AST,
    scope: Scope<'static>,
    function: String,
}

impl RhaiHandler {
    /// Compile the module at `module_path` and run its top level
    ///
    /// The top level sees two bindings, `payload` (an empty string) and
    /// `context` (an empty map).
    pub fn load(module_path: &Path, function: &str) -> Result<Self, BridgeError> {
        let load_error = |err: Box<EvalAltResult>| BridgeError::Load {
            path: module_path.to_path_buf(),
            message: err.to_string(),
        };

        let mut engine = Engine::new();
        engine.set_max_call_levels(MAX_CALL_LEVELS);

        let ast = engine
            .compile_file(module_path.to_path_buf())
            .map_err(load_error)?;

        let mut scope = Scope::new();
        scope.push("payload", String::new());
        scope.push("context", Map::new());
        engine.run_ast_with_scope(&mut scope, &ast).map_err(load_error)?;

        debug!(module = %module_path.display(), function = %function, "Loaded handler module");

        Ok(Self {
            engine,
            ast,
            scope,
            function: function.to_string(),
        })
    }

    pub fn function(&self) -> &str {
        &self.function
    }
}

impl Handler for RhaiHandler {
    fn invoke(
        &mut self,
        payload: &Payload,
        context: &Context,
    ) -> Result<InvocationResult, HandlerError> {
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        let args = (payload_to_dynamic(payload), Dynamic::from_map(context_to_map(context)));

        let value = self
            .engine
            .call_fn_with_options::<Dynamic>(options, &mut self.scope, &self.ast, &self.function, args)
            .map_err(|err| HandlerError::from_eval(&err))?;

        Ok(unpack_result(value))
    }
}

/// Load the module, call `function` once and tear the engine down
pub fn invoke(
    module_path: &Path,
    function: &str,
    payload: &Payload,
    context: &Context,
) -> Result<InvocationResult, BridgeError> {
    let mut handler = RhaiHandler::load(module_path, function)?;
    Ok(handler.invoke(payload, context)?)
}

fn payload_to_dynamic(payload: &Payload) -> Dynamic {
    bytes_to_dynamic(payload.as_bytes())
}

fn context_to_map(context: &Context) -> Map {
    context
        .iter()
        .map(|(k, v)| (k.into(), bytes_to_dynamic(v)))
        .collect()
}

/// A string when the bytes are valid UTF-8, a blob otherwise
fn bytes_to_dynamic(bytes: &[u8]) -> Dynamic {
    match std::str::from_utf8(bytes) {
        Ok(text) => Dynamic::from(text.to_string()),
        Err(_) => Dynamic::from_blob(bytes.to_vec()),
    }
}

/// Spread the return value over `(response, error)`
///
/// Arrays are padded with `()` or truncated to two values; anything that is
/// not an array is taken as the response alone.
fn unpack_result(value: Dynamic) -> InvocationResult {
    if value.is_array() {
        let mut values = value.into_array().unwrap_or_default().into_iter();
        let response = values.next().and_then(to_body);
        let error = values.next().and_then(to_text);
        InvocationResult::new(response, error)
    } else {
        InvocationResult::new(to_body(value), None)
    }
}

/// Blobs are posted as their bytes, everything else as its text
fn to_body(value: Dynamic) -> Option<Vec<u8>> {
    if value.is_blob() {
        value.into_blob().ok()
    } else {
        to_text(value).map(String::into_bytes)
    }
}

fn to_text(value: Dynamic) -> Option<String> {
    if value.is_unit() {
        None
    } else if value.is_blob() {
        value
            .into_blob()
            .ok()
            .map(|blob| String::from_utf8_lossy(&blob).into_owned())
    } else if value.is_string() {
        value.into_string().ok()
    } else if value.is_map() || value.is_array() {
        Some(serde_json::to_string(&value).unwrap_or_else(|_| value.to_string()))
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn module(source: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".rhai").tempfile().unwrap();
        file.write_all(source.as_bytes()).unwrap();
        file
    }

    fn context() -> Context {
        [("Lambda-Runtime-Aws-Request-Id", "req-1")].into_iter().collect()
    }

    #[test]
    fn test_invoke_returns_response_and_error() {
        let file = module(
            r#"
            fn process(payload, context) {
                ["echo:" + payload + ":" + context["Lambda-Runtime-Aws-Request-Id"], ()]
            }
            "#,
        );

        let result = invoke(file.path(), "process", &Payload::from("hi"), &context()).unwrap();
        assert_eq!(result.response_text(), Some("echo:hi:req-1"));
        assert_eq!(result.error, None);
    }

    #[test]
    fn test_both_values_pass_through() {
        let file = module(r#"fn process(payload, context) { ["partial", "bad input"] }"#);

        let result = invoke(file.path(), "process", &Payload::new(), &Context::new()).unwrap();
        assert_eq!(result.response_text(), Some("partial"));
        assert_eq!(result.error.as_deref(), Some("bad input"));
    }

    #[test]
    fn test_return_value_padding() {
        let file = module(
            r#"
            fn single(payload, context) { "only" }
            fn one(payload, context) { ["first"] }
            fn nothing(payload, context) { }
            fn many(payload, context) { ["a", "b", "c"] }
            fn number(payload, context) { [42, ()] }
            "#,
        );
        let call = |f: &str| invoke(file.path(), f, &Payload::new(), &Context::new()).unwrap();

        assert_eq!(call("single"), InvocationResult::success("only"));
        assert_eq!(call("one"), InvocationResult::success("first"));
        assert_eq!(call("nothing"), InvocationResult::default());
        assert_eq!(
            call("many"),
            InvocationResult::new(Some("a".into()), Some("b".into()))
        );
        assert_eq!(call("number"), InvocationResult::success("42"));
    }

    #[test]
    fn test_map_response_is_json() {
        let file = module(r#"fn process(payload, context) { [#{ status: "ok" }, ()] }"#);

        let result = invoke(file.path(), "process", &Payload::new(), &Context::new()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(result.response_text().unwrap()).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[test]
    fn test_binary_payload_is_blob() {
        let file = module(r#"fn process(payload, context) { [type_of(payload), ()] }"#);
        let mut payload = Payload::new();
        payload.append(&[0xff, 0x00, 0xfe]);

        let result = invoke(file.path(), "process", &payload, &Context::new()).unwrap();
        assert_eq!(result.response_text(), Some("blob"));
    }

    #[test]
    fn test_blob_response_keeps_its_bytes() {
        let file = module(r#"fn process(payload, context) { [payload, ()] }"#);
        let mut payload = Payload::new();
        payload.append(&[0xff, 0x41]);

        let result = invoke(file.path(), "process", &payload, &Context::new()).unwrap();
        assert_eq!(result.response, Some(vec![0xff, 0x41]));
    }

    #[test]
    fn test_text_blob_response_is_its_text() {
        let file = module(r#"fn process(payload, context) { [blob(2, 0x41), ()] }"#);

        let result = invoke(file.path(), "process", &Payload::new(), &Context::new()).unwrap();
        assert_eq!(result.response_text(), Some("AA"));
    }

    #[test]
    fn test_binary_context_value_is_blob() {
        let file = module(
            r#"fn process(payload, context) { [type_of(context["X-Bin"]) + ":" + type_of(context["X-Text"]), ()] }"#,
        );
        let mut context = Context::new();
        context.insert("X-Bin", &[0xffu8, 0x00][..]);
        context.insert("X-Text", "plain");

        let result = invoke(file.path(), "process", &Payload::new(), &context).unwrap();
        assert_eq!(result.response_text(), Some("blob:string"));
    }

    #[test]
    fn test_top_level_runs_with_bindings() {
        let file = module(
            r#"
            if payload != "" || context.len() != 0 { throw "bindings not reset"; }
            fn process(payload, context) { [payload, ()] }
            "#,
        );

        let result = invoke(file.path(), "process", &Payload::from("x"), &Context::new()).unwrap();
        assert_eq!(result.response_text(), Some("x"));
    }

    #[test]
    fn test_missing_module_is_load_error() {
        let err = invoke(
            Path::new("/nonexistent/handler.rhai"),
            "process",
            &Payload::new(),
            &Context::new(),
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::Load { .. }));
    }

    #[test]
    fn test_syntax_error_is_load_error() {
        let file = module("fn process(payload, context) { [payload, ");
        let err = invoke(file.path(), "process", &Payload::new(), &Context::new()).unwrap_err();
        assert!(matches!(err, BridgeError::Load { .. }));
    }

    #[test]
    fn test_thrown_error_carries_stack_trace() {
        let file = module(
            r#"
            fn inner(x) { throw "boom: " + x; }
            fn process(payload, context) { inner(payload) }
            "#,
        );

        let err = invoke(file.path(), "process", &Payload::from("p"), &Context::new()).unwrap_err();
        let BridgeError::Runtime(err) = err else {
            panic!("expected runtime error, got {:?}", err);
        };
        assert_eq!(err.error_type, "HandlerError");
        assert!(err.message.contains("boom: p"));
        assert!(err.stack_trace.iter().any(|frame| frame.contains("'inner'")));
    }

    #[test]
    fn test_unknown_function_is_runtime_error() {
        let file = module(r#"fn process(payload, context) { ["ok", ()] }"#);
        let err = invoke(file.path(), "missing", &Payload::new(), &Context::new()).unwrap_err();
        let BridgeError::Runtime(err) = err else {
            panic!("expected runtime error, got {:?}", err);
        };
        assert_eq!(err.error_type, "FunctionNotFound");
        assert_eq!(err.to_report().error_type, "Runtime.FunctionNotFound");
    }

    #[test]
    fn test_handler_reused_across_calls() {
        let file = module(r#"fn process(payload, context) { [payload + "!", ()] }"#);
        let mut handler = RhaiHandler::load(file.path(), "process").unwrap();
        assert_eq!(handler.function(), "process");

        for input in ["a", "b"] {
            let result = handler.invoke(&Payload::from(input), &Context::new()).unwrap();
            assert_eq!(result.response_text(), Some(format!("{}!", input).as_str()));
        }
    }
}
