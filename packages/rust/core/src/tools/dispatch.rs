//! Tool dispatch: validate, coerce, invoke, report.
//!
//! The [`Dispatcher`] owns a [`ToolTable`] built at startup. A call for a
//! tool the table does not know is handed back untouched so an outer
//! dispatcher can answer it. Known tools are checked and sanitized in full
//! before their handler runs, so a rejected call never touches the store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use pageforge_shared::{AutomationConfig, ContentItem, PageForgeError, Result};

use super::links::SiteLinks;
use super::registry::{ParamSpec, ParamType, ToolSpec};

/// Sanitized arguments handed to a handler.
pub type ToolArgs = Map<String, Value>;

/// Executes one tool after its arguments passed validation.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Returns the created or modified item.
    async fn call(&self, args: &ToolArgs, config: &AutomationConfig) -> Result<ContentItem>;
}

/// Name to (schema, handler) map.
#[derive(Default, Clone)]
pub struct ToolTable {
    tools: BTreeMap<String, (ToolSpec, Arc<dyn ToolHandler>)>,
}

impl ToolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool; a second insert under the same name replaces the first.
    pub fn insert(&mut self, spec: ToolSpec, handler: Arc<dyn ToolHandler>) {
        self.tools.insert(spec.name.to_string(), (spec, handler));
    }

    pub fn get(&self, name: &str) -> Option<&(ToolSpec, Arc<dyn ToolHandler>)> {
        self.tools.get(name)
    }

    pub fn catalog(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|(spec, _)| spec.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Outcome reported to a remote caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: u16,
}

impl ToolResult {
    pub fn success(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            status: 200,
        }
    }

    pub fn failure(error: impl Into<String>, status: u16) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
            status,
        }
    }

    fn from_error(err: &PageForgeError) -> Self {
        Self::failure(err.message(), err.status_code())
    }
}

/// What [`Dispatcher::dispatch`] did with a call.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// The tool is ours; this is its result.
    Handled(ToolResult),
    /// Not one of ours; the caller's response, unchanged.
    PassThrough(Value),
}

impl Dispatched {
    /// JSON to send back to the caller.
    pub fn into_value(self) -> Value {
        match self {
            Self::Handled(result) => serde_json::to_value(result).unwrap_or(Value::Null),
            Self::PassThrough(value) => value,
        }
    }
}

pub struct Dispatcher {
    table: ToolTable,
    links: SiteLinks,
}

impl Dispatcher {
    pub fn new(table: ToolTable, links: SiteLinks) -> Self {
        Self { table, links }
    }

    /// Every registered tool schema, ordered by name.
    pub fn catalog(&self) -> Vec<ToolSpec> {
        self.table.catalog()
    }

    /// Route one tool call.
    ///
    /// `response` is whatever an earlier dispatcher produced for this call;
    /// it is returned as-is when `tool` is not registered here.
    #[instrument(skip(self, response, args, config), fields(tool = %tool))]
    pub async fn dispatch(
        &self,
        response: Value,
        tool: &str,
        args: &Value,
        config: &AutomationConfig,
    ) -> Dispatched {
        let Some((spec, handler)) = self.table.get(tool) else {
            debug!("tool not registered, passing through");
            return Dispatched::PassThrough(response);
        };

        let sanitized = match prepare_args(spec, args) {
            Ok(sanitized) => sanitized,
            Err(err) => {
                info!(error = %err.message(), "tool call rejected");
                return Dispatched::Handled(ToolResult::from_error(&err));
            }
        };

        match handler.call(&sanitized, config).await {
            Ok(item) => {
                info!(post_id = %item.id, status = %item.status, "tool call succeeded");
                Dispatched::Handled(ToolResult::success(json!({
                    "post_id": item.id.0,
                    "edit_link": self.links.edit_link(&item),
                    "view_link": self.links.view_link(&item),
                    "status": item.status.as_str(),
                })))
            }
            Err(err) => {
                warn!(error = %err, "tool call failed");
                Dispatched::Handled(ToolResult::from_error(&err))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Validation and coercion
// ---------------------------------------------------------------------------

/// Coerce every declared param, then check the required ones.
///
/// Undeclared keys are dropped. A required param that is absent or ends up
/// empty after cleaning is reported, in declaration order.
pub fn prepare_args(spec: &ToolSpec, args: &Value) -> Result<ToolArgs> {
    let empty = Map::new();
    let raw = args.as_object().unwrap_or(&empty);

    let mut out = ToolArgs::new();
    for param in &spec.params {
        if let Some(value) = raw.get(param.name).and_then(|v| coerce(param, v)) {
            out.insert(param.name.to_string(), value);
        }
    }

    let missing: Vec<&str> = spec
        .params
        .iter()
        .filter(|p| p.required && !out.contains_key(p.name))
        .map(|p| p.name)
        .collect();
    if !missing.is_empty() {
        return Err(PageForgeError::validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    Ok(out)
}

fn coerce(param: &ParamSpec, value: &Value) -> Option<Value> {
    match param.param_type {
        ParamType::String => coerce_string(param, value).map(Value::String),
        ParamType::Number => coerce_number(value),
        ParamType::Bool => coerce_bool(value),
        ParamType::Array => coerce_array(param, value),
        ParamType::Object => coerce_object(value),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn coerce_string(param: &ParamSpec, value: &Value) -> Option<String> {
    let raw = scalar_text(value)?;
    let cleaned = match param.sanitizer {
        Some(sanitizer) => sanitizer.apply(&raw)?,
        None => raw,
    };
    let cleaned = if param.preserve_whitespace {
        cleaned
    } else {
        cleaned.trim().to_string()
    };
    (!cleaned.is_empty()).then_some(cleaned)
}

fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Some(Value::from(i))
            } else {
                s.parse::<f64>().ok().and_then(|f| {
                    serde_json::Number::from_f64(f).map(Value::Number)
                })
            }
        }
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::Number(n) => n.as_i64().map(|i| Value::Bool(i != 0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(Value::Bool(true)),
            "0" | "false" | "no" | "off" | "" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_array(param: &ParamSpec, value: &Value) -> Option<Value> {
    let entries = value.as_array()?;
    let kept: Vec<Value> = entries
        .iter()
        .filter_map(|entry| {
            let text = scalar_text(entry)?;
            let text = match param.sanitizer {
                Some(sanitizer) => sanitizer.apply(&text)?,
                None => text.trim().to_string(),
            };
            (!text.is_empty()).then_some(Value::String(text))
        })
        .collect();
    (!kept.is_empty()).then_some(Value::Array(kept))
}

fn coerce_object(value: &Value) -> Option<Value> {
    match value {
        Value::Object(_) => Some(value.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(decoded @ Value::Object(_)) => Some(decoded),
            _ => None,
        },
        _ => None,
    }
}
