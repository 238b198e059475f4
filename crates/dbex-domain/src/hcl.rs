//! Minimal HCL rendering for generated configuration.
//!
//! The model is deliberately small: attributes, repeated nested blocks,
//! and expression values for cross-resource references. Rendering is
//! deterministic and roughly matches `terraform fmt` output (two-space
//! indent, `=` aligned per block).

use indexmap::IndexMap;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum HclValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Quoted string carrying intentional interpolation, e.g.
    /// `"${path.module}/notebooks/x.py"`. Escaped like `Str` except the
    /// `${` and `%{` sigils survive.
    Template(String),
    /// Raw expression emitted without quoting, e.g.
    /// `databricks_cluster_policy.users.id` or `var.secret_value`.
    Expr(String),
    List(Vec<HclValue>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HclBlock {
    attrs: IndexMap<String, HclValue>,
    blocks: Vec<(String, HclBlock)>,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Pad attribute names so the `=` signs line up within each block.
    pub align_equals: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { align_equals: true }
    }
}

impl HclBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: HclValue) {
        self.attrs.insert(key.into(), value);
    }

    pub fn push_block(&mut self, name: impl Into<String>, block: HclBlock) {
        self.blocks.push((name.into(), block));
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.blocks.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&HclValue> {
        self.attrs.get(key)
    }

    /// Builds a block from a JSON object. `resolve` sees every scalar leaf
    /// with its dotted path (array indices elided) and may substitute the
    /// rendered value, which is how reference expressions and variables
    /// replace literals. Null, empty-string, and empty-collection leaves
    /// are dropped.
    pub fn from_json(
        object: &serde_json::Map<String, Value>,
        path: &str,
        resolve: &dyn Fn(&str, &Value) -> Option<HclValue>,
    ) -> Self {
        let mut block = HclBlock::new();
        for (key, value) in object {
            let child_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };
            match value {
                Value::Null => {}
                Value::String(s) if s.is_empty() => {}
                Value::Object(map) => {
                    let nested = Self::from_json(map, &child_path, resolve);
                    if !nested.is_empty() {
                        block.push_block(key.clone(), nested);
                    }
                }
                Value::Array(items) if items.is_empty() => {}
                Value::Array(items) if items.iter().all(Value::is_object) => {
                    for item in items {
                        if let Value::Object(map) = item {
                            let nested = Self::from_json(map, &child_path, resolve);
                            if !nested.is_empty() {
                                block.push_block(key.clone(), nested);
                            }
                        }
                    }
                }
                Value::Array(items) => {
                    let rendered = items
                        .iter()
                        .map(|item| scalar_value(&child_path, item, resolve))
                        .collect();
                    block.set(key.clone(), HclValue::List(rendered));
                }
                scalar => {
                    block.set(key.clone(), scalar_value(&child_path, scalar, resolve));
                }
            }
        }
        block
    }
}

fn scalar_value(path: &str, value: &Value, resolve: &dyn Fn(&str, &Value) -> Option<HclValue>) -> HclValue {
    if let Some(substituted) = resolve(path, value) {
        return substituted;
    }
    match value {
        Value::Bool(b) => HclValue::Bool(*b),
        Value::Number(n) => n
            .as_i64()
            .map(HclValue::Int)
            .unwrap_or_else(|| HclValue::Float(n.as_f64().unwrap_or_default())),
        Value::String(s) => HclValue::Str(s.clone()),
        other => HclValue::Str(other.to_string()),
    }
}

/// Renders one top-level block, e.g.
/// `resource "databricks_cluster" "test1" { ... }`.
pub fn render_block(header: &str, block: &HclBlock, options: RenderOptions) -> String {
    let mut out = String::new();
    out.push_str(header);
    out.push_str(" {\n");
    render_body(block, 1, options, &mut out);
    out.push_str("}\n");
    out
}

fn render_body(block: &HclBlock, depth: usize, options: RenderOptions, out: &mut String) {
    let indent = "  ".repeat(depth);
    let width = if options.align_equals {
        block.attrs.keys().map(String::len).max().unwrap_or(0)
    } else {
        0
    };
    for (key, value) in &block.attrs {
        out.push_str(&indent);
        out.push_str(key);
        for _ in key.len()..width {
            out.push(' ');
        }
        out.push_str(" = ");
        render_value(value, out);
        out.push('\n');
    }
    for (name, nested) in &block.blocks {
        out.push_str(&indent);
        out.push_str(name);
        out.push_str(" {\n");
        render_body(nested, depth + 1, options, out);
        out.push_str(&indent);
        out.push_str("}\n");
    }
}

fn render_value(value: &HclValue, out: &mut String) {
    match value {
        HclValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        HclValue::Int(i) => out.push_str(&i.to_string()),
        HclValue::Float(f) => out.push_str(&f.to_string()),
        HclValue::Expr(expr) => out.push_str(expr),
        HclValue::Str(s) => {
            out.push('"');
            out.push_str(&escape_string(s, true));
            out.push('"');
        }
        HclValue::Template(s) => {
            out.push('"');
            out.push_str(&escape_string(s, false));
            out.push('"');
        }
        HclValue::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_value(item, out);
            }
            out.push(']');
        }
    }
}

fn escape_string(raw: &str, escape_sigils: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // `${` and `%{` start template interpolation in HCL; double the
            // sigil so the literal survives.
            '$' | '%' if escape_sigils && chars.peek() == Some(&'{') => {
                out.push(ch);
                out.push(ch);
            }
            other => out.push(other),
        }
    }
    out
}
