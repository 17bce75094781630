//! The aggregated tool catalog: one callable surface across all
//! connected servers.
//!
//! The catalog is built exactly once per connection cycle (connecting
//! servers publish into a [`CatalogBuilder`] under a lock owned by
//! the session manager, which then merges in configuration order) and
//! is immutable once the session is handed out. On reload it is
//! rebuilt wholesale, never patched incrementally.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

/// A normalized tool advertised by a connected server.
///
/// Populated once at connect time; callers only ever see this shape,
/// never the protocol's native tool object.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// Free-form input schema, passed through opaquely.
    pub input_schema: Value,
    /// Index of the owning server in the configured list.
    pub server: usize,
}

impl ToolDescriptor {
    pub(crate) fn from_tool(server: usize, tool: rmcp::model::Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool
                .description
                .map(|d| d.to_string())
                .unwrap_or_default(),
            input_schema: serde_json::to_value(&tool.input_schema)
                .unwrap_or_else(|_| serde_json::json!({ "type": "object", "properties": {} })),
            server,
        }
    }
}

/// One tool in the calling model's function-calling shape:
/// `{"type": "function", "function": {name, description, parameters}}`.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionDef,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Accumulates per-server tool lists while connections come up in
/// arbitrary order, then merges them in configuration order.
///
/// Connect tasks publish here under a lock; the merge happens once,
/// after the aggregate wait, so collisions resolve to the later
/// configured server no matter how connect scheduling interleaved.
#[derive(Debug, Default)]
pub(crate) struct CatalogBuilder {
    slots: Vec<(usize, Vec<ToolDescriptor>)>,
}

impl CatalogBuilder {
    pub(crate) fn publish(&mut self, server: usize, tools: Vec<ToolDescriptor>) {
        self.slots.push((server, tools));
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.iter().all(|(_, tools)| tools.is_empty())
    }

    pub(crate) fn build(mut self) -> ToolCatalog {
        self.slots.sort_by_key(|&(server, _)| server);
        let mut catalog = ToolCatalog::default();
        for (_, tools) in self.slots {
            catalog.register_server(tools);
        }
        catalog
    }
}

/// Mapping from tool name to owning server, plus the ordered
/// descriptor list the model-facing tool list is rendered from.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    descriptors: Vec<ToolDescriptor>,
    by_name: HashMap<String, usize>,
}

impl ToolCatalog {
    /// Publish one server's tools into the catalog.
    ///
    /// On a name collision the new entry replaces the old one. Called
    /// in configuration order by [`CatalogBuilder::build`], so the
    /// later configured server owns the name; the warning makes the
    /// override visible so deployments can avoid overlapping names by
    /// convention.
    pub(crate) fn register_server(&mut self, tools: Vec<ToolDescriptor>) {
        for tool in tools {
            match self.by_name.get(&tool.name) {
                Some(&slot) => {
                    tracing::warn!(
                        tool = %tool.name,
                        previous_server = self.descriptors[slot].server,
                        new_server = tool.server,
                        "tool name collision, later registration wins"
                    );
                    self.descriptors[slot] = tool;
                }
                None => {
                    self.by_name.insert(tool.name.clone(), self.descriptors.len());
                    self.descriptors.push(tool);
                }
            }
        }
    }

    /// Look up the descriptor owning `name`.
    pub fn lookup(&self, name: &str) -> Option<&ToolDescriptor> {
        self.by_name.get(name).map(|&slot| &self.descriptors[slot])
    }

    /// Render the full tool list in function-calling shape.
    pub fn function_specs(&self) -> Vec<FunctionSpec> {
        self.descriptors
            .iter()
            .map(|tool| FunctionSpec {
                kind: "function",
                function: FunctionDef {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.input_schema.clone(),
                },
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
