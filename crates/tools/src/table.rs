//! The static tool table an agent is configured with.
//!
//! Resolution order is pinned: an exact name match always wins; only
//! when there is none is the requested name normalized and matched
//! against normalized tool names. If two tools normalize to the same
//! key, the first registered keeps it.

use ostinato_core::provider::ToolSchema;
use ostinato_core::tool::ToolDefinition;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ToolTable {
    tools: Vec<ToolDefinition>,
    exact: HashMap<String, usize>,
    normalized: HashMap<String, usize>,
}

/// Canonical form of a tool name: trimmed, without a leading `:`,
/// lowercase, with `-` folded to `_`.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_start_matches(':')
        .to_lowercase()
        .replace('-', "_")
}

impl ToolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = ToolDefinition>) -> Self {
        let mut table = Self::new();
        for def in definitions {
            table.register(def);
        }
        table
    }

    /// Register a tool. Replaces any existing tool with the same exact name.
    pub fn register(&mut self, tool: ToolDefinition) {
        if let Some(&idx) = self.exact.get(&tool.name) {
            self.tools[idx] = tool;
            return;
        }
        let idx = self.tools.len();
        self.exact.insert(tool.name.clone(), idx);
        self.normalized.entry(normalize_name(&tool.name)).or_insert(idx);
        self.tools.push(tool);
    }

    /// Resolve a requested name to a tool.
    pub fn resolve(&self, name: &str) -> Option<&ToolDefinition> {
        self.exact
            .get(name)
            .or_else(|| self.normalized.get(&normalize_name(name)))
            .map(|&idx| &self.tools[idx])
    }

    /// Schemas for every tool, in registration order.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.to_schema()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ostinato_core::tool::{ActionRef, ToolHandler};

    fn tool(name: &str, action: &str) -> ToolDefinition {
        ToolDefinition::new(name, "", vec![], ToolHandler::Action(ActionRef::new("r", action)))
    }

    fn action_of(def: &ToolDefinition) -> &str {
        match &def.handler {
            ToolHandler::Action(a) => &a.action,
            ToolHandler::Function(_) => "fn",
        }
    }

    #[test]
    fn normalization_rules() {
        assert_eq!(normalize_name(":Get-Weather "), "get_weather");
        assert_eq!(normalize_name("greet"), "greet");
    }

    #[test]
    fn exact_match_wins_over_normalized() {
        let table = ToolTable::from_definitions(vec![tool("get_weather", "a"), tool("Get-Weather", "b")]);
        assert_eq!(action_of(table.resolve("Get-Weather").unwrap()), "b");
        assert_eq!(action_of(table.resolve("get_weather").unwrap()), "a");
        // Normalized collision: first registered keeps the key
        assert_eq!(action_of(table.resolve("GET-WEATHER").unwrap()), "a");
    }

    #[test]
    fn symbol_style_name_resolves() {
        let table = ToolTable::from_definitions(vec![tool("greet", "a")]);
        assert!(table.resolve(":greet").is_some());
        assert!(table.resolve("missing").is_none());
    }

    #[test]
    fn re_registering_replaces_in_place() {
        let mut table = ToolTable::from_definitions(vec![tool("a", "1"), tool("b", "2")]);
        table.register(tool("a", "3"));
        assert_eq!(table.len(), 2);
        assert_eq!(table.names(), vec!["a", "b"]);
        assert_eq!(action_of(table.resolve("a").unwrap()), "3");
    }

    #[test]
    fn schemas_follow_registration_order() {
        let table = ToolTable::from_definitions(vec![tool("z", "1"), tool("a", "2")]);
        let names: Vec<_> = table.schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["z", "a"]);
    }
}
