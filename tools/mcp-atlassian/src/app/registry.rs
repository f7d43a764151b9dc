use crate::{
    app::catalog,
    domain::{error::ProductArea, schema::ToolSchema},
};
use rmcp::model::Tool;
use std::collections::HashMap;

/// Immutable catalog for one product area. The name index is built together
/// with the ordered list and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Toolbox {
    area: ProductArea,
    tools: Vec<ToolSchema>,
    index: HashMap<&'static str, usize>,
}

impl Toolbox {
    pub fn new(area: ProductArea, tools: Vec<ToolSchema>) -> Self {
        let mut index = HashMap::with_capacity(tools.len());
        for (pos, tool) in tools.iter().enumerate() {
            // first declaration wins; duplicates are reported by the catalog audit
            index.entry(tool.name()).or_insert(pos);
        }
        Self { area, tools, index }
    }

    pub fn jira() -> Self {
        Self::new(ProductArea::Jira, catalog::jira::tools())
    }

    pub fn confluence() -> Self {
        Self::new(ProductArea::Confluence, catalog::confluence::tools())
    }

    pub fn area(&self) -> ProductArea {
        self.area
    }

    pub fn all(&self) -> &[ToolSchema] {
        &self.tools
    }

    /// Declaration-ordered tools visible under the given mode.
    pub fn list(&self, read_only: bool) -> Vec<&ToolSchema> {
        self.tools
            .iter()
            .filter(|tool| !read_only || !tool.is_write())
            .collect()
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolSchema> {
        self.index.get(name).map(|&pos| &self.tools[pos])
    }

    pub fn describe_all(&self, read_only: bool) -> Vec<Tool> {
        self.list(read_only)
            .into_iter()
            .map(ToolSchema::describe)
            .collect()
    }
}
