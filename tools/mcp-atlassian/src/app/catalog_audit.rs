//! Static self-check of the tool catalogs against the dispatcher's routes.

use crate::{
    app::dispatcher::Dispatcher,
    domain::schema::{ParamSpec, ToolSchema},
};
use serde::Serialize;
use serde_json::{Value, json};
use std::{collections::BTreeMap, time::Instant};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

#[derive(Clone, Debug, Serialize)]
pub struct CaseResult {
    pub name: String,
    pub passed: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AuditReport {
    pub generated_at: String,
    pub read_only: bool,
    pub tool_count: usize,
    pub pass_rate: f64,
    pub cases: Vec<CaseResult>,
}

impl AuditReport {
    pub fn passed(&self) -> bool {
        self.cases.iter().all(|case| case.passed)
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str(&format!(
            "Catalog audit ({} tools, read_only={})\n\n",
            self.tool_count, self.read_only
        ));
        md.push_str("| Case | Status | Duration (ms) | Notes |\n");
        md.push_str("| --- | --- | --- | --- |\n");
        for case in &self.cases {
            let status = if case.passed { "✅" } else { "❌" };
            let notes = case
                .detail
                .as_ref()
                .map(|v| serde_json::to_string(v).unwrap_or_default())
                .unwrap_or_else(|| "-".into());
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                case.name, status, case.duration_ms, notes
            ));
        }
        md.push_str(&format!("\nPass rate: {:.2}%", self.pass_rate * 100.0));
        md
    }
}

pub struct CatalogAudit<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> CatalogAudit<'a> {
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self { dispatcher }
    }

    fn tools(&self) -> Vec<&'a ToolSchema> {
        self.dispatcher
            .toolboxes()
            .into_iter()
            .flat_map(|toolbox| toolbox.all())
            .collect()
    }

    pub fn run(&self) -> AuditReport {
        let checks: [(&str, fn(&Self) -> Vec<String>); 7] = [
            ("unique_tool_names", Self::unique_names),
            ("routes_cover_catalog", Self::routes_cover_catalog),
            ("route_access_matches_schema", Self::route_access_matches),
            ("required_params_have_no_default", Self::required_without_default),
            ("bounds_are_numeric_and_ordered", Self::bounds_sane),
            ("defaults_within_bounds", Self::defaults_within_bounds),
            ("read_only_listing_excludes_writes", Self::read_only_listing),
        ];

        let mut cases = Vec::with_capacity(checks.len());
        for (name, check) in checks {
            let timer = Instant::now();
            let problems = check(self);
            cases.push(CaseResult {
                name: name.to_string(),
                passed: problems.is_empty(),
                duration_ms: timer.elapsed().as_millis() as u64,
                detail: (!problems.is_empty()).then(|| json!({ "problems": problems })),
            });
        }

        let pass_count = cases.iter().filter(|c| c.passed).count() as f64;
        let total = cases.len().max(1) as f64;
        AuditReport {
            generated_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| OffsetDateTime::now_utc().to_string()),
            read_only: self.dispatcher.read_only(),
            tool_count: self.tools().len(),
            pass_rate: pass_count / total,
            cases,
        }
    }

    fn unique_names(&self) -> Vec<String> {
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        for tool in self.tools() {
            *seen.entry(tool.name()).or_default() += 1;
        }
        seen.into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, count)| format!("{name} declared {count} times"))
            .collect()
    }

    fn routes_cover_catalog(&self) -> Vec<String> {
        let tools = self.tools();
        let mut problems: Vec<String> = tools
            .iter()
            .filter(|tool| self.dispatcher.route_access(tool.name()).is_none())
            .map(|tool| format!("{} has no handler", tool.name()))
            .collect();
        for route in self.dispatcher.route_names() {
            if !tools.iter().any(|tool| tool.name() == route) {
                problems.push(format!("route {route} has no catalog entry"));
            }
        }
        problems
    }

    fn route_access_matches(&self) -> Vec<String> {
        self.tools()
            .into_iter()
            .filter_map(|tool| {
                let access = self.dispatcher.route_access(tool.name())?;
                (access != tool.access()).then(|| {
                    format!(
                        "{}: schema says {}, route says {}",
                        tool.name(),
                        tool.access().as_str(),
                        access.as_str()
                    )
                })
            })
            .collect()
    }

    fn required_without_default(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for tool in self.tools() {
            for name in tool.required_params() {
                match tool.param(name) {
                    None => problems.push(format!("{}: required '{name}' is undeclared", tool.name())),
                    Some(param) if param.default.is_some() => {
                        problems.push(format!("{}: required '{name}' declares a default", tool.name()))
                    }
                    Some(_) => {}
                }
            }
        }
        problems
    }

    fn bounds_sane(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for tool in self.tools() {
            for param in tool.params() {
                let bounded = param.minimum.is_some() || param.maximum.is_some();
                if bounded && !param.kind.is_numeric() {
                    problems.push(format!("{}.{}: bounds on non-numeric", tool.name(), param.name));
                }
                if let (Some(min), Some(max)) = (param.minimum, param.maximum) {
                    if min > max {
                        problems.push(format!("{}.{}: minimum > maximum", tool.name(), param.name));
                    }
                }
            }
        }
        problems
    }

    fn defaults_within_bounds(&self) -> Vec<String> {
        self.tools()
            .into_iter()
            .flat_map(|tool| {
                tool.params()
                    .iter()
                    .filter(|param| default_out_of_range(param))
                    .map(move |param| format!("{}.{}: default outside bounds", tool.name(), param.name))
            })
            .collect()
    }

    fn read_only_listing(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for toolbox in self.dispatcher.toolboxes() {
            for tool in toolbox.list(true) {
                if tool.is_write() {
                    problems.push(format!("{} listed in read-only mode", tool.name()));
                }
            }
            if toolbox.list(false).len() != toolbox.all().len() {
                problems.push(format!("{} listing drops tools", toolbox.area().as_str()));
            }
        }
        problems
    }
}

fn default_out_of_range(param: &ParamSpec) -> bool {
    let Some(value) = param.default.as_ref().and_then(Value::as_f64) else {
        return false;
    };
    param.minimum.is_some_and(|min| value < min as f64)
        || param.maximum.is_some_and(|max| value > max as f64)
}
