use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use mcp_atlassian::app::{catalog_audit::CatalogAudit, dispatcher::Dispatcher};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Check the Confluence and Jira tool catalogs against the dispatcher routes."
)]
struct Args {
    /// Audit the listing as it appears in read-only mode
    #[arg(long)]
    read_only: bool,

    /// Path to write the JSON report (optional)
    #[arg(long)]
    output_json: Option<PathBuf>,

    /// Path to write the Markdown report (optional)
    #[arg(long)]
    output_md: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let dispatcher = Dispatcher::new(None, None, args.read_only);
    let report = CatalogAudit::new(&dispatcher).run();

    let json_report = serde_json::to_string_pretty(&report)?;
    println!("{}", json_report);

    if let Some(path) = args.output_json {
        fs::write(&path, &json_report)
            .with_context(|| format!("write json report to {}", path.display()))?;
    }
    if let Some(path) = args.output_md {
        fs::write(&path, report.to_markdown())
            .with_context(|| format!("write markdown report to {}", path.display()))?;
    }

    if !report.passed() {
        eprintln!(
            "catalog audit failed (pass rate {:.2}%)",
            report.pass_rate * 100.0
        );
        std::process::exit(1);
    }

    Ok(())
}
