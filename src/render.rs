//! Format trees, plans and upload results as text.

use crate::pipeline::Plan;
use crate::size::format_size;
use crate::tree::{NodeId, Tree};
use crate::upload::UploadReport;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Indented tree listing with kind icons and sizes.
///
/// Archive contents are collapsed to a member count unless `full` is set.
pub fn render_tree(tree: &Tree, full: bool) -> String {
    let mut out = String::new();
    let mut stack: Vec<(NodeId, usize)> = tree.roots().iter().rev().map(|r| (*r, 0)).collect();
    while let Some((id, indent)) = stack.pop() {
        let Some(node) = tree.get(id) else { continue };
        out.push_str(&"  ".repeat(indent));
        out.push_str(&format!(
            "{} {} ({})",
            node.kind().icon(),
            node.name(),
            format_size(node.size())
        ));
        if node.is_archive() && !full {
            let members = tree.subtree(id).len() - 1;
            out.push_str(&format!(" [{} entries]\n", members));
            continue;
        }
        out.push('\n');
        stack.extend(node.children().iter().rev().map(|c| (*c, indent + 1)));
    }
    out
}

/// One row per planned partition
pub fn partition_summary_table(plan: &Plan) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "Partition",
        "Files",
        "Archives",
        "Total size",
        "Largest archive",
        "Oversize",
    ]);
    for partition in &plan.partitions {
        let report = &partition.report;
        table.add_row(vec![
            display_name(&partition.name),
            partition.validation.leaves.to_string(),
            report.archives.len().to_string(),
            format_size(partition.tree.total_size()),
            report
                .largest()
                .map(|a| format_size(a.size))
                .unwrap_or_else(|| "-".to_string()),
            report.oversize().len().to_string(),
        ]);
    }
    table.to_string()
}

/// One row per uploaded partition, followed by any failures
pub fn upload_summary_table(reports: &[UploadReport]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Partition", "Uploaded", "Skipped", "Failed"]);
    for report in reports {
        table.add_row(vec![
            display_name(&report.partition),
            report.uploaded.len().to_string(),
            report.skipped.len().to_string(),
            report.failed.len().to_string(),
        ]);
    }

    let mut out = table.to_string();
    let failures: Vec<&(String, String)> = reports.iter().flat_map(|r| r.failed.iter()).collect();
    if !failures.is_empty() {
        out.push_str(&format!("\n\n{}\n", format_section_heading("Failed archives")));
        for (key, message) in failures {
            out.push_str(&format!("  {}: {}\n", key.red(), message));
        }
    }
    out
}

fn display_name(name: &str) -> String {
    if name.is_empty() {
        "(all)".to_string()
    } else {
        name.to_string()
    }
}
