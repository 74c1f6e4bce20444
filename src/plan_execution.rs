use crate::data_loader;
use crate::export;
use crate::graph::Graph;
use crate::pipeline::{self, PipelineReport};
use crate::plan::{ExportFileType, ExportProfileItem, Plan};
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use tracing::{debug, error, info, warn};

use anyhow::{anyhow, bail, Result};

fn plan_dir(plan_file_path: &Path) -> Result<&Path> {
    plan_file_path
        .parent()
        .ok_or_else(|| anyhow!("Plan file has no parent directory"))
}

/// Resolves `filename` against the directory holding the plan file.
fn resolve(plan_file_path: &Path, filename: &str) -> Result<PathBuf> {
    Ok(plan_dir(plan_file_path)?.join(filename))
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow!("Path contains invalid UTF-8: {}", path.display()))
}

/// Maps a `-f` format name onto an exporter.
pub fn exporter_for_format(format: &str) -> Result<ExportFileType> {
    match format.to_lowercase().as_str() {
        "html" => Ok(ExportFileType::HTML),
        "json" => Ok(ExportFileType::JSON),
        "dot" => Ok(ExportFileType::DOT),
        "csv-nodes" => Ok(ExportFileType::CSVNodes),
        "csv-edges" => Ok(ExportFileType::CSVEdges),
        _ => bail!(
            "Unsupported format: {} - use html, json, dot, csv-nodes, csv-edges",
            format
        ),
    }
}

fn log_report(report: &PipelineReport) {
    info!(
        "Processed {} records: {}",
        report.records, report.summary
    );
    for rejected in &report.rejected {
        warn!("Rejected record: {}", rejected);
    }
    for dropped in &report.dropped {
        warn!("Dropped during assembly: {}", dropped);
    }
}

/// Renders one export profile. The output file and any custom template
/// paths are relative to `base_dir`.
pub fn export_graph(graph: &Graph, profile: &ExportProfileItem, base_dir: &Path) -> Result<()> {
    let target = base_dir.join(&profile.filename);
    let filename = path_str(&target)?;
    info!(
        "Starting export to file: {} using exporter {:?}",
        filename, profile.exporter
    );

    let render_config = profile.get_render_config();
    let view = export::project(graph, &profile.get_graph_config());
    debug!(
        "Export view: {} nodes, {} edges",
        view.node_count(),
        view.edge_count()
    );

    let output = match &profile.exporter {
        ExportFileType::JSON => export::to_json::render(&view, &render_config),
        ExportFileType::HTML => export::to_jsgraph::render(&view, &render_config),
        ExportFileType::DOT => export::to_dot::render(&view, &render_config),
        ExportFileType::CSVNodes => export::to_csv_nodes::render(&view, &render_config),
        ExportFileType::CSVEdges => export::to_csv_edges::render(&view, &render_config),
        ExportFileType::Custom(template_config) => export::to_custom::render(
            &view,
            &render_config,
            &template_config.relative_to(base_dir),
        ),
    }?;

    crate::common::write_string_to_file(filename, &output)
}

/// Loads the export named by the plan and runs the pipeline over it.
pub fn build_graph(plan: &Plan, plan_file_path: &Path) -> Result<(Graph, PipelineReport)> {
    let import_file_path = resolve(plan_file_path, &plan.import.filename)?;
    info!("Importing file: {}", import_file_path.display());
    info!("{}", plan.import.columns);

    let records = data_loader::load_records(path_str(&import_file_path)?)?;
    data_loader::verify_headers(&records, &plan.import.columns)?;

    let (graph, report) =
        pipeline::run(&plan.name(), &records, &plan.import.columns, &plan.exposure)?;
    log_report(&report);
    Ok((graph, report))
}

/// Executes a single plan: one pipeline run, then every export profile.
pub fn run_plan(plan: &Plan, plan_file_path: &Path) -> Result<PipelineReport> {
    let (graph, report) = build_graph(plan, plan_file_path)?;

    if let Err(errors) = graph.verify_graph_integrity() {
        warn!("Identified {} graph integrity error(s)", errors.len());
        errors.iter().for_each(|e| warn!("{}", e));
        warn!("Not rendering exports");
        return Ok(report);
    }
    info!("Graph integrity verified : ok - rendering exports");

    let base_dir = plan_dir(plan_file_path)?;
    for profile in &plan.export.profiles {
        if let Err(e) = export_graph(&graph, profile, base_dir) {
            error!("Failed to export file {}: {}", profile.filename, e);
        }
    }

    Ok(report)
}

/// Main function to execute a plan, with optional file watching
pub fn execute_plan(plan: String, watch: bool) -> Result<PipelineReport> {
    info!("Executing plan {}", plan);

    let plan_file_path = Path::new(&plan);
    let path_content = std::fs::read_to_string(plan_file_path)?;
    let plan: Plan = serde_yaml::from_str(&path_content)?;

    debug!("Executing plan: {:?}", plan);
    let report = run_plan(&plan, plan_file_path)?;

    if watch {
        watch_for_changes(&plan, plan_file_path)?;
    }

    Ok(report)
}

/// One-shot flow without a plan file: load `csv`, classify with the
/// built-in rules and write a single export.
pub fn analyze(csv: &str, output: &str, format: &str) -> Result<PipelineReport> {
    let exporter = exporter_for_format(format)?;
    let name = Path::new(csv)
        .file_stem()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("azure")
        .to_string();

    let plan = Plan::default();
    let records = data_loader::load_records(csv)?;
    data_loader::verify_headers(&records, &plan.import.columns)?;

    let (graph, report) = pipeline::run(&name, &records, &plan.import.columns, &plan.exposure)?;
    log_report(&report);

    export_graph(&graph, &ExportProfileItem::new(output, exporter), Path::new(""))?;
    info!("Wrote {}", output);
    Ok(report)
}

/// Sets up file watching for the input file to re-run the plan on changes
fn watch_for_changes(plan: &Plan, plan_file_path: &Path) -> Result<()> {
    info!("Watching for changes");
    let path = resolve(plan_file_path, &plan.import.filename)?;

    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(tx, Config::default())?;
    watcher.watch(&path, RecursiveMode::NonRecursive)?;

    loop {
        match rx.recv() {
            Ok(Ok(event)) => {
                if let EventKind::Modify(_) = event.kind {
                    debug!("File modified {:?}", event.paths);
                    info!("Change detected, re-executing plan");
                    if let Err(e) = run_plan(plan, plan_file_path) {
                        error!("Plan execution failed: {}", e);
                    }
                }
            }
            Ok(Err(e)) => error!("Watch error: {:?}", e),
            Err(e) => bail!("Watch channel closed: {}", e),
        }
    }
}
