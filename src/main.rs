use anyhow::Result;
use azgraph::pipeline::PipelineReport;
use azgraph::{common, generate_commands, plan, plan_execution};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a resource export and write one projection
    Analyze {
        csv: String,
        #[clap(short, long, default_value = "azure_graph.html")]
        output: String,
        /// html, json, dot, csv-nodes or csv-edges
        #[clap(short, long, default_value = "html")]
        format: String,
    },
    Run {
        #[clap(short, long)]
        plan: String,
        #[clap(short, long)]
        watch: bool,
    },
    Init {
        #[clap(short, long)]
        plan: String,
    },
    Generate {
        #[clap(subcommand)]
        command: GenerateCommands,
    },
}

#[derive(Subcommand, Debug)]
enum GenerateCommands {
    Template { name: String },
    Sample { dir: String },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    match args.command {
        Commands::Analyze {
            csv,
            output,
            format,
        } => {
            info!("Analyzing export: {}", csv);
            let report = plan_execution::analyze(&csv, &output, &format)?;
            print_report(&report);
            println!("{} {}", "Wrote".green(), output);
        }
        Commands::Run { plan, watch } => {
            info!("Running plan: {}", plan);
            let report = plan_execution::execute_plan(plan, watch)?;
            print_report(&report);
        }
        Commands::Init { plan } => {
            info!("Initializing plan: {}", plan);
            let plan_file_path = plan;
            let plan = plan::Plan::default();
            let serialized_plan = serde_yaml::to_string(&plan)?;
            common::write_string_to_file(&plan_file_path, &serialized_plan)?;
        }
        Commands::Generate { command } => match command {
            GenerateCommands::Template { name } => {
                info!("Generating template: {}", name);
                generate_commands::generate_template(name);
            }
            GenerateCommands::Sample { dir } => {
                info!("Generating sample in {}", dir);
                generate_commands::generate_sample(dir);
            }
        },
    }

    Ok(())
}

fn print_report(report: &PipelineReport) {
    let summary = &report.summary;
    println!("{}", "Exposure summary".bold());
    println!(
        "  {}: {}",
        "Directly exposed".red().bold(),
        summary.direct
    );
    println!(
        "  {}: {}",
        "Transitively exposed".yellow().bold(),
        summary.transitive
    );
    println!("  {}: {}", "Not exposed".green(), summary.not_exposed);
    if !report.is_clean() {
        println!(
            "  {} rejected records, {} dropped items (see log)",
            report.rejected.len().to_string().yellow(),
            report.dropped.len().to_string().yellow()
        );
    }
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("handlebars=off,{}", log_level)))
        .without_time()
        .init();
}
