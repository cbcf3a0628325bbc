//! diglab2bids CLI
//!
//! Command-line tool for turning DigLab session records into BIDS ephys datasets.

mod logging;

use clap::{Parser, Subcommand, ValueEnum};
use diglab_core::{
    collect_data_files, convert_project, generate_from_csv, rules, ConfigFile, ConversionReport,
    ConvertOptions, CreationMode, ProjectConfig, RULES_SET,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "diglab2bids")]
#[command(about = "Build BIDS ephys datasets from DigLab session records", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a dataset from a CSV table with sub_id and ses_id columns
    Generate {
        /// Path to the CSV file
        csv: PathBuf,

        /// Existing dataset root directory
        dir: PathBuf,

        /// Data file to place in every session (repeatable)
        #[arg(short = 'f', long = "data-file")]
        data_files: Vec<PathBuf>,

        /// Directory of data files; all .nix files below it are placed
        #[arg(long, conflicts_with = "data_files")]
        data_dir: Option<PathBuf>,

        /// How data files are placed
        #[arg(short, long, value_enum, default_value_t = ModeArg::Copy)]
        mode: ModeArg,

        /// Dataset name for dataset_description.json
        #[arg(long, default_value = "")]
        name: String,
    },

    /// Convert the REDCap record export of a configured project
    Convert {
        /// Path to the project configuration file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Project name inside the configuration file
        #[arg(short, long)]
        project: String,

        /// Record export to read instead of the configured one
        #[arg(short, long)]
        records: Option<PathBuf>,
    },

    /// Print the per-level naming rules
    Rules,

    /// Create a configuration file template
    InitConfig {
        /// Output path for the configuration file
        #[arg(short, long)]
        output: PathBuf,

        /// Project name
        #[arg(short, long, default_value = "SimpleProject")]
        project: String,

        /// Dataset root of the project
        #[arg(long)]
        output_dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Copy,
    Link,
    Move,
}

impl From<ModeArg> for CreationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Copy => CreationMode::Copy,
            ModeArg::Link => CreationMode::Link,
            ModeArg::Move => CreationMode::Move,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(logging::level_from_flags(cli.verbose, cli.quiet)) {
        eprintln!("Error: failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli.command) {
        tracing::error!("{e}");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> diglab_core::Result<()> {
    match command {
        Commands::Generate {
            csv,
            dir,
            data_files,
            data_dir,
            mode,
            name,
        } => cmd_generate(&csv, &dir, data_files, data_dir.as_deref(), mode.into(), name),
        Commands::Convert {
            config,
            project,
            records,
        } => cmd_convert(&config, &project, records),
        Commands::Rules => cmd_rules(),
        Commands::InitConfig {
            output,
            project,
            output_dir,
        } => cmd_init_config(&output, &project, &output_dir),
    }
}

fn cmd_generate(
    csv: &Path,
    dir: &Path,
    mut data_files: Vec<PathBuf>,
    data_dir: Option<&Path>,
    mode: CreationMode,
    name: String,
) -> diglab_core::Result<()> {
    if let Some(data_dir) = data_dir {
        data_files = collect_data_files(data_dir, "nix")?;
        println!("Found {} data files in {}", data_files.len(), data_dir.display());
    }

    let options = ConvertOptions {
        project_name: name,
        mode,
        data_files,
        ..ConvertOptions::default()
    };

    let report = generate_from_csv(csv, dir, &options)?;
    print_report(&report);
    Ok(())
}

fn cmd_convert(
    config_path: &Path,
    project_name: &str,
    records: Option<PathBuf>,
) -> diglab_core::Result<()> {
    let config = ConfigFile::load(config_path)?;
    let mut project = config.project(project_name)?.clone();
    if records.is_some() {
        project.records_file = records;
    }

    println!("Project: {}", project_name);
    println!("Records: {}", project.records_path().display());
    println!();

    let report = convert_project(project_name, &project)?;
    print_report(&report);
    Ok(())
}

fn cmd_rules() -> diglab_core::Result<()> {
    for rule in RULES_SET.iter() {
        let directory = if rule.directory.is_empty() {
            "<root>"
        } else {
            rule.directory
        };
        println!("Level {}: {}", rule.level, directory);
        if rule.authorized_metadata_files.is_empty() {
            println!("  (no metadata files)");
        }
        for file in rule.authorized_metadata_files {
            if rule.level == rules::Level::Data {
                println!("  sub-<label>[_ses-<label>]_{}", file);
            } else {
                println!("  {}", file);
            }
        }
    }
    Ok(())
}

fn cmd_init_config(output: &Path, project: &str, output_dir: &Path) -> diglab_core::Result<()> {
    let mut config = ConfigFile::default();
    config.projects.insert(
        project.to_string(),
        ProjectConfig::new(format!("projects/{}", project), output_dir),
    );

    config.save(output)?;
    println!("Created configuration file: {}", output.display());
    println!();
    println!("Place the downloaded record export at the records path, then run:");
    println!(
        "  diglab2bids convert --config {} --project {}",
        output.display(),
        project
    );

    Ok(())
}

fn print_report(report: &ConversionReport) {
    println!("Dataset: {}", report.root.display());
    println!("  {} sessions converted", report.sessions.len());
    for ids in &report.sessions {
        println!("    {}/{}", ids.subject_dir(), ids.session_dir());
    }
    println!("  {} data files placed", report.data_files.len());
    if report.placeholders > 0 {
        println!("  {} sessions without data (empty placeholder written)", report.placeholders);
    }
    println!("  {} metadata files written", report.metadata_files.len());
}
