//! Command-line interface for the importer.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::style;

use crate::diagnostics::Severity;
use crate::engine::ImportEngine;
use crate::error::{ImportError, Result};
use crate::model::InMemoryModel;
use crate::spec::ImportSpec;

/// Graft importer - run declarative import specs over XML documents.
#[derive(Parser)]
#[command(name = "graft-importer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate an import spec without running it.
    Check {
        /// Path to the import spec (YAML)
        spec: PathBuf,
    },
    /// Import a document and dump the resulting model as YAML.
    Import {
        /// Path to the import spec (YAML)
        spec: PathBuf,

        /// Path to the XML document to import
        document: PathBuf,

        /// Write the model dump to this file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { spec } => check_command(&spec),
        Commands::Import {
            spec,
            document,
            output,
        } => import_command(&spec, &document, output.as_deref()),
    }
}

fn check_command(spec_path: &Path) -> Result<()> {
    let spec = ImportSpec::from_file(spec_path)?;
    let name = spec.name.as_deref().unwrap_or("unnamed");

    println!(
        "{} {} ({} handlers)",
        style("Loaded").bold(),
        style(name).cyan(),
        spec.root.count()
    );

    let findings = spec.validate();
    if findings.is_empty() {
        println!("{}", style("Spec is usable").green());
        return Ok(());
    }
    for finding in &findings {
        println!("  {} {finding}", style("warning:").yellow().bold());
    }
    Err(ImportError::InvalidSpec(format!(
        "{} finding(s) in {}",
        findings.len(),
        spec_path.display()
    )))
}

fn import_command(spec_path: &Path, document: &Path, output: Option<&Path>) -> Result<()> {
    let spec = ImportSpec::from_file(spec_path)?;
    let engine = ImportEngine::new(spec);

    println!(
        "{} {}",
        style("Importing").bold(),
        style(document.display()).cyan()
    );

    let mut model = InMemoryModel::new();
    let report = engine.import_file(document, &mut model)?;

    for diagnostic in &report.diagnostics {
        let tag = match diagnostic.severity {
            Severity::Error => style("error:").red().bold(),
            Severity::Warning => style("warning:").yellow().bold(),
            Severity::Info => style("info:").dim(),
        };
        println!("  {tag} {}: {}", diagnostic.location, diagnostic.message);
    }

    println!(
        "  Objects: {}",
        style(report.objects_created).green().bold()
    );
    if report.errors() > 0 {
        println!("  Errors: {}", style(report.errors()).red().bold());
    }
    if report.warnings() > 0 {
        println!("  Warnings: {}", style(report.warnings()).yellow().bold());
    }

    let dump = serde_yaml_ng::to_string(&model)?;
    match output {
        Some(path) => {
            fs::write(path, dump)?;
            println!("{} {}", style("Saved to").bold(), path.display());
        }
        None => print!("{dump}"),
    }
    Ok(())
}
