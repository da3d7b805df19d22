// SPDX-License-Identifier: MIT OR Apache-2.0
//! `OrdoPlay` graph tool.
//!
//! Loads a node graph file of any supported schema, validates it, and
//! optionally lays it out and writes it back as schema v2.
//!
//! ```text
//! ordoplay_graph_tool <input> [output] [--layout] [--allow-invalid] [--settings <file>]
//! ```

use clap::Parser;
use ordoplay_graph_document::{
    FsStorage, GraphEngineSettings, ManagerError, NodeGraphManager, SettingsError,
};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, thiserror::Error)]
enum ToolError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Manager(#[from] ManagerError),
}

/// Upgrade, validate and lay out OrdoPlay node graph documents
#[derive(Debug, Parser)]
#[command(name = "ordoplay_graph_tool")]
#[command(version)]
#[command(about = "Upgrade, validate and lay out OrdoPlay node graph documents")]
struct Options {
    /// Graph file to load (any supported schema)
    input: PathBuf,

    /// Where to write the schema v2 result
    output: Option<PathBuf>,

    /// Auto-layout the tree before saving
    #[arg(long)]
    layout: bool,

    /// Keep going when validation fails
    #[arg(long)]
    allow_invalid: bool,

    /// Engine settings file (RON)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Options {
    fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 => "ordoplay_graph_document=info",
            1 => "ordoplay_graph_document=debug",
            _ => "ordoplay_graph_document=trace",
        }
    }
}

fn run(options: &Options) -> Result<(), ToolError> {
    let settings = match &options.settings {
        Some(path) => GraphEngineSettings::load(path)?,
        None => GraphEngineSettings::default(),
    };
    let mut manager = NodeGraphManager::with_storage(FsStorage, settings);

    let id = manager.load_graph(&options.input)?;
    if let Some(doc) = manager.get_graph(id) {
        tracing::info!(
            "{}: {} nodes, {} links",
            options.input.display(),
            doc.node_count(),
            doc.link_count()
        );
        for dangling in doc.dangling_references() {
            tracing::warn!("{dangling}");
        }
    }

    match manager.validate_graph(id) {
        Ok(()) => tracing::info!("Graph is valid"),
        Err(err) if options.allow_invalid => tracing::warn!("Continuing past invalid graph: {err}"),
        Err(err) => return Err(err.into()),
    }

    if options.layout {
        manager.auto_layout_graph(id)?;
    }

    if let Some(output) = &options.output {
        manager.save_graph(id, output)?;
    }
    Ok(())
}

fn main() {
    let options = Options::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    match options.log_directive().parse() {
        Ok(directive) => env_filter = env_filter.add_directive(directive),
        Err(e) => eprintln!("Invalid log directive: {e}"),
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::debug!("Starting OrdoPlay graph tool v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&options) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
