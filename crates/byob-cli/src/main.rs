//! Custom block library CLI.
//!
//! Provides the `byob` binary for working with exported block libraries:
//! `inspect` lists the blocks of a library, `deps` prints the dependency
//! closure of one block, and `prune` writes a smaller library holding only
//! some blocks and what they need.
//!
//! Libraries are loaded into a scratch project through the same import
//! workflow the editor uses, so calls between blocks resolve identically.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use byob_core::id::{DefinitionId, ReceiverId};
use byob_editor::{EditorError, ExportPicker, ImportPicker, Project, ProjectSettings};
use byob_storage::LibraryBundle;

/// Custom block library tools.
#[derive(Parser)]
#[command(name = "byob", about = "Custom block library tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List the blocks of a library.
    Inspect {
        /// Path to the library file.
        #[arg(short, long)]
        library: PathBuf,

        /// Language for block labels (default: $BYOB_LANG, then "en").
        #[arg(long)]
        lang: Option<String>,
    },
    /// Print the blocks one block depends on.
    Deps {
        /// Path to the library file.
        #[arg(short, long)]
        library: PathBuf,

        /// Spec of the block, as listed by `inspect`.
        #[arg(short, long)]
        block: String,
    },
    /// Write a library with only the given blocks and their dependencies.
    Prune {
        /// Path to the library file.
        #[arg(short, long)]
        library: PathBuf,

        /// Specs of the blocks to keep.
        #[arg(short, long, required = true)]
        keep: Vec<String>,

        /// Where to write the pruned library.
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Inspect { library, lang } => {
            let lang = lang
                .or_else(|| std::env::var("BYOB_LANG").ok())
                .unwrap_or_else(|| "en".to_string());
            run_inspect(&library, &lang)
        }
        Commands::Deps { library, block } => run_deps(&library, &block),
        Commands::Prune {
            library,
            keep,
            output,
        } => run_prune(&library, &keep, &output),
    };
    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

/// Execute the inspect subcommand.
///
/// Returns exit code: 0 = success, 3 = unreadable library.
fn run_inspect(path: &Path, lang: &str) -> i32 {
    match load_library(path, lang) {
        Ok(library) => {
            println!("{}", pretty(&library.summary()));
            0
        }
        Err(e) => {
            eprintln!("Error: failed to load library '{}': {}", path.display(), e);
            3
        }
    }
}

/// Execute the deps subcommand.
///
/// Returns exit code: 0 = success, 1 = unknown block, 3 = unreadable
/// library.
fn run_deps(path: &Path, spec: &str) -> i32 {
    let library = match load_library(path, "en") {
        Ok(library) => library,
        Err(e) => {
            eprintln!("Error: failed to load library '{}': {}", path.display(), e);
            return 3;
        }
    };
    match library.dependencies(spec) {
        Ok(Some(specs)) => {
            println!("{}", pretty(&json!(specs)));
            0
        }
        Ok(None) => {
            eprintln!("Error: no block '{}' in library '{}'", spec, library.name);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Execute the prune subcommand.
///
/// Returns exit code: 0 = success, 1 = unknown block, 3 = I/O error.
fn run_prune(path: &Path, keep: &[String], output: &Path) -> i32 {
    let library = match load_library(path, "en") {
        Ok(library) => library,
        Err(e) => {
            eprintln!("Error: failed to load library '{}': {}", path.display(), e);
            return 3;
        }
    };
    let pruned = match library.pruned(keep) {
        Ok(Ok(bundle)) => bundle,
        Ok(Err(missing)) => {
            eprintln!("Error: no block '{}' in library '{}'", missing, library.name);
            return 1;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if let Err(e) = pruned.write_to(output) {
        eprintln!("Error: failed to write '{}': {}", output.display(), e);
        return 3;
    }
    info!(kept = pruned.definitions.len(), output = %output.display(), "pruned library");
    println!("{}", pretty(&json!(pruned.specs())));
    0
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize: {}\"}}", e))
}

// ---------------------------------------------------------------------------
// Loaded libraries
// ---------------------------------------------------------------------------

/// A library imported into a scratch project.
struct Library {
    name: String,
    format: String,
    checksum: String,
    project: Project,
    ids: Vec<DefinitionId>,
}

/// Reads, verifies and imports a library file.
fn load_library(path: &Path, lang: &str) -> Result<Library, EditorError> {
    let bundle = LibraryBundle::read_from(path)?;
    let settings = ProjectSettings {
        language: lang.to_string(),
        refresh_palette: false,
        ..ProjectSettings::default()
    };
    let mut project = Project::new(settings);
    let name = bundle.name.clone();
    let format = bundle.format.clone();
    let checksum = bundle.checksum.clone();
    let ids = if bundle.definitions.is_empty() {
        Vec::new()
    } else {
        ImportPicker::from_bundle(&mut project, bundle, ReceiverId::STAGE)?
            .import(&mut project, ReceiverId::STAGE)?
    };
    Ok(Library {
        name,
        format,
        checksum,
        project,
        ids,
    })
}

impl Library {
    fn find(&self, spec: &str) -> Option<DefinitionId> {
        self.ids.iter().copied().find(|id| {
            self.project
                .definition(*id)
                .is_ok_and(|def| def.spec() == spec || def.block_spec() == spec)
        })
    }

    fn summary(&self) -> serde_json::Value {
        let language = self.project.language();
        let blocks: Vec<serde_json::Value> = self
            .ids
            .iter()
            .filter_map(|id| self.project.definition(*id).ok())
            .map(|def| {
                json!({
                    "spec": def.spec(),
                    "label": def.localized_spec(language),
                    "type": def.kind.to_string(),
                    "category": def.category,
                    "global": def.is_global,
                    "inputs": def.input_names(),
                })
            })
            .collect();
        let stage: Vec<&str> = self.project.global_variables.names().collect();
        let sprite: Vec<&str> = self
            .project
            .receiver(ReceiverId::STAGE)
            .map(|stage| stage.variables.names().collect())
            .unwrap_or_default();
        json!({
            "name": self.name,
            "format": self.format,
            "checksum": self.checksum,
            "blocks": blocks,
            "global_variables": stage,
            "local_variables": sprite,
        })
    }

    /// Specs of the blocks `spec` depends on, or `None` for an unknown
    /// block.
    fn dependencies(&self, spec: &str) -> Result<Option<Vec<String>>, EditorError> {
        let Some(id) = self.find(spec) else {
            return Ok(None);
        };
        let def = self.project.definition(id)?;
        let mut excluding = Vec::new();
        let mut result = Vec::new();
        def.collect_dependencies(&mut excluding, &mut result, &self.project, Some(ReceiverId::STAGE))?;
        Ok(Some(
            result
                .into_iter()
                .filter_map(|dep| self.project.definition(dep).ok().map(|d| d.spec().to_string()))
                .collect(),
        ))
    }

    /// A library of the `keep` blocks and their dependencies. The inner
    /// error names the first unknown spec.
    fn pruned(&self, keep: &[String]) -> Result<Result<LibraryBundle, String>, EditorError> {
        let mut seeds = Vec::new();
        for spec in keep {
            match self.find(spec) {
                Some(id) => seeds.push(id),
                None => return Ok(Err(spec.clone())),
            }
        }
        let picker = ExportPicker::new(&self.project, &seeds, ReceiverId::STAGE)?;
        Ok(Ok(picker.export(&self.project, &self.name)?))
    }
}
