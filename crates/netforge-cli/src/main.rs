//! netforge command-line tools.
//!
//! Provides the `netforge` binary. `compile` and `check` read an architecture
//! either from a project in a SQLite database or from a graph JSON file
//! (`{ "nodes": [...], "edges": [...] }`); `blocks` lists the registry.
//!
//! Graphs are reconciled on load, the same way the server reconciles a
//! project when it is opened, and compiled with the same
//! `netforge_compiler::compile_graph()` the `/compile` endpoint uses.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};

use netforge_check::{reconcile_in_place, validate_graph};
use netforge_compiler::{compile_graph, CompileError, CompileOptions};
use netforge_core::{block, ArchitectureGraph, ShapeConfig, TrainingConfig};
use netforge_storage::{ProjectId, ProjectStore, SqliteStore};

const EXIT_OK: i32 = 0;
const EXIT_COMPILE: i32 = 1;
const EXIT_SHAPE: i32 = 2;
const EXIT_IO: i32 = 3;

/// Neural network architecture compiler and tools.
#[derive(Parser)]
#[command(name = "netforge", about = "Neural network architecture compiler and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an architecture to a model description.
    Compile {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        shape: ShapeArgs,

        /// Fail with exit code 2 when the graph has shape violations.
        #[arg(long)]
        strict: bool,
    },
    /// Report shape violations without compiling.
    Check {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        shape: ShapeArgs,
    },
    /// List the block registry.
    Blocks,
}

/// Where the graph comes from: `--db` with `--project`, or `--file`.
#[derive(Args)]
struct SourceArgs {
    /// Path to the project database file.
    #[arg(short, long, requires = "project", conflicts_with = "file")]
    db: Option<String>,

    /// Project ID to load from the database.
    #[arg(short, long)]
    project: Option<i64>,

    /// Graph JSON file.
    #[arg(short, long, required_unless_present = "db")]
    file: Option<PathBuf>,
}

#[derive(Args)]
struct ShapeArgs {
    /// Height and width of the input images.
    #[arg(long, default_value_t = ShapeConfig::default().initial_spatial_size)]
    spatial_size: u32,

    /// Channels of the input images.
    #[arg(long, default_value_t = ShapeConfig::default().input_channels)]
    channels: u32,

    /// Class count used when no Classifier block names the classes.
    #[arg(long, default_value_t = ShapeConfig::default().output_classes)]
    classes: u32,
}

impl ShapeArgs {
    fn config(&self) -> ShapeConfig {
        ShapeConfig {
            initial_spatial_size: self.spatial_size,
            input_channels: self.channels,
            output_classes: self.classes,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Compile {
            source,
            shape,
            strict,
        } => run_compile(&source, &shape.config(), strict),
        Commands::Check { source, shape } => run_check(&source, &shape.config()),
        Commands::Blocks => run_blocks(),
    };
    process::exit(exit_code);
}

/// A graph ready for compilation plus the project's training settings.
struct Loaded {
    graph: ArchitectureGraph,
    training: TrainingConfig,
}

/// Loads and reconciles the graph named by `source`.
///
/// Errors are already reported on stderr; the value is the exit code.
fn load(source: &SourceArgs, shape: &ShapeConfig) -> Result<Loaded, i32> {
    let mut loaded = match (&source.db, source.project, &source.file) {
        (Some(db), Some(project), _) => load_from_db(db, project)?,
        (_, _, Some(file)) => load_from_file(file)?,
        _ => {
            eprintln!("Error: give either --db and --project, or --file");
            return Err(EXIT_IO);
        }
    };

    for adjustment in reconcile_in_place(&mut loaded.graph, shape) {
        eprintln!(
            "note: {}.{} reconciled {} -> {}",
            adjustment.node, adjustment.param, adjustment.old, adjustment.new
        );
    }
    Ok(loaded)
}

fn load_from_db(db_path: &str, project: i64) -> Result<Loaded, i32> {
    let store = SqliteStore::new(db_path).map_err(|e| {
        eprintln!("Error: failed to open database '{}': {}", db_path, e);
        EXIT_IO
    })?;
    let project = store.load_project(ProjectId(project)).map_err(|e| {
        eprintln!("Error: failed to load project {}: {}", project, e);
        EXIT_IO
    })?;
    Ok(Loaded {
        graph: project.graph,
        training: project.training,
    })
}

fn load_from_file(path: &Path) -> Result<Loaded, i32> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: failed to read '{}': {}", path.display(), e);
        EXIT_IO
    })?;
    let graph: ArchitectureGraph = serde_json::from_str(&text).map_err(|e| {
        eprintln!("Error: '{}' is not a valid graph: {}", path.display(), e);
        EXIT_IO
    })?;
    Ok(Loaded {
        graph,
        training: TrainingConfig::default(),
    })
}

/// Execute the compile subcommand.
///
/// Returns exit code: 0 = success, 1 = compilation error,
/// 2 = shape violations under `--strict`, 3 = I/O or storage error.
fn run_compile(source: &SourceArgs, shape: &ShapeConfig, strict: bool) -> i32 {
    let loaded = match load(source, shape) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    compile_loaded(&loaded, shape, strict)
}

fn compile_loaded(loaded: &Loaded, shape: &ShapeConfig, strict: bool) -> i32 {
    let options = CompileOptions {
        shape: *shape,
        check_shapes: true,
    };
    let compilation = match compile_graph(&loaded.graph, &loaded.training, &options) {
        Ok(compilation) => compilation,
        Err(CompileError::AmbiguousStart { candidates }) => {
            let names: Vec<String> = candidates.iter().map(|c| c.to_string()).collect();
            eprintln!(
                "Compilation error: expected exactly one start block, found {} [{}]",
                candidates.len(),
                names.join(", ")
            );
            return EXIT_COMPILE;
        }
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            return EXIT_COMPILE;
        }
    };

    for skipped in &compilation.skipped {
        eprintln!("warning: skipped block {} of unknown kind '{}'", skipped.id, skipped.kind);
    }
    for node in &compilation.unreachable {
        eprintln!("warning: layer {} is not reachable from the start block", node);
    }
    for violation in &compilation.warnings {
        eprintln!("warning: {}", violation);
    }
    if strict && !compilation.warnings.is_empty() {
        eprintln!("Shape check failed with {} violation(s)", compilation.warnings.len());
        return EXIT_SHAPE;
    }

    // Machine-readable output on stdout.
    match serde_json::to_string_pretty(&compilation.model) {
        Ok(json) => {
            println!("{}", json);
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Error: failed to serialize model: {}", e);
            EXIT_IO
        }
    }
}

/// Execute the check subcommand. Exit code 2 when violations are found.
fn run_check(source: &SourceArgs, shape: &ShapeConfig) -> i32 {
    match load(source, shape) {
        Ok(loaded) => check_loaded(&loaded, shape),
        Err(code) => code,
    }
}

fn check_loaded(loaded: &Loaded, shape: &ShapeConfig) -> i32 {
    let violations = validate_graph(&loaded.graph, shape);
    if violations.is_empty() {
        println!("ok: {} block(s), no shape violations", loaded.graph.node_count());
        return EXIT_OK;
    }
    for violation in &violations {
        println!("{}", violation);
    }
    eprintln!("Shape check failed with {} violation(s)", violations.len());
    EXIT_SHAPE
}

fn run_blocks() -> i32 {
    for spec in block::all_specs() {
        let family = match spec.family {
            Some(family) => format!("{:?}", family).to_lowercase(),
            None => "-".to_string(),
        };
        let params: Vec<String> = spec
            .params
            .iter()
            .map(|p| {
                if p.editable {
                    p.name.to_string()
                } else {
                    format!("{} (derived)", p.name)
                }
            })
            .collect();
        println!(
            "{:<20} {:<10} {:<8} {}",
            spec.kind.as_str(),
            family,
            if spec.is_layer { "layer" } else { "meta" },
            params.join(", ")
        );
    }
    EXIT_OK
}
