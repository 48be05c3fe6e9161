//! plantmask command line entry point.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use thiserror::Error;

use plantmask::config::{AppConfig, ConfigError};
use plantmask::store::SchemaGeneration;
use plantmask::{
    AnnotationStore, ClassIndexing, ConsoleRenderer, DatasetError, DatasetMaterializer,
    EventSource, KeyScript, LabelConverter, PlantId, RunReport, SessionController, SessionError,
    Severity, StoreError,
};

#[derive(Parser)]
#[command(name = "plantmask")]
#[command(about = "Plant polygon annotation and YOLO dataset builder", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Draw plant polygons on one image or a folder of images
    Annotate {
        /// Image file or folder of images
        reference_path: PathBuf,

        /// Annotation file to append to (created if missing)
        masks_json: PathBuf,

        /// Plants to outline on every image, in order
        #[arg(long, alias = "plant_ids", num_args = 1.., value_name = "ID")]
        plant_ids: Vec<String>,

        /// Read key/click events from this file instead of stdin
        #[arg(long, value_name = "FILE")]
        events: Option<PathBuf>,
    },

    /// Build a train/val YOLO dataset from an annotation file
    Dataset {
        /// Annotation file
        masks_json: PathBuf,

        /// Folder containing the annotated images
        images_root: PathBuf,

        /// Output root directory
        #[arg(long, alias = "out_root", value_name = "DIR")]
        out_root: Option<PathBuf>,

        /// Fraction of entries assigned to train
        #[arg(long, alias = "train_ratio", value_name = "R")]
        train_ratio: Option<f64>,
    },

    /// Write YOLO label files only
    Labels {
        /// Annotation file
        masks_json: PathBuf,

        /// Output directory for label files
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Look images up by file name in this folder
        #[arg(long, alias = "images_root", value_name = "DIR")]
        images_root: Option<PathBuf>,

        /// Class index convention
        #[arg(long, value_enum, default_value_t = ClassIndexArg::ZeroBased)]
        class_index: ClassIndexArg,
    },

    /// Write the effective configuration to the config file
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ClassIndexArg {
    /// `plant_id - 1`
    ZeroBased,
    /// `plant_id` as-is
    PlantId,
}

impl From<ClassIndexArg> for ClassIndexing {
    fn from(arg: ClassIndexArg) -> Self {
        match arg {
            ClassIndexArg::ZeroBased => ClassIndexing::ZeroBased,
            ClassIndexArg::PlantId => ClassIndexing::PlantId,
        }
    }
}

#[derive(Error, Debug)]
enum AppError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Cannot open event file {path:?}: {source}")]
    Events { path: PathBuf, source: io::Error },

    #[error("No plant ids given (use --plant-ids or set preferences.plant_ids)")]
    NoPlantIds,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No config directory found; pass --config")]
    NoConfigPath,

    #[error("{0:?} already exists (use --force to replace it)")]
    ConfigExists(PathBuf),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = config.preferences.log_level.raised(cli.verbose);
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(level.to_level_filter().to_string()),
    )
    .init();

    match run(cli.command, cli.config, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(
    command: Commands,
    config_path: Option<PathBuf>,
    config: &AppConfig,
) -> Result<(), AppError> {
    match command {
        Commands::Annotate {
            reference_path,
            masks_json,
            plant_ids,
            events,
        } => annotate(config, &reference_path, &masks_json, plant_ids, events),
        Commands::Dataset {
            masks_json,
            images_root,
            out_root,
            train_ratio,
        } => {
            let store = load_store(&masks_json)?;
            let materializer = DatasetMaterializer::new(
                images_root,
                out_root.unwrap_or_else(|| config.preferences.dataset_root.clone()),
                train_ratio.unwrap_or(config.preferences.train_ratio),
            )?;
            let report = materializer.materialize(&store)?;
            println!(
                "Dataset written to {}: {} train, {} val, {} labels",
                materializer.layout().root().display(),
                report.train_entries,
                report.val_entries,
                report.labels_written
            );
            print_problems(&report);
            Ok(())
        }
        Commands::Labels {
            masks_json,
            out,
            images_root,
            class_index,
        } => {
            let store = load_store(&masks_json)?;
            let mut converter =
                LabelConverter::new(out.unwrap_or_else(|| config.preferences.labels_dir.clone()))
                    .with_indexing(class_index.into());
            if let Some(root) = images_root {
                converter = converter.with_images_root(root);
            }
            let report = converter.convert(&store)?;
            println!(
                "Labels written to {}: {} files, {} lines",
                converter.out_dir().display(),
                report.entries_written,
                report.labels_written
            );
            print_problems(&report);
            Ok(())
        }
        Commands::InitConfig { force } => {
            let path = config_path
                .or_else(AppConfig::default_path)
                .ok_or(AppError::NoConfigPath)?;
            if path.exists() && !force {
                return Err(AppError::ConfigExists(path));
            }
            config.save(&path)?;
            println!("Configuration written to {}", path.display());
            Ok(())
        }
    }
}

fn annotate(
    config: &AppConfig,
    reference_path: &Path,
    masks_json: &Path,
    plant_ids: Vec<String>,
    events: Option<PathBuf>,
) -> Result<(), AppError> {
    let plant_ids = if plant_ids.is_empty() {
        config.preferences.plant_ids.clone()
    } else {
        plant_ids
    };
    if plant_ids.is_empty() {
        return Err(AppError::NoPlantIds);
    }
    let plant_ids: Vec<PlantId> = plant_ids.into_iter().map(PlantId::new).collect();

    let bindings = config.keybindings.clone();
    let mut source: Box<dyn EventSource> = match events {
        Some(path) => {
            let file = File::open(&path).map_err(|source| AppError::Events {
                path: path.clone(),
                source,
            })?;
            Box::new(KeyScript::new(BufReader::new(file), bindings.clone()))
        }
        None => Box::new(KeyScript::new(io::stdin().lock(), bindings.clone())),
    };
    let mut renderer = ConsoleRenderer::new(io::stdout().lock(), &bindings);

    let controller = SessionController::new(plant_ids);
    let summary = controller.run(
        reference_path,
        masks_json,
        &config.preferences.image_extensions,
        source.as_mut(),
        &mut renderer,
    )?;

    println!(
        "Saved {} new entries ({} polygons) to {}",
        summary.images_annotated,
        summary.polygons_added,
        masks_json.display()
    );
    if summary.terminated_early {
        println!(
            "Session ended early after {} images",
            summary.images_visited
        );
    }
    Ok(())
}

fn load_store(path: &Path) -> Result<AnnotationStore, StoreError> {
    let (store, generation) = AnnotationStore::load_with_generation(path)?;
    match generation {
        SchemaGeneration::Missing => log::warn!("Annotation file {:?} does not exist", path),
        SchemaGeneration::Legacy => log::info!("Read legacy single-image file {:?}", path),
        _ => {}
    }
    log::info!("Loaded {} entries from {:?}", store.len(), path);
    Ok(store)
}

fn print_problems(report: &RunReport) {
    let problems = report.problem_count();
    if problems == 0 {
        return;
    }
    println!("{} problems:", problems);
    for d in report.diagnostics.iter().filter(|d| d.severity != Severity::Info) {
        let level = if d.severity == Severity::Error {
            "error"
        } else {
            "warning"
        };
        match d.entry_index {
            Some(i) => println!("  {} (entry {}): {}", level, i, d.message),
            None => println!("  {}: {}", level, d.message),
        }
    }
}
