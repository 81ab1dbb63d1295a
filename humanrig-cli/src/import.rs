use anyhow::{Context, Result};
use clap::Args;
use humanrig::{BlendShape, HumanImport, ImportConfig, ImportedHuman};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Arguments for the import command
#[derive(Args)]
pub struct ImportArgs {
    /// Data directory holding the base mesh, rig and targets
    pub data_dir: PathBuf,

    /// TOML file with import settings (paths relative to the data directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output directory for the JSON records
    #[arg(short, long, default_value = "humanrig-out")]
    pub out: PathBuf,

    /// Modifier definition file (overrides the config file)
    #[arg(long)]
    pub modifiers: Option<PathBuf>,

    /// Macro data file (overrides the config file)
    #[arg(long)]
    pub macros: Option<PathBuf>,

    /// Skip skeltarget separation
    #[arg(long)]
    pub no_separate: bool,

    /// Order each vertex's skin influences by descending weight
    #[arg(long)]
    pub sort_influences: bool,
}

/// `blendshapes.json`: every shape and the per-sub-mesh binding lists.
#[derive(Serialize)]
struct BlendShapeRecords<'a> {
    shapes: Vec<&'a BlendShape>,
    mesh_bindings: &'a IndexMap<String, Vec<String>>,
}

/// Execute the import command
pub fn execute(args: ImportArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    log::debug!("import config: {config:?}");

    let human = HumanImport::run(&args.data_dir, &config)
        .with_context(|| format!("Failed to import {}", args.data_dir.display()))?;

    write_records(&human, &args.out)?;
    print_summary(&human, &args.out);
    Ok(())
}

fn resolve_config(args: &ImportArgs) -> Result<ImportConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ImportConfig::default(),
    };
    if let Some(modifiers) = &args.modifiers {
        config.modifiers = Some(modifiers.clone());
    }
    if let Some(macros) = &args.macros {
        config.macros = Some(macros.clone());
    }
    if args.no_separate {
        config.separate_skeltargets = false;
    }
    if args.sort_influences {
        config.sort_influences = true;
    }
    Ok(config)
}

fn load_config(path: &Path) -> Result<ImportConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}

fn write_records(human: &ImportedHuman, out: &Path) -> Result<()> {
    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create output directory: {}", out.display()))?;

    write_json(&out.join("rig.json"), &human.rig)?;
    write_json(&out.join("skin.json"), &human.binding)?;
    write_json(
        &out.join("blendshapes.json"),
        &BlendShapeRecords {
            shapes: human.library.shapes.values().collect(),
            mesh_bindings: &human.library.mesh_bindings,
        },
    )?;
    write_json(&out.join("modifiers.json"), &human.modifiers)?;

    if !human.library.skel_targets.is_empty() {
        let dir = out.join("skeltargets");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        for (name, skel_target) in &human.library.skel_targets {
            let path = dir.join(format!("{name}.skeltarget"));
            let json = skel_target.to_json_string(&human.rig)?;
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_summary(human: &ImportedHuman, out: &Path) {
    println!(
        "Imported {} joints, {} blend shapes, {} modifiers",
        human.rig.len(),
        human.library.len(),
        human.modifiers.len()
    );
    if let Some(report) = &human.separation_report {
        println!(
            "  Separated: {} ({} failed)",
            report.separated.len(),
            report.failures.len()
        );
        for (name, error) in &report.failures {
            println!("    {name}: {error}");
        }
    }
    if !human.import_report.diagnostics.is_empty() {
        println!("  Skipped targets: {}", human.import_report.diagnostics.len());
        for error in &human.import_report.diagnostics {
            println!("    {error}");
        }
    }
    println!("  Output: {}", out.display());
}
