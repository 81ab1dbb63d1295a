use anyhow::{Context, Result};
use clap::Args;
use humanrig::{MacroData, ModifierGroupDefinition, ModifierIndex};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::PathBuf;

/// Arguments for the weights command
#[derive(Args)]
pub struct WeightsArgs {
    /// Modifier definition file
    #[arg(short, long)]
    pub modifiers: PathBuf,

    /// Macro data file, required when the modifiers use macro variables
    #[arg(long)]
    pub macros: Option<PathBuf>,

    /// Modifier values as `group/name=value`
    #[arg(value_parser = parse_assignment)]
    pub values: Vec<(String, f32)>,
}

/// Execute the weights command
pub fn execute(args: WeightsArgs) -> Result<()> {
    let weights = evaluate(&args)?;
    let json = serde_json::to_string_pretty(&weights).context("Failed to serialize weights")?;
    println!("{json}");
    Ok(())
}

fn evaluate(args: &WeightsArgs) -> Result<IndexMap<String, f32>> {
    let definitions = ModifierGroupDefinition::load_list(&args.modifiers)
        .with_context(|| format!("Failed to load modifiers: {}", args.modifiers.display()))?;
    let macro_data = args
        .macros
        .as_ref()
        .map(|path| {
            MacroData::load(path)
                .with_context(|| format!("Failed to load macro data: {}", path.display()))
        })
        .transpose()?;
    let index = ModifierIndex::new(&definitions, macro_data)?;

    let values: HashMap<String, f32> = args.values.iter().cloned().collect();
    for name in values.keys() {
        if index.get(name).is_none() {
            log::warn!("ignoring value for unknown modifier '{name}'");
        }
    }
    Ok(index.evaluate_all(&values)?)
}

fn parse_assignment(s: &str) -> Result<(String, f32), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let value = value
        .trim()
        .parse::<f32>()
        .map_err(|e| format!("invalid value for '{name}': {e}"))?;
    Ok((name.trim().to_string(), value))
}
