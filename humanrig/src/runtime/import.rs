use super::separate::{SeparationReport, SkeltargetSeparator};
use crate::{
    BlendShapeLibrary, Error, ImportReport, MacroData, Mesh, ModifierGroupDefinition,
    ModifierIndex, Rig, RigDescription, SkinBinding, TargetImporter,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default macro data file, looked up next to the modifiers file.
pub const MACRO_FILE_NAME: &str = "macro.json";

/// Where the import pipeline finds its inputs, relative to the data directory, and which
/// optional passes it runs.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub base_mesh: PathBuf,
    pub rig: PathBuf,
    pub targets: PathBuf,
    pub modifiers: Option<PathBuf>,
    /// Macro data file. When unset, `macro.json` next to the modifiers file is used if present.
    pub macros: Option<PathBuf>,
    pub separate_skeltargets: bool,
    pub sort_influences: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            base_mesh: PathBuf::from("3dobjs/base.obj"),
            rig: PathBuf::from("rigs/default.mhskel"),
            targets: PathBuf::from("targets"),
            modifiers: None,
            macros: None,
            separate_skeltargets: true,
            sort_influences: false,
        }
    }
}

/// Everything the pipeline produced.
#[derive(Debug)]
pub struct ImportedHuman {
    pub mesh: Mesh,
    pub rig: Rig,
    pub binding: SkinBinding,
    pub library: BlendShapeLibrary,
    pub modifiers: ModifierIndex,
    pub import_report: ImportReport,
    /// `None` when separation was disabled.
    pub separation_report: Option<SeparationReport>,
}

impl ImportedHuman {
    /// Number of recovered problems across all passes.
    pub fn diagnostic_count(&self) -> usize {
        self.import_report.diagnostics.len()
            + self
                .separation_report
                .as_ref()
                .map_or(0, |r| r.failures.len())
    }
}

pub struct HumanImport;

impl HumanImport {
    /// Runs the whole import against `data_dir`: mesh, rig, skin weights, targets, optional
    /// skeltarget separation, then modifiers.
    ///
    /// Missing or malformed mesh, rig and modifier inputs abort the run; per-target problems
    /// are collected in the reports.
    pub fn run(data_dir: impl AsRef<Path>, config: &ImportConfig) -> Result<ImportedHuman, Error> {
        let data_dir = data_dir.as_ref();

        let mesh = Mesh::load_obj(data_dir.join(&config.base_mesh))?;
        log::info!(
            "loaded base mesh: {} vertices, {} sub-meshes",
            mesh.vertex_count(),
            mesh.sub_meshes.len()
        );

        let (description, weights) = RigDescription::load_with_weights(data_dir.join(&config.rig))?;
        let rig = Rig::build(&description, &mesh.vertices)?;
        log::info!("built rig with {} joints", rig.len());

        let mut binding = SkinBinding::resolve(&rig.order, &weights, mesh.vertex_count());
        if config.sort_influences {
            binding.sort_influences();
        }

        let mut library = BlendShapeLibrary::new();
        let import_report =
            TargetImporter::new(&mesh).import_dir(&mut library, data_dir.join(&config.targets))?;
        log::info!(
            "imported {} blend shapes ({} skipped)",
            import_report.imported.len(),
            import_report.diagnostics.len()
        );

        let separation_report = if config.separate_skeltargets {
            let separator = SkeltargetSeparator::new(&mesh.vertices, &rig, &binding)?;
            let report = separator.separate_all(&mut library);
            log::info!(
                "separated {} blend shapes ({} failed)",
                report.separated.len(),
                report.failures.len()
            );
            Some(report)
        } else {
            None
        };

        let modifiers = load_modifiers(data_dir, config)?;

        Ok(ImportedHuman {
            mesh,
            rig,
            binding,
            library,
            modifiers,
            import_report,
            separation_report,
        })
    }
}

fn load_modifiers(data_dir: &Path, config: &ImportConfig) -> Result<ModifierIndex, Error> {
    let Some(modifiers) = config.modifiers.as_ref() else {
        return Ok(ModifierIndex::default());
    };
    let modifiers = data_dir.join(modifiers);
    let definitions = ModifierGroupDefinition::load_list(&modifiers)?;

    let macro_path = match &config.macros {
        Some(path) => Some(data_dir.join(path)),
        None => modifiers
            .parent()
            .map(|dir| dir.join(MACRO_FILE_NAME))
            .filter(|path| path.is_file()),
    };
    let macro_data = macro_path.map(MacroData::load).transpose()?;

    let index = ModifierIndex::new(&definitions, macro_data)?;
    log::info!("loaded {} modifiers", index.len());
    Ok(index)
}
