use crate::{Error, HumanImport, ImportConfig, Modifier};
use glam::Vec3;
use std::path::{Path, PathBuf};

const BASE_OBJ: &str = r#"
v 0 0 0
v 0 0 0
v 0 1 0
v 0 1 0
v 1 0 0
v 1 1 0
v 0 0.5 1
g body
f 5 6 7
g helper-joints
f 1 2 3 4
"#;

const RIG: &str = r#"
{
  "bones": {
    "root": { "parent": null, "head": "root____head", "tail": "neck____head" },
    "neck": { "parent": "root", "head": "neck____head", "tail": "neck____tail" }
  },
  "joints": {
    "root____head": [0, 1],
    "neck____head": [2, 3],
    "neck____tail": [5]
  },
  "weights_file": "default_weights.mhw"
}
"#;

const WEIGHTS: &str = r#"
{
  "weights": {
    "root": [[0, 1], [1, 1], [4, 1], [6, 1]],
    "neck": [[2, 1], [3, 1], [5, 1]]
  }
}
"#;

const MODIFIERS: &str = r#"
[
  { "group": "neck", "modifiers": [ { "target": "neck-long" } ] },
  { "group": "macrodetails", "modifiers": [ { "macrovar": "Gender" } ] }
]
"#;

const MACROS: &str = r#"
{
  "macrotargets": {
    "gender": {
      "label": "Gender",
      "parts": [ { "lowest": 0, "highest": 1, "low": "female", "high": "male" } ]
    }
  }
}
"#;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

fn data_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "3dobjs/base.obj", BASE_OBJ);
    write(root, "rigs/default.mhskel", RIG);
    write(root, "rigs/default_weights.mhw", WEIGHTS);
    write(root, "targets/neck/long.target", "2 0 0.5 0\n3 0 0.5 0\n5 0.1 0.5 0\n");
    write(root, "targets/belly.target", "4 0.5 0 0\n");
    write(root, "targets/far.target", "50 1 0 0\n");
    write(root, "modifiers/modeling_modifiers.json", MODIFIERS);
    write(root, "modifiers/macro.json", MACROS);
    dir
}

fn config() -> ImportConfig {
    ImportConfig {
        modifiers: Some(PathBuf::from("modifiers/modeling_modifiers.json")),
        ..ImportConfig::default()
    }
}

#[test]
fn full_import_separates_and_loads_modifiers() {
    let dir = data_dir();
    let human = HumanImport::run(dir.path(), &config()).unwrap();

    assert_eq!(human.mesh.vertex_count(), 7);
    assert_eq!(human.rig.order.names(), ["root", "neck"]);
    assert_eq!(human.binding.order, human.rig.order);

    assert_eq!(human.import_report.imported, vec!["belly", "long"]);
    assert_eq!(human.import_report.diagnostics.len(), 1);
    assert!(matches!(
        human.import_report.diagnostics[0],
        Error::UnboundTarget { .. }
    ));
    assert_eq!(human.library.bound_to("body"), ["belly", "long"]);
    assert_eq!(human.library.bound_to("helper_joints"), ["long"]);

    let separation = human.separation_report.as_ref().unwrap();
    assert_eq!(separation.separated, vec!["belly", "long"]);
    assert!(separation.failures.is_empty());
    assert_eq!(human.diagnostic_count(), 1);

    let long = human.library.get("long").unwrap();
    assert_eq!(long.group, "neck");
    assert!(long.offsets[0].abs_diff_eq(Vec3::ZERO, 1.0e-5));
    assert!(long.offsets[2].abs_diff_eq(Vec3::new(0.1, 0.0, 0.0), 1.0e-5));
    let skel = human.library.skel_target("long").unwrap();
    assert!(skel.joint_offsets(&human.rig)[1].abs_diff_eq(Vec3::new(0.0, 0.5, 0.0), 1.0e-5));

    let belly = human.library.get("belly").unwrap();
    assert!(belly.offsets[0].abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1.0e-5));

    assert_eq!(human.modifiers.len(), 2);
    assert!(human.modifiers.macro_data().is_some());
    assert!(matches!(
        human.modifiers.get("macrodetails/Gender"),
        Some(Modifier::Macro(_))
    ));
}

#[test]
fn separation_and_modifiers_are_optional() {
    let dir = data_dir();
    let config = ImportConfig {
        separate_skeltargets: false,
        sort_influences: true,
        ..ImportConfig::default()
    };
    let human = HumanImport::run(dir.path(), &config).unwrap();

    assert!(human.separation_report.is_none());
    assert!(human.library.skel_targets.is_empty());
    let long = human.library.get("long").unwrap();
    assert_eq!(long.offsets[0], Vec3::new(0.0, 0.5, 0.0));
    assert!(human.modifiers.is_empty());
}

#[test]
fn missing_inputs_abort_the_import() {
    let dir = data_dir();
    std::fs::remove_file(dir.path().join("rigs/default_weights.mhw")).unwrap();
    let err = HumanImport::run(dir.path(), &config()).unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "{err}");

    let config = ImportConfig {
        base_mesh: PathBuf::from("3dobjs/missing.obj"),
        ..ImportConfig::default()
    };
    let err = HumanImport::run(dir.path(), &config).unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "{err}");
}

#[test]
fn default_config_points_at_the_standard_layout() {
    let config = ImportConfig::default();
    assert_eq!(config.base_mesh, Path::new("3dobjs/base.obj"));
    assert_eq!(config.rig, Path::new("rigs/default.mhskel"));
    assert_eq!(config.targets, Path::new("targets"));
    assert!(config.separate_skeltargets);
    assert!(!config.sort_influences);
}
