use crate::{
    BlendWeight, Error, MacroData, MacroKind, MacroModifier, MacroPart, MacroVariable, Modifier,
    ModifierDefinition, ModifierGroupDefinition, ModifierIndex, TargetBlend, TargetModifier,
    normalize_weights, target_label,
};
use indexmap::IndexMap;
use std::collections::HashMap;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-5,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn part(lowest: f32, highest: f32, low: &str, high: &str) -> MacroPart {
    MacroPart {
        lowest,
        highest,
        low: low.to_string(),
        high: high.to_string(),
    }
}

fn macro_data() -> MacroData {
    let mut variables = IndexMap::new();
    variables.insert(
        "gender".to_string(),
        MacroVariable {
            label: "Gender".to_string(),
            parts: vec![part(0.0, 1.0, "female", "male")],
        },
    );
    variables.insert(
        "age".to_string(),
        MacroVariable {
            label: "Age".to_string(),
            parts: vec![
                part(0.0, 0.1875, "baby", "child"),
                part(0.1875, 0.5, "child", "young"),
                part(0.5, 1.0, "young", "old"),
            ],
        },
    );
    let mut combinations = IndexMap::new();
    combinations.insert(
        "genderage".to_string(),
        vec!["Gender".to_string(), "Age".to_string()],
    );
    MacroData {
        variables,
        combinations,
    }
}

fn values(entries: &[(&str, f32)]) -> HashMap<String, f32> {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect()
}

fn definitions() -> Vec<ModifierGroupDefinition> {
    vec![
        ModifierGroupDefinition {
            group: "expression".to_string(),
            modifiers: vec![ModifierDefinition::Target {
                target: "smile".to_string(),
                min: None,
                max: None,
            }],
        },
        ModifierGroupDefinition {
            group: "head".to_string(),
            modifiers: vec![ModifierDefinition::Target {
                target: "head-age".to_string(),
                min: Some("decr".to_string()),
                max: Some("incr".to_string()),
            }],
        },
        ModifierGroupDefinition {
            group: "macrodetails-universal".to_string(),
            modifiers: vec![
                ModifierDefinition::Macro {
                    macrovar: "Gender".to_string(),
                    modifier_type: None,
                },
                ModifierDefinition::Macro {
                    macrovar: "African".to_string(),
                    modifier_type: Some("EthnicModifier".to_string()),
                },
            ],
        },
    ]
}

#[test]
fn macro_part_interpolates_inside_its_range() {
    let p = part(0.0, 0.5, "young", "old");

    let w = p.weights(0.25).unwrap();
    assert_approx(w.weight_low, 0.5);
    assert_approx(w.weight_high, 0.5);
    assert_eq!(w.dominant().0, "old");

    let w = p.weights(0.0).unwrap();
    assert_approx(w.weight_high, 0.0);
    assert_approx(w.weight_low, 1.0);
    assert_eq!(w.dominant(), ("young", 1.0));

    assert!(p.weights(0.75).is_none());
    assert!(part(0.5, 0.5, "a", "b").weights(0.5).is_none());
}

#[test]
fn macro_variable_uses_the_first_matching_part() {
    let data = macro_data();
    let age = data.variable("AGE").unwrap();
    assert_approx(age.center().unwrap(), 0.5);

    // 0.5 sits on the boundary of two parts; the first one wins.
    let w = age.evaluate(0.5).unwrap();
    assert_eq!((w.low.as_str(), w.high.as_str()), ("child", "young"));
    assert_approx(w.weight_high, 1.0);

    assert!(age.evaluate(1.5).is_none());
}

#[test]
fn single_target_modifier_clamps() {
    let smile = TargetModifier::single("Expression", "smile", 0.0, 1.0);
    assert_eq!(
        smile.evaluate(1.5),
        vec![BlendWeight {
            blend: "smile".to_string(),
            weight: 1.0
        }]
    );
    assert_eq!(smile.evaluate(-1.0)[0].weight, 0.0);
    assert_approx(smile.evaluate(0.3)[0].weight, 0.3);
}

#[test]
fn single_target_modifier_accepts_inverted_bounds() {
    let m = TargetModifier::single("Torso", "belly", 1.0, -0.5);
    assert_eq!((m.min_val, m.max_val), (-0.5, 1.0));
    assert_approx(m.evaluate(2.0)[0].weight, 1.0);
    assert_approx(m.evaluate(-2.0)[0].weight, -0.5);

    // Bounds written directly in the wrong order still clamp.
    let m = TargetModifier {
        min_val: 1.0,
        max_val: 0.0,
        ..TargetModifier::single("Torso", "belly", 0.0, 1.0)
    };
    assert_approx(m.evaluate(3.0)[0].weight, 1.0);
    assert_approx(m.evaluate(-3.0)[0].weight, 0.0);
}

#[test]
fn paired_target_modifier_drives_one_side() {
    let m = TargetModifier::from_definition("Head", "head-age", Some("decr"), Some("incr"));
    assert_eq!(
        m.blend,
        TargetBlend::Pair {
            min: "head_age_decr".to_string(),
            max: "head_age_incr".to_string(),
        }
    );
    assert_eq!((m.min_val, m.max_val), (-1.0, 1.0));
    assert_eq!(m.blend_names(), ["head_age_decr", "head_age_incr"]);
    assert_eq!(m.label, "Age");

    let w = m.evaluate(0.5);
    assert_approx(w[0].weight, 0.0);
    assert_approx(w[1].weight, 0.5);

    let w = m.evaluate(-2.0);
    assert_approx(w[0].weight, 1.0);
    assert_approx(w[1].weight, 0.0);
}

#[test]
fn target_labels_drop_group_and_direction_suffix() {
    assert_eq!(target_label("Head", "head-age-decr|incr"), "Age");
    assert_eq!(target_label("Expression", "smile"), "Smile");
    assert_eq!(target_label("Torso", "torso-scale-depth"), "Scale Depth");
    assert_eq!(target_label("Armslegs", "r-hand-fingers"), "R Hand Fingers");
}

#[test]
fn macro_modifier_requires_macro_data() {
    let err = MacroModifier::new("Macrodetails", "Gender", None, None).unwrap_err();
    assert!(
        matches!(&err, Error::MacrodataNotLoaded { macrovar } if macrovar == "Gender"),
        "{err}"
    );

    let err = ModifierIndex::new(&definitions(), None).unwrap_err();
    assert!(matches!(err, Error::MacrodataNotLoaded { .. }), "{err}");

    let data = macro_data();
    let err = MacroModifier::new("Macrodetails", "Height", None, Some(&data)).unwrap_err();
    assert!(matches!(err, Error::UnknownMacrovar { .. }), "{err}");
}

#[test]
fn macro_modifier_splits_group_and_prefix() {
    let data = macro_data();
    let m = MacroModifier::new("Macrodetails-universal", "Gender", None, Some(&data)).unwrap();
    assert_eq!(m.group, "Macrodetails");
    assert_eq!(m.targets_prefix, "universal");
    assert_eq!(m.variable, "gender");
    assert_eq!(m.label, "Gender");
    assert_eq!(m.center(), Some(0.5));

    let w = m.evaluate(0.25);
    assert_eq!(w[0].blend, "female");
    assert_approx(w[0].weight, 0.75);
    assert_eq!(w[1].blend, "male");
    assert_approx(w[1].weight, 0.25);

    let ethnic =
        MacroModifier::new("Macrodetails", "African", Some("EthnicModifier"), Some(&data)).unwrap();
    assert_eq!(ethnic.kind, MacroKind::Ethnic);
    assert!(ethnic.evaluate(0.5).is_empty());
    assert_eq!(ethnic.center(), None);
}

#[test]
fn combinations_take_dominant_labels_and_product_weights() {
    let data = macro_data();
    let weights = data.weights_for_values(&values(&[("Gender", 0.0), ("age", 0.75)]));
    assert_eq!(weights.len(), 2);

    let combined = data.compose_combinations(&weights);
    assert_eq!(combined.len(), 1);
    assert_approx(combined["female_old"], 0.5);

    let mut data = data;
    data.combinations.insert(
        "gendermuscle".to_string(),
        vec!["gender".to_string(), "muscle".to_string()],
    );
    let mut combined = data.compose_combinations(&weights);
    assert_approx(combined["female_unknown"], 1.0);

    normalize_weights(&mut combined);
    assert_approx(combined["female_old"], 1.0 / 3.0);
    assert_approx(combined["female_unknown"], 2.0 / 3.0);
}

#[test]
fn normalize_leaves_zero_sums_alone() {
    let mut weights = IndexMap::new();
    weights.insert("a".to_string(), 0.0);
    weights.insert("b".to_string(), 0.0);
    normalize_weights(&mut weights);
    assert_eq!(weights["a"], 0.0);
    assert_eq!(weights["b"], 0.0);
}

#[test]
fn modifier_index_groups_and_looks_up_modifiers() {
    let index = ModifierIndex::new(&definitions(), Some(macro_data())).unwrap();
    assert_eq!(index.len(), 4);
    assert!(index.macro_data().is_some());

    let groups: Vec<&str> = index.groups.keys().map(String::as_str).collect();
    assert_eq!(groups, ["Expression", "Head", "Macrodetails"]);

    let smile = index.get("expression/smile").unwrap();
    assert!(matches!(smile, Modifier::Target(_)));
    assert_eq!(smile.group(), "Expression");
    assert_eq!(smile.range(), (0.0, 1.0));
    assert_eq!(smile.default_value(), 0.0);

    let gender = index.get("macrodetails-universal/Gender").unwrap();
    assert_eq!(gender.label(), "Gender");
    assert_eq!(gender.default_value(), 0.5);

    let names: Vec<&str> = index.iter().map(|(name, _)| name).collect();
    assert_eq!(
        names,
        [
            "expression/smile",
            "head/head-age",
            "macrodetails-universal/Gender",
            "macrodetails-universal/African",
        ]
    );

    let err = index.evaluate("expression/frown", 1.0).unwrap_err();
    assert!(matches!(err, Error::UnknownModifier { .. }), "{err}");
}

#[test]
fn evaluate_all_merges_target_and_macro_weights() {
    let index = ModifierIndex::new(&definitions(), Some(macro_data())).unwrap();
    let weights = index
        .evaluate_all(&values(&[
            ("expression/smile", 0.5),
            ("head/head-age", -0.5),
            ("macrodetails-universal/Gender", 1.0),
        ]))
        .unwrap();

    assert_approx(weights["smile"], 0.5);
    assert_approx(weights["head_age_decr"], 0.5);
    assert_approx(weights["head_age_incr"], 0.0);
    // Age is absent and sits at its center, 0.5, which lands on child/young.
    assert_approx(weights["male_young"], 1.0);
    assert_eq!(weights.len(), 4);
}

#[test]
fn evaluate_all_without_combinations_uses_part_weights() {
    let mut data = macro_data();
    data.combinations.clear();
    let index = ModifierIndex::new(&definitions(), Some(data)).unwrap();

    let weights = index
        .evaluate_all(&values(&[("macrodetails-universal/Gender", 0.25)]))
        .unwrap();
    assert_approx(weights["female"], 0.75);
    assert_approx(weights["male"], 0.25);

    // Unset macro values sit at the center of their range.
    let weights = index.evaluate_all(&HashMap::new()).unwrap();
    assert_approx(weights["female"], 0.5);
    assert_approx(weights["male"], 0.5);
    assert!(!weights.contains_key("african"));
}

#[test]
fn modifier_index_without_macros_needs_no_macro_data() {
    let definitions: Vec<ModifierGroupDefinition> = definitions().into_iter().take(2).collect();
    let index = ModifierIndex::new(&definitions, None).unwrap();
    let weights = index.evaluate_all(&HashMap::new()).unwrap();
    assert_eq!(weights.len(), 3);
    assert!(weights.values().all(|w| *w == 0.0));

    let err = index
        .macro_combination_weights(&values(&[("gender", 0.5)]))
        .unwrap_err();
    assert!(matches!(err, Error::MacrodataNotLoaded { .. }), "{err}");
}
