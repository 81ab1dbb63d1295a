//! User-facing parameters mapped onto blend-shape weights.
//!
//! A [`Modifier`] is either a [`TargetModifier`] driving one blend shape (or a pair for a
//! two-sided range) or a [`MacroModifier`] interpolating across the labeled parts of a macro
//! variable. Macro variables come from a [`MacroData`] table that must be handed to
//! [`ModifierIndex::new`] explicitly.

use crate::Error;
use crate::ident::make_valid_identifier;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;

/// Label used in a composite name for a macro variable that produced no weights.
pub const UNKNOWN_LABEL: &str = "unknown";

pub const ETHNIC_MODIFIER_TYPE: &str = "EthnicModifier";

/// One group of modifier definitions, as read from a modifier file.
#[derive(Clone, Debug, PartialEq)]
pub struct ModifierGroupDefinition {
    pub group: String,
    pub modifiers: Vec<ModifierDefinition>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ModifierDefinition {
    Target {
        target: String,
        min: Option<String>,
        max: Option<String>,
    },
    Macro {
        macrovar: String,
        modifier_type: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MacroPart {
    pub lowest: f32,
    pub highest: f32,
    pub low: String,
    pub high: String,
}

impl MacroPart {
    /// Interpolation weights if `value` lies in `[lowest, highest]`.
    ///
    /// Degenerate parts (`lowest == highest`) never match.
    pub fn weights(&self, value: f32) -> Option<PartWeights> {
        if !(self.lowest <= value && value <= self.highest) {
            return None;
        }
        let span = self.highest - self.lowest;
        if span == 0.0 {
            return None;
        }
        let weight_high = (value - self.lowest) / span;
        Some(PartWeights {
            low: self.low.clone(),
            high: self.high.clone(),
            weight_low: 1.0 - weight_high,
            weight_high,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PartWeights {
    pub low: String,
    pub high: String,
    pub weight_low: f32,
    pub weight_high: f32,
}

impl PartWeights {
    /// The label with the larger weight; ties go to the high label.
    pub fn dominant(&self) -> (&str, f32) {
        if self.weight_low > self.weight_high {
            (&self.low, self.weight_low)
        } else {
            (&self.high, self.weight_high)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MacroVariable {
    pub label: String,
    pub parts: Vec<MacroPart>,
}

impl MacroVariable {
    pub fn center(&self) -> Option<f32> {
        center_of_range(&self.parts)
    }

    /// Weights from the first part containing `value`.
    pub fn evaluate(&self, value: f32) -> Option<PartWeights> {
        self.parts.iter().find_map(|part| part.weights(value))
    }
}

pub fn center_of_range(parts: &[MacroPart]) -> Option<f32> {
    let min = parts.iter().map(|p| p.lowest).reduce(f32::min)?;
    let max = parts.iter().map(|p| p.highest).reduce(f32::max)?;
    Some((min + max) / 2.0)
}

/// Macro variable table and the combinations of variables that name composite blend shapes.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MacroData {
    /// Keyed by lowercase variable name.
    pub variables: IndexMap<String, MacroVariable>,
    /// Combination name -> macro variables whose labels form the composite name.
    pub combinations: IndexMap<String, Vec<String>>,
}

impl MacroData {
    pub fn variable(&self, name: &str) -> Option<&MacroVariable> {
        self.variables.get(&name.to_lowercase())
    }

    /// Evaluates every variable at its value in `values`, or at the center of its range when
    /// absent. Variables whose value falls outside every part are left out.
    pub fn weights_for_values(
        &self,
        values: &HashMap<String, f32>,
    ) -> IndexMap<String, PartWeights> {
        let values: HashMap<String, f32> = values
            .iter()
            .map(|(k, v)| (k.to_lowercase(), *v))
            .collect();
        self.variables
            .iter()
            .filter_map(|(name, variable)| {
                let value = values.get(name).copied().or_else(|| variable.center())?;
                variable.evaluate(value).map(|w| (name.clone(), w))
            })
            .collect()
    }

    /// Composite blend-shape name and product weight for every combination.
    pub fn compose_combinations(
        &self,
        weights: &IndexMap<String, PartWeights>,
    ) -> IndexMap<String, f32> {
        let mut out = IndexMap::with_capacity(self.combinations.len());
        for variables in self.combinations.values() {
            let mut labels = Vec::with_capacity(variables.len());
            let mut weight = 1.0f32;
            for variable in variables {
                match weights.get(&variable.to_lowercase()) {
                    Some(part) => {
                        let (label, w) = part.dominant();
                        labels.push(label.to_string());
                        weight *= w;
                    }
                    None => labels.push(UNKNOWN_LABEL.to_string()),
                }
            }
            out.insert(make_valid_identifier(&labels.join("-")), weight);
        }
        out
    }
}

/// Scales `weights` to sum to 1. A zero sum leaves them unchanged.
pub fn normalize_weights(weights: &mut IndexMap<String, f32>) {
    let total: f32 = weights.values().sum();
    if total == 0.0 {
        return;
    }
    for w in weights.values_mut() {
        *w /= total;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlendWeight {
    pub blend: String,
    pub weight: f32,
}

impl BlendWeight {
    fn new(blend: &str, weight: f32) -> Self {
        Self {
            blend: blend.to_string(),
            weight,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetBlend {
    Single { blend: String },
    /// Negative values drive `min`, positive values drive `max`.
    Pair { min: String, max: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TargetModifier {
    pub group: String,
    pub label: String,
    pub blend: TargetBlend,
    pub min_val: f32,
    pub max_val: f32,
}

impl TargetModifier {
    /// Drives one shape over `[min_val, max_val]`; the bounds may be given in either order.
    pub fn single(group: &str, blend: &str, min_val: f32, max_val: f32) -> Self {
        let (min_val, max_val) = if min_val <= max_val {
            (min_val, max_val)
        } else {
            (max_val, min_val)
        };
        Self {
            group: group.to_string(),
            label: target_label(group, blend),
            blend: TargetBlend::Single {
                blend: make_valid_identifier(blend),
            },
            min_val,
            max_val,
        }
    }

    /// Builds a modifier from its file definition: `target` alone drives one shape over
    /// `[0, 1]`, `target` with `min` and `max` suffixes drives a pair over `[-1, 1]`.
    pub fn from_definition(
        group: &str,
        target: &str,
        min: Option<&str>,
        max: Option<&str>,
    ) -> Self {
        let blend = make_valid_identifier(target);
        let label = target_label(group, target);
        match (min, max) {
            (Some(min), Some(max)) => Self {
                group: group.to_string(),
                label,
                blend: TargetBlend::Pair {
                    min: make_valid_identifier(&format!("{blend}_{min}")),
                    max: make_valid_identifier(&format!("{blend}_{max}")),
                },
                min_val: -1.0,
                max_val: 1.0,
            },
            _ => Self {
                group: group.to_string(),
                label,
                blend: TargetBlend::Single { blend },
                min_val: 0.0,
                max_val: 1.0,
            },
        }
    }

    pub fn blend_names(&self) -> Vec<&str> {
        match &self.blend {
            TargetBlend::Single { blend } => vec![blend],
            TargetBlend::Pair { min, max } => vec![min, max],
        }
    }

    pub fn evaluate(&self, value: f32) -> Vec<BlendWeight> {
        match &self.blend {
            TargetBlend::Single { blend } => {
                let lo = self.min_val.min(self.max_val);
                let hi = self.min_val.max(self.max_val);
                vec![BlendWeight::new(blend, value.max(lo).min(hi))]
            }
            TargetBlend::Pair { min, max } => {
                let (min_weight, max_weight) = if value >= 0.0 {
                    (0.0, value.clamp(0.0, self.max_val.max(0.0)))
                } else {
                    ((-value).clamp(0.0, (-self.min_val).max(0.0)), 0.0)
                };
                vec![
                    BlendWeight::new(min, min_weight),
                    BlendWeight::new(max, max_weight),
                ]
            }
        }
    }
}

/// Display label from a target name: `-` separated words, a trailing `a|b` component and a
/// leading group name dropped, words capitalized.
pub fn target_label(group: &str, target: &str) -> String {
    let mut words: Vec<&str> = target.split('-').collect();
    if words.len() > 1 && words.last().is_some_and(|w| w.contains('|')) {
        words.pop();
    }
    if words.len() > 1 && words[0].eq_ignore_ascii_case(group) {
        words.remove(0);
    }
    words
        .iter()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MacroKind {
    Parts { parts: Vec<MacroPart>, center: f32 },
    /// Ethnic macro variables carry no parts and produce no weights on their own.
    Ethnic,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MacroModifier {
    pub group: String,
    /// Prefix of the composite targets this variable contributes to (`group-prefix`).
    pub targets_prefix: String,
    pub variable: String,
    pub label: String,
    pub kind: MacroKind,
    pub min_val: f32,
    pub max_val: f32,
}

impl MacroModifier {
    pub fn new(
        group: &str,
        macrovar: &str,
        modifier_type: Option<&str>,
        macro_data: Option<&MacroData>,
    ) -> Result<Self, Error> {
        let macro_data = macro_data.ok_or_else(|| Error::MacrodataNotLoaded {
            macrovar: macrovar.to_string(),
        })?;

        let (group, targets_prefix) = match group.split_once('-') {
            Some((group, prefix)) => (group.to_string(), prefix.to_string()),
            None => (group.to_string(), String::new()),
        };

        if modifier_type == Some(ETHNIC_MODIFIER_TYPE) {
            return Ok(Self {
                group,
                targets_prefix,
                variable: macrovar.to_lowercase(),
                label: macrovar.to_string(),
                kind: MacroKind::Ethnic,
                min_val: 0.0,
                max_val: 1.0,
            });
        }

        let variable = macrovar.to_lowercase();
        let data = macro_data
            .variable(&variable)
            .ok_or_else(|| Error::UnknownMacrovar {
                macrovar: macrovar.to_string(),
            })?;
        let center = data.center().ok_or_else(|| Error::InvalidValue {
            message: format!("macro variable '{macrovar}' has no parts"),
        })?;

        Ok(Self {
            group,
            targets_prefix,
            variable,
            label: data.label.clone(),
            kind: MacroKind::Parts {
                parts: data.parts.clone(),
                center,
            },
            min_val: 0.0,
            max_val: 1.0,
        })
    }

    pub fn center(&self) -> Option<f32> {
        match &self.kind {
            MacroKind::Parts { center, .. } => Some(*center),
            MacroKind::Ethnic => None,
        }
    }

    /// Weights of the first part whose range contains `value`, if any.
    pub fn evaluate_part(&self, value: f32) -> Option<PartWeights> {
        match &self.kind {
            MacroKind::Parts { parts, .. } => parts.iter().find_map(|p| p.weights(value)),
            MacroKind::Ethnic => None,
        }
    }

    pub fn evaluate(&self, value: f32) -> Vec<BlendWeight> {
        match self.evaluate_part(value) {
            Some(w) => vec![
                BlendWeight::new(&w.low, w.weight_low),
                BlendWeight::new(&w.high, w.weight_high),
            ],
            None => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Modifier {
    Target(TargetModifier),
    Macro(MacroModifier),
}

impl Modifier {
    pub fn group(&self) -> &str {
        match self {
            Self::Target(m) => &m.group,
            Self::Macro(m) => &m.group,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Target(m) => &m.label,
            Self::Macro(m) => &m.label,
        }
    }

    pub fn range(&self) -> (f32, f32) {
        match self {
            Self::Target(m) => (m.min_val, m.max_val),
            Self::Macro(m) => (m.min_val, m.max_val),
        }
    }

    pub fn default_value(&self) -> f32 {
        match self {
            Self::Target(_) => 0.0,
            Self::Macro(m) => m.center().unwrap_or(0.0),
        }
    }

    pub fn evaluate(&self, value: f32) -> Vec<BlendWeight> {
        match self {
            Self::Target(m) => m.evaluate(value),
            Self::Macro(m) => m.evaluate(value),
        }
    }
}

/// All modifiers, grouped for presentation and addressable by `group/target` or
/// `group/macrovar` name.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ModifierIndex {
    pub groups: IndexMap<String, IndexMap<String, Modifier>>,
    #[serde(skip)]
    names: HashMap<String, (usize, usize)>,
    #[serde(skip)]
    macro_data: Option<MacroData>,
}

impl ModifierIndex {
    /// Builds the index. Any macro modifier requires `macro_data`.
    pub fn new(
        definitions: &[ModifierGroupDefinition],
        macro_data: Option<MacroData>,
    ) -> Result<Self, Error> {
        let mut groups: IndexMap<String, IndexMap<String, Modifier>> = IndexMap::new();
        let mut names = HashMap::new();

        for definition in definitions {
            let group_name = capitalize(&definition.group);
            for modifier in &definition.modifiers {
                let (name, modifier) = match modifier {
                    ModifierDefinition::Target { target, min, max } => (
                        format!("{}/{target}", definition.group),
                        Modifier::Target(TargetModifier::from_definition(
                            &group_name,
                            target,
                            min.as_deref(),
                            max.as_deref(),
                        )),
                    ),
                    ModifierDefinition::Macro {
                        macrovar,
                        modifier_type,
                    } => (
                        format!("{}/{macrovar}", definition.group),
                        Modifier::Macro(MacroModifier::new(
                            &group_name,
                            macrovar,
                            modifier_type.as_deref(),
                            macro_data.as_ref(),
                        )?),
                    ),
                };

                let entry = groups.entry(modifier.group().to_string());
                let group_index = entry.index();
                let (member_index, previous) =
                    entry.or_default().insert_full(name.clone(), modifier);
                if previous.is_some() {
                    log::warn!("modifier '{name}' is defined twice; keeping the last definition");
                }
                names.insert(name, (group_index, member_index));
            }
        }

        Ok(Self {
            groups,
            names,
            macro_data,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn macro_data(&self) -> Option<&MacroData> {
        self.macro_data.as_ref()
    }

    /// Looks a modifier up by its `group/target` or `group/macrovar` name.
    pub fn get(&self, name: &str) -> Option<&Modifier> {
        let &(group, member) = self.names.get(name)?;
        self.groups.get_index(group)?.1.get_index(member).map(|(_, m)| m)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Modifier)> + '_ {
        self.groups
            .values()
            .flat_map(|members| members.iter().map(|(name, m)| (name.as_str(), m)))
    }

    pub fn evaluate(&self, name: &str, value: f32) -> Result<Vec<BlendWeight>, Error> {
        let modifier = self.get(name).ok_or_else(|| Error::UnknownModifier {
            name: name.to_string(),
        })?;
        Ok(modifier.evaluate(value))
    }

    /// Normalized weights of the composite macro blend shapes for the given macro variable
    /// values. Variables without a value sit at the center of their range.
    pub fn macro_combination_weights(
        &self,
        values: &HashMap<String, f32>,
    ) -> Result<IndexMap<String, f32>, Error> {
        let macro_data = self
            .macro_data
            .as_ref()
            .ok_or_else(|| Error::MacrodataNotLoaded {
                macrovar: values.keys().next().cloned().unwrap_or_default(),
            })?;
        let weights = macro_data.weights_for_values(values);
        let mut combined = macro_data.compose_combinations(&weights);
        normalize_weights(&mut combined);
        Ok(combined)
    }

    /// Blend-shape weights for a full set of modifier values.
    ///
    /// Target modifiers not in `values` contribute their default. Macro modifier values are
    /// folded into the composite macro shapes when the macro data defines combinations;
    /// otherwise each macro modifier contributes the low/high weights of its matching part,
    /// taking the center of its range when no value is given.
    pub fn evaluate_all(
        &self,
        values: &HashMap<String, f32>,
    ) -> Result<IndexMap<String, f32>, Error> {
        let mut out = IndexMap::new();
        let mut macro_values = HashMap::new();
        let mut part_weights = Vec::new();
        for (name, modifier) in self.iter() {
            match modifier {
                Modifier::Target(m) => {
                    let value = values.get(name).copied().unwrap_or(0.0);
                    for w in m.evaluate(value) {
                        out.insert(w.blend, w.weight);
                    }
                }
                Modifier::Macro(m) => {
                    let value = values.get(name).copied();
                    if let Some(value) = value {
                        macro_values.insert(m.variable.clone(), value);
                    }
                    if let Some(value) = value.or_else(|| m.center()) {
                        part_weights.extend(m.evaluate(value));
                    }
                }
            }
        }

        let has_combinations = self
            .macro_data
            .as_ref()
            .is_some_and(|d| !d.combinations.is_empty());
        if has_combinations {
            out.extend(self.macro_combination_weights(&macro_values)?);
        } else if !part_weights.is_empty() {
            log::debug!("no macro combinations defined, using per-part macro weights");
            for w in part_weights {
                out.insert(w.blend, w.weight);
            }
        }
        Ok(out)
    }
}
