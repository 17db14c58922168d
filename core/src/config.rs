//! Parameter and measure stores.
//!
//! Parameters are loaded from `data/params.json`, measures from
//! `data/measures.json`. Each entry carries a unit; the unit decides how
//! the adimensional view is computed (forces in units of `Fk`, speeds in
//! units of `Vk`). The engine always consumes dimensional values.
//! In tests, use `ParameterSet::default_params()` and
//! `MeasureSet::default_measures()`.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ── Units ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Time,
    Length,
    Force,
    Speed,
    Stiffness,
    Drag,
    Rate,
    Energy,
    Dimensionless,
}

impl Dimension {
    pub fn from_unit(unit: &str) -> Option<Self> {
        let dim = match unit.trim() {
            "s"                  => Self::Time,
            "um"                 => Self::Length,
            "pN"                 => Self::Force,
            "um/s"               => Self::Speed,
            "pN/um"              => Self::Stiffness,
            "pN.s/um"            => Self::Drag,
            "1/s"                => Self::Rate,
            "pN.um"              => Self::Energy,
            "" | "none" | "step" => Self::Dimensionless,
            _ => return None,
        };
        Some(dim)
    }
}

// ── Parameter set ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Param {
    pub value:       f64,
    pub unit:        String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ParamEntry {
    name:        String,
    value:       f64,
    #[serde(default)]
    unit:        String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ParamFile {
    parameters: Vec<ParamEntry>,
}

/// Named physical and numerical parameters of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ParameterSet {
    params: BTreeMap<String, Param>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON parameter file.
    pub fn load(path: &str) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> SimResult<Self> {
        let file: ParamFile = serde_json::from_str(content)?;
        let mut set = Self::new();
        for entry in file.parameters {
            if Dimension::from_unit(&entry.unit).is_none() {
                return Err(SimError::InvalidParameter {
                    name: entry.name,
                    value: entry.value,
                    reason: format!("unknown unit '{}'", entry.unit),
                });
            }
            set.insert(&entry.name, entry.value, &entry.unit, &entry.description);
        }
        Ok(set)
    }

    /// Add or replace a parameter together with its unit.
    pub fn insert(&mut self, name: &str, value: f64, unit: &str, description: &str) {
        self.params.insert(
            name.to_string(),
            Param {
                value,
                unit: unit.to_string(),
                description: description.to_string(),
            },
        );
    }

    /// Dimensional value of `name`.
    pub fn get(&self, name: &str) -> SimResult<f64> {
        self.params
            .get(name)
            .map(|p| p.value)
            .ok_or_else(|| SimError::MissingParameter { name: name.to_string() })
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Override the value of an existing parameter. Units are kept.
    pub fn set(&mut self, name: &str, value: f64) -> SimResult<()> {
        match self.params.get_mut(name) {
            Some(p) => {
                log::debug!("param {name}: {} -> {value}", p.value);
                p.value = value;
                Ok(())
            }
            None => Err(SimError::MissingParameter { name: name.to_string() }),
        }
    }

    /// Adimensional value of `name`: forces over `Fk`, speeds over `Vk`.
    pub fn relative(&self, name: &str) -> SimResult<f64> {
        let param = self
            .params
            .get(name)
            .ok_or_else(|| SimError::MissingParameter { name: name.to_string() })?;
        let dim = Dimension::from_unit(&param.unit)
            .ok_or_else(|| SimError::invalid(name, param.value, format!("unknown unit '{}'", param.unit)))?;
        let fk = self.get("Fk")?;
        let vk = self.get("Vk")?;
        let value = match dim {
            Dimension::Force | Dimension::Stiffness | Dimension::Energy => param.value / fk,
            Dimension::Speed => param.value / vk,
            Dimension::Drag  => param.value * vk / fk,
            _ => param.value,
        };
        Ok(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Param)> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameters with hardcoded defaults, matching `data/params.json`.
    pub fn default_params() -> Self {
        let mut p = Self::new();
        // Numerics
        p.insert("dt",   1.0,   "s",    "Time step");
        p.insert("span", 800.0, "step", "Number of integration steps");
        p.insert("seed", 42.0,  "none", "Seed of the random stream");
        // Topology and geometry
        p.insert("N",                3.0,  "none", "Number of chromosomes");
        p.insert("L0",               2.0,  "um",   "Initial spindle length");
        p.insert("d0",               0.05, "um",   "Cohesin rest length");
        p.insert("ldep_balance",     0.6,  "um",   "Rest length of an attached kMT");
        p.insert("placement_spread", 0.25, "none", "Centromere jitter, fraction of the half spindle");
        p.insert("L_max",            10.0, "um",   "Spindle length where anaphase elongation stalls");
        // Mechanics
        p.insert("kappa_k", 0.5,    "pN/um",   "kMT stiffness");
        p.insert("kappa_c", 0.2,    "pN/um",   "Cohesin stiffness");
        p.insert("muk",     40.0,   "pN.s/um", "Kinetochore drag");
        p.insert("mus",     400.0,  "pN.s/um", "Spindle pole drag");
        p.insert("Fmz",     0.2,    "pN",      "Metaphase midzone force");
        p.insert("Fmz_a",   0.5,    "pN",      "Anaphase midzone force");
        p.insert("Fk",      0.5,    "pN",      "Anaphase poleward force per kMT");
        p.insert("l_pull",  0.5,    "um",      "Half-saturation distance of the poleward pull");
        p.insert("Vk",      0.01,   "um/s",    "Unit speed");
        p.insert("kBT",     0.0041, "pN.um",   "Thermal energy");
        // Attachment
        p.insert("k_a",            0.02,   "1/s",  "Attachment rate");
        p.insert("k_d0",           0.0001, "1/s",  "Base detachment rate");
        p.insert("d_alpha",        0.004,  "um",   "Tension sensitivity of the detachment rate");
        p.insert("d_min",          0.02,   "um",   "Floor on the tension length scale");
        p.insert("orientation",    0.5,    "none", "Bias toward the facing pole");
        p.insert("mero_capture",   0.003,  "none", "Relative capture rate of a second pole");
        p.insert("capture_length", 0.0,    "um",   "Distance decay of capture, 0 disables");
        // Checkpoint
        p.insert("sac",                     1.0,  "none", "Spindle assembly checkpoint on/off");
        p.insert("checkpoint_satisfaction", 1.0,  "none", "Fraction of bioriented chromosomes required");
        p.insert("min_duration",            50.0, "s",    "Time the checkpoint must stay satisfied");
        p.insert("t_A",                     0.0,  "s",    "Earliest anaphase onset");
        p
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, p) in &self.params {
            writeln!(f, "{name:>24} = {:<12} {}", p.value, p.unit)?;
        }
        Ok(())
    }
}

// ── Measure set ─────────────────────────────────────────────────────────────

/// Observed characteristics of mitosis, used to calibrate parameters.
/// Always dimensional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MeasureSet {
    measures: BTreeMap<String, Param>,
}

impl MeasureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &str) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> SimResult<Self> {
        let file: ParamFile = serde_json::from_str(content)?;
        let mut set = Self::new();
        for entry in file.parameters {
            set.insert(&entry.name, entry.value, &entry.unit, &entry.description);
        }
        Ok(set)
    }

    pub fn insert(&mut self, name: &str, value: f64, unit: &str, description: &str) {
        self.measures.insert(
            name.to_string(),
            Param {
                value,
                unit: unit.to_string(),
                description: description.to_string(),
            },
        );
    }

    pub fn get(&self, name: &str) -> SimResult<f64> {
        self.measures
            .get(name)
            .map(|p| p.value)
            .ok_or_else(|| SimError::MissingParameter { name: name.to_string() })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Param)> {
        self.measures.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    /// Measures with hardcoded defaults, matching `data/measures.json`.
    pub fn default_measures() -> Self {
        let mut m = Self::new();
        m.insert("poleward_speed",     0.0125, "um/s", "Anaphase A kinetochore speed");
        m.insert("anaph_rate",         0.0025, "um/s", "Anaphase B spindle elongation rate");
        m.insert("mean_metaph_k_dist", 0.35,   "um",   "Mean sister distance in metaphase");
        m.insert("obs_d0",             0.05,   "um",   "Sister distance without tension");
        m.insert("mean_kt_spb_dist",   0.6,    "um",   "Mean kinetochore to pole distance");
        m.insert("tau_k",              80.0,   "s",    "Kinetochore relaxation time");
        m
    }
}

// ── Initial attachment condition ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InitialCondition {
    /// Every kinetochore detached.
    Null,
    /// Every chromosome bioriented.
    Amphitelic,
    /// Each kinetochore detached, or bound to either pole, with equal odds.
    Random,
    /// Sister A bound to its facing pole, sister B detached.
    Monotelic,
    /// Both sisters bound to the left pole.
    Syntelic,
    /// Sister A bound to both poles, sister B to its facing pole.
    Merotelic,
}

impl InitialCondition {
    pub const ALL: [InitialCondition; 6] = [
        Self::Null,
        Self::Amphitelic,
        Self::Random,
        Self::Monotelic,
        Self::Syntelic,
        Self::Merotelic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Null       => "null",
            Self::Amphitelic => "amphitelic",
            Self::Random     => "random",
            Self::Monotelic  => "monotelic",
            Self::Syntelic   => "syntelic",
            Self::Merotelic  => "merotelic",
        }
    }
}

impl FromStr for InitialCondition {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| SimError::UnknownInitialCondition {
                name: s.to_string(),
                expected: Self::ALL.iter().map(|c| c.name()).collect::<Vec<_>>().join(", "),
            })
    }
}

impl fmt::Display for InitialCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Resolved model parameters ───────────────────────────────────────────────

/// Every parameter the engine consumes, resolved and range-checked once
/// at setup.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub dt:                      f64,
    pub span:                    u64,
    pub seed:                    u64,
    pub n_chromosomes:           usize,

    pub spindle_length:          f64,
    pub d0:                      f64,
    pub link_rest_length:        f64,
    pub placement_spread:        f64,
    pub max_spindle_length:      f64,

    pub kappa_k:                 f64,
    pub kappa_c:                 f64,
    pub muk:                     f64,
    pub mus:                     f64,
    pub fmz:                     f64,
    pub fmz_anaphase:            f64,
    pub fk:                      f64,
    pub l_pull:                  f64,
    pub kbt:                     f64,

    pub k_a:                     f64,
    pub k_d0:                    f64,
    pub d_alpha:                 f64,
    pub d_min:                   f64,
    pub orientation:             f64,
    pub mero_capture:            f64,
    pub capture_length:          f64,

    pub sac:                     bool,
    pub checkpoint_satisfaction: f64,
    pub min_duration:            f64,
    pub t_a:                     f64,
}

impl ModelParams {
    pub fn resolve(params: &ParameterSet) -> SimResult<Self> {
        let positive = |name: &str| -> SimResult<f64> {
            let v = params.get(name)?;
            if !(v.is_finite() && v > 0.0) {
                return Err(SimError::invalid(name, v, "must be > 0"));
            }
            Ok(v)
        };
        let non_negative = |name: &str| -> SimResult<f64> {
            let v = params.get(name)?;
            if !(v.is_finite() && v >= 0.0) {
                return Err(SimError::invalid(name, v, "must be >= 0"));
            }
            Ok(v)
        };
        let fraction = |name: &str| -> SimResult<f64> {
            let v = params.get(name)?;
            if !(0.0..=1.0).contains(&v) {
                return Err(SimError::invalid(name, v, "must be within [0, 1]"));
            }
            Ok(v)
        };
        let count = |name: &str| -> SimResult<u64> {
            let v = params.get(name)?;
            if !(v.is_finite() && v >= 0.0 && v.fract() == 0.0) {
                return Err(SimError::invalid(name, v, "must be a non-negative integer"));
            }
            Ok(v as u64)
        };

        let n_chromosomes = count("N")? as usize;
        if n_chromosomes == 0 {
            return Err(SimError::invalid("N", 0.0, "at least one chromosome is required"));
        }
        let sac = params.get("sac")?;
        if sac != 0.0 && sac != 1.0 {
            return Err(SimError::invalid("sac", sac, "must be 0 or 1"));
        }

        let resolved = Self {
            dt:                      positive("dt")?,
            span:                    count("span")?,
            seed:                    count("seed")?,
            n_chromosomes,

            spindle_length:          positive("L0")?,
            d0:                      non_negative("d0")?,
            link_rest_length:        non_negative("ldep_balance")?,
            placement_spread:        fraction("placement_spread")?,
            max_spindle_length:      positive("L_max")?,

            kappa_k:                 non_negative("kappa_k")?,
            kappa_c:                 non_negative("kappa_c")?,
            muk:                     positive("muk")?,
            mus:                     positive("mus")?,
            fmz:                     non_negative("Fmz")?,
            fmz_anaphase:            non_negative("Fmz_a")?,
            fk:                      non_negative("Fk")?,
            l_pull:                  positive("l_pull")?,
            kbt:                     non_negative("kBT")?,

            k_a:                     non_negative("k_a")?,
            k_d0:                    non_negative("k_d0")?,
            d_alpha:                 non_negative("d_alpha")?,
            d_min:                   positive("d_min")?,
            orientation:             fraction("orientation")?,
            mero_capture:            fraction("mero_capture")?,
            capture_length:          non_negative("capture_length")?,

            sac:                     sac == 1.0,
            checkpoint_satisfaction: fraction("checkpoint_satisfaction")?,
            min_duration:            non_negative("min_duration")?,
            t_a:                     non_negative("t_A")?,
        };
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let p = ModelParams::resolve(&ParameterSet::default_params()).unwrap();
        assert_eq!(p.n_chromosomes, 3);
        assert_eq!(p.span, 800);
        assert!(p.sac);
    }

    #[test]
    fn relative_values_use_unit_scales() {
        let p = ParameterSet::default_params();
        assert!((p.relative("Fk").unwrap() - 1.0).abs() < 1e-12);
        assert!((p.relative("Vk").unwrap() - 1.0).abs() < 1e-12);
        // 0.2 pN / 0.5 pN
        assert!((p.relative("Fmz").unwrap() - 0.4).abs() < 1e-12);
        // 400 pN.s/um * 0.01 um/s / 0.5 pN
        assert!((p.relative("mus").unwrap() - 8.0).abs() < 1e-9);
        // Time is untouched.
        assert_eq!(p.relative("dt").unwrap(), p.get("dt").unwrap());
    }

    #[test]
    fn set_requires_existing_name() {
        let mut p = ParameterSet::default_params();
        p.set("dt", 10.0).unwrap();
        assert_eq!(p.get("dt").unwrap(), 10.0);
        assert!(matches!(p.set("nope", 1.0), Err(SimError::MissingParameter { .. })));
    }

    #[test]
    fn missing_parameter_is_named() {
        let mut p = ParameterSet::default_params();
        p.params.remove("kappa_c");
        match ModelParams::resolve(&p) {
            Err(SimError::MissingParameter { name }) => assert_eq!(name, "kappa_c"),
            other => panic!("expected MissingParameter, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for (name, bad) in [("dt", -1.0), ("muk", 0.0), ("span", 2.5), ("orientation", 1.5), ("sac", 0.5)] {
            let mut p = ParameterSet::default_params();
            p.set(name, bad).unwrap();
            match ModelParams::resolve(&p) {
                Err(SimError::InvalidParameter { name: got, .. }) => assert_eq!(got, name),
                other => panic!("{name}={bad}: expected InvalidParameter, got {other:?}"),
            }
        }
    }

    #[test]
    fn initial_condition_parsing() {
        assert_eq!("random".parse::<InitialCondition>().unwrap(), InitialCondition::Random);
        assert!(matches!(
            "sideways".parse::<InitialCondition>(),
            Err(SimError::UnknownInitialCondition { .. })
        ));
    }

    #[test]
    fn json_round_trip_keeps_units() {
        let json = r#"{"parameters": [
            {"name": "dt", "value": 2.0, "unit": "s", "description": "step"},
            {"name": "Fk", "value": 1.0, "unit": "pN"}
        ]}"#;
        let p = ParameterSet::from_json(json).unwrap();
        assert_eq!(p.get("dt").unwrap(), 2.0);
        assert_eq!(p.param("Fk").unwrap().unit, "pN");
    }

    #[test]
    fn unknown_unit_is_rejected() {
        let json = r#"{"parameters": [{"name": "x", "value": 1.0, "unit": "furlong"}]}"#;
        assert!(matches!(ParameterSet::from_json(json), Err(SimError::InvalidParameter { .. })));
    }
}
