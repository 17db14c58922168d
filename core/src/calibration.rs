//! Calibration of mechanical parameters from observed measures.
//!
//! Rewrites the parameters that have a direct relation to a measure so
//! that the average behaviour of a run matches the observations:
//!
//!   d0           <- obs_d0
//!   ldep_balance <- mean_kt_spb_dist
//!   muk          <- tau_k * kappa_k
//!   Fk           <- muk * poleward_speed
//!   Fmz_a        <- mus * anaph_rate / 2
//!   kappa_c      <- Fmz / (N * (mean_metaph_k_dist - d0))
//!
//! Names listed in `forced` keep their current value and are used as-is
//! by the relations that depend on them.

use crate::{
    config::{MeasureSet, ParameterSet},
    error::{SimError, SimResult},
};

pub const REQUIRED_MEASURES: [&str; 6] = [
    "poleward_speed",
    "anaph_rate",
    "mean_metaph_k_dist",
    "obs_d0",
    "mean_kt_spb_dist",
    "tau_k",
];

/// Parameters changed by a calibration pass, as `(name, old, new)`.
pub type Changes = Vec<(String, f64, f64)>;

pub fn reduce_params(
    params: &mut ParameterSet,
    measures: &MeasureSet,
    forced: &[&str],
) -> SimResult<Changes> {
    for name in REQUIRED_MEASURES {
        if measures.get(name).is_err() {
            return Err(SimError::MissingParameter { name: name.to_string() });
        }
    }

    let mut changes = Changes::new();
    let mut apply = |params: &mut ParameterSet, name: &str, value: f64| -> SimResult<f64> {
        if forced.contains(&name) {
            return params.get(name);
        }
        let old = params.get(name)?;
        if !value.is_finite() {
            return Err(SimError::invalid(name, value, "calibration produced a non-finite value"));
        }
        params.set(name, value)?;
        if old != value {
            changes.push((name.to_string(), old, value));
        }
        Ok(value)
    };

    let d0 = apply(params, "d0", measures.get("obs_d0")?)?;
    apply(params, "ldep_balance", measures.get("mean_kt_spb_dist")?)?;

    let kappa_k = params.get("kappa_k")?;
    let muk = apply(params, "muk", measures.get("tau_k")? * kappa_k)?;
    apply(params, "Fk", muk * measures.get("poleward_speed")?)?;

    let mus = params.get("mus")?;
    apply(params, "Fmz_a", mus * measures.get("anaph_rate")? / 2.0)?;

    let stretch = measures.get("mean_metaph_k_dist")? - d0;
    if stretch > 0.0 {
        let n = params.get("N")?;
        let fmz = params.get("Fmz")?;
        apply(params, "kappa_c", fmz / (n * stretch))?;
    } else {
        log::warn!(
            "mean_metaph_k_dist does not exceed d0 ({d0}); kappa_c left unchanged"
        );
    }

    for (name, old, new) in &changes {
        log::debug!("calibrated {name}: {old} -> {new}");
    }
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_nearly_self_consistent() {
        let mut p = ParameterSet::default_params();
        let m = MeasureSet::default_measures();
        reduce_params(&mut p, &m, &[]).unwrap();

        assert!((p.get("muk").unwrap() - 40.0).abs() < 1e-9);
        assert!((p.get("Fk").unwrap() - 0.5).abs() < 1e-9);
        assert!((p.get("Fmz_a").unwrap() - 0.5).abs() < 1e-9);
        // 0.2 pN / (3 * 0.30 um)
        assert!((p.get("kappa_c").unwrap() - 0.2 / 0.9).abs() < 1e-9);
    }

    #[test]
    fn forced_parameters_are_kept() {
        let mut p = ParameterSet::default_params();
        p.set("muk", 10.0).unwrap();
        let m = MeasureSet::default_measures();
        reduce_params(&mut p, &m, &["muk"]).unwrap();

        assert_eq!(p.get("muk").unwrap(), 10.0);
        // Fk follows the forced drag.
        assert!((p.get("Fk").unwrap() - 10.0 * 0.0125).abs() < 1e-12);
    }

    #[test]
    fn missing_measure_is_reported() {
        let mut p = ParameterSet::default_params();
        let m = MeasureSet::new();
        assert!(matches!(
            reduce_params(&mut p, &m, &[]),
            Err(SimError::MissingParameter { .. })
        ));
    }
}
