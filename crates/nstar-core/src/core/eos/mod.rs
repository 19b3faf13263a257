//! # Equation of State Module
//!
//! Closes the stellar structure equations by relating pressure to energy density and
//! the thermodynamic derivatives the perturbation equations need.
//!
//! ## Overview
//!
//! Every model implements [`EquationOfState`]. Only the energy density is mandatory;
//! the sound speed and adiabatic index have generic fallbacks in [`fallback`] which
//! models override whenever they know a closed form.
//!
//! - **Analytic models** ([`analytic`]) - BPS crust fit, massless MIT bag, constant sound speed
//! - **Generalized piecewise polytropes** ([`gpp`]) - SLy4 crust matched to a tabulated core
//! - **Tabulated models** ([`tabulated`]) - spline-interpolated tables and their weighted blends
//! - **Hybrid models** ([`hybrid`]) - Maxwell construction joining two models at a pressure
//!
//! All pressures and energy densities are in MeV fm⁻³.

pub mod analytic;
pub mod gpp;
pub mod hybrid;
pub mod tabulated;

pub use analytic::{BpsFit, ConstantSoundSpeed, MasslessMitBag};
pub use gpp::GeneralizedPiecewisePolytrope;
pub use hybrid::HybridEos;
pub use tabulated::{TabulatedEos, WeightedEos};

use crate::core::numerics::spline::SplineError;
use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EosError {
    #[error("Table '{path}' is malformed: {reason}")]
    MalformedTable { path: String, reason: String },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },

    #[error("Table is missing the required column '{0}'")]
    MissingColumn(&'static str),

    #[error("Column '{column}' could not be interpolated: {source}")]
    Spline {
        column: &'static str,
        #[source]
        source: SplineError,
    },

    #[error("Unknown equation of state label '{0}'")]
    UnknownLabel(String),

    #[error("Invalid parameter '{name}' = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("Acausal sound speed squared {sound_speed_squared} at pressure {pressure} MeV/fm^3")]
    Acausal {
        pressure: f64,
        sound_speed_squared: f64,
    },
}

/// Pressure-parameterised equation of state.
///
/// Implementations must be cheap to call and free of interior mutability; the
/// integrators evaluate them thousands of times per star and share them across
/// worker threads.
pub trait EquationOfState: Debug + Send + Sync {
    /// Energy density `e(p)` in MeV fm⁻³.
    fn energy_density_from(&self, pressure: f64) -> f64;

    /// Squared sound speed `dp/de` in units of `c²`.
    fn sound_speed_squared_from(&self, pressure: f64) -> f64 {
        fallback::sound_speed_squared(self, pressure)
    }

    /// Adiabatic index `Γ = (e + p)/p · dp/de`.
    fn adiabatic_index_from(&self, pressure: f64) -> f64 {
        fallback::adiabatic_index(self, pressure)
    }

    /// Bulk modulus `Γ p`, which stays finite at the surface even when `Γ` does not.
    fn bulk_modulus_from(&self, pressure: f64) -> f64 {
        pressure * self.adiabatic_index_from(pressure)
    }

    /// Baryon number density in fm⁻³, when the model carries it.
    fn baryon_density_from(&self, _pressure: f64) -> Option<f64> {
        None
    }

    /// Pressure of a first-order phase transition, for hybrid models.
    fn transitional_pressure(&self) -> Option<f64> {
        None
    }
}

/// Generic rules shared by models without closed-form derivatives.
pub mod fallback {
    use super::EquationOfState;

    /// Relative step of the central difference in [`sound_speed_squared`].
    pub const RELATIVE_STEP: f64 = 1e-4;

    /// `c_s² = 1/(de/dp)` from a central difference with step `p · 1e-4`.
    pub fn sound_speed_squared<E: EquationOfState + ?Sized>(eos: &E, pressure: f64) -> f64 {
        let h = pressure * RELATIVE_STEP;
        let forward = eos.energy_density_from(pressure + h);
        let backward = eos.energy_density_from(pressure - h);
        let de_dp = (forward - backward) / (2.0 * h);
        1.0 / de_dp
    }

    /// `Γ = (1 + e/p) c_s²`.
    pub fn adiabatic_index<E: EquationOfState + ?Sized>(eos: &E, pressure: f64) -> f64 {
        let energy_density = eos.energy_density_from(pressure);
        (1.0 + energy_density / pressure) * eos.sound_speed_squared_from(pressure)
    }
}

/// Checks `0 ≤ c_s² ≤ 1` at every pressure and reports the first violation.
///
/// Models are never clamped; this lets callers reject or flag acausal ranges.
pub fn check_causality<E: EquationOfState + ?Sized>(
    eos: &E,
    pressures: impl IntoIterator<Item = f64>,
) -> Result<(), EosError> {
    for pressure in pressures {
        let cs2 = eos.sound_speed_squared_from(pressure);
        if !(0.0..=1.0).contains(&cs2) {
            return Err(EosError::Acausal {
                pressure,
                sound_speed_squared: cs2,
            });
        }
    }
    Ok(())
}
