use super::tov::TovEvent;
use crate::core::eos::EquationOfState;
use crate::core::numerics::roots::Secant;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid radial bounds: min_radius = {min_radius} km, max_radius = {max_radius} km")]
    InvalidRadii { min_radius: f64, max_radius: f64 },

    #[error("Tolerance '{name}' must be positive and finite, got {value}")]
    InvalidTolerance { name: &'static str, value: f64 },

    #[error("Central pressure must be positive and finite, got {0} MeV/fm^3")]
    InvalidCentralPressure(f64),

    #[error("Parameter '{name}' has invalid value {value}")]
    InvalidValue { name: &'static str, value: f64 },

    #[error("Iteration budget '{0}' must be at least 1")]
    ZeroIterations(&'static str),

    #[error("Equation of state has no transitional pressure; a hybrid equation of state is required")]
    NotHybrid,
}

/// Inputs of one TOV integration. Built through [`TovInputBuilder`].
#[derive(Debug, Clone)]
pub struct TovInput {
    pub eos: Arc<dyn EquationOfState>,
    pub min_radius: f64,
    pub max_radius: f64,
    pub relative_tolerance: f64,
    /// Absolute tolerances of `(ν, m, p)`.
    pub absolute_tolerance: [f64; 3],
    pub max_steps: usize,
    /// Extra events monitored after the surface event.
    pub events: Vec<TovEvent>,
}

impl TovInput {
    pub const DEFAULT_MIN_RADIUS: f64 = 1e-6;
    pub const DEFAULT_MAX_RADIUS: f64 = 1e5;
    pub const DEFAULT_RELATIVE_TOLERANCE: f64 = 1e-6;
    pub const DEFAULT_ABSOLUTE_TOLERANCE: [f64; 3] = [1e-4, 1e-4, 1e-15];
    pub const DEFAULT_MAX_STEPS: usize = 100_000;

    pub fn builder() -> TovInputBuilder {
        TovInputBuilder::new()
    }
}

#[derive(Default)]
pub struct TovInputBuilder {
    eos: Option<Arc<dyn EquationOfState>>,
    min_radius: Option<f64>,
    max_radius: Option<f64>,
    relative_tolerance: Option<f64>,
    absolute_tolerance: Option<[f64; 3]>,
    max_steps: Option<usize>,
    events: Vec<TovEvent>,
}

impl TovInputBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eos(mut self, eos: Arc<dyn EquationOfState>) -> Self {
        self.eos = Some(eos);
        self
    }
    pub fn min_radius(mut self, radius: f64) -> Self {
        self.min_radius = Some(radius);
        self
    }
    pub fn max_radius(mut self, radius: f64) -> Self {
        self.max_radius = Some(radius);
        self
    }
    pub fn relative_tolerance(mut self, tolerance: f64) -> Self {
        self.relative_tolerance = Some(tolerance);
        self
    }
    pub fn absolute_tolerance(mut self, tolerance: [f64; 3]) -> Self {
        self.absolute_tolerance = Some(tolerance);
        self
    }
    pub fn max_steps(mut self, steps: usize) -> Self {
        self.max_steps = Some(steps);
        self
    }
    pub fn event(mut self, event: TovEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn build(self) -> Result<TovInput, ConfigError> {
        let eos = self.eos.ok_or(ConfigError::MissingParameter("eos"))?;
        let min_radius = self.min_radius.unwrap_or(TovInput::DEFAULT_MIN_RADIUS);
        let max_radius = self.max_radius.unwrap_or(TovInput::DEFAULT_MAX_RADIUS);
        if !(min_radius > 0.0 && max_radius > min_radius && max_radius.is_finite()) {
            return Err(ConfigError::InvalidRadii {
                min_radius,
                max_radius,
            });
        }

        let relative_tolerance = self
            .relative_tolerance
            .unwrap_or(TovInput::DEFAULT_RELATIVE_TOLERANCE);
        check_tolerance("relative_tolerance", relative_tolerance)?;
        let absolute_tolerance = self
            .absolute_tolerance
            .unwrap_or(TovInput::DEFAULT_ABSOLUTE_TOLERANCE);
        for value in absolute_tolerance {
            check_tolerance("absolute_tolerance", value)?;
        }

        let max_steps = self.max_steps.unwrap_or(TovInput::DEFAULT_MAX_STEPS);
        if max_steps == 0 {
            return Err(ConfigError::ZeroIterations("max_steps"));
        }

        Ok(TovInput {
            eos,
            min_radius,
            max_radius,
            relative_tolerance,
            absolute_tolerance,
            max_steps,
            events: self.events,
        })
    }
}

/// User-facing settings of the radial-oscillation problem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralRadOscInput {
    /// Relative displacement `ξ` at the centre; the eigenproblem is linear so only
    /// its sign and scale matter.
    pub central_xi: f64,
    pub int_abs_tol: f64,
    pub int_rel_tol: f64,
    pub root_abs_tol: f64,
    pub root_rel_tol: f64,
    pub root_max_iterations: usize,
}

impl Default for CentralRadOscInput {
    fn default() -> Self {
        Self {
            central_xi: 1.0,
            int_abs_tol: 1e-6,
            int_rel_tol: 1e-3,
            root_abs_tol: 1e-15,
            root_rel_tol: 2e-6,
            root_max_iterations: 50,
        }
    }
}

impl CentralRadOscInput {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_tolerance("int_abs_tol", self.int_abs_tol)?;
        check_tolerance("int_rel_tol", self.int_rel_tol)?;
        check_tolerance("root_rel_tol", self.root_rel_tol)?;
        if !(self.root_abs_tol >= 0.0 && self.root_abs_tol.is_finite()) {
            return Err(ConfigError::InvalidTolerance {
                name: "root_abs_tol",
                value: self.root_abs_tol,
            });
        }
        if self.root_max_iterations == 0 {
            return Err(ConfigError::ZeroIterations("root_max_iterations"));
        }
        if !(self.central_xi != 0.0 && self.central_xi.is_finite()) {
            return Err(ConfigError::InvalidValue {
                name: "central_xi",
                value: self.central_xi,
            });
        }
        Ok(())
    }

    /// `Δp(0) = -3 Γ(p_c) p_c ξ(0)`, which keeps the perturbation regular at the centre.
    pub fn central_delta_p(&self, eos: &dyn EquationOfState, central_pressure: f64) -> f64 {
        -3.0 * eos.bulk_modulus_from(central_pressure) * self.central_xi
    }

    pub fn initial_integration_vector(
        &self,
        eos: &dyn EquationOfState,
        central_pressure: f64,
    ) -> [f64; 2] {
        [self.central_xi, self.central_delta_p(eos, central_pressure)]
    }

    pub fn secant(&self) -> Secant {
        Secant {
            abs_tolerance: self.root_abs_tol,
            rel_tolerance: self.root_rel_tol,
            max_iterations: self.root_max_iterations,
        }
    }
}

fn check_tolerance(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidTolerance { name, value })
    }
}
