use thiserror::Error;

use super::config::ConfigError;
use crate::core::eos::EosError;
use crate::core::models::profiles::ProfileError;
use crate::core::numerics::integrator::IntegrationError;
use crate::core::numerics::roots::RootError;
use crate::core::numerics::spline::SplineError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Equation of state error: {0}")]
    Eos(#[from] EosError),

    #[error("Integration of the {stage} equations failed: {source}")]
    Integration {
        stage: &'static str,
        source: IntegrationError,
    },

    #[error(
        "Surface not reached for central pressure {central_pressure} MeV/fm^3 within r = {max_radius} km; increase max_radius"
    )]
    BoundaryNotFound {
        central_pressure: f64,
        max_radius: f64,
    },

    #[error(
        "Interface at p = {transitional_pressure} MeV/fm^3 not found for central pressure {central_pressure} MeV/fm^3"
    )]
    InterfaceNotFound {
        central_pressure: f64,
        transitional_pressure: f64,
    },

    #[error(
        "Delta p at the surface did not converge after {iterations} iterations (last omega^2 = {last_estimate:e} km^-2)"
    )]
    StabilityConvergence {
        iterations: usize,
        last_estimate: f64,
    },

    #[error("Surface residual is not finite for omega^2 = {omega_squared:e} km^-2")]
    NonFiniteResidual { omega_squared: f64 },

    #[error("Background interpolation failed: {0}")]
    Interpolation(#[from] SplineError),

    #[error("Invalid profile: {0}")]
    Profile(#[from] ProfileError),

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl From<RootError> for EngineError {
    fn from(error: RootError) -> Self {
        match error {
            RootError::NotConverged {
                iterations,
                last_estimate,
            } => EngineError::StabilityConvergence {
                iterations,
                last_estimate,
            },
            RootError::NonFinite { x } => EngineError::NonFiniteResidual { omega_squared: x },
            RootError::NotBracketed { .. } => EngineError::Internal(error.to_string()),
        }
    }
}
