//! Radial oscillations in the formalism of Gondek, Haensel and Zdunik (1997).
//!
//! The Lagrangian displacement `ξ = Δr/r` and pressure perturbation `Δp` obey two
//! linear equations on the static background. A trial `ω²` is an eigenvalue when the
//! solution that is regular at the centre also has `Δp(R) = 0`; the secant method
//! drives the surface residual to zero. The number of nodes of `ξ` labels the mode.
//!
//! Crust models have a bulk modulus that vanishes with the pressure, which makes the
//! `ξ` equation singular at the surface. The perturbation equations therefore see the
//! background pressure no lower than [`SURFACE_PRESSURE_RATIO`] times the central one.

use super::cache::{BackgroundCache, BackgroundPoint};
use super::config::{CentralRadOscInput, ConfigError};
use super::error::EngineError;
use super::tov::{
    mass_derivative, pressure_derivative, radial_metric_fn, time_metric_fn_derivative,
};
use crate::core::eos::EquationOfState;
use crate::core::models::profiles::InternalProfiles;
use crate::core::numerics::integrator::{Dop853, Event, State, Tolerances};
use crate::core::numerics::roots::{RootResult, Secant};
use crate::core::numerics::spline::CubicHermiteSpline;
use crate::core::units::MEV_FM3_TO_KM_2;
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::debug;

pub type PerturbationState = State<2>;

const XI: usize = 0;
const DELTA_P: usize = 1;

/// Relative offset of the second secant seed from the first.
const SECOND_SEED_OFFSET: f64 = 1e-3;

/// Pressure floor of the perturbation equations, relative to the central pressure.
pub const SURFACE_PRESSURE_RATIO: f64 = 1e-10;

/// Relative pressure offset that puts a knot's energy density on the side of the
/// interval being built.
const INTERVAL_SIDE_OFFSET: f64 = 1e-9;

/// Cubic Hermite interpolation of the renormalised background `(ν, m, p)`.
///
/// Knot values come from the profiles and knot slopes from the TOV equations. Each
/// interval evaluates the energy density on its own side of its end knots, so a density
/// jump at a recorded radius stays a kink in `m` and `p` instead of bending the
/// neighbouring intervals.
#[derive(Debug)]
pub struct Background {
    time_metric_fn: CubicHermiteSpline,
    mass: CubicHermiteSpline,
    pressure: CubicHermiteSpline,
}

impl Background {
    pub fn new(eos: &dyn EquationOfState, profiles: &InternalProfiles) -> Result<Self, EngineError> {
        let r = &profiles.radial_coord;
        let slopes = |k: usize, side: f64| {
            let (radius, mass, pressure) = (r[k], profiles.masses[k], profiles.pressures[k]);
            let energy_density =
                eos.energy_density_from(pressure * (1.0 + side * INTERVAL_SIDE_OFFSET));
            let dnu = time_metric_fn_derivative(radius, pressure, mass);
            [
                dnu,
                mass_derivative(radius, energy_density),
                pressure_derivative(energy_density, pressure, dnu),
            ]
        };

        let mut left: [Vec<f64>; 3] = Default::default();
        let mut right: [Vec<f64>; 3] = Default::default();
        for k in 0..r.len().saturating_sub(1) {
            // Pressure falls outwards, so the interval lies below p_k and above p_{k+1}.
            let (inner, outer) = (slopes(k, -1.0), slopes(k + 1, 1.0));
            for column in 0..3 {
                left[column].push(inner[column]);
                right[column].push(outer[column]);
            }
        }
        let [nu_left, mass_left, pressure_left] = left;
        let [nu_right, mass_right, pressure_right] = right;

        Ok(Self {
            time_metric_fn: CubicHermiteSpline::from_interval_slopes(
                r,
                &profiles.time_metric_fn,
                nu_left,
                nu_right,
            )?,
            mass: CubicHermiteSpline::from_interval_slopes(r, &profiles.masses, mass_left, mass_right)?,
            pressure: CubicHermiteSpline::from_interval_slopes(
                r,
                &profiles.pressures,
                pressure_left,
                pressure_right,
            )?,
        })
    }

    pub fn at(&self, radius: f64) -> BackgroundPoint {
        BackgroundPoint {
            time_metric_fn: self.time_metric_fn.eval(radius),
            mass: self.mass.eval(radius),
            pressure: self.pressure.eval(radius),
        }
    }
}

/// Everything needed to integrate the perturbation equations of one star.
#[derive(Debug)]
pub struct RadOscInput {
    pub eos: Arc<dyn EquationOfState>,
    pub background: Background,
    /// Radii at which the perturbation is recorded; the last one is the surface.
    pub eval_radius: Vec<f64>,
    /// `(ξ, Δp)` at the first evaluation radius.
    pub initial_integration_vector: [f64; 2],
    /// Lowest background pressure the perturbation equations see.
    pub pressure_floor: f64,
    pub int_abs_tol: f64,
    pub int_rel_tol: f64,
    pub secant: Secant,
}

impl RadOscInput {
    /// Builds the input from the background profiles of a star with central pressure
    /// `central_pressure`, evaluating the perturbation on the profile radii.
    pub fn new(
        eos: Arc<dyn EquationOfState>,
        profiles: &InternalProfiles,
        central_pressure: f64,
        settings: &CentralRadOscInput,
    ) -> Result<Self, EngineError> {
        settings.validate()?;
        let background = Background::new(eos.as_ref(), profiles)?;
        let initial_integration_vector =
            settings.initial_integration_vector(eos.as_ref(), central_pressure);
        Ok(Self {
            eos,
            background,
            eval_radius: profiles.radial_coord.clone(),
            initial_integration_vector,
            pressure_floor: SURFACE_PRESSURE_RATIO * central_pressure,
            int_abs_tol: settings.int_abs_tol,
            int_rel_tol: settings.int_rel_tol,
            secant: settings.secant(),
        })
    }

    pub fn radial_interval(&self) -> (f64, f64) {
        let first = self.eval_radius.first().copied().unwrap_or(0.0);
        let last = self.eval_radius.last().copied().unwrap_or(0.0);
        (first, last)
    }
}

/// Perturbation profiles for one trial `ω²`.
#[derive(Debug, Clone, PartialEq)]
pub struct RadOscSolution {
    pub radii: Vec<f64>,
    pub xi: Vec<f64>,
    pub delta_p: Vec<f64>,
    /// Sign changes of `ξ` over the integration interval.
    pub nodes: usize,
}

impl RadOscSolution {
    pub fn last_state(&self) -> [f64; 2] {
        [
            self.xi.last().copied().unwrap_or(f64::NAN),
            self.delta_p.last().copied().unwrap_or(f64::NAN),
        ]
    }

    pub fn surface_delta_p(&self) -> f64 {
        self.last_state()[DELTA_P]
    }
}

/// Converged eigenfrequency of the fundamental radial mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Stability<T = RadOscSolution> {
    /// Squared frequency in km⁻²; negative values signal an unstable star.
    pub omega_squared: f64,
    pub mode: usize,
    pub iterations: usize,
    pub solution: T,
}

/// Right-hand side of the perturbation equations at radius `r`.
pub fn rad_osc_rhs(
    eos: &dyn EquationOfState,
    point: BackgroundPoint,
    omega_squared: f64,
    r: f64,
    y: &PerturbationState,
) -> PerturbationState {
    let (xi, delta_p) = (y[XI], y[DELTA_P]);
    let BackgroundPoint {
        time_metric_fn: nu,
        mass: m,
        pressure: p,
    } = point;

    let e = eos.energy_density_from(p);
    let bulk_modulus = eos.bulk_modulus_from(p);
    let exp_2lambda = (2.0 * radial_metric_fn(r, m)).exp();
    let dnu = time_metric_fn_derivative(r, p, m);

    let dxi = -(3.0 * xi + delta_p / bulk_modulus) / r + dnu * xi;
    let ddelta_p = r
        * (e + p)
        * (exp_2lambda * (omega_squared * (-2.0 * nu).exp() - 8.0 * PI * p * MEV_FM3_TO_KM_2)
            + dnu * (dnu + 4.0 / r))
        * xi
        - (dnu + 4.0 * PI * r * (e + p) * MEV_FM3_TO_KM_2 * exp_2lambda) * delta_p;

    PerturbationState::new(dxi, ddelta_p)
}

/// Shared inputs of one or more perturbation passes over the same star.
pub(crate) struct Perturbation<'a> {
    pub eos: &'a dyn EquationOfState,
    pub background: &'a Background,
    pub cache: &'a BackgroundCache,
    pub pressure_floor: f64,
    pub int_rel_tol: f64,
    pub int_abs_tol: f64,
}

impl Perturbation<'_> {
    /// Integrates from `eval_radius[0]` to its last entry, recording the state exactly
    /// at every evaluation radius.
    pub fn integrate(
        &self,
        omega_squared: f64,
        eval_radius: &[f64],
        initial: [f64; 2],
    ) -> Result<RadOscSolution, EngineError> {
        let (Some(&start), Some(&end)) = (eval_radius.first(), eval_radius.last()) else {
            return Err(EngineError::Internal("empty perturbation grid".into()));
        };

        let rhs = |r: f64, y: &PerturbationState| {
            let mut point = self
                .cache
                .get_or_insert_with(r, || self.background.at(r));
            point.pressure = point.pressure.max(self.pressure_floor);
            rad_osc_rhs(self.eos, point, omega_squared, r, y)
        };
        let nodes = [Event::new(|_r, y: &PerturbationState| y[XI])];
        let solver = Dop853::new(Tolerances::uniform(self.int_rel_tol, self.int_abs_tol));

        let solution = solver
            .integrate(
                &rhs,
                (start, end),
                PerturbationState::from(initial),
                Some(eval_radius),
                &nodes,
            )
            .map_err(|source| EngineError::Integration {
                stage: "radial oscillation",
                source,
            })?;

        Ok(RadOscSolution {
            xi: solution.component(XI),
            delta_p: solution.component(DELTA_P),
            nodes: solution.events[0].len(),
            radii: solution.t,
        })
    }
}

/// Integrates the perturbation equations for one trial `ω²`.
pub fn solve_rad_osc(input: &RadOscInput, omega_squared: f64) -> Result<RadOscSolution, EngineError> {
    let cache = BackgroundCache::new();
    perturbation(input, &cache).integrate(
        omega_squared,
        &input.eval_radius,
        input.initial_integration_vector,
    )
}

pub(crate) fn perturbation<'a>(
    input: &'a RadOscInput,
    cache: &'a BackgroundCache,
) -> Perturbation<'a> {
    Perturbation {
        eos: input.eos.as_ref(),
        background: &input.background,
        cache,
        pressure_floor: input.pressure_floor,
        int_rel_tol: input.int_rel_tol,
        int_abs_tol: input.int_abs_tol,
    }
}

/// Finds `ω²` such that `Δp` vanishes at the surface, starting from `omega_squared_guess`.
pub fn find_frequency(
    input: &RadOscInput,
    omega_squared_guess: f64,
) -> Result<Stability, EngineError> {
    let cache = BackgroundCache::new();
    let perturbation = perturbation(input, &cache);
    shoot(&input.secant, omega_squared_guess, |omega_squared| {
        let solution = perturbation.integrate(
            omega_squared,
            &input.eval_radius,
            input.initial_integration_vector,
        )?;
        Ok((solution.surface_delta_p(), solution.nodes, solution))
    })
}

/// Secant shooting on a residual that also yields a node count and a payload.
///
/// Only the residual steers the iteration; the objective is evaluated once more at the
/// converged root so the reported mode and payload belong to that exact `ω²`.
pub(crate) fn shoot<T, F>(
    secant: &Secant,
    omega_squared_guess: f64,
    objective: F,
) -> Result<Stability<T>, EngineError>
where
    F: Fn(f64) -> Result<(f64, usize, T), EngineError>,
{
    if !(omega_squared_guess != 0.0 && omega_squared_guess.is_finite()) {
        return Err(ConfigError::InvalidValue {
            name: "omega_squared_guess",
            value: omega_squared_guess,
        }
        .into());
    }
    let second_seed = omega_squared_guess + omega_squared_guess.abs() * SECOND_SEED_OFFSET;

    let RootResult {
        root, iterations, ..
    } = secant.solve(omega_squared_guess, second_seed, |omega_squared| {
        let (residual, nodes, _) = objective(omega_squared)?;
        debug!(omega_squared, residual, nodes, "Radial oscillation trial");
        Ok::<_, EngineError>(residual)
    })?;

    let (_, mode, solution) = objective(root)?;
    debug!(omega_squared = root, mode, iterations, "Eigenfrequency converged");

    Ok(Stability {
        omega_squared: root,
        mode,
        iterations,
        solution,
    })
}
