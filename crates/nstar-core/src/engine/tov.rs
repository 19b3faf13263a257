//! Tolman-Oppenheimer-Volkoff integration.
//!
//! The state is `(ν, m, p)`: the time metric function, the enclosed mass in km and the
//! pressure in MeV fm⁻³. Integration starts from a fourth-order series at a small
//! radius and stops at the surface, where the pressure vanishes.

use super::config::{ConfigError, TovInput};
use super::error::EngineError;
use crate::core::eos::EquationOfState;
use crate::core::models::profiles::InternalProfiles;
use crate::core::numerics::integrator::{
    Dop853, Event, EventDirection, EventRecord, Solution, State, Stats, Termination, Tolerances,
};
use crate::core::units::MEV_FM3_TO_KM_2;
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub type TovState = State<3>;

pub const TIME_METRIC: usize = 0;
pub const MASS: usize = 1;
pub const PRESSURE: usize = 2;

/// `λ = -½ ln(1 - 2m/r)`.
#[inline]
pub fn radial_metric_fn(radius: f64, mass: f64) -> f64 {
    -0.5 * (1.0 - 2.0 * mass / radius).ln()
}

/// `dν/dr = (4π r p + m/r²)/(1 - 2m/r)`, with `p` converted to km⁻².
#[inline]
pub fn time_metric_fn_derivative(radius: f64, pressure: f64, mass: f64) -> f64 {
    (4.0 * PI * radius * pressure * MEV_FM3_TO_KM_2 + mass / (radius * radius))
        / (1.0 - 2.0 * mass / radius)
}

/// `dm/dr = 4π r² e`, with `e` converted to km⁻².
#[inline]
pub fn mass_derivative(radius: f64, energy_density: f64) -> f64 {
    4.0 * PI * radius * radius * energy_density * MEV_FM3_TO_KM_2
}

/// `dp/dr = -(e + p) dν/dr`.
#[inline]
pub fn pressure_derivative(energy_density: f64, pressure: f64, time_metric_fn_derivative: f64) -> f64 {
    -(energy_density + pressure) * time_metric_fn_derivative
}

pub fn tov_rhs(eos: &dyn EquationOfState, radius: f64, y: &TovState) -> TovState {
    let (mass, pressure) = (y[MASS], y[PRESSURE]);
    let energy_density = eos.energy_density_from(pressure);
    let dnu = time_metric_fn_derivative(radius, pressure, mass);
    TovState::new(
        dnu,
        mass_derivative(radius, energy_density),
        pressure_derivative(energy_density, pressure, dnu),
    )
}

/// Series expansion of `(ν, m, p)` about the centre, evaluated at `radius`.
pub fn central_state(eos: &dyn EquationOfState, central_pressure: f64, radius: f64) -> TovState {
    let k = MEV_FM3_TO_KM_2;
    let p0 = central_pressure;
    let e0 = eos.energy_density_from(p0);
    let bulk0 = eos.bulk_modulus_from(p0);

    let nu2 = 8.0 * PI / 3.0 * (e0 + 3.0 * p0) * k;
    let p2 = -4.0 * PI / 3.0 * (e0 + p0) * (e0 + 3.0 * p0) * k;
    let e2 = p2 * (e0 + p0) / bulk0;

    let nu4 = (4.0 * PI / 5.0 * (e2 + 5.0 * p2)
        + 64.0 * PI * PI / 9.0 * e0 * (e0 + 3.0 * p0) * k)
        * k;
    let p4 = (-2.0 * PI / 5.0 * (e0 + p0) * (e2 + 5.0 * p2)
        - 2.0 * PI / 3.0 * (e2 + p2) * (4.0 * p0)
        - 32.0 * PI * PI / 9.0 * e0 * (e0 + p0) * (e0 + 3.0 * p0) * k)
        * k;

    let r2 = radius * radius;
    let r4 = r2 * r2;
    TovState::new(
        0.5 * nu2 * r2 + 0.25 * nu4 * r4,
        4.0 * PI * radius * r2 * e0 / 3.0 * k,
        p0 + 0.5 * p2 * r2 + 0.25 * p4 * r4,
    )
}

pub type TovEventFn = dyn Fn(f64, &TovState) -> f64 + Send + Sync;

/// A zero crossing monitored during the TOV integration.
#[derive(Clone)]
pub struct TovEvent {
    name: &'static str,
    function: Arc<TovEventFn>,
    terminal: bool,
    direction: EventDirection,
}

impl TovEvent {
    pub fn new(
        name: &'static str,
        function: impl Fn(f64, &TovState) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            function: Arc::new(function),
            terminal: false,
            direction: EventDirection::Either,
        }
    }

    /// Fires where the pressure crosses `pressure`.
    pub fn pressure_level(name: &'static str, pressure: f64) -> Self {
        Self::new(name, move |_r, y| y[PRESSURE] - pressure)
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    pub fn direction(mut self, direction: EventDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn to_event(&self) -> Event<'_, 3> {
        let function = self.function.as_ref();
        let event = Event::new(move |r, y: &TovState| function(r, y)).direction(self.direction);
        if self.terminal { event.terminal() } else { event }
    }
}

impl fmt::Debug for TovEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TovEvent")
            .field("name", &self.name)
            .field("terminal", &self.terminal)
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct TovSolution {
    pub central_pressure: f64,
    /// Radii of every accepted step, ending at the surface.
    pub radii: Vec<f64>,
    pub states: Vec<TovState>,
    pub surface: EventRecord<3>,
    /// Crossings of the caller's events, in the order of [`TovInput::events`].
    pub events: Vec<Vec<EventRecord<3>>>,
    pub stats: Stats,
}

impl TovSolution {
    pub fn radius(&self) -> f64 {
        self.surface.t
    }

    pub fn mass(&self) -> f64 {
        self.surface.y[MASS]
    }

    /// First crossing of caller event `index`.
    pub fn first_crossing(&self, index: usize) -> Option<&EventRecord<3>> {
        self.events.get(index).and_then(|crossings| crossings.first())
    }

    pub fn component(&self, index: usize) -> Vec<f64> {
        self.states.iter().map(|y| y[index]).collect()
    }

    pub fn profiles(&self) -> Result<InternalProfiles, EngineError> {
        Ok(InternalProfiles::new(
            self.radii.clone(),
            self.component(TIME_METRIC),
            self.component(MASS),
            self.component(PRESSURE),
        )?)
    }
}

/// Integrates the TOV equations from the centre to the surface.
pub fn solve_tov(input: &TovInput, central_pressure: f64) -> Result<TovSolution, EngineError> {
    if !(central_pressure > 0.0 && central_pressure.is_finite()) {
        return Err(ConfigError::InvalidCentralPressure(central_pressure).into());
    }

    let eos = input.eos.as_ref();
    let y0 = central_state(eos, central_pressure, input.min_radius);

    let surface = Event::new(|_r, y: &TovState| y[PRESSURE])
        .terminal()
        .direction(EventDirection::Falling);
    let events: Vec<Event<'_, 3>> = std::iter::once(surface)
        .chain(input.events.iter().map(TovEvent::to_event))
        .collect();

    let solver = Dop853::new(Tolerances::new(
        input.relative_tolerance,
        input.absolute_tolerance,
    ))
    .with_max_steps(input.max_steps);

    let rhs = |r: f64, y: &TovState| tov_rhs(eos, r, y);
    let Solution {
        t,
        y,
        mut events,
        termination,
        stats,
    } = solver
        .integrate(&rhs, (input.min_radius, input.max_radius), y0, None, &events)
        .map_err(|source| EngineError::Integration {
            stage: "TOV",
            source,
        })?;

    if termination != Termination::Event(0) {
        return Err(EngineError::BoundaryNotFound {
            central_pressure,
            max_radius: input.max_radius,
        });
    }
    let surface = events
        .first()
        .and_then(|crossings| crossings.last())
        .copied()
        .ok_or_else(|| EngineError::Internal("surface event fired without a record".into()))?;
    events.remove(0);

    debug!(
        central_pressure,
        radius = surface.t,
        mass = surface.y[MASS],
        steps = stats.accepted_steps,
        rejected = stats.rejected_steps,
        "TOV integration reached the surface"
    );

    Ok(TovSolution {
        central_pressure,
        radii: t,
        states: y,
        surface,
        events,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::eos::{BpsFit, HybridEos, MasslessMitBag};

    fn mit_input() -> TovInput {
        TovInput::builder()
            .eos(Arc::new(MasslessMitBag::default()))
            .build()
            .unwrap()
    }

    #[test]
    fn metric_functions_vanish_in_flat_space() {
        assert_eq!(radial_metric_fn(10.0, 0.0), 0.0);
        assert_eq!(time_metric_fn_derivative(10.0, 0.0, 0.0), 0.0);
        assert!((radial_metric_fn(10.0, 2.5) - 0.5 * 2f64.ln()).abs() < 1e-15);
    }

    #[test]
    fn central_series_starts_at_central_pressure() {
        let eos = MasslessMitBag::default();
        let y = central_state(&eos, 300.0, 1e-6);
        assert!(y[TIME_METRIC] > 0.0);
        assert!(y[MASS] > 0.0);
        assert!(y[PRESSURE] <= 300.0);
        assert!((y[PRESSURE] - 300.0).abs() < 1e-9);
    }

    #[test]
    fn mit_bag_star_has_expected_radius_and_mass() {
        let solution = solve_tov(&mit_input(), 300.0).unwrap();
        assert!((solution.radius() - 10.9557).abs() < 1e-2);
        assert!((solution.mass() - 2.9746).abs() < 1e-2);
        let surface_pressure = solution.surface.y[PRESSURE];
        assert!(surface_pressure.abs() < 1e-8);
        assert_eq!(solution.radii.last().copied(), Some(solution.radius()));
        assert!(solution.radii.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn pressure_decreases_outwards() {
        let solution = solve_tov(&mit_input(), 300.0).unwrap();
        let pressures = solution.component(PRESSURE);
        assert!(pressures.windows(2).all(|w| w[1] < w[0]));
        let masses = solution.component(MASS);
        assert!(masses.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn rejects_non_positive_central_pressure() {
        for p in [0.0, -1.0, f64::NAN] {
            let result = solve_tov(&mit_input(), p);
            assert!(matches!(
                result,
                Err(EngineError::Config(ConfigError::InvalidCentralPressure(_)))
            ));
        }
    }

    #[test]
    fn reports_missing_surface() {
        let input = TovInput::builder()
            .eos(Arc::new(MasslessMitBag::default()))
            .max_radius(5.0)
            .build()
            .unwrap();
        let result = solve_tov(&input, 300.0);
        assert!(matches!(result, Err(EngineError::BoundaryNotFound { .. })));
    }

    #[test]
    fn records_interface_crossing_of_hybrid_star() {
        let transition = 4.7e-4;
        let eos = HybridEos::new(
            Arc::new(BpsFit::default()),
            Arc::new(MasslessMitBag::default()),
            transition,
        )
        .unwrap();
        let input = TovInput::builder()
            .eos(Arc::new(eos))
            .event(TovEvent::pressure_level("interface", transition))
            .build()
            .unwrap();
        let solution = solve_tov(&input, 5e-4).unwrap();
        let interface = solution.first_crossing(0).unwrap();
        assert!((interface.y[PRESSURE] - transition).abs() < 1e-12);
        assert!(interface.t < solution.radius());
        assert!(solution.radii.contains(&interface.t));
        assert!((solution.radius() - 423.1514).abs() < 1e-3);
        assert!((solution.mass() - 1.035_343).abs() < 1e-5);
    }

    #[test]
    fn hybrid_interface_matches_the_pure_quark_star() {
        // Inside the core a hybrid star is a pure bag star, so both must cross the
        // transition pressure at the same radius with the same enclosed mass.
        let (transition, central_pressure) = (4.7e-4, 5e-4);
        let level = || TovEvent::pressure_level("interface", transition);
        let hybrid = TovInput::builder()
            .eos(Arc::new(
                HybridEos::new(
                    Arc::new(BpsFit::default()),
                    Arc::new(MasslessMitBag::default()),
                    transition,
                )
                .unwrap(),
            ))
            .event(level())
            .build()
            .unwrap();
        let quark = TovInput::builder()
            .eos(Arc::new(MasslessMitBag::default()))
            .event(level())
            .build()
            .unwrap();

        let hybrid = *solve_tov(&hybrid, central_pressure).unwrap().first_crossing(0).unwrap();
        let quark = *solve_tov(&quark, central_pressure).unwrap().first_crossing(0).unwrap();
        assert!((hybrid.t - quark.t).abs() < 1e-9);
        assert!((hybrid.y[MASS] / quark.y[MASS] - 1.0).abs() < 1e-6);

        // Leading order of the central series: p(r) ≈ p_c - (2π/3)(e + p)(e + 3p) r².
        let e = 4.0 * 57.0 + 3.0 * central_pressure;
        let curvature = 2.0 * PI / 3.0
            * (e + central_pressure)
            * (e + 3.0 * central_pressure)
            * MEV_FM3_TO_KM_2;
        let series = ((central_pressure - transition) / curvature).sqrt();
        assert!((hybrid.t - series).abs() < 1e-8);
        assert!((hybrid.t - 0.014_426_97).abs() < 1e-8);
    }

    #[test]
    fn profiles_match_schwarzschild_at_surface() {
        let solution = solve_tov(&mit_input(), 300.0).unwrap();
        let profiles = solution.profiles().unwrap();
        let nu_surface = profiles.time_metric_fn.last().copied().unwrap();
        let expected = -radial_metric_fn(solution.radius(), solution.mass());
        assert!((nu_surface - expected).abs() < 1e-12);
        assert_eq!(profiles.len(), solution.radii.len());
    }
}
