//! Hybrid stars: a quark core inside a hadronic envelope, joined at the pressure `p_t`
//! of a first-order phase transition.
//!
//! The perturbation is integrated in two passes, centre to interface and interface to
//! surface. `Δp` is continuous across the interface. `ξ` is continuous when the phase
//! conversion is slow; a rapid conversion moves the interface with the fluid and `ξ`
//! jumps by an amount fixed by the pressure gradients on both sides.
//!
//! Each pass sees only its own phase: pressures on the far side of `p_t` are pinned to
//! the interface, so a step that overshoots the interface never samples the other
//! phase's stiffness.

use super::cache::BackgroundCache;
use super::error::EngineError;
use super::stability::{
    Perturbation, RadOscInput, RadOscSolution, Stability, perturbation, shoot,
};
use super::tov::{MASS, TovEvent, TovSolution, pressure_derivative, time_metric_fn_derivative};
use crate::core::eos::EquationOfState;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

pub const INTERFACE_EVENT: &str = "interface";

/// Relative pressure offset used to sample the core side of the energy-density jump.
const CORE_SIDE_OFFSET: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionSpeed {
    #[default]
    Slow,
    Rapid,
}

impl fmt::Display for ConversionSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slow => write!(f, "slow"),
            Self::Rapid => write!(f, "rapid"),
        }
    }
}

/// Non-terminal TOV event at the phase-transition pressure.
pub fn interface_event(transitional_pressure: f64) -> TovEvent {
    TovEvent::pressure_level(INTERFACE_EVENT, transitional_pressure)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interface {
    pub core_radius: f64,
    pub core_mass: f64,
    pub transitional_pressure: f64,
}

impl Interface {
    /// Reads the first crossing of caller event `event_index` of `solution`.
    pub fn from_tov(
        solution: &TovSolution,
        event_index: usize,
        transitional_pressure: f64,
    ) -> Result<Self, EngineError> {
        let crossing = solution.first_crossing(event_index).ok_or(
            EngineError::InterfaceNotFound {
                central_pressure: solution.central_pressure,
                transitional_pressure,
            },
        )?;
        Ok(Self {
            core_radius: crossing.t,
            core_mass: crossing.y[MASS],
            transitional_pressure,
        })
    }

    /// `(dp/dr on the envelope side, dp/dr on the core side)` at the interface.
    fn pressure_gradients(&self, eos: &dyn EquationOfState) -> (f64, f64) {
        let p_t = self.transitional_pressure;
        let dnu = time_metric_fn_derivative(self.core_radius, p_t, self.core_mass);
        let envelope = eos.energy_density_from(p_t);
        let core = eos.energy_density_from(p_t * (1.0 + CORE_SIDE_OFFSET));
        (
            pressure_derivative(envelope, p_t, dnu),
            pressure_derivative(core, p_t, dnu),
        )
    }
}

/// One phase of a hybrid equation of state, seen from its side of the interface.
#[derive(Debug)]
struct PhaseSide<'a> {
    eos: &'a dyn EquationOfState,
    min_pressure: f64,
    max_pressure: f64,
}

impl<'a> PhaseSide<'a> {
    fn core(eos: &'a dyn EquationOfState, transitional_pressure: f64) -> Self {
        Self {
            eos,
            min_pressure: transitional_pressure * (1.0 + CORE_SIDE_OFFSET),
            max_pressure: f64::INFINITY,
        }
    }

    fn envelope(eos: &'a dyn EquationOfState, transitional_pressure: f64) -> Self {
        Self {
            eos,
            min_pressure: f64::NEG_INFINITY,
            max_pressure: transitional_pressure,
        }
    }

    fn pin(&self, pressure: f64) -> f64 {
        pressure.clamp(self.min_pressure, self.max_pressure)
    }
}

impl EquationOfState for PhaseSide<'_> {
    fn energy_density_from(&self, pressure: f64) -> f64 {
        self.eos.energy_density_from(self.pin(pressure))
    }

    fn sound_speed_squared_from(&self, pressure: f64) -> f64 {
        self.eos.sound_speed_squared_from(self.pin(pressure))
    }

    fn adiabatic_index_from(&self, pressure: f64) -> f64 {
        self.eos.adiabatic_index_from(self.pin(pressure))
    }

    fn bulk_modulus_from(&self, pressure: f64) -> f64 {
        self.eos.bulk_modulus_from(self.pin(pressure))
    }
}

/// Jump of `ξ` across the interface for a rapid phase conversion.
pub fn rapid_conversion_jump(eos: &dyn EquationOfState, interface: &Interface, delta_p: f64) -> f64 {
    let (envelope, core) = interface.pressure_gradients(eos);
    delta_p / interface.core_radius * (1.0 / envelope - 1.0 / core)
}

/// Maps `(ξ, Δp)` just inside the interface to the values just outside.
pub fn lagrangian_vars_at_interface(
    eos: &dyn EquationOfState,
    interface: &Interface,
    speed: ConversionSpeed,
    [xi, delta_p]: [f64; 2],
) -> [f64; 2] {
    match speed {
        ConversionSpeed::Slow => [xi, delta_p],
        ConversionSpeed::Rapid => [xi + rapid_conversion_jump(eos, interface, delta_p), delta_p],
    }
}

#[derive(Debug)]
pub struct HybridRadOscInput {
    pub rad_osc: RadOscInput,
    pub interface: Interface,
    pub conversion: ConversionSpeed,
    core_radius: Vec<f64>,
    envelope_radius: Vec<f64>,
    interface_on_grid: bool,
}

impl HybridRadOscInput {
    /// Splits the evaluation radii of `rad_osc` at the core radius, which closes the
    /// first pass and opens the second.
    pub fn new(
        rad_osc: RadOscInput,
        interface: Interface,
        conversion: ConversionSpeed,
    ) -> Result<Self, EngineError> {
        let r_c = interface.core_radius;
        let (start, end) = rad_osc.radial_interval();
        if !(r_c > start && r_c < end) {
            return Err(EngineError::Internal(format!(
                "core radius {r_c} km lies outside the perturbation interval [{start}, {end}] km"
            )));
        }

        let mut core_radius: Vec<f64> = rad_osc
            .eval_radius
            .iter()
            .copied()
            .filter(|&r| r < r_c)
            .collect();
        core_radius.push(r_c);
        let envelope_radius: Vec<f64> = std::iter::once(r_c)
            .chain(rad_osc.eval_radius.iter().copied().filter(|&r| r > r_c))
            .collect();
        let interface_on_grid = rad_osc.eval_radius.contains(&r_c);

        Ok(Self {
            rad_osc,
            interface,
            conversion,
            core_radius,
            envelope_radius,
            interface_on_grid,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HybridRadOscSolution {
    /// Centre to interface.
    pub core: RadOscSolution,
    /// Interface to surface, starting from the matched state.
    pub envelope: RadOscSolution,
    interface_on_grid: bool,
}

impl HybridRadOscSolution {
    /// Sign changes of `ξ` inside the core plus those inside the envelope. A rapid
    /// conversion may flip the sign of `ξ` relative to the core within the envelope,
    /// which then counts as a node like any other.
    pub fn nodes(&self) -> usize {
        self.core.nodes + self.envelope.nodes
    }

    pub fn surface_delta_p(&self) -> f64 {
        self.envelope.surface_delta_p()
    }

    /// `(ξ, Δp)` on the evaluation radii of the background. At the interface the
    /// envelope-side value is reported.
    pub fn on_eval_radius(&self) -> (Vec<f64>, Vec<f64>) {
        let core_len = self.core.radii.len().saturating_sub(1);
        let skip = usize::from(!self.interface_on_grid);
        let join = |core: &[f64], envelope: &[f64]| -> Vec<f64> {
            core[..core_len]
                .iter()
                .chain(&envelope[skip..])
                .copied()
                .collect()
        };
        (
            join(&self.core.xi, &self.envelope.xi),
            join(&self.core.delta_p, &self.envelope.delta_p),
        )
    }
}

pub fn solve_hybrid_rad_osc(
    input: &HybridRadOscInput,
    omega_squared: f64,
) -> Result<HybridRadOscSolution, EngineError> {
    let cache = BackgroundCache::new();
    two_pass(input, &cache, omega_squared)
}

fn two_pass(
    input: &HybridRadOscInput,
    cache: &BackgroundCache,
    omega_squared: f64,
) -> Result<HybridRadOscSolution, EngineError> {
    let rad_osc = &input.rad_osc;
    let eos = rad_osc.eos.as_ref();
    let p_t = input.interface.transitional_pressure;
    let core_side = PhaseSide::core(eos, p_t);
    let envelope_side = PhaseSide::envelope(eos, p_t);

    let core = Perturbation {
        eos: &core_side,
        ..perturbation(rad_osc, cache)
    }
    .integrate(
        omega_squared,
        &input.core_radius,
        rad_osc.initial_integration_vector,
    )?;
    let matched =
        lagrangian_vars_at_interface(eos, &input.interface, input.conversion, core.last_state());
    let envelope = Perturbation {
        eos: &envelope_side,
        ..perturbation(rad_osc, cache)
    }
    .integrate(omega_squared, &input.envelope_radius, matched)?;

    Ok(HybridRadOscSolution {
        core,
        envelope,
        interface_on_grid: input.interface_on_grid,
    })
}

/// Finds the `ω²` nearest the guess with the interface junction applied on every
/// trial.
pub fn find_hybrid_frequency(
    input: &HybridRadOscInput,
    omega_squared_guess: f64,
) -> Result<Stability<HybridRadOscSolution>, EngineError> {
    debug!(
        core_radius = input.interface.core_radius,
        conversion = %input.conversion,
        "Shooting across the phase-transition interface"
    );
    let cache = BackgroundCache::new();
    shoot(&input.rad_osc.secant, omega_squared_guess, |omega_squared| {
        let solution = two_pass(input, &cache, omega_squared)?;
        Ok((solution.surface_delta_p(), solution.nodes(), solution))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::eos::{BpsFit, HybridEos, MasslessMitBag};
    use crate::engine::config::{CentralRadOscInput, TovInput};
    use crate::engine::tov::{mass_derivative, solve_tov};
    use std::sync::Arc;

    const TRANSITION: f64 = 4.7e-4;
    const GUESS: f64 = -4.9e-8;

    fn hybrid_eos() -> Arc<dyn EquationOfState> {
        Arc::new(
            HybridEos::new(
                Arc::new(BpsFit::default()),
                Arc::new(MasslessMitBag::default()),
                TRANSITION,
            )
            .unwrap(),
        )
    }

    fn hybrid_input(central_pressure: f64, conversion: ConversionSpeed) -> HybridRadOscInput {
        let eos = hybrid_eos();
        let tov = TovInput::builder()
            .eos(eos.clone())
            .event(interface_event(TRANSITION))
            .build()
            .unwrap();
        let solution = solve_tov(&tov, central_pressure).unwrap();
        let interface = Interface::from_tov(&solution, 0, TRANSITION).unwrap();
        let rad_osc = RadOscInput::new(
            eos,
            &solution.profiles().unwrap(),
            central_pressure,
            &CentralRadOscInput::default(),
        )
        .unwrap();
        HybridRadOscInput::new(rad_osc, interface, conversion).unwrap()
    }

    #[test]
    fn interface_sits_inside_the_star() {
        let input = hybrid_input(5e-4, ConversionSpeed::Slow);
        assert!((input.interface.core_radius - 0.014_426_970).abs() < 1e-8);
        assert!((input.interface.core_mass - 3.796_513e-9).abs() < 1e-14);
        assert_eq!(input.core_radius.last(), input.envelope_radius.first());
        assert!(input.interface_on_grid);
        assert_eq!(
            input.core_radius.len() + input.envelope_radius.len(),
            input.rad_osc.eval_radius.len() + 1
        );
    }

    #[test]
    fn background_keeps_the_density_jump_at_the_interface() {
        let input = hybrid_input(5e-4, ConversionSpeed::Slow);
        let eos = input.rad_osc.eos.as_ref();
        let r_c = input.interface.core_radius;
        let h = 1e-7;
        let mass = |r: f64| input.rad_osc.background.at(r).mass;
        let inside = (3.0 * mass(r_c) - 4.0 * mass(r_c - h) + mass(r_c - 2.0 * h)) / (2.0 * h);
        let outside = (-3.0 * mass(r_c) + 4.0 * mass(r_c + h) - mass(r_c + 2.0 * h)) / (2.0 * h);

        let core_e = eos.energy_density_from(TRANSITION * (1.0 + CORE_SIDE_OFFSET));
        let envelope_e = eos.energy_density_from(TRANSITION);
        assert!((inside / mass_derivative(r_c, core_e) - 1.0).abs() < 1e-4);
        assert!((outside / mass_derivative(r_c, envelope_e) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn slow_conversion_keeps_displacement_continuous() {
        let input = hybrid_input(5e-4, ConversionSpeed::Slow);
        let solution = solve_hybrid_rad_osc(&input, GUESS).unwrap();
        assert_eq!(solution.core.last_state(), [
            solution.envelope.xi[0],
            solution.envelope.delta_p[0]
        ]);
        let (xi, delta_p) = solution.on_eval_radius();
        assert_eq!(xi.len(), input.rad_osc.eval_radius.len());
        assert_eq!(delta_p.len(), input.rad_osc.eval_radius.len());
    }

    #[test]
    fn displacement_stays_of_order_one_inside_the_core() {
        for speed in [ConversionSpeed::Slow, ConversionSpeed::Rapid] {
            let input = hybrid_input(5e-4, speed);
            let solution = solve_hybrid_rad_osc(&input, GUESS).unwrap();
            assert_eq!(solution.core.nodes, 0);
            for xi in &solution.core.xi {
                assert!((xi - 1.0).abs() < 1e-2, "core xi = {xi}");
            }
        }
    }

    #[test]
    fn rapid_conversion_shifts_only_displacement() {
        let input = hybrid_input(5e-4, ConversionSpeed::Rapid);
        let eos = input.rad_osc.eos.as_ref();
        let [xi, delta_p] =
            lagrangian_vars_at_interface(eos, &input.interface, ConversionSpeed::Rapid, [1.0, -2.0]);
        assert_eq!(delta_p, -2.0);
        let expected = 1.0 + rapid_conversion_jump(eos, &input.interface, -2.0);
        assert_eq!(xi, expected);
        assert_ne!(xi, 1.0);
    }

    #[test]
    fn slow_hybrid_star_is_unstable_in_its_fundamental_mode() {
        let input = hybrid_input(5e-4, ConversionSpeed::Slow);
        let stability = find_hybrid_frequency(&input, GUESS).unwrap();
        assert!((stability.omega_squared - -4.3076e-8).abs() < 1e-11);
        assert_eq!(stability.mode, 0);
        assert_eq!(stability.mode, stability.solution.nodes());
    }

    #[test]
    fn rapid_root_near_the_slow_frequency_carries_one_envelope_node() {
        let input = hybrid_input(5e-4, ConversionSpeed::Rapid);
        let stability = find_hybrid_frequency(&input, GUESS).unwrap();
        assert!((stability.omega_squared - -4.2940e-8).abs() < 1e-11);
        assert_eq!(stability.mode, 1);

        let solution = &stability.solution;
        assert_eq!((solution.core.nodes, solution.envelope.nodes), (0, 1));
        // Δp changes sign between the interface and the surface as well, so the node
        // belongs to the eigenfunction and not to the surface layer.
        assert!(solution.core.delta_p.iter().all(|&dp| dp < 0.0));
        assert!(solution.envelope.delta_p.iter().any(|&dp| dp > 0.0));
        assert!(solution.envelope.last_state()[0] < 0.0);
    }

    #[test]
    fn rapid_conversion_shifts_the_frequency_of_a_larger_core() {
        let slow = find_hybrid_frequency(&hybrid_input(3e-3, ConversionSpeed::Slow), GUESS).unwrap();
        let rapid =
            find_hybrid_frequency(&hybrid_input(3e-3, ConversionSpeed::Rapid), GUESS).unwrap();
        assert!((slow.omega_squared - -4.2730e-8).abs() < 1e-11);
        assert!((rapid.omega_squared - -4.1493e-8).abs() < 1e-11);
        assert!(rapid.omega_squared - slow.omega_squared > 1e-9);
    }

    #[test]
    fn missing_crossing_is_reported() {
        let tov = TovInput::builder().eos(hybrid_eos()).build().unwrap();
        let solution = solve_tov(&tov, 5e-4).unwrap();
        assert!(matches!(
            Interface::from_tov(&solution, 0, TRANSITION),
            Err(EngineError::InterfaceNotFound { .. })
        ));
    }

    #[test]
    fn conversion_speed_parses_lowercase() {
        let speed: ConversionSpeed = parse_speed("rapid");
        assert_eq!(speed, ConversionSpeed::Rapid);
        assert_eq!(ConversionSpeed::default().to_string(), "slow");
    }

    fn parse_speed(value: &str) -> ConversionSpeed {
        use serde::de::IntoDeserializer;
        use serde::de::value::{Error, StrDeserializer};
        let deserializer: StrDeserializer<'_, Error> = value.into_deserializer();
        ConversionSpeed::deserialize(deserializer).unwrap()
    }
}
