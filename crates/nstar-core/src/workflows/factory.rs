use crate::core::models::profiles::InternalProfiles;
use crate::core::models::star::{HybridStar, Star, StarRecord};
use crate::engine::config::{CentralRadOscInput, ConfigError, TovInput};
use crate::engine::error::EngineError;
use crate::engine::hybrid::{
    ConversionSpeed, HybridRadOscInput, Interface, find_hybrid_frequency, interface_event,
};
use crate::engine::stability::{RadOscInput, find_frequency};
use crate::engine::tov::{TovSolution, solve_tov};
use tracing::{debug, warn};

/// Turns a central pressure into one row of a stellar family.
pub trait CreateStar: Sync {
    type Output: StarRecord + Send;

    fn create(&self, central_pressure: f64) -> Result<Self::Output, EngineError>;
}

/// Structure only: radius and mass from the TOV equations.
#[derive(Debug, Clone)]
pub struct StarFactory {
    tov_input: TovInput,
}

impl StarFactory {
    pub fn new(tov_input: TovInput) -> Self {
        Self { tov_input }
    }

    pub fn tov_input(&self) -> &TovInput {
        &self.tov_input
    }

    pub fn solve(&self, central_pressure: f64) -> Result<TovSolution, EngineError> {
        let sound_speed_squared = self.tov_input.eos.sound_speed_squared_from(central_pressure);
        if sound_speed_squared > 1.0 {
            warn!(
                central_pressure,
                sound_speed_squared, "Equation of state is acausal at the centre"
            );
        }
        solve_tov(&self.tov_input, central_pressure)
    }

    pub fn create_star(&self, central_pressure: f64) -> Result<Star, EngineError> {
        let solution = self.solve(central_pressure)?;
        Ok(Star::new(central_pressure, solution.radius(), solution.mass()))
    }

    pub fn profiles(&self, central_pressure: f64) -> Result<InternalProfiles, EngineError> {
        self.solve(central_pressure)?.profiles()
    }
}

impl CreateStar for StarFactory {
    type Output = Star;

    fn create(&self, central_pressure: f64) -> Result<Star, EngineError> {
        self.create_star(central_pressure)
    }
}

/// Structure plus the fundamental radial mode.
#[derive(Debug, Clone)]
pub struct StarStabilityFactory {
    star: StarFactory,
    rad_osc: CentralRadOscInput,
    omega_squared_guess: f64,
}

impl StarStabilityFactory {
    pub fn new(
        tov_input: TovInput,
        rad_osc: CentralRadOscInput,
        omega_squared_guess: f64,
    ) -> Result<Self, ConfigError> {
        rad_osc.validate()?;
        check_guess(omega_squared_guess)?;
        Ok(Self {
            star: StarFactory::new(tov_input),
            rad_osc,
            omega_squared_guess,
        })
    }

    pub fn create_star(&self, central_pressure: f64) -> Result<Star, EngineError> {
        let (star, _) = self.solve(central_pressure)?;
        Ok(star)
    }

    /// Background and perturbation profiles of the converged mode.
    pub fn profiles(&self, central_pressure: f64) -> Result<InternalProfiles, EngineError> {
        let (_, profiles) = self.solve(central_pressure)?;
        Ok(profiles)
    }

    fn solve(&self, central_pressure: f64) -> Result<(Star, InternalProfiles), EngineError> {
        let solution = self.star.solve(central_pressure)?;
        let profiles = solution.profiles()?;
        let input = RadOscInput::new(
            self.star.tov_input.eos.clone(),
            &profiles,
            central_pressure,
            &self.rad_osc,
        )?;
        let stability = find_frequency(&input, self.omega_squared_guess)?;
        debug!(
            central_pressure,
            omega_squared = stability.omega_squared,
            mode = stability.mode,
            "Radial stability solved"
        );

        let star = Star::new(central_pressure, solution.radius(), solution.mass())
            .with_oscillation(stability.mode, stability.omega_squared);
        let profiles =
            profiles.with_perturbations(stability.solution.xi, stability.solution.delta_p)?;
        Ok((star, profiles))
    }
}

impl CreateStar for StarStabilityFactory {
    type Output = Star;

    fn create(&self, central_pressure: f64) -> Result<Star, EngineError> {
        self.create_star(central_pressure)
    }
}

/// Structure of a hybrid star, including the size of its core.
#[derive(Debug, Clone)]
pub struct HybridStarFactory {
    star: StarFactory,
    transitional_pressure: f64,
    interface_index: usize,
}

impl HybridStarFactory {
    /// Adds the interface event to `tov_input`. The equation of state must report a
    /// transitional pressure.
    pub fn new(mut tov_input: TovInput) -> Result<Self, ConfigError> {
        let transitional_pressure = tov_input
            .eos
            .transitional_pressure()
            .ok_or(ConfigError::NotHybrid)?;
        tov_input.events.push(interface_event(transitional_pressure));
        let interface_index = tov_input.events.len() - 1;
        Ok(Self {
            star: StarFactory::new(tov_input),
            transitional_pressure,
            interface_index,
        })
    }

    pub fn transitional_pressure(&self) -> f64 {
        self.transitional_pressure
    }

    pub fn solve(&self, central_pressure: f64) -> Result<(TovSolution, Interface), EngineError> {
        let solution = self.star.solve(central_pressure)?;
        let interface =
            Interface::from_tov(&solution, self.interface_index, self.transitional_pressure)?;
        Ok((solution, interface))
    }

    pub fn create_star(&self, central_pressure: f64) -> Result<HybridStar, EngineError> {
        let (solution, interface) = self.solve(central_pressure)?;
        Ok(HybridStar {
            star: Star::new(central_pressure, solution.radius(), solution.mass()),
            core_radius: interface.core_radius,
            core_mass: interface.core_mass,
        })
    }

    pub fn profiles(&self, central_pressure: f64) -> Result<InternalProfiles, EngineError> {
        let (solution, _) = self.solve(central_pressure)?;
        solution.profiles()
    }
}

impl CreateStar for HybridStarFactory {
    type Output = HybridStar;

    fn create(&self, central_pressure: f64) -> Result<HybridStar, EngineError> {
        self.create_star(central_pressure)
    }
}

/// Hybrid-star structure plus the fundamental radial mode with interface junction.
#[derive(Debug, Clone)]
pub struct HybridStarStabilityFactory {
    hybrid: HybridStarFactory,
    rad_osc: CentralRadOscInput,
    omega_squared_guess: f64,
    conversion: ConversionSpeed,
}

impl HybridStarStabilityFactory {
    pub fn new(
        tov_input: TovInput,
        rad_osc: CentralRadOscInput,
        omega_squared_guess: f64,
        conversion: ConversionSpeed,
    ) -> Result<Self, ConfigError> {
        rad_osc.validate()?;
        check_guess(omega_squared_guess)?;
        Ok(Self {
            hybrid: HybridStarFactory::new(tov_input)?,
            rad_osc,
            omega_squared_guess,
            conversion,
        })
    }

    pub fn create_star(&self, central_pressure: f64) -> Result<HybridStar, EngineError> {
        let (star, _) = self.solve(central_pressure)?;
        Ok(star)
    }

    pub fn profiles(&self, central_pressure: f64) -> Result<InternalProfiles, EngineError> {
        let (_, profiles) = self.solve(central_pressure)?;
        Ok(profiles)
    }

    fn solve(&self, central_pressure: f64) -> Result<(HybridStar, InternalProfiles), EngineError> {
        let (solution, interface) = self.hybrid.solve(central_pressure)?;
        let profiles = solution.profiles()?;
        let rad_osc = RadOscInput::new(
            self.hybrid.star.tov_input.eos.clone(),
            &profiles,
            central_pressure,
            &self.rad_osc,
        )?;
        let input = HybridRadOscInput::new(rad_osc, interface, self.conversion)?;
        let stability = find_hybrid_frequency(&input, self.omega_squared_guess)?;
        debug!(
            central_pressure,
            omega_squared = stability.omega_squared,
            mode = stability.mode,
            conversion = %self.conversion,
            "Hybrid radial stability solved"
        );

        let star = HybridStar {
            star: Star::new(central_pressure, solution.radius(), solution.mass())
                .with_oscillation(stability.mode, stability.omega_squared),
            core_radius: interface.core_radius,
            core_mass: interface.core_mass,
        };
        let (xi, delta_p) = stability.solution.on_eval_radius();
        Ok((star, profiles.with_perturbations(xi, delta_p)?))
    }
}

impl CreateStar for HybridStarStabilityFactory {
    type Output = HybridStar;

    fn create(&self, central_pressure: f64) -> Result<HybridStar, EngineError> {
        self.create_star(central_pressure)
    }
}

fn check_guess(omega_squared_guess: f64) -> Result<(), ConfigError> {
    if omega_squared_guess != 0.0 && omega_squared_guess.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            name: "omega_squared_guess",
            value: omega_squared_guess,
        })
    }
}
