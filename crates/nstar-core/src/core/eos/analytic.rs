use super::{EosError, EquationOfState};
use crate::core::units::MEV_FM3_TO_MEV4;
use serde::{Deserialize, Serialize};

/// Analytic fit of the Baym-Pethick-Sutherland outer crust,
/// `e = 10^(a + b sqrt(1 + c (d + log10 p)²))` with `p` and `e` in MeV⁴.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BpsFit {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Default for BpsFit {
    fn default() -> Self {
        Self {
            a: -15.8306,
            b: 11.2974,
            c: 0.00664824,
            d: 16.9824,
        }
    }
}

impl BpsFit {
    #[inline]
    fn log_pressure(&self, pressure: f64) -> f64 {
        self.d + (pressure.abs() * MEV_FM3_TO_MEV4).log10()
    }

    #[inline]
    fn root(&self, log_pressure: f64) -> f64 {
        (1.0 + self.c * log_pressure * log_pressure).sqrt()
    }

    fn energy_density_mev4(&self, pressure: f64) -> f64 {
        10f64.powf(self.a + self.b * self.root(self.log_pressure(pressure)))
    }
}

impl EquationOfState for BpsFit {
    fn energy_density_from(&self, pressure: f64) -> f64 {
        self.energy_density_mev4(pressure) / MEV_FM3_TO_MEV4
    }

    fn sound_speed_squared_from(&self, pressure: f64) -> f64 {
        let p = pressure.abs() * MEV_FM3_TO_MEV4;
        let x = self.log_pressure(pressure);
        p * self.root(x) / (self.energy_density_mev4(pressure) * self.b * self.c * x)
    }

    fn bulk_modulus_from(&self, pressure: f64) -> f64 {
        (self.energy_density_from(pressure) + pressure) * self.sound_speed_squared_from(pressure)
    }
}

/// Massless quarks confined by a bag constant: `e = 3p + 4B`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MasslessMitBag {
    /// Bag pressure `B` in MeV fm⁻³.
    pub bag_pressure: f64,
}

impl Default for MasslessMitBag {
    fn default() -> Self {
        Self { bag_pressure: 57.0 }
    }
}

impl MasslessMitBag {
    pub fn new(bag_pressure: f64) -> Self {
        Self { bag_pressure }
    }
}

impl EquationOfState for MasslessMitBag {
    fn energy_density_from(&self, pressure: f64) -> f64 {
        3.0 * pressure + 4.0 * self.bag_pressure
    }

    fn sound_speed_squared_from(&self, _pressure: f64) -> f64 {
        1.0 / 3.0
    }

    /// `4/3 (1 + B/p)`, infinite at the bag surface.
    fn adiabatic_index_from(&self, pressure: f64) -> f64 {
        if pressure == 0.0 {
            return f64::INFINITY;
        }
        4.0 / 3.0 * (1.0 + self.bag_pressure / pressure)
    }

    fn bulk_modulus_from(&self, pressure: f64) -> f64 {
        4.0 / 3.0 * (pressure + self.bag_pressure)
    }
}

/// Constant-sound-speed parameterisation above a transition:
/// `e = e_t + Δe + (p - p_t)/c_s²`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantSoundSpeed {
    pub transitional_energy_density: f64,
    pub energy_density_jump: f64,
    pub sound_speed_squared: f64,
    pub transitional_pressure: f64,
}

impl ConstantSoundSpeed {
    pub fn new(
        transitional_energy_density: f64,
        energy_density_jump: f64,
        sound_speed_squared: f64,
        transitional_pressure: f64,
    ) -> Result<Self, EosError> {
        if !(sound_speed_squared > 0.0 && sound_speed_squared <= 1.0) {
            return Err(EosError::InvalidParameter {
                name: "sound_speed_squared",
                value: sound_speed_squared,
                reason: "must lie in (0, 1]",
            });
        }
        if !(energy_density_jump >= 0.0) {
            return Err(EosError::InvalidParameter {
                name: "energy_density_jump",
                value: energy_density_jump,
                reason: "must be non-negative",
            });
        }
        if !(transitional_energy_density >= 0.0) {
            return Err(EosError::InvalidParameter {
                name: "transitional_energy_density",
                value: transitional_energy_density,
                reason: "must be non-negative",
            });
        }
        Ok(Self {
            transitional_energy_density,
            energy_density_jump,
            sound_speed_squared,
            transitional_pressure,
        })
    }
}

impl EquationOfState for ConstantSoundSpeed {
    fn energy_density_from(&self, pressure: f64) -> f64 {
        self.transitional_energy_density
            + self.energy_density_jump
            + (pressure - self.transitional_pressure) / self.sound_speed_squared
    }

    fn sound_speed_squared_from(&self, _pressure: f64) -> f64 {
        self.sound_speed_squared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::eos::check_causality;

    fn relative_eq(a: f64, b: f64, tol: f64) -> bool {
        ((a - b) / b).abs() < tol
    }

    #[test]
    fn bps_energy_density_near_neutron_drip() {
        let eos = BpsFit::default();
        assert!(relative_eq(eos.energy_density_from(4.47e-4), 0.201_07, 1e-3));
    }

    #[test]
    fn bps_sound_speed_matches_finite_difference() {
        let eos = BpsFit::default();
        for p in [1e-8, 1e-5, 4.47e-4, 1e-1] {
            let analytic = eos.sound_speed_squared_from(p);
            let numeric = super::super::fallback::sound_speed_squared(&eos, p);
            assert!(relative_eq(analytic, numeric, 1e-6), "p = {p}");
        }
    }

    #[test]
    fn bps_adiabatic_index_and_bulk_modulus_agree() {
        let eos = BpsFit::default();
        let p = 4.47e-4;
        assert!(relative_eq(eos.adiabatic_index_from(p), 1.2676, 1e-3));
        assert!(relative_eq(
            eos.bulk_modulus_from(p),
            p * eos.adiabatic_index_from(p),
            1e-12
        ));
    }

    #[test]
    fn bps_is_causal_and_positive_over_crust() {
        let eos = BpsFit::default();
        let pressures = [1e-10, 1e-8, 1e-6, 1e-4, 1e-2, 1e-1];
        assert!(check_causality(&eos, pressures).is_ok());
        assert!(pressures.iter().all(|&p| eos.energy_density_from(p) > 0.0));
    }

    #[test]
    fn mit_bag_closed_forms() {
        let eos = MasslessMitBag::default();
        assert_eq!(eos.energy_density_from(4.47e-4), 3.0 * 4.47e-4 + 228.0);
        assert!(relative_eq(eos.adiabatic_index_from(4.47e-4), 170_023.704_697_986_54, 1e-12));
        assert_eq!(eos.sound_speed_squared_from(10.0), 1.0 / 3.0);
    }

    #[test]
    fn mit_bag_bulk_modulus_is_finite_at_surface() {
        let eos = MasslessMitBag::default();
        assert!(eos.adiabatic_index_from(0.0).is_infinite());
        assert!((eos.bulk_modulus_from(0.0) - 76.0).abs() < 1e-12);
        let p = 120.0;
        assert!(relative_eq(eos.bulk_modulus_from(p), p * eos.adiabatic_index_from(p), 1e-14));
    }

    #[test]
    fn css_energy_density_is_linear_in_pressure() {
        let eos = ConstantSoundSpeed::new(450.0, 100.0, 0.5, 20.0).unwrap();
        assert_eq!(eos.energy_density_from(20.0), 550.0);
        assert_eq!(eos.energy_density_from(3.0), 550.0 - 17.0 / 0.5);
        assert!(eos.energy_density_from(3.0) > 3.0);
        assert_eq!(eos.sound_speed_squared_from(3.0), 0.5);
        assert!(eos.adiabatic_index_from(3.0).is_finite());
    }

    #[test]
    fn css_rejects_invalid_parameters() {
        assert!(matches!(
            ConstantSoundSpeed::new(450.0, 100.0, 1.5, 20.0),
            Err(EosError::InvalidParameter {
                name: "sound_speed_squared",
                ..
            })
        ));
        assert!(matches!(
            ConstantSoundSpeed::new(450.0, -1.0, 0.5, 20.0),
            Err(EosError::InvalidParameter {
                name: "energy_density_jump",
                ..
            })
        ));
    }
}
