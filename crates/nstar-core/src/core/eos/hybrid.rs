use super::{EosError, EquationOfState};
use std::sync::Arc;

/// Maxwell construction: `low` up to and including the transitional pressure, `high`
/// above it. The energy density jumps at the transition.
#[derive(Debug, Clone)]
pub struct HybridEos {
    low: Arc<dyn EquationOfState>,
    high: Arc<dyn EquationOfState>,
    transitional_pressure: f64,
}

impl HybridEos {
    pub fn new(
        low: Arc<dyn EquationOfState>,
        high: Arc<dyn EquationOfState>,
        transitional_pressure: f64,
    ) -> Result<Self, EosError> {
        if !(transitional_pressure > 0.0 && transitional_pressure.is_finite()) {
            return Err(EosError::InvalidParameter {
                name: "transitional_pressure",
                value: transitional_pressure,
                reason: "must be positive and finite",
            });
        }
        Ok(Self {
            low,
            high,
            transitional_pressure,
        })
    }

    #[inline]
    fn phase(&self, pressure: f64) -> &dyn EquationOfState {
        if pressure <= self.transitional_pressure {
            self.low.as_ref()
        } else {
            self.high.as_ref()
        }
    }
}

impl EquationOfState for HybridEos {
    fn energy_density_from(&self, pressure: f64) -> f64 {
        self.phase(pressure).energy_density_from(pressure)
    }

    fn sound_speed_squared_from(&self, pressure: f64) -> f64 {
        self.phase(pressure).sound_speed_squared_from(pressure)
    }

    fn adiabatic_index_from(&self, pressure: f64) -> f64 {
        self.phase(pressure).adiabatic_index_from(pressure)
    }

    fn bulk_modulus_from(&self, pressure: f64) -> f64 {
        self.phase(pressure).bulk_modulus_from(pressure)
    }

    fn baryon_density_from(&self, pressure: f64) -> Option<f64> {
        self.phase(pressure).baryon_density_from(pressure)
    }

    fn transitional_pressure(&self) -> Option<f64> {
        Some(self.transitional_pressure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::eos::{BpsFit, MasslessMitBag};

    const TRANSITION: f64 = 4.47e-4;

    fn bps_mit() -> HybridEos {
        HybridEos::new(
            Arc::new(BpsFit::default()),
            Arc::new(MasslessMitBag::default()),
            TRANSITION,
        )
        .unwrap()
    }

    #[test]
    fn transition_pressure_belongs_to_the_envelope() {
        let eos = bps_mit();
        let bps = BpsFit::default();
        assert_eq!(
            eos.energy_density_from(TRANSITION),
            bps.energy_density_from(TRANSITION)
        );
        assert_eq!(
            eos.adiabatic_index_from(TRANSITION),
            bps.adiabatic_index_from(TRANSITION)
        );
    }

    #[test]
    fn energy_density_jumps_across_the_transition() {
        let eos = bps_mit();
        let mit = MasslessMitBag::default();
        let above = TRANSITION * (1.0 + 1e-5);
        assert_eq!(eos.energy_density_from(above), mit.energy_density_from(above));
        assert!(eos.energy_density_from(above) - eos.energy_density_from(TRANSITION) > 200.0);
        assert_eq!(eos.sound_speed_squared_from(above), 1.0 / 3.0);
        assert_eq!(eos.transitional_pressure(), Some(TRANSITION));
    }

    #[test]
    fn rejects_non_positive_transition() {
        let result = HybridEos::new(
            Arc::new(BpsFit::default()),
            Arc::new(MasslessMitBag::default()),
            0.0,
        );
        assert!(matches!(result, Err(EosError::InvalidParameter { .. })));
    }
}
