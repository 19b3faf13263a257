//! Generalized piecewise polytropes (Boyle et al., PRD 102, 083027, 2020).
//!
//! Each segment obeys `p = K ρ^Γ + Λ` and `e = (1 + a) ρ + K ρ^Γ/(Γ - 1) - Λ` with
//! `p`, `e` and the rest-mass density `ρ` all in g cm⁻³. The SLy4 crust fixes `K` and `Γ`
//! of its five segments; the three core segments come from a table row. Every `Λ` and `a`
//! past the first segment is matched to the segment below it so that pressure and energy
//! density are continuous at every dividing density.

use super::{EosError, EquationOfState};
use crate::core::io::gpp_table;
use crate::core::units::{BARYON_MASS_MEV, GCM3_TO_MEVFM3};
use serde::Deserialize;
use std::path::Path;

const CRUST_DENSITIES: [f64; 5] = [0.0, 6.285e5, 1.826e8, 3.350e11, 5.317e11];
const CRUST_K: [f64; 5] = [5.214e-9, 5.726e-8, 1.662e-6, -7.957e29, 1.746e-8];
const CRUST_GAMMA: [f64; 5] = [1.611, 1.440, 1.269, -1.841, 1.382];

/// Core dividing densities `ρ1`, `ρ2` as `log10(ρ / g cm⁻³)`.
const SOFT_CORE_DIVIDERS: [f64; 2] = [14.45, 14.58];
const STIFF_CORE_DIVIDERS: [f64; 2] = [14.87, 14.99];

/// One row of the core parameter table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoreParameters {
    #[serde(rename = "EOS")]
    pub label: String,
    pub log_rho0: f64,
    #[serde(rename = "log_K1")]
    pub log_k1: f64,
    pub gamma1: f64,
    pub gamma2: f64,
    pub gamma3: f64,
}

impl CoreParameters {
    fn gammas(&self) -> [f64; 3] {
        [self.gamma1, self.gamma2, self.gamma3]
    }

    fn dividing_densities(&self) -> [f64; 3] {
        let dividers = if self.label.contains("HEB") {
            SOFT_CORE_DIVIDERS
        } else {
            STIFF_CORE_DIVIDERS
        };
        [
            10f64.powf(self.log_rho0),
            10f64.powf(dividers[0]),
            10f64.powf(dividers[1]),
        ]
    }
}

/// Coefficients `(K, Γ, Λ, a)` of one polytropic segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub k: f64,
    pub gamma: f64,
    pub lambda: f64,
    pub a: f64,
}

impl Segment {
    #[inline]
    fn pressure_at(&self, density: f64) -> f64 {
        self.k * density.powf(self.gamma) + self.lambda
    }

    #[inline]
    fn energy_density_at(&self, density: f64) -> f64 {
        self.k * density.powf(self.gamma) / (self.gamma - 1.0) + (1.0 + self.a) * density
            - self.lambda
    }

    /// Rest-mass density at pressure `p` (g cm⁻³).
    #[inline]
    fn density_at(&self, p: f64) -> f64 {
        ((p - self.lambda) / self.k).powf(1.0 / self.gamma)
    }

    #[inline]
    fn energy_density_from_pressure(&self, p: f64) -> f64 {
        (p - self.lambda) / (self.gamma - 1.0) + (1.0 + self.a) * self.density_at(p) - self.lambda
    }

    /// Segment with the given `K` and `Γ` whose `Λ` and `a` continue `self` at `density`.
    fn continued(&self, k: f64, gamma: f64, density: f64) -> Segment {
        let polytrope = k * density.powf(gamma);
        let lambda = self.pressure_at(density) - polytrope;
        let a = (self.energy_density_at(density) - polytrope / (gamma - 1.0) + lambda) / density
            - 1.0;
        Segment { k, gamma, lambda, a }
    }
}

#[derive(Debug, Clone)]
pub struct GeneralizedPiecewisePolytrope {
    label: String,
    /// Pressure at the lower dividing density of each segment, g cm⁻³.
    pressure_breakpoints: Vec<f64>,
    segments: Vec<Segment>,
}

/// Pressure in MeV fm⁻³ expressed as an equivalent mass density in g cm⁻³.
#[inline]
pub fn pressure_in_gcm3(pressure: f64) -> f64 {
    pressure.abs() / GCM3_TO_MEVFM3
}

impl GeneralizedPiecewisePolytrope {
    pub fn new(core: &CoreParameters) -> Result<Self, EosError> {
        let gammas = core.gammas();
        for gamma in gammas {
            if !(gamma > 1.0) {
                return Err(EosError::InvalidParameter {
                    name: "gamma",
                    value: gamma,
                    reason: "core adiabatic exponents must exceed 1",
                });
            }
        }
        let core_densities = core.dividing_densities();
        let crust_end = CRUST_DENSITIES[CRUST_DENSITIES.len() - 1];
        if !(core_densities[0] > crust_end
            && core_densities[0] < core_densities[1]
            && core_densities[1] < core_densities[2])
        {
            return Err(EosError::InvalidParameter {
                name: "log_rho0",
                value: core.log_rho0,
                reason: "crust-core density must lie between the crust and the first core divider",
            });
        }

        let mut segments = vec![Segment {
            k: CRUST_K[0],
            gamma: CRUST_GAMMA[0],
            lambda: 0.0,
            a: 0.0,
        }];
        for i in 1..CRUST_DENSITIES.len() {
            let previous = segments[i - 1];
            segments.push(previous.continued(CRUST_K[i], CRUST_GAMMA[i], CRUST_DENSITIES[i]));
        }

        let crust = segments[segments.len() - 1];
        let mut current = crust.continued(10f64.powf(core.log_k1), gammas[0], core_densities[0]);
        segments.push(current);
        for i in 0..gammas.len() - 1 {
            let (g, g_next) = (gammas[i], gammas[i + 1]);
            let rho = core_densities[i + 1];
            // Matching K as well keeps dp/dρ continuous between core segments.
            let k_next = current.k * (g / g_next) * rho.powf(g - g_next);
            current = current.continued(k_next, g_next, rho);
            segments.push(current);
        }

        let pressure_breakpoints = CRUST_DENSITIES
            .iter()
            .chain(core_densities.iter())
            .zip(&segments)
            .map(|(&rho, segment)| segment.pressure_at(rho))
            .collect();

        Ok(Self {
            label: core.label.clone(),
            pressure_breakpoints,
            segments,
        })
    }

    /// Builds the model for `label` from a core parameter table on disk.
    pub fn from_table(path: &Path, label: &str) -> Result<Self, EosError> {
        let rows = gpp_table::read_core_table(path)?;
        let core = gpp_table::find_label(&rows, label)?;
        Self::new(core)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Pressures (g cm⁻³) at which each segment begins.
    pub fn pressure_breakpoints(&self) -> &[f64] {
        &self.pressure_breakpoints
    }

    /// Segment of the rightmost breakpoint strictly below `p_in_gcm3`, or the first
    /// segment when there is none.
    pub fn select_coefficients(&self, p_in_gcm3: f64) -> Segment {
        let index = self
            .pressure_breakpoints
            .iter()
            .rposition(|&breakpoint| breakpoint < p_in_gcm3)
            .unwrap_or(0);
        self.segments[index]
    }

    fn segment_for(&self, pressure: f64) -> (Segment, f64) {
        let p = pressure_in_gcm3(pressure);
        (self.select_coefficients(p), p)
    }
}

impl EquationOfState for GeneralizedPiecewisePolytrope {
    fn energy_density_from(&self, pressure: f64) -> f64 {
        let (s, p) = self.segment_for(pressure);
        s.energy_density_from_pressure(p) * GCM3_TO_MEVFM3
    }

    fn sound_speed_squared_from(&self, pressure: f64) -> f64 {
        let (s, p) = self.segment_for(pressure);
        let density_term = ((p - s.lambda) / s.k).powf(1.0 / s.gamma - 1.0);
        1.0 / (1.0 / (s.gamma - 1.0) + (1.0 + s.a) / (s.k * s.gamma) * density_term)
    }

    fn adiabatic_index_from(&self, pressure: f64) -> f64 {
        let (s, p) = self.segment_for(pressure);
        s.gamma * (p - s.lambda) / p
    }

    fn bulk_modulus_from(&self, pressure: f64) -> f64 {
        let (s, p) = self.segment_for(pressure);
        s.gamma * (p - s.lambda) * GCM3_TO_MEVFM3
    }

    fn baryon_density_from(&self, pressure: f64) -> Option<f64> {
        let (s, p) = self.segment_for(pressure);
        Some(s.density_at(p) * GCM3_TO_MEVFM3 / BARYON_MASS_MEV)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sly4_like() -> CoreParameters {
        CoreParameters {
            label: "SLy4".to_string(),
            log_rho0: 14.165,
            log_k1: -30.45,
            gamma1: 3.005,
            gamma2: 2.988,
            gamma3: 2.851,
        }
    }

    fn relative_eq(a: f64, b: f64, tol: f64) -> bool {
        ((a - b) / b).abs() < tol
    }

    #[test]
    fn has_one_breakpoint_per_segment() {
        let eos = GeneralizedPiecewisePolytrope::new(&sly4_like()).unwrap();
        assert_eq!(eos.pressure_breakpoints().len(), 8);
        assert_eq!(eos.pressure_breakpoints()[0], 0.0);
        assert_eq!(eos.label(), "SLy4");
    }

    #[test]
    fn segments_join_continuously_at_every_dividing_density() {
        let eos = GeneralizedPiecewisePolytrope::new(&sly4_like()).unwrap();
        let breakpoints = eos.pressure_breakpoints();
        for i in 1..breakpoints.len() {
            let p = breakpoints[i];
            let below = eos.segments[i - 1].energy_density_from_pressure(p);
            let above = eos.segments[i].energy_density_from_pressure(p);
            assert!(relative_eq(above, below, 1e-12), "breakpoint {i}");
        }
    }

    #[test]
    fn energy_density_is_continuous_across_crust_and_core_breakpoints() {
        let eos = GeneralizedPiecewisePolytrope::new(&sly4_like()).unwrap();
        for &breakpoint in eos.pressure_breakpoints().iter().filter(|&&p| p > 0.0) {
            let p = breakpoint * GCM3_TO_MEVFM3;
            let below = eos.energy_density_from(p * (1.0 - 1e-12));
            let above = eos.energy_density_from(p * (1.0 + 1e-12));
            assert!(relative_eq(above, below, 1e-9), "p = {p}");
        }
    }

    #[test]
    fn matched_crust_stays_close_to_published_sly4_fit() {
        let eos = GeneralizedPiecewisePolytrope::new(&sly4_like()).unwrap();
        let published_lambda = [-1.354, -6.025e3, 1.193e9, 7.077e8];
        for (segment, lambda) in eos.segments[1..5].iter().zip(published_lambda) {
            assert!(relative_eq(segment.lambda, lambda, 0.1), "{segment:?}");
        }
    }

    #[test]
    fn selects_rightmost_breakpoint_below_pressure() {
        let eos = GeneralizedPiecewisePolytrope::new(&sly4_like()).unwrap();
        let breakpoints = eos.pressure_breakpoints().to_vec();
        let segment = eos.select_coefficients(breakpoints[6] * 1.01);
        assert_eq!(segment.gamma, 2.988);
        let segment = eos.select_coefficients(breakpoints[7] * 1.01);
        assert_eq!(segment.gamma, 2.851);
        let segment = eos.select_coefficients(0.0);
        assert_eq!(segment.gamma, CRUST_GAMMA[0]);
    }

    #[test]
    fn reproduces_reference_values() {
        let eos = GeneralizedPiecewisePolytrope::new(&sly4_like()).unwrap();
        assert!(relative_eq(eos.energy_density_from(10.0), 205.809_339_5, 1e-8));
        assert!(relative_eq(eos.sound_speed_squared_from(100.0), 0.522_760_699_4, 1e-8));
        assert!(relative_eq(eos.adiabatic_index_from(1.0), 4.095_933_873_2, 1e-8));
        let n = eos.baryon_density_from(100.0).unwrap();
        assert!(relative_eq(n, 0.449_589_687_7, 1e-8));
    }

    #[test]
    fn bulk_modulus_matches_adiabatic_index() {
        let eos = GeneralizedPiecewisePolytrope::new(&sly4_like()).unwrap();
        for p in [1e-3, 1.0, 150.0] {
            let expected = p * eos.adiabatic_index_from(p);
            assert!(relative_eq(eos.bulk_modulus_from(p), expected, 1e-12));
        }
    }

    #[test]
    fn analytic_sound_speed_matches_finite_difference_in_core() {
        let eos = GeneralizedPiecewisePolytrope::new(&sly4_like()).unwrap();
        for p in [10.0, 100.0, 400.0] {
            let numeric = crate::core::eos::fallback::sound_speed_squared(&eos, p);
            assert!(relative_eq(eos.sound_speed_squared_from(p), numeric, 1e-6));
        }
    }

    #[test]
    fn heb_labels_use_soft_core_dividers() {
        let mut core = sly4_like();
        core.label = "HEBsoft".to_string();
        core.log_rho0 = 14.1;
        let eos = GeneralizedPiecewisePolytrope::new(&core).unwrap();
        let divider = 10f64.powf(SOFT_CORE_DIVIDERS[0]);
        let p_divider = eos.pressure_breakpoints()[6] * GCM3_TO_MEVFM3;
        let density = eos.baryon_density_from(p_divider).unwrap() * BARYON_MASS_MEV
            / GCM3_TO_MEVFM3;
        assert!(relative_eq(density, divider, 1e-9));
    }

    #[test]
    fn rejects_misordered_dividing_densities() {
        let mut core = sly4_like();
        core.log_rho0 = 15.2;
        assert!(matches!(
            GeneralizedPiecewisePolytrope::new(&core),
            Err(EosError::InvalidParameter { name: "log_rho0", .. })
        ));
        let mut core = sly4_like();
        core.gamma2 = 1.0;
        assert!(matches!(
            GeneralizedPiecewisePolytrope::new(&core),
            Err(EosError::InvalidParameter { name: "gamma", .. })
        ));
    }
}
