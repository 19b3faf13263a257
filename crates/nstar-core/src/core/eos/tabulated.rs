use super::{EosError, EquationOfState, fallback};
use crate::core::io::eos_table::{self, EosTable};
use crate::core::numerics::spline::CubicHermiteSpline;
use std::path::Path;
use std::sync::Arc;

/// Equation of state interpolated from a table with one monotone cubic spline per column.
///
/// Pressures outside the tabulated range are clamped to the nearest end of the table.
/// Without `cs2` or `gamma` columns the generic finite-difference rules apply.
#[derive(Debug)]
pub struct TabulatedEos {
    energy_density: CubicHermiteSpline,
    baryon_density: Option<CubicHermiteSpline>,
    sound_speed_squared: Option<CubicHermiteSpline>,
    adiabatic_index: Option<CubicHermiteSpline>,
}

impl TabulatedEos {
    pub fn from_path(path: &Path) -> Result<Self, EosError> {
        Self::from_table(&eos_table::read_eos_table(path)?)
    }

    pub fn from_table(table: &EosTable) -> Result<Self, EosError> {
        let spline = |column: &'static str, values: &[f64]| {
            CubicHermiteSpline::pchip(&table.pressure, values)
                .map_err(|source| EosError::Spline { column, source })
        };
        let optional = |column: &'static str, values: &Option<Vec<f64>>| {
            values.as_deref().map(|v| spline(column, v)).transpose()
        };

        Ok(Self {
            energy_density: spline("e", &table.energy_density)?,
            baryon_density: optional("n", &table.baryon_density)?,
            sound_speed_squared: optional("cs2", &table.sound_speed_squared)?,
            adiabatic_index: optional("gamma", &table.adiabatic_index)?,
        })
    }

    /// Tabulated pressure range.
    pub fn pressure_range(&self) -> (f64, f64) {
        self.energy_density.domain()
    }
}

impl EquationOfState for TabulatedEos {
    fn energy_density_from(&self, pressure: f64) -> f64 {
        self.energy_density.eval(pressure)
    }

    fn sound_speed_squared_from(&self, pressure: f64) -> f64 {
        match &self.sound_speed_squared {
            Some(spline) => spline.eval(pressure),
            None => fallback::sound_speed_squared(self, pressure),
        }
    }

    fn adiabatic_index_from(&self, pressure: f64) -> f64 {
        match &self.adiabatic_index {
            Some(spline) => spline.eval(pressure),
            None => fallback::adiabatic_index(self, pressure),
        }
    }

    fn baryon_density_from(&self, pressure: f64) -> Option<f64> {
        self.baryon_density.as_ref().map(|s| s.eval(pressure))
    }
}

/// Linear blend `w · eos1 + (1 - w) · eos2`, typically of a stiff and a soft table.
#[derive(Debug, Clone)]
pub struct WeightedEos {
    first: Arc<dyn EquationOfState>,
    second: Arc<dyn EquationOfState>,
    weight: f64,
}

impl WeightedEos {
    pub fn new(
        first: Arc<dyn EquationOfState>,
        second: Arc<dyn EquationOfState>,
        weight: f64,
    ) -> Result<Self, EosError> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(EosError::InvalidParameter {
                name: "weight",
                value: weight,
                reason: "must lie in [0, 1]",
            });
        }
        Ok(Self {
            first,
            second,
            weight,
        })
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    #[inline]
    fn blend(&self, a: f64, b: f64) -> f64 {
        self.weight * a + (1.0 - self.weight) * b
    }
}

impl EquationOfState for WeightedEos {
    fn energy_density_from(&self, pressure: f64) -> f64 {
        self.blend(
            self.first.energy_density_from(pressure),
            self.second.energy_density_from(pressure),
        )
    }

    fn sound_speed_squared_from(&self, pressure: f64) -> f64 {
        self.blend(
            self.first.sound_speed_squared_from(pressure),
            self.second.sound_speed_squared_from(pressure),
        )
    }

    fn adiabatic_index_from(&self, pressure: f64) -> f64 {
        self.blend(
            self.first.adiabatic_index_from(pressure),
            self.second.adiabatic_index_from(pressure),
        )
    }

    fn baryon_density_from(&self, pressure: f64) -> Option<f64> {
        let first = self.first.baryon_density_from(pressure)?;
        let second = self.second.baryon_density_from(pressure)?;
        Some(self.blend(first, second))
    }
}
