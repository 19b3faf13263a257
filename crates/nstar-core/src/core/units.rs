/// Pressure or energy density in MeV fm⁻³ to geometric units (km⁻², `G = c = 1`).
pub const MEV_FM3_TO_KM_2: f64 = 1.323_833_313_566_382_7e-6;

/// Pressure or energy density in MeV fm⁻³ to natural units (MeV⁴), i.e. `(ħc)³`.
pub const MEV_FM3_TO_MEV4: f64 = 7.683_505_569_453_848e6;

/// Mass density in g cm⁻³ to energy density in MeV fm⁻³ (multiplication by `c²`).
pub const GCM3_TO_MEVFM3: f64 = 5.609_588_603_804_452e-13;

/// Baryon mass used to turn rest-mass density into baryon number density.
pub const BARYON_MASS_MEV: f64 = 938.0;

/// Solar mass in km (`G M☉ / c²`).
pub const SOLAR_MASS_KM: f64 = 1.476_625_038;

#[inline]
pub fn km_to_solar_masses(mass_km: f64) -> f64 {
    mass_km / SOLAR_MASS_KM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_unit_factor_is_hbar_c_cubed() {
        let hbar_c = 197.326_980_4_f64;
        assert!((MEV_FM3_TO_MEV4 / hbar_c.powi(3) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn solar_mass_round_trips_through_km() {
        assert!((km_to_solar_masses(SOLAR_MASS_KM) - 1.0).abs() < 1e-15);
    }
}
