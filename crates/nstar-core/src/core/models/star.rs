use crate::core::units::km_to_solar_masses;
use serde::Serialize;

/// A named column value of one family row; `None` when the quantity was not computed.
pub type Column = (&'static str, Option<f64>);

/// Rows that a stellar family table can hold.
pub trait StarRecord {
    fn central_pressure(&self) -> f64;

    /// Column values in table order.
    fn columns(&self) -> Vec<Column>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Star {
    pub central_pressure: f64,
    pub radius: f64,
    pub mass: f64,
    /// Node count of the fundamental radial perturbation.
    pub mode: Option<usize>,
    pub omega_squared: Option<f64>,
}

impl Star {
    pub fn new(central_pressure: f64, radius: f64, mass: f64) -> Self {
        Self {
            central_pressure,
            radius,
            mass,
            mode: None,
            omega_squared: None,
        }
    }

    pub fn with_oscillation(mut self, mode: usize, omega_squared: f64) -> Self {
        self.mode = Some(mode);
        self.omega_squared = Some(omega_squared);
        self
    }

    pub fn mass_in_solar_masses(&self) -> f64 {
        km_to_solar_masses(self.mass)
    }

    pub fn compactness(&self) -> f64 {
        self.mass / self.radius
    }

    /// `Some(true)` when the fundamental radial mode has a real frequency.
    pub fn is_stable(&self) -> Option<bool> {
        self.omega_squared.map(|w2| w2 > 0.0)
    }
}

impl StarRecord for Star {
    fn central_pressure(&self) -> f64 {
        self.central_pressure
    }

    fn columns(&self) -> Vec<Column> {
        vec![
            ("central_pressure", Some(self.central_pressure)),
            ("radius", Some(self.radius)),
            ("mass", Some(self.mass)),
            ("mode", self.mode.map(|m| m as f64)),
            ("omega_squared", self.omega_squared),
        ]
    }
}

/// A star with a quark core inside a hadronic envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HybridStar {
    #[serde(flatten)]
    pub star: Star,
    pub core_radius: f64,
    pub core_mass: f64,
}

impl StarRecord for HybridStar {
    fn central_pressure(&self) -> f64 {
        self.star.central_pressure
    }

    fn columns(&self) -> Vec<Column> {
        let mut columns = self.star.columns();
        columns.push(("core_radius", Some(self.core_radius)));
        columns.push(("core_mass", Some(self.core_mass)));
        columns
    }
}
