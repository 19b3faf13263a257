//! # Core Models Module
//!
//! Plain result types produced by the engines and collected by the workflows.
//!
//! ## Key Components
//!
//! - [`star`] - Global properties of one equilibrium configuration, with or without a quark core
//! - [`profiles`] - Radial profiles of the background and, optionally, of the perturbation
//!
//! Radii and masses are in km (`G = c = 1`), pressures in MeV fm⁻³ and squared
//! frequencies in km⁻².

pub mod profiles;
pub mod star;
