//! # Workflows Module
//!
//! High-level entry points turning central pressures into stars and stellar families.
//!
//! ## Overview
//!
//! A factory fixes the equation of state and every numerical setting once, after which
//! each central pressure maps to one star. The family builder fans a list of central
//! pressures out over a worker pool and collects the stars into a table ordered like
//! the input.
//!
//! - **Star factories** ([`factory`]) - plain and hybrid stars, with or without the
//!   fundamental radial mode
//! - **Stellar families** ([`family`]) - parallel sweeps, failure policy, pressure grids
//!   and CSV export

pub mod factory;
pub mod family;
