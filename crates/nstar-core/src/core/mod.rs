//! # Core Module
//!
//! Stateless building blocks shared by the whole library.
//!
//! - **Equations of state** ([`eos`]) - the [`eos::EquationOfState`] capability and its
//!   analytic, piecewise-polytropic, tabulated, blended and hybrid variants
//! - **Units** ([`units`]) - conversion factors between nuclear and geometric units
//! - **Numerics** ([`numerics`]) - adaptive ODE integration, splines and root finding
//! - **Models** ([`models`]) - plain result types produced per central pressure
//! - **I/O** ([`io`]) - readers for tabulated equations of state and polytrope tables

pub mod eos;
pub mod io;
pub mod models;
pub mod numerics;
pub mod units;
