//! # Engine Module
//!
//! The numerical procedures that turn an equation of state and a central pressure into
//! a star and its fundamental radial mode.
//!
//! ## Overview
//!
//! A star is computed in two stages. The Tolman-Oppenheimer-Volkoff equations are
//! integrated from a series expansion near the centre until the pressure vanishes,
//! which fixes the radius and mass. The linear radial-perturbation equations are then
//! solved on that background by shooting in `ω²` until the Lagrangian pressure
//! perturbation vanishes at the surface.
//!
//! ## Architecture
//!
//! - **TOV integration** ([`tov`]) - structure equations, centre series and boundary events
//! - **Stability** ([`stability`]) - perturbation equations and the secant shooting solver
//! - **Hybrid stars** ([`hybrid`]) - interface event and junction conditions at the phase transition
//! - **Configuration** ([`config`]) - validated inputs of the integrations and the shooting solver
//! - **Progress Monitoring** ([`progress`]) - callback-based progress reporting
//! - **Error Handling** ([`error`]) - engine-specific error types
//!
//! Background lookups of the shooting solver are memoised per star in [`cache`].

pub mod cache;
pub mod config;
pub mod error;
pub mod hybrid;
pub mod progress;
pub mod stability;
pub mod tov;
