//! # nstar Core Library
//!
//! Structure and radial stability of static, spherically symmetric relativistic stars
//! (neutron stars, quark stars and hybrid quark-hadron stars) computed from an
//! equation of state.
//!
//! ## Architectural Philosophy
//!
//! The library is organised in three layers:
//!
//! - **[`core`]: The Foundation.** Equations of state, physical constants, numerical
//!   kernels (adaptive Dormand-Prince 8(5,3) integration with events, monotone
//!   splines, root finders), table readers and the plain result models (`Star`,
//!   `HybridStar`, `InternalProfiles`).
//!
//! - **[`engine`]: The Logic Core.** The numerical procedures: integration of the
//!   Tolman-Oppenheimer-Volkoff equations, the radial-oscillation shooting solver,
//!   the phase-interface junction conditions of hybrid stars, configuration builders
//!   and the error taxonomy.
//!
//! - **[`workflows`]: The Public API.** Star factories turning a central pressure into
//!   a star, and the parallel builder assembling a whole stellar family into a table.
//!
//! ## Units
//!
//! Pressures and energy densities are in MeV fm⁻³, baryon densities in fm⁻³, radii
//! and masses in km (geometric units, `G = c = 1`) and squared frequencies in km⁻².

pub mod core;
pub mod engine;
pub mod workflows;
