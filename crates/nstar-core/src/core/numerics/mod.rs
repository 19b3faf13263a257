//! # Numerics Module
//!
//! Self-contained numerical kernels used by the structure and stability engines.
//!
//! - **Integration** ([`integrator`]) - embedded Dormand-Prince 8(5,3) pair with
//!   adaptive step control, checkpoint output and zero-crossing events that no step
//!   straddles
//! - **Interpolation** ([`spline`]) - monotone piecewise-cubic Hermite splines over
//!   strictly increasing abscissae
//! - **Root finding** ([`roots`]) - Brent's bracketing method and the secant method

pub mod integrator;
pub mod roots;
pub mod spline;
