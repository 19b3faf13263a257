use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RootError {
    #[error("Bracket [{lower:e}, {upper:e}] does not enclose a sign change")]
    NotBracketed { lower: f64, upper: f64 },

    #[error("Root search did not converge after {iterations} iterations (last estimate {last_estimate:e})")]
    NotConverged {
        iterations: usize,
        last_estimate: f64,
    },

    #[error("Objective returned a non-finite value at x = {x:e}")]
    NonFinite { x: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub f: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootResult {
    pub root: f64,
    pub iterations: usize,
    pub evals: u64,
}

/// Brent's method on a bracket whose end points have opposite signs.
#[derive(Debug, Clone, Copy)]
pub struct Brent {
    pub rel_epsilon: f64,
    pub max_iterations: usize,
}

impl Default for Brent {
    fn default() -> Self {
        Self {
            rel_epsilon: 4.0 * f64::EPSILON,
            max_iterations: 200,
        }
    }
}

impl Brent {
    pub fn search<E, F>(&self, lower: Point, upper: Point, mut f: F) -> Result<RootResult, E>
    where
        E: From<RootError>,
        F: FnMut(f64) -> Result<f64, E>,
    {
        if lower.f == 0.0 {
            return Ok(RootResult {
                root: lower.x,
                iterations: 0,
                evals: 0,
            });
        }
        if upper.f == 0.0 {
            return Ok(RootResult {
                root: upper.x,
                iterations: 0,
                evals: 0,
            });
        }
        if (lower.f > 0.0) == (upper.f > 0.0) {
            return Err(RootError::NotBracketed {
                lower: lower.x,
                upper: upper.x,
            }
            .into());
        }

        let mut previous = lower;
        let mut current = upper;
        let mut counterpoint = current;
        let mut d = 0.0;
        let mut e = 0.0;
        let mut evals = 0;

        for iteration in 0..self.max_iterations {
            if (counterpoint.f > 0.0) == (current.f > 0.0) {
                counterpoint = previous;
                d = current.x - previous.x;
                e = d;
            }

            if counterpoint.f.abs() < current.f.abs() {
                previous = current;
                (counterpoint, current) = (current, counterpoint);
            }

            let accuracy = 0.5 * (counterpoint.x - current.x);
            let tolerance =
                (f64::EPSILON + self.rel_epsilon) * f64::max(current.x.abs(), counterpoint.x.abs());

            if current.f == 0.0 {
                return Ok(RootResult {
                    root: current.x,
                    iterations: iteration,
                    evals,
                });
            }
            if accuracy.abs() <= tolerance {
                return Ok(RootResult {
                    root: current.x + accuracy,
                    iterations: iteration,
                    evals,
                });
            }

            if e.abs() >= tolerance && previous.f.abs() > current.f.abs() {
                let slope = current.f / previous.f;
                let mut p;
                let mut q;

                if previous.x == counterpoint.x {
                    p = 2.0 * accuracy * slope;
                    q = 1.0 - slope;
                } else {
                    let slope_ac = previous.f / counterpoint.f;
                    let slope_bc = current.f / counterpoint.f;

                    p = slope
                        * (2.0 * accuracy * slope_ac * (slope_ac - slope_bc)
                            - (current.x - previous.x) * (slope_bc - 1.0));
                    q = (slope_ac - 1.0) * (slope_bc - 1.0) * (slope - 1.0);
                }

                if p > 0.0 {
                    q = -q;
                } else {
                    p = -p;
                }

                let min1 = 3.0 * accuracy * q - (tolerance * q).abs();
                let min2 = (e * q).abs();

                if 2.0 * p < f64::min(min1, min2) {
                    e = d;
                    d = p / q;
                } else {
                    d = accuracy;
                    e = d;
                }
            } else {
                d = accuracy;
                e = d;
            }

            previous = current;

            current.x += if d.abs() > tolerance {
                d
            } else {
                tolerance.copysign(accuracy)
            };
            current.f = f(current.x)?;
            evals += 1;

            if !current.f.is_finite() {
                return Err(RootError::NonFinite { x: current.x }.into());
            }
        }

        Err(RootError::NotConverged {
            iterations: self.max_iterations,
            last_estimate: current.x,
        }
        .into())
    }
}

/// Secant iteration seeded from two points, converged once successive estimates
/// agree to `abs_tolerance + rel_tolerance * |x|`.
#[derive(Debug, Clone, Copy)]
pub struct Secant {
    pub abs_tolerance: f64,
    pub rel_tolerance: f64,
    pub max_iterations: usize,
}

impl Secant {
    pub fn solve<E, F>(&self, x0: f64, x1: f64, mut f: F) -> Result<RootResult, E>
    where
        E: From<RootError>,
        F: FnMut(f64) -> Result<f64, E>,
    {
        let (mut p0, mut p1) = (x0, x1);
        let mut q0 = finite(p0, f(p0)?)?;
        let mut q1 = finite(p1, f(p1)?)?;
        let mut evals = 2;

        if q1.abs() < q0.abs() {
            (p0, p1) = (p1, p0);
            (q0, q1) = (q1, q0);
        }

        for iteration in 0..self.max_iterations {
            if q1 == q0 {
                return Ok(RootResult {
                    root: 0.5 * (p0 + p1),
                    iterations: iteration + 1,
                    evals,
                });
            }

            let p = if q1.abs() > q0.abs() {
                (-q0 / q1 * p1 + p0) / (1.0 - q0 / q1)
            } else {
                (-q1 / q0 * p0 + p1) / (1.0 - q1 / q0)
            };

            if (p - p1).abs() <= self.abs_tolerance + self.rel_tolerance * p.abs() {
                return Ok(RootResult {
                    root: p,
                    iterations: iteration + 1,
                    evals,
                });
            }

            (p0, q0) = (p1, q1);
            p1 = p;
            q1 = finite(p1, f(p1)?)?;
            evals += 1;
        }

        Err(RootError::NotConverged {
            iterations: self.max_iterations,
            last_estimate: p1,
        }
        .into())
    }
}

fn finite(x: f64, value: f64) -> Result<f64, RootError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RootError::NonFinite { x })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(x: f64) -> Result<f64, RootError> {
        Ok(x * x * x - 2.0 * x - 5.0)
    }

    const CUBIC_ROOT: f64 = 2.094_551_481_542_326_5;

    #[test]
    fn brent_finds_root_inside_bracket() {
        let lower = Point {
            x: 2.0,
            f: cubic(2.0).unwrap(),
        };
        let upper = Point {
            x: 3.0,
            f: cubic(3.0).unwrap(),
        };
        let result = Brent::default().search(lower, upper, cubic).unwrap();
        assert!((result.root - CUBIC_ROOT).abs() < 1e-12);
    }

    #[test]
    fn brent_returns_exact_endpoint_root() {
        let lower = Point { x: 1.0, f: 4.0 };
        let upper = Point { x: 2.0, f: 0.0 };
        let result = Brent::default()
            .search::<RootError, _>(lower, upper, |_| unreachable!())
            .unwrap();
        assert_eq!(result.root, 2.0);
        assert_eq!(result.evals, 0);
    }

    #[test]
    fn brent_rejects_bracket_without_sign_change() {
        let lower = Point { x: 0.0, f: 1.0 };
        let upper = Point { x: 1.0, f: 2.0 };
        let result = Brent::default().search(lower, upper, |x| Ok::<_, RootError>(x + 1.0));
        assert!(matches!(result, Err(RootError::NotBracketed { .. })));
    }

    #[test]
    fn secant_converges_on_smooth_function() {
        let secant = Secant {
            abs_tolerance: 1e-15,
            rel_tolerance: 1e-12,
            max_iterations: 50,
        };
        let result = secant.solve(2.0, 2.002, cubic).unwrap();
        assert!((result.root - CUBIC_ROOT).abs() < 1e-10);
    }

    #[test]
    fn secant_reports_non_convergence() {
        let secant = Secant {
            abs_tolerance: 0.0,
            rel_tolerance: 0.0,
            max_iterations: 3,
        };
        let result = secant.solve(10.0, 10.01, |x: f64| Ok::<_, RootError>(x.exp() - 1.0));
        assert!(matches!(
            result,
            Err(RootError::NotConverged { iterations: 3, .. })
        ));
    }

    #[test]
    fn secant_propagates_objective_errors() {
        let secant = Secant {
            abs_tolerance: 1e-12,
            rel_tolerance: 1e-12,
            max_iterations: 10,
        };
        let result = secant.solve(1.0, 2.0, |x| {
            if x > 1.5 {
                Err(RootError::NonFinite { x })
            } else {
                Ok(x)
            }
        });
        assert_eq!(result, Err(RootError::NonFinite { x: 2.0 }));
    }
}
