use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Profile columns differ in length: expected {expected}, got {actual} for '{column}'")]
    LengthMismatch {
        column: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Profile is empty")]
    Empty,

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),
}

/// Radial profiles of one star.
///
/// The time metric function is shifted so that `ν(R) = ½ ln(1 - 2M/R)`, matching the
/// exterior Schwarzschild solution at the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalProfiles {
    pub radial_coord: Vec<f64>,
    pub time_metric_fn: Vec<f64>,
    pub masses: Vec<f64>,
    pub pressures: Vec<f64>,
    pub xi: Option<Vec<f64>>,
    pub delta_p: Option<Vec<f64>>,
}

impl InternalProfiles {
    /// Builds the profiles from raw integration output, renormalising `ν`.
    pub fn new(
        radial_coord: Vec<f64>,
        time_metric_fn: Vec<f64>,
        masses: Vec<f64>,
        pressures: Vec<f64>,
    ) -> Result<Self, ProfileError> {
        let n = radial_coord.len();
        if n == 0 {
            return Err(ProfileError::Empty);
        }
        check_length("time_metric_fn", n, &time_metric_fn)?;
        check_length("masses", n, &masses)?;
        check_length("pressures", n, &pressures)?;

        let (radius, mass) = (radial_coord[n - 1], masses[n - 1]);
        let shift = time_metric_fn[n - 1] - 0.5 * (1.0 - 2.0 * mass / radius).ln();
        let time_metric_fn = time_metric_fn.into_iter().map(|nu| nu - shift).collect();

        Ok(Self {
            radial_coord,
            time_metric_fn,
            masses,
            pressures,
            xi: None,
            delta_p: None,
        })
    }

    /// Attaches the Lagrangian perturbation profiles sampled on the same radii.
    pub fn with_perturbations(mut self, xi: Vec<f64>, delta_p: Vec<f64>) -> Result<Self, ProfileError> {
        let n = self.radial_coord.len();
        check_length("xi", n, &xi)?;
        check_length("delta_p", n, &delta_p)?;
        self.xi = Some(xi);
        self.delta_p = Some(delta_p);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.radial_coord.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radial_coord.is_empty()
    }

    pub fn radius(&self) -> f64 {
        self.radial_coord.last().copied().unwrap_or(0.0)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ProfileError> {
        let mut out = csv::Writer::from_writer(writer);
        let mut header = vec!["r", "nu", "m", "p"];
        if self.xi.is_some() {
            header.extend(["xi", "delta_p"]);
        }
        out.write_record(&header)?;

        for i in 0..self.len() {
            let mut row = vec![
                self.radial_coord[i],
                self.time_metric_fn[i],
                self.masses[i],
                self.pressures[i],
            ];
            if let (Some(xi), Some(delta_p)) = (&self.xi, &self.delta_p) {
                row.extend([xi[i], delta_p[i]]);
            }
            out.write_record(row.iter().map(|v| v.to_string()))?;
        }
        out.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

fn check_length(column: &'static str, expected: usize, values: &[f64]) -> Result<(), ProfileError> {
    if values.len() != expected {
        return Err(ProfileError::LengthMismatch {
            column,
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InternalProfiles {
        InternalProfiles::new(
            vec![0.1, 5.0, 10.0],
            vec![0.0, 0.2, 0.3],
            vec![0.0, 1.0, 2.0],
            vec![300.0, 100.0, 0.0],
        )
        .unwrap()
    }

    #[test]
    fn matches_schwarzschild_at_surface() {
        let profiles = sample();
        let expected = 0.5 * (1.0 - 2.0 * 2.0 / 10.0_f64).ln();
        assert!((profiles.time_metric_fn[2] - expected).abs() < 1e-15);
        let offset = profiles.time_metric_fn[1] - profiles.time_metric_fn[0];
        assert!((offset - 0.2).abs() < 1e-15);
        assert_eq!(profiles.radius(), 10.0);
    }

    #[test]
    fn rejects_mismatched_columns() {
        let result = InternalProfiles::new(vec![1.0, 2.0], vec![0.0], vec![0.0, 1.0], vec![1.0, 0.0]);
        assert!(matches!(
            result,
            Err(ProfileError::LengthMismatch {
                column: "time_metric_fn",
                ..
            })
        ));
        let result = sample().with_perturbations(vec![1.0], vec![0.0, 0.0, 0.0]);
        assert!(matches!(result, Err(ProfileError::LengthMismatch { column: "xi", .. })));
    }

    #[test]
    fn writes_perturbation_columns_when_present() {
        let profiles = sample()
            .with_perturbations(vec![1.0, 0.5, 0.1], vec![-3.0, -1.0, 0.0])
            .unwrap();
        let mut buffer = Vec::new();
        profiles.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("r,nu,m,p,xi,delta_p"));
        assert_eq!(lines.count(), 3);
    }
}
