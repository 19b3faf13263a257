use super::factory::CreateStar;
use crate::core::models::star::{Column, StarRecord};
use crate::engine::config::ConfigError;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// What to do when one star of a family fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Log the failure, leave the star out of the table and keep going.
    #[default]
    SkipAndLog,
    /// Return the first failure in input order.
    Abort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FamilyOptions {
    /// Worker threads; `None` uses one per available core.
    #[cfg_attr(not(feature = "parallel"), allow(unused))]
    pub num_threads: Option<usize>,
    pub failure_policy: FailurePolicy,
}

#[derive(Debug)]
pub struct FailedStar {
    pub central_pressure: f64,
    pub error: EngineError,
}

/// One row per successfully computed star, in the order of the input pressures.
#[derive(Debug, Default)]
pub struct StellarFamily {
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<f64>>,
    pub failures: Vec<FailedStar>,
}

impl StellarFamily {
    /// Keeps only the columns that every record fills.
    fn from_records(records: &[Vec<Column>], failures: Vec<FailedStar>) -> Self {
        let Some(first) = records.first() else {
            return Self {
                failures,
                ..Self::default()
            };
        };
        let keep: Vec<usize> = (0..first.len())
            .filter(|&i| records.iter().all(|row| row.get(i).is_some_and(|(_, v)| v.is_some())))
            .collect();

        let columns = keep.iter().map(|&i| first[i].0).collect();
        let rows = records
            .iter()
            .map(|row| keep.iter().filter_map(|&i| row[i].1).collect())
            .collect();
        Self {
            columns,
            rows,
            failures,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.columns.iter().position(|&column| column == name)?;
        Some(self.rows.iter().map(|row| row[index]).collect())
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(&self.columns)?;
        for row in &self.rows {
            out.write_record(row.iter().map(|value| value.to_string()))?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Computes one star per central pressure on a bounded worker pool.
#[instrument(skip_all, name = "stellar_family", fields(stars = central_pressures.len()))]
pub fn create_stellar_family<F: CreateStar>(
    factory: &F,
    central_pressures: &[f64],
    options: &FamilyOptions,
    reporter: &ProgressReporter,
) -> Result<StellarFamily, EngineError> {
    info!("Building stellar family.");
    reporter.report(Progress::PhaseStart {
        name: "Stellar family",
    });
    reporter.report(Progress::TaskStart {
        total_steps: central_pressures.len() as u64,
    });

    let create = |(index, &central_pressure): (usize, &f64)| {
        let result = factory.create(central_pressure);
        reporter.report(Progress::StarFinished {
            central_pressure,
            failed: result.is_err(),
        });
        reporter.report(Progress::TaskIncrement);
        (index, result)
    };

    #[cfg(not(feature = "parallel"))]
    let mut results: Vec<_> = central_pressures.iter().enumerate().map(create).collect();

    #[cfg(feature = "parallel")]
    let mut results: Vec<_> = {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(num_threads) = options.num_threads {
            builder = builder.num_threads(num_threads);
        }
        let pool = builder
            .build()
            .map_err(|e| EngineError::Internal(format!("Failed to build thread pool: {e}")))?;
        pool.install(|| central_pressures.par_iter().enumerate().map(create).collect())
    };

    results.sort_by_key(|(index, _)| *index);
    reporter.report(Progress::TaskFinish);

    let mut records = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (index, result) in results {
        let central_pressure = central_pressures[index];
        match result {
            Ok(star) => records.push(star.columns()),
            Err(error) => match options.failure_policy {
                FailurePolicy::Abort => {
                    reporter.report(Progress::PhaseFinish);
                    return Err(error);
                }
                FailurePolicy::SkipAndLog => {
                    warn!(central_pressure, %error, "Skipping star");
                    failures.push(FailedStar {
                        central_pressure,
                        error,
                    });
                }
            },
        }
    }

    let family = StellarFamily::from_records(&records, failures);
    info!(
        stars = family.len(),
        failed = family.failures.len(),
        "Stellar family complete."
    );
    reporter.report(Progress::PhaseFinish);
    Ok(family)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spacing {
    #[default]
    Linear,
    Geometric,
}

/// `n` central pressures from `start` to `stop` inclusive.
pub fn central_pressure_grid(
    start: f64,
    stop: f64,
    n: usize,
    spacing: Spacing,
) -> Result<Vec<f64>, ConfigError> {
    for (name, value) in [("start", start), ("stop", stop)] {
        let valid = match spacing {
            Spacing::Linear => value.is_finite(),
            Spacing::Geometric => value > 0.0 && value.is_finite(),
        };
        if !valid {
            return Err(ConfigError::InvalidValue { name, value });
        }
    }
    if n < 2 {
        return Ok(if n == 1 { vec![start] } else { Vec::new() });
    }

    let last = (n - 1) as f64;
    let interior = |i: usize| match spacing {
        Spacing::Linear => start + (stop - start) * i as f64 / last,
        Spacing::Geometric => (start.ln() + (stop.ln() - start.ln()) * i as f64 / last).exp(),
    };
    let mut grid: Vec<f64> = (0..n).map(interior).collect();
    grid[0] = start;
    grid[n - 1] = stop;
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::eos::{BpsFit, EquationOfState, HybridEos, MasslessMitBag};
    use crate::engine::config::TovInput;
    use crate::workflows::factory::{HybridStarFactory, StarFactory};
    use std::sync::{Arc, Mutex};

    fn mit_factory() -> StarFactory {
        let eos: Arc<dyn EquationOfState> = Arc::new(MasslessMitBag::default());
        StarFactory::new(TovInput::builder().eos(eos).build().unwrap())
    }

    fn options(failure_policy: FailurePolicy) -> FamilyOptions {
        FamilyOptions {
            num_threads: Some(2),
            failure_policy,
        }
    }

    #[test]
    fn linear_grid_includes_both_ends() {
        let grid = central_pressure_grid(1.0, 2.0, 5, Spacing::Linear).unwrap();
        assert_eq!(grid, [1.0, 1.25, 1.5, 1.75, 2.0]);
        assert_eq!(central_pressure_grid(3.0, 9.0, 1, Spacing::Linear).unwrap(), [3.0]);
        assert!(central_pressure_grid(3.0, 9.0, 0, Spacing::Linear).unwrap().is_empty());
    }

    #[test]
    fn geometric_grid_has_constant_ratio() {
        let grid = central_pressure_grid(1.0, 1000.0, 4, Spacing::Geometric).unwrap();
        assert_eq!(grid[0], 1.0);
        assert_eq!(grid[3], 1000.0);
        for (value, expected) in grid.iter().zip([1.0, 10.0, 100.0, 1000.0]) {
            assert!((value - expected).abs() < 1e-9 * expected);
        }
        assert!(matches!(
            central_pressure_grid(0.0, 1.0, 3, Spacing::Geometric),
            Err(ConfigError::InvalidValue { name: "start", .. })
        ));
    }

    #[test]
    fn family_rows_follow_input_order() {
        let pressures = [300.0, 5.0, 50.0];
        let family = create_stellar_family(
            &mit_factory(),
            &pressures,
            &options(FailurePolicy::Abort),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(family.columns, ["central_pressure", "radius", "mass"]);
        assert_eq!(family.column("central_pressure").unwrap(), pressures);
        assert!(family.failures.is_empty());
    }

    #[test]
    fn skip_and_log_drops_failed_stars() {
        let family = create_stellar_family(
            &mit_factory(),
            &[300.0, -1.0, 5.0],
            &options(FailurePolicy::SkipAndLog),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(family.len(), 2);
        assert_eq!(family.failures.len(), 1);
        assert_eq!(family.failures[0].central_pressure, -1.0);
        assert!(matches!(family.failures[0].error, EngineError::Config(_)));
    }

    #[test]
    fn abort_returns_first_failure_in_input_order() {
        let result = create_stellar_family(
            &mit_factory(),
            &[5.0, f64::NAN, -2.0],
            &options(FailurePolicy::Abort),
            &ProgressReporter::new(),
        );
        match result {
            Err(EngineError::Config(ConfigError::InvalidCentralPressure(p))) => assert!(p.is_nan()),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn reports_progress_for_every_star() {
        let finished = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::StarFinished {
                central_pressure,
                failed,
            } = event
            {
                finished.lock().unwrap().push((central_pressure, failed));
            }
        }));
        create_stellar_family(
            &mit_factory(),
            &[300.0, 0.0],
            &options(FailurePolicy::SkipAndLog),
            &reporter,
        )
        .unwrap();
        drop(reporter);
        let mut finished = finished.into_inner().unwrap();
        finished.sort_by(|a, b| a.0.total_cmp(&b.0));
        assert_eq!(finished, [(0.0, true), (300.0, false)]);
    }

    #[test]
    fn hybrid_family_mass_grows_with_central_pressure() {
        let eos = HybridEos::new(
            Arc::new(BpsFit::default()),
            Arc::new(MasslessMitBag::default()),
            4.7e-4,
        )
        .unwrap();
        let factory =
            HybridStarFactory::new(TovInput::builder().eos(Arc::new(eos)).build().unwrap())
                .unwrap();
        let pressures = central_pressure_grid(5e-4, 7e-4, 2, Spacing::Geometric).unwrap();
        let family = create_stellar_family(
            &factory,
            &pressures,
            &FamilyOptions::default(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(family.len(), 2);
        assert_eq!(
            family.columns,
            ["central_pressure", "radius", "mass", "core_radius", "core_mass"]
        );
        let masses = family.column("mass").unwrap();
        assert!((masses[0] - 1.035_343).abs() < 1e-5);
        assert!((masses[1] - 1.035_395).abs() < 1e-5);
        let core_radii = family.column("core_radius").unwrap();
        assert!((core_radii[0] - 0.014_427).abs() < 1e-5);
        assert!((core_radii[1] - 0.039_946).abs() < 1e-5);
    }

    #[test]
    fn writes_family_as_csv() {
        let family = create_stellar_family(
            &mit_factory(),
            &[300.0],
            &FamilyOptions::default(),
            &ProgressReporter::new(),
        )
        .unwrap();
        let mut buffer = Vec::new();
        family.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("central_pressure,radius,mass"));
        assert!(lines.next().unwrap().starts_with("300,"));
    }
}
