use crate::cli::{FamilyArgs, ModelArgs};
use crate::error::{CliError, Result};
use nstar::core::eos::{
    BpsFit, ConstantSoundSpeed, EquationOfState, GeneralizedPiecewisePolytrope, HybridEos,
    MasslessMitBag, TabulatedEos, WeightedEos,
};
use nstar::engine::config::{CentralRadOscInput, TovInput};
use nstar::engine::hybrid::ConversionSpeed;
use nstar::workflows::family::{
    FailurePolicy, FamilyOptions, Spacing, central_pressure_grid,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_OMEGA_SQUARED_GUESS: f64 = -0.1;
const DEFAULT_NUM_STARS: usize = 20;

#[derive(Deserialize, Debug, Clone)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "kebab-case",
    deny_unknown_fields
)]
pub enum PartialEos {
    Bps,
    MitBag {
        bag_pressure: Option<f64>,
    },
    ConstantSoundSpeed {
        transitional_energy_density: f64,
        energy_density_jump: f64,
        sound_speed_squared: f64,
        transitional_pressure: f64,
    },
    Gpp {
        table: PathBuf,
        label: String,
    },
    Tabulated {
        path: PathBuf,
    },
    Weighted {
        weight: f64,
        first: Box<PartialEos>,
        second: Box<PartialEos>,
    },
    Hybrid {
        transitional_pressure: f64,
        low: Box<PartialEos>,
        high: Box<PartialEos>,
    },
}

impl PartialEos {
    /// Relative table paths are resolved against `base_dir`, the directory of the
    /// configuration file.
    pub fn build(&self, base_dir: &Path) -> Result<Arc<dyn EquationOfState>> {
        let resolve = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                base_dir.join(path)
            }
        };
        let eos: Arc<dyn EquationOfState> = match self {
            Self::Bps => Arc::new(BpsFit::default()),
            Self::MitBag { bag_pressure } => Arc::new(
                bag_pressure.map_or_else(MasslessMitBag::default, MasslessMitBag::new),
            ),
            Self::ConstantSoundSpeed {
                transitional_energy_density,
                energy_density_jump,
                sound_speed_squared,
                transitional_pressure,
            } => Arc::new(ConstantSoundSpeed::new(
                *transitional_energy_density,
                *energy_density_jump,
                *sound_speed_squared,
                *transitional_pressure,
            )?),
            Self::Gpp { table, label } => Arc::new(GeneralizedPiecewisePolytrope::from_table(
                &resolve(table),
                label,
            )?),
            Self::Tabulated { path } => Arc::new(TabulatedEos::from_path(&resolve(path))?),
            Self::Weighted {
                weight,
                first,
                second,
            } => Arc::new(WeightedEos::new(
                first.build(base_dir)?,
                second.build(base_dir)?,
                *weight,
            )?),
            Self::Hybrid {
                transitional_pressure,
                low,
                high,
            } => Arc::new(HybridEos::new(
                low.build(base_dir)?,
                high.build(base_dir)?,
                *transitional_pressure,
            )?),
        };
        Ok(eos)
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialTovConfig {
    min_radius: Option<f64>,
    max_radius: Option<f64>,
    relative_tolerance: Option<f64>,
    absolute_tolerance: Option<[f64; 3]>,
    max_steps: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialStabilityConfig {
    enabled: Option<bool>,
    omega_squared_guess: Option<f64>,
    conversion: Option<ConversionSpeed>,
    central_xi: Option<f64>,
    int_abs_tol: Option<f64>,
    int_rel_tol: Option<f64>,
    root_abs_tol: Option<f64>,
    root_rel_tol: Option<f64>,
    root_max_iterations: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialFamilyConfig {
    start: Option<f64>,
    stop: Option<f64>,
    num_stars: Option<usize>,
    spacing: Option<Spacing>,
    failure_policy: Option<FailurePolicy>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialRunConfig {
    eos: Option<PartialEos>,
    tov: Option<PartialTovConfig>,
    stability: Option<PartialStabilityConfig>,
    family: Option<PartialFamilyConfig>,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilitySettings {
    pub rad_osc: CentralRadOscInput,
    pub omega_squared_guess: f64,
    pub conversion: ConversionSpeed,
}

/// Everything needed to build a star factory.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub tov_input: TovInput,
    pub stability: Option<StabilitySettings>,
}

impl ModelConfig {
    pub fn is_hybrid(&self) -> bool {
        self.tov_input.eos.transitional_pressure().is_some()
    }
}

#[derive(Debug, Clone)]
pub struct FamilyConfig {
    pub model: ModelConfig,
    pub central_pressures: Vec<f64>,
    pub options: FamilyOptions,
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    pub fn merge_model(mut self, args: &ModelArgs) -> Result<ModelConfig> {
        self.apply_set_values(&args.set_values)?;
        self.build_model(args.no_stability)
    }

    pub fn merge_family(mut self, args: &FamilyArgs, threads: Option<usize>) -> Result<FamilyConfig> {
        self.apply_set_values(&args.model.set_values)?;
        let family = self.family.take().unwrap_or_default();

        let start = args.start.or(family.start).ok_or_else(|| {
            CliError::Config("`family.start` is required (or pass --start).".to_string())
        })?;
        let stop = args.stop.or(family.stop).ok_or_else(|| {
            CliError::Config("`family.stop` is required (or pass --stop).".to_string())
        })?;
        let num_stars = args.num_stars.or(family.num_stars).unwrap_or(DEFAULT_NUM_STARS);
        let spacing = args
            .spacing
            .map(Into::into)
            .or(family.spacing)
            .unwrap_or_default();
        let failure_policy = if args.fail_fast {
            FailurePolicy::Abort
        } else {
            family.failure_policy.unwrap_or_default()
        };

        let central_pressures = central_pressure_grid(start, stop, num_stars, spacing)?;
        Ok(FamilyConfig {
            model: self.build_model(args.model.no_stability)?,
            central_pressures,
            options: FamilyOptions {
                num_threads: threads,
                failure_policy,
            },
        })
    }

    fn build_model(self, no_stability: bool) -> Result<ModelConfig> {
        let eos = self
            .eos
            .ok_or_else(|| CliError::Config("`eos` section is required.".to_string()))?
            .build(&self.base_dir)?;

        let tov = self.tov.unwrap_or_default();
        let mut builder = TovInput::builder().eos(eos);
        if let Some(value) = tov.min_radius {
            builder = builder.min_radius(value);
        }
        if let Some(value) = tov.max_radius {
            builder = builder.max_radius(value);
        }
        if let Some(value) = tov.relative_tolerance {
            builder = builder.relative_tolerance(value);
        }
        if let Some(value) = tov.absolute_tolerance {
            builder = builder.absolute_tolerance(value);
        }
        if let Some(value) = tov.max_steps {
            builder = builder.max_steps(value);
        }
        let tov_input = builder.build()?;

        let stability = match self.stability {
            Some(partial) if !no_stability && partial.enabled.unwrap_or(true) => {
                Some(Self::merge_stability(partial))
            }
            _ => None,
        };

        Ok(ModelConfig {
            tov_input,
            stability,
        })
    }

    fn merge_stability(partial: PartialStabilityConfig) -> StabilitySettings {
        let defaults = CentralRadOscInput::default();
        StabilitySettings {
            rad_osc: CentralRadOscInput {
                central_xi: partial.central_xi.unwrap_or(defaults.central_xi),
                int_abs_tol: partial.int_abs_tol.unwrap_or(defaults.int_abs_tol),
                int_rel_tol: partial.int_rel_tol.unwrap_or(defaults.int_rel_tol),
                root_abs_tol: partial.root_abs_tol.unwrap_or(defaults.root_abs_tol),
                root_rel_tol: partial.root_rel_tol.unwrap_or(defaults.root_rel_tol),
                root_max_iterations: partial
                    .root_max_iterations
                    .unwrap_or(defaults.root_max_iterations),
            },
            omega_squared_guess: partial
                .omega_squared_guess
                .unwrap_or(DEFAULT_OMEGA_SQUARED_GUESS),
            conversion: partial.conversion.unwrap_or_default(),
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value_str) = kv_pair.split_once('=').ok_or_else(|| {
                CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                ))
            })?;
            let float = || {
                value_str.parse::<f64>().map_err(|_| {
                    CliError::Config(format!("Invalid float value for {}: {}", key, value_str))
                })
            };
            let integer = || {
                value_str.parse::<usize>().map_err(|_| {
                    CliError::Config(format!("Invalid integer value for {}: {}", key, value_str))
                })
            };

            match key {
                "tov.min-radius" => {
                    self.tov.get_or_insert_with(Default::default).min_radius = Some(float()?)
                }
                "tov.max-radius" => {
                    self.tov.get_or_insert_with(Default::default).max_radius = Some(float()?)
                }
                "tov.relative-tolerance" => {
                    self.tov
                        .get_or_insert_with(Default::default)
                        .relative_tolerance = Some(float()?)
                }
                "tov.max-steps" => {
                    self.tov.get_or_insert_with(Default::default).max_steps = Some(integer()?)
                }
                "family.start" => {
                    self.family.get_or_insert_with(Default::default).start = Some(float()?)
                }
                "family.stop" => {
                    self.family.get_or_insert_with(Default::default).stop = Some(float()?)
                }
                "family.num-stars" => {
                    self.family.get_or_insert_with(Default::default).num_stars = Some(integer()?)
                }
                "stability.omega-squared-guess" => {
                    self.stability
                        .get_or_insert_with(Default::default)
                        .omega_squared_guess = Some(float()?)
                }
                "stability.root-max-iterations" => {
                    self.stability
                        .get_or_insert_with(Default::default)
                        .root_max_iterations = Some(integer()?)
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}
