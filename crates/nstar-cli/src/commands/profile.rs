use crate::cli::ProfileArgs;
use crate::config::{ModelConfig, PartialRunConfig};
use crate::error::{CliError, Result};
use nstar::core::models::profiles::InternalProfiles;
use nstar::workflows::factory::{
    HybridStarFactory, HybridStarStabilityFactory, StarFactory, StarStabilityFactory,
};
use std::fs::File;
use std::io::BufWriter;
use tracing::info;

pub fn run(args: ProfileArgs) -> Result<()> {
    let partial_config = PartialRunConfig::from_file(&args.model.config)?;
    let model = partial_config.merge_model(&args.model)?;

    info!(
        central_pressure = args.central_pressure,
        "Computing radial profiles."
    );
    let profiles = compute_profiles(&model, args.central_pressure)?;

    let file = File::create(&args.output).map_err(|e| CliError::Output {
        path: args.output.clone(),
        source: e.into(),
    })?;
    profiles
        .write_csv(BufWriter::new(file))
        .map_err(|e| CliError::Output {
            path: args.output.clone(),
            source: e.into(),
        })?;

    println!(
        "✓ Profile of a star with R = {:.4} km ({} points) written to: {}",
        profiles.radius(),
        profiles.len(),
        args.output.display()
    );
    Ok(())
}

pub fn compute_profiles(model: &ModelConfig, central_pressure: f64) -> Result<InternalProfiles> {
    let tov_input = model.tov_input.clone();
    let profiles = match (model.stability, model.is_hybrid()) {
        (None, false) => StarFactory::new(tov_input).profiles(central_pressure)?,
        (Some(stability), false) => StarStabilityFactory::new(
            tov_input,
            stability.rad_osc,
            stability.omega_squared_guess,
        )?
        .profiles(central_pressure)?,
        (None, true) => HybridStarFactory::new(tov_input)?.profiles(central_pressure)?,
        (Some(stability), true) => HybridStarStabilityFactory::new(
            tov_input,
            stability.rad_osc,
            stability.omega_squared_guess,
            stability.conversion,
        )?
        .profiles(central_pressure)?,
    };
    Ok(profiles)
}
