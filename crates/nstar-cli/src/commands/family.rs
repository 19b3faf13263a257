use crate::cli::FamilyArgs;
use crate::config::{FamilyConfig, PartialRunConfig};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use nstar::engine::progress::ProgressReporter;
use nstar::workflows::factory::{
    HybridStarFactory, HybridStarStabilityFactory, StarFactory, StarStabilityFactory,
};
use nstar::workflows::family::{StellarFamily, create_stellar_family};
use std::fs::File;
use std::io::BufWriter;
use tracing::{info, warn};

pub fn run(args: FamilyArgs, threads: Option<usize>) -> Result<()> {
    let partial_config = PartialRunConfig::from_file(&args.model.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_family(&args, threads)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Computing {} star(s){}...",
        config.central_pressures.len(),
        if config.model.stability.is_some() {
            " with radial stability"
        } else {
            ""
        }
    );
    let family = build_family(&config, &reporter)?;

    for failure in &family.failures {
        warn!(
            central_pressure = failure.central_pressure,
            "Star skipped: {}", failure.error
        );
    }
    if family.is_empty() {
        warn!("No star of the family could be computed.");
    }

    let file = File::create(&args.output).map_err(|e| CliError::Output {
        path: args.output.clone(),
        source: e.into(),
    })?;
    family
        .write_csv(BufWriter::new(file))
        .map_err(|e| CliError::Output {
            path: args.output.clone(),
            source: e.into(),
        })?;

    println!(
        "✓ {} star(s) written to: {}",
        family.len(),
        args.output.display()
    );
    Ok(())
}

/// Picks the factory matching the model: hybrid or not, with or without stability.
pub fn build_family(config: &FamilyConfig, reporter: &ProgressReporter) -> Result<StellarFamily> {
    let model = &config.model;
    let tov_input = model.tov_input.clone();
    let pressures = &config.central_pressures;
    let options = &config.options;

    let family = match (model.stability, model.is_hybrid()) {
        (None, false) => {
            create_stellar_family(&StarFactory::new(tov_input), pressures, options, reporter)?
        }
        (Some(stability), false) => {
            let factory = StarStabilityFactory::new(
                tov_input,
                stability.rad_osc,
                stability.omega_squared_guess,
            )?;
            create_stellar_family(&factory, pressures, options, reporter)?
        }
        (None, true) => {
            let factory = HybridStarFactory::new(tov_input)?;
            create_stellar_family(&factory, pressures, options, reporter)?
        }
        (Some(stability), true) => {
            let factory = HybridStarStabilityFactory::new(
                tov_input,
                stability.rad_osc,
                stability.omega_squared_guess,
                stability.conversion,
            )?;
            create_stellar_family(&factory, pressures, options, reporter)?
        }
    };
    Ok(family)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn writes_one_row_per_star() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("run.toml");
        let output_path = dir.path().join("stars.csv");
        fs::write(
            &config_path,
            "[eos]\ntype = \"mit-bag\"\n[family]\nstart = 50.0\nstop = 300.0\nnum-stars = 2\n",
        )
        .unwrap();

        let cli = Cli::parse_from([
            "nstar",
            "family",
            "-c",
            config_path.to_str().unwrap(),
            "-o",
            output_path.to_str().unwrap(),
        ]);
        let Commands::Family(args) = cli.command else {
            panic!("Expected 'family' subcommand");
        };
        run(args, Some(2)).unwrap();

        let content = fs::read_to_string(&output_path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "central_pressure,radius,mass");
        assert!(lines[1].starts_with("50,"));
        assert!(lines[2].starts_with("300,"));
    }

    #[test]
    fn hybrid_stability_family_has_all_columns() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("hybrid.toml");
        fs::write(
            &config_path,
            r#"
            [eos]
            type = "hybrid"
            transitional-pressure = 4.7e-4
            low = { type = "bps" }
            high = { type = "mit-bag" }

            [stability]
            omega-squared-guess = -4.9e-8

            [family]
            start = 5e-4
            stop = 5e-4
            num-stars = 1
            "#,
        )
        .unwrap();
        let cli = Cli::parse_from([
            "nstar",
            "family",
            "-c",
            config_path.to_str().unwrap(),
            "-o",
            "unused.csv",
        ]);
        let Commands::Family(args) = cli.command else {
            panic!("Expected 'family' subcommand");
        };
        let config = PartialRunConfig::from_file(&config_path)
            .unwrap()
            .merge_family(&args, Some(1))
            .unwrap();

        let family = build_family(&config, &ProgressReporter::new()).unwrap();
        assert_eq!(
            family.columns,
            [
                "central_pressure",
                "radius",
                "mass",
                "mode",
                "omega_squared",
                "core_radius",
                "core_mass"
            ]
        );
        assert_eq!(family.column("mode").unwrap(), [0.0]);
        let omega_squared = family.column("omega_squared").unwrap()[0];
        assert!((omega_squared - -4.3076e-8).abs() < 1e-11);
    }
}
