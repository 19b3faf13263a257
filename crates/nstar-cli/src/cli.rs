use clap::{Args, Parser, Subcommand, ValueEnum};
use nstar::workflows::family::Spacing;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "nstar - structure and radial stability of neutron, quark and hybrid stars from an equation of state.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of worker threads for a stellar family.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute a family of stars over a range of central pressures and write it as CSV.
    Family(FamilyArgs),
    /// Compute the radial profiles of a single star and write them as CSV.
    Profile(ProfileArgs),
}

/// Options shared by every command that builds stars from a configuration file.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Path to the run configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Skip the radial stability analysis even if the config file enables it.
    #[arg(long)]
    pub no_stability: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S tov.max-radius=200
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `family` subcommand.
#[derive(Args, Debug)]
pub struct FamilyArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Path of the output CSV table.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Override the first central pressure (MeV/fm^3).
    #[arg(long, value_name = "FLOAT")]
    pub start: Option<f64>,

    /// Override the last central pressure (MeV/fm^3).
    #[arg(long, value_name = "FLOAT")]
    pub stop: Option<f64>,

    /// Override the number of stars.
    #[arg(short = 'n', long, value_name = "INT")]
    pub num_stars: Option<usize>,

    /// Override the spacing of the central pressures.
    #[arg(long, value_enum, value_name = "SPACING")]
    pub spacing: Option<SpacingArg>,

    /// Stop at the first star that fails instead of skipping it.
    #[arg(long)]
    pub fail_fast: bool,
}

/// Arguments for the `profile` subcommand.
#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Central pressure of the star (MeV/fm^3).
    #[arg(short = 'p', long, required = true, value_name = "FLOAT")]
    pub central_pressure: f64,

    /// Path of the output CSV profile.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpacingArg {
    Linear,
    Geometric,
}

impl From<SpacingArg> for Spacing {
    fn from(arg: SpacingArg) -> Self {
        match arg {
            SpacingArg::Linear => Spacing::Linear,
            SpacingArg::Geometric => Spacing::Geometric,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_family_with_overrides() {
        let cli = Cli::parse_from([
            "nstar", "-vv", "-j", "4", "family", "-c", "run.toml", "-o", "stars.csv", "--start",
            "5", "-n", "10", "--spacing", "geometric", "--fail-fast",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.threads, Some(4));
        let Commands::Family(args) = cli.command else {
            panic!("Expected 'family' subcommand");
        };
        assert_eq!(args.start, Some(5.0));
        assert_eq!(args.num_stars, Some(10));
        assert_eq!(args.spacing, Some(SpacingArg::Geometric));
        assert!(args.fail_fast);
        assert!(!args.model.no_stability);
    }

    #[test]
    fn profile_requires_central_pressure() {
        let result = Cli::try_parse_from(["nstar", "profile", "-c", "run.toml", "-o", "p.csv"]);
        assert!(result.is_err());
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result =
            Cli::try_parse_from(["nstar", "-q", "-v", "profile", "-c", "a", "-o", "b", "-p", "1"]);
        assert!(result.is_err());
    }
}
