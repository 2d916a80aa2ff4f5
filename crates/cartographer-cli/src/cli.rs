use cartographer::core::models::kind::ModelKind;
use clap::{Args, Parser, ValueEnum};
use std::ffi::OsString;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

/// Long options of `cartographer` that are also accepted with a single dash.
pub const LEGACY_LONG_FLAGS: &[&str] = &[
    "input",
    "output",
    "model",
    "model_path",
    "resolution",
    "intensity",
    "phase",
];

/// Logging switches shared by both binaries.
#[derive(Args, Debug, Clone, Default)]
pub struct LoggingArgs {
    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(
    name = "cartographer",
    author = "The Cartographer Developers",
    version,
    about = "Cartographer - predict phosphate, sugar and base positions in crystallographic density maps.",
    help_template = HELP_TEMPLATE,
)]
pub struct PredictCli {
    /// Input reflection file (.mtz), or a density map (.map, .ccp4, .mrc).
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Output path for the predicted map (CCP4 format).
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,

    /// Model selection: a model name such as 'phos', or a path to a model file.
    #[arg(short, long, value_name = "NAME_OR_PATH")]
    pub model: Option<String>,

    /// Explicit path to a model file; takes precedence over --model.
    #[arg(long = "model_path", visible_alias = "model-path", value_name = "PATH")]
    pub model_path: Option<PathBuf>,

    /// Resolution cutoff in Å; reflections beyond it are discarded before the map is computed.
    #[arg(short, long, value_name = "ANGSTROM")]
    pub resolution: Option<f64>,

    /// Name of the amplitude column in the MTZ file [default: FWT].
    #[arg(long, value_name = "LABEL")]
    pub intensity: Option<String>,

    /// Name of the phase column in the MTZ file [default: PHWT].
    #[arg(long, value_name = "LABEL")]
    pub phase: Option<String>,

    /// Write the class-1 probability instead of the most likely class.
    #[arg(long)]
    pub raw_values: bool,

    /// Also write the map computed from the reflections.
    #[arg(long, value_name = "PATH")]
    pub save_raw: Option<PathBuf>,

    /// Also write the orthogonal map that the model is run on.
    #[arg(long, value_name = "PATH")]
    pub save_interpolated: Option<PathBuf>,

    /// Path to a configuration file in TOML format.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingArgs,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, value_name = "NUM")]
    pub threads: Option<usize>,
}

impl PredictCli {
    /// Parses the process arguments, accepting single-dash long options.
    pub fn parse_normalized() -> Self {
        Self::parse_from(normalize_legacy_flags(std::env::args_os(), LEGACY_LONG_FLAGS))
    }

    pub fn try_parse_normalized_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(normalize_legacy_flags(args, LEGACY_LONG_FLAGS))
    }
}

/// Model kinds accepted by `cartographer-install -m`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChoice {
    Phos,
    Sugar,
    Base,
}

impl From<ModelChoice> for ModelKind {
    fn from(choice: ModelChoice) -> Self {
        match choice {
            ModelChoice::Phos => ModelKind::Phos,
            ModelChoice::Sugar => ModelKind::Sugar,
            ModelChoice::Base => ModelKind::Base,
        }
    }
}

/// Where `cartographer-install` places model files.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallTarget {
    /// The Python site-packages directory.
    #[value(name = "site_packages")]
    SitePackages,
    /// The CCP4 library data directory ($CLIBD).
    Ccp4,
}

#[derive(Parser, Debug)]
#[command(
    name = "cartographer-install",
    author = "The Cartographer Developers",
    version,
    about = "Download and install Cartographer models.",
    help_template = HELP_TEMPLATE,
)]
pub struct InstallCli {
    /// The model to install.
    #[arg(short, long, value_enum)]
    pub model: ModelChoice,

    /// Installation target.
    #[arg(short, long, value_enum, default_value_t = InstallTarget::SitePackages)]
    pub output: InstallTarget,

    /// Install every available model, regardless of --model.
    #[arg(long)]
    pub all: bool,

    /// Download models again even if they are already installed.
    #[arg(long)]
    pub reinstall: bool,

    /// Path to a configuration file in TOML format.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl InstallCli {
    /// The models selected on the command line.
    pub fn selected_models(&self) -> Vec<ModelKind> {
        if self.all {
            ModelKind::ALL.to_vec()
        } else {
            vec![self.model.into()]
        }
    }
}

/// Rewrites `-name` and `-name=value` into their `--` forms for every name in `long_flags`.
pub fn normalize_legacy_flags<I, T>(args: I, long_flags: &[&str]) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            let Some(text) = arg.to_str() else {
                return arg;
            };
            let Some(body) = text.strip_prefix('-').filter(|b| !b.starts_with('-')) else {
                return arg;
            };
            let name = body.split_once('=').map_or(body, |(name, _)| name);
            if long_flags.contains(&name) {
                OsString::from(format!("-{text}"))
            } else {
                arg
            }
        })
        .collect()
}
