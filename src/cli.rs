use std::path::PathBuf;

use clap::Parser;

use crate::models::Ecosystem;

#[derive(Parser, Debug)]
#[command(
    name = "chainmap",
    about = "Map a repository's dependency surface and flag supply-chain risk",
    version
)]
pub struct Cli {
    /// Repository path to scan
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Correlate findings against external vulnerability feeds
    #[arg(long)]
    pub online: bool,

    /// Deadline in seconds for the online correlation phase
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Config file [default: ./.chainmap/config.toml, fallback ~/.config/chainmap/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Write the JSON report to this file
    #[arg(short, long, value_name = "FILE", default_value = "chainmap-report.json")]
    pub output: PathBuf,

    /// Skip SBOM generation
    #[arg(long)]
    pub no_sbom: bool,

    /// SBOM output path
    #[arg(long, value_name = "FILE", default_value = "sbom.json")]
    pub sbom: PathBuf,

    /// Exclude an ecosystem from scanning (repeatable)
    #[arg(long = "exclude-ecosystem", value_name = "ECOSYSTEM")]
    pub exclude_ecosystem: Vec<EcosystemArg>,

    /// Bound on concurrent feed requests (overrides config)
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Verbose output (full risk table, debug logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print the summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum EcosystemArg {
    Npm,
    Python,
    Go,
    Rust,
    Java,
    Ruby,
    Php,
    Dotnet,
    Swift,
    R,
    Make,
    Container,
    CiWorkflow,
}

impl From<&EcosystemArg> for Ecosystem {
    fn from(arg: &EcosystemArg) -> Self {
        match arg {
            EcosystemArg::Npm => Ecosystem::Npm,
            EcosystemArg::Python => Ecosystem::Python,
            EcosystemArg::Go => Ecosystem::Go,
            EcosystemArg::Rust => Ecosystem::Rust,
            EcosystemArg::Java => Ecosystem::Java,
            EcosystemArg::Ruby => Ecosystem::Ruby,
            EcosystemArg::Php => Ecosystem::Php,
            EcosystemArg::Dotnet => Ecosystem::Dotnet,
            EcosystemArg::Swift => Ecosystem::Swift,
            EcosystemArg::R => Ecosystem::R,
            EcosystemArg::Make => Ecosystem::Make,
            EcosystemArg::Container => Ecosystem::Container,
            EcosystemArg::CiWorkflow => Ecosystem::CiWorkflow,
        }
    }
}
