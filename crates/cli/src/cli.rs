use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Branch performance scoring, outlier detection, dashboard export and chat.
#[derive(Parser, Debug)]
#[command(name = "vista", version, about = "Branch performance analytics")]
pub struct CliArgs {
    /// Config profile (reads {PROFILE}_{KEY} before {KEY})
    #[arg(long, global = true, env = "VISTA_PROFILE")]
    pub profile: Option<String>,

    /// Scoring config YAML (overrides SCORING_CONFIG)
    #[arg(long, global = true)]
    pub scoring: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct DataArg {
    /// Branch metrics JSON (array of records)
    #[arg(long, short, env = "VISTA_DATA")]
    pub data: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score every branch, or show one branch in detail
    Score {
        #[command(flatten)]
        data: DataArg,
        /// Branch id or name for a detailed report
        #[arg(long)]
        branch: Option<String>,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Branch profile: takeaways, risks and focus areas
    Profile {
        #[command(flatten)]
        data: DataArg,
        /// Branch id or name
        branch: String,
    },
    /// List z-score outliers
    Anomalies {
        #[command(flatten)]
        data: DataArg,
        /// Threshold on |z| (defaults to ANOMALY_Z_THRESHOLD)
        #[arg(long)]
        z: Option<f64>,
        /// Metric keys to scan, e.g. npa_percent (repeatable)
        #[arg(long = "metric")]
        metrics: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Print the compiled dashboard formulas
    Formula {
        /// Number of data rows the formulas address
        #[arg(long, default_value = "8")]
        rows: usize,
    },
    /// Write the dashboard workbook as JSON
    Export {
        #[command(flatten)]
        data: DataArg,
        /// Output file
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Interactive questions about the data
    Chat {
        #[command(flatten)]
        data: DataArg,
        /// Skip external backends and answer locally
        #[arg(long)]
        offline: bool,
        /// Save the conversation here on exit
        #[arg(long)]
        transcript: Option<PathBuf>,
    },
    /// Show the effective configuration (secrets redacted)
    Config,
}
