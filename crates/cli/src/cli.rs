use clap::{Args, Parser, Subcommand, ValueEnum};

/// Phone catalog analytics.
///
/// Ranks similar phones, segments the market into price tiers and flags
/// mispriced models from a JSON catalog.
#[derive(Parser, Debug)]
#[command(name = "handset", about = "Phone catalog analytics")]
pub struct CliArgs {
    /// Catalog file: JSON array of phone records (overrides config file)
    #[arg(long, global = true, env = "HANDSET_CATALOG")]
    pub catalog: Option<String>,

    /// Path to config file (default: ~/.config/handset/config.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Seed for segmentation restarts (overrides config and env)
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Log progress at info level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rank catalog phones against a spec
    Similar(SimilarArgs),

    /// Rank catalog phones against one catalog member
    SimilarTo {
        /// Catalog position of the reference phone
        index: usize,

        /// Number of results (default: configured top_k)
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Split the catalog into Budget / Mid-Range / Premium
    Segment,

    /// Flag over- and under-priced phones and spec outliers
    Anomalies {
        /// Residual threshold in standard deviations
        #[arg(long)]
        residual_sigma: Option<f64>,

        /// Spec outlier z-score threshold
        #[arg(long)]
        outlier_z: Option<f64>,
    },

    /// Run every analysis and print one combined report
    Report {
        /// Also rank phones against this catalog member
        #[arg(long)]
        like: Option<usize>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SimilarArgs {
    #[arg(long)]
    pub ram: f64,

    #[arg(long)]
    pub battery: f64,

    /// Screen diagonal in inches
    #[arg(long)]
    pub screen: f64,

    /// Weight in grams
    #[arg(long)]
    pub weight: f64,

    #[arg(long)]
    pub year: i32,

    /// Target price in USD (estimated from the catalog when omitted)
    #[arg(long)]
    pub price: Option<f64>,

    /// Number of results (default: configured top_k)
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Only return phones of this brand
    #[arg(long)]
    pub brand: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
