mod catalog;
mod cli;
mod config;
mod terminal;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use handset_compute::{AnalyticsEngine, SimilarityResult};
use handset_core::{
    config::load_dotenv, AnalyticsConfig, AnalyticsError, BrandIndex, PhoneRecord, PhoneSpec,
};

use crate::catalog::load_catalog;
use crate::cli::{CliArgs, Command, SimilarArgs};
use crate::config::CliConfig;
use crate::terminal::Terminal;

fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Initialize tracing
    let default_level = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();

    // Load config: flags > config file > env > defaults
    let mut config = CliConfig::load(args.config.as_deref(), AnalyticsConfig::from_env())
        .context("failed to load configuration")?;
    if let Some(seed) = args.seed {
        config.analytics.segmentation.seed = Some(seed);
    }
    if let Command::Anomalies {
        residual_sigma,
        outlier_z,
    } = &args.command
    {
        if let Some(sigma) = residual_sigma {
            config.analytics.anomaly.residual_sigma = *sigma;
        }
        if let Some(z) = outlier_z {
            config.analytics.anomaly.outlier_z = *z;
        }
    }
    config.analytics.log_summary();

    let catalog_path = config.resolve_catalog(args.catalog.as_deref())?;
    let catalog = load_catalog(&catalog_path)?;
    let engine = AnalyticsEngine::new(config.analytics).context("invalid analytics configuration")?;
    let terminal = Terminal::new(args.format);

    match &args.command {
        Command::Similar(similar) => run_similar(&engine, &catalog, similar, &terminal),
        Command::SimilarTo { index, top_k } => {
            let results = engine
                .similar_to_member(*index, &catalog, *top_k)
                .with_context(|| format!("similarity search for catalog entry {} failed", index))?;
            let query = PhoneSpec::from(&catalog[*index]);
            terminal.print_similar(&query, false, &results)
        }
        Command::Segment => {
            let segmentation = engine.segment(&catalog).context("segmentation failed")?;
            terminal.print_segments(&segmentation)
        }
        Command::Anomalies { .. } => {
            let report = engine.anomalies(&catalog).context("anomaly detection failed")?;
            terminal.print_anomalies(&report, &catalog)
        }
        Command::Report { like } => {
            let query = match like {
                Some(i) => Some(PhoneSpec::from(catalog.get(*i).with_context(|| {
                    format!("--like {} is out of range for {} phones", i, catalog.len())
                })?)),
                None => None,
            };
            let report = engine
                .run_all(&catalog, query.as_ref())
                .context("analytics run failed")?;
            terminal.print_report(&report, &catalog)
        }
    }
}

fn run_similar(
    engine: &AnalyticsEngine,
    catalog: &[PhoneRecord],
    args: &SimilarArgs,
    terminal: &Terminal,
) -> Result<()> {
    let mut query = PhoneSpec {
        ram_gb: args.ram,
        battery_mah: args.battery,
        screen_in: args.screen,
        weight_g: args.weight,
        launch_year: args.year,
        price_usd: args.price.unwrap_or(1.0),
    };

    let price_estimated = args.price.is_none();
    if price_estimated {
        let model = engine
            .price_model(catalog)
            .context("cannot estimate a price for the query, pass --price")?;
        query.price_usd = model.predict(&query);
        info!(price = query.price_usd, "Estimated query price from catalog");
        anyhow::ensure!(
            query.price_usd > 0.0,
            "estimated price ${:.2} is not positive, pass --price",
            query.price_usd
        );
    }

    let top_k = args.top_k.unwrap_or(engine.config().similarity.top_k);
    let results = rank_query(engine, catalog, &query, top_k, args.brand.as_deref())?;
    terminal.print_similar(&query, price_estimated, &results)
}

/// Rank `catalog` against `query`, optionally keeping only one brand.
fn rank_query(
    engine: &AnalyticsEngine,
    catalog: &[PhoneRecord],
    query: &PhoneSpec,
    top_k: usize,
    brand: Option<&str>,
) -> Result<Vec<SimilarityResult>> {
    if top_k == 0 {
        return Err(AnalyticsError::InvalidArgument("--top-k must be at least 1".to_string()).into());
    }
    let Some(brand) = brand else {
        return Ok(engine.similar(query, catalog, Some(top_k))?);
    };

    let brands = BrandIndex::from_catalog(catalog);
    let wanted = brands.category_of(brand)?;
    // Rank the whole catalog so normalization is unaffected, then filter.
    let mut all = engine.similar(query, catalog, Some(catalog.len()))?;
    all.retain(|r| brands.category_of(&r.record.brand).ok() == Some(wanted));
    all.truncate(top_k);
    Ok(all)
}
