use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use retail_prep::acquire::Acquirer;
use retail_prep::calculate::numeric_histograms;
use retail_prep::config::AppConfig;
use retail_prep::fetch::HttpSource;
use retail_prep::models::Table;
use retail_prep::prepare::{prep_german_data, prep_store_data};
use retail_prep::storage::{write_table, CsvTableStore};

#[derive(Parser)]
#[command(name = "retail-prep")]
#[command(about = "Acquire and prepare retail sales and German energy data")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Cache directory (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch or load items, stores, sales and the merged table
    Acquire,

    /// Download or load the German daily energy table
    Energy,

    /// Acquire and prepare the merged store table
    PrepareStore {
        /// Write the prepared table to this CSV file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Histogram bins per numeric column
        #[arg(long, default_value = "20")]
        bins: usize,
    },

    /// Acquire and prepare the energy table
    PrepareEnergy {
        /// Write the prepared table to this CSV file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Histogram bins per numeric column
        #[arg(long, default_value = "20")]
        bins: usize,
    },

    /// Fetch a retail dataset by page number
    FetchPaged {
        /// Dataset name (items, stores, sales)
        name: String,

        /// Maximum pages to request (default from config)
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Remove cache entries (all of them when no name is given)
    Clean {
        names: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {:?}", cli.config))?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    let log_level = cli.log_level.unwrap_or_else(|| config.log_level.clone());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let (json_layer, text_layer) = if cli.json_logs {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();

    tracing::info!("Starting retail-prep v{}", env!("CARGO_PKG_VERSION"));

    let source = HttpSource::new(config.http_config())?;
    let store = CsvTableStore::new(config.storage_config());
    let acquirer = Acquirer::from_config(&config, source, store)?;

    match cli.command {
        Commands::Acquire => {
            let names = acquirer.names().clone();
            for name in [&names.items, &names.stores, &names.sales] {
                let df = acquirer.get_df(name).await?;
                println!("{:<8} {:>7} rows {:>3} columns", name, df.len(), df.width());
            }
            let merged = acquirer.get_store_data().await?;
            print_summary(&names.merged, &merged);
        }

        Commands::Energy => {
            let df = acquirer.opsd_germany_daily().await?;
            print_summary(&acquirer.names().energy, &df);
        }

        Commands::PrepareStore { output, bins } => {
            let merged = acquirer.get_store_data().await?;
            let prepared = prep_store_data(merged, &config.retail.sale_date_format)?;
            report(&prepared, bins, output.as_deref())?;
        }

        Commands::PrepareEnergy { output, bins } => {
            let raw = acquirer.opsd_germany_daily().await?;
            let prepared = prep_german_data(raw, &config.energy.date_format)?;
            report(&prepared, bins, output.as_deref())?;
        }

        Commands::FetchPaged { name, max_pages } => {
            let max_pages = max_pages.unwrap_or(config.retail.max_pages);
            let df = acquirer.get_df_paged(&name, max_pages).await?;
            println!("{}: {} records from at most {} pages", name, df.len(), max_pages);
        }

        Commands::Clean { names } => {
            let targets: Vec<String> = if names.is_empty() {
                config.cache.all().iter().map(|n| n.to_string()).collect()
            } else {
                names
            };

            let mut removed = Vec::new();
            for name in &targets {
                removed.extend(acquirer.invalidate(name).await?);
            }
            if removed.is_empty() {
                println!("Nothing to remove.");
            } else {
                println!("Removed: {}", removed.join(", "));
            }
        }
    }

    Ok(())
}

fn print_summary(name: &str, df: &Table) {
    println!("=== {} ===", name);
    println!("Rows:    {}", df.len());
    match df.index_column() {
        Some(index) => println!("Index:   {} ({})", index.name(), index.dtype()),
        None => println!("Index:   0..{}", df.len()),
    }
    println!("Columns:");
    for column in df.columns() {
        println!(
            "  {:<20} {:<12} nulls: {}",
            column.name().as_str(),
            column.dtype().to_string(),
            column.null_count()
        );
    }
}

fn report(df: &Table, bins: usize, output: Option<&Path>) -> Result<()> {
    print_summary("prepared", df);
    for hist in numeric_histograms(df, bins)? {
        println!();
        print!("{}", hist);
    }

    if let Some(path) = output {
        let file = File::create(path).with_context(|| format!("creating {:?}", path))?;
        write_table(df, BufWriter::new(file))?;
        println!("\nWrote {} rows to {:?}", df.len(), path);
    }
    Ok(())
}
