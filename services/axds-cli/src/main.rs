//! Command line access to Axiom Data Science catalogs.
//!
//! - `axds search`: open a catalog and list its entries
//! - `axds read <ENTRY>`: read one entry as CSV or a dataset summary
//! - `axds names`: list the parameter names variables can be selected by

mod config;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use axds_catalog::{
    available_names, open_axds_cat, BinInterval, Catalog, CatalogConfig, Endpoints, OutType,
    Output,
};
use axds_common::BoundingBox;

use config::{parse_criterion, parse_qartod, CatalogFile};

#[derive(Parser, Debug)]
#[command(name = "axds")]
#[command(about = "Search and read Axiom Data Science datasets")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level
    #[arg(long, env = "AXDS_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search and list catalog entries
    Search(CatalogArgs),

    /// Read one catalog entry
    Read {
        #[command(flatten)]
        catalog: CatalogArgs,

        /// Entry name (dataset uuid)
        entry: String,

        /// Print at most this many rows
        #[arg(long, default_value = "20")]
        head: usize,
    },

    /// List available parameter names
    Names,
}

#[derive(clap::Args, Debug, Default)]
struct CatalogArgs {
    /// Catalog definition file (YAML); flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// platform2 or sensor_station
    #[arg(long)]
    datatype: Option<String>,

    /// min_lon,min_lat,max_lon,max_lat
    #[arg(long, allow_hyphen_values = true)]
    bbox: Option<String>,

    #[arg(long)]
    min_time: Option<String>,

    #[arg(long)]
    max_time: Option<String>,

    /// Free-text search term
    #[arg(long)]
    search_for: Option<String>,

    /// dataframe or xarray
    #[arg(long)]
    outtype: Option<String>,

    #[arg(long)]
    page_size: Option<usize>,

    /// Comma-separated parameter names to filter by
    #[arg(long, value_delimiter = ',')]
    standard_names: Vec<String>,

    /// Comma-separated keys matched against parameter names
    #[arg(long, value_delimiter = ',')]
    keys_to_match: Vec<String>,

    /// Regex criterion for a key as KEY.ATTRIBUTE=PATTERN; repeatable
    #[arg(long)]
    criteria: Vec<String>,

    /// off, columns, or comma-separated flags to keep
    #[arg(long)]
    qartod: Option<String>,

    /// Leave units out of column names
    #[arg(long)]
    no_units: bool,

    /// hourly, daily, weekly, monthly or yearly
    #[arg(long)]
    bin_interval: Option<String>,

    /// Log catalog construction at INFO
    #[arg(short, long)]
    verbose: bool,
}

impl CatalogArgs {
    fn into_config(self) -> Result<CatalogConfig> {
        let endpoints = Endpoints::from_env();

        let mut config = match (&self.config, &self.datatype) {
            (Some(path), _) => CatalogFile::load(path)?.into_config(endpoints),
            (None, datatype) => {
                CatalogConfig::for_datatype(datatype.as_deref().unwrap_or("platform2"))?
                    .endpoints(endpoints)
            }
        };

        if let (Some(_), Some(datatype)) = (&self.config, &self.datatype) {
            config.datatype = datatype.parse()?;
        }

        if let Some(bbox) = &self.bbox {
            let b = BoundingBox::from_bbox_string(bbox)
                .with_context(|| format!("Invalid --bbox '{}'", bbox))?;
            config.kwargs_search = config
                .kwargs_search
                .bbox(b.min_lon, b.min_lat, b.max_lon, b.max_lat);
        }
        if self.min_time.is_some() {
            config.kwargs_search.min_time = self.min_time;
        }
        if self.max_time.is_some() {
            config.kwargs_search.max_time = self.max_time;
        }
        if self.search_for.is_some() {
            config.kwargs_search.search_for = self.search_for;
        }
        if let Some(outtype) = &self.outtype {
            config.outtype = outtype.parse::<OutType>()?;
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if !self.standard_names.is_empty() {
            config.standard_names = Some(self.standard_names);
        }
        for criterion in &self.criteria {
            let (key, attribute, pattern) = parse_criterion(criterion)?;
            config
                .criteria
                .entry(key)
                .or_default()
                .insert(attribute, pattern);
        }
        if !self.keys_to_match.is_empty() {
            config.keys_to_match = Some(self.keys_to_match);
        }
        if let Some(qartod) = &self.qartod {
            config.qartod = parse_qartod(qartod)?;
        }
        if self.no_units {
            config.use_units = false;
        }
        if let Some(interval) = &self.bin_interval {
            config.bin_interval = Some(interval.parse::<BinInterval>()?);
        }
        if self.verbose {
            config.verbose = true;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.json_logs)?;

    match args.command {
        Command::Search(catalog_args) => {
            let catalog = open_catalog(catalog_args).await?;
            print_entries(&catalog, &mut io::stdout().lock())?;
        }
        Command::Read {
            catalog: catalog_args,
            entry,
            head,
        } => {
            let catalog = open_catalog(catalog_args).await?;
            let source = catalog.get(&entry)?;
            let output = source
                .read()
                .await
                .with_context(|| format!("Failed to read entry {}", entry))?;
            print_output(&output, head, &mut io::stdout().lock())?;
        }
        Command::Names => {
            let names = available_names(&Endpoints::from_env()).await?;
            let mut out = io::stdout().lock();
            for name in names {
                writeln!(out, "{}", name)?;
            }
        }
    }

    Ok(())
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

async fn open_catalog(args: CatalogArgs) -> Result<Catalog> {
    let config = args.into_config()?;
    info!(datatype = %config.datatype, page_size = config.page_size, "Opening catalog");
    let catalog = open_axds_cat(config)
        .await
        .context("Failed to open catalog")?;
    info!(entries = catalog.len(), "Catalog ready");
    Ok(catalog)
}

fn print_entries(catalog: &Catalog, out: &mut impl Write) -> Result<()> {
    for source in catalog {
        let metadata = source.metadata();
        let bounds = metadata
            .bounds
            .map(|b| {
                format!(
                    "{:.3},{:.3},{:.3},{:.3}",
                    b.min_lon, b.min_lat, b.max_lon, b.max_lat
                )
            })
            .unwrap_or_default();
        writeln!(
            out,
            "{}\t{}\t{}",
            source.name(),
            metadata.title.as_deref().unwrap_or(""),
            bounds
        )?;
    }
    Ok(())
}

fn print_output(output: &Output, head: usize, out: &mut impl Write) -> Result<()> {
    match output {
        Output::Table(table) => {
            table.head(head).write_csv(&mut *out)?;
            if table.num_rows() > head {
                writeln!(out, "... {} more rows", table.num_rows() - head)?;
            }
        }
        Output::Dataset(dataset) => write!(out, "{}", dataset)?,
    }
    Ok(())
}
