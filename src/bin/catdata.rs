use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, Dispatch};

use catdata_opendata::logging::{LogConfig, LogFormat, LogLevel};
use catdata_opendata::metadata::{export_table, JsonSource, MetadataLookup, MetadataTable};
use catdata_opendata::{
    end_of_day_hour, parse_datetime_like, yesterday, ClientOptions, Dataset, FetchLoop,
    FilterSet, RetryPolicy, SodaClient, TimeRange, WriterOptions, DEFAULT_DOMAIN, DEFAULT_LIMIT,
    DEFAULT_MAX_ATTEMPTS,
};

/// Catalonia open data downloader
#[derive(Parser, Debug)]
#[command(name = "catdata")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Logging level (trace, debug, info, warn, error, critical, notset)
    #[arg(short = 'd', long, env = "CATDATA_LOG", default_value = "info", global = true)]
    log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    /// Portal host or base URL
    #[arg(long, default_value = DEFAULT_DOMAIN, global = true)]
    domain: String,

    /// Socrata application token
    #[arg(long, env = "SODA_APP_TOKEN", global = true, hide_env_values = true)]
    app_token: Option<String>,

    /// HTTP timeout per request in seconds (transport default when unset)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get air quality data (daily)
    Aire(FetchArgs),

    /// Get meteo data (hourly); cities and variables are resolved to codes
    Meteo {
        #[command(flatten)]
        fetch: FetchArgs,

        /// Directory holding meteo_stations.json / meteo_variables.json
        #[arg(long, default_value = "meta")]
        meta_dir: PathBuf,
    },

    /// Save the meteo stations metadata table as JSON
    Stations {
        /// Output folder
        #[arg(short = 'o', long = "output-dir", default_value = ".")]
        output_dir: PathBuf,

        /// Output file name
        #[arg(short = 'f', long = "output-file", default_value = "meteo_stations.json")]
        output_file: String,
    },
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Start time, yyyy-mm-dd[Thh:mm:ss] (default: yesterday)
    #[arg(short, long, allow_hyphen_values = true)]
    start: Option<String>,

    /// End time, yyyy-mm-dd[Thh:mm:ss] (default: yesterday)
    #[arg(short, long, allow_hyphen_values = true)]
    end: Option<String>,

    /// Filter per cities; pass the flag alone for no filter
    #[arg(short, long, num_args = 0.., default_values_t = ["Barcelona".to_string()])]
    cities: Vec<String>,

    /// Filter per observed variables
    #[arg(short, long, num_args = 0..)]
    variables: Vec<String>,

    /// Output folder
    #[arg(short = 'o', long = "output-dir", default_value = ".")]
    output_dir: PathBuf,

    /// Output file, appended to for every time bucket
    #[arg(short = 'f', long = "output-file")]
    output_file: Option<String>,

    /// Generate a zip file for every output file
    #[arg(short, long)]
    zip: bool,

    /// Attempts per request
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    retries: u32,

    /// Pause between attempts in milliseconds
    #[arg(long, default_value_t = 0)]
    retry_delay_ms: u64,

    /// Rows requested per query
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: usize,
}

fn main() {
    let cli = Cli::parse();
    process::exit(run(&cli));
}

/// Process exit code for `cli`: 0 on success, 1 on any error.
fn run(cli: &Cli) -> i32 {
    let dispatch = match log_config(cli).and_then(|cfg| Ok(cfg.dispatch()?)) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return 1;
        }
    };

    tracing::dispatcher::with_default(&dispatch, || match execute(cli, &dispatch) {
        Ok(()) => 0,
        Err(e) => {
            error!("command failed: {e:#}");
            1
        }
    })
}

fn log_config(cli: &Cli) -> anyhow::Result<LogConfig> {
    let level: LogLevel = cli.log_level.parse()?;
    let format: LogFormat = cli.log_format.parse()?;
    Ok(LogConfig::builder().level(level).format(format).build())
}

fn execute(cli: &Cli, dispatch: &Dispatch) -> anyhow::Result<()> {
    let client = SodaClient::new(ClientOptions {
        domain: cli.domain.clone(),
        app_token: cli.app_token.clone(),
        timeout: cli.timeout_secs.map(Duration::from_secs),
    })
    .context("create client")?;

    match &cli.command {
        Commands::Aire(args) => {
            let range = time_range(args, Dataset::AirQuality, Utc::now())?;
            let filter = FilterSet::new(args.cities.clone(), args.variables.clone());
            fetch(client, Dataset::AirQuality, args, &range, &filter, dispatch)
        }
        Commands::Meteo { fetch: args, meta_dir } => {
            let range = time_range(args, Dataset::Meteo, Utc::now())?;
            let lookup = MetadataLookup::new(&client, meta_dir.clone());
            let stations = resolve(&lookup, MetadataTable::Stations, &args.cities)?;
            let variables = resolve(&lookup, MetadataTable::Variables, &args.variables)?;
            let filter = FilterSet::new(stations, variables);
            fetch(client, Dataset::Meteo, args, &range, &filter, dispatch)
        }
        Commands::Stations {
            output_dir,
            output_file,
        } => {
            let path = output_dir.join(output_file);
            let n = export_table(&client, MetadataTable::Stations, &path)
                .with_context(|| format!("export stations to {}", path.display()))?;
            info!(records = n, path = %path.display(), "stations saved");
            Ok(())
        }
    }
}

fn fetch(
    client: SodaClient,
    dataset: Dataset,
    args: &FetchArgs,
    range: &TimeRange,
    filter: &FilterSet,
    dispatch: &Dispatch,
) -> anyhow::Result<()> {
    let writer = WriterOptions {
        output_dir: args.output_dir.clone(),
        fixed_file: args.output_file.clone(),
        compress: args.zip,
    };
    let retry = RetryPolicy {
        max_attempts: args.retries,
        delay: Duration::from_millis(args.retry_delay_ms),
    };

    let report = FetchLoop::new(client, dataset, writer)
        .with_retry(retry)
        .with_limit(args.limit)
        .with_dispatch(dispatch.clone())
        .run(range, filter)?;

    info!(
        rows = report.rows_written,
        failed_cells = report.failed_cells.len(),
        files = report.files.len(),
        archives = report.archives.len(),
        "done"
    );
    Ok(())
}

/// Start defaults to yesterday 00:00; end defaults to yesterday 23:00.
/// Meteo ends are always pushed to hour 23 of their day.
fn time_range(
    args: &FetchArgs,
    dataset: Dataset,
    now: DateTime<Utc>,
) -> anyhow::Result<TimeRange> {
    let start = match &args.start {
        Some(s) => parse_datetime_like(s, now)?,
        None => yesterday(now),
    };
    let mut end: NaiveDateTime = match &args.end {
        Some(s) => parse_datetime_like(s, now)?,
        None => end_of_day_hour(yesterday(now)),
    };
    if dataset == Dataset::Meteo {
        end = end_of_day_hour(end);
    }

    Ok(TimeRange::new(start, end)?)
}

/// Names to codes; names given but none known is a configuration error.
fn resolve<S: JsonSource + ?Sized>(
    lookup: &MetadataLookup<'_, S>,
    table: MetadataTable,
    names: &[String],
) -> anyhow::Result<Vec<String>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    info!(field = table.name_field(), "check parameter");
    let res = lookup.resolve(table, names)?;
    if res.codes.is_empty() {
        bail!(
            "none of {:?} is a known {}; refusing to run unfiltered",
            names,
            table.name_field()
        );
    }
    Ok(res.codes)
}
