//! geocensus CLI: resolve column sets and explain table materialization.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use geocensus_core::geo::RESOLUTIONS;
use geocensus_core::prelude::{DanglingPolicy, GeocensusConfig, Resolution, StateCode, TableId, Year};
use geocensus_exec::{DryRunContext, MaterializeRequest, Materializer, SchemaGeographyProvider, SchemaSourceProvider};
use geocensus_meta::{ColumnCatalog, DependencyMap, FeedLayout, TableCatalog, TagRegistry};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "geocensus")]
#[command(about = "Census column graph resolution and per-geography table materialization", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that resolves columns.
#[derive(clap::Args)]
struct ResolveArgs {
    /// Metadata feed (delimited, one row per column definition)
    #[arg(long)]
    feed: PathBuf,

    /// Census year
    #[arg(long)]
    year: Year,

    /// Table id, e.g. B02
    #[arg(long)]
    table: String,

    /// Dependency declarations YAML (overrides the built-in map)
    #[arg(long)]
    deps: Option<PathBuf>,

    /// Extra tag registry YAML merged over the built-in tags
    #[arg(long)]
    tags: Option<PathBuf>,

    /// Synthesize placeholder tags for unknown tag ids
    #[arg(long)]
    lenient_tags: bool,

    /// Fail on denominator tokens that name no known column
    #[arg(long)]
    reject_dangling: bool,

    /// Columns version keying the resolved-set cache (overrides config)
    #[arg(long)]
    columns_version: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one table's column set and print it as JSON
    Columns {
        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Print every statement materializing a table would execute
    Explain {
        #[command(flatten)]
        resolve: ResolveArgs,

        /// Target resolution, e.g. SA2
        #[arg(long)]
        resolution: String,

        /// Restrict source partitions to these states
        #[arg(long, value_delimiter = ',')]
        states: Vec<String>,

        /// Schema holding the imported source partitions
        #[arg(long, default_value = "census")]
        source_schema: String,

        /// Schema holding boundary tables
        #[arg(long, default_value = "geo")]
        geo_schema: String,

        /// Output schema (overrides config)
        #[arg(long)]
        output_schema: Option<String>,
    },

    /// Check dependency declarations for cycles and unknown tables
    CheckDeps {
        /// Dependency declarations YAML (defaults to the built-in map)
        #[arg(long)]
        deps: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Columns { resolve } => print_columns(&resolve),
        Commands::Explain {
            resolve,
            resolution,
            states,
            source_schema,
            geo_schema,
            output_schema,
        } => explain(&resolve, &resolution, &states, &source_schema, &geo_schema, output_schema),
        Commands::CheckDeps { deps } => check_deps(deps.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Environment first, then command-line overrides.
fn config_for(args: &ResolveArgs) -> GeocensusConfig {
    let mut config = GeocensusConfig::from_env();
    if args.lenient_tags {
        config.strict_tags = false;
    }
    if args.reject_dangling {
        config.dangling_policy = DanglingPolicy::Reject;
    }
    if let Some(v) = args.columns_version {
        config.columns_version = v;
    }
    config
}

fn load_deps(path: Option<&Path>) -> CliResult<DependencyMap> {
    Ok(match path {
        Some(p) => DependencyMap::from_yaml(&fs::read_to_string(p)?)?,
        None => DependencyMap::builtin()?,
    })
}

fn catalog_for(args: &ResolveArgs, config: GeocensusConfig) -> CliResult<ColumnCatalog> {
    config.validate()?;
    let deps = load_deps(args.deps.as_deref())?;
    let mut tags = TagRegistry::builtin(config.strict_tags)?;
    if let Some(p) = &args.tags {
        tags.extend_from_yaml(&fs::read_to_string(p)?)?;
    }

    let mut catalog = ColumnCatalog::new(config, deps, tags);
    let reader = BufReader::new(File::open(&args.feed)?);
    catalog.load_feed(args.year, reader, &FeedLayout::default())?;
    Ok(catalog)
}

fn print_columns(args: &ResolveArgs) -> CliResult<()> {
    let catalog = catalog_for(args, config_for(args))?;
    let set = catalog.resolve(args.year, &TableId::new(&args.table))?;
    info!(table = %args.table, year = args.year, columns = set.len(), "resolved");
    println!("{}", serde_json::to_string_pretty(&*set)?);
    Ok(())
}

fn explain(
    args: &ResolveArgs,
    resolution: &str,
    states: &[String],
    source_schema: &str,
    geo_schema: &str,
    output_schema: Option<String>,
) -> CliResult<()> {
    if !RESOLUTIONS.iter().any(|r| r.eq_ignore_ascii_case(resolution)) {
        return Err(format!("unknown resolution '{resolution}', expected one of {}", RESOLUTIONS.join(", ")).into());
    }
    let mut config = config_for(args);
    if let Some(schema) = output_schema {
        config.output_schema = schema;
    }
    let catalog = catalog_for(args, config.clone())?;
    let table = TableId::new(&args.table);
    let set = catalog.resolve(args.year, &table)?;

    let mut sources = SchemaSourceProvider::new(source_schema, &config);
    if !states.is_empty() {
        sources = sources.with_states(states.iter().map(StateCode::new));
    }
    let geography = SchemaGeographyProvider::new(geo_schema, &config);
    let materializer = Materializer::new(&config, sources, geography);

    let mut ctx = DryRunContext::new(&config.output_schema);
    let req = MaterializeRequest::new(args.year, Resolution::new(resolution.to_ascii_uppercase()), table);
    let report = materializer.materialize(&mut ctx, &set, &req)?;

    for sql in ctx.statements() {
        println!("{sql};");
    }
    eprintln!("{}", serde_json::to_string_pretty(&report.manifest)?);
    Ok(())
}

fn check_deps(path: Option<&Path>) -> CliResult<()> {
    let deps = load_deps(path)?;
    let catalog = TableCatalog::builtin()?;

    let mut unknown = Vec::new();
    for (year, tables) in &catalog.years {
        deps.check_acyclic(tables.tables.iter())?;
        info!(year, profile = %tables.profile, tables = tables.tables.len(), "declarations acyclic");
    }
    for (year, table, prerequisite) in catalog.unknown_prerequisites(&deps) {
        unknown.push(format!("{year}: {table} requires unknown table {prerequisite}"));
    }

    if unknown.is_empty() {
        println!("✓ {} declared tables, no cycles, no unknown prerequisites", deps.declared_tables().len());
        Ok(())
    } else {
        for line in &unknown {
            eprintln!("{line}");
        }
        Err(format!("{} unknown prerequisite(s)", unknown.len()).into())
    }
}
