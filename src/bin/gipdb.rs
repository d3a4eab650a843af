//! gipdb: CLI tool for building and querying geo-IP databases.

use clap::{Parser, Subcommand};
use gipstore::{
    default_registry, open_database, GeoConfig, GeoIpDatabase, MemDatabase, ShardedDatabase,
};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "gipdb")]
#[command(version = "0.1.0")]
#[command(about = "Build and query geo-IP range databases", long_about = None)]
struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data root, overrides the configuration
    #[arg(short, long, global = true)]
    data_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import the CSV dataset and write the sharded directory tree
    Rebuild {
        /// Dataset file, overrides the configuration
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Sort rows by range before writing
        #[arg(long)]
        sort: bool,
    },

    /// Look up addresses
    Lookup {
        /// IPv4 addresses
        #[arg(required = true)]
        addresses: Vec<IpAddr>,
    },

    /// Import the CSV dataset and write it as one snapshot stream
    Snapshot {
        /// Output snapshot file
        #[arg(short, long)]
        output: PathBuf,

        /// Dataset file, overrides the configuration
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Sort rows by range before writing
        #[arg(long)]
        sort: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = load_config(cli.config.as_deref(), cli.data_root).and_then(|config| {
        match cli.command {
            Commands::Rebuild { input, sort } => rebuild(&config, input, sort),
            Commands::Lookup { addresses } => lookup(&config, &addresses),
            Commands::Snapshot {
                output,
                input,
                sort,
            } => snapshot(&config, input, &output, sort),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>, data_root: Option<PathBuf>) -> gipstore::Result<GeoConfig> {
    let mut config = match path {
        Some(path) => GeoConfig::load(path)?,
        None => GeoConfig::default(),
    };
    if let Some(root) = data_root {
        config.data_root = root;
    }
    Ok(config)
}

fn import(config: &GeoConfig, input: Option<PathBuf>, sort: bool) -> gipstore::Result<MemDatabase> {
    let input = input.unwrap_or_else(|| config.csv_path());
    let mut db = MemDatabase::new();
    let count = db.import(&input)?;
    if sort {
        db.sort();
    }
    println!("Imported {} ranges from {}", count, input.display());
    Ok(db)
}

fn rebuild(config: &GeoConfig, input: Option<PathBuf>, sort: bool) -> gipstore::Result<()> {
    let db = import(config, input, sort)?;
    let target = ShardedDatabase::new(config.data_dir(), default_registry());
    let count = db.rebuild(&target)?;
    println!("Wrote {} shards to {}", count, target.base_dir().display());
    Ok(())
}

fn snapshot(
    config: &GeoConfig,
    input: Option<PathBuf>,
    output: &Path,
    sort: bool,
) -> gipstore::Result<()> {
    let db = Arc::new(import(config, input, sort)?);
    db.save_snapshot(output, &default_registry())?;
    println!("Wrote snapshot to {}", output.display());
    Ok(())
}

fn lookup(config: &GeoConfig, addresses: &[IpAddr]) -> gipstore::Result<()> {
    let db = open_database(config)?;
    let languages = config.language_map();

    for addr in addresses {
        match db.find(*addr)? {
            Some(entry) => {
                println!("{}", addr);
                println!("  range:       {}", entry.range);
                println!("  country:     {} ({})", entry.country, entry.country_code);
                println!("  state:       {}", entry.state);
                println!("  city:        {}", entry.city);
                println!("  postal code: {}", entry.zip);
                println!("  timezone:    {}", entry.tz);
                println!("  coordinates: {}", entry.coordinates);
                println!("  language:    {}", languages.language_for(&entry));
            }
            None => println!("{}: not found", addr),
        }
    }
    Ok(())
}
