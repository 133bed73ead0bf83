use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

use osm_wrangle::{
    audit_file, audit_keys, audit_street_types, count_tags, extract_airports, max_loads,
    process_map, save_max_loads, unique_users, DocumentStore, JsonStyle, OnError,
    ProcessOptions, WranglingConfig,
};

#[derive(Parser, Debug)]
#[command(name = "osm-wrangle")]
#[command(about = "Audit, clean and export OpenStreetMap extracts as JSON documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON file overriding the abbreviation table and ignore lists
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Shape every node and way into newline-delimited JSON (<input>.json)
    Shape {
        input: PathBuf,
        /// Write to this file instead of <input>.json
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Pretty-print each document
        #[arg(long, action = ArgAction::SetTrue)]
        pretty: bool,
        /// Log and skip records that fail to shape instead of stopping
        #[arg(long, action = ArgAction::SetTrue)]
        skip_errors: bool,
    },
    /// Count element names at any depth
    CountTags { input: PathBuf },
    /// Bucket tag keys by character class
    AuditKeys { input: PathBuf },
    /// List distinct contributor ids
    Users { input: PathBuf },
    /// Street names whose last word is not an expected street type
    AuditStreets { input: PathBuf },
    /// Load shaped documents into a collection of a local document store
    Load {
        db: PathBuf,
        collection: String,
        file: PathBuf,
        /// The file holds one JSON array instead of one document per line
        #[arg(long, action = ArgAction::SetTrue)]
        array: bool,
    },
    /// Peak load per region from an hourly load workbook or its CSV export
    MaxLoads { input: PathBuf, output: PathBuf },
    /// Airport codes offered by a saved search page
    Airports { input: PathBuf },
    /// Value types seen per CSV field
    FieldTypes {
        input: PathBuf,
        #[arg(required = true)]
        fields: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => WranglingConfig::from_file(path)?,
        None => WranglingConfig::default(),
    };

    match cli.command {
        Command::Shape { input, output, pretty, skip_errors } => {
            let options = ProcessOptions {
                style: if pretty { JsonStyle::Pretty } else { JsonStyle::Compact },
                on_error: if skip_errors { OnError::Skip } else { OnError::FailFast },
                output,
            };
            run_shape(&input, &config, &options)?;
        }
        Command::CountTags { input } => {
            for (name, count) in count_tags(&input)? {
                println!("{:<12} {}", name, count);
            }
        }
        Command::AuditKeys { input } => {
            let counts = audit_keys(&input, &config)?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
        Command::Users { input } => {
            let users = unique_users(&input)?;
            for uid in &users {
                println!("{}", uid);
            }
            println!("\n✓ {} distinct contributors", users.len());
        }
        Command::AuditStreets { input } => {
            let street_types = audit_street_types(&input, &config)?;
            for (kind, names) in &street_types {
                println!("{}", kind);
                for name in names {
                    println!("    {}", name);
                }
            }
            println!("\n✓ {} unexpected street types", street_types.len());
        }
        Command::Load { db, collection, file, array } => {
            let mut store = DocumentStore::open(&db)?;
            let inserted = if array {
                store.load_json_array(&collection, &file)?
            } else {
                store.load_json_lines(&collection, &file)?
            };
            println!("✓ Inserted {} documents into {}", inserted, collection);
            println!("✓ Collection now holds {} documents", store.count(&collection)?);
        }
        Command::MaxLoads { input, output } => {
            let rows = max_loads(&input)?;
            save_max_loads(&rows, &output)?;
            println!("✓ Wrote {} stations to {}", rows.len(), output.display());
        }
        Command::Airports { input } => {
            for code in extract_airports(&input)? {
                println!("{}", code);
            }
        }
        Command::FieldTypes { input, fields } => {
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            for (field, types) in audit_file(&input, &fields)? {
                let names: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
                println!("{}: {}", field, names.join(", "));
            }
        }
    }

    Ok(())
}

fn run_shape(input: &std::path::Path, config: &WranglingConfig, options: &ProcessOptions) -> Result<()> {
    println!("🗺️  Shaping {}", input.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let summary = process_map(input, config, options)?;

    println!("✓ {} nodes, {} ways", summary.stats.nodes, summary.stats.ways);
    println!("✓ {} tags stored", summary.stats.tags_stored);
    if summary.skipped > 0 {
        println!("⚠️  {} records skipped", summary.skipped);
    }
    println!("✓ Peak live elements: {}", summary.peak_live_elements);
    println!("\n💾 Wrote {} documents to {}", summary.written, summary.output.display());

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
