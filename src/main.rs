//! Bulkload CLI - import CSV files into a schema-described store
//!
//! # Commands
//!
//! ```bash
//! bulkload parse input.csv                        # Parse CSV to JSON records
//! bulkload columns --schema schema.json Student   # Show mappable columns
//! bulkload import --schema schema.json Student input.csv
//! ```
//!
//! The store behind `import` is in-memory: the command is a way to exercise
//! and inspect a full load run (mapping, relations, duplicate handling)
//! against a schema file, not a database client.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use bulkload::{
    BulkLoader, CsvSource, LoadResult, LoaderConfig, MemStore, RecordSource, Schema, TypeDef,
};

#[derive(Parser)]
#[command(name = "bulkload")]
#[command(about = "Import CSV files into a schema-described store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output JSON records
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Treat the first row as data, naming columns Column1, Column2, ...
        #[arg(long)]
        no_header: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the columns input data can be mapped into for a target type
    Columns {
        /// Schema description JSON file
        #[arg(short, long)]
        schema: PathBuf,

        /// Target entity type
        target: String,
    },

    /// Import a CSV file into an in-memory store and report the outcome
    Import {
        /// Schema description JSON file
        #[arg(short, long)]
        schema: PathBuf,

        /// Target entity type
        target: String,

        /// Input CSV file
        input: PathBuf,

        /// Column mapping, `Heading=Field` (repeatable)
        #[arg(short, long = "map", value_name = "FROM=TO")]
        map: Vec<String>,

        /// Field to match existing records on (repeatable, order matters)
        #[arg(long = "duplicate-check", value_name = "FIELD")]
        duplicate_checks: Vec<String>,

        /// Field that must be non-empty for a record to import (repeatable)
        #[arg(long = "required", value_name = "FIELD")]
        required: Vec<String>,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Delete existing records of the target type before importing
        #[arg(long)]
        delete_existing: bool,

        /// Dry run: report what would happen without writing anything
        #[arg(long)]
        preview: bool,

        /// Output the full result as JSON instead of summary messages
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse {
            input,
            delimiter,
            no_header,
            output,
        } => cmd_parse(&input, delimiter, no_header, output.as_deref()),

        Commands::Columns { schema, target } => cmd_columns(&schema, &target),

        Commands::Import {
            schema,
            target,
            input,
            map,
            duplicate_checks,
            required,
            delimiter,
            delete_existing,
            preview,
            json,
        } => cmd_import(ImportArgs {
            schema,
            target,
            input,
            map,
            duplicate_checks,
            required,
            delimiter,
            delete_existing,
            preview,
            json,
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_parse(
    input: &Path,
    delimiter: Option<char>,
    no_header: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Parsing CSV: {}", input.display());

    let mut source = CsvSource::new(input);
    if let Some(d) = delimiter {
        source = source.delimiter(d);
    }
    if no_header {
        source = source.has_header(false);
        source = source.provide_headers(numbered_headers(input, delimiter)?);
    }

    let records: Vec<_> = source.open()?.collect();
    eprintln!("Parsed {} records", records.len());

    let json = serde_json::to_string_pretty(&records)?;
    write_output(&json, output)
}

/// Column names for headerless files: Column1, Column2, ... sized to the
/// first line of the file.
fn numbered_headers(
    input: &Path,
    delimiter: Option<char>,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let content = bulkload::decode_content(&bytes, &bulkload::detect_encoding(&bytes));
    let delimiter = delimiter
        .map(|d| d as u8)
        .unwrap_or_else(|| bulkload::detect_delimiter(&content));
    let width = content
        .lines()
        .next()
        .map(|line| line.split(delimiter as char).count())
        .unwrap_or(0);
    Ok((1..=width).map(|i| format!("Column{i}")).collect())
}

fn cmd_columns(schema_path: &Path, target: &str) -> Result<(), Box<dyn std::error::Error>> {
    let schema = read_schema(schema_path)?;
    let config = LoaderConfig::builder(target).build()?;
    let loader = BulkLoader::new(config);

    for (field, label) in loader.mappable_columns(&schema) {
        println!("{field}\t{label}");
    }
    Ok(())
}

struct ImportArgs {
    schema: PathBuf,
    target: String,
    input: PathBuf,
    map: Vec<String>,
    duplicate_checks: Vec<String>,
    required: Vec<String>,
    delimiter: Option<char>,
    delete_existing: bool,
    preview: bool,
    json: bool,
}

fn cmd_import(args: ImportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let schema = read_schema(&args.schema)?;
    let mut store = MemStore::new(schema);

    let mut builder = LoaderConfig::builder(&args.target);
    for entry in &args.map {
        let (from, to) = entry
            .split_once('=')
            .ok_or_else(|| format!("invalid --map '{entry}', expected FROM=TO"))?;
        builder = builder.map_column(from, to);
    }
    for field in &args.duplicate_checks {
        builder = builder.duplicate_check(field);
    }
    for field in &args.required {
        builder = builder.transform(field, bulkload::TransformSpec::new().required());
    }
    let config = builder.delete_existing(args.delete_existing).build()?;

    let mut source = CsvSource::new(&args.input);
    if let Some(d) = args.delimiter {
        source = source.delimiter(d);
    }
    let loader = BulkLoader::new(config).with_source(source);

    eprintln!(
        "{} {} into '{}'",
        if args.preview { "Previewing" } else { "Importing" },
        args.input.display(),
        args.target
    );

    let result = if args.preview {
        loader.preview(&mut store)?
    } else {
        loader.load(&mut store)?
    };

    report(&result, args.json)
}

fn report(result: &LoadResult, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    for line in result.message_list() {
        println!("{line}");
    }
    for skip in result.skipped() {
        match skip.index {
            Some(index) => eprintln!("  record {}: {}", index + 1, skip.reason),
            None => eprintln!("  {}", skip.reason),
        }
    }
    Ok(())
}

fn read_schema(path: &Path) -> Result<Schema, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let types: Vec<TypeDef> = serde_json::from_str(&content)?;
    Ok(types.into_iter().fold(Schema::new(), Schema::define))
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("Output written to: {}", p.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
