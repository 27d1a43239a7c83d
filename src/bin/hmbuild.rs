//! hmbuild: CLI tool for compiling a pattern list into a Hipermap static
//! domain set file, and for querying one back.

use clap::{Parser, Subcommand};
use hipermap_domainset::{deserialize, CalibrationLimits, Database, Lookup};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hmbuild")]
#[command(about = "Compile and query Hipermap static domain set files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a newline-delimited pattern file into a `.hpm` binary file.
    Compile {
        /// Input file, one domain pattern per line.
        #[arg(short, long)]
        input: PathBuf,

        /// Output `.hpm` file.
        #[arg(short, long)]
        output: PathBuf,

        /// Verbose output.
        #[arg(short, long)]
        verbose: bool,
    },

    /// Query a compiled `.hpm` file for a hostname.
    Query {
        /// Compiled `.hpm` file.
        #[arg(short, long)]
        database: PathBuf,

        /// Hostname to look up.
        host: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            input,
            output,
            verbose,
        } => compile_file(&input, &output, verbose),
        Commands::Query { database, host } => query_file(&database, &host),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn compile_file(input: &PathBuf, output: &PathBuf, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let content = fs::read_to_string(input)?;
    let patterns: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    if verbose {
        println!("Read {} patterns from {:?}", patterns.len(), input);
    }

    let db = Database::compile(patterns, &CalibrationLimits::default())?;

    if verbose {
        println!(
            "Compiled: {} buckets, {} popular suffixes, {} serialized bytes",
            db.buckets(),
            db.popular_count(),
            db.serialized_len()
        );
    }

    let mut buf = vec![0u8; db.serialized_len()];
    db.serialize(&mut buf)?;

    let mut file = fs::File::create(output)?;
    file.write_all(&buf)?;

    println!("Wrote {:?} ({} bytes)", output, buf.len());
    Ok(())
}

fn query_file(database: &PathBuf, host: &str) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(database)?;
    let db = deserialize(&bytes)?;
    match db.find(host.as_bytes()) {
        Lookup::Found => println!("{host}: Found"),
        Lookup::NotFound => println!("{host}: NotFound"),
        Lookup::InvalidInput => println!("{host}: InvalidInput"),
    }
    Ok(())
}
