use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hotel_tax_data::ConfigurationLoader;
use hotel_tax_sqlite::SqliteRepository;

/// Load tax configurations from a CSV file into the database.
///
/// The CSV file should have the following columns:
/// - establishment_id: Owning establishment (must already exist)
/// - name: Configuration name, unique per establishment
/// - description: Optional free text
/// - rate: Percent for `percentage`, currency amount otherwise
/// - type: percentage, fixed_per_night or fixed_amount
/// - applicable_to: Category tags separated by `|`
/// - country_code: Optional two-letter country code
/// - active: true/false, empty means true
///
/// Rows whose establishment and name match a stored configuration replace it.
#[derive(Parser, Debug)]
#[command(name = "tax-config-loader")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the CSV file containing tax configurations
    #[arg(short, long)]
    file: PathBuf,

    /// SQLite database path or URL (created if missing)
    #[arg(short, long, default_value = "sqlite:hotel_tax.db")]
    database: String,

    /// Run database migrations before loading data
    #[arg(short, long, default_value_t = false)]
    migrate: bool,

    /// Run seed files from the specified directory after migrations
    #[arg(short, long)]
    seeds: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let repo = SqliteRepository::new(&args.database)
        .await
        .with_context(|| format!("Failed to connect to database: {}", args.database))?;

    if args.migrate {
        println!("Running migrations...");
        repo.run_migrations()
            .await
            .context("Failed to run migrations")?;
        println!("Migrations complete.");
    }

    if let Some(seeds_dir) = &args.seeds {
        println!("Running seeds from: {}", seeds_dir.display());
        repo.run_seeds(seeds_dir)
            .await
            .with_context(|| format!("Failed to run seeds from: {}", seeds_dir.display()))?;
        println!("Seeds complete.");
    }

    println!("Loading tax configurations from: {}", args.file.display());

    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open: {}", args.file.display()))?;

    let records = ConfigurationLoader::parse(file)
        .with_context(|| format!("Failed to parse CSV: {}", args.file.display()))?;

    println!("Parsed {} records from CSV", records.len());

    let summary = ConfigurationLoader::load(&repo, &records)
        .await
        .context("Failed to load tax configurations into database")?;

    println!(
        "Successfully loaded {} tax configurations ({} created, {} updated).",
        summary.total(),
        summary.created,
        summary.updated
    );

    Ok(())
}
