use anyhow::{Context, Result};
use bison_core::Bison;
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "bison")]
#[command(about = "Bison CLI - Command-line interface for the Bison document database")]
#[command(version)]
struct Cli {
    /// Database directory
    #[arg(long, default_value = "bison_db", global = true)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List collection names
    Collections,
    /// Find documents matching a filter
    Find {
        /// Collection name
        collection: String,
        /// Filter as a JSON object (defaults to all documents)
        filter: Option<String>,
    },
    /// Insert one document (a JSON object)
    Insert {
        /// Collection name
        collection: String,
        /// Document as JSON
        document: String,
    },
    /// Apply an update expression to matching documents
    Update {
        /// Collection name
        collection: String,
        /// Update expression as JSON
        update: String,
        /// Restrict the update to documents matching this filter
        #[arg(long)]
        filter: Option<String>,
        /// Print the full collection after the update
        #[arg(long)]
        full: bool,
    },
    /// Drop one collection (or all with --all)
    Drop {
        /// Collection name
        collection: Option<String>,
        /// Drop every collection
        #[arg(long)]
        all: bool,
    },
    /// Import documents from a JSON array file into a collection
    Import {
        /// JSON file holding an array of documents
        file: PathBuf,
        /// Target collection
        collection: String,
    },
    /// Export collections to a JSON file
    Export {
        /// Output JSON file
        file: PathBuf,
        /// Export only this collection
        #[arg(long)]
        collection: Option<String>,
    },
    /// Show query cache statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Collections => list_collections(&cli.db),
        Commands::Find { collection, filter } => find(&cli.db, &collection, filter.as_deref()),
        Commands::Insert {
            collection,
            document,
        } => insert(&cli.db, &collection, &document),
        Commands::Update {
            collection,
            update,
            filter,
            full,
        } => run_update(&cli.db, &collection, &update, filter.as_deref(), full),
        Commands::Drop { collection, all } => run_drop(&cli.db, collection.as_deref(), all),
        Commands::Import { file, collection } => import(&cli.db, &file, &collection),
        Commands::Export { file, collection } => export(&cli.db, &file, collection.as_deref()),
        Commands::Stats => stats(&cli.db),
    }
}

fn open_db(path: &Path) -> Result<Bison> {
    Bison::open(path).with_context(|| format!("Failed to open database: {}", path.display()))
}

fn parse_json(what: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("Invalid JSON in {}: {}", what, raw))
}

fn list_collections(db_path: &Path) -> Result<()> {
    let db = open_db(db_path)?;
    for name in db.collections() {
        println!("{}", name);
    }
    Ok(())
}

fn find(db_path: &Path, collection: &str, filter: Option<&str>) -> Result<()> {
    let db = open_db(db_path)?;
    let filter = filter.map(|raw| parse_json("filter", raw)).transpose()?;
    let docs = db
        .find(collection, filter.as_ref())
        .with_context(|| format!("Failed to query collection: {}", collection))?;

    println!("{}", serde_json::to_string_pretty(&docs)?);
    Ok(())
}

fn insert(db_path: &Path, collection: &str, document: &str) -> Result<()> {
    let mut db = open_db(db_path)?;
    let doc = parse_json("document", document)?;
    db.insert(collection, doc)
        .with_context(|| format!("Failed to insert document into {}", collection))?;
    db.write_all()?;
    println!("Inserted 1 document into '{}'", collection);
    Ok(())
}

fn run_update(
    db_path: &Path,
    collection: &str,
    update: &str,
    filter: Option<&str>,
    full: bool,
) -> Result<()> {
    let mut db = open_db(db_path)?;
    let update = parse_json("update expression", update)?;
    let filter = filter.map(|raw| parse_json("filter", raw)).transpose()?;

    let result = db
        .update(collection, &update, filter.as_ref(), full)
        .with_context(|| format!("Failed to update collection: {}", collection))?;
    db.write_all()?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn run_drop(db_path: &Path, collection: Option<&str>, all: bool) -> Result<()> {
    let mut db = open_db(db_path)?;
    if all {
        db.drop_all().context("Failed to drop all collections")?;
        println!("Dropped all collections");
        return Ok(());
    }
    let name = collection.ok_or_else(|| anyhow::anyhow!("collection name or --all required"))?;
    db.drop_collection(name)
        .with_context(|| format!("Failed to drop collection: {}", name))?;
    println!("Dropped '{}'", name);
    Ok(())
}

fn import(db_path: &Path, file: &Path, collection: &str) -> Result<()> {
    let mut db = open_db(db_path)?;
    db.insert_many_from_document(collection, file)
        .with_context(|| format!("Failed to import from {}", file.display()))?;
    db.write_all()?;

    let count = db.find(collection, None)?.len();
    println!(
        "Imported into '{}' ({} documents total)",
        collection, count
    );
    Ok(())
}

/// Export format: { "collection_name": [documents...], ... }
fn export(db_path: &Path, file: &Path, collection_filter: Option<&str>) -> Result<()> {
    let db = open_db(db_path)?;

    let mut output: Map<String, Value> = Map::new();
    let mut total_docs = 0;

    for name in db.collections() {
        if let Some(filter) = collection_filter {
            if name != filter {
                continue;
            }
        }
        let docs = db
            .find(&name, None)
            .with_context(|| format!("Failed to read collection: {}", name))?;
        total_docs += docs.len();
        output.insert(name, Value::Array(docs));
    }

    let json = serde_json::to_string_pretty(&output).context("Failed to serialize to JSON")?;
    fs::write(file, json).with_context(|| format!("Failed to write to file: {}", file.display()))?;

    println!("Exported {} documents to {}", total_docs, file.display());
    Ok(())
}

fn stats(db_path: &Path) -> Result<()> {
    let db = open_db(db_path)?;
    println!("{}", serde_json::to_string_pretty(&db.cache_stats())?);
    Ok(())
}
