//! Command-line interface for listings.
//!
//! Provides commands for serving the HTTP API, ingesting items, and
//! reading them back without going through HTTP.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{self, ResolvedConfig};
use crate::domain::{Item, ItemId, NewItem};
use crate::repository::ItemRepository;

/// listings - Marketplace listing service
#[derive(Parser, Debug)]
#[command(name = "listings")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind to (overrides config)
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Create the database tables and image directory
    Init,

    /// Add an item
    Add {
        /// Item name
        #[arg(short, long)]
        name: String,

        /// Category name (created if new)
        #[arg(short, long)]
        category: String,

        /// Image file
        #[arg(short, long)]
        image: PathBuf,
    },

    /// List all items
    List,

    /// Search items by name
    Search {
        /// Substring to look for (ASCII case-insensitive)
        #[arg(default_value = "")]
        keyword: String,
    },

    /// Show a single item
    Show {
        /// Item ID
        id: String,
    },

    /// Write an item's image to a file
    Image {
        /// Item ID
        id: String,

        /// Output file (defaults to the image key in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = config::config()?;

        match self.command {
            Commands::Serve { address } => {
                let mut config = config.clone();
                if let Some(address) = address {
                    config.address = address;
                }
                crate::server::serve(&config).await
            }
            Commands::Init => init(config).await,
            Commands::Add {
                name,
                category,
                image,
            } => add_item(config, &name, &category, &image).await,
            Commands::List => list_items(config).await,
            Commands::Search { keyword } => search_items(config, &keyword).await,
            Commands::Show { id } => show_item(config, &id).await,
            Commands::Image { id, output } => export_image(config, &id, output).await,
            Commands::Config => {
                show_config(config);
                Ok(())
            }
        }
    }
}

async fn open(config: &ResolvedConfig) -> Result<ItemRepository> {
    ItemRepository::open(config)
        .await
        .with_context(|| format!("Failed to open database: {}", config.db_path.display()))
}

/// Create tables and directories
async fn init(config: &ResolvedConfig) -> Result<()> {
    let repository = open(config).await?;
    println!("Database ready: {}", config.db_path.display());
    println!("Images: {}", repository.content().image_dir().display());
    if !repository.content().default_image().exists() {
        eprintln!(
            "Warning: default image missing at {}",
            repository.content().default_image().display()
        );
    }
    Ok(())
}

/// Ingest one item from a local image file
async fn add_item(config: &ResolvedConfig, name: &str, category: &str, image: &Path) -> Result<()> {
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("Failed to read image: {}", image.display()))?;

    let repository = open(config).await?;
    let item = repository.add_item(NewItem::new(name, category, bytes)?).await?;

    println!(
        "item received: name={},category={},images={}",
        item.name, item.category, item.image_key
    );
    println!("ID: {}", item.id);
    Ok(())
}

/// List every item
async fn list_items(config: &ResolvedConfig) -> Result<()> {
    let items = open(config).await?.list_all().await?;
    print_items(&items);
    Ok(())
}

/// Search by keyword
async fn search_items(config: &ResolvedConfig, keyword: &str) -> Result<()> {
    let items = open(config).await?.search(keyword).await?;
    print_items(&items);
    Ok(())
}

/// Show one item
async fn show_item(config: &ResolvedConfig, id: &str) -> Result<()> {
    let id: ItemId = id.parse()?;
    let item = open(config).await?.get_by_id(id).await?;

    println!("ID: {}", item.id);
    println!("Name: {}", item.name);
    println!("Category: {}", item.category);
    println!("Image: {}", item.image_key);
    Ok(())
}

/// Copy an item's image (or the placeholder) to a file
async fn export_image(config: &ResolvedConfig, id: &str, output: Option<PathBuf>) -> Result<()> {
    let id: ItemId = id.parse()?;
    let repository = open(config).await?;

    let key = repository.get_image_key_by_id(id).await?;
    let bytes = repository.image_bytes(id).await?;
    let output = output.unwrap_or_else(|| PathBuf::from(key.as_str()));

    tokio::fs::write(&output, &bytes)
        .await
        .with_context(|| format!("Failed to write image: {}", output.display()))?;

    println!("Wrote {} bytes to {}", bytes.len(), output.display());
    Ok(())
}

fn print_items(items: &[Item]) {
    if items.is_empty() {
        println!("No items found");
        return;
    }

    println!("{:<6} {:<30} {:<20} {}", "ID", "NAME", "CATEGORY", "IMAGE");
    println!("{}", "-".repeat(130));

    for item in items {
        println!(
            "{:<6} {:<30} {:<20} {}",
            item.id.0, item.name, item.category, item.image_key
        );
    }
}

/// Show resolved configuration
fn show_config(config: &ResolvedConfig) {
    let config_file = config
        .config_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());

    println!("Config file: {}", config_file);
    println!("Home: {}", config.home.display());
    println!("Database: {}", config.db_path.display());
    println!("Images: {}", config.image_dir.display());
    println!("Default image: {}", config.default_image.display());
    if let Some(ref dir) = config.schema_dir {
        println!("Schema dir: {}", dir.display());
    }
    println!("Address: {}", config.address);
    println!("Front URL: {}", config.front_url);
    println!("Pool size: {}", config.pool_size);
    println!("Max upload: {} bytes", config.max_upload_bytes);
}
