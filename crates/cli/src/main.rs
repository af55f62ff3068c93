//! Anchorchat CLI - Database migrations and tenant management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! anchorchat migrate
//!
//! # Create a tenant organization with a widget domain
//! anchorchat tenant create -n "Acme Outdoor" -d shop.acme.com
//!
//! # Embed scraped site content for semantic search
//! anchorchat seed-pages --org-id 1 --file pages.json
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `tenant create` - Create a tenant and its widget domain
//! - `seed-pages` - Embed scraped pages into the semantic index

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "anchorchat")]
#[command(author, version, about = "Anchorchat CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage tenants
    Tenant {
        #[command(subcommand)]
        action: TenantAction,
    },
    /// Embed scraped pages into the semantic index
    SeedPages {
        /// Organization ID the pages belong to
        #[arg(long)]
        org_id: i64,

        /// JSON file with pages: `[{"url", "title", "content"}]`
        #[arg(long)]
        file: std::path::PathBuf,
    },
}

#[derive(Subcommand)]
enum TenantAction {
    /// Create a tenant organization with a widget domain
    Create {
        /// Organization name
        #[arg(short, long)]
        name: String,

        /// Widget domain (e.g., shop.example.com)
        #[arg(short, long)]
        domain: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Tenant { action } => match action {
            TenantAction::Create { name, domain } => {
                commands::tenant::create(&name, &domain).await?;
            }
        },
        Commands::SeedPages { org_id, file } => {
            commands::seed_pages::run(org_id, &file).await?;
        }
    }
    Ok(())
}
