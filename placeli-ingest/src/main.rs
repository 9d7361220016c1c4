//! placeli - saved-places manager
//!
//! Imports places from map exports (Google Takeout, Apple Maps KML/GPX,
//! OpenStreetMap, Foursquare/Swarm) into a local SQLite collection,
//! resolving duplicates and keeping user notes, tags and fields intact.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use placeli_common::config::{self, ROOT_ENV_VAR};
use placeli_common::db::PlaceStore;
use placeli_common::{FieldType, Place};
use placeli_ingest::models::ImportAction;
use placeli_ingest::services::{
    CollectionEditor, EnrichmentOptions, EnrichmentService, FileDetailsProvider, ImportMode, ImportOptions,
    ImportOrchestrator, TEMPLATE_NAMES,
};
use placeli_ingest::{ImportSource, IngestContext};
use std::path::PathBuf;
use tracing::{info, warn};

/// Command-line arguments for placeli
#[derive(Parser, Debug)]
#[command(name = "placeli")]
#[command(about = "Import, deduplicate and organize saved places")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Database file (overrides the root folder location)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import places from a file or an extracted Takeout folder
    Import {
        path: PathBuf,

        /// auto, takeout, apple, osm or foursquare
        #[arg(long, default_value = "auto")]
        source: String,

        /// Show what would be imported without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Merge into existing places instead of skipping them
        #[arg(long)]
        force: bool,

        /// Save every record without duplicate checks
        #[arg(long)]
        no_merge: bool,
    },

    /// List available import sources
    Sources,

    /// List places, most recently updated first
    List {
        #[arg(long, default_value = "50")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Search names, addresses and notes
    Search { query: String },

    /// Show one place as JSON
    Show { id: String },

    /// Delete a place
    Delete { id: String },

    /// Apply saved provider details (JSON map of provider id to details)
    Enrich {
        #[arg(long, value_name = "FILE")]
        details: PathBuf,

        /// Only this place (default: every place)
        #[arg(long)]
        id: Option<String>,

        /// Replace stored reviews
        #[arg(long)]
        reviews: bool,

        /// Replace stored photos
        #[arg(long)]
        photos: bool,
    },

    /// Manage tags
    #[command(subcommand)]
    Tags(TagsCommand),

    /// Manage custom fields
    #[command(subcommand)]
    Fields(FieldsCommand),
}

#[derive(Subcommand, Debug)]
enum TagsCommand {
    /// Show every tag with its usage count
    List,
    Add { id: String, tag: String },
    Remove { id: String, tag: String },
    /// Rename a tag on every place
    Rename { from: String, to: String },
    /// Remove a tag from every place
    Delete { tag: String },
    /// Tag every place matching a search (or all places)
    Apply {
        tag: String,
        #[arg(long)]
        filter: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum FieldsCommand {
    /// Field usage across the collection, or one place's fields
    List { id: Option<String> },
    /// Add an empty field (text, number, date, boolean, list)
    Add {
        id: String,
        name: String,
        #[arg(long = "type", default_value = "text")]
        field_type: String,
    },
    Set { id: String, name: String, value: String },
    Remove { id: String, name: String },
    /// Add a template's fields to every place (travel, business, personal)
    Template { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let loaded = config::load_config(args.config.as_deref());
    let toml_config = loaded.config;

    // Logs go to stderr; stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&toml_config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();
    if let Some(warning) = loaded.warning {
        warn!("{}", warning);
    }

    let db_path = match &args.db {
        Some(path) => path.clone(),
        None => {
            let root = config::resolve_root_folder(args.root.as_deref(), ROOT_ENV_VAR, &toml_config);
            config::prepare_root_folder(&root).context("Failed to initialize root folder")?
        }
    };
    info!(path = %db_path.display(), "Database");

    let ctx = IngestContext::open(&db_path, &toml_config)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    match args.command {
        Command::Import {
            path,
            source,
            dry_run,
            force,
            no_merge,
        } => run_import(&ctx, path, source, dry_run, force, no_merge).await,
        Command::Sources => {
            println!("Available import sources:");
            for source in ctx.registry.list() {
                let formats: Vec<_> = source.supported_formats().iter().map(|f| f.as_str()).collect();
                println!("  {:<12} {} ({})", source.tag(), source.name(), formats.join(", "));
            }
            Ok(())
        }
        Command::List { limit, offset } => {
            let places = ctx.store().list(limit, offset).await?;
            print_places(&places);
            println!("{} of {} places", places.len(), ctx.store().count().await?);
            Ok(())
        }
        Command::Search { query } => {
            let places = ctx.store().search(&query).await?;
            print_places(&places);
            println!("{} matching places", places.len());
            Ok(())
        }
        Command::Show { id } => {
            let place = ctx
                .store()
                .get_by_id(&id)
                .await?
                .with_context(|| format!("No place with id {}", id))?;
            println!("{}", serde_json::to_string_pretty(&place)?);
            Ok(())
        }
        Command::Delete { id } => {
            if !ctx.store().delete(&id).await? {
                bail!("No place with id {}", id);
            }
            println!("Deleted {}", id);
            Ok(())
        }
        Command::Enrich {
            details,
            id,
            reviews,
            photos,
        } => run_enrich(&ctx, details, id, reviews, photos).await,
        Command::Tags(command) => run_tags(&ctx, command).await,
        Command::Fields(command) => run_fields(&ctx, command).await,
    }
}

async fn run_import(
    ctx: &IngestContext,
    path: PathBuf,
    source: String,
    dry_run: bool,
    force: bool,
    no_merge: bool,
) -> Result<()> {
    let registry = ctx.registry.clone();
    let read_path = path.clone();
    let (tag, places) = tokio::task::spawn_blocking(move || registry.import_path(&read_path, Some(source.as_str())))
        .await
        .context("Import task failed")?
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if places.is_empty() {
        println!("No places found in {}", path.display());
    }
    info!(count = places.len(), source = tag, "Parsed places");

    let options = ImportOptions {
        mode: if no_merge { ImportMode::Simple } else { ImportMode::Smart },
        dry_run,
        force,
    };
    let summary = ImportOrchestrator::new(ctx.store(), ctx.rules.clone())
        .import(places, &options)
        .await;

    let total = summary.total();
    for outcome in &summary.outcomes {
        println!("[{}/{}] {}", outcome.index, total, outcome.name);
        let verb = match (outcome.action, dry_run) {
            (ImportAction::Added, false) => "✓ Added new place",
            (ImportAction::Added, true) => "✓ Would add new place",
            (ImportAction::Updated, false) => "✓ Updated existing place",
            (ImportAction::Updated, true) => "✓ Would update existing place",
            (ImportAction::Skipped, _) => "- Skipped",
            (ImportAction::Failed, _) => "✗ Failed",
        };
        match &outcome.detail {
            Some(detail) => println!("  {}: {}", verb, detail),
            None => println!("  {}", verb),
        }
    }

    println!();
    println!("Import complete from {}:", tag);
    println!("  Added:   {} places", summary.added);
    println!("  Updated: {} places", summary.updated);
    println!("  Skipped: {} places", summary.skipped);
    if !summary.failures.is_empty() {
        println!("  Failed:  {} places", summary.failures.len());
    }
    if dry_run {
        println!();
        println!("Run without --dry-run to apply changes");
    }
    Ok(())
}

async fn run_enrich(
    ctx: &IngestContext,
    details: PathBuf,
    id: Option<String>,
    reviews: bool,
    photos: bool,
) -> Result<()> {
    let provider = FileDetailsProvider::load(&details)?;
    let service =
        EnrichmentService::new(ctx.store(), &provider, ctx.rules.clone()).with_delay(ctx.enrichment_delay);
    let options = EnrichmentOptions {
        refresh_reviews: reviews,
        refresh_photos: photos,
    };

    match id {
        Some(id) => {
            let place = ctx
                .store()
                .get_by_id(&id)
                .await?
                .with_context(|| format!("No place with id {}", id))?;
            let enriched = service.enrich_place(&place, &options).await?;
            println!("Enriched {} ({})", enriched.name, enriched.id);
        }
        None => {
            let summary = service.enrich_all(&options).await?;
            println!(
                "Enrichment complete: {} enriched, {} skipped, {} failed",
                summary.enriched, summary.skipped, summary.failed
            );
        }
    }
    Ok(())
}

async fn run_tags(ctx: &IngestContext, command: TagsCommand) -> Result<()> {
    let editor = CollectionEditor::new(ctx.store(), &ctx.rules);
    match command {
        TagsCommand::List => {
            let counts = editor.tag_counts().await?;
            if counts.is_empty() {
                println!("No tags");
            }
            for (tag, count) in counts {
                println!("  {:<24} {}", tag, count);
            }
        }
        TagsCommand::Add { id, tag } => {
            if editor.add_tag(&id, &tag).await? {
                println!("Tagged {} with '{}'", id, tag);
            } else {
                println!("{} already has tag '{}'", id, tag);
            }
        }
        TagsCommand::Remove { id, tag } => {
            if editor.remove_tag(&id, &tag).await? {
                println!("Removed '{}' from {}", tag, id);
            } else {
                println!("{} has no tag '{}'", id, tag);
            }
        }
        TagsCommand::Rename { from, to } => {
            let count = editor.rename_tag(&from, &to).await?;
            println!("Renamed '{}' to '{}' on {} places", from, to, count);
        }
        TagsCommand::Delete { tag } => {
            let count = editor.delete_tag(&tag).await?;
            println!("Removed '{}' from {} places", tag, count);
        }
        TagsCommand::Apply { tag, filter } => {
            let count = editor.apply_tag(&tag, filter.as_deref()).await?;
            println!("Applied '{}' to {} places", tag, count);
        }
    }
    Ok(())
}

async fn run_fields(ctx: &IngestContext, command: FieldsCommand) -> Result<()> {
    let editor = CollectionEditor::new(ctx.store(), &ctx.rules);
    match command {
        FieldsCommand::List { id: Some(id) } => {
            let place = ctx
                .store()
                .get_by_id(&id)
                .await?
                .with_context(|| format!("No place with id {}", id))?;
            for (name, value) in &place.custom_fields {
                let kind = if ctx.rules.is_system(name) { "system" } else { value.field_type().as_str() };
                println!("  {:<24} {:<8} {}", name, kind, value);
            }
        }
        FieldsCommand::List { id: None } => {
            let usage = editor.field_usage().await?;
            if usage.is_empty() {
                println!("No custom fields");
            }
            for (name, count) in usage {
                println!("  {:<24} {}", name, count);
            }
        }
        FieldsCommand::Add { id, name, field_type } => {
            let field_type: FieldType = field_type.parse()?;
            if editor.add_field(&id, &name, field_type).await? {
                println!("Added {} field '{}' to {}", field_type, name, id);
            } else {
                println!("{} already has field '{}'", id, name);
            }
        }
        FieldsCommand::Set { id, name, value } => {
            let value = editor.set_field(&id, &name, &value).await?;
            println!("Set '{}' = {} ({})", name, value, value.field_type());
        }
        FieldsCommand::Remove { id, name } => {
            if editor.remove_field(&id, &name).await? {
                println!("Removed field '{}' from {}", name, id);
            } else {
                println!("{} has no field '{}'", id, name);
            }
        }
        FieldsCommand::Template { name } => {
            if !TEMPLATE_NAMES.contains(&name.as_str()) {
                bail!("Unknown template '{}' (available: {})", name, TEMPLATE_NAMES.join(", "));
            }
            let count = editor.apply_template(&name).await?;
            println!("Applied '{}' template to {} places", name, count);
        }
    }
    Ok(())
}

fn print_places(places: &[Place]) {
    for place in places {
        let tags = if place.user_tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", place.user_tags.join(", "))
        };
        println!("  {}  {}{}", place.id, place.name, tags);
        if !place.address.is_empty() {
            println!("                {}", place.address);
        }
    }
}
