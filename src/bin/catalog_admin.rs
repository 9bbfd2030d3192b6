use std::sync::Arc;

use anyhow::{Context, Result};
use catalog_search::{
    catalog::SeaOrmCatalog,
    config::{self, AppConfig},
    db::{self, DbPool},
    search::{IndexSettings, MeilisearchIndex},
    services::index_sync::IndexSynchronizer,
};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "catalog-admin",
    about = "Maintenance commands for the catalog search index",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push filterable, sortable and pagination settings to the product index
    ConfigureIndex {
        /// Overrides search.max_total_hits from the configuration
        #[arg(long)]
        max_total_hits: Option<u64>,
    },
    /// Rebuild every search document from the catalog
    Reindex {
        /// Remove all documents first so deleted products disappear too
        #[arg(long, action = ArgAction::SetTrue)]
        fresh: bool,
    },
    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::ConfigureIndex { max_total_hits } => {
            handle_configure_index(&context, max_total_hits, cli.json).await?
        }
        Commands::Reindex { fresh } => handle_reindex(&context, fresh, cli.json).await?,
        Commands::Migrate => handle_migrate(&context).await?,
    }

    Ok(())
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;

        Ok(Self {
            config,
            db: Arc::new(db_pool),
        })
    }

    fn index(&self) -> Result<Arc<MeilisearchIndex>> {
        let index = MeilisearchIndex::new(&self.config.search)
            .context("failed to create search index client")?;
        Ok(Arc::new(index))
    }
}

async fn handle_configure_index(
    context: &CliContext,
    max_total_hits: Option<u64>,
    json: bool,
) -> Result<()> {
    let index = context.index()?;
    let settings =
        IndexSettings::catalog(max_total_hits.unwrap_or(context.config.search.max_total_hits));

    let task = index
        .update_settings(&settings)
        .await
        .context("failed to update index settings")?;

    if json {
        print_json(&task)?;
    } else {
        println!(
            "Index '{}' settings update enqueued (task {}, {})",
            index.index_uid(),
            task.task_uid,
            task.status
        );
        println!(
            "  filterable: {}",
            settings.filterable_attributes.join(", ")
        );
        println!("  sortable:   {}", settings.sortable_attributes.join(", "));
        if let Some(pagination) = settings.pagination {
            println!("  maxTotalHits: {}", pagination.max_total_hits);
        }
    }
    Ok(())
}

async fn handle_reindex(context: &CliContext, fresh: bool, json: bool) -> Result<()> {
    let index = context.index()?;
    let catalog = Arc::new(SeaOrmCatalog::new(context.db.clone()));
    let sync = IndexSynchronizer::new(
        catalog,
        index,
        context.config.search.reindex_batch_size,
    );

    info!(fresh, "Starting full reindex");
    let report = sync.reindex_all(fresh).await.context("reindex failed")?;

    if json {
        print_json(&report)?;
    } else {
        println!(
            "Indexed {} products in {} batches",
            report.documents, report.batches
        );
    }
    Ok(())
}

async fn handle_migrate(context: &CliContext) -> Result<()> {
    db::run_migrations(&context.db)
        .await
        .context("failed to run migrations")?;
    println!("Migrations applied");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
