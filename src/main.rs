use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prereq_playground::api;
use prereq_playground::config::ServerConfig;
use prereq_playground::db::Database;
use prereq_playground::diagnostic::DiagnosticService;
use prereq_playground::graph::PrerequisiteIndex;

#[derive(Parser)]
#[command(name = "playground")]
#[command(about = "Prerequisite graph resolver and adaptive diagnostic server")]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port for HTTP API
        #[arg(short, long)]
        port: Option<u16>,

        /// Concept graph JSON document
        #[arg(short, long)]
        graph: Option<PathBuf>,

        /// SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Print every prerequisite of a concept, nearest first
    Prereqs {
        concept: String,

        /// Concept graph JSON document
        #[arg(short, long)]
        graph: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "prereq_playground=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let index = PrerequisiteIndex::load(&config.graph_path)?;
    tracing::info!(
        "Loaded concept graph from {} ({} concepts)",
        config.graph_path.display(),
        index.concepts().len()
    );

    let db = match &config.database_path {
        Some(path) => Database::open(path.clone())?,
        None => Database::open_default()?,
    };
    db.migrate()?;

    let questions = config.questions.build()?;
    let service = DiagnosticService::new(Arc::new(index), questions, Arc::new(db))
        .with_question_concurrency(config.question_concurrency);

    let app = api::create_router_with_origins(service, &config.cors_origins);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Playground server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = ServerConfig::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Serve { port, graph, db }) => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(graph) = graph {
                config.graph_path = graph;
            }
            if let Some(db) = db {
                config.database_path = Some(db);
            }
            serve(config).await?;
        }
        Some(Commands::Prereqs { concept, graph }) => {
            let path = graph.unwrap_or(config.graph_path);
            let index = PrerequisiteIndex::load(&path)?;
            for prerequisite in index.all_prerequisites(&concept) {
                println!("{}", prerequisite);
            }
        }
        None => serve(config).await?,
    }

    Ok(())
}
