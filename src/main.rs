//! guten-books server entry point.

use clap::Parser;
use guten_books::{
    catalog,
    config::{Cli, Command, Config},
    db::Database,
    server,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    match cli.command {
        Some(Command::Init { force }) => cmd_init(force),
        Some(Command::Genres) => cmd_genres(&config),
        Some(Command::Serve { bind, database }) => cmd_serve(config, bind, database).await,
        None => cmd_serve(config, None, None).await,
    }
}

/// Write a default config and create the catalog schema.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    let config = Config::default();
    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    println!("\nLoad the catalog tables, then run: guten-books serve");

    Ok(())
}

/// Print bookshelf names.
fn cmd_genres(config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;
    let genres = catalog::list_genres(&db)?;

    if genres.results.is_empty() {
        println!("No genres found.");
    } else {
        for name in &genres.results {
            println!("{}", name);
        }
        println!("{}", "-".repeat(40));
        println!("{} genres", genres.count);
    }

    Ok(())
}

/// Start the server.
async fn cmd_serve(
    mut config: Config,
    bind: Option<SocketAddr>,
    database: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(addr) = bind {
        config.server.bind = addr;
    }
    if let Some(path) = database {
        config.database.path = path;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guten_books=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = Database::open(&config.database.path)?;
    let books = db.book_count()?;

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        books,
        "Starting guten-books server"
    );

    if books == 0 {
        tracing::warn!("Catalog is empty; listings will return no results");
    }

    let bind_addr = config.server.bind;
    let state = server::AppState::new(config, db);
    let app = server::create_router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(address = %bind_addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
