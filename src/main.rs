use std::{
    error::Error,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use foodgram::{
    actions::{ensure_superuser, insert_ingredients, run_migrations},
    api::{routes::routes, state::AppState},
    config::Config,
    schema::NewIngredient,
};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

#[derive(Parser)]
#[command(name = "foodgram")]
#[command(about = "Recipe sharing backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply migrations, provision the superuser and serve the HTTP API
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Import ingredients from a JSON list of `{"name", "measurement_unit"}`
    LoadIngredients {
        /// Path to the JSON file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let pool = connect(&config).await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(pool, config).await?,
        Commands::Migrate => run_migrations(&pool).await?,
        Commands::LoadIngredients { path } => load_ingredients(&pool, &path).await?,
    }

    Ok(())
}

async fn connect(config: &Config) -> Result<Pool<Postgres>, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
}

async fn serve(pool: Pool<Postgres>, config: Config) -> Result<(), Box<dyn Error>> {
    run_migrations(&pool).await?;
    if let Some(superuser) = &config.superuser {
        ensure_superuser(superuser, &pool).await?;
    }

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(pool, config);

    let (address, server) =
        warp::serve(routes(state)).try_bind_with_graceful_shutdown(address, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Could not listen for shutdown signal: {e}");
            }
        })?;
    log::info!("Listening on http://{address}");

    server.await;
    log::info!("Server stopped");

    Ok(())
}

async fn load_ingredients(pool: &Pool<Postgres>, path: &Path) -> Result<(), Box<dyn Error>> {
    let data = tokio::fs::read(path).await?;
    let ingredients: Vec<NewIngredient> = serde_json::from_slice(&data)?;

    let inserted = insert_ingredients(&ingredients, pool).await?;
    log::info!(
        "Loaded {inserted} of {} ingredients from {}",
        ingredients.len(),
        path.display()
    );

    Ok(())
}
