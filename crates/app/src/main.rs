use migration::{Migrator, MigratorTrait};

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "besitos={level},server={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .init();

    let database = sea_orm::Database::connect(settings.database.url()).await?;
    Migrator::up(&database, None).await?;
    tracing::info!("database migrated");

    let engine = engine::Engine::builder()
        .database(database)
        .settings(settings.engine.to_engine_settings())
        .build()
        .await?;

    if settings.server.api_token.trim().is_empty() {
        tracing::warn!("server.api_token is empty, every request will be rejected");
    }
    let bind = settings
        .server
        .bind
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let listener = tokio::net::TcpListener::bind((bind.as_str(), settings.server.port)).await?;
    server::run_with_listener(engine, &settings.server.api_token, listener).await?;

    Ok(())
}
