use sea_orm::Database;
use sea_orm_migration::prelude::*;

const USAGE: &str = "usage: migration [up [N] | down [N] | fresh | refresh | status]";

fn steps(raw: Option<String>) -> Result<Option<u32>, String> {
    raw.map(|value| {
        value
            .parse()
            .map_err(|_| format!("invalid number of steps: {value}"))
    })
    .transpose()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "up".to_string());
    let steps = steps(args.next())?;

    let url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:./besitos.db?mode=rwc".to_string());
    let db = Database::connect(&url).await?;

    match command.as_str() {
        "up" => migration::Migrator::up(&db, steps).await?,
        // One step by default: rolling everything back is what `fresh` is for.
        "down" => migration::Migrator::down(&db, Some(steps.unwrap_or(1))).await?,
        "fresh" => migration::Migrator::fresh(&db).await?,
        "refresh" => migration::Migrator::refresh(&db).await?,
        "status" => migration::Migrator::status(&db).await?,
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}
