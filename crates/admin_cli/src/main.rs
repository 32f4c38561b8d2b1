use std::error::Error;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use engine::{
    DeltaCmd, Engine, EngineSettings, ItemType, MissionNew, ObjectiveType, RewardNew,
    RewardPayload, ShopItemNew, TransactionKind,
};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "besitos_admin")]
#[command(about = "Admin utilities for besitos (catalog, grants, ledger audits)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./besitos.db?mode=rwc"
    )]
    database_url: String,

    /// Reference timezone for daily boundaries (IANA name).
    #[arg(long, env = "BESITOS_TIMEZONE", default_value = "UTC")]
    timezone: chrono_tz::Tz,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Credit (or debit, with a negative amount) a user's balance.
    Grant(GrantArgs),
    Vip(Vip),
    Mission(Mission),
    Item(Item),
    Reward(Reward),
    /// Replay a user's ledger and compare it with the cached balance.
    Audit(UserArgs),
    /// Rebuild a user's cached balance from the ledger.
    Repair(UserArgs),
    Levels(Levels),
}

#[derive(Args, Debug)]
struct UserArgs {
    #[arg(long)]
    user: i64,
}

#[derive(Args, Debug)]
struct GrantArgs {
    #[arg(long)]
    user: i64,
    #[arg(long, allow_negative_numbers = true)]
    amount: i64,
    #[arg(long)]
    description: Option<String>,
    /// Makes the grant safe to re-run.
    #[arg(long)]
    idempotency_key: Option<String>,
}

#[derive(Args, Debug)]
struct Vip {
    #[command(subcommand)]
    command: VipCommand,
}

#[derive(Subcommand, Debug)]
enum VipCommand {
    Set(VipSetArgs),
    Revoke(UserArgs),
}

#[derive(Args, Debug)]
struct VipSetArgs {
    #[arg(long)]
    user: i64,
    /// RFC 3339 expiry; without it the membership never expires.
    #[arg(long, value_parser = parse_datetime)]
    until: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
struct Mission {
    #[command(subcommand)]
    command: MissionCommand,
}

#[derive(Subcommand, Debug)]
enum MissionCommand {
    Create(MissionCreateArgs),
    List,
    Activate(ToggleArgs),
    Deactivate(ToggleArgs),
}

#[derive(Args, Debug)]
struct MissionCreateArgs {
    #[arg(long)]
    name: String,
    /// streak, daily_count, weekly_count, one_time_count or specific_reaction.
    #[arg(long, value_parser = parse_objective)]
    objective: ObjectiveType,
    #[arg(long)]
    value: i64,
    #[arg(long, default_value_t = 0)]
    besitos: i64,
    #[arg(long)]
    description: Option<String>,
    /// Reward granted on claim, on top of the besitos.
    #[arg(long)]
    reward: Option<Uuid>,
    #[arg(long)]
    min_level: Option<i32>,
    #[arg(long)]
    vip_only: bool,
    /// Reaction counted by `specific_reaction` missions.
    #[arg(long)]
    reaction: Option<String>,
}

#[derive(Args, Debug)]
struct ToggleArgs {
    #[arg(long)]
    id: Uuid,
}

#[derive(Args, Debug)]
struct Item {
    #[command(subcommand)]
    command: ItemCommand,
}

#[derive(Subcommand, Debug)]
enum ItemCommand {
    Create(ItemCreateArgs),
    Restock(ItemRestockArgs),
    List,
    Deactivate(ToggleArgs),
}

#[derive(Args, Debug)]
struct ItemCreateArgs {
    #[arg(long)]
    name: String,
    /// consumable, cosmetic or collectible.
    #[arg(long = "type", value_parser = parse_item_type)]
    item_type: ItemType,
    #[arg(long)]
    price: i64,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    stock: Option<i64>,
    #[arg(long)]
    max_per_user: Option<i64>,
    #[arg(long)]
    vip_only: bool,
}

#[derive(Args, Debug)]
struct ItemRestockArgs {
    #[arg(long)]
    id: Uuid,
    #[arg(long)]
    units: i64,
}

#[derive(Args, Debug)]
struct Reward {
    #[command(subcommand)]
    command: RewardCommand,
}

#[derive(Subcommand, Debug)]
enum RewardCommand {
    Create(RewardCreateArgs),
    List,
}

#[derive(Args, Debug)]
struct RewardCreateArgs {
    #[arg(long)]
    name: String,
    /// JSON payload, e.g. `{"type":"badge","rarity":"rare"}`.
    #[arg(long, value_parser = parse_payload)]
    payload: RewardPayload,
    #[arg(long)]
    description: Option<String>,
    /// Price in besitos; without it the reward can only be earned.
    #[arg(long)]
    cost: Option<i64>,
    #[arg(long)]
    unlock_mission: Option<Uuid>,
    #[arg(long)]
    min_level: Option<i32>,
    #[arg(long)]
    min_besitos: Option<i64>,
}

#[derive(Args, Debug)]
struct Levels {
    #[command(subcommand)]
    command: LevelsCommand,
}

#[derive(Subcommand, Debug)]
enum LevelsCommand {
    Show,
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| format!("invalid datetime {raw}: {err}"))
}

fn parse_objective(raw: &str) -> Result<ObjectiveType, String> {
    ObjectiveType::try_from(raw).map_err(|err| err.to_string())
}

fn parse_item_type(raw: &str) -> Result<ItemType, String> {
    ItemType::try_from(raw).map_err(|err| err.to_string())
}

fn parse_payload(raw: &str) -> Result<RewardPayload, String> {
    serde_json::from_str(raw).map_err(|err| format!("invalid reward payload: {err}"))
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder()
        .database(db)
        .settings(EngineSettings {
            timezone: cli.timezone,
            ..EngineSettings::default()
        })
        .build()
        .await?;

    match cli.command {
        Command::Grant(args) => {
            let kind = if args.amount < 0 {
                TransactionKind::Adjustment
            } else {
                TransactionKind::Grant
            };
            let mut cmd = DeltaCmd::new(args.user, args.amount, kind);
            if let Some(description) = args.description {
                cmd = cmd.description(description);
            }
            if let Some(key) = args.idempotency_key {
                cmd = cmd.idempotency_key(key);
            }
            let outcome = engine.apply_delta(cmd).await?;
            println!(
                "user {}: balance {} (level {}){}",
                args.user,
                outcome.new_balance,
                outcome.level,
                if outcome.replayed { ", already applied" } else { "" }
            );
        }
        Command::Vip(Vip {
            command: VipCommand::Set(args),
        }) => {
            engine.set_vip(args.user, args.until).await?;
            match args.until {
                Some(until) => println!("user {} is VIP until {until}", args.user),
                None => println!("user {} is VIP", args.user),
            }
        }
        Command::Vip(Vip {
            command: VipCommand::Revoke(args),
        }) => {
            engine.revoke_vip(args.user).await?;
            println!("user {} is no longer VIP", args.user);
        }
        Command::Mission(Mission { command }) => match command {
            MissionCommand::Create(args) => {
                let mut new = MissionNew::new(args.name, args.objective, args.value, args.besitos)
                    .vip_only(args.vip_only);
                if let Some(description) = args.description {
                    new = new.description(description);
                }
                if let Some(reward) = args.reward {
                    new = new.reward_id(reward);
                }
                if let Some(level) = args.min_level {
                    new = new.required_level(level);
                }
                if let Some(reaction) = args.reaction {
                    new = new.reaction(reaction);
                }
                let mission = engine.create_mission(new).await?;
                println!("created mission: {} ({})", mission.name, mission.id);
            }
            MissionCommand::List => {
                for mission in engine.missions().await? {
                    println!(
                        "{}  {:<24} {:<18} {:>5} -> {:>5} besitos{}",
                        mission.id,
                        mission.name,
                        mission.objective_type.as_str(),
                        mission.objective_value,
                        mission.besitos_reward,
                        if mission.is_active { "" } else { "  (inactive)" }
                    );
                }
            }
            MissionCommand::Activate(args) => {
                engine.set_mission_active(args.id, true).await?;
                println!("mission {} activated", args.id);
            }
            MissionCommand::Deactivate(args) => {
                engine.set_mission_active(args.id, false).await?;
                println!("mission {} deactivated", args.id);
            }
        },
        Command::Item(Item { command }) => match command {
            ItemCommand::Create(args) => {
                let mut new =
                    ShopItemNew::new(args.name, args.item_type, args.price).vip_only(args.vip_only);
                if let Some(description) = args.description {
                    new = new.description(description);
                }
                if let Some(stock) = args.stock {
                    new = new.stock(stock);
                }
                if let Some(max) = args.max_per_user {
                    new = new.max_per_user(max);
                }
                let item = engine.create_shop_item(new).await?;
                println!("created item: {} ({})", item.name, item.id);
            }
            ItemCommand::Restock(args) => {
                let item = engine.restock_shop_item(args.id, args.units).await?;
                match item.stock {
                    Some(stock) => println!("{}: {stock} in stock", item.name),
                    None => println!("{}: unlimited stock", item.name),
                }
            }
            ItemCommand::List => {
                for item in engine.shop_items(true).await? {
                    println!(
                        "{}  {:<24} {:<12} {:>6} besitos  stock {}{}",
                        item.id,
                        item.name,
                        item.item_type.as_str(),
                        item.price,
                        item.stock.map_or("-".to_string(), |stock| stock.to_string()),
                        if item.is_active { "" } else { "  (inactive)" }
                    );
                }
            }
            ItemCommand::Deactivate(args) => {
                engine.set_shop_item_active(args.id, false).await?;
                println!("item {} deactivated", args.id);
            }
        },
        Command::Reward(Reward { command }) => match command {
            RewardCommand::Create(args) => {
                let mut new = RewardNew::new(args.name, args.payload);
                if let Some(description) = args.description {
                    new = new.description(description);
                }
                if let Some(cost) = args.cost {
                    new = new.cost(cost);
                }
                if let Some(mission) = args.unlock_mission {
                    new = new.unlocked_by_mission(mission);
                }
                if let Some(level) = args.min_level {
                    new = new.min_level(level);
                }
                if let Some(besitos) = args.min_besitos {
                    new = new.min_besitos(besitos);
                }
                let reward = engine.create_reward(new).await?;
                println!(
                    "created {} reward: {} ({})",
                    reward.reward_type().as_str(),
                    reward.name,
                    reward.id
                );
            }
            RewardCommand::List => {
                for reward in engine.rewards(true).await? {
                    println!(
                        "{}  {:<24} {:<10} {}",
                        reward.id,
                        reward.name,
                        reward.reward_type().as_str(),
                        reward
                            .cost_besitos
                            .map_or("earned".to_string(), |cost| format!("{cost} besitos"))
                    );
                }
            }
        },
        Command::Audit(args) => {
            let audit = engine.audit_ledger(args.user).await?;
            println!(
                "user {}: {} entries, cached {} / ledger {} (earned {}, spent {})",
                audit.user_id,
                audit.entries,
                audit.cached_balance,
                audit.ledger_balance,
                audit.ledger_earned,
                audit.ledger_spent
            );
            for row in &audit.discrepancies {
                println!(
                    "  seq {} ({}): balance_after {} expected {}",
                    row.seq, row.transaction_id, row.recorded_balance_after, row.expected_balance_after
                );
            }
            if !audit.is_consistent() {
                eprintln!("ledger is inconsistent, run `besitos_admin repair --user {}`", args.user);
                std::process::exit(1);
            }
            println!("ledger is consistent");
        }
        Command::Repair(args) => {
            let progress = engine.repair_balance(args.user).await?;
            println!(
                "user {}: balance {} level {} (earned {}, spent {})",
                progress.user_id,
                progress.besitos_balance,
                progress.current_level,
                progress.total_points_earned,
                progress.total_points_spent
            );
        }
        Command::Levels(Levels {
            command: LevelsCommand::Show,
        }) => {
            for level in engine.levels().await? {
                let max = level
                    .max_points
                    .map_or("∞".to_string(), |max| max.to_string());
                println!(
                    "{:>2}  {:<14} [{}, {})  x{:.2}",
                    level.level, level.name, level.min_points, max, level.multiplier
                );
            }
        }
    }

    Ok(())
}
