use std::collections::HashSet;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::migrate::Migrator;
use sqlx::{Row, SqlitePool};

use jokes_core::app::AppState;
use jokes_core::authz::{Permission, RoleTier};
use jokes_core::config::AppConfig;
use jokes_core::db::{self, roles, users};
use jokes_core::models::user::NewUser;
use jokes_core::services::auth;

#[derive(Parser, Debug)]
#[command(author, version, about = "jokes-core maintenance tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Seed the permission catalog and the fixed roles
    Provision,
    /// Create a user directly, bypassing policy checks
    CreateUser {
        name: String,
        email: String,
        role: RoleTier,
        /// Mark the email as verified
        #[arg(long)]
        verified: bool,
    },
    /// Give an existing user an additional role
    AssignRole { email: String, role: String },
    /// Report whether a user holds a permission
    Check { email: String, permission: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may differ,
    // so fall back to the crate-local `.env` using CARGO_MANIFEST_DIR.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command {
        Commands::MigrateRun => {
            let pool = db::connect(&config).await?;
            db::MIGRATOR.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = db::connect(&config).await?;
            print_status(&pool, &db::MIGRATOR).await?;
        }
        Commands::Provision => {
            let state = AppState::connect(config).await?;
            let report = roles::provision(&state.pool).await?;
            println!(
                "Provisioned {} permissions, {} roles, {} grants",
                report.permissions_created, report.roles_created, report.grants_created
            );
        }
        Commands::CreateUser { name, email, role, verified } => {
            let state = AppState::connect(config).await?;
            let mut new = NewUser::new(name, email, role);
            if verified {
                new = new.verified();
            }

            let mut tx = state.pool.begin().await?;
            let role_row = roles::find_role_by_name(&mut tx, role.name())
                .await?
                .with_context(|| format!("role {} is not provisioned; run `provision` first", role))?;
            let user = users::insert(&mut tx, &new).await?;
            roles::assign_role(&mut tx, user.id, role_row.id).await?;
            tx.commit().await?;

            println!("Created {} <{}> as {} ({})", user.name, user.email, role, user.id);
        }
        Commands::AssignRole { email, role } => {
            let state = AppState::connect(config).await?;
            let user = users::find_by_email(&state.pool, &email)
                .await?
                .with_context(|| format!("no live user with email {}", email))?;

            let mut conn = state.pool.acquire().await?;
            let role_row = roles::find_role_by_name(&mut conn, &role)
                .await?
                .with_context(|| format!("no role named {}", role))?;
            if roles::assign_role(&mut conn, user.id, role_row.id).await? {
                println!("Assigned {} to {}", role_row.name, user.email);
            } else {
                println!("{} already holds {}", user.email, role_row.name);
            }
        }
        Commands::Check { email, permission } => {
            let state = AppState::connect(config).await?;
            let permission: Permission = permission.parse()?;
            let user = users::find_by_email(&state.pool, &email)
                .await?
                .with_context(|| format!("no live user with email {}", email))?;
            let principal = auth::load_principal(&state, user.id).await?;

            let role_names: Vec<&str> = principal.roles.iter().map(|r| r.name.as_str()).collect();
            let verdict = if principal.has_permission(permission) { "allowed" } else { "denied" };
            println!("{:<10} {}", "user", user.email);
            println!("{:<10} {}", "roles", role_names.join(", "));
            println!("{:<10} {}", "status", principal.status);
            println!("{:<10} {} -> {}", "check", permission, verdict);
        }
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

async fn print_status(pool: &SqlitePool, migrator: &Migrator) -> anyhow::Result<()> {
    // If the migrations table doesn't exist, nothing is applied yet
    let db_applied = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
        .fetch_optional(pool)
        .await?;
    let applied_versions: HashSet<i64> = if db_applied.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let version = migration.version;
        let status = if applied_versions.contains(&version) { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if !desc.is_empty() { desc } else { "unknown" };
        println!("{:<8} {:<20} {}", status, version, name);
    }

    Ok(())
}
