use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use bkl_schemas::Actor;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "bkl")]
#[command(about = "Backline marketplace operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// User administration
    User {
        #[command(subcommand)]
        cmd: UserCmd,
    },

    /// Order back-office actions (run as staff)
    Order {
        #[command(subcommand)]
        cmd: OrderCmd,
    },

    /// Configuration utilities
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations. Guardrail: refuses while orders are still PENDING unless --yes is provided.
    Migrate {
        /// Acknowledge you are migrating a DB with open rental business.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum UserCmd {
    /// Create a user row. The only path that can mint staff accounts.
    Create {
        /// Unique username
        username: String,

        /// Human-readable name (defaults to the username)
        #[arg(long = "display-name")]
        display_name: Option<String>,

        /// Grant the staff capability flag
        #[arg(long, default_value_t = false)]
        staff: bool,

        /// Grant the lender capability flag
        #[arg(long, default_value_t = false)]
        lender: bool,
    },
}

#[derive(Subcommand)]
enum OrderCmd {
    /// Print an order row
    Show {
        /// Order id
        order_id: String,
    },

    /// Force-cancel a PENDING order
    Cancel {
        /// Order id
        order_id: String,
    },

    /// Hard-delete an order (refused once approved)
    Delete {
        /// Order id
        order_id: String,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Compute layered config hash + print canonical JSON
    Hash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience); silent when absent.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = bkl_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = bkl_db::status(&pool).await?;
                    println!("db_ok={} has_orders_table={}", s.ok, s.has_orders_table);
                }
                DbCmd::Migrate { yes } => {
                    // Guardrail: refuse migrations while any order is still awaiting
                    // a lender response, unless the operator acknowledges with --yes.
                    let n = bkl_db::count_pending_orders(&pool).await?;
                    if n > 0 && !yes {
                        anyhow::bail!(
                            "REFUSING MIGRATE: {} order(s) still PENDING. Re-run with: `bkl db migrate --yes`",
                            n
                        );
                    }

                    bkl_db::migrate(&pool).await?;
                    tracing::info!(pending_orders = n, "db/migrate");
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::User { cmd } => match cmd {
            UserCmd::Create {
                username,
                display_name,
                staff,
                lender,
            } => {
                let pool = bkl_db::connect_from_env().await?;

                let new = bkl_db::NewUser {
                    user_id: Uuid::new_v4(),
                    display_name: display_name.unwrap_or_else(|| username.clone()),
                    username,
                    is_staff: staff,
                    is_lender: lender,
                };
                let row = bkl_db::insert_user(&pool, &new).await?;
                tracing::info!(user_id = %row.user_id, is_staff = row.is_staff, "user/create");

                println!("user_id={}", row.user_id);
                println!("username={}", row.username);
                println!("is_staff={}", row.is_staff);
                println!("is_lender={}", row.is_lender);
            }
        },

        Commands::Order { cmd } => match cmd {
            OrderCmd::Show { order_id } => {
                let id = Uuid::parse_str(&order_id).context("invalid order_id uuid")?;
                let pool = bkl_db::connect_from_env().await?;
                let r = bkl_db::orders::fetch_order(&pool, id).await?;
                print_order(&r);
            }

            OrderCmd::Cancel { order_id } => {
                let id = Uuid::parse_str(&order_id).context("invalid order_id uuid")?;
                let pool = bkl_db::connect_from_env().await?;
                let r = bkl_db::orders::cancel_order(&pool, &operator(), id).await?;
                tracing::info!(order_id = %r.order_id, "order/cancel");
                println!("cancelled=true order_id={} status={}", r.order_id, r.status.as_str());
            }

            OrderCmd::Delete { order_id } => {
                let id = Uuid::parse_str(&order_id).context("invalid order_id uuid")?;
                let pool = bkl_db::connect_from_env().await?;
                bkl_db::orders::delete_order(&pool, &operator(), id).await?;
                tracing::info!(order_id = %id, "order/delete");
                println!("deleted=true order_id={}", id);
            }
        },

        Commands::Config { cmd } => match cmd {
            ConfigCmd::Hash { paths } => {
                let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
                let loaded = bkl_config::load_layered_yaml(&path_refs)?;
                println!("config_hash={}", loaded.config_hash);
                println!("{}", loaded.canonical_json);
            }
        },
    }

    Ok(())
}

/// The CLI acts with staff capability; holding database credentials is the
/// authorization. The nil id marks back-office actions in logs.
fn operator() -> Actor {
    Actor::staff(Uuid::nil())
}

/// Log lines go to stderr; stdout stays the machine-readable surface.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_order(r: &bkl_db::orders::OrderRow) {
    println!("order_id={}", r.order_id);
    println!("renter_id={}", r.renter_id);
    println!("lender_id={}", r.lender_id);
    println!("listing_id={}", r.listing_id);
    println!("requested_date={}", r.requested_date);
    println!("start_date={}", r.start_date);
    println!("end_date={}", r.end_date);
    println!("status={}", r.status.as_str());
    println!(
        "lender_response={}",
        r.lender_response.map(|x| x.as_str()).unwrap_or("")
    );
    println!("subtotal_cents={}", r.subtotal_cents);
    println!("created_at={}", r.created_at.to_rfc3339());
    println!("updated_at={}", r.updated_at.to_rfc3339());
}
