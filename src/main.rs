use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use serde::Serialize;
use std::{path::PathBuf, process::ExitCode};
use stockbook::{
    config::{self, Config},
    core::{
        import,
        inventory::{self, NewStockItem},
        purchase::{self, PurchaseDetails},
        reconciler,
        stock::{self, LowStockReport, StockTarget},
    },
    entities::stock_history,
    errors::{Error, ErrorKind, Result},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stockbook", about = "Purchase lifecycle and stock ledger", version)]
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
    /// Create the database tables
    Init,
    /// Add a material or product
    Add(AddArgs),
    /// List materials and products with their stock and unit cost
    Inventory(UserArgs),
    /// Show a purchase with its items and costs
    Show(PurchaseArgs),
    /// Move a purchase to pending, completed or cancelled
    Status(StatusArgs),
    /// Delete a purchase, reversing its stock if it was completed
    Delete(PurchaseArgs),
    /// Import purchases from a JSON file
    Import(ImportArgs),
    /// Show the stock ledger for one material or product
    History(HistoryArgs),
    /// List items at or below their minimum stock
    LowStock(UserArgs),
}

#[derive(Args)]
struct UserArgs {
    #[arg(long, help = "Acting user id")]
    user: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum ItemKind {
    Material,
    Product,
}

#[derive(Args)]
struct AddArgs {
    #[arg(value_enum)]
    kind: ItemKind,
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "pcs", help = "Unit of measure (materials only)")]
    unit: String,
    #[arg(long, default_value_t = Decimal::ZERO)]
    stock: Decimal,
    #[arg(long, default_value_t = Decimal::ZERO)]
    price: Decimal,
    #[arg(long, default_value_t = Decimal::ZERO, help = "Low-stock threshold")]
    min_stock: Decimal,
    #[arg(long, help = "Acting user id")]
    user: String,
}

#[derive(Args)]
struct PurchaseArgs {
    purchase_id: i64,
    #[arg(long, help = "Acting user id")]
    user: String,
}

#[derive(Args)]
struct StatusArgs {
    purchase_id: i64,
    #[arg(help = "pending, completed or cancelled")]
    status: String,
    #[arg(long, help = "Acting user id")]
    user: String,
}

#[derive(Args)]
struct ImportArgs {
    #[arg(help = "JSON array of purchase drafts")]
    file: PathBuf,
    #[arg(long, help = "Acting user id")]
    user: String,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct HistoryTarget {
    #[arg(long)]
    material: Option<i64>,
    #[arg(long)]
    product: Option<i64>,
}

#[derive(Args)]
struct HistoryArgs {
    #[command(flatten)]
    target: HistoryTarget,
    #[arg(long, help = "Acting user id")]
    user: String,
}

impl HistoryTarget {
    const fn resolve(&self) -> Option<StockTarget> {
        match (self.material, self.product) {
            (Some(id), None) => Some(StockTarget::Material(id)),
            (None, Some(id)) => Some(StockTarget::Product(id)),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenv().ok();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(kind = ?err.kind(), "{err}");
            eprintln!("error: {err}");
            ExitCode::from(exit_code(err.kind()))
        }
    }
}

const fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::InvalidInput => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::Forbidden => 4,
        ErrorKind::InsufficientStock => 5,
        ErrorKind::TransactionFailed => 6,
        ErrorKind::Internal => 1,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Config { reconciler: settings } = config::settings::load_default_config()?;
    let db = config::database::create_connection().await?;
    config::database::create_tables(&db).await?;
    let json = cli.json;

    match cli.command {
        Commands::Init => {
            info!(url = %config::database::get_database_url(), "Database ready");
            println!("Database initialised");
        }
        Commands::Add(args) => {
            let item = NewStockItem {
                name: args.name,
                unit: args.unit,
                stock: args.stock,
                price: args.price,
                min_stock: args.min_stock,
            };
            match args.kind {
                ItemKind::Material => {
                    let material = inventory::create_material(&db, &args.user, item).await?;
                    if json {
                        print_json(&material)?;
                    } else {
                        println!("Material {} created (id {})", material.name, material.id);
                    }
                }
                ItemKind::Product => {
                    let product = inventory::create_product(&db, &args.user, item).await?;
                    if json {
                        print_json(&product)?;
                    } else {
                        println!("Product {} created (id {})", product.name, product.id);
                    }
                }
            }
        }
        Commands::Inventory(args) => {
            let materials = inventory::list_materials(&db, &args.user).await?;
            let products = inventory::list_products(&db, &args.user).await?;
            if json {
                print_json(&serde_json::json!({ "materials": materials, "products": products }))?;
            } else {
                println!("Materials:");
                for m in &materials {
                    println!("  [{}] {} - {} {} @ {}", m.id, m.name, m.stock, m.unit, m.price);
                }
                println!("Products:");
                for p in &products {
                    println!("  [{}] {} - {} @ {}", p.id, p.name, p.stock, p.price);
                }
            }
        }
        Commands::Show(args) => {
            let details = purchase::get_purchase(&db, args.purchase_id, &args.user).await?;
            render_purchase(&details, json)?;
        }
        Commands::Status(args) => {
            let details = reconciler::set_purchase_status(
                &db,
                &settings,
                args.purchase_id,
                &args.status,
                &args.user,
            )
            .await?;
            render_purchase(&details, json)?;
        }
        Commands::Delete(args) => {
            reconciler::delete_purchase(&db, &settings, args.purchase_id, &args.user).await?;
            if json {
                print_json(&serde_json::json!({ "deleted": args.purchase_id }))?;
            } else {
                println!("Purchase {} deleted", args.purchase_id);
            }
        }
        Commands::Import(args) => {
            let drafts = import::read_drafts(&args.file)?;
            let report = import::import_purchases(&db, &settings, drafts, &args.user).await?;
            if json {
                print_json(&report)?;
            } else {
                println!("Imported {} purchase(s)", report.imported.len());
                for failure in &report.failed {
                    println!("  #{} skipped: {}", failure.index, failure.message);
                }
            }
        }
        Commands::History(args) => {
            let target = args.target.resolve().ok_or_else(|| Error::InvalidInput {
                message: "Pass exactly one of --material or --product".to_string(),
            })?;
            let rows = stock::get_stock_history(&db, &args.user, target).await?;
            if json {
                print_json(&rows)?;
            } else {
                println!("Stock history for {target}:");
                rows.iter().for_each(render_movement);
            }
        }
        Commands::LowStock(args) => {
            let report = stock::get_low_stock(&db, &args.user).await?;
            render_low_stock(&report, json)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_purchase(details: &PurchaseDetails, json: bool) -> Result<()> {
    if json {
        return print_json(details);
    }
    let p = &details.purchase;
    println!(
        "Purchase {} ({}) - status {} - total {}",
        p.id,
        p.display_reference(),
        p.status,
        p.total
    );
    for item in &details.items {
        let target = purchase::item_target(item)?;
        println!(
            "  - {target}: {} {} @ {} (total {})",
            item.quantity, item.unit, item.price, item.total_price
        );
    }
    for cost in &details.additional_costs {
        println!("  + {}: {}", cost.description, cost.amount);
    }
    Ok(())
}

fn render_movement(row: &stock_history::Model) {
    println!(
        "  {} {:<10} {:>10} {} [{}]",
        row.created_at.format("%Y-%m-%d %H:%M"),
        row.movement_type.as_str(),
        row.quantity,
        row.description,
        row.reference
    );
}

fn render_low_stock(report: &LowStockReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    if report.is_empty() {
        println!("Nothing is running low");
        return Ok(());
    }
    for m in &report.materials {
        println!("  material [{}] {}: {} (min {})", m.id, m.name, m.stock, m.min_stock);
    }
    for p in &report.products {
        println!("  product [{}] {}: {} (min {})", p.id, p.name, p.stock, p.min_stock);
    }
    Ok(())
}
