//! FurniMart CLI - session migrations and order operations.
//!
//! # Usage
//!
//! ```bash
//! # Create the session table
//! fm-cli migrate
//!
//! # Mark an order shipped
//! fm-cli order-status order-3f0c... --status shipped
//!
//! # Look up a shipment
//! fm-cli track usps 9400111899223856928499
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use furnimart_core::{OrderId, OrderStatus, PaymentStatus};

mod commands;

#[derive(Parser)]
#[command(name = "fm-cli")]
#[command(author, version, about = "FurniMart operational tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the storefront session table
    Migrate,
    /// Update an order's fulfilment or payment status in the catalog store
    OrderStatus {
        /// Order document id
        order_id: String,

        /// New fulfilment status (`pending`, `processing`, `shipped`, `delivered`, `cancelled`)
        #[arg(short, long)]
        status: Option<OrderStatus>,

        /// New payment status (`pending`, `paid`, `partially_paid`, `failed`)
        #[arg(short, long)]
        payment_status: Option<PaymentStatus>,
    },
    /// Show the shipping provider's status for a shipment
    Track {
        /// Carrier token, e.g. `usps`
        carrier: String,
        tracking_number: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::sessions().await?,
        Commands::OrderStatus {
            order_id,
            status,
            payment_status,
        } => {
            commands::orders::update_status(&OrderId::new(order_id), status, payment_status)
                .await?;
        }
        Commands::Track {
            carrier,
            tracking_number,
        } => commands::track::show(&carrier, &tracking_number).await?,
    }
    Ok(())
}
