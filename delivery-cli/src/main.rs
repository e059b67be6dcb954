//! Delivery CLI
//!
//! Command-line interface for the Delivery API.

use anyhow::Result;
use clap::{Parser, Subcommand};

use delivery_client::DeliveryClient;
use delivery_types::{CompanyId, ListParcelsQuery, ParcelId, ParcelTypeId};

#[derive(Parser)]
#[command(name = "delivery")]
#[command(author, version, about = "Parcel delivery API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the Delivery API
    #[arg(
        long,
        env = "DELIVERY_API_URL",
        default_value = "http://localhost:3000"
    )]
    api_url: String,

    /// Session to act in; a new one is issued when omitted
    #[arg(long, env = "DELIVERY_SESSION_ID")]
    session: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parcel operations
    Parcel {
        #[command(subcommand)]
        action: ParcelCommands,
    },
    /// Transport company operations
    Company {
        #[command(subcommand)]
        action: CompanyCommands,
    },
    /// Recompute delivery prices now
    PriceUpdate,
    /// Check API health
    Health,
}

#[derive(Subcommand)]
enum ParcelCommands {
    /// Register a parcel
    Register {
        /// Parcel name
        name: String,
        /// Weight in kilograms
        #[arg(long)]
        weight: f64,
        /// Parcel type ID (see `parcel types`)
        #[arg(long = "type")]
        type_id: i64,
        /// Declared content value in USD
        #[arg(long)]
        value: f64,
    },
    /// List parcels of the session
    List {
        #[arg(long = "type")]
        type_id: Option<i64>,
        /// Only priced (true) or unpriced (false) parcels
        #[arg(long)]
        priced: Option<bool>,
        #[arg(long, default_value = "20")]
        limit: i64,
        #[arg(long, default_value = "0")]
        offset: i64,
    },
    /// Get parcel details
    Get {
        /// Parcel ID
        id: String,
    },
    /// List parcel types
    Types,
    /// Bind a parcel to a transport company
    Bind {
        #[arg(long)]
        parcel: String,
        #[arg(long)]
        company: String,
    },
}

#[derive(Subcommand)]
enum CompanyCommands {
    /// Create a transport company
    Create {
        /// Company name
        name: String,
    },
    /// List transport companies
    List,
}

fn parse_parcel_id(s: &str) -> Result<ParcelId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid parcel ID: {}", s))
}

fn parse_company_id(s: &str) -> Result<CompanyId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid company ID: {}", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut client = DeliveryClient::new(&cli.api_url);
    if let Some(session) = &cli.session {
        client = client.with_session(session);
    }

    match cli.command {
        Commands::Health => {
            let healthy = client.health().await?;
            if healthy {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is not healthy");
                std::process::exit(1);
            }
        }

        Commands::Parcel { action } => match action {
            ParcelCommands::Register {
                name,
                weight,
                type_id,
                value,
            } => {
                let id = client
                    .register_parcel(&name, weight, ParcelTypeId::new(type_id), value)
                    .await?;
                println!("{}", serde_json::json!({ "parcel_id": id }));
            }
            ParcelCommands::List {
                type_id,
                priced,
                limit,
                offset,
            } => {
                let query = ListParcelsQuery {
                    type_id: type_id.map(ParcelTypeId::new),
                    has_delivery_cost: priced,
                    limit,
                    offset,
                };
                let parcels = client.list_parcels(&query).await?;
                println!("{}", serde_json::to_string_pretty(&parcels)?);
            }
            ParcelCommands::Get { id } => {
                let parcel = client.get_parcel(parse_parcel_id(&id)?).await?;
                println!("{}", serde_json::to_string_pretty(&parcel)?);
            }
            ParcelCommands::Types => {
                let types = client.list_parcel_types().await?;
                println!("{}", serde_json::to_string_pretty(&types)?);
            }
            ParcelCommands::Bind { parcel, company } => {
                let resp = client
                    .bind_company(parse_parcel_id(&parcel)?, parse_company_id(&company)?)
                    .await?;
                println!("✓ {}", resp.message);
            }
        },

        Commands::Company { action } => match action {
            CompanyCommands::Create { name } => {
                let company = client.create_company(&name).await?;
                println!("{}", serde_json::to_string_pretty(&company)?);
            }
            CompanyCommands::List => {
                let companies = client.list_companies().await?;
                println!("{}", serde_json::to_string_pretty(&companies)?);
            }
        },

        Commands::PriceUpdate => {
            let report = client.run_price_update().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    // Parcels are only visible within the session that registered them
    if cli.session.is_none() {
        if let Some(session) = client.session_id() {
            eprintln!("session: {} (export DELIVERY_SESSION_ID to reuse)", session);
        }
    }

    Ok(())
}
