//! Optica CLI - migrations, tenant bootstrap and lens imports.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! optica-cli migrate
//!
//! # Create an organization on a 30-day trial
//! optica-cli org create -n "Óptica Andes" -r 76.086.428-5 --plan pro
//!
//! # Create the first platform administrator
//! optica-cli user create -e ops@optica.cl -n "Ops" -r platform_admin
//!
//! # Create an owner for organization 3
//! optica-cli user create -e dueno@andes.cl -n "Dueño" -r owner --org 3
//!
//! # Import lens families and matrices
//! optica-cli lens import --org 3 matrices.yaml
//!
//! # Expire open quotes past their validity date
//! optica-cli quotes expire
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use optica_core::{Email, Rut, SubscriptionPlan, UserRole};

mod commands;

#[derive(Parser)]
#[command(name = "optica-cli")]
#[command(author, version, about = "Optica back-office operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage organizations
    Org {
        #[command(subcommand)]
        action: OrgAction,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Lens families and price matrices
    Lens {
        #[command(subcommand)]
        action: LensAction,
    },
    /// Quote maintenance
    Quotes {
        #[command(subcommand)]
        action: QuotesAction,
    },
}

#[derive(Subcommand)]
enum OrgAction {
    /// Create an organization with a trial subscription
    Create {
        /// Legal or trade name
        #[arg(short, long)]
        name: String,

        /// Company RUT (e.g. 76.086.428-5)
        #[arg(short, long)]
        rut: Rut,

        /// URL slug; derived from the name when omitted
        #[arg(long)]
        slug: Option<String>,

        /// IVA rate (defaults to `OPTICA_DEFAULT_TAX_RATE` or 0.19)
        #[arg(long)]
        tax_rate: Option<Decimal>,

        /// Subscription plan (`basic`, `pro`, `enterprise`)
        #[arg(long)]
        plan: Option<SubscriptionPlan>,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user with a password
    Create {
        /// Login email
        #[arg(short, long)]
        email: Email,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Role (`platform_admin`, `owner`, `manager`, `seller`)
        #[arg(short, long, default_value = "owner")]
        role: UserRole,

        /// Organization id; required for every role but `platform_admin`
        #[arg(long)]
        org: Option<i32>,

        /// Home branch id
        #[arg(long)]
        branch: Option<i32>,

        /// Password; read from `OPTICA_USER_PASSWORD` when omitted
        #[arg(long, env = "OPTICA_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Subcommand)]
enum LensAction {
    /// Import families and matrices from a YAML file
    Import {
        /// Organization that owns the families
        #[arg(long)]
        org: i32,

        /// YAML file with a `families` list
        file: PathBuf,

        /// Validate the file without writing anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum QuotesAction {
    /// Mark every open quote past its validity date as expired
    Expire,
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "optica_cli=info,optica_admin=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Org { action } => match action {
            OrgAction::Create {
                name,
                rut,
                slug,
                tax_rate,
                plan,
            } => {
                commands::org::create(commands::org::NewOrganization {
                    name,
                    rut,
                    slug,
                    tax_rate,
                    plan,
                })
                .await?;
            }
        },
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                role,
                org,
                branch,
                password,
            } => {
                commands::user::create(commands::user::NewAccount {
                    email,
                    name,
                    role,
                    organization: org,
                    branch,
                    password,
                })
                .await?;
            }
        },
        Commands::Lens { action } => match action {
            LensAction::Import { org, file, dry_run } => {
                commands::lens::import(org, &file, dry_run).await?;
            }
        },
        Commands::Quotes { action } => match action {
            QuotesAction::Expire => commands::quotes::expire().await?,
        },
    }
    Ok(())
}
