pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "pizzabot",
    about = "Pizzabot operator CLI",
    long_about = "Inspect configuration, check readiness, apply migrations, \
                  validate menus, and manage orders.",
    after_help = concat!(
        "Examples:\n",
        "  pizzabot doctor --json\n",
        "  pizzabot catalog search \"cheese\"\n",
        "  pizzabot orders set-status <order-id> delivered"
    )
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, menu file, database connectivity, and payment setup")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(subcommand, about = "Validate and query the menu file")]
    Catalog(CatalogCommand),
    #[command(subcommand, about = "List orders and update delivery status")]
    Orders(OrdersCommand),
}

#[derive(Debug, Subcommand)]
enum CatalogCommand {
    #[command(about = "Load the menu and report item counts per category")]
    Check {
        #[arg(long, help = "Menu file to check instead of the configured one")]
        path: Option<PathBuf>,
    },
    #[command(about = "Fuzzy-search the menu the way the assistant does")]
    Search {
        query: String,
        #[arg(long, help = "Menu file to search instead of the configured one")]
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum OrdersCommand {
    #[command(about = "List recent orders, or every order for one session")]
    List {
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, help = "Only show orders for this session id")]
        session: Option<String>,
    },
    #[command(about = "Move an order to pending, preparing, or delivered")]
    SetStatus { order_id: String, status: String },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Catalog(CatalogCommand::Check { path }) => commands::catalog::check(path),
        Command::Catalog(CatalogCommand::Search { query, path }) => {
            commands::catalog::search(&query, path)
        }
        Command::Orders(OrdersCommand::List { limit, session }) => {
            commands::orders::list(limit, session)
        }
        Command::Orders(OrdersCommand::SetStatus { order_id, status }) => {
            commands::orders::set_status(&order_id, &status)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
