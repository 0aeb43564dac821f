//! CLI smoke entry point.
//!
//! # Responsibility
//! - Drive the order repository against an SQLite file from a shell.
//! - Print results as JSON on stdout and failures on stderr.

use clap::{Parser, Subcommand};
use log::{info, warn};
use repokit_core::{
    default_log_level, init_logging, open_db, CrudRepository, Order, OrderId, OrderStatus,
    PageRequest, RepoError, Sort, SortOrder, SqliteRepository,
};
use serde_json::json;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "repokit", version, about = "Order repository smoke CLI")]
struct Cli {
    /// SQLite database file; created and migrated when missing.
    #[arg(long, env = "REPOKIT_DB", default_value = "repokit.db")]
    db: PathBuf,

    /// trace|debug|info|warn|error. Defaults to the build profile level.
    #[arg(long, env = "REPOKIT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long, env = "REPOKIT_LOG_DIR")]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Prints core linkage information.
    Ping,
    /// Inserts an order, or replaces it when --id names an existing one.
    Save {
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
        #[arg(long, default_value_t = 0)]
        price_cents: i64,
        #[arg(long, value_parser = parse_status, default_value = "pending")]
        status: OrderStatus,
        #[arg(long)]
        id: Option<OrderId>,
    },
    /// Prints one order, or `null` when absent.
    Get { id: OrderId },
    /// Prints one page of orders.
    List {
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        page: i64,
        #[arg(long, default_value_t = 20, allow_negative_numbers = true)]
        size: i64,
        /// `property[,asc|desc]`; repeat for secondary orders.
        #[arg(long)]
        sort: Vec<String>,
    },
    Count,
    /// Deletes one order by id. Unknown ids succeed.
    Delete { id: OrderId },
    /// Deletes every order.
    Clear,
}

impl Command {
    /// Stable name used in `event=cli_command` log lines.
    fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Save { .. } => "save",
            Self::Get { .. } => "get",
            Self::List { .. } => "list",
            Self::Count => "count",
            Self::Delete { .. } => "delete",
            Self::Clear => "clear",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    }

    let command = cli.command.name();
    info!(
        "event=cli_command module=cli status=start command={command} db={}",
        cli.db.display()
    );
    match run(&cli) {
        Ok(output) => {
            info!("event=cli_command module=cli status=ok command={command}");
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let code = err
                .downcast_ref::<RepoError>()
                .map_or("error", RepoError::code);
            warn!("event=cli_command module=cli status=error command={command} error_code={code}");
            eprintln!("{code}: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<serde_json::Value, Box<dyn Error>> {
    if let Command::Ping = cli.command {
        return Ok(ping_output());
    }
    let conn = open_db(&cli.db)?;
    let repo = SqliteRepository::<Order>::try_new(&conn)?;
    execute(&repo, &cli.command)
}

fn execute(
    repo: &impl CrudRepository<Order>,
    command: &Command,
) -> Result<serde_json::Value, Box<dyn Error>> {
    let output = match command {
        Command::Ping => ping_output(),
        Command::Save {
            name,
            quantity,
            price_cents,
            status,
            id,
        } => {
            let mut order = Order::new(name.as_str())
                .with_quantity(*quantity)
                .with_unit_price_cents(*price_cents)
                .with_status(*status);
            order.id = *id;
            serde_json::to_value(repo.save(&order)?)?
        }
        Command::Get { id } => serde_json::to_value(repo.find_by_id(*id)?)?,
        Command::List { page, size, sort } => {
            let sort = sort
                .iter()
                .map(|spec| SortOrder::parse(spec))
                .collect::<Result<Sort, _>>()?;
            let request = PageRequest::of(*page, *size).with_sort(sort);
            let page = repo.find_all_paged(&request)?;
            json!({
                "content": page.content,
                "page_number": page.page_number,
                "page_size": page.page_size,
                "total_elements": page.total_elements,
                "total_pages": page.total_pages(),
            })
        }
        Command::Count => json!({ "count": repo.count()? }),
        Command::Delete { id } => {
            repo.delete_by_id(*id)?;
            json!({ "deleted": id })
        }
        Command::Clear => {
            repo.delete_all()?;
            json!({ "cleared": true })
        }
    };
    Ok(output)
}

fn ping_output() -> serde_json::Value {
    json!({
        "ping": repokit_core::ping(),
        "version": repokit_core::core_version(),
    })
}

fn parse_status(value: &str) -> Result<OrderStatus, String> {
    OrderStatus::parse(&value.trim().to_ascii_lowercase())
        .ok_or_else(|| format!("unknown status `{value}`; expected pending|paid|shipped|cancelled"))
}
