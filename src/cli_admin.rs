use anyhow::{bail, Context, Result};
use bx_mcp_server::index_store::SqliteIndexStore;
use bx_mcp_server::live_api::LiveApiService;
use bx_mcp_server::mcp::tools::register_all_tools;
use bx_mcp_server::mcp::McpRegistry;
use bx_mcp_server::server_store::{ServerStore, SqliteServerStore, NEED_TO_REINDEX_KEY};
use bx_mcp_server::token::{Grant, SqliteTokenStore, TokenSecret, TokenService};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;

mod cli_style;

use cli_style::{admin_styles, report, Panel, Table, Tone};

const DEFAULT_REINDEX_BATCH: usize = 10;

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=admin_styles(), version, about = "Offline administration of the MCP server databases")]
struct CliArgs {
    /// Directory holding server.db, tokens.db and live_api.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: PathBuf,

    /// Document root of the Bitrix installation, needed by reindex and status.
    #[clap(long, value_parser = parse_path)]
    pub document_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage capability tokens.
    Token {
        #[command(subcommand)]
        command: TokenCommand,
    },

    /// Lists every grant a token can carry.
    Grants,

    /// Rebuilds the LiveAPI index batch by batch.
    Reindex {
        /// Modules scanned per batch.
        #[clap(long, default_value_t = DEFAULT_REINDEX_BATCH)]
        batch: usize,
    },

    /// Shows the state of the LiveAPI index.
    Status,
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Issues a token and prints its bearer string once.
    Issue {
        identifier: String,
        /// A grant to include, repeatable.
        #[clap(long = "grant")]
        grants: Vec<String>,
        /// Lifetime in seconds. Without it the token never expires.
        #[clap(long)]
        ttl: Option<u64>,
    },

    /// Lists issued tokens.
    List,

    /// Replaces the grants of a token by id.
    SetGrants {
        id: i64,
        /// A grant to keep, repeatable. Without any the token keeps no grants.
        #[clap(long = "grant")]
        grants: Vec<String>,
    },

    /// Deletes a token by id.
    Revoke { id: i64 },
}

struct Databases {
    db_dir: PathBuf,
    server_store: Arc<dyn ServerStore>,
}

impl Databases {
    fn open(db_dir: PathBuf) -> Result<Self> {
        if !db_dir.is_dir() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        let server_store: Arc<dyn ServerStore> =
            Arc::new(SqliteServerStore::new(db_dir.join("server.db"))?);
        Ok(Self {
            db_dir,
            server_store,
        })
    }

    fn token_service(&self) -> Result<TokenService> {
        let store = Arc::new(SqliteTokenStore::new(self.db_dir.join("tokens.db"))?);
        let secret = TokenSecret::load_or_create(self.server_store.as_ref())?;
        Ok(TokenService::new(store, secret))
    }

    fn live_api(&self, document_root: Option<PathBuf>) -> Result<LiveApiService> {
        let document_root =
            document_root.context("--document-root is required for this command")?;
        let index = SqliteIndexStore::new(self.db_dir.join("live_api.db"))?;
        if index.was_created() {
            self.server_store.set_state(NEED_TO_REINDEX_KEY, "Y")?;
        }
        Ok(LiveApiService::new(
            document_root,
            Arc::new(index),
            self.server_store.clone(),
        ))
    }
}

fn format_timestamp(ts: Option<i64>) -> String {
    ts.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn run_token_command(databases: &Databases, command: TokenCommand) -> Result<()> {
    let service = databases.token_service()?;
    match command {
        TokenCommand::Issue {
            identifier,
            grants,
            ttl,
        } => {
            let issued = service.issue(&identifier, &grants, ttl)?;
            report(
                Tone::Done,
                &format!("Issued token {} for '{}'", issued.id, issued.identifier),
            );
            report(Tone::Notice, "The bearer string is shown only once:");
            println!("{}", issued.token);
        }
        TokenCommand::List => {
            let tokens = service.list()?;
            if tokens.is_empty() {
                report(Tone::Notice, "No tokens issued");
            } else {
                let mut table = Table::new(&["ID", "Identifier", "Grants", "Expires", "Last used"]);
                for token in tokens {
                    let grants: Vec<&str> = token.grants.iter().map(|g| g.as_str()).collect();
                    table.row(vec![
                        token.id.to_string(),
                        token.identifier,
                        grants.join(","),
                        format_timestamp(token.expiration),
                        format_timestamp(token.last_used_at),
                    ]);
                }
                table.print();
            }
        }
        TokenCommand::SetGrants { id, grants } => {
            let grants = service.set_grants(id, &grants)?;
            let names: Vec<&str> = grants.iter().map(|g| g.as_str()).collect();
            report(
                Tone::Done,
                &format!("Token {} grants: {}", id, names.join(",")),
            );
        }
        TokenCommand::Revoke { id } => {
            service.revoke(id)?;
            report(Tone::Done, &format!("Revoked token {}", id));
        }
    }
    Ok(())
}

fn run_reindex(live_api: &LiveApiService, batch: usize) -> Result<()> {
    if batch == 0 {
        bail!("Batch size must be positive");
    }
    let first = live_api.reindex(0, batch)?;
    let bar = ProgressBar::new(first.total as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} modules ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.inc(first.processed as u64);

    let mut done = first.processed;
    while done < first.total {
        let progress = live_api.reindex(done, batch)?;
        if progress.processed == 0 {
            bail!("Module list changed during reindex, run it again");
        }
        done += progress.processed;
        bar.inc(progress.processed as u64);
    }
    bar.finish();
    report(Tone::Done, &format!("Indexed {} modules", first.total));
    Ok(())
}

fn run_status(live_api: &LiveApiService) -> Result<()> {
    let status = live_api.status()?;
    let mut panel = Panel::new("LiveAPI index")
        .field("Needs reindex", if status.need_to_reindex { "yes" } else { "no" })
        .field("Functions", status.functions.to_string())
        .field("Events", status.events.to_string());
    if let Some(stat) = status.stat {
        panel = panel
            .field("Modules", stat.modules_count.to_string())
            .field("Last reindex", stat.datetime);
    }
    panel.print();
    Ok(())
}

fn run(cli_args: CliArgs) -> Result<()> {
    let databases = Databases::open(cli_args.db_dir)?;
    match cli_args.command {
        Command::Token { command } => run_token_command(&databases, command),
        Command::Grants => {
            let mut registry = McpRegistry::new();
            register_all_tools(&mut registry);
            let mut panel = Panel::new("Grants");
            for grant in Grant::ALL {
                let tools: Vec<&str> = registry
                    .tools()
                    .iter()
                    .filter(|tool| tool.required_grant() == Some(grant))
                    .map(|tool| tool.name.as_str())
                    .collect();
                panel = panel.field(grant.as_str(), tools.join(", "));
            }
            panel.print();
            Ok(())
        }
        Command::Reindex { batch } => {
            run_reindex(&databases.live_api(cli_args.document_root)?, batch)
        }
        Command::Status => run_status(&databases.live_api(cli_args.document_root)?),
    }
}

fn main() {
    let cli_args = CliArgs::parse();
    if let Err(err) = run(cli_args) {
        report(Tone::Failure, &format!("{:#}", err));
        std::process::exit(1);
    }
}
