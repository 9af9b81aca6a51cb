use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use reconhub_dash::client::BackendClient;
use reconhub_dash::config::Settings;
use reconhub_dash::session::{LoginFlow, LoginForm, LoginOutcome, Session};
use reconhub_dash::types::{Role, ScanRecord};
use reconhub_dash::views::display_time;
use reconhub_dash::{export, server};

/// reconhub-dash: dashboard service and CLI for the ReconHub scanning API.
#[derive(Debug, Parser)]
#[command(name = "reconhub-dash", version, about, long_about = None)]
struct Cli {
    /// API root of the ReconHub backend.
    #[arg(long, env = "RECONHUB_API", default_value = "http://127.0.0.1:8000/api", global = true)]
    api: String,

    /// Backend request timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 30_000, global = true)]
    timeout_ms: u64,

    /// Debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the dashboard UI and its fragment endpoints.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "RECONHUB_BIND", default_value = "127.0.0.1:8080")]
        bind: String,

        /// Directory with the static page markup.
        #[arg(long = "ui-dir", env = "RECONHUB_UI_DIR", default_value = "ui")]
        ui_dir: PathBuf,

        /// Number of recent scans shown on the dashboard.
        #[arg(long, default_value_t = 10)]
        limit: u64,
    },
    /// Sign in and print the access token.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "RECONHUB_PASSWORD")]
        password: String,
        /// TOTP code, for accounts with 2FA.
        #[arg(long)]
        otp: Option<String>,
    },
    /// List recent scans.
    Scans {
        #[arg(long, env = "RECONHUB_TOKEN")]
        token: String,
        #[arg(long, default_value_t = 10)]
        limit: u64,
        /// Also write the records as pretty JSON to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Download a CSV report of all scans or of one scan.
    Export {
        #[arg(long, env = "RECONHUB_TOKEN")]
        token: String,
        #[arg(long = "scan-id")]
        scan_id: Option<i64>,
        /// Directory the report is written to.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "reconhub_dash=debug" } else { "reconhub_dash=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let timeout = Duration::from_millis(cli.timeout_ms);
    let client = BackendClient::new(&cli.api, timeout)?;

    match cli.command {
        Command::Serve { bind, ui_dir, limit } => {
            let settings = Settings {
                backend_url: cli.api.clone(),
                bind,
                ui_dir,
                request_timeout: timeout,
                scan_list_limit: limit,
            };
            settings.validate()?;
            if !settings.ui_dir.is_dir() {
                warn!(dir = %settings.ui_dir.display(), "UI directory missing; only /ui endpoints will respond");
            }
            tokio::select! {
                res = server::spawn_server(&settings) => res?,
                _ = tokio::signal::ctrl_c() => info!("shutting down"),
            }
        }
        Command::Login { username, password, otp } => {
            let attempt = LoginFlow::default().attempt(LoginForm { username, password, otp })?;
            match client.login(&attempt).await? {
                LoginOutcome::Authenticated(session) => println!("{}", session.access_token),
                LoginOutcome::SecondFactorRequired => bail!("2FA code required; re-run with --otp"),
            }
        }
        Command::Scans { token, limit, output } => {
            let session = session_from_token(&client, token).await?;
            let records = client.list_scans(&session, 0, limit).await?;
            print_scans_table(&records);
            if let Some(path) = output.as_deref() {
                write_scans_json(path, &records)?;
                println!("Wrote JSON results to {}", path.display());
            }
        }
        Command::Export { token, scan_id, dir } => {
            let session = session_from_token(&client, token).await?;
            let path = export::download_report(&client, &session, scan_id, &dir).await?;
            println!("Saved {}", path.display());
        }
    }

    Ok(())
}

/// Wrap a bearer token and look up its role.
async fn session_from_token(client: &BackendClient, token: String) -> Result<Session> {
    if token.is_empty() || token == "undefined" || token == "null" {
        bail!("Please login first");
    }
    let mut session = Session {
        access_token: token,
        refresh_token: None,
        role: Role::User,
    };
    let identity = client.verify(&session).await.context("token rejected")?;
    session.role = identity.role;
    Ok(session)
}

fn print_scans_table(records: &[ScanRecord]) {
    let id_w = records.iter().map(|r| r.id.to_string().len()).max().unwrap_or(0).max("id".len());
    let kind_w = records.iter().map(|r| r.scan_type.as_str().len()).max().unwrap_or(0).max("type".len());
    let target_w = records.iter().map(|r| r.target.len().min(40)).max().unwrap_or(0).max("target".len());

    println!("\nScans: {}", records.len());
    println!(
        "{:>id_w$}  {:<kind_w$}  {:<target_w$}  {}",
        "id",
        "type",
        "target",
        "created",
        id_w = id_w,
        kind_w = kind_w,
        target_w = target_w
    );
    println!(
        "{:->id_w$}  {:-<kind_w$}  {:-<target_w$}  {:-<23}",
        "",
        "",
        "",
        "",
        id_w = id_w,
        kind_w = kind_w,
        target_w = target_w
    );
    for r in records {
        let target: String = r.target.chars().take(40).collect();
        println!(
            "{:>id_w$}  {:<kind_w$}  {:<target_w$}  {}",
            r.id,
            r.scan_type.as_str(),
            target,
            display_time(&r.created_at),
            id_w = id_w,
            kind_w = kind_w,
            target_w = target_w
        );
    }
}

fn write_scans_json(path: &Path, records: &[ScanRecord]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, records)?;
    Ok(())
}
