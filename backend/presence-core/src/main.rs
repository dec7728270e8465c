use anyhow::{anyhow, Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use presence_core::calendar::{parse_reference_date, WeekId};
use presence_core::grid::{day_grid, week_grid, GridFilter};
use presence_core::render::text_table;
use presence_core::server::{router, AppError, AppState};
use presence_core::{
    poll_once, ApiClient, AppConfig, AttendanceEvaluator, Poller, PresenceSource, Session,
    Snapshot, SnapshotStore,
};

#[derive(Parser, Debug)]
#[command(name = "presence-core", version, about = "NFC bus-presence dashboard service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Fetch once and print the presence grid as a text table
    Report {
        /// Reference date, YYYY-MM-DD (defaults to today in Africa/Tunis)
        #[arg(long)]
        date: Option<String>,
        /// ISO week, YYYY-Www; prints the week view
        #[arg(long)]
        week: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        segment: Option<String>,
        /// Shift key (HH:MM_HH:MM) or Repos
        #[arg(long)]
        shift: Option<String>,
    },
    /// Forget the persisted session
    Logout,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Pre-issued token, then persisted session, then configured credentials.
async fn establish_session(client: &ApiClient, config: &AppConfig) -> Result<Option<Session>> {
    if let Some(session) = config.preset_session().map_err(AppError::Config)? {
        info!("Using pre-issued {} token", session.role);
        client.use_session(session.clone()).await;
        return Ok(Some(session));
    }

    match client.restore_session().await {
        Ok(true) => return Ok(client.session().await),
        Ok(false) => {}
        Err(e) => warn!("Ignoring unreadable session file: {}", e),
    }

    if let Some((email, password)) = config.credentials() {
        let session = client
            .login(email, password)
            .await
            .context("Login to attendance API failed")?;
        return Ok(Some(session));
    }

    warn!("No session available; set PRESENCE_API_EMAIL/PRESENCE_API_PASSWORD or PRESENCE_API_TOKEN");
    Ok(None)
}

async fn serve(config: AppConfig, client: Arc<ApiClient>) -> Result<()> {
    let session = establish_session(&client, &config).await?;
    let store = Arc::new(SnapshotStore::new());
    let evaluator = AttendanceEvaluator::new(config.validation_policy());

    let poller = session.as_ref().map(|session| {
        let source: Arc<dyn PresenceSource> = client.clone();
        Arc::new(Poller::spawn(
            source,
            store.clone(),
            session.scope(),
            session.poll_interval(&config),
        ))
    });

    let addr = config.bind_addr().map_err(AppError::Config)?;
    let tls_paths = config
        .tls_paths()
        .map(|(cert, key)| (cert.to_string(), key.to_string()));

    let app = router(AppState {
        config: Arc::new(config),
        client,
        store,
        evaluator,
        poller: poller.clone(),
    });
    info!("Application state initialized.");

    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
    });

    match tls_paths {
        Some((cert_path, key_path)) => {
            let tls_config = RustlsConfig::from_pem_file(&cert_path, &key_path)
                .await
                .map_err(|e| AppError::TlsConfig(format!("Failed to load TLS cert/key: {}", e)))?;
            info!("Starting server on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server failed")?;
        }
        None => {
            info!("Starting server on http://{}", addr);
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("HTTP server failed")?;
        }
    }

    if let Some(poller) = poller {
        poller.shutdown().await;
    }
    Ok(())
}

async fn report(
    config: AppConfig,
    client: Arc<ApiClient>,
    date: Option<String>,
    week: Option<String>,
    filter: GridFilter,
) -> Result<()> {
    let session = establish_session(&client, &config)
        .await?
        .ok_or_else(|| anyhow!("No session available for the attendance API"))?;
    let evaluator = AttendanceEvaluator::new(config.validation_policy());

    let date = match date {
        Some(raw) => parse_reference_date(&raw)?,
        None => evaluator.today(),
    };
    let filter = if session.role.is_segment_scoped() {
        filter.without_segment()
    } else {
        filter
    };
    let scope = session.scope();

    let snapshot = poll_once(client.as_ref(), &scope, &Snapshot::default())
        .await
        .context("Failed to fetch presence data")?;

    let grid = match week {
        Some(raw) => {
            let week: WeekId = raw.parse()?;
            week_grid(
                &evaluator,
                &snapshot.employees,
                &snapshot.scans,
                week,
                date,
                &filter,
                &scope,
            )
        }
        None => day_grid(
            &evaluator,
            &snapshot.employees,
            &snapshot.scans,
            date,
            &filter,
            &scope,
        ),
    };
    print!("{}", text_table(&grid));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("Failed to load PRESENCE_* configuration")?;
    info!("App configuration loaded.");
    let client = Arc::new(ApiClient::new(config.api_config())?);
    info!("Attendance API client initialized for {}", client.config().base_url);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, client).await,
        Command::Report {
            date,
            week,
            search,
            segment,
            shift,
        } => {
            let filter = GridFilter {
                search,
                shift,
                segment,
            };
            report(config, client, date, week, filter).await
        }
        Command::Logout => {
            client.logout().await;
            Ok(())
        }
    }
}
