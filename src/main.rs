use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use frontdesk::auth::SessionStore;
use frontdesk::config::Config;
use frontdesk::engine::Engine;
use frontdesk::http::{self, AppState, OPERATOR_GROUP};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    frontdesk::observability::init(config.metrics_port);

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;
    let wal_path = PathBuf::from(&config.data_dir).join("frontdesk.wal");
    let engine = Arc::new(Engine::new(wal_path)?);

    seed_admin(&engine, &config).await?;

    let sessions = Arc::new(SessionStore::new(config.session_ttl_secs as i64 * 1000));

    tokio::spawn(frontdesk::reaper::run_session_reaper(sessions.clone()));
    tokio::spawn(frontdesk::reaper::run_compactor(
        engine.clone(),
        config.compact_threshold,
    ));

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("frontdesk listening on {addr}");
    info!("  data_dir: {}", config.data_dir);
    info!("  session_ttl: {}s", config.session_ttl_secs);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!(
                "http://0.0.0.0:{p}/metrics"
            ))
    );

    let app = http::router(AppState {
        engine,
        sessions,
        config,
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("shutdown complete");
    Ok(())
}

/// First run only: seed an operator account so the API is reachable.
async fn seed_admin(engine: &Engine, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let Some(password) = &config.admin_password else {
        return Ok(());
    };
    if !engine
        .list_employees(frontdesk::engine::Page { number: 1, size: 1 })
        .is_empty()
    {
        return Ok(());
    }
    let admin = engine
        .create_employee(
            "admin".into(),
            frontdesk::auth::hash_password(password),
            "admin@localhost".into(),
            "Admin".into(),
            "Admin".into(),
            "Administrator".into(),
            OPERATOR_GROUP.into(),
            None,
            None,
            vec![OPERATOR_GROUP.into()],
        )
        .await?;
    info!("seeded admin employee {}", admin.id);
    Ok(())
}

/// Stop accepting on SIGTERM/ctrl-c, then let in-flight requests drain.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    tracing::info!("shutdown signal received");
}
