use std::sync::Arc;

use anyhow::Context;
use hive_api::{AgentApiAdapter, HttpApi, axum};
use hive_client::MasterClient;
use hive_core::{
    Agent, ContainerSupervisorFactory, SupervisorConfig, TaskModel, TokioReactorFactory, agent_id,
    init_uptime, os_info,
};
use hive_exec::DockerRuntime;
use hive_observe::{LoggingSink, logger_init};
use hive_prometheus::PrometheusMetrics;
use tokio::{net::TcpListener, runtime::Handle, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod config;
mod sync;

use config::AgentdConfig;
use sync::MasterSync;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_uptime();
    let cfg = AgentdConfig::from_env().context("invalid configuration")?;
    logger_init(&cfg.logger()).context("failed to initialise logging")?;
    info!(host = %cfg.host, os = %os_info(), version = env!("CARGO_PKG_VERSION"), "hive agent starting");

    std::fs::create_dir_all(cfg.state_dir())
        .with_context(|| format!("failed to create {}", cfg.state_dir().display()))?;
    let id = agent_id(cfg.state_dir());

    let model = TaskModel::open(cfg.state_file())?;
    let runtime = Arc::new(DockerRuntime::new(cfg.docker())?);
    let sink = Arc::new(LoggingSink::new(model.clone()));
    let factory = Arc::new(ContainerSupervisorFactory::new(
        runtime,
        sink,
        SupervisorConfig::default(),
        Handle::current(),
    ));
    let metrics = PrometheusMetrics::new().context("failed to register metrics")?;

    let agent = Arc::new(
        Agent::new(
            Arc::new(model.clone()),
            factory,
            &TokioReactorFactory::current()?,
            cfg.agent(),
        )
        .with_metrics(Arc::new(metrics.clone())),
    );
    agent.start();

    let shutdown = CancellationToken::new();
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    match cfg.client() {
        Some(client_cfg) => {
            let client = MasterClient::new(client_cfg)?;
            info!(master = %client.endpoint(), "following master");
            let sync = MasterSync::new(client, cfg.host.clone(), id.to_string(), model.clone());
            tasks.push(tokio::spawn(sync.run(cfg.sync_interval, shutdown.clone())));
        }
        None => warn!("HIVE_MASTER not set, running with recovered tasks only"),
    }

    if let Some(addr) = cfg.api_addr {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind status api on {addr}"))?;
        let handler = AgentApiAdapter::new(model.clone(), Arc::clone(&agent))
            .with_identity(id, cfg.host.clone())
            .with_metrics(metrics);
        let router = HttpApi::new(Arc::new(handler)).router();
        let token = shutdown.clone();
        info!(%addr, "status api listening");
        tasks.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "status api failed");
            }
        }));
    }

    shutdown_signal().await;
    shutdown.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }
    // Containers keep running; the next start recovers them from the state file.
    agent.close();
    let state = model.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || state.sync()).await {
        warn!(error = %e, "failed to flush task statuses");
    }
    info!("hive agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
