use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use vigil::{
    AlarmEngine, Config, EventPublisher, ExpirySweeper, InMemoryGateway, LogPublisher,
    PersistenceGateway,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vigil::init_logging();
    info!("{}", vigil::build_banner());

    let mut config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => {
            info!("No configuration file given, using defaults");
            Config::default()
        }
    };
    config
        .apply_overrides(|key| std::env::var(key).ok())
        .context("applying environment overrides")?;

    let gateway = build_gateway(&config).await?;
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    #[cfg(feature = "mqtt")]
    let transport = config.mqtt.clone().map(vigil::MqttTransport::new);

    #[cfg(feature = "mqtt")]
    let publisher: Arc<dyn EventPublisher> = match &transport {
        Some(transport) => Arc::new(transport.publisher()),
        None => Arc::new(LogPublisher),
    };

    #[cfg(not(feature = "mqtt"))]
    let publisher: Arc<dyn EventPublisher> = {
        if config.mqtt.is_some() {
            warn!("MQTT configured but this build lacks the mqtt feature; events go to the log");
        }
        Arc::new(LogPublisher)
    };

    let engine = Arc::new(AlarmEngine::new(gateway, publisher));
    engine.load().await.context("loading alarm state")?;

    tasks.push(ExpirySweeper::new(engine.clone(), config.engine.sweep_interval()).spawn());

    #[cfg(feature = "mqtt")]
    if let Some(transport) = transport {
        tasks.push(tokio::spawn(transport.run(engine.clone())));
    }

    let web_task = spawn_web(&config, engine.clone());

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        res = async {
            match web_task {
                Some(handle) => handle.await,
                None => std::future::pending().await,
            }
        } => {
            match res {
                Ok(()) => warn!("Operator API stopped"),
                Err(e) => error!("Operator API task failed: {}", e),
            }
        }
    }

    for task in tasks {
        task.abort();
    }

    let stats = engine.stats().await;
    info!(
        "Alarm engine stopped with {} definitions, {} active alarms",
        stats.definitions, stats.active_alarms
    );
    Ok(())
}

async fn build_gateway(config: &Config) -> anyhow::Result<Arc<dyn PersistenceGateway>> {
    match &config.database {
        #[cfg(feature = "postgres")]
        Some(database) => {
            let gateway = vigil::PostgresGateway::connect(&database.url, database.max_connections)
                .await
                .context("connecting to PostgreSQL")?;
            gateway.ensure_schema().await.context("preparing alarm tables")?;
            Ok(Arc::new(gateway))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            warn!(
                "Database configured but this build lacks the postgres feature; \
                 using the in-memory store"
            );
            Ok(Arc::new(InMemoryGateway::new()))
        }
        None => {
            info!("No database configured, using the in-memory store");
            Ok(Arc::new(InMemoryGateway::new()))
        }
    }
}

#[cfg(feature = "web")]
fn spawn_web(config: &Config, engine: Arc<AlarmEngine>) -> Option<JoinHandle<()>> {
    let bind = config.web.as_ref()?.bind.clone();
    Some(tokio::spawn(async move {
        if let Err(e) = vigil::web::start_server(&bind, engine).await {
            error!("Operator API error: {}", e);
        }
    }))
}

#[cfg(not(feature = "web"))]
fn spawn_web(config: &Config, _engine: Arc<AlarmEngine>) -> Option<JoinHandle<()>> {
    if config.web.is_some() {
        warn!("Web API configured but this build lacks the web feature");
    }
    None
}
