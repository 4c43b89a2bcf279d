//! Node process entry point: registers the node, starts the resource
//! monitors, spawns the Farseeing scheduler, and serves the §6 REST
//! surface over `hyper`.

mod farseeing_sink;
mod routes;
mod state;

use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use mycelium_core::Result;
use state::AppState;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

fn port_from_args() -> u16 {
    std::env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(7000)
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("MYCELIUM_CONFIG_FILE").ok().map(PathBuf::from)
}

#[tokio::main]
async fn main() -> Result<()> {
    mycelium_core::init_tracing(std::env::var("MYCELIUM_LOG_JSON").is_ok());

    let config = mycelium_config::MyceliumConfig::load(config_path_from_env().as_deref())?;
    let port = port_from_args();
    let reachable = vec![format!("127.0.0.1:{port}")];

    let state = Arc::new(AppState::bootstrap(config, reachable).await?);

    {
        let scheduler = state.farseeing.clone();
        let sink = farseeing_sink::AppMgrSink::new(state.clone());
        tokio::spawn(async move {
            scheduler.run(&sink).await;
        });
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| routes::handle(req, state.clone()))) }
    });

    let server = Server::bind(&addr).serve(make_svc);
    info!(%addr, "node listening");
    info!("routes: POST /node/resource/{{cpuAvail,memAvail}}, POST /link/resource/{{bandwidth,latency}}/<src>/<dst>, POST /app/<id>/farseeing, GET /node/resource, GET /id, GET /node/<id>");

    if let Err(err) = server.await {
        error!(%err, "node server error");
    }

    Ok(())
}
