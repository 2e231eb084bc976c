use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::net::TcpListener;

mod book;
mod buf;
mod config;
mod http;
mod logger;
mod pipeline;
mod pool;
mod request;
mod routing;
mod server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::Config::load()?;
    logger::init(&cfg)?;

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    // Configuration finalization: resolve every routing scope's module
    // configuration, then let modules register their content handlers.
    // Both run exactly once, before the listener opens.
    let locations = routing::build_locations(&cfg)?;
    let mut pipeline = pipeline::Pipeline::new();
    book::postconfiguration(&mut pipeline)?;
    logger::log_handlers_registered(pipeline.content_handler_count());

    let state = Arc::new(config::AppState::new(cfg, pipeline, locations));
    let listener = server::listener::create_reusable_listener(addr)?;
    let connections = Arc::new(AtomicUsize::new(0));

    logger::log_server_start(&addr, &state.config);

    // Use LocalSet for spawn_local support
    let local = tokio::task::LocalSet::new();
    local.run_until(accept_loop(listener, state, connections)).await;
    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    state: Arc<config::AppState>,
    connections: Arc<AtomicUsize>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                server::connection::accept_connection(stream, peer_addr, &state, &connections);
            }
            Err(e) => {
                logger::log_error(&format!("Failed to accept connection: {e}"));
            }
        }
    }
}
