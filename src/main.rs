use std::net::{IpAddr, SocketAddr};

use relay_bot::{AppState, config::Config, router::build_router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration, refusing to start: {}", e);
            std::process::exit(1);
        }
    };

    let state = match AppState::init(config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to start relay: {}", e);
            std::process::exit(1);
        }
    };

    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Relay listening on {}", addr);

    // 启动服务，收到信号后优雅退出
    let app = build_router(state.clone());
    let token = state.shutdown_token();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown signal received"),
                _ = token.cancelled() => {}
            }
        })
        .await;
    if let Err(e) = served {
        tracing::error!("Server error: {}", e);
    }

    state.shutdown().await;
}
