//! socialnet 主入口

use socialnet::{
    auth::clock::SystemClock,
    config::AppConfig,
    db,
    handlers::health,
    middleware::AppState,
    repository::{AuthRepository, MemoryStore, SessionStore, UserQueries, UserRepository},
    routes, telemetry,
};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Notify;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("socialnet {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境）
    dotenv::from_filename(".env.local").ok();
    dotenv::dotenv().ok();

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "socialnet starting...");

    // 3. 存储
    let pool = if config.database.is_memory() {
        tracing::warn!("Using in-memory store; all data is lost on exit");
        None
    } else {
        Some(db::connect(&config.database).await?)
    };

    let users: Arc<dyn UserQueries>;
    let sessions: Arc<dyn SessionStore>;
    match &pool {
        Some(pool) => {
            users = Arc::new(UserRepository::new(pool.clone()));
            sessions = Arc::new(AuthRepository::new(pool.clone()));
        }
        None => {
            let store = Arc::new(MemoryStore::new());
            users = store.clone();
            sessions = store;
        }
    }

    // 4. 构建应用状态
    let app_state = Arc::new(AppState::new(
        config.clone(),
        pool,
        users,
        sessions,
        Arc::new(SystemClock),
    )?);

    let app = routes::create_router(app_state);

    // 5. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 6. 优雅关闭，超时后强制退出
    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.notify_one();
        }
    });
    let deadline = async {
        shutdown.notified().await;
        tokio::time::sleep(std::time::Duration::from_secs(
            config.server.graceful_shutdown_timeout_secs,
        ))
        .await;
    };

    tokio::select! {
        result = server.into_future() => result?,
        _ = deadline => {
            tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        }
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }
}

fn print_help() {
    println!("socialnet {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: socialnet [--version | --help]");
    println!();
    println!("All settings come from NETAPP_* environment variables, for example:");
    println!("  NETAPP_DATABASE__URL           postgres://... or memory:// (default)");
    println!("  NETAPP_SECURITY__TOKEN_SECRET  bearer token key, required (min 32 chars)");
    println!("  NETAPP_SECURITY__PASSWORD_SALT credential salt, required (min 16 chars)");
}
