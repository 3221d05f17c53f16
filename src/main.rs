//! 商品目录服务主入口

use catalog_service::{
    auth::PasswordHasher,
    config::AppConfig,
    db,
    handlers::health,
    middleware::AppState,
    repository::{
        ensure_admin, CredentialStore, InMemoryCredentialStore, InMemoryProductStore,
        PgCredentialStore, PgProductStore, ProductStore,
    },
    routes, telemetry,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("catalog-service {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境）
    // 按优先级加载：.env.local > .env.development > .env
    if let Ok(env) = std::env::var("CATALOG_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Catalog service starting...");

    // 3. 存储：配置了数据库则使用 PostgreSQL，否则使用内存存储
    let (credential_store, product_store): (Arc<dyn CredentialStore>, Arc<dyn ProductStore>) =
        match &config.database.url {
            Some(url) => {
                let pool = db::create_pool(&config.database, url).await?;
                db::run_migrations(&pool).await?;
                tracing::info!("Database initialized");
                (
                    Arc::new(PgCredentialStore::new(pool.clone())),
                    Arc::new(PgProductStore::new(pool)),
                )
            }
            None => {
                tracing::warn!("No database configured, using in-memory stores");
                (
                    Arc::new(InMemoryCredentialStore::new()),
                    Arc::new(InMemoryProductStore::new()),
                )
            }
        };

    // 4. 引导管理员账号
    if let (Some(username), Some(password)) = (
        &config.security.bootstrap_admin_username,
        &config.security.bootstrap_admin_password,
    ) {
        let password_hash = PasswordHasher::from_config(&config)?.hash(password.expose_secret())?;
        ensure_admin(credential_store.as_ref(), username, password_hash).await?;
    }

    // 5. 构建应用状态与路由
    let app_state = Arc::new(AppState::new(config.clone(), credential_store, product_store)?);
    let app = routes::create_router(app_state);

    // 6. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 7. 优雅关闭
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    // 超时后强制退出
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

/// 打印帮助信息
fn print_help() {
    println!("catalog-service {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: catalog-service [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 CATALOG_ 前缀的环境变量完成，例如：");
    println!("  CATALOG_SECURITY__JWT_SECRET（必填，至少 32 字符）, CATALOG_DATABASE__URL,");
    println!("  CATALOG_CORS__ALLOWED_ORIGINS=http://localhost:4200,http://localhost:80");
}
