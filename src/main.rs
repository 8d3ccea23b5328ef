use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use moodiary::cache::{InMemoryCache, SessionCache};
use moodiary::config::Config;
use moodiary::oauth::NaverProvider;
use moodiary::openapi::ApiDoc;
use moodiary::repo::Repo;
use moodiary::routes::{config, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds; deployments set the environment themselves.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = Config::from_env().context("invalid configuration")?;
    info!("Bootstrapping moodiary server");
    info!("Naver OAuth configured: {}", cfg.naver.is_some());
    info!("Service URL: {}", cfg.service_url);

    let repo = build_repo(&cfg).await?;
    let cache = build_cache(&cfg)?;
    let identity = Arc::new(NaverProvider::new(cfg.naver.clone()));
    let state = AppState { repo, cache, identity, service_url: cfg.service_url.clone() };

    let openapi = ApiDoc::openapi();
    let service_url = cfg.service_url.clone();

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&service_url)
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://127.0.0.1:5173")
            .allow_any_header()
            .allowed_methods(["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind((cfg.host.as_str(), cfg.port))
    .with_context(|| format!("binding {}:{}", cfg.host, cfg.port))?;

    info!("Listening on http://{}:{}", cfg.host, cfg.port);
    server.run().await?;
    Ok(())
}

#[cfg(feature = "postgres-store")]
async fn build_repo(cfg: &Config) -> anyhow::Result<Arc<dyn Repo>> {
    use moodiary::repo::pg::PgRepo;
    use sqlx::postgres::PgPoolOptions;

    let db_url = cfg.database_url.as_deref().context("DATABASE_URL must be set for postgres-store")?;
    let pool = PgPoolOptions::new().max_connections(5).connect(db_url).await.context("connecting to Postgres")?;
    let repo = PgRepo::new(pool);
    repo.migrate().await.context("running migrations")?;
    info!("Using Postgres repository backend");
    Ok(Arc::new(repo))
}

#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
async fn build_repo(cfg: &Config) -> anyhow::Result<Arc<dyn Repo>> {
    use moodiary::repo::inmem::InMemRepo;

    let repo = match cfg.data_dir {
        Some(ref dir) => {
            info!(dir = %dir.display(), "Using in-memory repository with snapshot");
            InMemRepo::with_snapshot(dir)
        }
        None => {
            info!("Using in-memory repository backend");
            InMemRepo::new()
        }
    };
    Ok(Arc::new(repo))
}

fn build_cache(cfg: &Config) -> anyhow::Result<Arc<dyn SessionCache>> {
    #[cfg(feature = "redis-cache")]
    if let Some(ref url) = cfg.redis_url {
        let cache = moodiary::cache::redis::RedisCache::from_url(url).context("creating Redis pool")?;
        info!("Using Redis session cache");
        return Ok(Arc::new(cache));
    }
    if cfg.redis_url.is_some() && !cfg!(feature = "redis-cache") {
        warn!("REDIS_URL set but the redis-cache feature is disabled; sessions stay in memory");
    }
    Ok(Arc::new(InMemoryCache::new()))
}
