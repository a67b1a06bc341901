use std::{process, sync::Arc};

use pagecache::{
    application::{
        commands::{self, CacheTarget},
        error::AppError,
    },
    cache::{PageCache, PageCacheConfig},
    config,
    infra::{error::InfraError, http, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) =
        config::load_with_cli().map_err(|err| AppError::from(InfraError::from(err)))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let cache = PageCache::new(PageCacheConfig::from(&settings.cache));

    match command {
        config::Command::Serve(_) => run_serve(&settings, cache).await,
        config::Command::Resolve(args) => run_resolve(&cache, &args),
        config::Command::Write(args) => run_write(&cache, &args),
        config::Command::Expire(args) => run_expire(&cache, &args),
    }
}

async fn run_serve(settings: &config::Settings, cache: PageCache) -> Result<(), AppError> {
    let router = http::build_router(Arc::new(cache));

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "pagecache::serve",
        addr = %settings.server.addr,
        root = %settings.cache.root.display(),
        "Serving page cache"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

fn run_resolve(cache: &PageCache, args: &config::ResolveArgs) -> Result<(), AppError> {
    let entry = commands::resolve(cache, &CacheTarget::from(&args.key))?;
    println!("{}", entry.plain().display());
    Ok(())
}

fn run_write(cache: &PageCache, args: &config::WriteArgs) -> Result<(), AppError> {
    if !cache.is_enabled() {
        return Err(AppError::validation(
            "page caching is disabled; enable `cache.enabled` to write pages",
        ));
    }

    let content = commands::read_content(args.input.as_deref())?;
    let compression = cache.config().compression;
    let entry = commands::write(cache, &CacheTarget::from(&args.key), &content, compression)?;
    println!("{}", entry.plain().display());
    Ok(())
}

fn run_expire(cache: &PageCache, args: &config::ExpireArgs) -> Result<(), AppError> {
    commands::expire(cache, &CacheTarget::from(&args.key), &args.variants)
}
