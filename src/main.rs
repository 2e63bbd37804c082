use anyhow::Result;
use locale_pages::assembler::PageAssembler;
use locale_pages::config::Config;
use locale_pages::enumerator::PathEnumerator;
use locale_pages::generation::GenerationMachine;
use locale_pages::i18n::{FsTranslationSource, TranslationLoader};
use locale_pages::manifest::SiteManifest;
use locale_pages::resolver::Resolver;
use locale_pages::server;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("locale_pages=info".parse()?),
        )
        .init();

    info!("Starting locale page build");

    // Load configuration from environment
    let config = Config::from_env()?;

    // Step 1: Load the site manifest
    info!("Loading site manifest from {}", config.site_manifest);
    let site = SiteManifest::from_file(&config.site_manifest)?.into_site()?;
    info!(
        "Site has {} locales (default '{}') and {} routes",
        site.registry.list_locales().len(),
        site.registry.default_locale().code,
        site.catalogue.list_templates().len()
    );

    // Step 2: Wire translations, assembly and generation
    let source = Arc::new(FsTranslationSource::new(&config.locales_dir));
    let loader = Arc::new(TranslationLoader::new(Arc::clone(&site.registry), source));
    let assembler = PageAssembler::new(Arc::clone(&site.catalogue), loader);
    let machine = GenerationMachine::new(
        Arc::clone(&site.catalogue),
        assembler,
        server::props_renderer(),
    );

    // Step 3: Enumerate and pre-build every page
    let paths = PathEnumerator::new(Arc::clone(&site.catalogue), site.params).enumerate();
    info!("Pre-building {} pages", paths.len());

    let report = machine.build_all(paths, config.build_concurrency).await;
    for (path, failure) in &report.failed {
        warn!("Page {} will be retried on request: {}", path, failure.message);
    }

    if !config.serve {
        info!("Build complete, not serving (SERVE=false)");
        return Ok(());
    }

    // Step 4: Serve requests
    let resolver = Resolver::new(site.catalogue, machine);
    server::serve(server::router(resolver), config.port).await
}
