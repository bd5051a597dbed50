use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use reelshelf::http::state::{AppState, LibrarySettings, ProcessingSettings};
use reelshelf::media::metadata::{FfprobeExtractor, MetadataExtractor};
use reelshelf::media::scanner::LibraryScanner;
use reelshelf::media::thumbnail::{FfmpegThumbnailer, ThumbnailGenerator};
use reelshelf::media::thumbnail_service::ThumbnailService;
use reelshelf::store::{MediaStore, MemoryStore, SqliteStore};
use reelshelf::{cli, config, http};

/// Wait for the first Ctrl+C (graceful shutdown). A second Ctrl+C while
/// draining force-exits.
async fn wait_for_shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nreelshelf: forced exit");
            std::process::exit(1);
        }
    });
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();

    // Config is read before tracing exists; report what happened afterwards.
    let config_path = config::find_config_file(args.config.as_deref());
    let (file_config, config_error) = match config_path.as_deref().map(config::load_config) {
        Some(Ok(cfg)) => (Some(cfg), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };
    let config = config::Config::resolve(file_config, &args);

    init_tracing(&config.log_level);

    if let Some(path) = &config_path {
        match config_error {
            Some(e) => tracing::warn!("Ignoring config file {}: {}", path.display(), e),
            None => tracing::debug!("Loaded config from {}", path.display()),
        }
    }

    tracing::info!(version = env!("REELSHELF_VERSION"), "starting reelshelf");

    let store: Arc<dyn MediaStore> = match &config.database_path {
        Some(path) => match SqliteStore::open(path) {
            Ok(store) => {
                tracing::info!("Library database: {}", path.display());
                Arc::new(store)
            }
            Err(e) => {
                eprintln!("error: failed to open database {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            tracing::info!("Library kept in memory (--in-memory)");
            Arc::new(MemoryStore::new())
        }
    };

    let extractor = FfprobeExtractor::new();
    let generator = FfmpegThumbnailer::new(&config.thumbnail_dir).unwrap_or_else(|e| {
        eprintln!(
            "error: cannot create thumbnail directory {}: {}",
            config.thumbnail_dir.display(),
            e
        );
        std::process::exit(1);
    });

    if extractor.is_available() {
        tracing::info!(
            program = %extractor.program().display(),
            "ffprobe available - metadata extraction enabled"
        );
    } else {
        tracing::warn!("ffprobe not found - metadata extraction disabled");
    }
    if generator.is_available() {
        tracing::info!(
            output_dir = %generator.output_dir().display(),
            "ffmpeg available - thumbnail generation enabled"
        );
    } else {
        tracing::warn!("ffmpeg not found - thumbnail generation disabled");
    }

    let thumbnails = Arc::new(ThumbnailService::new(
        Arc::new(generator),
        Arc::new(extractor),
        Arc::clone(&store),
        config.cache_capacity,
        config.cache_max_size,
    ));
    let scanner = Arc::new(LibraryScanner::new(Arc::clone(&store)));
    let shutdown = CancellationToken::new();

    let state = AppState {
        store,
        scanner,
        thumbnails,
        library: LibrarySettings {
            path: config.library_path.clone(),
            name: config.library_name.clone(),
        },
        processing: ProcessingSettings {
            enabled: config.background,
            batch_size: config.batch_size,
            delay: config.delay,
        },
        shutdown: shutdown.clone(),
    };

    match &config.library_path {
        Some(path) => {
            tracing::info!(path = %path.display(), name = %config.library_name, "starting initial library scan");
            let initial = state.clone();
            tokio::spawn(async move { initial.scan_and_enrich().await });
        }
        None => tracing::warn!("no library path configured; pass one on the command line or set library.path"),
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("error: failed to bind {}: {}", addr, e);
            std::process::exit(1);
        });
    tracing::info!("Serving \"{}\" on http://{}", config.library_name, addr);

    let app = http::build_router(state);
    let server_shutdown = shutdown.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        server_shutdown.cancelled().await;
    });

    tokio::spawn(async move {
        wait_for_shutdown().await;
        tracing::info!("received shutdown signal");
        shutdown.cancel();
    });

    if let Err(e) = server.await {
        tracing::error!("HTTP server error: {}", e);
    }

    tracing::info!("server stopped");
}
