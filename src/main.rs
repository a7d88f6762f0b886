//! remote-mount daemon entry point

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use remote_mount::config::Config;
use remote_mount::helper::RcloneHelper;
use remote_mount::manager::{MountManager, MountRequest};
use remote_mount::profile::ProfileStore;

/// Print usage information
fn print_usage() {
    eprintln!("Usage: remote-mount <config.yaml>");
    eprintln!();
    eprintln!("remote-mount - remote filesystem mount lifecycle manager");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  config.yaml    Path to configuration file");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  remote-mount /etc/remote-mount/config.yaml");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        print_usage();
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);

    // Load configuration
    let config = match Config::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("remote-mount starting");
    info!("Loaded configuration from {:?}", config_path);

    // Create the mount manager
    let helper = Arc::new(RcloneHelper::new(&config.helper.binary));
    let profile_path = match &config.helper.profile_path {
        Some(path) => path.clone(),
        None => ProfileStore::default_path()?,
    };
    let manager = Arc::new(MountManager::new(helper, ProfileStore::new(profile_path)));

    // Set up signal handling for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    // Mount all configured remotes
    for declaration in &config.mounts {
        info!("Setting up mount at {:?}", declaration.path);

        let request = MountRequest {
            target: declaration.path.clone(),
            credentials: declaration.credentials(),
            options: declaration.options.clone(),
        };
        if let Err(e) = manager.mount(request).await {
            error!("Failed to mount {:?}: {}", declaration.path, e);
            continue;
        }
    }

    if manager.count().await == 0 {
        error!("No remotes were mounted successfully");
        std::process::exit(1);
    }

    info!("{} remote(s) mounted successfully", manager.count().await);
    info!("Press Ctrl+C to unmount and exit");

    // Keep the registry honest while we run
    manager.start_sweeper();

    // Wait for shutdown signal
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
    }

    info!("Shutting down");
    manager.stop_sweeper();
    manager.unmount_all().await;
    info!("All remotes unmounted, exiting");

    Ok(())
}
