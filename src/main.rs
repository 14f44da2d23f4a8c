use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;
use std::io::stderr;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

use isopod_image::{FileTree, IsoImage};
use isopod_ipxe::{BootConfig, InitrdSpec, IpxeError};
use isopod_server::local_ipv4_addresses;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Serve an ISO image over HTTP for iPXE network boot", long_about = None)]
struct Cli {
    /// Path to the ISO file
    #[arg(long)]
    iso: PathBuf,

    /// Path to the kernel file relative to the ISO root
    #[arg(long, default_value = "")]
    kernel: String,

    /// Initrd file and its name in the iPXE script; repeat for more than one
    #[arg(long, value_name = "PATH[,LABEL]", value_parser = parse_initrd_spec)]
    initrd: Vec<InitrdSpec>,

    /// Parameters to pass to the kernel at boot
    #[arg(long, default_value = "")]
    params: String,

    /// Port number to listen on
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn parse_initrd_spec(s: &str) -> std::result::Result<InitrdSpec, IpxeError> {
    s.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // Respect RUST_LOG, fall back to verbose/info for our own crates.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let default_directives = format!(
        "isopod={level},isopod_server={level},isopod_image={level},isopod_ipxe={level},tower_http=warn,hyper=warn",
        level = default_level
    );
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));
    registry()
        .with(filter)
        .with(fmt::layer().with_writer(stderr))
        .init();

    let image = match IsoImage::open(&cli.iso) {
        Ok(image) => image,
        Err(e) => {
            error!("Failed to open ISO image: {}", e);
            eprintln!("Error opening ISO image: {}", e);
            std::process::exit(1);
        }
    };
    info!("Opened ISO image {}", cli.iso.display());

    let boot = BootConfig {
        kernel_path: cli.kernel,
        kernel_params: cli.params,
        initrds: cli.initrd,
    };

    let ips = match local_ipv4_addresses() {
        Ok(ips) => ips,
        Err(e) => {
            error!("Failed to enumerate local addresses: {:#}", e);
            eprintln!("Error enumerating local addresses: {}", e);
            std::process::exit(1);
        }
    };

    for ip in &ips {
        println!("Serving on http://{}:{}", ip, cli.port);
        println!(
            "To boot from iPXE: chain --autofree http://{}:{}/boot.ipxe",
            ip, cli.port
        );
    }

    let image: Arc<dyn FileTree> = Arc::new(image);
    if let Err(e) = isopod_server::run(image, Arc::new(boot), cli.port).await {
        error!("Server failed to run: {:#}", e);
        eprintln!("Error running server: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
