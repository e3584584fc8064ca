//! bgcutout CLI tool
//!
//! Command-line interface for removing image backgrounds with the bgcutout library.

#[cfg(feature = "cli")]
use bgcutout::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
