//! bg-reveal CLI tool
//!
//! Command-line front end for the remote background removal pipeline.

#[cfg(feature = "cli")]
use bg_reveal::cli;

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
