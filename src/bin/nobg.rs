//! nobg command-line tool
//!
//! Removes image backgrounds from files, folders or the clipboard.

#[cfg(feature = "cli")]
use nobg::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
