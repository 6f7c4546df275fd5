use anyhow::Result;
use tracing::info;

fn main() -> Result<()> {
    // Protocol output owns stdout; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    info!("truffle starting");

    truffle_uci::UciEngine::new().run()?;
    Ok(())
}
