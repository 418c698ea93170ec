//! Griddeck - Entry Point
//!
//! Initializes logging, loads settings, opens the device, and runs the
//! input loop until the frame stack unwinds.

use anyhow::{bail, Result};

use griddeck::app::Deck;
use griddeck::config::Settings;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Griddeck v{}", env!("CARGO_PKG_VERSION"));

    // Fatal startup checks: no API key or no device means there is
    // nothing useful to do
    let settings = Settings::load();
    if let Err(message) = settings.validate() {
        bail!("{}", message);
    }

    let mut deck = Deck::new(&settings)?;

    let result = deck.bootstrap().and_then(|_| deck.run());
    deck.close();

    if let Err(ref e) = result {
        log::error!("Deck exited with error: {:#}", e);
        eprintln!("Error: {:#}", e);
    } else {
        log::info!("Griddeck shut down cleanly");
    }
    result
}
