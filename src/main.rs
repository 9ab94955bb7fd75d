use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use craftfleet::client::SimulatedClient;
use craftfleet::persistence::JsonFileStore;
use craftfleet::{logging, FleetConfig, FleetManager};

fn main() -> anyhow::Result<()> {
    logging::init();

    let config = FleetConfig::from_env().context("loading fleet configuration")?;
    let store = Arc::new(JsonFileStore::new(&config.storage.data_dir));
    let client = Arc::new(SimulatedClient::default());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    let stats = runtime.block_on(async move {
        let manager = FleetManager::new(config, client, store).context("preparing fleet")?;
        let stats = manager
            .run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "cannot listen for ctrl-c, stopping");
                }
            })
            .await;
        anyhow::Ok(stats)
    })?;

    info!(%stats, "done");
    Ok(())
}
