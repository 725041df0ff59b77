use anyhow::Result;

use snapsage_config::defaults::{DEFAULT_RELAY_BIND, DEFAULT_RELAY_PORT};
use snapsage_config::SnapSageConfig;
use snapsage_relay::{serve, RelayState};

use crate::terminal_output::note_info;

pub async fn run(config: &SnapSageConfig, port: Option<u16>) -> Result<()> {
    let relay = config.relay.clone().unwrap_or_default();
    let state = RelayState::from_config(&relay)?;

    let bind = relay.bind.as_deref().unwrap_or(DEFAULT_RELAY_BIND);
    let port = port.or(relay.port).unwrap_or(DEFAULT_RELAY_PORT);
    let addr = format!("{bind}:{port}");

    note_info(&format!(
        "Relay on http://{addr}/chat ({} / {})",
        state.provider_name(),
        state.model()
    ));
    serve(state, &addr).await
}
