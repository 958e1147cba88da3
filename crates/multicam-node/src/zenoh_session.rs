use crate::error::BridgeError;
use std::sync::Arc;

/// Open a Zenoh session in client mode.
///
/// Resolution order for endpoint:
/// 1. `ZENOH_ENDPOINT` env var
/// 2. Provided `endpoint` argument
/// 3. Default: `tcp/127.0.0.1:7447`
pub async fn open_zenoh_session(
    endpoint: Option<&str>,
) -> Result<Arc<zenoh::Session>, BridgeError> {
    let endpoint = std::env::var("ZENOH_ENDPOINT")
        .ok()
        .or_else(|| endpoint.map(str::to_string))
        .unwrap_or_else(|| "tcp/127.0.0.1:7447".to_string());

    log::info!("Connecting to Zenoh at: {}", endpoint);

    let config = client_config(&endpoint)?;

    let session = zenoh::open(config)
        .await
        .map_err(|e| BridgeError::Zenoh(format!("Failed to open Zenoh session: {}", e)))?;

    log::info!("Connected to Zenoh");
    Ok(Arc::new(session))
}

/// Client-mode config connecting to `endpoint` only.
pub fn client_config(endpoint: &str) -> Result<zenoh::Config, BridgeError> {
    let mut config = zenoh::Config::default();
    config
        .insert_json5("mode", r#""client""#)
        .map_err(|e| BridgeError::Zenoh(format!("Failed to set Zenoh mode: {}", e)))?;
    config
        .insert_json5("connect/endpoints", &format!(r#"["{}"]"#, endpoint))
        .map_err(|e| BridgeError::Zenoh(format!("Failed to set Zenoh endpoint: {}", e)))?;
    // Only talk to the configured router, never to peers found by scouting
    config
        .insert_json5("scouting/multicast/enabled", "false")
        .map_err(|e| BridgeError::Zenoh(format!("Failed to disable multicast: {}", e)))?;
    config
        .insert_json5("scouting/gossip/enabled", "false")
        .map_err(|e| BridgeError::Zenoh(format!("Failed to disable gossip: {}", e)))?;
    Ok(config)
}

/// Machine identifier stamped into every header.
///
/// `MULTICAM_MACHINE_ID` wins, otherwise the hostname. Dashes are replaced so
/// the id stays usable as a key expression chunk.
pub fn resolve_machine_id() -> String {
    std::env::var("MULTICAM_MACHINE_ID")
        .unwrap_or_else(|_| {
            hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string())
        })
        .replace('-', "_")
}
