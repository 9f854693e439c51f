#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use pcvc_core::{FullState, MemoryMixer, ProtocolVersion, StateProvider};
use pcvc_proto::{ProtocolServer, ServerConfig};
use serde_json::json;

/// Seed with three sessions, two of them matching "chrome".
pub fn seed() -> FullState {
    serde_json::from_value(json!({
        "version": 6,
        "deviceIds": { "A": "Speakers", "B": "Headphones" },
        "defaultDevice": {
            "deviceId": "A",
            "name": "Speakers",
            "masterVolume": 80.0,
            "masterMuted": false,
            "sessions": [
                { "name": "Chrome", "id": "s1", "volume": 35.0, "muted": false },
                { "name": "chrome Helper", "id": "s2", "volume": 50.0, "muted": false },
                { "name": "Steam", "id": "s3", "volume": 83.0, "muted": false }
            ]
        }
    }))
    .unwrap()
}

pub fn mixer() -> Arc<MemoryMixer> {
    Arc::new(MemoryMixer::new(seed()))
}

/// Start a server on an ephemeral port and return its address.
pub async fn spawn_server(config: ServerConfig, provider: Arc<dyn StateProvider>) -> SocketAddr {
    let server = ProtocolServer::bind("127.0.0.1:0", config, provider).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move { server.run().await });
    addr
}

pub fn v6() -> ServerConfig {
    ServerConfig { version: ProtocolVersion(6), ..ServerConfig::default() }
}
