//! End-to-end tests over real TCP sockets.

mod common;

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{mixer, seed, spawn_server, v6};
use pcvc_core::{DeviceId, FullState, ProtocolVersion, StateProvider};
use pcvc_proto::{ClientConfig, MixerClient, ProtocolError, ServerConfig};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

fn client_config() -> ClientConfig {
    ClientConfig { version: ProtocolVersion(6), ..ClientConfig::default() }
}

/// Read the handshake line off a raw socket.
async fn raw_handshake(stream: TcpStream) -> BufReader<TcpStream> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    let state: FullState = serde_json::from_str(&line).unwrap();
    assert_eq!(state, seed());
    reader
}

/// The server must close the socket: EOF, or a reset if it left bytes unread.
async fn assert_closed(mut reader: BufReader<TcpStream>) {
    let mut rest = Vec::new();
    let result = timeout(Duration::from_secs(5), reader.read_to_end(&mut rest))
        .await
        .expect("server did not close the connection");

    match result {
        Ok(_) => assert!(rest.is_empty(), "unexpected bytes after violation: {rest:?}"),
        Err(e) => assert_eq!(e.kind(), ErrorKind::ConnectionReset),
    }
}

#[tokio::test]
async fn handshake_delivers_full_state() {
    let addr = spawn_server(v6(), mixer()).await;

    let client = MixerClient::connect(addr, client_config()).await.unwrap();

    assert_eq!(client.state(), &seed());
}

#[tokio::test]
async fn master_mute_leaves_volume() {
    let addr = spawn_server(v6(), mixer()).await;
    let mut client = MixerClient::connect(addr, client_config()).await.unwrap();

    client.toggle_master_mute().await.unwrap();

    assert!(client.state().default_device.master_muted);
    assert_eq!(client.state().default_device.master_volume, 80.0);
}

#[tokio::test]
async fn master_volume_reply_is_authoritative() {
    let addr = spawn_server(v6(), mixer()).await;
    let mut client = MixerClient::connect(addr, client_config()).await.unwrap();

    client.set_master_volume(250.0).await.unwrap();

    // clamped on both sides
    assert_eq!(client.state().default_device.master_volume, 100.0);
    assert_eq!(client.state().default_device.sessions, seed().default_device.sessions);
}

#[tokio::test]
async fn session_toggle_targets_every_substring_match() {
    let addr = spawn_server(v6(), mixer()).await;
    let mut client = MixerClient::connect(addr, client_config()).await.unwrap();

    let changed = client.toggle_session_mute("chrome").await.unwrap();

    assert_eq!(changed, vec!["s1".to_string(), "s2".to_string()]);
    let muted: Vec<_> =
        client.state().default_device.sessions.iter().map(|s| (s.name.as_str(), s.muted)).collect();
    assert_eq!(muted, vec![("Chrome", true), ("chrome Helper", true), ("Steam", false)]);
}

#[tokio::test]
async fn session_volume_with_no_match_changes_nothing() {
    let addr = spawn_server(v6(), mixer()).await;
    let mut client = MixerClient::connect(addr, client_config()).await.unwrap();

    let changed = client.change_session_volume("firefox", 10.0).await.unwrap();

    assert!(changed.is_empty());
    assert_eq!(client.state(), &seed());
}

#[tokio::test]
async fn device_switch_keeps_sessions() {
    let addr = spawn_server(v6(), mixer()).await;
    let mut client = MixerClient::connect(addr, client_config()).await.unwrap();

    client.switch_default_device(DeviceId::from("B")).await.unwrap();

    assert_eq!(client.state().default_device.device_id.as_str(), "B");
    assert_eq!(client.state().default_device.name, "Headphones");
    assert_eq!(client.state().default_device.sessions, seed().default_device.sessions);
}

#[tokio::test]
async fn connections_do_not_share_live_state() {
    let provider = mixer();
    let addr = spawn_server(v6(), Arc::clone(&provider) as Arc<dyn StateProvider>).await;
    let mut first = MixerClient::connect(addr, client_config()).await.unwrap();
    let mut second = MixerClient::connect(addr, client_config()).await.unwrap();

    first.set_master_muted(true).await.unwrap();
    second.set_master_volume(10.0).await.unwrap();

    assert!(!second.state().default_device.master_muted);

    // A new connection is seeded from the committed host state
    let third = MixerClient::connect(addr, client_config()).await.unwrap();
    assert!(third.state().default_device.master_muted);
    assert_eq!(third.state().default_device.master_volume, 10.0);
    assert_eq!(provider.full_state(), *third.state());
}

#[tokio::test]
async fn device_switch_elsewhere_does_not_break_other_connections() {
    let provider = mixer();
    let addr = spawn_server(v6(), Arc::clone(&provider) as Arc<dyn StateProvider>).await;
    let mut first = MixerClient::connect(addr, client_config()).await.unwrap();
    let mut second = MixerClient::connect(addr, client_config()).await.unwrap();

    first.switch_default_device(DeviceId::from("B")).await.unwrap();
    second.set_master_muted(true).await.unwrap();
    let changed = second.toggle_session_mute("steam").await.unwrap();

    assert_eq!(changed, vec!["s3".to_string()]);
    assert_eq!(second.state().default_device.device_id.as_str(), "A");
    assert!(second.state().default_device.master_muted);

    // The host kept the switch and left out the change for the old device
    assert_eq!(provider.full_state().default_device.device_id.as_str(), "B");
    assert!(!provider.full_state().default_device.master_muted);
}

#[tokio::test]
async fn invalid_json_closes_connection() {
    let addr = spawn_server(v6(), mixer()).await;
    let mut reader = raw_handshake(TcpStream::connect(addr).await.unwrap()).await;

    reader.get_mut().write_all(b"{\"version\": 6, \"defaultDevice\": \n").await.unwrap();

    assert_closed(reader).await;
}

#[tokio::test]
async fn unterminated_frame_past_bound_closes_connection() {
    let config = ServerConfig { max_frame_bytes: 128, ..v6() };
    let addr = spawn_server(config, mixer()).await;
    let mut reader = raw_handshake(TcpStream::connect(addr).await.unwrap()).await;

    let payload = format!("{{\"version\": 6, \"pad\": \"{}\"}}", "x".repeat(512));
    reader.get_mut().write_all(payload.as_bytes()).await.unwrap();

    assert_closed(reader).await;
}

#[tokio::test]
async fn version_mismatch_update_closes_connection() {
    let addr = spawn_server(v6(), mixer()).await;
    let mut reader = raw_handshake(TcpStream::connect(addr).await.unwrap()).await;

    reader
        .get_mut()
        .write_all(b"{\"version\": 5, \"defaultDevice\": {\"deviceId\": \"A\"}}\n")
        .await
        .unwrap();

    assert_closed(reader).await;
}

#[tokio::test]
async fn missing_default_device_closes_connection() {
    let addr = spawn_server(v6(), mixer()).await;
    let mut reader = raw_handshake(TcpStream::connect(addr).await.unwrap()).await;

    reader.get_mut().write_all(b"{\"version\": 6}\n").await.unwrap();

    assert_closed(reader).await;
}

#[tokio::test]
async fn unrecognized_shape_closes_connection() {
    let addr = spawn_server(v6(), mixer()).await;
    let mut reader = raw_handshake(TcpStream::connect(addr).await.unwrap()).await;

    reader
        .get_mut()
        .write_all(b"{\"version\": 6, \"defaultDevice\": {\"deviceId\": \"A\", \"eq\": 1}}\n")
        .await
        .unwrap();

    assert_closed(reader).await;
}

#[tokio::test]
async fn idle_client_is_disconnected() {
    let config = ServerConfig { idle_timeout: Some(Duration::from_millis(50)), ..v6() };
    let addr = spawn_server(config, mixer()).await;
    let reader = raw_handshake(TcpStream::connect(addr).await.unwrap()).await;

    assert_closed(reader).await;
}

#[tokio::test]
async fn pipelined_updates_are_answered_in_order() {
    let addr = spawn_server(v6(), mixer()).await;
    let mut reader = raw_handshake(TcpStream::connect(addr).await.unwrap()).await;

    reader
        .get_mut()
        .write_all(
            b"{\"version\":6,\"defaultDevice\":{\"deviceId\":\"A\",\"masterVolume\":20}}\n\
              {\"version\":6,\"defaultDevice\":{\"deviceId\":\"A\",\"masterVolume\":30}}\n",
        )
        .await
        .unwrap();

    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    let first: FullState = serde_json::from_str(&line).unwrap();
    line.clear();
    reader.read_line(&mut line).await.unwrap();
    let second: FullState = serde_json::from_str(&line).unwrap();

    assert_eq!(first.default_device.master_volume, 20.0);
    assert_eq!(second.default_device.master_volume, 30.0);
}

#[tokio::test]
async fn client_rejects_server_with_other_version() {
    let addr = spawn_server(ServerConfig { version: ProtocolVersion(2), ..v6() }, mixer()).await;

    let err = MixerClient::connect(addr, client_config()).await.err().unwrap();

    assert!(err.is_version_mismatch());
}

#[tokio::test]
async fn client_times_out_waiting_for_reply() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut handshake = serde_json::to_vec(&seed()).unwrap();
        handshake.push(b'\n');
        stream.write_all(&handshake).await.unwrap();
        // Swallow the update without answering
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
    });

    let config = ClientConfig { reply_timeout: Some(Duration::from_millis(50)), ..client_config() };
    let mut client = MixerClient::connect(addr, config).await.unwrap();

    assert_matches!(client.set_master_muted(true).await, Err(ProtocolError::Timeout));
    server.abort();
}

#[tokio::test]
async fn client_handshake_without_terminator_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let handshake = serde_json::to_vec(&seed()).unwrap();
        stream.write_all(&handshake).await.unwrap();
        stream.shutdown().await.unwrap();
    });

    let err = MixerClient::connect(addr, client_config()).await.err().unwrap();

    assert_matches!(err, ProtocolError::Framing(_));
}
