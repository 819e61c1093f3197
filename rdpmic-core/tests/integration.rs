//! Integration tests: connection lifecycle, exact send/receive, and the
//! request/reply exchange against in-memory and real UNIX socket peers.

mod common;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::net::UnixListener;
use tokio_test::{assert_err, assert_ok};

use rdpmic_core::codec;
use rdpmic_core::{
    ConnectionManager, DataReply, PeerSession, ProtocolMessage, RdpMicError, SocketAddress,
    UnixConnector,
};

use common::{QueueConnector, ScriptedStream, test_address};

// ── Helpers ──────────────────────────────────────────────────────

/// A socket path unique to this process and call.
fn temp_socket_path() -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!("rdpmic-test-{}-{n}.sock", std::process::id()))
}

// ── send_exact / recv_exact ──────────────────────────────────────

#[tokio::test]
async fn test_send_exact_completes_after_partial_write() {
    let (stream, script) = ScriptedStream::new();
    script.limit_first_write(5);

    let mut conn = ConnectionManager::new(QueueConnector::new([stream]), test_address());
    assert_ok!(conn.ensure_connected().await);

    let frame = codec::encode(ProtocolMessage::Start);
    assert_ok!(conn.send_exact(&frame).await);

    assert_eq!(script.written(), frame.to_vec());
    assert!(script.write_calls() >= 2, "write was not split");
    assert!(conn.state().is_connected());
}

#[tokio::test]
async fn test_recv_exact_eof_breaks_connection() {
    let (stream, script) = ScriptedStream::new();
    script.push_read(&[1]);

    let mut conn = ConnectionManager::new(QueueConnector::new([stream]), test_address());
    conn.ensure_connected().await.unwrap();

    let err = conn.recv_exact(2).await.unwrap_err();
    assert!(matches!(err, RdpMicError::Broken(_)));
    assert!(err.is_transport());
    assert!(conn.state().is_disconnected());

    // No stream is live any more.
    assert!(matches!(
        conn.send_exact(&[0]).await,
        Err(RdpMicError::NotConnected)
    ));
}

#[tokio::test]
async fn test_connect_failure_leaves_disconnected() {
    let mut conn =
        ConnectionManager::new(QueueConnector::<ScriptedStream>::new([]), test_address());
    let err = assert_err!(conn.ensure_connected().await);
    assert!(matches!(err, RdpMicError::Connect { .. }));
    assert!(conn.state().is_disconnected());
    assert_eq!(conn.connect_count(), 0);
}

#[tokio::test]
async fn test_reconnect_after_broken_write() {
    let (first, first_script) = ScriptedStream::new();
    let (second, second_script) = ScriptedStream::new();
    first_script.fail_writes();

    let mut conn = ConnectionManager::new(QueueConnector::new([first, second]), test_address());
    conn.ensure_connected().await.unwrap();
    assert_err!(conn.start().await);
    assert!(conn.state().is_disconnected());

    conn.ensure_connected().await.unwrap();
    assert_ok!(conn.start().await);
    assert!(conn.state().is_streaming());
    assert_eq!(conn.connect_count(), 2);
    assert_eq!(second_script.frames(), vec![ProtocolMessage::Start]);
}

// ── Protocol operations ──────────────────────────────────────────

#[tokio::test]
async fn test_request_requires_start() {
    let (stream, script) = ScriptedStream::new();
    let mut conn = ConnectionManager::new(QueueConnector::new([stream]), test_address());

    // Disconnected: nothing is written.
    assert!(matches!(
        conn.request(64).await,
        Err(RdpMicError::NotConnected)
    ));

    conn.ensure_connected().await.unwrap();
    assert!(matches!(
        conn.request(64).await,
        Err(RdpMicError::ProtocolViolation(_))
    ));
    assert!(script.written().is_empty());
}

#[tokio::test]
async fn test_request_reads_payload() {
    let (stream, script) = ScriptedStream::new();
    script.push_reply(1024, 0xAB);

    let mut conn = ConnectionManager::new(QueueConnector::new([stream]), test_address());
    conn.ensure_connected().await.unwrap();
    conn.start().await.unwrap();

    let reply = conn.request(4096).await.unwrap();
    assert_eq!(reply.available_bytes(), 1024);
    assert!(reply.payload().iter().all(|b| *b == 0xAB));
    assert_eq!(
        script.frames(),
        vec![
            ProtocolMessage::Start,
            ProtocolMessage::Request { max_bytes: 4096 }
        ]
    );
}

#[tokio::test]
async fn test_empty_reply_has_no_payload() {
    let (stream, script) = ScriptedStream::new();
    script.push_read(&[0, 0]);

    let mut conn = ConnectionManager::new(QueueConnector::new([stream]), test_address());
    conn.ensure_connected().await.unwrap();
    conn.start().await.unwrap();

    let reply = conn.request(128).await.unwrap();
    assert!(reply.is_empty());
    assert!(conn.state().is_streaming());
}

#[tokio::test]
async fn test_oversized_reply_breaks_connection() {
    let (stream, script) = ScriptedStream::new();
    script.push_reply(200, 0);

    let mut conn = ConnectionManager::new(QueueConnector::new([stream]), test_address());
    conn.ensure_connected().await.unwrap();
    conn.start().await.unwrap();

    let err = conn.request(100).await.unwrap_err();
    assert!(matches!(
        err,
        RdpMicError::ReplyTooLarge {
            requested: 100,
            available: 200
        }
    ));
    assert!(conn.state().is_disconnected());
}

#[tokio::test]
async fn test_short_payload_breaks_connection() {
    let (stream, script) = ScriptedStream::new();
    script.push_read(&16u16.to_le_bytes());
    script.push_read(&[0u8; 10]);

    let mut conn = ConnectionManager::new(QueueConnector::new([stream]), test_address());
    conn.ensure_connected().await.unwrap();
    conn.start().await.unwrap();

    assert!(matches!(
        conn.request(64).await,
        Err(RdpMicError::Broken(_))
    ));
    assert!(!conn.state().is_streaming());
}

#[tokio::test]
async fn test_stop_returns_to_connected() {
    let (stream, script) = ScriptedStream::new();
    let mut conn = ConnectionManager::new(QueueConnector::new([stream]), test_address());
    conn.ensure_connected().await.unwrap();

    assert_err!(conn.stop().await);
    conn.start().await.unwrap();
    assert_ok!(conn.stop().await);
    assert!(conn.state().is_connected());
    assert!(!conn.state().is_streaming());
    assert_eq!(
        script.frames(),
        vec![ProtocolMessage::Start, ProtocolMessage::Stop]
    );
}

#[tokio::test]
async fn test_io_timeout_breaks_connection() {
    // The peer end stays open but never answers.
    let (client, _peer) = tokio::io::duplex(1024);
    let mut conn = ConnectionManager::new(QueueConnector::new([client]), test_address())
        .with_io_timeout(Some(Duration::from_millis(20)));
    conn.ensure_connected().await.unwrap();
    conn.start().await.unwrap();

    let err = conn.request(64).await.unwrap_err();
    assert!(matches!(err, RdpMicError::Timeout(_)));
    assert!(conn.state().is_disconnected());
}

// ── Peer over a real UNIX socket ─────────────────────────────────

#[tokio::test]
async fn test_unix_socket_round_trip() {
    let path = temp_socket_path();
    let listener = UnixListener::bind(&path).unwrap();

    let peer = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        PeerSession::new(stream)
            .serve(|max| DataReply::new(vec![0x11u8; (max / 2) as usize]).unwrap())
            .await
    });

    let address = SocketAddress::from(path.clone());
    let mut conn = ConnectionManager::new(UnixConnector, address);
    conn.ensure_connected().await.unwrap();
    conn.start().await.unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(5), conn.request(512))
        .await
        .expect("timeout")
        .unwrap();
    assert_eq!(reply.available_bytes(), 256);

    conn.stop().await.unwrap();
    conn.close();

    let served = tokio::time::timeout(Duration::from_secs(5), peer)
        .await
        .expect("timeout")
        .unwrap();
    assert_ok!(served);
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_unix_socket_missing_path() {
    let address = SocketAddress::from(temp_socket_path());
    let mut conn = ConnectionManager::new(UnixConnector, address);
    let err = conn.ensure_connected().await.unwrap_err();
    assert!(matches!(err, RdpMicError::Connect { .. }));
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_peer_session_sees_frames_in_order() {
    let (client, server) = tokio::io::duplex(4096);
    let mut peer = PeerSession::new(server);

    let mut conn = ConnectionManager::new(QueueConnector::new([client]), test_address());
    conn.ensure_connected().await.unwrap();
    conn.start().await.unwrap();

    assert_eq!(
        peer.next_message().await.unwrap().unwrap(),
        ProtocolMessage::Start
    );
    assert!(peer.is_capturing());

    let request = tokio::spawn(async move {
        let reply = conn.request(110).await;
        (conn, reply)
    });
    assert_eq!(
        peer.next_message().await.unwrap().unwrap(),
        ProtocolMessage::Request { max_bytes: 110 }
    );
    peer.reply(DataReply::new(vec![1u8; 100]).unwrap())
        .await
        .unwrap();

    let (_conn, reply) = request.await.unwrap();
    assert_eq!(reply.unwrap().available_bytes(), 100);
}

#[tokio::test]
async fn test_peer_session_surfaces_socket_errors() {
    let stream = tokio_test::io::Builder::new()
        .read_error(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by bridge",
        ))
        .build();
    let mut peer = PeerSession::new(stream);

    let err = peer.next_message().await.unwrap().unwrap_err();
    assert!(matches!(err, RdpMicError::Io(_)));
    assert!(!peer.is_capturing());
}
