//! Integration tests for framewire.
//!
//! These tests drive a real connection against an in-process peer and
//! check the bytes that cross the wire.

use std::future::Future;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use framewire::codec::{JsonCodec, MsgPackCodec, RawCodec};
use framewire::compress::{Compressor, Decompressor, GzipCompressor, GzipDecompressor};
use framewire::protocol::{self, Parser, HEADER_SIZE};
use framewire::transport::{dialer_fn, BoxedStream};
use framewire::{dial, ConnectivityState, DialOptions, Received, WireError};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
struct TestPayload {
    id: i32,
    message: String,
}

/// Accept one connection and run `f` on it.
async fn serve_once<F, Fut>(f: F) -> String
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        f(sock).await;
    });
    addr
}

/// Echo every byte back until the client goes away.
async fn echo(mut sock: TcpStream) {
    let (mut r, mut w) = sock.split();
    let _ = tokio::io::copy(&mut r, &mut w).await;
}

fn raw_frame(format: u8, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
    frame.push(format);
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(body);
    frame
}

fn msgpack_frame(msg: &str) -> Vec<u8> {
    protocol::encode(&MsgPackCodec, Some(&msg.to_string()), None, &mut Vec::new()).unwrap()
}

/// Full encode/parse cycle with a struct payload.
#[tokio::test]
async fn test_frame_with_msgpack_payload() {
    let payload = TestPayload {
        id: 42,
        message: "Hello, world!".to_string(),
    };

    let frame = protocol::encode(&MsgPackCodec, Some(&payload), None, &mut Vec::new()).unwrap();
    assert_eq!(frame[0], 0);
    let len = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]) as usize;
    assert_eq!(len, frame.len() - HEADER_SIZE);

    let mut parser = Parser::new(Cursor::new(frame));
    let got: Received<TestPayload> = protocol::recv(&mut parser, &MsgPackCodec, "", None)
        .await
        .unwrap();
    assert_eq!(got.into_message(), Some(payload));
    assert!(protocol::recv::<TestPayload, _, _>(&mut parser, &MsgPackCodec, "", None)
        .await
        .unwrap()
        .is_end());
}

/// Several frames back to back in one buffer.
#[tokio::test]
async fn test_multiple_frames_sequence() {
    let mut all_bytes = Vec::new();
    for i in 1..=5 {
        all_bytes.extend(msgpack_frame(&format!("message_{}", i)));
    }
    all_bytes.extend(raw_frame(0, &[]));

    let mut parser = Parser::new(Cursor::new(all_bytes));
    for i in 1..=5 {
        let got: Received<String> = protocol::recv(&mut parser, &MsgPackCodec, "", None)
            .await
            .unwrap();
        assert_eq!(got.into_message(), Some(format!("message_{}", i)));
    }
    let empty: Received<String> = protocol::recv(&mut parser, &MsgPackCodec, "", None)
        .await
        .unwrap();
    assert!(matches!(empty, Received::Empty));
}

#[tokio::test]
async fn test_round_trip_over_tcp() {
    let addr = serve_once(echo).await;
    let conn = dial(addr, DialOptions::new()).await.unwrap();

    let payload = TestPayload {
        id: 7,
        message: "over tcp".into(),
    };
    conn.send(Some(&payload)).await.unwrap();
    conn.send::<TestPayload>(None).await.unwrap();

    assert_eq!(
        conn.recv::<TestPayload>().await.unwrap().into_message(),
        Some(payload)
    );
    assert!(matches!(
        conn.recv::<TestPayload>().await.unwrap(),
        Received::Empty
    ));
}

/// Outbound frames are tagged compressed and inbound ones are inflated.
#[tokio::test]
async fn test_gzip_round_trip_over_tcp() {
    let addr = serve_once(|mut sock: TcpStream| async move {
        let mut header = [0u8; HEADER_SIZE];
        sock.read_exact(&mut header).await.unwrap();
        if header[0] != 1 {
            return;
        }
        let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
        let mut body = vec![0u8; len];
        sock.read_exact(&mut body).await.unwrap();
        sock.write_all(&header).await.unwrap();
        sock.write_all(&body).await.unwrap();
        let _ = sock.read(&mut [0u8; 1]).await;
    })
    .await;

    let opts = DialOptions::new()
        .compressor(GzipCompressor::new())
        .decompressor(GzipDecompressor::new());
    let conn = dial(addr, opts).await.unwrap();

    let text = "compress me ".repeat(100);
    conn.send(Some(&text)).await.unwrap();
    assert_eq!(conn.recv::<String>().await.unwrap().into_message(), Some(text));
}

/// A plain frame is accepted even when gzip was negotiated.
#[tokio::test]
async fn test_plain_frame_accepted_with_compression_negotiated() {
    let addr = serve_once(|mut sock: TcpStream| async move {
        sock.write_all(&msgpack_frame("plain")).await.unwrap();
        let _ = sock.read(&mut [0u8; 1]).await;
    })
    .await;

    let opts = DialOptions::new().decompressor(GzipDecompressor::new());
    let conn = dial(addr, opts).await.unwrap();
    assert_eq!(
        conn.recv::<String>().await.unwrap().into_message().as_deref(),
        Some("plain")
    );
}

#[tokio::test]
async fn test_compressed_frame_without_decompressor() {
    let addr = serve_once(|mut sock: TcpStream| async move {
        let mut body = Vec::new();
        GzipCompressor::new().compress(b"\xa1x", &mut body).unwrap();
        sock.write_all(&raw_frame(1, &body)).await.unwrap();
        let _ = sock.read(&mut [0u8; 1]).await;
    })
    .await;

    let conn = dial(addr, DialOptions::new()).await.unwrap();
    let err = conn.recv::<String>().await.unwrap_err();
    assert!(matches!(err, WireError::InvalidArgument(_)));
    // The stream is no longer trusted after a protocol error.
    assert_eq!(conn.state(), ConnectivityState::TransientFailure);
    let err = conn.recv::<String>().await.unwrap_err();
    assert!(matches!(
        err,
        WireError::NotReady(ConnectivityState::TransientFailure)
    ));
}

#[tokio::test]
async fn test_mismatched_decompressor_name() {
    let addr = serve_once(|mut sock: TcpStream| async move {
        sock.write_all(&raw_frame(1, b"whatever")).await.unwrap();
        let _ = sock.read(&mut [0u8; 1]).await;
    })
    .await;

    let opts = DialOptions::new()
        .decompressor(GzipDecompressor::new())
        .recv_compress("snappy");
    let conn = dial(addr, opts).await.unwrap();
    let err = conn.recv::<String>().await.unwrap_err();
    assert!(matches!(err, WireError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_unknown_payload_format() {
    let addr = serve_once(|mut sock: TcpStream| async move {
        sock.write_all(&raw_frame(7, &[])).await.unwrap();
        let _ = sock.read(&mut [0u8; 1]).await;
    })
    .await;

    let conn = dial(addr, DialOptions::new()).await.unwrap();
    let err = conn.recv::<String>().await.unwrap_err();
    match err {
        WireError::InvalidArgument(msg) => assert!(msg.contains("7")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_oversized_frame_rejected() {
    let addr = serve_once(|mut sock: TcpStream| async move {
        sock.write_all(&raw_frame(0, &[0u8; 100])).await.unwrap();
        let _ = sock.read(&mut [0u8; 1]).await;
    })
    .await;

    let opts = DialOptions::new().max_recv_message_size(8);
    let conn = dial(addr, opts).await.unwrap();
    let err = conn.recv::<Vec<u8>>().await.unwrap_err();
    assert!(matches!(err, WireError::InvalidArgument(_)));
}

/// The peer hangs up in the middle of a body.
#[tokio::test]
async fn test_truncated_frame() {
    let addr = serve_once(|mut sock: TcpStream| async move {
        let frame = msgpack_frame("this will be cut short");
        sock.write_all(&frame[..HEADER_SIZE + 3]).await.unwrap();
    })
    .await;

    let conn = dial(addr, DialOptions::new()).await.unwrap();
    let err = conn.recv::<String>().await.unwrap_err();
    assert!(matches!(err, WireError::UnexpectedEof));
    assert_eq!(conn.state(), ConnectivityState::TransientFailure);

    let err = conn.recv::<String>().await.unwrap_err();
    assert!(matches!(
        err,
        WireError::NotReady(ConnectivityState::TransientFailure)
    ));
}

/// A frame delivered one byte per write is reassembled.
#[tokio::test]
async fn test_fragmented_frame() {
    let addr = serve_once(|mut sock: TcpStream| async move {
        sock.set_nodelay(true).unwrap();
        for byte in msgpack_frame("fragmented") {
            sock.write_all(&[byte]).await.unwrap();
            sock.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let _ = sock.read(&mut [0u8; 1]).await;
    })
    .await;

    let conn = dial(addr, DialOptions::new().read_buffer_size(4))
        .await
        .unwrap();
    assert_eq!(
        conn.recv::<String>().await.unwrap().into_message().as_deref(),
        Some("fragmented")
    );
}

#[tokio::test]
async fn test_pipelined_messages_keep_order() {
    let addr = serve_once(echo).await;
    let conn = Arc::new(dial(addr, DialOptions::new()).await.unwrap());

    let sender = {
        let conn = conn.clone();
        tokio::spawn(async move {
            for i in 0..500u32 {
                conn.send(Some(&i)).await.unwrap();
            }
        })
    };

    for i in 0..500u32 {
        assert_eq!(conn.recv::<u32>().await.unwrap().into_message(), Some(i));
    }
    sender.await.unwrap();
}

/// JSON codec over an in-memory stream from a custom dialer.
#[tokio::test]
async fn test_json_codec_with_custom_dialer() {
    let (client_side, mut server_side) = tokio::io::duplex(1024);
    let slot = Arc::new(parking_lot::Mutex::new(Some(client_side)));

    let dialer = dialer_fn(move |_, _| {
        let stream = slot.lock().take();
        async move {
            stream
                .map(|s| Box::new(s) as BoxedStream)
                .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::ConnectionRefused))
        }
    });

    let conn = dial("in-memory:0", DialOptions::new().codec(JsonCodec).dialer(dialer))
        .await
        .unwrap();
    conn.send(Some(&TestPayload {
        id: 1,
        message: "json".into(),
    }))
    .await
    .unwrap();

    let mut header = [0u8; HEADER_SIZE];
    server_side.read_exact(&mut header).await.unwrap();
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    let mut body = vec![0u8; len];
    server_side.read_exact(&mut body).await.unwrap();
    assert_eq!(&body[..], br#"{"id":1,"message":"json"}"#);

    server_side.write_all(&header).await.unwrap();
    server_side.write_all(&body).await.unwrap();
    let echoed = conn.recv::<TestPayload>().await.unwrap().into_message().unwrap();
    assert_eq!(echoed.message, "json");
}

#[tokio::test]
async fn test_raw_codec_passes_bytes_through() {
    let addr = serve_once(echo).await;
    let conn = dial(addr, DialOptions::new().codec(RawCodec)).await.unwrap();

    conn.send(Some(&Bytes::from_static(b"\x00\x01binary")))
        .await
        .unwrap();
    let got = conn.recv::<Bytes>().await.unwrap().into_message().unwrap();
    assert_eq!(&got[..], b"\x00\x01binary");
}

#[tokio::test]
async fn test_peer_close_reports_end() {
    let addr = serve_once(|sock: TcpStream| async move {
        drop(sock);
    })
    .await;

    let conn = dial(addr, DialOptions::new()).await.unwrap();
    let mut states = conn.subscribe();

    assert!(conn.recv::<String>().await.unwrap().is_end());
    assert_eq!(conn.state(), ConnectivityState::TransientFailure);
    assert!(states.has_changed().unwrap());
    assert_eq!(
        conn.wait_for_state_change(ConnectivityState::Ready).await,
        ConnectivityState::TransientFailure
    );
}

fn block_on<F: Future>(f: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(f)
}

proptest! {
    #[test]
    fn prop_encode_recv_round_trip(
        body in proptest::collection::vec(any::<u8>(), 0..4096),
        compressed in any::<bool>(),
    ) {
        let gzip = GzipCompressor::new();
        let gunzip = GzipDecompressor::new();
        let msg = serde_bytes::ByteBuf::from(body.clone());

        let compressor = compressed.then_some(&gzip as &dyn Compressor);
        let frame = protocol::encode(&MsgPackCodec, Some(&msg), compressor, &mut Vec::new()).unwrap();
        prop_assert_eq!(frame[0], u8::from(compressed));

        let mut parser = Parser::new(Cursor::new(frame));
        let got: Received<serde_bytes::ByteBuf> = block_on(protocol::recv(
            &mut parser,
            &MsgPackCodec,
            "gzip",
            Some(&gunzip as &dyn Decompressor),
        ))
        .unwrap();
        prop_assert_eq!(got.into_message().map(|b| b.into_vec()), Some(body));
    }
}
