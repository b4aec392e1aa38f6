//! Echo - round trip through a framed connection.
//!
//! This example demonstrates:
//! - Dialing with gzip compression and the default MessagePack codec
//! - Sending typed messages and an empty frame
//! - Watching connectivity state while the peer goes away
//!
//! The peer is a plain TCP echo server running in the same process, so
//! every frame the client sends comes straight back.
//!
//! ```text
//! RUST_LOG=framewire=debug cargo run --example echo
//! ```

use framewire::compress::{GzipCompressor, GzipDecompressor};
use framewire::{dial, DialOptions, Received};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Serialize, Deserialize, Debug)]
struct Greeting {
    from: String,
    text: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Echo the first connection back to itself, then stop.
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    let server = tokio::spawn(async move {
        if let Ok((mut sock, peer)) = listener.accept().await {
            tracing::info!(%peer, "echo server accepted");
            let (mut r, mut w) = sock.split();
            let _ = tokio::io::copy(&mut r, &mut w).await;
        }
    });

    let opts = DialOptions::new()
        .compressor(GzipCompressor::new())
        .decompressor(GzipDecompressor::new());
    let conn = dial(addr.as_str(), opts).await?;
    println!("connected to {} ({})", conn.authority(), conn.state());

    for text in ["hello", "bonjour", "hallo"] {
        let greeting = Greeting {
            from: "echo-demo".into(),
            text: text.into(),
        };
        conn.send(Some(&greeting)).await?;
    }
    conn.send::<Greeting>(None).await?;

    loop {
        match conn.recv::<Greeting>().await? {
            Received::Message(greeting) => println!("echoed: {:?}", greeting),
            Received::Empty => {
                println!("echoed: <empty frame>");
                break;
            }
            Received::End => {
                println!("peer closed early");
                break;
            }
        }
    }

    conn.close();
    server.await?;
    println!("final state: {}", conn.state());
    Ok(())
}
