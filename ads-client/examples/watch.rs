//! Connects to an ADS management server and prints the cluster view as it changes.
//!
//! # Configuration (environment variables)
//!
//! - `ADS_SERVER`: URI of the management server (default: `http://localhost:18000`)
//! - `ADS_NODE_ID`: node identifier sent with every request (default: `ads-client-demo`)
//! - `ADS_NACK_INVALID`: set to `1` to reject responses carrying malformed resources
//! - `RUST_LOG`: log filter (default: `info,ads_client=debug`)
//!
//! # Usage
//!
//! ```sh
//! ADS_SERVER=http://127.0.0.1:18000 cargo run -p ads-client --example watch
//! ```

use std::sync::Arc;
use std::time::Duration;

use ads_client::{AdsClient, ClientConfig, Node, TokioRuntime};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ads_client=debug")),
        )
        .init();

    let server =
        std::env::var("ADS_SERVER").unwrap_or_else(|_| "http://localhost:18000".to_string());
    let node_id = std::env::var("ADS_NODE_ID").unwrap_or_else(|_| "ads-client-demo".to_string());
    let nack_invalid = std::env::var("ADS_NACK_INVALID").is_ok_and(|v| v == "1");

    let node = Node::new("ads-client-demo", env!("CARGO_PKG_VERSION")).with_id(node_id);
    let config = ClientConfig::new(node, server).with_nack_on_invalid(nack_invalid);

    let client = Arc::new(AdsClient::connect(config).await?);
    client.spawn(TokioRuntime);

    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                for cluster in client.clusters() {
                    match client.assignment(&cluster) {
                        Some(assignment) => {
                            let addresses: Vec<String> =
                                assignment.addresses().map(ToString::to_string).collect();
                            println!("{cluster}: {}", addresses.join(", "));
                        }
                        None => println!("{cluster}: <unresolved>"),
                    }
                }
            }
        }
    }

    client.close();
    Ok(())
}
