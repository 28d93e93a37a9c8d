// SPDX-License-Identifier: MPL-2.0

//! Demo program: discover Tuya plugs on the LAN and reconcile them against
//! the cloud registry.
//!
//! This example demonstrates:
//! - How to run a LAN discovery pass with [`DiscoveryOptions`]
//! - How to fetch the account's registered plugs from the cloud
//! - How reconciliation merges the two into addressable devices
//!
//! # Usage
//!
//! ```bash
//! cargo run --example discover_plugs -- <api-base-url> <access-token>
//! ```
//!
//! # Example
//!
//! ```bash
//! cargo run --example discover_plugs -- https://openapi.tuyaeu.com abc123token
//! ```

use std::env;
use std::time::Duration;

use washr_lib::discovery::{DiscoveryOptions, discover};
use washr_lib::registry::{DeviceRegistry, HttpRegistryConfig, reconcile};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <api-base-url> <access-token>", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  cargo run --example discover_plugs -- https://openapi.tuyaeu.com abc123token");
        std::process::exit(1);
    }

    let base_url = &args[1];
    let token = &args[2];

    println!("=== Tuya Plug Discovery ===");
    println!();

    println!("Listening for LAN broadcasts...");
    println!("(5 seconds per port, UDP 6666/6667)");
    println!();

    let options = DiscoveryOptions::new().with_window(Duration::from_secs(5));
    let local = discover(&options).await;

    if local.is_empty() {
        println!("No broadcasts seen.");
        println!();
        println!("Tips:");
        println!("  - Plugs only broadcast when powered and on the same subnet");
        println!("  - Some routers filter UDP broadcast between VLANs");
        std::process::exit(1);
    }

    println!("Seen on the LAN:");
    for device in &local {
        println!("  - {} at {} (protocol {})", device.id, device.ip, device.version);
    }
    println!();

    println!("Fetching registered plugs from {base_url}...");
    let registry = HttpRegistryConfig::new(base_url)
        .with_access_token(token)
        .into_client()?;
    let cloud = registry.list_devices().await?;
    println!("Cloud registry knows {} plug(s).", cloud.len());
    println!();

    let merged = reconcile(&local, &cloud);

    if merged.is_empty() {
        println!("No LAN device matched a registry entry.");
        println!("Check that the access token belongs to the account the plugs are paired with.");
    } else {
        println!("Addressable devices:");
        for plug in &merged {
            println!(
                "  - {} ({}) at {} with key {}...",
                plug.name,
                plug.id,
                plug.ip,
                &plug.local_key[..plug.local_key.len().min(4)]
            );
        }
    }

    Ok(())
}
