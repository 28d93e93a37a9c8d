// SPDX-License-Identifier: MPL-2.0

//! Demo program: watch one plug's power draw and report laundry cycles.
//!
//! Subscribes to a status topic on an MQTT broker (for installations that
//! bridge plug status onto a message bus) and feeds the readings through a
//! cycle tracker. Start and finish events are printed as they are
//! confirmed.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example watch_laundry -- <broker-url> <topic> <device-id>
//! ```
//!
//! # Example
//!
//! ```bash
//! cargo run --example watch_laundry -- mqtt://192.168.1.50:1883 tuya/bf012345/status bf012345
//! ```

use std::env;

use tokio::sync::mpsc;
use washr_lib::cycle::Thresholds;
use washr_lib::manager::{LaundryTracker, TrackerConfig, TrackerEvent};
use washr_lib::notify::NullSink;
use washr_lib::status::MqttStatusFeed;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 4 {
        eprintln!("Usage: {} <broker-url> <topic> <device-id>", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!(
            "  cargo run --example watch_laundry -- mqtt://192.168.1.50:1883 tuya/bf012345/status bf012345"
        );
        std::process::exit(1);
    }

    let broker_url = &args[1];
    let topic = &args[2];
    let device_id = &args[3];

    println!("=== Laundry Watcher ===");
    println!("Broker: {broker_url}");
    println!("Topic:  {topic}");
    println!();

    // Typical washer profile: start above 90 W held for 10 s, end below
    // 5 W held for 60 s.
    let thresholds = Thresholds::new(90.0, 10.0, 5.0, 60.0)?;
    let config = TrackerConfig::new(device_id, thresholds)
        .with_name("Washer")
        .with_local_key("unused-over-mqtt")
        .with_ip_address("0.0.0.0");

    let source = MqttStatusFeed::connect(broker_url, topic).await?;
    let (events_tx, mut events_rx) = mpsc::channel(16);

    let handle = LaundryTracker::spawn(config, source, NullSink, events_tx)?;
    println!("Tracking... kill the process to stop.");
    println!();

    while let Some(event) = events_rx.recv().await {
        match event {
            TrackerEvent::CycleStarted { device_id, .. } => {
                println!("[{device_id}] cycle started");
            }
            TrackerEvent::CycleFinished { device_id, summary } => {
                println!("[{device_id}] cycle finished:");
                println!("  duration: {:.0} s", summary.duration_secs);
                println!("  energy:   {:.4} kWh", summary.total_kwh);
                println!(
                    "  power:    min {:.1} W / avg {:.1} W / max {:.1} W",
                    summary.min_watts, summary.avg_watts, summary.max_watts
                );
            }
            TrackerEvent::IndicatorChanged { .. } => {}
        }
    }

    handle.shutdown().await;
    Ok(())
}
