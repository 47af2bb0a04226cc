//! Basic usage example: consume checkout events from an emitter
//!
//! A producer task fires a handful of `checkout` events and then goes quiet.
//! The consumer pulls them one at a time until the between-items deadline
//! expires, then prints the stream statistics.
//!
//! Run with `RUST_LOG=event_stream=debug` to see the bridge lifecycle.

use event_stream::prelude::*;
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("Event Stream - Basic Usage Example");
    println!("==================================");

    let emitter = EventEmitter::<Value>::new();

    let config = StreamConfig::new()
        .with_item_event("checkout")
        .with_first_item_timeout(Duration::from_secs(2))
        .with_between_items_timeout(Duration::from_millis(500));

    let mut stream = EventStreamBuilder::new(emitter.clone())
        .config(config)
        .transform(|order: Value| {
            let id = order["id"].as_u64().unwrap_or_default();
            let total = order["total"].as_f64().unwrap_or_default();
            format!("order #{id}: {total:.2}")
        })
        .build()?;

    let producer = emitter.clone();
    tokio::spawn(async move {
        for (id, total) in [(1, 19.99), (2, 5.0), (3, 42.5)] {
            tokio::time::sleep(Duration::from_millis(150)).await;
            producer.emit("checkout", json!({ "id": id, "total": total }));
        }
    });

    while let Some(item) = stream.next_async().await {
        match item {
            Ok(summary) => println!("  {summary}"),
            Err(e) if e.is_timeout() => {
                println!("Stream went quiet: {e}");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!();
    print!("{}", stream.stats());

    Ok(())
}
