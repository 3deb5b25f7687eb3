//! Tails an Eventline server: connects as a user and prints every event.
//!
//! ```text
//! cargo run -p tail-events -- ws://localhost:8080/connect alice
//! RUST_LOG=eventline=debug cargo run -p tail-events -- ws://localhost:8080/connect alice
//! ```
//!
//! Ctrl-C shuts the stream down cleanly.

use eventline::prelude::*;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: tail-events <ws-url> <user-id> [display-name]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(url), Some(user_id)) = (args.next(), args.next()) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    let mut user = User::new(user_id);
    if let Some(name) = args.next() {
        user = user.with_name(name);
    }

    let stream = EventStream::builder(url, user).build();
    let handle = stream.handle();

    let ctrl_c = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            ctrl_c.shutdown();
        }
    });

    let mut states = handle.subscribe_state();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            eprintln!("-- {state}");
        }
    });

    let err = stream
        .run(|event: Event| {
            let payload = serde_json::to_string(&event.payload).unwrap_or_default();
            println!("{:<28} {payload}", event.kind.as_str());
        })
        .await;

    match err {
        StreamError::Cancelled => Ok(()),
        err => {
            tracing::error!(error = %err, last_connection_id = ?handle.id(), "stream stopped");
            Err(err.into())
        }
    }
}
