//! Kitty State Machine
//!
//! This demo drives a small machine through its whole life.
//!
//! Key concepts:
//! - Guarded transitions read from a target
//! - State lifecycle hooks and transition callbacks
//! - Asynchronous callbacks that settle later
//! - Automatic `error` handling when a callback rejects
//!
//! Run with: RUST_LOG=statewise=trace cargo run --example kitty

use serde_json::json;
use statewise::builder::MachineBuilder;
use statewise::core::{MapTarget, Settle};
use statewise::definition::Phase;
use statewise::utils::reject;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();

    println!("=== Kitty State Machine ===\n");

    let target = Arc::new(
        MapTarget::new("kitty")
            .with_guard("isHungry", false)
            .with_callback("stretch", |_| json!("streeetch"))
            .with_callback("purr", |ctx| {
                println!("  purring at {:?}", ctx.args);
                Settle::pending(async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(json!("prrrr"))
                })
            })
            .with_callback("scratch", |_| reject("ouch")),
    );

    let machine = MachineBuilder::new(json!({
        "states": {
            "initialState": "sleeping",
            "awake": { "didEnter": "stretch" }
        },
        "events": {
            "wake": { "transition": { "sleeping": "awake" } },
            "cuddle": {
                "transitions": [
                    { "awake": "grumpy", "guard": "isHungry" },
                    { "awake": "happy", "didEnter": "purr" }
                ]
            },
            "poke": { "transition": { "happy": "annoyed", "willEnter": "scratch" } }
        }
    }))
    .target(target.clone())
    .state_hook("happy", Phase::DidEnter, |_| println!("  kitty looks happy"))
    .on_state_change(|change| println!("  {} -> {}", change.from, change.to))
    .build()
    .unwrap();

    println!("Initial state: {}\n", machine.current_state());

    machine.send("wake", vec![]).unwrap().await.unwrap();
    println!("Can enter happy? {}", machine.can_enter_state("happy").unwrap());

    let cuddle = machine.send("cuddle", vec![json!("you")]).unwrap();
    println!("Transitioning? {}", machine.is_transitioning());
    let transition = cuddle.await.unwrap();
    println!("{transition}\n");

    match machine.send("poke", vec![]).unwrap().await {
        Ok(_) => println!("Kitty tolerated the poke"),
        Err(rejection) => println!("Poke rejected: {rejection}"),
    }

    println!("\nFinal state: {}", machine.current_state());
    println!("Path: {}", machine.history().get_path().join(" -> "));
    println!("In failed? {:?}", machine.accessor("isInFailed"));

    println!("\n=== Demo Complete ===");
}
