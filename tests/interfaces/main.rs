//! Interface tests for the relationship engine using Cucumber.
//!
//! Scenarios run against an in-memory SQLite store with a recording
//! notification sender and a static social client.
//!
//! ```bash
//! cargo test --features test-utils --test interfaces
//! ```


use cucumber::World;
use steps::relationships::RelationshipWorld;

#[tokio::main]
async fn main() {
    println!("\n=== Running Relationship Interface Tests ===\n");
    RelationshipWorld::cucumber()
        .fail_on_skipped()
        .run("tests/interfaces/features/relationships.feature")
        .await;
}
