use std::time::Duration;

use lagbench::{Executor, Orchestrator, PollPolicy};
use lagbench_client::ClientBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== lagbench Basic Usage Example ===\n");

    let target = "file:example.db";
    let client = ClientBuilder::new(target).build().await?;
    println!("✓ Connected to {} ({:?})", target, client.transport());

    let executor = Executor::from_client(client);
    let mut orchestrator = Orchestrator::new(target, executor)
        .record_count(1000)
        .read_policy(PollPolicy::every(Duration::from_millis(200)).with_timeout(Duration::from_secs(30)));

    let run = orchestrator.run().await?;
    println!("✓ Finished in phase {}", orchestrator.phase());
    println!("{}", serde_json::to_string_pretty(&run.report)?);

    std::fs::remove_file("example.db")?;
    println!("✓ Cleaned up example.db");

    Ok(())
}
