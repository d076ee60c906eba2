use stress_test::{stress_test_scaling, stress_test_sessions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            RECORDING STRESS TESTS                          ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    // Test 1: a few long sessions
    let stats = stress_test_sessions(4, 5_000).await;
    stats.print();

    // Test 2: many short sessions
    let stats = stress_test_sessions(64, 500).await;
    stats.print();

    // Test 3: Scaling analysis
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║          SCALING ANALYSIS (concurrent sessions)            ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    stress_test_scaling(32, 8).await;

    println!("\n✓ All stress tests completed successfully!");
}
