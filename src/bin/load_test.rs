//! Load Testing Tool
//!
//! Hammers an in-memory engine with concurrent deposits and opposite-direction
//! transfers, then reconciles every account.
//!
//! Run with: cargo run --bin load_test --release -- --tasks 200

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;

use account_ledger::engine::RetryPolicy;
use account_ledger::notify::NoopNotifier;
use account_ledger::store::InMemoryStore;
use account_ledger::{
    jobs, AccountType, CreateAccountCommand, EngineConfig, LedgerEngine, LedgerError,
    MovementCommand, OperationContext, TransferCommand,
};

fn arg<T: std::str::FromStr>(args: &[String], name: &str, default: T) -> T {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let tasks: u32 = arg(&args, "--tasks", 200);
    let retries: u32 = arg(&args, "--retries", 50);

    let config = EngineConfig {
        retry: RetryPolicy {
            max_attempts: retries.max(1),
            ..RetryPolicy::default()
        },
        ..EngineConfig::default()
    };
    let engine = Arc::new(LedgerEngine::new(InMemoryStore::new(), NoopNotifier, config));
    let ctx = OperationContext::new();

    let opening = Decimal::from(1_000);
    let a = engine
        .create_account(
            CreateAccountCommand::new("Load A", AccountType::Checking).with_initial_deposit(opening),
            &ctx,
        )
        .await?;
    let b = engine
        .create_account(
            CreateAccountCommand::new("Load B", AccountType::Checking).with_initial_deposit(opening),
            &ctx,
        )
        .await?;

    println!("Load Test - {} tasks of deposit + transfer pairs", tasks);

    let start = Instant::now();
    let mut handles = Vec::with_capacity(tasks as usize);

    for i in 0..tasks {
        let engine = engine.clone();
        let (a, b) = (a.account_number.clone(), b.account_number.clone());
        handles.push(tokio::spawn(async move {
            let ctx = OperationContext::new();
            let (from, to) = if i % 2 == 0 { (&a, &b) } else { (&b, &a) };

            engine
                .deposit(from, MovementCommand::new(Decimal::ONE), &ctx)
                .await?;
            engine
                .transfer(TransferCommand::new(from, to, Decimal::ONE), &ctx)
                .await?;
            Ok::<_, LedgerError>(())
        }));
    }

    let mut success_count = 0u32;
    let mut failures = Vec::new();
    for handle in handles {
        match handle.await? {
            Ok(()) => success_count += 1,
            Err(e) => failures.push(e.code()),
        }
    }

    let elapsed = start.elapsed();
    let operations = f64::from(success_count * 2);

    let summary = jobs::run_reconciliation(engine.as_ref()).await?;
    let a = engine.get_account(&a.account_number).await?;
    let b = engine.get_account(&b.account_number).await?;

    println!("\n=== Load Test Results ===");
    println!("Tasks: {}", tasks);
    println!("Successful: {}", success_count);
    println!("Failed: {} {:?}", failures.len(), failures);
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Rate: {:.0} operations/sec", operations / elapsed.as_secs_f64());
    println!("Balance {}: {}", a.account_number, a.balance);
    println!("Balance {}: {}", b.account_number, b.balance);
    println!(
        "Total: {} (expected {})",
        a.balance + b.balance,
        opening * Decimal::TWO + Decimal::from(success_count)
    );
    println!(
        "Reconciliation: {} checked, {} inconsistent",
        summary.checked,
        summary.inconsistent.len()
    );

    Ok(())
}
