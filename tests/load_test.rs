//! Load testing for the API.

use std::time::{Duration, Instant};

mod common;
use common::{start_server, test_config, MemoryDb};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_share_one_pool() {
    let db = MemoryDb::new();
    let server = start_server(test_config(), &db).await;

    let concurrency = 20;
    let requests_per_task = 25;
    let total_requests = concurrency * requests_per_task;

    let start = Instant::now();
    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = server.client.clone();
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                if let Ok(res) = client.list_users().await {
                    if res.status == 200 {
                        latencies.push(req_start.elapsed());
                    }
                }
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }
    let elapsed = start.elapsed();

    all_latencies.sort();
    let p99 = all_latencies[all_latencies.len() * 99 / 100];
    println!(
        "{} requests in {:?} ({:.0} req/s), p99 {:?}",
        total_requests,
        elapsed,
        total_requests as f64 / elapsed.as_secs_f64(),
        p99
    );

    assert_eq!(all_latencies.len(), total_requests, "every request should succeed");
    assert!(p99 < Duration::from_secs(1));
    assert_eq!(db.opened(), 1, "no pool churn under healthy load");

    server.stop().await;
}
