#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use skimrun::runner::{
    BatchState, BoundedRunner, Budget, CommandTemplate, Gauge, ItemStatus, WorkItem,
};

fn sh(script: impl Into<String>) -> WorkItem {
    WorkItem::new("sh").arg("-c").arg(script)
}

type Sampler = (Arc<AtomicBool>, Arc<AtomicUsize>, tokio::task::JoinHandle<()>);

/// Sample `gauge` every couple of milliseconds until stopped.
fn spawn_sampler(gauge: Arc<Gauge>) -> Sampler {
    let stop = Arc::new(AtomicBool::new(false));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let handle = {
        let stop = Arc::clone(&stop);
        let max_seen = Arc::clone(&max_seen);
        tokio::spawn(async move {
            while !stop.load(Ordering::SeqCst) {
                max_seen.fetch_max(gauge.running(), Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
    };
    (stop, max_seen, handle)
}

fn read_slot(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name)).unwrap().trim().to_string()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn five_items_budget_two_fill_every_slot() {
    let out = tempfile::tempdir().unwrap();
    let mut runner = BoundedRunner::new(Budget::new(2).unwrap());
    let (stop, max_seen, sampler) = spawn_sampler(runner.gauge());

    let delays = ["0.30", "0.10", "0.25", "0.05", "0.15"];
    for (i, delay) in delays.iter().enumerate() {
        let id = format!("item-{i}");
        runner
            .submit(
                sh(format!("sleep {delay}; echo {id}"))
                    .with_label(id.clone())
                    .stdout_to(out.path().join(&id)),
            )
            .await
            .unwrap();
        assert!(runner.gauge().running() <= 3);
    }

    let gauge = runner.gauge();
    let report = runner.drain().await.unwrap();
    stop.store(true, Ordering::SeqCst);
    sampler.await.unwrap();

    assert_eq!(gauge.running(), 0);
    assert_eq!(report.state, BatchState::Done);
    assert_eq!(report.submitted, 5);
    assert_eq!(report.succeeded, 5);
    for i in 0..5 {
        assert_eq!(read_slot(out.path(), &format!("item-{i}")), format!("item-{i}"));
    }
    assert!(max_seen.load(Ordering::SeqCst) <= 3);
    assert!(report.peak_running <= 3);
    assert!(report.throttled > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_item_does_not_stop_the_batch() {
    let out = tempfile::tempdir().unwrap();
    let mut runner = BoundedRunner::new(Budget::new(2).unwrap());

    for i in 0..5 {
        let id = format!("item-{i}");
        let script = if i == 2 {
            "sleep 0.05; exit 3".to_string()
        } else {
            format!("sleep 0.1; echo {id}")
        };
        runner
            .submit(
                sh(script)
                    .with_label(id.clone())
                    .stdout_to(out.path().join(&id)),
            )
            .await
            .unwrap();
    }

    let report = runner.drain().await.unwrap();
    assert_eq!(report.submitted, 5);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 1);
    assert_eq!(report.items[2].status, ItemStatus::Exited { code: 3 });

    for i in [0, 1, 3, 4] {
        assert_eq!(read_slot(out.path(), &format!("item-{i}")), format!("item-{i}"));
    }
    let failed: Vec<_> = report.failures().map(|o| o.label.as_str()).collect();
    assert_eq!(failed, vec!["item-2"]);
}

#[tokio::test]
async fn within_budget_no_submission_blocks() {
    let mut runner = BoundedRunner::new(Budget::new(4).unwrap());
    let started = Instant::now();
    for _ in 0..4 {
        runner.submit(sh("sleep 1")).await.unwrap();
    }
    assert!(started.elapsed() < Duration::from_millis(800));

    let report = runner.drain().await.unwrap();
    assert_eq!(report.throttled, 0);
    assert_eq!(report.succeeded, 4);
}

#[tokio::test]
async fn saturated_submission_waits_for_a_completion() {
    let mut runner = BoundedRunner::new(Budget::new(1).unwrap());
    runner.submit(sh("sleep 0.3")).await.unwrap();

    let started = Instant::now();
    runner.submit(sh("true")).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(150));

    let report = runner.drain().await.unwrap();
    assert_eq!(report.throttled, 1);
    assert!(report.peak_running <= 2);
}

#[tokio::test]
async fn drain_leaves_nothing_running() {
    let mut runner = BoundedRunner::new(Budget::new(3).unwrap());
    for i in 0..7 {
        let script = if i % 3 == 0 { "exit 1" } else { "sleep 0.05" };
        runner.submit(sh(script)).await.unwrap();
    }
    let gauge = runner.gauge();
    let report = runner.drain().await.unwrap();

    assert_eq!(gauge.running(), 0);
    assert_eq!(report.items.len(), 7);
    assert_eq!(report.failed, 3);
    assert!(report.peak_running <= 4);
}

#[tokio::test]
async fn timed_out_item_is_killed() {
    let mut runner = BoundedRunner::new(Budget::new(2).unwrap());
    runner
        .submit(sh("sleep 5").with_timeout(Duration::from_millis(100)))
        .await
        .unwrap();
    runner.submit(sh("true")).await.unwrap();

    let started = Instant::now();
    let report = runner.drain().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(report.items[0].status, ItemStatus::TimedOut);
    assert!(report.items[1].status.is_success());
}

#[tokio::test]
async fn template_items_write_to_their_own_slots() {
    let out = tempfile::tempdir().unwrap();
    let template =
        CommandTemplate::new("sh", ["-c", "echo stack={}"]).with_output_dir(out.path());

    let listing = "# STACK_NAME  STATUS\napi  CREATE_COMPLETE\nweb UPDATE_COMPLETE\n";
    let ids = skimrun::skim::extract_words(Some(std::io::Cursor::new(listing)), &["db"]).unwrap();
    assert_eq!(ids, vec!["db", "api", "web"]);

    let mut runner = BoundedRunner::new(Budget::new(2).unwrap());
    for id in &ids {
        runner.submit(template.render(id)).await.unwrap();
    }
    let report = runner.drain().await.unwrap();

    assert_eq!(report.succeeded, 3);
    for id in &ids {
        assert_eq!(read_slot(out.path(), id), format!("stack={id}"));
    }
}
