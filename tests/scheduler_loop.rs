mod common;

use std::{sync::Arc, time::Duration};

use common::{epoch, harness_with, secs};
use kitchen_timers::{
    tasks::scheduler_task, ManualClock, MemoryStore, SchedulerConfig, TimerEvent, TimerStatus,
};
use tokio::{sync::watch, time::timeout};

fn fast() -> SchedulerConfig {
    SchedulerConfig {
        tick_period: Duration::from_millis(10),
        emit_progress: false,
    }
}

async fn next_finished(rx: &mut tokio::sync::broadcast::Receiver<TimerEvent>) -> TimerEvent {
    loop {
        let event = rx.recv().await.unwrap();
        if event.is_finished() {
            return event;
        }
    }
}

#[tokio::test]
async fn idle_loop_rearms_when_a_timer_starts() {
    let h = harness_with(
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(epoch())),
        fast(),
    );
    let mut events = h.scheduler.notifier().subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(scheduler_task(h.scheduler.clone(), shutdown_rx));

    // Let the loop park on the empty active set
    tokio::time::sleep(Duration::from_millis(50)).await;

    let timer = h.controller.create("kettle", secs(30), None).unwrap();
    h.controller.start(timer.id).unwrap();
    h.clock.advance_secs(31);

    let event = timeout(Duration::from_secs(5), next_finished(&mut events))
        .await
        .expect("finished event");
    assert_eq!(event.timer().id, timer.id);
    assert_eq!(
        h.controller.get(timer.id).unwrap().status,
        TimerStatus::Finished
    );

    shutdown_tx.send(true).unwrap();
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn reconciled_timers_are_picked_up_by_the_loop() {
    let h = harness_with(
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(epoch())),
        fast(),
    );
    let timer = h.controller.create("oven", secs(60), None).unwrap();
    h.controller.start(timer.id).unwrap();
    h.clock.advance_secs(3600);

    // Same store, fresh scheduler state: as after a restart
    let restarted = harness_with(h.scheduler.store().clone(), h.clock.clone(), fast());
    let mut events = restarted.scheduler.notifier().subscribe();
    restarted.scheduler.reconcile().unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(scheduler_task(restarted.scheduler.clone(), shutdown_rx));

    let event = timeout(Duration::from_secs(5), next_finished(&mut events))
        .await
        .expect("finished event");
    assert_eq!(event.timer().id, timer.id);

    shutdown_tx.send(true).unwrap();
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    assert!(restarted.scheduler.is_idle());
}

#[tokio::test]
async fn loop_exits_when_shutdown_sender_is_dropped() {
    let h = harness_with(
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(epoch())),
        fast(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(scheduler_task(h.scheduler.clone(), shutdown_rx));

    drop(shutdown_tx);
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn slow_store_writes_do_not_stall_the_runtime() {
    let store = Arc::new(common::SlowStore::default());
    let h = harness_with(
        store.clone(),
        Arc::new(ManualClock::new(epoch())),
        fast(),
    );
    let timer = h.controller.create("caramel", secs(600), None).unwrap();
    h.controller.start(timer.id).unwrap();
    store.stall_writes(true);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(scheduler_task(h.scheduler.clone(), shutdown_rx));

    // Let the loop get into a stalled tick
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = std::time::Instant::now();
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(
        started.elapsed() < common::SlowStore::STALL / 2,
        "runtime was blocked for {:?}",
        started.elapsed()
    );

    store.stall_writes(false);
    shutdown_tx.send(true).unwrap();
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
}
