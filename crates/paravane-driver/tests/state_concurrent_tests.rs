//! 执行器状态缓存并发测试
//!
//! 验证入站/出站两个触发并发执行时：快照无撕裂、同步标志只出现一次。

use paravane_driver::*;
use paravane_protocol::{FrameLayout, SyncFlag, TelemetryFrame};
use rand::Rng;
use std::sync::{Arc, Barrier};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// 写入端总是写入各通道相同的值，读取端不应看到混合值
#[test]
fn test_snapshot_never_torn() {
    let cache = Arc::new(ActuatorStateCache::new());
    let iterations = 5000;

    let writer = {
        let cache = cache.clone();
        thread::spawn(move || {
            for i in 0..iterations {
                let v = i as f32;
                cache.update_commanded([v; 4]);
                cache.update_feedback([v; 5]);
                thread::yield_now();
            }
        })
    };

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            thread::spawn(move || {
                for _ in 0..iterations {
                    let snapshot = cache.snapshot();
                    let c = snapshot.commanded;
                    assert!(c[..4].iter().all(|v| *v == c[0]), "torn commanded: {:?}", c);
                    assert_eq!(c[4], 0.0);
                    let f = snapshot.feedback;
                    assert!(f.iter().all(|v| *v == f[0]), "torn feedback: {:?}", f);
                    thread::yield_now();
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for handle in readers {
        handle.join().unwrap();
    }
}

/// 多个出站触发并发执行，整个生命周期只有一帧携带同步标志
#[test]
fn test_sync_flag_observed_exactly_once() {
    let cache = Arc::new(ActuatorStateCache::new());
    let sync_count = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            let sync_count = sync_count.clone();
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for t in 0..500u32 {
                    let deltas = [rng.gen_range(-0.5f32..0.5); 4];
                    let frame = cache.commit_command(deltas, t);
                    // 每一帧携带的正是它自己写入的指令值
                    assert_eq!(frame.servo_deltas, deltas);
                    if frame.sync == SyncFlag::Sync {
                        sync_count.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(sync_count.load(Ordering::Relaxed), 1);
    assert_eq!(cache.snapshot().sync, SyncState::Synced);
}

/// 入站触发与出站触发并发执行，入站处理不消费同步标志
#[test]
fn test_inbound_interleaving_does_not_consume_sync() {
    let controller = Arc::new(BridgeController::new(
        Arc::new(ActuatorStateCache::new()),
        FrameLayout::Extended,
        FeedbackSource::Auxiliary,
    ));
    let frame = TelemetryFrame {
        depth: 2.0,
        auxiliary: Some([0.0, 0.1, 0.1, 0.1, 0.0]),
        ..Default::default()
    };
    let bytes = frame.to_bytes();
    // 4 个入站线程 + 1 个出站线程同时起跑
    let start = Arc::new(Barrier::new(5));

    let inbound: Vec<_> = (0..4)
        .map(|_| {
            let controller = controller.clone();
            let bytes = bytes.clone();
            let start = start.clone();
            thread::spawn(move || {
                let (sink, events) = ChannelSink::bounded(1024);
                start.wait();
                for _ in 0..200 {
                    let report = controller.handle_bytes(&bytes, &sink).unwrap();
                    // 快照内部一致：反馈全部来自同一帧
                    assert_eq!(report.snapshot.feedback, [0.0, 0.1, 0.1, 0.1, 0.0]);
                    while events.try_recv().is_ok() {}
                    thread::yield_now();
                }
            })
        })
        .collect();

    let outbound = {
        let controller = controller.clone();
        let start = start.clone();
        thread::spawn(move || {
            start.wait();
            let mut flags = Vec::with_capacity(200);
            for t in 0..200u32 {
                let deltas = [t as f32 * 0.001; 4];
                let frame = controller.cache().commit_command(deltas, t);
                assert_eq!(frame.servo_deltas, deltas);
                flags.push(frame.sync);
                thread::yield_now();
            }
            flags
        })
    };

    let flags = outbound.join().unwrap();
    for handle in inbound {
        handle.join().unwrap();
    }

    // 入站处理再多，同步标志也只出现在第一帧指令上
    assert_eq!(flags.iter().filter(|f| f.is_sync()).count(), 1);
    assert_eq!(flags[0], SyncFlag::Sync);
    assert_eq!(controller.metrics().snapshot().rx_frames_valid, 800);
    assert_eq!(controller.cache().snapshot().sync, SyncState::Synced);
}
