use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hajimu::runtime::{Channel, Promise, PromiseState, RwLock};
use hajimu::*;
use pretty_assertions::assert_eq;

fn run(src: &str) -> String {
    let out = OutputBuffer::new();
    let mut interp = Interpreter::with_output(EvalContext::default(), out.clone());
    if let Err(e) = interp.run_source("<concurrency>", src) {
        panic!("program failed: {}\noutput so far:\n{}", e, out.contents());
    }
    out.contents()
}

// ═══════════════════════════════════════════════════════════════════════
// Programs
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_producers_and_consumer_over_bounded_channel() {
    let src = r#"
変数 ch = チャネル作成(2)

関数 生産者()
    繰り返す i を 1 から 5 まで
        ch.送信(i)
    終わり
終わり

変数 作業 = []
繰り返す n を 1 から 3 まで
    作業.追加(スレッド作成(生産者))
終わり

変数 合計 = 0
繰り返す k を 1 から 15 まで
    合計 += ch.受信()
終わり
繰り返す t を 作業 から
    待つ t
終わり
表示(合計)
"#;
    assert_eq!(run(src), "45\n");
}

#[test]
fn test_pool_tasks_and_wait_all() {
    let src = r#"
関数 二倍(x)
    返す x * 2
終わり
変数 約束 = []
繰り返す i を 1 から 4 まで
    約束.追加(タスク実行(二倍, i))
終わり
表示(待つ 全て待つ(約束))
"#;
    assert_eq!(run(src), "[2, 4, 6, 8]\n");
}

#[test]
fn test_await_inside_task_does_not_starve_pool() {
    let mut ctx = EvalContext::default();
    ctx.worker_threads = 1;
    let out = OutputBuffer::new();
    let mut interp = Interpreter::with_output(ctx, out.clone());
    let src = r#"
変数 外 = 非同期
    変数 内 = 非同期
        返す 1
    終わり
    返す (待つ 内) + 1
終わり
表示(待つ 外)
"#;
    interp.run_source("<nested>", src).unwrap();
    assert_eq!(out.contents(), "2\n");
}

#[test]
fn test_atomic_counter_with_wait_group() {
    let src = r#"
変数 c = アトミック作成(0)
変数 wg = 待機グループ作成()
関数 作業()
    繰り返す i を 1 から 100 まで
        c.増加()
    終わり
    wg.完了()
終わり
繰り返す n を 1 から 4 まで
    wg.追加(1)
    スレッド作成(作業)
終わり
wg.待機()
表示(c.取得())
"#;
    assert_eq!(run(src), "400\n");
}

#[test]
fn test_closed_channel_drains_then_yields_null() {
    let src = r#"
変数 ch = チャネル作成(3)
ch.送信("あ")
ch.送信("い")
ch.閉じる()
表示(ch.受信(), ch.受信(), ch.受信())
試す
    ch.送信("う")
捕まえる e
    表示(e.種類)
終わり
"#;
    assert_eq!(run(src), "あ い 無\nValueError\n");
}

#[test]
fn test_receive_result_tells_null_from_closed() {
    let src = r#"
変数 ch = チャネル作成(2)
ch.送信(無)
ch.閉じる()
変数 一 = ch.受信結果()
変数 二 = ch.受信結果()
表示(一.値, 一.閉)
表示(二.値, 二.閉)
"#;
    assert_eq!(run(src), "無 偽
無 真
");
}

#[test]
fn test_promise_then_chain() {
    let src = r#"
変数 p = 非同期
    返す 10
終わり
変数 q = p.そして(関数(v) { 返す v + 5 })
表示(待つ q, p.状態())
"#;
    assert_eq!(run(src), "15 成功\n");
}

// ═══════════════════════════════════════════════════════════════════════
// Runtime Primitives
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_channel_preserves_send_order() {
    let ch = Arc::new(Channel::new(4));
    let sender = Arc::clone(&ch);
    let producer = thread::spawn(move || {
        for i in 0..200 {
            sender.send(Value::from(i as f64)).unwrap();
        }
        sender.close();
    });

    let mut received = Vec::new();
    while let Some(v) = ch.recv() {
        received.push(v.as_integer().unwrap());
    }
    producer.join().unwrap();
    assert_eq!(received, (0..200).collect::<Vec<i64>>());
}

#[test]
fn test_promise_settles_once_for_every_observer() {
    let promise = Promise::new();
    let observers: Vec<_> = (0..4)
        .map(|_| {
            let p = Arc::clone(&promise);
            thread::spawn(move || p.wait(None).unwrap().unwrap())
        })
        .collect();

    assert!(promise.fulfill(Value::from(1.0)));
    assert!(!promise.fulfill(Value::from(2.0)));
    assert!(!promise.reject(Arc::new(ErrorValue::new(ErrorKind::UserError, "遅い"))));

    for observer in observers {
        assert_eq!(observer.join().unwrap(), Value::from(1.0));
    }
    assert!(matches!(promise.state(), PromiseState::Fulfilled(Value::Number(n)) if n == 1.0));
}

#[test]
fn test_rwlock_never_mixes_writer_with_readers() {
    let lock = Arc::new(RwLock::new());
    let readers = Arc::new(AtomicUsize::new(0));
    let writing = Arc::new(AtomicBool::new(false));
    let violated = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let (lock, readers, writing, violated) = (
                Arc::clone(&lock),
                Arc::clone(&readers),
                Arc::clone(&writing),
                Arc::clone(&violated),
            );
            thread::spawn(move || {
                for _ in 0..50 {
                    if i % 4 == 0 {
                        lock.write_lock();
                        if writing.swap(true, Ordering::SeqCst) || readers.load(Ordering::SeqCst) > 0 {
                            violated.store(true, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_micros(50));
                        writing.store(false, Ordering::SeqCst);
                        lock.write_unlock().unwrap();
                    } else {
                        lock.read_lock();
                        readers.fetch_add(1, Ordering::SeqCst);
                        if writing.load(Ordering::SeqCst) {
                            violated.store(true, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_micros(20));
                        readers.fetch_sub(1, Ordering::SeqCst);
                        lock.read_unlock().unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(!violated.load(Ordering::SeqCst));
    assert_eq!(lock.readers(), 0);
    assert!(!lock.is_write_locked());
}

#[test]
fn test_unlocking_unheld_rwlock_fails() {
    let lock = RwLock::new();
    assert!(lock.read_unlock().is_err());
    assert!(lock.write_unlock().is_err());
}
