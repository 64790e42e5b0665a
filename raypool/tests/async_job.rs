mod common;

use raypool::ThreadPool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

#[test]
fn test_body_runs_once_and_result_is_shared() {
    common::init_tracing();

    let pool = ThreadPool::new(4).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    let runs_clone = runs.clone();
    let job = pool.run_async(move || {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        vec![1, 2, 3]
    });

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let job = job.clone();
                s.spawn(move || job.get_result())
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(results.iter().all(|r| *r == vec![1, 2, 3]));
    assert_eq!(job.get_result(), vec![1, 2, 3]);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_single_thread_pool_runs_synchronously() {
    let pool = ThreadPool::new(1).unwrap();
    let caller = thread::current().id();

    let job = pool.run_async(move || thread::current().id() == caller);

    assert!(job.is_ready());
    assert!(job.get_result());
}

#[test]
fn test_nested_async_single_thread() {
    let pool = ThreadPool::new(1).unwrap();
    let handle = pool.handle().clone();

    let outer = pool.run_async(move || {
        let inner = handle.run_async(|| 20);
        inner.get_result() + 1
    });

    assert_eq!(outer.get_result(), 21);
}

#[test]
fn test_nested_async_multi_thread() {
    let pool = ThreadPool::new(4).unwrap();

    let outers: Vec<_> = (0..16)
        .map(|i| {
            let handle = pool.handle().clone();
            pool.run_async(move || {
                let inner = handle.run_async(move || i * 10);
                inner.get_result() + i
            })
        })
        .collect();

    let values: Vec<_> = outers.iter().map(|job| job.get_result()).collect();
    assert_eq!(values, (0..16).map(|i| i * 11).collect::<Vec<_>>());
}

#[test]
fn test_wait_helps_when_workers_are_disabled() {
    let pool = ThreadPool::new(4).unwrap();
    pool.disable();

    let job = pool.run_async(|| "done");
    job.wait();

    assert!(job.is_ready());
    assert_eq!(job.get_result(), "done");
    pool.reenable();
}

#[test]
fn test_try_get_result_releases_external_lock() {
    let pool = ThreadPool::new(2).unwrap();
    let state = Mutex::new(0u32);

    let job = pool.run_async(|| 99);

    let mut guard = state.lock().unwrap();
    let value = loop {
        let (relocked, result) = job.try_get_result(&state, guard);
        guard = relocked;
        if let Some(value) = result {
            break value;
        }
        *guard += 1;
    };

    assert_eq!(value, 99);
    drop(guard);
}

#[test]
fn test_with_result_for_non_clone_values() {
    struct Scene {
        shapes: Vec<String>,
    }

    let pool = ThreadPool::new(3).unwrap();
    let job = pool.run_async(|| Scene {
        shapes: vec!["sphere".into(), "quad".into()],
    });

    assert_eq!(job.with_result(|scene| scene.shapes.len()), 2);
}

#[test]
#[should_panic(expected = "async job panicked: kaboom")]
fn test_panicking_body_surfaces_on_get_result() {
    let pool = ThreadPool::new(2).unwrap();
    let job = pool.run_async(|| -> u32 { panic!("kaboom") });

    job.get_result();
}

#[test]
fn test_pending_jobs_complete_when_pool_drops() {
    let pool = ThreadPool::new(3).unwrap();
    pool.disable();

    let job = pool.run_async(|| 7);
    assert!(!job.is_ready());

    drop(pool);

    assert!(job.is_ready());
    assert_eq!(job.get_result(), 7);
}

#[test]
fn test_many_concurrent_jobs() {
    let pool = ThreadPool::new(8).unwrap();

    let jobs: Vec<_> = (0..200u64).map(|i| pool.run_async(move || i * i)).collect();
    let sum: u64 = jobs.iter().map(|job| job.get_result()).sum();

    assert_eq!(sum, (0..200u64).map(|i| i * i).sum());
}
