mod common;

use raypool::{PoolBuilder, PoolError, THREADS_ENV, ThreadPool, available_cores};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

#[test]
fn test_pool_sizes() {
    common::init_tracing();

    for n in 1..=6 {
        let pool = ThreadPool::new(n).unwrap();
        assert_eq!(pool.size(), n - 1);
        assert_eq!(pool.running_threads(), n);
    }

    let default = PoolBuilder::new().build().unwrap();
    assert_eq!(default.running_threads(), available_cores());
}

#[test]
fn test_zero_threads_rejected() {
    let err = ThreadPool::new(0).unwrap_err();
    assert!(matches!(err, PoolError::NoThreads));
    assert_eq!(
        err.to_string(),
        "a thread pool needs at least one participating thread"
    );
}

#[test]
fn test_for_each_thread_runs_once_per_thread() {
    let pool = PoolBuilder::new()
        .threads(5)
        .thread_name("render")
        .build()
        .unwrap();

    let calls = AtomicUsize::new(0);
    let ids = Mutex::new(Vec::new());
    let names = Mutex::new(HashSet::new());

    pool.for_each_thread(|| {
        calls.fetch_add(1, Ordering::SeqCst);
        ids.lock().unwrap().push(thread::current().id());
        if let Some(name) = thread::current().name() {
            names.lock().unwrap().insert(name.to_owned());
        }
    });

    assert_eq!(calls.load(Ordering::SeqCst), 5);

    let ids = ids.into_inner().unwrap();
    let distinct: HashSet<_> = ids.iter().collect();
    assert_eq!(distinct.len(), 5);
    assert!(ids.contains(&thread::current().id()));

    let names = names.into_inner().unwrap();
    for worker in 0..4 {
        assert!(names.contains(&format!("render-{worker}")));
    }
}

#[test]
fn test_for_each_thread_single_thread() {
    let pool = ThreadPool::new(1).unwrap();
    let calls = AtomicUsize::new(0);

    pool.for_each_thread(|| {
        calls.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
#[should_panic(expected = "pool is disabled")]
fn test_for_each_thread_disabled_panics() {
    let pool = ThreadPool::new(2).unwrap();
    pool.disable();
    pool.for_each_thread(|| {});
}

#[test]
fn test_try_make_progress_without_work() {
    let pool = ThreadPool::new(3).unwrap();
    assert!(!pool.try_make_progress());
}

#[test]
fn test_handle_outlives_pool() {
    let pool = ThreadPool::new(4).unwrap();
    let handle = pool.handle().clone();
    drop(pool);

    assert_eq!(handle.size(), 0);
    assert_eq!(handle.running_threads(), 1);

    let total = AtomicUsize::new(0);
    handle.parallel_for_each(0, 100, |i| {
        total.fetch_add(i as usize, Ordering::Relaxed);
    });
    assert_eq!(total.load(Ordering::Relaxed), 4950);

    let job = handle.run_async(|| 3);
    assert!(job.is_ready());
}

#[test]
fn test_sequential_pools() {
    for n in 1..=4 {
        let pool = ThreadPool::new(n).unwrap();
        let hits = AtomicUsize::new(0);
        pool.parallel_for_each(0, 1000, |_| {
            hits.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(hits.load(Ordering::Relaxed), 1000);
        drop(pool);
    }
}

#[test]
fn test_debug_output() {
    let pool = ThreadPool::new(3).unwrap();

    let pool_debug = format!("{pool:?}");
    assert!(pool_debug.starts_with("ThreadPool"));
    assert!(pool_debug.contains("workers: [0, 1]"));

    let handle_debug = format!("{:?}", pool.handle());
    assert!(handle_debug.contains("running_threads: 3"));
}

#[test]
fn test_builder_from_env() {
    // The only test touching the variable, so no other test observes it.
    unsafe { std::env::set_var(THREADS_ENV, "3") };
    let pool = PoolBuilder::from_env().unwrap().build().unwrap();
    assert_eq!(pool.running_threads(), 3);

    unsafe { std::env::set_var(THREADS_ENV, "0") };
    let pool = PoolBuilder::from_env().unwrap().build().unwrap();
    assert_eq!(pool.running_threads(), available_cores());

    unsafe { std::env::set_var(THREADS_ENV, "lots") };
    match PoolBuilder::from_env() {
        Err(PoolError::InvalidEnv { var, value }) => {
            assert_eq!(var, THREADS_ENV);
            assert_eq!(value, "lots");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    unsafe { std::env::remove_var(THREADS_ENV) };
    assert!(PoolBuilder::from_env().is_ok());
}
