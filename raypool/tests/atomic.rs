use raypool::{AtomicDouble, AtomicFloat, ThreadPool};
use std::thread;

fn permutations(values: &[f32]) -> Vec<Vec<f32>> {
    if values.len() <= 1 {
        return vec![values.to_vec()];
    }

    let mut out = Vec::new();
    for i in 0..values.len() {
        let mut rest = values.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head);
            out.push(tail);
        }
    }
    out
}

#[test]
fn test_concurrent_adds_are_not_lost() {
    let sum = AtomicFloat::new(0.0);
    let sum_double = AtomicDouble::new(0.0);

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..1000 {
                    sum.add(1.0);
                    sum_double.add(0.5);
                }
            });
        }
    });

    assert_eq!(sum.get(), 8000.0);
    assert_eq!(sum_double.get(), 4000.0);
}

#[test]
fn test_result_matches_some_serial_order() {
    // Values whose sum depends on the order of application in f32.
    let values = [1.0e8f32, 0.1, -1.0e8, 3.3];
    let serial_sums: Vec<f32> = permutations(&values)
        .into_iter()
        .map(|order| order.into_iter().fold(0.0f32, |acc, v| acc + v))
        .collect();

    for _ in 0..50 {
        let sum = AtomicFloat::new(0.0);
        thread::scope(|s| {
            for &v in &values {
                let sum = &sum;
                s.spawn(move || sum.add(v));
            }
        });

        let got = sum.get();
        assert!(
            serial_sums.iter().any(|&expected| expected.to_bits() == got.to_bits()),
            "{got} is not the sum of any ordering"
        );
    }
}

#[test]
fn test_accumulate_from_parallel_for() {
    let pool = ThreadPool::new(4).unwrap();
    let power = AtomicDouble::default();

    pool.parallel_for_each(1, 1001, |i| power.add(i as f64));

    assert_eq!(power.get(), 500_500.0);
}

#[test]
fn test_set_get_and_conversions() {
    let value = AtomicFloat::from(2.5);
    assert_eq!(value.get(), 2.5);

    value.set(-1.25);
    assert_eq!(f32::from(&value), -1.25);

    value.add(0.25);
    assert_eq!(value.get(), -1.0);
    assert_eq!(format!("{value:?}"), "AtomicFloat(-1.0)");

    let double = AtomicDouble::new(1.0e300);
    double.add(1.0e300);
    assert_eq!(double.get(), 2.0e300);
    assert_eq!(AtomicDouble::default().get(), 0.0);
}
