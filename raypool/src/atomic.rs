//! Lock-free floating-point accumulators.
//!
//! The standard library has no atomic floats, so [`AtomicFloat`] and
//! [`AtomicDouble`] store the IEEE-754 bit pattern of their value inside
//! an integer atomic and implement addition as a compare-and-swap loop
//! over those bits.
//!
//! Concurrent [`add`](AtomicFloat::add) calls never lose an update. The
//! order in which contributions are applied is unspecified, so the final
//! value equals the serial sum of *some* permutation of the addends.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

macro_rules! atomic_float {
    ($(#[$meta:meta])* $name:ident, $float:ty, $atomic:ty) => {
        $(#[$meta])*
        pub struct $name {
            /// Bit pattern of the current value.
            bits: $atomic,
        }

        impl $name {
            /// Creates an accumulator holding `value`.
            pub fn new(value: $float) -> Self {
                Self {
                    bits: <$atomic>::new(value.to_bits()),
                }
            }

            /// Returns the current value.
            pub fn get(&self) -> $float {
                <$float>::from_bits(self.bits.load(Ordering::SeqCst))
            }

            /// Overwrites the current value.
            ///
            /// This is a plain store: an `add` racing with it may be
            /// applied before or after, but is never merged into it.
            pub fn set(&self, value: $float) {
                self.bits.store(value.to_bits(), Ordering::SeqCst);
            }

            /// Atomically adds `value` to the accumulator.
            ///
            /// Retries until the swap succeeds; there is no back-off.
            pub fn add(&self, value: $float) {
                let mut old_bits = self.bits.load(Ordering::SeqCst);
                loop {
                    let new_bits = (<$float>::from_bits(old_bits) + value).to_bits();
                    match self.bits.compare_exchange_weak(
                        old_bits,
                        new_bits,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    ) {
                        Ok(_) => return,
                        Err(current) => old_bits = current,
                    }
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new(0.0)
            }
        }

        impl From<$float> for $name {
            fn from(value: $float) -> Self {
                Self::new(value)
            }
        }

        impl From<&$name> for $float {
            fn from(atomic: &$name) -> Self {
                atomic.get()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.get()).finish()
            }
        }
    };
}

atomic_float!(
    /// An `f32` supporting lock-free concurrent accumulation.
    ///
    /// Used for quantities such as per-pixel splats or light power
    /// estimates that many threads add into at once.
    AtomicFloat,
    f32,
    AtomicU32
);

atomic_float!(
    /// An `f64` supporting lock-free concurrent accumulation.
    AtomicDouble,
    f64,
    AtomicU64
);
