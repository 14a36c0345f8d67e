// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Finite input domains that test cases are generated from.
//!
//! A [`Domain`] is an ordered list of representative values of one scalar type: zero, the type
//! minimum, the type maximum, and a handful of pseudo-random values. The random values are
//! drawn from an RNG owned by the domain and seeded from the test name, so the same test
//! regenerates bit-identical inputs on every run. There is no global random state anywhere.

use crate::layout::ScalarType;
use half::f16;
use rand::{rngs::StdRng, Rng, SeedableRng};
use smallvec::{smallvec, SmallVec};
use std::{fmt::Debug, hash::BuildHasher};

/// Derives the deterministic RNG seed used for the domain of the named test.
#[inline]
pub fn seed_for_name(name: &str) -> u64 {
    foldhash::fast::FixedState::with_seed(0).hash_one(name)
}

/// A scalar value that can be enumerated, flattened into buffers and compared.
///
/// Implemented for the nine scalar types the harness models. The `bytemuck` bound is what
/// allows case values to be written into device buffers byte for byte.
pub trait CaseValue: bytemuck::Pod + Copy + PartialEq + Debug {
    /// The scalar type this value has in a shader interface.
    const SCALAR_TYPE: ScalarType;

    /// The values every sampled domain of this type contains: zero, the type minimum and the
    /// type maximum.
    fn interesting() -> SmallVec<[Self; 4]>;

    /// Draws one pseudo-random value from `rng`.
    fn sample(rng: &mut StdRng) -> Self;
}

macro_rules! impl_case_value_int {
    ($ty:ty, $scalar:expr) => {
        impl CaseValue for $ty {
            const SCALAR_TYPE: ScalarType = $scalar;

            fn interesting() -> SmallVec<[Self; 4]> {
                smallvec![0, <$ty>::MIN, <$ty>::MAX]
            }

            fn sample(rng: &mut StdRng) -> Self {
                rng.gen()
            }
        }
    };
}

impl_case_value_int!(i16, ScalarType::I16);
impl_case_value_int!(i32, ScalarType::I32);
impl_case_value_int!(i64, ScalarType::I64);
impl_case_value_int!(u16, ScalarType::U16);
impl_case_value_int!(u32, ScalarType::U32);
impl_case_value_int!(u64, ScalarType::U64);

impl CaseValue for f32 {
    const SCALAR_TYPE: ScalarType = ScalarType::F32;

    fn interesting() -> SmallVec<[Self; 4]> {
        smallvec![0.0, f32::MIN, f32::MAX]
    }

    fn sample(rng: &mut StdRng) -> Self {
        rng.gen_range(-1.0e6..1.0e6)
    }
}

impl CaseValue for f64 {
    const SCALAR_TYPE: ScalarType = ScalarType::F64;

    fn interesting() -> SmallVec<[Self; 4]> {
        smallvec![0.0, f64::MIN, f64::MAX]
    }

    fn sample(rng: &mut StdRng) -> Self {
        rng.gen_range(-1.0e6..1.0e6)
    }
}

impl CaseValue for f16 {
    const SCALAR_TYPE: ScalarType = ScalarType::F16;

    fn interesting() -> SmallVec<[Self; 4]> {
        smallvec![f16::ZERO, f16::MIN, f16::MAX]
    }

    fn sample(rng: &mut StdRng) -> Self {
        f16::from_f32(rng.gen_range(-6.0e4..6.0e4))
    }
}

/// An ordered, finite set of input values of one scalar type.
#[derive(Clone, Debug, PartialEq)]
pub struct Domain<T> {
    values: Vec<T>,
}

impl<T: CaseValue> Domain<T> {
    /// Creates a domain from explicitly chosen values, kept in the given order.
    #[inline]
    pub fn from_values(values: impl Into<Vec<T>>) -> Self {
        Domain {
            values: values.into(),
        }
    }

    /// Creates a domain of `count` representative values for the named test.
    ///
    /// The domain starts with the type's interesting values (zero, minimum, maximum) and is
    /// filled up with pseudo-random values from an RNG seeded by `name`. Duplicates are
    /// skipped so each value is exercised once.
    pub fn sampled(name: &str, count: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed_for_name(name));
        let mut values = Vec::with_capacity(count);

        for value in T::interesting() {
            if values.len() == count {
                break;
            }
            if !values.contains(&value) {
                values.push(value);
            }
        }

        while values.len() < count {
            let value = T::sample(&mut rng);

            if !values.contains(&value) {
                values.push(value);
            }
        }

        Domain { values }
    }

    /// Returns the values of the domain.
    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Returns the number of values in the domain.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether the domain has no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampled_domains_are_deterministic() {
        let a = Domain::<i16>::sampled("conversion.negate.i16", 12);
        let b = Domain::<i16>::sampled("conversion.negate.i16", 12);
        assert_eq!(a, b);
    }

    #[test]
    fn different_names_seed_different_domains() {
        let a = Domain::<u32>::sampled("op.add.u32", 16);
        let b = Domain::<u32>::sampled("op.mul.u32", 16);
        assert_ne!(a, b);
    }

    #[test]
    fn sampled_domain_contains_extremes_and_zero() {
        let domain = Domain::<i32>::sampled("op.clamp.i32", 10);
        assert_eq!(domain.len(), 10);
        assert!(domain.values().contains(&0));
        assert!(domain.values().contains(&i32::MIN));
        assert!(domain.values().contains(&i32::MAX));
    }

    #[test]
    fn unsigned_domains_do_not_duplicate_zero() {
        // For unsigned types the minimum is zero; it must appear only once.
        let domain = Domain::<u16>::sampled("op.shift.u16", 8);
        let zeros = domain.values().iter().filter(|&&v| v == 0).count();
        assert_eq!(zeros, 1);
    }

    #[test]
    fn explicit_domains_keep_their_order() {
        let domain = Domain::from_values([3i16, -7, 3, 0]);
        assert_eq!(domain.values(), &[3, -7, 3, 0]);
    }
}
