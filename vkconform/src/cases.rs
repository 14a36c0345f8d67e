// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Generation of test cases from input domains.
//!
//! [`CaseGenerator`] iterates the full Cartesian product of up to three [`Domain`]s, discards
//! the tuples the caller's filter rejects (division by zero, out-of-range shift counts and the
//! like), and computes the oracle expected output for every surviving tuple. The resulting
//! [`CaseList`] knows the memory layout of its values and can flatten both the inputs and the
//! expected outputs into buffers that match it exactly.
//!
//! Two boundary policies are load-bearing and must not be changed:
//!
//! - With a three-component vector type, every third flattened value is followed by one
//!   zeroed throw-away scalar, so consecutive vectors sit one [`array
//!   stride`](PackingRule::array_stride) apart.
//! - Trailing values that do not fill a complete (possibly padded) vector are silently
//!   dropped, so a flattened buffer is always a whole number of vectors. The case list is
//!   truncated to match, keeping byte offsets and case indices in lockstep.

use crate::{
    domain::{CaseValue, Domain},
    layout::{LayoutError, PackingRule, TypeDescriptor},
    DeviceSize,
};
use smallvec::SmallVec;

/// One generated test case: an input tuple, the oracle expected output, and the byte offset
/// of that output in the flattened result buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct TestCase<T> {
    /// The input values, one per domain.
    pub inputs: SmallVec<[T; 3]>,
    /// The expected output computed by the oracle.
    pub expected: T,
    /// Byte offset of the expected output in the flattened output buffer.
    pub offset: DeviceSize,
}

/// Generates [`CaseList`]s for one result type and packing rule.
#[derive(Clone, Debug)]
pub struct CaseGenerator {
    name: String,
    td: TypeDescriptor,
    rule: PackingRule,
}

impl CaseGenerator {
    /// Creates a generator for the named test.
    ///
    /// `td` describes the values as the shader sees them; `rule` is the packing rule of the
    /// buffers the values will travel through.
    #[inline]
    pub fn new(name: impl Into<String>, td: TypeDescriptor, rule: PackingRule) -> Self {
        CaseGenerator {
            name: name.into(),
            td,
            rule,
        }
    }

    /// Generates the filtered Cartesian product of the given domains.
    ///
    /// `filter` decides whether a tuple has defined semantics; `op` computes the expected
    /// output for every tuple that survives. Between one and three domains are supported.
    ///
    /// # Panics
    ///
    /// - Panics if `domains` is empty or longer than three.
    /// - Panics if `T` does not match the scalar type this generator was created with.
    pub fn generate<T>(
        &self,
        domains: &[&Domain<T>],
        filter: impl Fn(&[T]) -> bool,
        op: impl Fn(&[T]) -> T,
    ) -> Result<CaseList<T>, LayoutError>
    where
        T: CaseValue,
    {
        assert!(
            (1..=3).contains(&domains.len()),
            "case generation takes between 1 and 3 domains, got {}",
            domains.len(),
        );
        assert_eq!(
            T::SCALAR_TYPE,
            self.td.scalar,
            "case values must have the generator's scalar type",
        );

        let stride = self.rule.array_stride(self.td)?;
        let mut cases = Vec::new();

        if !domains.iter().any(|domain| domain.is_empty()) {
            let mut indices = SmallVec::<[usize; 3]>::from_elem(0, domains.len());

            'product: loop {
                let inputs: SmallVec<[T; 3]> = indices
                    .iter()
                    .zip(domains)
                    .map(|(&i, domain)| domain.values()[i])
                    .collect();

                if filter(&inputs) {
                    let expected = op(&inputs);
                    cases.push(TestCase {
                        inputs,
                        expected,
                        offset: 0,
                    });
                }

                for (i, index) in indices.iter_mut().enumerate().rev() {
                    *index += 1;

                    if *index < domains[i].len() {
                        continue 'product;
                    }

                    *index = 0;
                }

                break;
            }
        }

        let lanes = self.td.components as usize;
        cases.truncate(cases.len() - cases.len() % lanes);

        let scalar_size = self.td.scalar.size();
        for (i, case) in cases.iter_mut().enumerate() {
            case.offset = (i / lanes) as DeviceSize * stride + (i % lanes) as DeviceSize * scalar_size;
        }

        Ok(CaseList {
            name: self.name.clone(),
            td: self.td,
            rule: self.rule,
            stride,
            cases,
        })
    }
}

/// The cases generated for one test, together with the layout of their flattened buffers.
#[derive(Clone, Debug, PartialEq)]
pub struct CaseList<T> {
    name: String,
    td: TypeDescriptor,
    rule: PackingRule,
    stride: DeviceSize,
    cases: Vec<TestCase<T>>,
}

impl<T: CaseValue> CaseList<T> {
    /// Returns the name of the test the cases were generated for.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the type of the values as the shader sees them.
    #[inline]
    pub fn type_descriptor(&self) -> TypeDescriptor {
        self.td
    }

    /// Returns the packing rule of the flattened buffers.
    #[inline]
    pub fn packing_rule(&self) -> PackingRule {
        self.rule
    }

    /// Returns the distance in bytes between consecutive vectors in the flattened buffers.
    #[inline]
    pub fn stride(&self) -> DeviceSize {
        self.stride
    }

    /// Returns the generated cases.
    #[inline]
    pub fn cases(&self) -> &[TestCase<T>] {
        &self.cases
    }

    /// Returns the number of generated cases.
    #[inline]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Returns whether no cases survived generation.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Returns the number of input values each case has.
    #[inline]
    pub fn arity(&self) -> usize {
        self.cases.first().map_or(0, |case| case.inputs.len())
    }

    /// Flattens the input values of the given argument position into a layout-correct buffer.
    ///
    /// # Panics
    ///
    /// Panics if `arg` is not a valid argument position.
    pub fn input_bytes(&self, arg: usize) -> Vec<u8> {
        assert!(
            self.is_empty() || arg < self.arity(),
            "argument position {} is out of range for arity {}",
            arg,
            self.arity(),
        );

        self.flatten(self.cases.iter().map(|case| case.inputs[arg]))
    }

    /// Flattens the expected outputs into a layout-correct buffer.
    pub fn expected_bytes(&self) -> Vec<u8> {
        self.flatten(self.cases.iter().map(|case| case.expected))
    }

    fn flatten(&self, values: impl ExactSizeIterator<Item = T>) -> Vec<u8> {
        let lanes = self.td.components as usize;
        let stride = self.stride as usize;
        let mut bytes = Vec::with_capacity(values.len() / lanes * stride);

        for (i, value) in values.enumerate() {
            bytes.extend_from_slice(bytemuck::bytes_of(&value));

            // Zero-fill the tail of the vector: the throw-away fourth lane of a
            // three-component vector, and the rest of the 16-byte slot under the padded rule.
            if (i + 1) % lanes == 0 {
                bytes.resize((i / lanes + 1) * stride, 0);
            }
        }

        bytes
    }
}
