// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Comparing observed device output against oracle expected values.
//!
//! Every comparison produces a [`VerificationOutcome`]: a binary verdict with a message that
//! pinpoints the first mismatching element or pixel. A mismatch is not an error; only the
//! harness plumbing around a comparison can fail.
//!
//! Integers compare bitwise. When a 16-bit store is read back through a 32-bit access, the
//! observed values must be sign- or zero-extended consistently with the signedness of the
//! source operation ([`verify_widened_buffer`]). Floating-point values also compare bitwise,
//! except that a NaN of a given width equals any NaN of that width, and that results a device
//! stores at reduced precision are accepted under any [rounding mode](RoundingModes) the test
//! permits ([`verify_reduced_f16`], [`verify_reduced_f32`]). Images compare per pixel with a
//! per-channel threshold.
//!
//! Padding lanes in a flattened buffer are never compared; the device is free to leave
//! anything there.

use crate::{
    cases::CaseList,
    domain::CaseValue,
    layout::{LayoutError, ScalarType, TypeDescriptor},
    rounding::{f16_from_f32_rte, f16_from_f32_rtz, f32_from_f64_rte, f32_from_f64_rtz},
    NonExhaustive,
};
use half::f16;
use smallvec::SmallVec;
use std::fmt::{Debug, Display, Error as FmtError, Formatter};

/// The verdict of one comparison, produced once per test case and never mutated afterward.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VerificationOutcome {
    /// Whether the observed output matches the expected values.
    pub pass: bool,
    /// The index of the first mismatching element or pixel, if any.
    pub first_mismatch: Option<usize>,
    /// A human-readable description of the verdict, suitable for a conformance log.
    pub message: String,
}

impl VerificationOutcome {
    /// Creates a passing outcome for a comparison of `count` elements.
    #[inline]
    pub fn pass(count: usize) -> Self {
        VerificationOutcome {
            pass: true,
            first_mismatch: None,
            message: format!("all {} values match", count),
        }
    }

    /// Creates a failing outcome pinpointing the element at `index`.
    #[inline]
    pub fn fail(index: usize, message: String) -> Self {
        VerificationOutcome {
            pass: false,
            first_mismatch: Some(index),
            message,
        }
    }
}

impl Display for VerificationOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        let verdict = if self.pass { "pass" } else { "fail" };

        write!(f, "{}: {}", verdict, self.message)
    }
}

/// A set of rounding modes a device is permitted to use when storing at reduced precision.
///
/// A reduced-precision comparison passes if the observed value matches the expected value
/// rounded under *any* mode in the set, so a test that does not pin a mode down leaves both
/// set. An empty set rejects every value.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoundingModes(u32);

impl RoundingModes {
    /// Round toward zero: the mantissa is truncated, overflow saturates to the largest finite
    /// value.
    pub const TOWARD_ZERO: Self = RoundingModes(1 << 0);
    /// Round to nearest, ties to even: overflow goes to infinity.
    pub const NEAREST_EVEN: Self = RoundingModes(1 << 1);

    /// Returns a `RoundingModes` with no modes set.
    #[inline]
    pub const fn empty() -> Self {
        RoundingModes(0)
    }

    /// Returns a `RoundingModes` with both modes set.
    #[inline]
    pub const fn either() -> Self {
        RoundingModes::TOWARD_ZERO.union(RoundingModes::NEAREST_EVEN)
    }

    /// Returns whether no modes are set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the union of `self` and `other`.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        RoundingModes(self.0 | other.0)
    }

    /// Returns whether all modes in `other` are also in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Debug for RoundingModes {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match (
            self.contains(RoundingModes::TOWARD_ZERO),
            self.contains(RoundingModes::NEAREST_EVEN),
        ) {
            (false, false) => write!(f, "empty()"),
            (true, false) => write!(f, "TOWARD_ZERO"),
            (false, true) => write!(f, "NEAREST_EVEN"),
            (true, true) => write!(f, "TOWARD_ZERO | NEAREST_EVEN"),
        }
    }
}

/// How observed floating-point values are compared against the oracle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FloatComparison {
    /// The rounding modes the device is permitted to have used.
    ///
    /// The default value is [`RoundingModes::NEAREST_EVEN`].
    pub rounding: RoundingModes,

    /// Additional tolerance in units in the last place of the reduced type, applied around
    /// each permitted rounding of the expected value.
    ///
    /// The default value is `0`, requiring a bit-exact match with one of the roundings.
    pub ulp_tolerance: u32,

    pub _ne: NonExhaustive,
}

impl Default for FloatComparison {
    #[inline]
    fn default() -> Self {
        FloatComparison {
            rounding: RoundingModes::NEAREST_EVEN,
            ulp_tolerance: 0,
            _ne: NonExhaustive(()),
        }
    }
}

/// How observed image contents are compared against the oracle.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageComparison {
    /// The largest per-channel difference that still counts as a match.
    ///
    /// The default value is `1.0 / 255.0`, one step of an 8-bit normalized channel.
    pub channel_threshold: f32,

    /// The fraction of pixels that may mismatch before the comparison fails.
    ///
    /// The default value is `0.0`: every pixel must match.
    pub allowed_mismatch_ratio: f64,

    pub _ne: NonExhaustive,
}

impl Default for ImageComparison {
    #[inline]
    fn default() -> Self {
        ImageComparison {
            channel_threshold: 1.0 / 255.0,
            allowed_mismatch_ratio: 0.0,
            _ne: NonExhaustive(()),
        }
    }
}

fn is_nan_bits(scalar: ScalarType, bytes: &[u8]) -> bool {
    match scalar {
        ScalarType::F16 => {
            let bits = u16::from_ne_bytes(bytes.try_into().unwrap());

            bits & 0x7c00 == 0x7c00 && bits & 0x03ff != 0
        }
        ScalarType::F32 => {
            let bits = u32::from_ne_bytes(bytes.try_into().unwrap());

            bits & 0x7f80_0000 == 0x7f80_0000 && bits & 0x007f_ffff != 0
        }
        ScalarType::F64 => {
            let bits = u64::from_ne_bytes(bytes.try_into().unwrap());

            bits & 0x7ff0_0000_0000_0000 == 0x7ff0_0000_0000_0000
                && bits & 0x000f_ffff_ffff_ffff != 0
        }
        _ => false,
    }
}

fn too_short(
    index: usize,
    scalar: ScalarType,
    needed: usize,
    observed_len: usize,
) -> VerificationOutcome {
    VerificationOutcome::fail(
        index,
        format!(
            "the observed buffer is {} bytes but value {} of type {:?} ends at byte {}",
            observed_len, index, scalar, needed,
        ),
    )
}

/// Compares an observed buffer against the expected outputs of a case list, bit for bit.
///
/// Each expected value is read from the observed buffer at the byte offset the case list
/// assigned to it; padding lanes between values are not compared. A NaN expected value matches
/// any NaN bit pattern of the same width.
pub fn verify_buffer<T>(observed: &[u8], cases: &CaseList<T>) -> VerificationOutcome
where
    T: CaseValue,
{
    let size = T::SCALAR_TYPE.size() as usize;

    for (index, case) in cases.cases().iter().enumerate() {
        let offset = case.offset as usize;

        if observed.len() < offset + size {
            return too_short(index, T::SCALAR_TYPE, offset + size, observed.len());
        }

        let observed_bytes = &observed[offset..offset + size];
        let expected_bytes = bytemuck::bytes_of(&case.expected);

        if observed_bytes == expected_bytes {
            continue;
        }

        if is_nan_bits(T::SCALAR_TYPE, observed_bytes)
            && is_nan_bits(T::SCALAR_TYPE, expected_bytes)
        {
            continue;
        }

        let observed_value: T = bytemuck::pod_read_unaligned(observed_bytes);

        return VerificationOutcome::fail(
            index,
            format!(
                "value {} (inputs {:?}) at byte offset {}: observed {:?}, expected {:?}",
                index, case.inputs, offset, observed_value, case.expected,
            ),
        );
    }

    VerificationOutcome::pass(cases.len())
}

/// A 16-bit integer type whose stores a device may read back through a 32-bit access.
pub trait WidenedReadback: CaseValue {
    /// The 32-bit scalar type the observed buffer is laid out with.
    const WIDENED: ScalarType;

    /// The bits of the value after the 32-bit store, sign- or zero-extended per the
    /// signedness of this type.
    fn widened_bits(self) -> u32;
}

impl WidenedReadback for i16 {
    const WIDENED: ScalarType = ScalarType::I32;

    #[inline]
    fn widened_bits(self) -> u32 {
        self as i32 as u32
    }
}

impl WidenedReadback for u16 {
    const WIDENED: ScalarType = ScalarType::U32;

    #[inline]
    fn widened_bits(self) -> u32 {
        self as u32
    }
}

/// Compares a buffer of 32-bit stores against the 16-bit expected outputs of a case list.
///
/// The observed buffer is laid out for the 32-bit type under the case list's packing rule;
/// each observed value must equal the expected value sign-extended (for `i16`) or
/// zero-extended (for `u16`).
pub fn verify_widened_buffer<T>(
    observed: &[u8],
    cases: &CaseList<T>,
) -> Result<VerificationOutcome, LayoutError>
where
    T: WidenedReadback,
{
    let td = TypeDescriptor::vector(T::WIDENED, cases.type_descriptor().components);
    let stride = cases.packing_rule().array_stride(td)? as usize;
    let lanes = td.components as usize;
    let size = T::WIDENED.size() as usize;

    for (index, case) in cases.cases().iter().enumerate() {
        let offset = (index / lanes) * stride + (index % lanes) * size;

        if observed.len() < offset + size {
            return Ok(too_short(index, T::WIDENED, offset + size, observed.len()));
        }

        let observed_bits =
            u32::from_ne_bytes(observed[offset..offset + size].try_into().unwrap());
        let expected_bits = case.expected.widened_bits();

        if observed_bits != expected_bits {
            return Ok(VerificationOutcome::fail(
                index,
                format!(
                    "value {} (inputs {:?}) at byte offset {}: observed 0x{:08x}, expected \
                    0x{:08x} ({:?} widened to 32 bits)",
                    index, case.inputs, offset, observed_bits, expected_bits, case.expected,
                ),
            ));
        }
    }

    Ok(VerificationOutcome::pass(cases.len()))
}

fn f16_rank(bits: u16) -> i32 {
    if bits & 0x8000 != 0 {
        -((bits & 0x7fff) as i32)
    } else {
        (bits & 0x7fff) as i32
    }
}

fn f32_rank(bits: u32) -> i64 {
    if bits & 0x8000_0000 != 0 {
        -((bits & 0x7fff_ffff) as i64)
    } else {
        (bits & 0x7fff_ffff) as i64
    }
}

fn f16_matches(observed: u16, expected: f32, comparison: &FloatComparison) -> bool {
    let observed_nan = is_nan_bits(ScalarType::F16, &observed.to_ne_bytes());

    if expected.is_nan() {
        return observed_nan;
    }
    if observed_nan {
        return false;
    }

    let mut candidates = SmallVec::<[f16; 2]>::new();

    if comparison.rounding.contains(RoundingModes::TOWARD_ZERO) {
        candidates.push(f16_from_f32_rtz(expected));
    }
    if comparison.rounding.contains(RoundingModes::NEAREST_EVEN) {
        candidates.push(f16_from_f32_rte(expected));
    }

    candidates.iter().any(|candidate| {
        let bits = candidate.to_bits();

        bits == observed
            || (comparison.ulp_tolerance > 0
                && !candidate.is_nan()
                && f16_rank(bits).abs_diff(f16_rank(observed)) <= comparison.ulp_tolerance)
    })
}

fn f32_matches(observed: u32, expected: f64, comparison: &FloatComparison) -> bool {
    let observed_nan = is_nan_bits(ScalarType::F32, &observed.to_ne_bytes());

    if expected.is_nan() {
        return observed_nan;
    }
    if observed_nan {
        return false;
    }

    let mut candidates = SmallVec::<[f32; 2]>::new();

    if comparison.rounding.contains(RoundingModes::TOWARD_ZERO) {
        candidates.push(f32_from_f64_rtz(expected));
    }
    if comparison.rounding.contains(RoundingModes::NEAREST_EVEN) {
        candidates.push(f32_from_f64_rte(expected));
    }

    candidates.iter().any(|candidate| {
        let bits = candidate.to_bits();

        bits == observed
            || (comparison.ulp_tolerance > 0
                && !candidate.is_nan()
                && f32_rank(bits).abs_diff(f32_rank(observed)) <= comparison.ulp_tolerance as u64)
    })
}

/// Compares a buffer of binary16 stores against a case list whose oracle computed at binary32.
///
/// The observed buffer is laid out for the 16-bit type under the case list's packing rule. An
/// observed value passes if it equals the expected value rounded under any permitted mode,
/// within the comparison's ULP tolerance.
pub fn verify_reduced_f16(
    observed: &[u8],
    cases: &CaseList<f32>,
    comparison: &FloatComparison,
) -> Result<VerificationOutcome, LayoutError> {
    let td = TypeDescriptor::vector(ScalarType::F16, cases.type_descriptor().components);
    let stride = cases.packing_rule().array_stride(td)? as usize;
    let lanes = td.components as usize;
    let size = ScalarType::F16.size() as usize;

    for (index, case) in cases.cases().iter().enumerate() {
        let offset = (index / lanes) * stride + (index % lanes) * size;

        if observed.len() < offset + size {
            return Ok(too_short(index, ScalarType::F16, offset + size, observed.len()));
        }

        let observed_bits =
            u16::from_ne_bytes(observed[offset..offset + size].try_into().unwrap());

        if !f16_matches(observed_bits, case.expected, comparison) {
            return Ok(VerificationOutcome::fail(
                index,
                format!(
                    "value {} (inputs {:?}) at byte offset {}: observed {:?} (0x{:04x}) does \
                    not match {:?} under rounding modes {:?}",
                    index,
                    case.inputs,
                    offset,
                    f16::from_bits(observed_bits),
                    observed_bits,
                    case.expected,
                    comparison.rounding,
                ),
            ));
        }
    }

    Ok(VerificationOutcome::pass(cases.len()))
}

/// Compares a buffer of binary32 stores against a case list whose oracle computed at binary64.
///
/// The counterpart of [`verify_reduced_f16`] for devices narrowing doubles to floats.
pub fn verify_reduced_f32(
    observed: &[u8],
    cases: &CaseList<f64>,
    comparison: &FloatComparison,
) -> Result<VerificationOutcome, LayoutError> {
    let td = TypeDescriptor::vector(ScalarType::F32, cases.type_descriptor().components);
    let stride = cases.packing_rule().array_stride(td)? as usize;
    let lanes = td.components as usize;
    let size = ScalarType::F32.size() as usize;

    for (index, case) in cases.cases().iter().enumerate() {
        let offset = (index / lanes) * stride + (index % lanes) * size;

        if observed.len() < offset + size {
            return Ok(too_short(index, ScalarType::F32, offset + size, observed.len()));
        }

        let observed_bits =
            u32::from_ne_bytes(observed[offset..offset + size].try_into().unwrap());

        if !f32_matches(observed_bits, case.expected, comparison) {
            return Ok(VerificationOutcome::fail(
                index,
                format!(
                    "value {} (inputs {:?}) at byte offset {}: observed {:?} (0x{:08x}) does \
                    not match {:?} under rounding modes {:?}",
                    index,
                    case.inputs,
                    offset,
                    f32::from_bits(observed_bits),
                    observed_bits,
                    case.expected,
                    comparison.rounding,
                ),
            ));
        }
    }

    Ok(VerificationOutcome::pass(cases.len()))
}

/// Compares two images of RGBA pixels with a per-channel threshold.
///
/// A pixel mismatches if any channel differs by more than the threshold. The comparison passes
/// if the fraction of mismatching pixels does not exceed the allowed ratio, which is zero for
/// exact tests.
///
/// # Panics
///
/// Panics if the slices differ in length or are not a whole number of RGBA pixels.
pub fn verify_image(
    observed: &[f32],
    expected: &[f32],
    comparison: &ImageComparison,
) -> VerificationOutcome {
    assert_eq!(
        observed.len(),
        expected.len(),
        "the observed and expected images must have the same size",
    );
    assert_eq!(
        observed.len() % 4,
        0,
        "images are compared as whole RGBA pixels",
    );

    let pixel_count = observed.len() / 4;
    let mut mismatched = 0;
    let mut first_mismatch = None;

    for (index, (observed, expected)) in observed
        .chunks_exact(4)
        .zip(expected.chunks_exact(4))
        .enumerate()
    {
        let matches = observed
            .iter()
            .zip(expected)
            .all(|(&o, &e)| (o - e).abs() <= comparison.channel_threshold);

        if !matches {
            mismatched += 1;

            if first_mismatch.is_none() {
                first_mismatch = Some((index, observed.to_vec(), expected.to_vec()));
            }
        }
    }

    let ratio = if pixel_count == 0 {
        0.0
    } else {
        mismatched as f64 / pixel_count as f64
    };

    if ratio <= comparison.allowed_mismatch_ratio {
        return VerificationOutcome::pass(pixel_count);
    }

    let (index, observed, expected) = first_mismatch.unwrap();

    VerificationOutcome::fail(
        index,
        format!(
            "{} of {} pixels mismatch (allowed ratio {}); first at pixel {}: observed {:?}, \
            expected {:?}",
            mismatched, pixel_count, comparison.allowed_mismatch_ratio, index, observed, expected,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cases::CaseGenerator,
        domain::Domain,
        layout::PackingRule,
        rounding::{f16_from_f32_rte, f16_from_f32_rtz},
    };

    fn i16_list(rule: PackingRule) -> CaseList<i16> {
        CaseGenerator::new(
            "verify.negate.i16",
            TypeDescriptor::scalar(ScalarType::I16),
            rule,
        )
        .generate(
            &[&Domain::from_values([0i16, -3221, 3210, i16::MIN])],
            |_| true,
            |v| v[0].wrapping_neg(),
        )
        .unwrap()
    }

    #[test]
    fn matching_integer_buffer_passes() {
        let list = i16_list(PackingRule::Tight);
        let outcome = verify_buffer(&list.expected_bytes(), &list);

        assert!(outcome.pass);
        assert_eq!(outcome.first_mismatch, None);
    }

    #[test]
    fn first_mismatching_element_is_pinpointed() {
        let list = i16_list(PackingRule::Tight);
        let mut observed = list.expected_bytes();
        // Corrupt the third value.
        observed[4] ^= 0xff;

        let outcome = verify_buffer(&observed, &list);
        assert!(!outcome.pass);
        assert_eq!(outcome.first_mismatch, Some(2));
        assert!(outcome.message.contains("value 2"));
    }

    #[test]
    fn padding_lanes_are_not_compared() {
        let domain = Domain::from_values([1.0f32, 2.0, 3.0]);
        let list = CaseGenerator::new(
            "verify.identity.f32vec3",
            TypeDescriptor::vector(ScalarType::F32, 3),
            PackingRule::Tight,
        )
        .generate(&[&domain], |_| true, |v| v[0])
        .unwrap();

        let mut observed = list.expected_bytes();
        // Garbage in the fourth lane must not affect the verdict.
        observed[12..16].fill(0xa5);

        assert!(verify_buffer(&observed, &list).pass);
    }

    #[test]
    fn nan_matches_any_nan_of_the_same_width() {
        let domain = Domain::from_values([f32::NAN]);
        let list = CaseGenerator::new(
            "verify.nan.f32",
            TypeDescriptor::scalar(ScalarType::F32),
            PackingRule::Tight,
        )
        .generate(&[&domain], |_| true, |v| v[0])
        .unwrap();

        // A NaN with a different payload and sign.
        let observed = 0xffc0_1234u32.to_ne_bytes().to_vec();
        assert!(verify_buffer(&observed, &list).pass);

        // Infinity is not NaN.
        let observed = 0x7f80_0000u32.to_ne_bytes().to_vec();
        assert!(!verify_buffer(&observed, &list).pass);
    }

    #[test]
    fn short_buffer_fails_instead_of_panicking() {
        let list = i16_list(PackingRule::Tight);
        let observed = list.expected_bytes();

        let outcome = verify_buffer(&observed[..observed.len() - 2], &list);
        assert!(!outcome.pass);
        assert_eq!(outcome.first_mismatch, Some(list.len() - 1));
    }

    #[test]
    fn widened_readback_sign_extends_signed_values() {
        let list = i16_list(PackingRule::Tight);
        let observed: Vec<u8> = list
            .cases()
            .iter()
            .flat_map(|case| (case.expected as i32).to_ne_bytes())
            .collect();

        assert!(verify_widened_buffer(&observed, &list).unwrap().pass);

        // Zero-extending a negative value instead must be reported as a mismatch.
        let observed: Vec<u8> = list
            .cases()
            .iter()
            .flat_map(|case| (case.expected as u16 as u32).to_ne_bytes())
            .collect();

        let outcome = verify_widened_buffer(&observed, &list).unwrap();
        assert!(!outcome.pass);
    }

    #[test]
    fn widened_readback_zero_extends_unsigned_values() {
        let domain = Domain::from_values([0u16, 1, 0x8000, u16::MAX]);
        let list = CaseGenerator::new(
            "verify.identity.u16",
            TypeDescriptor::scalar(ScalarType::U16),
            PackingRule::Tight,
        )
        .generate(&[&domain], |_| true, |v| v[0])
        .unwrap();

        let observed: Vec<u8> = list
            .cases()
            .iter()
            .flat_map(|case| u32::from(case.expected).to_ne_bytes())
            .collect();

        assert!(verify_widened_buffer(&observed, &list).unwrap().pass);
    }

    fn f16_conversion_list(value: f32) -> CaseList<f32> {
        CaseGenerator::new(
            "verify.convert.f16",
            TypeDescriptor::scalar(ScalarType::F32),
            PackingRule::Tight,
        )
        .generate(&[&Domain::from_values([value])], |_| true, |v| v[0])
        .unwrap()
    }

    #[test]
    fn either_rounding_mode_accepts_both_roundings() {
        // 2049.5 rounds to 2048 under RTZ and 2050 under RTE.
        let list = f16_conversion_list(2049.5);
        let comparison = FloatComparison {
            rounding: RoundingModes::either(),
            ..Default::default()
        };

        for convert in [f16_from_f32_rtz, f16_from_f32_rte] {
            let observed = convert(2049.5).to_bits().to_ne_bytes().to_vec();
            assert!(verify_reduced_f16(&observed, &list, &comparison)
                .unwrap()
                .pass);
        }
    }

    #[test]
    fn rte_only_comparator_rejects_an_rtz_rounded_value() {
        let list = f16_conversion_list(2049.5);
        let comparison = FloatComparison::default();
        assert_eq!(comparison.rounding, RoundingModes::NEAREST_EVEN);

        let observed = f16_from_f32_rtz(2049.5).to_bits().to_ne_bytes().to_vec();
        let outcome = verify_reduced_f16(&observed, &list, &comparison).unwrap();
        assert!(!outcome.pass);
        assert_eq!(outcome.first_mismatch, Some(0));

        let observed = f16_from_f32_rte(2049.5).to_bits().to_ne_bytes().to_vec();
        assert!(verify_reduced_f16(&observed, &list, &comparison)
            .unwrap()
            .pass);
    }

    #[test]
    fn ulp_tolerance_widens_the_accepted_range() {
        let list = f16_conversion_list(2049.5);
        let exact = f16_from_f32_rte(2049.5).to_bits();
        let one_off = exact - 1;

        let strict = FloatComparison::default();
        let observed = one_off.to_ne_bytes().to_vec();
        assert!(!verify_reduced_f16(&observed, &list, &strict).unwrap().pass);

        let tolerant = FloatComparison {
            ulp_tolerance: 1,
            ..Default::default()
        };
        assert!(verify_reduced_f16(&observed, &list, &tolerant)
            .unwrap()
            .pass);
    }

    #[test]
    fn reduced_f16_nan_accepts_any_nan() {
        let list = f16_conversion_list(f32::NAN);
        let comparison = FloatComparison::default();

        let observed = 0x7e01u16.to_ne_bytes().to_vec();
        assert!(verify_reduced_f16(&observed, &list, &comparison)
            .unwrap()
            .pass);

        let observed = f16::INFINITY.to_bits().to_ne_bytes().to_vec();
        assert!(!verify_reduced_f16(&observed, &list, &comparison)
            .unwrap()
            .pass);
    }

    #[test]
    fn reduced_f32_accepts_permitted_roundings_only() {
        // 1 + 3 * 2^-25 truncates to 1.0 under RTZ and rounds up under RTE.
        let value = 1.0f64 + 3.0 * 2.0f64.powi(-25);
        let list = CaseGenerator::new(
            "verify.convert.f32",
            TypeDescriptor::scalar(ScalarType::F64),
            PackingRule::Tight,
        )
        .generate(&[&Domain::from_values([value])], |_| true, |v| v[0])
        .unwrap();

        let comparison = FloatComparison {
            rounding: RoundingModes::TOWARD_ZERO,
            ..Default::default()
        };

        let observed = 1.0f32.to_bits().to_ne_bytes().to_vec();
        assert!(verify_reduced_f32(&observed, &list, &comparison)
            .unwrap()
            .pass);

        let observed = (1.0f32 + 2.0f32.powi(-23)).to_bits().to_ne_bytes().to_vec();
        assert!(!verify_reduced_f32(&observed, &list, &comparison)
            .unwrap()
            .pass);
    }

    #[test]
    fn image_comparison_pinpoints_the_first_bad_pixel() {
        let expected = vec![0.5f32; 16];
        let mut observed = expected.clone();
        observed[9] += 0.1;

        let outcome = verify_image(&observed, &expected, &ImageComparison::default());
        assert!(!outcome.pass);
        assert_eq!(outcome.first_mismatch, Some(2));

        let outcome = verify_image(&expected, &expected, &ImageComparison::default());
        assert!(outcome.pass);
    }

    #[test]
    fn image_comparison_tolerates_a_bounded_mismatch_fraction() {
        let expected = vec![0.25f32; 40];
        let mut observed = expected.clone();
        observed[0] = 1.0;

        let exact = ImageComparison::default();
        assert!(!verify_image(&observed, &expected, &exact).pass);

        let fuzzy = ImageComparison {
            allowed_mismatch_ratio: 0.1,
            ..Default::default()
        };
        assert!(verify_image(&observed, &expected, &fuzzy).pass);
    }

    #[test]
    fn channel_threshold_absorbs_small_differences() {
        let expected = vec![0.5f32; 8];
        let mut observed = expected.clone();
        observed[3] += 1.0 / 512.0;

        assert!(verify_image(&observed, &expected, &ImageComparison::default()).pass);
    }
}
