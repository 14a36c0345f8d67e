// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Memory layout of typed values inside device-visible buffers.
//!
//! The layout of buffer contents is not necessarily what one would expect from the type
//! signature in the shader code. Uniform blocks use the *extended* (std140-style) rules, which
//! round array strides up to 16 bytes, while storage blocks and push constants use the *base*
//! (std430-style) rules. Both rule sets share the most important quirk: a three-component
//! vector occupies the stride of a four-component vector when used as an array element.
//! Writing host data with the wrong stride makes the device read different bytes than the host
//! wrote, silently corrupting every element after the first mismatch, so everything in this
//! crate that flattens or walks a buffer goes through this module.
//!
//! [`PackingRule`] computes alignments and strides for scalars and vectors described by a
//! [`TypeDescriptor`]. [`CompositeLayout`] extends the same arithmetic to matrices, arrays and
//! nested structs, where offsets propagate recursively.

use crate::DeviceSize;
use std::{
    error::Error,
    fmt::{Display, Error as FmtError, Formatter},
};

/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two, which holds for every alignment either packing rule
/// produces.
pub(crate) const fn align_up(value: DeviceSize, alignment: DeviceSize) -> DeviceSize {
    (value + alignment - 1) & !(alignment - 1)
}

/// A scalar numeric type that can appear in a shader interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarType {
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit unsigned integer.
    U64,
    /// 16-bit floating point (binary16).
    F16,
    /// 32-bit floating point (binary32).
    F32,
    /// 64-bit floating point (binary64).
    F64,
}

impl ScalarType {
    /// Returns the size of one scalar of this type in bytes.
    #[inline]
    pub const fn size(self) -> DeviceSize {
        match self {
            ScalarType::I16 | ScalarType::U16 | ScalarType::F16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => 8,
        }
    }

    /// Returns whether this is a signed integer type.
    #[inline]
    pub const fn is_signed_int(self) -> bool {
        matches!(self, ScalarType::I16 | ScalarType::I32 | ScalarType::I64)
    }

    /// Returns whether this is an unsigned integer type.
    #[inline]
    pub const fn is_unsigned_int(self) -> bool {
        matches!(self, ScalarType::U16 | ScalarType::U32 | ScalarType::U64)
    }

    /// Returns whether this is a floating-point type.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, ScalarType::F16 | ScalarType::F32 | ScalarType::F64)
    }
}

/// A scalar or vector type as it appears in a shader interface.
///
/// `components` must be between 1 and 4 inclusive; the packing-rule operations report a
/// [`LayoutError`] for anything else.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    /// The component scalar type.
    pub scalar: ScalarType,
    /// The number of components, between 1 (a scalar) and 4.
    pub components: u32,
}

impl TypeDescriptor {
    /// Describes a single scalar of the given type.
    #[inline]
    pub const fn scalar(scalar: ScalarType) -> Self {
        TypeDescriptor {
            scalar,
            components: 1,
        }
    }

    /// Describes a vector with the given number of components.
    #[inline]
    pub const fn vector(scalar: ScalarType, components: u32) -> Self {
        TypeDescriptor { scalar, components }
    }

    fn validate(&self) -> Result<(), LayoutError> {
        if !(1..=4).contains(&self.components) {
            return Err(LayoutError::ComponentCountOutOfRange {
                components: self.components,
            });
        }

        Ok(())
    }

    /// Returns the number of bytes the components occupy, without any trailing padding.
    pub fn byte_size(&self) -> Result<DeviceSize, LayoutError> {
        self.validate()?;

        Ok(self.scalar.size() * self.components as DeviceSize)
    }
}

/// The packing rule that governs how typed values are laid out inside a buffer.
///
/// For every type, the stride under [`Padded`](PackingRule::Padded) is at least the stride
/// under [`Tight`](PackingRule::Tight), and for both rules a three-component vector has the
/// array stride of the four-component vector of the same scalar type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PackingRule {
    /// Natural alignment with no padding beyond the three-component vector rule. This is what
    /// storage buffers and push constants use.
    Tight,
    /// Array and composite strides are additionally rounded up to 16 bytes. This is what
    /// uniform buffers use.
    Padded,
}

impl PackingRule {
    /// Returns the base alignment of the type in bytes.
    ///
    /// A two-component vector aligns to twice the scalar size; three- and four-component
    /// vectors align to four times the scalar size.
    pub fn base_alignment(self, td: TypeDescriptor) -> Result<DeviceSize, LayoutError> {
        td.validate()?;

        let components = match td.components {
            1 => 1,
            2 => 2,
            3 | 4 => 4,
            _ => unreachable!(),
        };

        Ok(td.scalar.size() * components)
    }

    /// Returns the alignment of the type when used as an array element.
    ///
    /// Under the padded rule this is the base alignment rounded up to 16 bytes.
    pub fn array_element_alignment(self, td: TypeDescriptor) -> Result<DeviceSize, LayoutError> {
        let base = self.base_alignment(td)?;

        Ok(match self {
            PackingRule::Tight => base,
            PackingRule::Padded => align_up(base, 16),
        })
    }

    /// Returns the distance in bytes between consecutive array elements of the type.
    pub fn array_stride(self, td: TypeDescriptor) -> Result<DeviceSize, LayoutError> {
        let size = td.byte_size()?;
        let alignment = self.array_element_alignment(td)?;

        Ok(align_up(size, alignment))
    }

    /// Rounds a composite alignment up as the rule requires.
    fn composite_alignment(self, alignment: DeviceSize) -> DeviceSize {
        match self {
            PackingRule::Tight => alignment,
            PackingRule::Padded => align_up(alignment, 16),
        }
    }
}

/// A composite type laid out inside a buffer: a vector, a matrix, an array or a struct.
///
/// Matrices are modeled as arrays of column vectors, so the matrix stride is the column
/// vector's array stride under the active rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompositeLayout {
    /// A scalar or vector.
    Vector(TypeDescriptor),
    /// A matrix with `columns` columns of `rows`-component column vectors.
    Matrix {
        scalar: ScalarType,
        columns: u32,
        rows: u32,
    },
    /// An array of `len` elements.
    Array {
        element: Box<CompositeLayout>,
        len: DeviceSize,
    },
    /// A struct with the given members, in declaration order.
    Struct { members: Vec<CompositeLayout> },
}

impl CompositeLayout {
    fn column_vector(&self) -> Result<TypeDescriptor, LayoutError> {
        match *self {
            CompositeLayout::Matrix {
                scalar,
                columns,
                rows,
            } => {
                if !(2..=4).contains(&columns) {
                    return Err(LayoutError::MatrixColumnCountOutOfRange { columns });
                }

                let column = TypeDescriptor::vector(scalar, rows);
                column.validate()?;

                Ok(column)
            }
            _ => unreachable!(),
        }
    }

    /// Returns the alignment of this type in bytes under the given rule.
    ///
    /// Struct alignment is the maximum member alignment; under the padded rule, matrix, array
    /// and struct alignments are rounded up to 16 bytes.
    pub fn alignment(&self, rule: PackingRule) -> Result<DeviceSize, LayoutError> {
        match self {
            CompositeLayout::Vector(td) => rule.base_alignment(*td),
            CompositeLayout::Matrix { .. } => {
                rule.array_element_alignment(self.column_vector()?)
            }
            CompositeLayout::Array { element, len } => {
                if *len == 0 {
                    return Err(LayoutError::ZeroLengthArray);
                }

                Ok(rule.composite_alignment(element.alignment(rule)?))
            }
            CompositeLayout::Struct { members } => {
                if members.is_empty() {
                    return Err(LayoutError::EmptyStruct);
                }

                let mut alignment = 1;

                for member in members {
                    alignment = DeviceSize::max(alignment, member.alignment(rule)?);
                }

                Ok(rule.composite_alignment(alignment))
            }
        }
    }

    /// Returns the size of this type in bytes under the given rule, including internal padding.
    ///
    /// Vector sizes are not padded out to their array stride; everything composite is, so that
    /// a composite's size is also its contribution to a containing struct or array.
    pub fn size(&self, rule: PackingRule) -> Result<DeviceSize, LayoutError> {
        match self {
            CompositeLayout::Vector(td) => td.byte_size(),
            CompositeLayout::Matrix { columns, .. } => {
                let column_stride = rule.array_stride(self.column_vector()?)?;

                Ok(column_stride * *columns as DeviceSize)
            }
            CompositeLayout::Array { element, len } => {
                if *len == 0 {
                    return Err(LayoutError::ZeroLengthArray);
                }

                Ok(element.array_stride(rule)? * len)
            }
            CompositeLayout::Struct { .. } => {
                let end = self.end_offset(rule)?;

                Ok(align_up(end, self.alignment(rule)?))
            }
        }
    }

    /// Returns the distance in bytes between consecutive array elements of this type.
    pub fn array_stride(&self, rule: PackingRule) -> Result<DeviceSize, LayoutError> {
        match self {
            CompositeLayout::Vector(td) => rule.array_stride(*td),
            _ => {
                let size = self.size(rule)?;

                Ok(align_up(size, self.alignment(rule)?))
            }
        }
    }

    /// Returns the byte offset of the member with the given index.
    ///
    /// Only structs have member offsets; any other layout reports
    /// [`LayoutError::NotAStruct`].
    pub fn offset_of_member(
        &self,
        rule: PackingRule,
        index: usize,
    ) -> Result<DeviceSize, LayoutError> {
        let members = match self {
            CompositeLayout::Struct { members } => members,
            _ => return Err(LayoutError::NotAStruct),
        };

        if index >= members.len() {
            return Err(LayoutError::MemberOutOfRange {
                index,
                member_count: members.len(),
            });
        }

        let mut offset = 0;

        for member in &members[..index] {
            offset = align_up(offset, member.alignment(rule)?);
            offset += member.size(rule)?;
        }

        offset = align_up(offset, members[index].alignment(rule)?);

        Ok(offset)
    }

    /// Offset just past the last member, before rounding up to the struct alignment.
    fn end_offset(&self, rule: PackingRule) -> Result<DeviceSize, LayoutError> {
        let members = match self {
            CompositeLayout::Struct { members } => members,
            _ => unreachable!(),
        };

        if members.is_empty() {
            return Err(LayoutError::EmptyStruct);
        }

        let last = members.len() - 1;
        let offset = self.offset_of_member(rule, last)?;

        Ok(offset + members[last].size(rule)?)
    }
}

/// Error that can happen when computing a buffer layout.
///
/// Always fatal to the calling test: it indicates a configuration bug, never a transient
/// condition, so the caller must not retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutError {
    /// The component count of a type descriptor is not between 1 and 4.
    ComponentCountOutOfRange {
        /// The offending component count.
        components: u32,
    },

    /// The column count of a matrix is not between 2 and 4.
    MatrixColumnCountOutOfRange {
        /// The offending column count.
        columns: u32,
    },

    /// An array layout has no elements.
    ZeroLengthArray,

    /// A struct layout has no members.
    EmptyStruct,

    /// A member offset was requested past the end of a struct.
    MemberOutOfRange {
        /// The requested member index.
        index: usize,
        /// The number of members the struct has.
        member_count: usize,
    },

    /// A member offset was requested on a layout that is not a struct.
    NotAStruct,
}

impl Error for LayoutError {}

impl Display for LayoutError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            LayoutError::ComponentCountOutOfRange { components } => write!(
                f,
                "the component count {} is outside the supported range of 1 to 4",
                components,
            ),
            LayoutError::MatrixColumnCountOutOfRange { columns } => write!(
                f,
                "the matrix column count {} is outside the supported range of 2 to 4",
                columns,
            ),
            LayoutError::ZeroLengthArray => write!(f, "the array layout has no elements"),
            LayoutError::EmptyStruct => write!(f, "the struct layout has no members"),
            LayoutError::MemberOutOfRange {
                index,
                member_count,
            } => write!(
                f,
                "the member index {} is out of range for a struct with {} members",
                index, member_count,
            ),
            LayoutError::NotAStruct => {
                write!(f, "a member offset was requested on a non-struct layout")
            }
        }
    }
}
