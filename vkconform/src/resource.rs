// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Buffers as the pipeline sees them.
//!
//! A [`BufferResource`] pairs raw bytes with the descriptor kind they are bound as and the
//! packing rule they were flattened with. The resource is owned by the test group that created
//! it and moves by value into the pipeline for the one execution it participates in.

use crate::layout::PackingRule;

/// Classification of a device-visible buffer's binding semantics.
///
/// Each kind comes with a fixed packing rule; getting the rule wrong makes the device read
/// different bytes than the host wrote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// A uniform buffer, read-only to shaders, laid out with the padded rule.
    UniformBuffer,
    /// A storage buffer, readable and writable by shaders, laid out with the tight rule.
    StorageBuffer,
    /// A push-constant range, laid out with the tight rule and limited in size by the device.
    PushConstant,
}

impl DescriptorKind {
    /// Returns the packing rule buffers of this kind are laid out with.
    #[inline]
    pub const fn packing_rule(self) -> PackingRule {
        match self {
            DescriptorKind::UniformBuffer => PackingRule::Padded,
            DescriptorKind::StorageBuffer | DescriptorKind::PushConstant => PackingRule::Tight,
        }
    }
}

/// A typed buffer ready to be bound as a pipeline resource.
#[derive(Clone, Debug)]
pub struct BufferResource {
    /// The binding index the shader declares for this buffer.
    pub binding: u32,
    /// The descriptor kind the buffer is bound as.
    pub kind: DescriptorKind,
    /// The flattened contents.
    pub bytes: Vec<u8>,
    /// The packing rule `bytes` was flattened with.
    pub rule: PackingRule,
}

impl BufferResource {
    /// Creates a resource with the packing rule implied by its descriptor kind.
    #[inline]
    pub fn new(binding: u32, kind: DescriptorKind, bytes: Vec<u8>) -> Self {
        BufferResource {
            binding,
            kind,
            bytes,
            rule: kind.packing_rule(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_kinds_imply_their_packing_rule() {
        assert_eq!(
            DescriptorKind::UniformBuffer.packing_rule(),
            PackingRule::Padded,
        );
        assert_eq!(
            DescriptorKind::StorageBuffer.packing_rule(),
            PackingRule::Tight,
        );
        assert_eq!(
            DescriptorKind::PushConstant.packing_rule(),
            PackingRule::Tight,
        );

        let resource = BufferResource::new(0, DescriptorKind::UniformBuffer, vec![0; 16]);
        assert_eq!(resource.rule, PackingRule::Padded);
    }
}
