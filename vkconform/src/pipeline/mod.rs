// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Describing a pipeline before it is built.
//!
//! A [`PipelineSpec`] maps shader stages to entry points in opaque shader blobs. The harness
//! never inspects the blob contents; it compiles them through the device and checks the
//! declared resource bindings against what the test actually binds. Graphics pipelines need at
//! least a vertex and a fragment stage, compute pipelines exactly one compute stage; these
//! requirements are validated before any device work happens.

pub mod runner;

use crate::{resource::DescriptorKind, NonExhaustive};
use std::{
    collections::BTreeMap,
    error::Error,
    fmt::{Debug, Display, Error as FmtError, Formatter},
    ops::{BitOr, BitOrAssign},
    sync::Arc,
};

/// A shader stage within a pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
}

/// A set of [`ShaderStage`] values.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ShaderStages(u32);

impl ShaderStages {
    pub const VERTEX: Self = ShaderStages(1 << 0);
    pub const TESSELLATION_CONTROL: Self = ShaderStages(1 << 1);
    pub const TESSELLATION_EVALUATION: Self = ShaderStages(1 << 2);
    pub const GEOMETRY: Self = ShaderStages(1 << 3);
    pub const FRAGMENT: Self = ShaderStages(1 << 4);
    pub const COMPUTE: Self = ShaderStages(1 << 5);

    /// Returns a `ShaderStages` with no stages set.
    #[inline]
    pub const fn empty() -> Self {
        ShaderStages(0)
    }

    /// Returns a `ShaderStages` with all graphics stages set.
    #[inline]
    pub const fn all_graphics() -> Self {
        ShaderStages::VERTEX
            .union(ShaderStages::TESSELLATION_CONTROL)
            .union(ShaderStages::TESSELLATION_EVALUATION)
            .union(ShaderStages::GEOMETRY)
            .union(ShaderStages::FRAGMENT)
    }

    /// Returns whether no stages are set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the union of `self` and `other`.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        ShaderStages(self.0 | other.0)
    }

    /// Returns the stages in `self` that are not in `other`.
    #[inline]
    pub const fn difference(self, other: Self) -> Self {
        ShaderStages(self.0 & !other.0)
    }

    /// Returns whether any stage is in both `self` and `other`.
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns whether all stages in `other` are also in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ShaderStages {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for ShaderStages {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl From<ShaderStage> for ShaderStages {
    #[inline]
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => ShaderStages::VERTEX,
            ShaderStage::TessellationControl => ShaderStages::TESSELLATION_CONTROL,
            ShaderStage::TessellationEvaluation => ShaderStages::TESSELLATION_EVALUATION,
            ShaderStage::Geometry => ShaderStages::GEOMETRY,
            ShaderStage::Fragment => ShaderStages::FRAGMENT,
            ShaderStage::Compute => ShaderStages::COMPUTE,
        }
    }
}

impl Debug for ShaderStages {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        if self.is_empty() {
            return write!(f, "empty()");
        }

        let mut first = true;

        for (flag, name) in [
            (ShaderStages::VERTEX, "VERTEX"),
            (ShaderStages::TESSELLATION_CONTROL, "TESSELLATION_CONTROL"),
            (
                ShaderStages::TESSELLATION_EVALUATION,
                "TESSELLATION_EVALUATION",
            ),
            (ShaderStages::GEOMETRY, "GEOMETRY"),
            (ShaderStages::FRAGMENT, "FRAGMENT"),
            (ShaderStages::COMPUTE, "COMPUTE"),
        ] {
            if self.intersects(flag) {
                if !first {
                    write!(f, " | ")?;
                }

                f.write_str(name)?;
                first = false;
            }
        }

        Ok(())
    }
}

/// The part of the pipeline a set of execution parameters targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineBindPoint {
    Graphics,
    Compute,
}

/// Parameters for one execution of a pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionParams {
    /// One draw call of a graphics pipeline.
    Draw {
        /// The number of vertices to draw.
        vertex_count: u32,
        /// The number of instances to draw.
        instance_count: u32,
    },
    /// One dispatch of a compute pipeline.
    Dispatch {
        /// The number of workgroups in each dimension.
        group_counts: [u32; 3],
    },
}

impl ExecutionParams {
    /// Returns the bind point this execution targets.
    #[inline]
    pub const fn bind_point(self) -> PipelineBindPoint {
        match self {
            ExecutionParams::Draw { .. } => PipelineBindPoint::Graphics,
            ExecutionParams::Dispatch { .. } => PipelineBindPoint::Compute,
        }
    }
}

/// An opaque shader module, as handed to the harness by the shader-authoring layer.
///
/// The harness does not parse `code`; the declared `bindings` come from whatever reflection
/// the authoring layer ran and are what pipeline building validates resources against.
#[derive(Clone, Debug, Default)]
pub struct ShaderBlob {
    /// The code words to hand to the device's compiler.
    pub code: Vec<u32>,
    /// The descriptor kind the module expects at each binding index it uses.
    pub bindings: BTreeMap<u32, DescriptorKind>,
}

/// One stage of a pipeline: a shader module and the entry point to execute in it.
#[derive(Clone, Debug)]
pub struct StageModule {
    /// The module containing the stage's code.
    pub module: Arc<ShaderBlob>,
    /// The name of the entry point.
    pub entry_point: String,
}

impl StageModule {
    /// Creates a `StageModule` for the given module and entry point.
    #[inline]
    pub fn new(module: Arc<ShaderBlob>, entry_point: impl Into<String>) -> Self {
        StageModule {
            module,
            entry_point: entry_point.into(),
        }
    }
}

/// Describes the stages of a pipeline to be built.
#[derive(Clone, Debug)]
pub struct PipelineSpec {
    /// The stages of the pipeline, each with its module and entry point.
    ///
    /// The default value is empty.
    pub stages: BTreeMap<ShaderStage, StageModule>,

    /// Stages that must be present for the owning test to be meaningful. Validation fails if
    /// any of them is absent from `stages`.
    ///
    /// The default value is [`ShaderStages::empty()`].
    pub required_stages: ShaderStages,

    pub _ne: NonExhaustive,
}

impl Default for PipelineSpec {
    #[inline]
    fn default() -> Self {
        PipelineSpec {
            stages: BTreeMap::new(),
            required_stages: ShaderStages::empty(),
            _ne: NonExhaustive(()),
        }
    }
}

impl PipelineSpec {
    /// Adds a stage, replacing any previous module for the same stage.
    #[inline]
    pub fn with_stage(mut self, stage: ShaderStage, module: StageModule) -> Self {
        self.stages.insert(stage, module);
        self
    }

    /// Returns the set of stages present in the spec.
    #[inline]
    pub fn stage_flags(&self) -> ShaderStages {
        self.stages
            .keys()
            .fold(ShaderStages::empty(), |flags, &stage| {
                flags | stage.into()
            })
    }

    /// Returns the bind point the spec's stages target, or `None` if there are no stages.
    #[inline]
    pub fn bind_point(&self) -> Option<PipelineBindPoint> {
        if self.stages.is_empty() {
            None
        } else if self.stage_flags().intersects(ShaderStages::COMPUTE) {
            Some(PipelineBindPoint::Compute)
        } else {
            Some(PipelineBindPoint::Graphics)
        }
    }

    /// Checks the stage requirements that must hold before the pipeline can be built.
    pub fn validate(&self) -> Result<(), PipelineSpecError> {
        let flags = self.stage_flags();

        if flags.is_empty() {
            return Err(PipelineSpecError::Empty);
        }

        if !flags.contains(self.required_stages) {
            return Err(PipelineSpecError::RequiredStagesMissing {
                missing: self.required_stages.difference(flags),
            });
        }

        if flags.intersects(ShaderStages::COMPUTE) {
            if self.stages.len() > 1 {
                return Err(PipelineSpecError::ComputeStageNotExclusive);
            }

            return Ok(());
        }

        if !flags.intersects(ShaderStages::VERTEX) {
            return Err(PipelineSpecError::MissingVertexStage);
        }

        if !flags.intersects(ShaderStages::FRAGMENT) {
            return Err(PipelineSpecError::MissingOutputStage);
        }

        let has_control = flags.intersects(ShaderStages::TESSELLATION_CONTROL);
        let has_evaluation = flags.intersects(ShaderStages::TESSELLATION_EVALUATION);

        if has_control != has_evaluation {
            let present = if has_control {
                ShaderStage::TessellationControl
            } else {
                ShaderStage::TessellationEvaluation
            };

            return Err(PipelineSpecError::UnpairedTessellationStages { present });
        }

        Ok(())
    }
}

/// Error that can happen when validating a [`PipelineSpec`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineSpecError {
    /// The spec contains no stages at all.
    Empty,

    /// A stage listed in `required_stages` is absent.
    RequiredStagesMissing {
        /// The required stages that are not present.
        missing: ShaderStages,
    },

    /// A compute stage is combined with other stages.
    ComputeStageNotExclusive,

    /// A graphics pipeline is missing its vertex stage.
    MissingVertexStage,

    /// No stage capable of producing visible output (fragment or compute) is present.
    MissingOutputStage,

    /// Only one of the two tessellation stages is present.
    UnpairedTessellationStages {
        /// The tessellation stage that is present without its counterpart.
        present: ShaderStage,
    },
}

impl Error for PipelineSpecError {}

impl Display for PipelineSpecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            PipelineSpecError::Empty => write!(f, "the pipeline spec contains no stages"),
            PipelineSpecError::RequiredStagesMissing { missing } => {
                write!(f, "the required stages {:?} are not present", missing)
            }
            PipelineSpecError::ComputeStageNotExclusive => write!(
                f,
                "a compute stage cannot be combined with any other stage",
            ),
            PipelineSpecError::MissingVertexStage => write!(
                f,
                "a graphics pipeline requires a vertex stage",
            ),
            PipelineSpecError::MissingOutputStage => write!(
                f,
                "no stage capable of producing visible output (fragment or compute) is present",
            ),
            PipelineSpecError::UnpairedTessellationStages { present } => write!(
                f,
                "the {:?} stage requires its tessellation counterpart",
                present,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(entry_point: &str) -> StageModule {
        StageModule::new(Arc::new(ShaderBlob::default()), entry_point)
    }

    #[test]
    fn compute_only_spec_is_valid() {
        let spec = PipelineSpec::default().with_stage(ShaderStage::Compute, stage("main"));
        assert!(spec.validate().is_ok());
        assert_eq!(spec.bind_point(), Some(PipelineBindPoint::Compute));
    }

    #[test]
    fn fragment_without_vertex_is_missing_a_stage() {
        let spec = PipelineSpec::default().with_stage(ShaderStage::Fragment, stage("main"));
        assert_eq!(spec.validate(), Err(PipelineSpecError::MissingVertexStage));
    }

    #[test]
    fn vertex_without_fragment_has_no_output_stage() {
        let spec = PipelineSpec::default().with_stage(ShaderStage::Vertex, stage("main"));
        assert_eq!(spec.validate(), Err(PipelineSpecError::MissingOutputStage));
    }

    #[test]
    fn vertex_plus_fragment_is_valid() {
        let spec = PipelineSpec::default()
            .with_stage(ShaderStage::Vertex, stage("main"))
            .with_stage(ShaderStage::Fragment, stage("main"));
        assert!(spec.validate().is_ok());
        assert_eq!(spec.bind_point(), Some(PipelineBindPoint::Graphics));
    }

    #[test]
    fn compute_combined_with_graphics_is_rejected() {
        let spec = PipelineSpec::default()
            .with_stage(ShaderStage::Compute, stage("main"))
            .with_stage(ShaderStage::Vertex, stage("main"));
        assert_eq!(
            spec.validate(),
            Err(PipelineSpecError::ComputeStageNotExclusive),
        );
    }

    #[test]
    fn required_stages_must_be_present() {
        let mut spec = PipelineSpec::default()
            .with_stage(ShaderStage::Vertex, stage("main"))
            .with_stage(ShaderStage::Fragment, stage("main"));
        spec.required_stages = ShaderStages::VERTEX | ShaderStages::GEOMETRY;

        assert_eq!(
            spec.validate(),
            Err(PipelineSpecError::RequiredStagesMissing {
                missing: ShaderStages::GEOMETRY,
            }),
        );
    }

    #[test]
    fn tessellation_stages_must_come_in_pairs() {
        let spec = PipelineSpec::default()
            .with_stage(ShaderStage::Vertex, stage("main"))
            .with_stage(ShaderStage::Fragment, stage("main"))
            .with_stage(ShaderStage::TessellationControl, stage("main"));
        assert_eq!(
            spec.validate(),
            Err(PipelineSpecError::UnpairedTessellationStages {
                present: ShaderStage::TessellationControl,
            }),
        );

        let spec = spec.with_stage(ShaderStage::TessellationEvaluation, stage("main"));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn empty_spec_is_rejected() {
        assert_eq!(
            PipelineSpec::default().validate(),
            Err(PipelineSpecError::Empty),
        );
    }

    #[test]
    fn stage_flag_sets_behave_like_masks() {
        let flags = ShaderStages::VERTEX | ShaderStages::FRAGMENT;
        assert!(flags.intersects(ShaderStages::VERTEX));
        assert!(flags.contains(ShaderStages::VERTEX | ShaderStages::FRAGMENT));
        assert!(!flags.contains(ShaderStages::all_graphics()));
        assert_eq!(
            ShaderStages::all_graphics().difference(flags),
            ShaderStages::TESSELLATION_CONTROL
                | ShaderStages::TESSELLATION_EVALUATION
                | ShaderStages::GEOMETRY,
        );
        assert_eq!(format!("{:?}", flags), "VERTEX | FRAGMENT");
        assert_eq!(format!("{:?}", ShaderStages::empty()), "empty()");
    }
}
