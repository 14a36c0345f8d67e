// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Building and executing one pipeline per test case.
//!
//! [`PipelineRunner`] owns the connection to the device and walks a fixed state machine for
//! every case: `Unconfigured → Built → Submitted → Complete | Failed`. Building validates the
//! [`PipelineSpec`], checks every bound resource against the descriptor kinds the shader blobs
//! declare, and compiles the shader modules through the device. Execution is a single blocking
//! round-trip: record, submit, wait, read back. A device-reported failure is fatal to the
//! current case; the runner can be reset and reused for the next one.
//!
//! The device itself is an external collaborator behind the [`ConformanceDevice`] trait. The
//! only state the runner keeps across cases is the compiled-module cache, which is keyed by
//! code words and must never change observable results.

use super::{ExecutionParams, PipelineBindPoint, PipelineSpec, PipelineSpecError, ShaderStage};
use crate::{cache::OnceCache, resource::BufferResource, DescriptorKind, DeviceSize};
use std::{
    collections::BTreeMap,
    error::Error,
    fmt::{Display, Error as FmtError, Formatter},
    sync::Arc,
};
use tracing::debug;

/// An opaque handle to a shader module the device has compiled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModuleHandle(pub u64);

/// A validated pipeline with its compiled modules and resources, ready to submit.
///
/// This is what a [`ConformanceDevice`] receives; the harness has already checked the stage
/// requirements and the resource bindings by the time one of these exists.
#[derive(Clone, Debug)]
pub struct PreparedPipeline {
    /// Whether the pipeline is submitted to a draw or a dispatch.
    pub bind_point: PipelineBindPoint,
    /// The compiled module and entry point for each stage.
    pub stages: BTreeMap<ShaderStage, (ModuleHandle, String)>,
    /// The resources bound to the pipeline, in binding order.
    pub resources: Vec<BufferResource>,
}

/// The device-driver surface the harness executes against.
///
/// Implementations wrap a real driver; the test suite substitutes a fake. All methods block
/// until the device has finished the requested work.
pub trait ConformanceDevice {
    /// Compiles a shader module from its code words and returns a handle to it.
    fn compile_module(&self, code: &[u32]) -> Result<ModuleHandle, DeviceExecutionError>;

    /// Returns the maximum number of bytes a push-constant resource may occupy.
    ///
    /// The default is 128, the minimum every conforming Vulkan device guarantees.
    fn max_push_constant_bytes(&self) -> DeviceSize {
        128
    }

    /// Records, submits and waits for one execution, then reads back the output bytes.
    fn submit(
        &self,
        pipeline: &PreparedPipeline,
        params: &ExecutionParams,
    ) -> Result<Vec<u8>, DeviceExecutionError>;
}

/// Where the runner currently is in its per-case state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunnerStatus {
    /// No pipeline is configured; `build` is the only valid operation.
    Unconfigured,
    /// A pipeline is validated and compiled, waiting for `execute`.
    Built,
    /// Commands are submitted and the runner is blocked on the device.
    Submitted,
    /// The execution finished and the output is waiting to be taken.
    Complete,
    /// The execution failed; the runner must be reset before reuse.
    Failed,
}

enum RunnerState {
    Unconfigured,
    Built(Box<PreparedPipeline>),
    Submitted,
    Complete { output: Vec<u8> },
    Failed,
}

/// Builds and executes one pipeline at a time against a [`ConformanceDevice`].
pub struct PipelineRunner<D: ?Sized> {
    device: Arc<D>,
    module_cache: OnceCache<Vec<u32>, ModuleHandle>,
    state: RunnerState,
}

impl<D> PipelineRunner<D>
where
    D: ConformanceDevice + ?Sized,
{
    /// Creates a runner in the `Unconfigured` state.
    #[inline]
    pub fn new(device: Arc<D>) -> Self {
        PipelineRunner {
            device,
            module_cache: OnceCache::new(),
            state: RunnerState::Unconfigured,
        }
    }

    /// Returns the device the runner executes against.
    #[inline]
    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Returns where the runner currently is in its state machine.
    #[inline]
    pub fn status(&self) -> RunnerStatus {
        match self.state {
            RunnerState::Unconfigured => RunnerStatus::Unconfigured,
            RunnerState::Built(_) => RunnerStatus::Built,
            RunnerState::Submitted => RunnerStatus::Submitted,
            RunnerState::Complete { .. } => RunnerStatus::Complete,
            RunnerState::Failed => RunnerStatus::Failed,
        }
    }

    /// Returns the runner to the `Unconfigured` state, discarding any leftover pipeline or
    /// output. The compiled-module cache is kept.
    #[inline]
    pub fn reset(&mut self) {
        self.state = RunnerState::Unconfigured;
    }

    /// Validates the spec and resources, compiles the shader modules and transitions to
    /// `Built`.
    ///
    /// On error the runner stays `Unconfigured`; all the errors this can report indicate a
    /// test-authoring bug or a broken device and must not be retried.
    ///
    /// # Panics
    ///
    /// Panics if the runner is not in the `Unconfigured` state.
    pub fn build(
        &mut self,
        spec: PipelineSpec,
        resources: Vec<BufferResource>,
    ) -> Result<(), PipelineBuildError> {
        assert!(
            matches!(self.state, RunnerState::Unconfigured),
            "`build` requires an unconfigured runner, but the status is {:?}",
            self.status(),
        );

        spec.validate()?;
        self.check_bindings(&spec, &resources)?;

        let bind_point = spec.bind_point().unwrap();
        let mut stages = BTreeMap::new();

        for (&stage, stage_module) in &spec.stages {
            let handle = self.module_cache.get_or_try_insert(
                stage_module.module.code.as_slice(),
                || {
                    let handle = self.device.compile_module(&stage_module.module.code)?;

                    Ok::<_, DeviceExecutionError>((stage_module.module.code.clone(), handle))
                },
            )?;

            stages.insert(stage, (handle, stage_module.entry_point.clone()));
        }

        debug!(
            stages = ?spec.stage_flags(),
            resources = resources.len(),
            "pipeline built"
        );

        self.state = RunnerState::Built(Box::new(PreparedPipeline {
            bind_point,
            stages,
            resources,
        }));

        Ok(())
    }

    /// Submits the built pipeline for one execution and blocks until the device reports
    /// completion, transitioning to `Complete` or `Failed`.
    ///
    /// A reported failure means the device state is unreliable for this case; the error is
    /// returned and never retried.
    ///
    /// # Panics
    ///
    /// - Panics if the runner is not in the `Built` state.
    /// - Panics if `params` does not match the pipeline's bind point (a draw for a compute
    ///   pipeline or a dispatch for a graphics pipeline).
    pub fn execute(&mut self, params: &ExecutionParams) -> Result<(), DeviceExecutionError> {
        match &self.state {
            RunnerState::Built(pipeline) => assert_eq!(
                pipeline.bind_point,
                params.bind_point(),
                "the execution parameters must match the pipeline's bind point",
            ),
            _ => panic!(
                "`execute` requires a built pipeline, but the status is {:?}",
                self.status(),
            ),
        }

        let pipeline = match std::mem::replace(&mut self.state, RunnerState::Submitted) {
            RunnerState::Built(pipeline) => pipeline,
            _ => unreachable!(),
        };

        debug!(bind_point = ?pipeline.bind_point, "pipeline submitted");

        match self.device.submit(&pipeline, params) {
            Ok(output) => {
                debug!(output_len = output.len(), "execution complete");
                self.state = RunnerState::Complete { output };

                Ok(())
            }
            Err(err) => {
                self.state = RunnerState::Failed;

                Err(err)
            }
        }
    }

    /// Takes the output of a completed execution, returning the runner to `Unconfigured`.
    ///
    /// # Panics
    ///
    /// Panics if the runner is not in the `Complete` state.
    pub fn take_output(&mut self) -> Vec<u8> {
        match std::mem::replace(&mut self.state, RunnerState::Unconfigured) {
            RunnerState::Complete { output } => output,
            state => {
                self.state = state;
                panic!(
                    "`take_output` requires a completed execution, but the status is {:?}",
                    self.status(),
                );
            }
        }
    }

    /// Checks every resource against the bindings the shader blobs declare.
    ///
    /// The declared bindings are unioned across stages; two stages declaring different kinds
    /// for the same binding index is itself an authoring bug.
    fn check_bindings(
        &self,
        spec: &PipelineSpec,
        resources: &[BufferResource],
    ) -> Result<(), ResourceBindingError> {
        let mut declared: BTreeMap<u32, DescriptorKind> = BTreeMap::new();

        for stage_module in spec.stages.values() {
            for (&binding, &kind) in &stage_module.module.bindings {
                match declared.insert(binding, kind) {
                    Some(previous) if previous != kind => {
                        return Err(ResourceBindingError::ConflictingDeclarations {
                            binding,
                            first: previous,
                            second: kind,
                        });
                    }
                    _ => (),
                }
            }
        }

        let mut bound: BTreeMap<u32, &BufferResource> = BTreeMap::new();

        for resource in resources {
            if bound.insert(resource.binding, resource).is_some() {
                return Err(ResourceBindingError::DuplicateResource {
                    binding: resource.binding,
                });
            }
        }

        for (&binding, &expected) in &declared {
            let resource = match bound.get(&binding) {
                Some(resource) => *resource,
                None => {
                    return Err(ResourceBindingError::MissingResource { binding, expected });
                }
            };

            if resource.kind != expected {
                return Err(ResourceBindingError::DescriptorKindMismatch {
                    binding,
                    expected,
                    provided: resource.kind,
                });
            }

            if resource.kind == DescriptorKind::PushConstant {
                let size = resource.bytes.len() as DeviceSize;
                let max = self.device.max_push_constant_bytes();

                if size > max {
                    return Err(ResourceBindingError::PushConstantRangeExceeded { size, max });
                }
            }
        }

        for &binding in bound.keys() {
            if !declared.contains_key(&binding) {
                return Err(ResourceBindingError::UnexpectedResource { binding });
            }
        }

        Ok(())
    }
}

/// Error that can happen when building a pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineBuildError {
    /// The pipeline spec does not meet the stage requirements.
    Spec(PipelineSpecError),

    /// A resource does not match the bindings the shader blobs declare.
    Binding(ResourceBindingError),

    /// The device failed to compile a shader module.
    Device(DeviceExecutionError),
}

impl Error for PipelineBuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineBuildError::Spec(err) => Some(err),
            PipelineBuildError::Binding(err) => Some(err),
            PipelineBuildError::Device(err) => Some(err),
        }
    }
}

impl Display for PipelineBuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            PipelineBuildError::Spec(_) => write!(f, "the pipeline spec is invalid"),
            PipelineBuildError::Binding(_) => write!(f, "a resource binding is invalid"),
            PipelineBuildError::Device(_) => write!(f, "a shader module failed to compile"),
        }
    }
}

impl From<PipelineSpecError> for PipelineBuildError {
    #[inline]
    fn from(err: PipelineSpecError) -> Self {
        PipelineBuildError::Spec(err)
    }
}

impl From<ResourceBindingError> for PipelineBuildError {
    #[inline]
    fn from(err: ResourceBindingError) -> Self {
        PipelineBuildError::Binding(err)
    }
}

impl From<DeviceExecutionError> for PipelineBuildError {
    #[inline]
    fn from(err: DeviceExecutionError) -> Self {
        PipelineBuildError::Device(err)
    }
}

/// Error raised at build time when the bound resources do not match what the shader blobs
/// declare.
///
/// Always indicates a test-authoring defect; never retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceBindingError {
    /// Two stages declare different descriptor kinds for the same binding index.
    ConflictingDeclarations {
        /// The binding index with conflicting declarations.
        binding: u32,
        /// The kind declared first, in stage order.
        first: DescriptorKind,
        /// The conflicting kind declared later.
        second: DescriptorKind,
    },

    /// Two resources were bound to the same binding index.
    DuplicateResource {
        /// The binding index bound twice.
        binding: u32,
    },

    /// A binding the shaders declare has no resource bound to it.
    MissingResource {
        /// The declared binding index.
        binding: u32,
        /// The descriptor kind the shaders expect there.
        expected: DescriptorKind,
    },

    /// The resource bound at a binding index has a different descriptor kind than the shaders
    /// declare.
    DescriptorKindMismatch {
        /// The binding index.
        binding: u32,
        /// The descriptor kind the shaders declare.
        expected: DescriptorKind,
        /// The descriptor kind of the bound resource.
        provided: DescriptorKind,
    },

    /// A resource is bound to a binding index no shader declares.
    UnexpectedResource {
        /// The undeclared binding index.
        binding: u32,
    },

    /// A push-constant resource exceeds the device's push-constant limit.
    PushConstantRangeExceeded {
        /// The size of the push-constant resource in bytes.
        size: DeviceSize,
        /// The device's limit in bytes.
        max: DeviceSize,
    },
}

impl Error for ResourceBindingError {}

impl Display for ResourceBindingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            ResourceBindingError::ConflictingDeclarations {
                binding,
                first,
                second,
            } => write!(
                f,
                "binding {} is declared both as {:?} and as {:?}",
                binding, first, second,
            ),
            ResourceBindingError::DuplicateResource { binding } => {
                write!(f, "two resources are bound to binding {}", binding)
            }
            ResourceBindingError::MissingResource { binding, expected } => write!(
                f,
                "binding {} expects a {:?} resource but none is bound",
                binding, expected,
            ),
            ResourceBindingError::DescriptorKindMismatch {
                binding,
                expected,
                provided,
            } => write!(
                f,
                "binding {} expects a {:?} resource but a {:?} resource is bound",
                binding, expected, provided,
            ),
            ResourceBindingError::UnexpectedResource { binding } => write!(
                f,
                "a resource is bound to binding {} but no shader declares it",
                binding,
            ),
            ResourceBindingError::PushConstantRangeExceeded { size, max } => write!(
                f,
                "the push-constant resource is {} bytes but the device supports at most {}",
                size, max,
            ),
        }
    }
}

/// Error reported by the device while compiling or executing.
///
/// Fatal for the current test case only: the device state is considered unreliable for that
/// case, so the harness reports the error and moves on to the next independent case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceExecutionError {
    /// The device failed to compile a shader module.
    CompilationFailed {
        /// The reason the device reported.
        reason: String,
    },

    /// The device reported a failure executing the submitted commands.
    ExecutionFailed {
        /// The reason the device reported.
        reason: String,
    },

    /// The device was lost; no further work can be submitted to it.
    DeviceLost,
}

impl Error for DeviceExecutionError {}

impl Display for DeviceExecutionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            DeviceExecutionError::CompilationFailed { reason } => {
                write!(f, "shader module compilation failed: {}", reason)
            }
            DeviceExecutionError::ExecutionFailed { reason } => {
                write!(f, "device execution failed: {}", reason)
            }
            DeviceExecutionError::DeviceLost => write!(f, "the device was lost"),
        }
    }
}
