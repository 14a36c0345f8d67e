// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Sweeping a group of test cases against one device.
//!
//! A [`TestCaseGroup`] owns the cases registered into it and resolves them strictly one at a
//! time: build, execute, wait, verify, then the next case. This is the only layer that catches
//! the fatal per-case errors ([`CaseError`]); it records them and continues the sweep, so one
//! broken case never hides the verdicts of the independent cases after it. Nothing a case
//! writes is visible to any other case; the only state shared across the sweep is the runner's
//! compiled-module cache.
//!
//! Every case ends in exactly one of three states: passed, failed verification, or aborted on
//! an error. There is no partial pass.

use crate::{
    layout::LayoutError,
    pipeline::{
        runner::{
            ConformanceDevice, DeviceExecutionError, PipelineBuildError, PipelineRunner,
            ResourceBindingError,
        },
        ExecutionParams, PipelineSpec, PipelineSpecError,
    },
    resource::BufferResource,
    verify::VerificationOutcome,
    NonExhaustive,
};
use std::{
    error::Error,
    fmt::{Display, Error as FmtError, Formatter},
    sync::Arc,
};
use tracing::{error, info, warn};

/// The closure that turns a case's raw output bytes into a verdict.
pub type VerifyFn = Box<dyn FnOnce(&[u8]) -> Result<VerificationOutcome, CaseError>>;

/// One registered conformance test case, ready to execute.
///
/// Created at registration time, before any device work, and consumed by exactly one
/// execution.
pub struct ConformanceCase {
    /// The name of the case, as it appears in the conformance log.
    pub name: String,
    /// The pipeline to build for the case.
    pub spec: PipelineSpec,
    /// The resources to bind, handed to the pipeline by value.
    pub resources: Vec<BufferResource>,
    /// The draw or dispatch to submit.
    pub params: ExecutionParams,
    /// Verifies the output bytes read back from the device.
    pub verify: VerifyFn,
}

impl ConformanceCase {
    /// Creates a case from its parts.
    #[inline]
    pub fn new(
        name: impl Into<String>,
        spec: PipelineSpec,
        resources: Vec<BufferResource>,
        params: ExecutionParams,
        verify: impl FnOnce(&[u8]) -> Result<VerificationOutcome, CaseError> + 'static,
    ) -> Self {
        ConformanceCase {
            name: name.into(),
            spec,
            resources,
            params,
            verify: Box::new(verify),
        }
    }
}

/// Options for running a sweep.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Whether to stop the sweep at the first aborted case instead of continuing with the
    /// remaining independent cases.
    ///
    /// The default value is `false`.
    pub stop_on_abort: bool,

    pub _ne: NonExhaustive,
}

impl Default for RunOptions {
    #[inline]
    fn default() -> Self {
        RunOptions {
            stop_on_abort: false,
            _ne: NonExhaustive(()),
        }
    }
}

/// An ordered collection of cases that are swept together.
pub struct TestCaseGroup {
    name: String,
    cases: Vec<ConformanceCase>,
}

impl TestCaseGroup {
    /// Creates an empty group with the given name.
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        TestCaseGroup {
            name: name.into(),
            cases: Vec::new(),
        }
    }

    /// Returns the name of the group.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a case to the end of the sweep.
    #[inline]
    pub fn add_case(&mut self, case: ConformanceCase) {
        self.cases.push(case);
    }

    /// Returns the number of registered cases.
    #[inline]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Returns whether no cases are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Runs every case against the device, one at a time and in registration order,
    /// consuming the group.
    ///
    /// A case that reports a [`CaseError`] is recorded as aborted and the sweep continues
    /// with the next case, unless [`RunOptions::stop_on_abort`] is set. Errors are never
    /// turned into passes.
    pub fn run<D>(self, device: Arc<D>, options: &RunOptions) -> GroupReport
    where
        D: ConformanceDevice + ?Sized,
    {
        let mut runner = PipelineRunner::new(device);
        let mut records = Vec::with_capacity(self.cases.len());

        for case in self.cases {
            runner.reset();

            let name = case.name;
            let record = match Self::run_case(
                &mut runner,
                case.spec,
                case.resources,
                &case.params,
                case.verify,
            ) {
                Ok(outcome) => {
                    if outcome.pass {
                        info!(group = %self.name, case = %name, "case passed");

                        CaseRecord {
                            name,
                            status: CaseStatus::Pass,
                            message: outcome.message,
                        }
                    } else {
                        warn!(
                            group = %self.name,
                            case = %name,
                            message = %outcome.message,
                            "case failed"
                        );

                        CaseRecord {
                            name,
                            status: CaseStatus::Fail,
                            message: outcome.message,
                        }
                    }
                }
                Err(err) => {
                    error!(group = %self.name, case = %name, error = %err, "case aborted");

                    CaseRecord {
                        name,
                        status: CaseStatus::Abort,
                        message: err.to_string(),
                    }
                }
            };

            let stop = options.stop_on_abort && record.status == CaseStatus::Abort;
            records.push(record);

            if stop {
                break;
            }
        }

        GroupReport {
            group: self.name,
            records,
        }
    }

    fn run_case<D>(
        runner: &mut PipelineRunner<D>,
        spec: PipelineSpec,
        resources: Vec<BufferResource>,
        params: &ExecutionParams,
        verify: VerifyFn,
    ) -> Result<VerificationOutcome, CaseError>
    where
        D: ConformanceDevice + ?Sized,
    {
        runner.build(spec, resources)?;
        runner.execute(params)?;
        let output = runner.take_output();

        verify(&output)
    }
}

/// The status a case ended its execution in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CaseStatus {
    /// The case executed and its output matched the expected values.
    Pass,
    /// The case executed but its output did not match the expected values.
    Fail,
    /// The case could not complete because of a [`CaseError`].
    Abort,
}

/// The recorded verdict of one case.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CaseRecord {
    /// The name of the case.
    pub name: String,
    /// The status the case ended in.
    pub status: CaseStatus,
    /// The verification message, or the error description for an aborted case.
    pub message: String,
}

/// The verdicts of one sweep, in registration order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupReport {
    /// The name of the group that was swept.
    pub group: String,
    /// One record per executed case.
    pub records: Vec<CaseRecord>,
}

impl GroupReport {
    /// Returns the number of cases with the given status.
    #[inline]
    pub fn count(&self, status: CaseStatus) -> usize {
        self.records
            .iter()
            .filter(|record| record.status == status)
            .count()
    }

    /// Returns whether every executed case passed.
    #[inline]
    pub fn all_passed(&self) -> bool {
        self.records
            .iter()
            .all(|record| record.status == CaseStatus::Pass)
    }
}

impl Display for GroupReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        writeln!(
            f,
            "group '{}': {} passed, {} failed, {} aborted",
            self.group,
            self.count(CaseStatus::Pass),
            self.count(CaseStatus::Fail),
            self.count(CaseStatus::Abort),
        )?;

        for record in &self.records {
            let status = match record.status {
                CaseStatus::Pass => "pass",
                CaseStatus::Fail => "FAIL",
                CaseStatus::Abort => "ABORT",
            };

            writeln!(f, "  {:5} {}: {}", status, record.name, record.message)?;
        }

        Ok(())
    }
}

/// Error that aborts one test case.
///
/// All variants indicate either a test-authoring defect or a device failure; none of them is
/// retried, and only the group layer catches them.
#[derive(Clone, Debug, PartialEq)]
pub enum CaseError {
    /// A buffer layout could not be computed.
    Layout(LayoutError),

    /// The pipeline spec does not meet the stage requirements.
    Spec(PipelineSpecError),

    /// A resource does not match the bindings the shader blobs declare.
    Binding(ResourceBindingError),

    /// The device failed to compile or execute.
    Device(DeviceExecutionError),
}

impl Error for CaseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CaseError::Layout(err) => Some(err),
            CaseError::Spec(err) => Some(err),
            CaseError::Binding(err) => Some(err),
            CaseError::Device(err) => Some(err),
        }
    }
}

impl Display for CaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            CaseError::Layout(err) => write!(f, "layout error: {}", err),
            CaseError::Spec(err) => write!(f, "pipeline spec error: {}", err),
            CaseError::Binding(err) => write!(f, "resource binding error: {}", err),
            CaseError::Device(err) => write!(f, "device error: {}", err),
        }
    }
}

impl From<LayoutError> for CaseError {
    #[inline]
    fn from(err: LayoutError) -> Self {
        CaseError::Layout(err)
    }
}

impl From<PipelineSpecError> for CaseError {
    #[inline]
    fn from(err: PipelineSpecError) -> Self {
        CaseError::Spec(err)
    }
}

impl From<ResourceBindingError> for CaseError {
    #[inline]
    fn from(err: ResourceBindingError) -> Self {
        CaseError::Binding(err)
    }
}

impl From<DeviceExecutionError> for CaseError {
    #[inline]
    fn from(err: DeviceExecutionError) -> Self {
        CaseError::Device(err)
    }
}

impl From<PipelineBuildError> for CaseError {
    #[inline]
    fn from(err: PipelineBuildError) -> Self {
        match err {
            PipelineBuildError::Spec(err) => CaseError::Spec(err),
            PipelineBuildError::Binding(err) => CaseError::Binding(err),
            PipelineBuildError::Device(err) => CaseError::Device(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, status: CaseStatus) -> CaseRecord {
        CaseRecord {
            name: name.to_owned(),
            status,
            message: String::new(),
        }
    }

    #[test]
    fn report_counts_by_status() {
        let report = GroupReport {
            group: "conversion".to_owned(),
            records: vec![
                record("a", CaseStatus::Pass),
                record("b", CaseStatus::Fail),
                record("c", CaseStatus::Pass),
                record("d", CaseStatus::Abort),
            ],
        };

        assert_eq!(report.count(CaseStatus::Pass), 2);
        assert_eq!(report.count(CaseStatus::Fail), 1);
        assert_eq!(report.count(CaseStatus::Abort), 1);
        assert!(!report.all_passed());

        let summary = report.to_string();
        assert!(summary.contains("2 passed, 1 failed, 1 aborted"));
    }

    #[test]
    fn build_errors_convert_to_their_case_error_variant() {
        let err: CaseError = PipelineBuildError::Spec(PipelineSpecError::Empty).into();
        assert_eq!(err, CaseError::Spec(PipelineSpecError::Empty));

        let err: CaseError = DeviceExecutionError::DeviceLost.into();
        assert!(err.to_string().contains("device"));
    }
}
