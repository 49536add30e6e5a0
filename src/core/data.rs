//! Kind-specific payloads stored in a node's `data` field

use crate::core::document::{DataMap, DocReader, FromDocument, UrlKind};
use crate::core::ids::ObjectId;
use crate::core::revision::Revision;
use crate::core::state::{CheckoutErrorCode, ErrorCode, ResultValue};
use serde::Serialize;
use std::fmt::Debug;

/// Build and test descriptors two runs must share to be comparable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildDescriptors<'a> {
    pub kernel_revision: Option<&'a Revision>,
    pub arch: Option<&'a str>,
    pub defconfig: Option<&'a str>,
    pub config_full: Option<&'a str>,
    pub compiler: Option<&'a str>,
    pub platform: Option<&'a str>,
    pub device: Option<&'a str>,
    pub error_code: Option<ErrorCode>,
    pub error_msg: Option<&'a str>,
}

/// Behaviour shared by every node payload type
pub trait NodeData: FromDocument + Default + Clone + Debug + PartialEq + Serialize {
    /// Result a node of this kind gets when the document carries none
    const DEFAULT_RESULT: Option<ResultValue> = None;

    /// Descriptors used to match runs of the same job, if this kind has any
    fn descriptors(&self) -> Option<BuildDescriptors<'_>> {
        None
    }

    /// Record that the node was forced to done by its timeout
    fn mark_timed_out(&mut self) {}

    /// Link this node to the regression it revealed. Returns false when the
    /// payload has no such link.
    fn set_regression(&mut self, _regression: ObjectId) -> bool {
        false
    }
}

impl NodeData for DataMap {}

/// Data of a checkout node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckoutData {
    pub kernel_revision: Option<Revision>,
    pub error_code: Option<CheckoutErrorCode>,
    pub error_msg: Option<String>,
    pub architecture_filter: Option<Vec<String>>,
}

impl FromDocument for CheckoutData {
    fn read(reader: &mut DocReader<'_>) -> Option<Self> {
        Some(CheckoutData {
            kernel_revision: reader.nested("kernel_revision"),
            error_code: reader.optional("error_code"),
            error_msg: reader.optional("error_msg"),
            architecture_filter: reader.optional("architecture_filter"),
        })
    }
}

impl NodeData for CheckoutData {
    fn mark_timed_out(&mut self) {
        self.error_code = Some(CheckoutErrorCode::NodeTimeout);
    }
}

/// Data of a kernel build node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KbuildData {
    pub kernel_revision: Option<Revision>,
    /// CPU architecture family
    pub arch: Option<String>,
    pub defconfig: Option<String>,
    pub compiler: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub error_msg: Option<String>,
    /// Additional configuration fragments
    pub fragments: Option<Vec<String>>,
    /// Defconfig plus fragments as a single string
    pub config_full: Option<String>,
    pub platform: Option<String>,
    pub runtime: Option<String>,
    pub job_id: Option<String>,
    /// Cluster the job was submitted to
    pub job_context: Option<String>,
    /// Kernel image type (zimage, bzimage...)
    pub kernel_type: Option<String>,
    pub regression: Option<ObjectId>,
}

impl FromDocument for KbuildData {
    fn read(reader: &mut DocReader<'_>) -> Option<Self> {
        Some(KbuildData {
            kernel_revision: reader.nested("kernel_revision"),
            arch: reader.optional("arch"),
            defconfig: reader.optional("defconfig"),
            compiler: reader.optional("compiler"),
            error_code: reader.optional("error_code"),
            error_msg: reader.optional("error_msg"),
            fragments: reader.optional("fragments"),
            config_full: reader.optional("config_full"),
            platform: reader.optional("platform"),
            runtime: reader.optional("runtime"),
            job_id: reader.optional("job_id"),
            job_context: reader.optional("job_context"),
            kernel_type: reader.optional("kernel_type"),
            regression: reader.object_id("regression"),
        })
    }
}

impl NodeData for KbuildData {
    fn descriptors(&self) -> Option<BuildDescriptors<'_>> {
        Some(BuildDescriptors {
            kernel_revision: self.kernel_revision.as_ref(),
            arch: self.arch.as_deref(),
            defconfig: self.defconfig.as_deref(),
            config_full: self.config_full.as_deref(),
            compiler: self.compiler.as_deref(),
            platform: self.platform.as_deref(),
            device: None,
            error_code: self.error_code,
            error_msg: self.error_msg.as_deref(),
        })
    }

    fn mark_timed_out(&mut self) {
        self.error_code = Some(ErrorCode::NodeTimeout);
    }

    fn set_regression(&mut self, regression: ObjectId) -> bool {
        self.regression = Some(regression);
        true
    }
}

/// Data of a test or job node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestData {
    pub error_code: Option<ErrorCode>,
    pub error_msg: Option<String>,
    /// Repository containing the test source code
    pub test_source: Option<String>,
    pub test_revision: Option<Revision>,
    pub platform: Option<String>,
    pub device: Option<String>,
    pub runtime: Option<String>,
    pub job_id: Option<String>,
    pub job_context: Option<String>,
    pub regression: Option<ObjectId>,

    // Inherited from the parent build or test node
    pub kernel_revision: Option<Revision>,
    pub arch: Option<String>,
    pub defconfig: Option<String>,
    pub config_full: Option<String>,
    pub compiler: Option<String>,
    pub kernel_type: Option<String>,
    /// Miscellaneous fields, e.g. OS image version
    pub misc: DataMap,
}

impl FromDocument for TestData {
    fn read(reader: &mut DocReader<'_>) -> Option<Self> {
        Some(TestData {
            error_code: reader.optional("error_code"),
            error_msg: reader.optional("error_msg"),
            test_source: reader.url("test_source", UrlKind::Any, false),
            test_revision: reader.nested("test_revision"),
            platform: reader.optional("platform"),
            device: reader.optional("device"),
            runtime: reader.optional("runtime"),
            job_id: reader.optional("job_id"),
            job_context: reader.optional("job_context"),
            regression: reader.object_id("regression"),
            kernel_revision: reader.nested("kernel_revision"),
            arch: reader.optional("arch"),
            defconfig: reader.optional("defconfig"),
            config_full: reader.optional("config_full"),
            compiler: reader.optional("compiler"),
            kernel_type: reader.optional("kernel_type"),
            misc: reader.object("misc"),
        })
    }
}

impl NodeData for TestData {
    fn descriptors(&self) -> Option<BuildDescriptors<'_>> {
        Some(BuildDescriptors {
            kernel_revision: self.kernel_revision.as_ref(),
            arch: self.arch.as_deref(),
            defconfig: self.defconfig.as_deref(),
            config_full: self.config_full.as_deref(),
            compiler: self.compiler.as_deref(),
            platform: self.platform.as_deref(),
            device: self.device.as_deref(),
            error_code: self.error_code,
            error_msg: self.error_msg.as_deref(),
        })
    }

    fn mark_timed_out(&mut self) {
        self.error_code = Some(ErrorCode::NodeTimeout);
    }

    fn set_regression(&mut self, regression: ObjectId) -> bool {
        self.regression = Some(regression);
        true
    }
}

/// Data of a regression node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegressionData {
    /// Node where the regression was introduced
    pub fail_node: Option<ObjectId>,
    /// Last passing node before the failure
    pub pass_node: Option<ObjectId>,
    /// Runs of the same job after the initial failure. A trailing pass
    /// means the regression is no longer active.
    pub node_sequence: Vec<ObjectId>,
    pub error_code: Option<ErrorCode>,
    pub error_msg: Option<String>,
    pub failed_kernel_revision: Option<Revision>,
    pub arch: Option<String>,
    pub defconfig: Option<String>,
    pub config_full: Option<String>,
    pub compiler: Option<String>,
    pub platform: Option<String>,
    pub device: Option<String>,
}

impl FromDocument for RegressionData {
    fn read(reader: &mut DocReader<'_>) -> Option<Self> {
        Some(RegressionData {
            fail_node: reader.object_id("fail_node"),
            pass_node: reader.object_id("pass_node"),
            node_sequence: reader.object_ids("node_sequence"),
            error_code: reader.optional("error_code"),
            error_msg: reader.optional("error_msg"),
            failed_kernel_revision: reader.nested("failed_kernel_revision"),
            arch: reader.optional("arch"),
            defconfig: reader.optional("defconfig"),
            config_full: reader.optional("config_full"),
            compiler: reader.optional("compiler"),
            platform: reader.optional("platform"),
            device: reader.optional("device"),
        })
    }
}

impl NodeData for RegressionData {
    const DEFAULT_RESULT: Option<ResultValue> = Some(ResultValue::Fail);

    fn mark_timed_out(&mut self) {
        self.error_code = Some(ErrorCode::NodeTimeout);
    }
}
