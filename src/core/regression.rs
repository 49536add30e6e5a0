//! Regression synthesis from a failing/passing node pair

use crate::core::config::Clock;
use crate::core::data::{BuildDescriptors, RegressionData};
use crate::core::error::{ModelError, RegressionCheck, RegressionConsistencyError};
use crate::core::ids::ObjectId;
use crate::core::node::{NodeKind, Regression, TypedNode};
use crate::core::schema::Schema;
use crate::core::state::{ResultValue, StateValue};
use crate::core::timestamp::format_timestamp;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

fn render<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("<unrenderable: {}>", e))
}

/// Compare one field of the two nodes, reporting both values on mismatch
fn compare<T: PartialEq + Serialize>(field: &'static str, fail: &T, pass: &T) -> Result<(), RegressionCheck> {
    if fail == pass {
        Ok(())
    } else {
        Err(RegressionCheck::FieldMismatch {
            field,
            fail_value: render(fail),
            pass_value: render(pass),
        })
    }
}

fn comparable<'a>(node: &'a TypedNode) -> Result<BuildDescriptors<'a>, RegressionCheck> {
    node.descriptors().ok_or_else(|| RegressionCheck::UnsupportedKind {
        kind: node.kind().to_string(),
    })
}

/// Run every precondition in order and stop at the first failure
fn check_pair(fail: &TypedNode, pass: &TypedNode) -> Result<(), RegressionCheck> {
    let fail_desc = comparable(fail)?;
    let pass_desc = comparable(pass)?;

    compare("name", &fail.name(), &pass.name())?;
    compare("group", &fail.group(), &pass.group())?;
    compare("path", &fail.path(), &pass.path())?;
    compare("data.kernel_revision", &fail_desc.kernel_revision, &pass_desc.kernel_revision)?;
    compare("data.arch", &fail_desc.arch, &pass_desc.arch)?;
    compare("data.defconfig", &fail_desc.defconfig, &pass_desc.defconfig)?;
    compare("data.config_full", &fail_desc.config_full, &pass_desc.config_full)?;
    compare("data.compiler", &fail_desc.compiler, &pass_desc.compiler)?;
    compare("data.platform", &fail_desc.platform, &pass_desc.platform)?;

    if pass.created() >= fail.created() {
        return Err(RegressionCheck::TemporalOrder {
            fail_created: format_timestamp(&fail.created()),
            pass_created: format_timestamp(&pass.created()),
        });
    }

    if pass.result() != Some(ResultValue::Pass) {
        return Err(RegressionCheck::PassResult { actual: pass.result() });
    }
    if fail.result() != Some(ResultValue::Fail) {
        return Err(RegressionCheck::FailResult { actual: fail.result() });
    }
    Ok(())
}

impl Schema {
    /// Build an unsaved regression from the first failing run of a job and
    /// the last run that passed before it
    pub fn create_regression(
        &self,
        fail: &TypedNode,
        pass: &TypedNode,
    ) -> Result<Regression, RegressionConsistencyError> {
        debug!(
            "Checking regression pair: fail={} pass={}",
            fail.display_id(),
            pass.display_id()
        );

        check_pair(fail, pass).map_err(|check| RegressionConsistencyError {
            fail_node: fail.display_id(),
            pass_node: pass.display_id(),
            check,
        })?;

        let descriptors = comparable(fail).unwrap_or_default();
        let data = RegressionData {
            fail_node: fail.id(),
            pass_node: pass.id(),
            node_sequence: Vec::new(),
            error_code: descriptors.error_code,
            error_msg: descriptors.error_msg.map(str::to_string),
            failed_kernel_revision: descriptors.kernel_revision.cloned(),
            arch: descriptors.arch.map(str::to_string),
            defconfig: descriptors.defconfig.map(str::to_string),
            config_full: descriptors.config_full.map(str::to_string),
            compiler: descriptors.compiler.map(str::to_string),
            platform: descriptors.platform.map(str::to_string),
            device: descriptors.device.map(str::to_string),
        };

        let mut regression = Regression::new(
            NodeKind::Regression.tag(),
            fail.name(),
            fail.path().to_vec(),
            data,
            self.defaults(),
        );
        regression.group = fail.group().map(str::to_string);
        regression.state = StateValue::Done;

        info!(
            "Regression detected for {}: {} passed, {} failed",
            regression.path.join("/"),
            pass.display_id(),
            fail.display_id()
        );
        Ok(regression)
    }

    /// Same as [`Schema::create_regression`] but returns the plain document,
    /// nulls omitted, ready for submission
    pub fn create_regression_document(
        &self,
        fail: &TypedNode,
        pass: &TypedNode,
    ) -> Result<Value, ModelError> {
        self.create_regression(fail, pass)?.to_document(true)
    }
}

impl Regression {
    /// Append a later run of the same job. A passing run resolves the
    /// regression.
    pub fn record_run(&mut self, node: ObjectId, result: ResultValue, clock: &dyn Clock) {
        self.data.node_sequence.push(node);
        if result == ResultValue::Pass {
            self.result = Some(ResultValue::Pass);
        }
        self.touch(clock);
    }

    /// Whether the job is still failing
    pub fn is_active(&self) -> bool {
        self.result == Some(ResultValue::Fail)
    }
}
