//! Test utility functions for kci-model
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use kci_model::core::{FixedClock, ModelConfig, Schema};
use kci_model::{InMemoryNodeStore, NodeService};
use serde_json::{json, Value};
use std::sync::Arc;

/// Instant every fixed-clock test runs at
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn schema() -> Schema {
    schema_at(now())
}

pub fn schema_at(now: DateTime<Utc>) -> Schema {
    Schema::new(ModelConfig::default(), Arc::new(FixedClock(now)))
}

pub fn service_at(now: DateTime<Utc>) -> NodeService {
    NodeService::new(Arc::new(InMemoryNodeStore::new()), schema_at(now))
}

pub fn service() -> NodeService {
    service_at(now())
}

pub fn revision() -> Value {
    json!({
        "tree": "mainline",
        "url": "https://git.kernel.org/pub/scm/linux/kernel/git/torvalds/linux.git",
        "branch": "master",
        "commit": "2a8120d7b4827380e30a3b4de1a2c0b3e1d0a2f4",
        "describe": "v6.9-rc6",
        "version": {"version": 6, "patchlevel": 9, "extra": "-rc6"}
    })
}

pub fn checkout_doc() -> Value {
    json!({
        "kind": "checkout",
        "name": "checkout",
        "path": ["checkout"],
        "data": {"kernel_revision": revision()}
    })
}

/// Build configuration shared by comparable test runs
#[derive(Debug, Clone)]
pub struct Job {
    pub arch: String,
    pub compiler: String,
    pub platform: String,
}

impl Default for Job {
    fn default() -> Self {
        Self {
            arch: "x86_64".to_string(),
            compiler: "gcc-12".to_string(),
            platform: "qemu-x86".to_string(),
        }
    }
}

/// A finished test node for `job` with the given result and creation time
pub fn test_doc(job: &Job, result: &str, created: &str) -> Value {
    json!({
        "kind": "test",
        "name": "baseline.login",
        "path": ["checkout", "kbuild", "baseline", "login"],
        "group": "baseline",
        "state": "done",
        "result": result,
        "created": created,
        "data": {
            "kernel_revision": revision(),
            "arch": job.arch,
            "defconfig": "defconfig",
            "config_full": "defconfig",
            "compiler": job.compiler,
            "platform": job.platform,
            "runtime": "lava-collabora"
        }
    })
}
