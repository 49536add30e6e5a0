//! Source-control revision model

use crate::core::document::{DocReader, FromDocument, UrlKind};
use serde::Serialize;

/// Kernel version, e.g. v4.19.123-rc2
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelVersion {
    /// Major version number, 4 in v4.19
    pub version: i64,
    /// Minor version number or patch level, 19 in v4.19
    pub patchlevel: i64,
    /// Stable version or sub-level, 123 in v4.19.123
    pub sublevel: Option<i64>,
    /// Extra version string, -rc2 in v4.19-rc2
    pub extra: Option<String>,
    /// Release name
    pub name: Option<String>,
}

impl KernelVersion {
    /// Document fields that hold integers and must be coerced from query strings
    pub const INTEGER_FIELDS: [&'static str; 3] = ["version", "patchlevel", "sublevel"];
}

impl FromDocument for KernelVersion {
    fn read(reader: &mut DocReader<'_>) -> Option<Self> {
        let version = reader.strict_int("version", true);
        let patchlevel = reader.strict_int("patchlevel", true);
        let sublevel = reader.strict_int("sublevel", false);
        let extra = reader.optional("extra");
        let name = reader.optional("name");

        Some(KernelVersion {
            version: version?,
            patchlevel: patchlevel?,
            sublevel,
            extra,
            name,
        })
    }
}

/// A git checkout pointer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Revision {
    /// Tree name, e.g. mainline
    pub tree: String,
    /// Repository URL
    pub url: String,
    pub branch: String,
    /// Commit SHA
    pub commit: String,
    /// `git describe` output
    pub describe: Option<String>,
    pub version: Option<KernelVersion>,
    /// Patchset hash
    pub patchset: Option<String>,
    pub commit_tags: Vec<String>,
    pub commit_message: Option<String>,
    /// Whether the commit was the branch head when it was checked out
    pub tip_of_branch: Option<bool>,
}

impl FromDocument for Revision {
    fn read(reader: &mut DocReader<'_>) -> Option<Self> {
        let tree = reader.required("tree");
        let url = reader.url("url", UrlKind::Any, true);
        let branch = reader.required("branch");
        let commit = reader.required("commit");
        let describe = reader.optional("describe");
        let version = reader.nested("version");
        let patchset = reader.optional("patchset");
        let commit_tags = reader.or_default("commit_tags");
        let commit_message = reader.optional("commit_message");
        let tip_of_branch = reader.optional("tip_of_branch");

        Some(Revision {
            tree: tree?,
            url: url?,
            branch: branch?,
            commit: commit?,
            describe,
            version,
            patchset,
            commit_tags,
            commit_message,
            tip_of_branch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read_revision(value: serde_json::Value) -> (Option<Revision>, Vec<String>) {
        let map = value.as_object().unwrap().clone();
        let mut errors = Vec::new();
        let mut reader = DocReader::new(&map, "data.kernel_revision", &mut errors);
        let revision = Revision::read(&mut reader);
        (revision, errors.into_iter().map(|e| e.field).collect())
    }

    #[test]
    fn test_read_full_revision() {
        let (revision, errors) = read_revision(json!({
            "tree": "mainline",
            "url": "https://git.kernel.org/pub/scm/linux/kernel/git/torvalds/linux.git",
            "branch": "master",
            "commit": "2a8120d7b4827380e30a3b4de1a2c0b3e1d0a2f4",
            "describe": "v6.8-rc3",
            "version": {"version": 6, "patchlevel": 8, "extra": "-rc3"},
            "commit_tags": ["v6.8-rc3"]
        }));
        assert!(errors.is_empty(), "{:?}", errors);
        let revision = revision.unwrap();
        let version = revision.version.unwrap();
        assert_eq!((version.version, version.patchlevel, version.sublevel), (6, 8, None));
        assert_eq!(revision.commit_tags, vec!["v6.8-rc3".to_string()]);
    }

    #[test]
    fn test_revision_reports_every_bad_field() {
        let (revision, errors) = read_revision(json!({
            "tree": "mainline",
            "url": "not-a-url",
            "commit": 12,
            "version": {"version": "6", "patchlevel": 8.5}
        }));
        assert!(revision.is_none());
        assert_eq!(
            errors,
            vec![
                "data.kernel_revision.url",
                "data.kernel_revision.branch",
                "data.kernel_revision.commit",
                "data.kernel_revision.version.version",
                "data.kernel_revision.version.patchlevel",
            ]
        );
    }
}
