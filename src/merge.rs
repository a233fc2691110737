//! Consolidation of per-disk record files into per-group files.
//!
//! After every disk is done, each file in the output directory whose name is
//! a disk id (`A1`, `B12`, ...) is assigned to the group named by its letter
//! prefix. All lines of a group are concatenated, sorted, and written to a
//! file named after the group (`A`, `B`, ...), replacing any previous one.
//! Files with other names, the group files themselves included, are ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::disk;
use crate::records::{self, RecordError};

/// Errors raised while merging.
#[derive(thiserror::Error, Debug)]
pub enum MergeError {
    /// The output directory could not be listed.
    #[error("Cannot list output directory {path}: {source}")]
    ListDir {
        /// Output directory
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A disk record file could not be read.
    #[error("Cannot read fingerprint file {path}: {source}")]
    Read {
        /// Record file path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A group file could not be written.
    #[error("Cannot write group file: {0}")]
    Write(#[from] RecordError),
}

/// Outcome of one merged group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    /// Group key
    pub group: String,
    /// Disk ids that contributed, sorted
    pub disks: Vec<String>,
    /// Lines written
    pub lines: usize,
}

/// Outcome of a merge pass, groups in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// One entry per group file written
    pub groups: Vec<GroupSummary>,
}

impl MergeSummary {
    /// Total lines across all group files.
    #[must_use]
    pub fn total_lines(&self) -> usize {
        self.groups.iter().map(|g| g.lines).sum()
    }
}

/// Group key of a record file name, `None` for non-record files.
#[must_use]
pub fn group_key(file_name: &str) -> Option<&str> {
    disk::group_of(file_name)
}

/// Rebuild every group file in `out_dir`.
///
/// # Errors
///
/// Fails when the directory cannot be listed, a record file cannot be read,
/// or a group file cannot be written.
pub fn merge(out_dir: &Path) -> Result<MergeSummary, MergeError> {
    let groups = collect_groups(out_dir)?;
    let mut summary = MergeSummary::default();

    for (group, sources) in groups {
        let mut lines = Vec::new();
        for source in &sources {
            let text = fs::read_to_string(&source.path).map_err(|e| MergeError::Read {
                path: source.path.clone(),
                source: e,
            })?;
            lines.extend(
                text.lines()
                    .filter(|line| !line.is_empty())
                    .map(str::to_owned),
            );
        }
        lines.sort_unstable();

        let mut contents = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in &lines {
            contents.push_str(line);
            contents.push('\n');
        }
        records::rewrite_atomic(&out_dir.join(&group), contents.as_bytes())?;

        log::debug!(
            "Merged group {} from {} disk files into {} lines",
            group,
            sources.len(),
            lines.len()
        );
        summary.groups.push(GroupSummary {
            group,
            disks: sources.into_iter().map(|s| s.disk_id).collect(),
            lines: lines.len(),
        });
    }

    Ok(summary)
}

struct SourceFile {
    disk_id: String,
    path: PathBuf,
}

fn collect_groups(out_dir: &Path) -> Result<BTreeMap<String, Vec<SourceFile>>, MergeError> {
    let list_err = |source| MergeError::ListDir {
        path: out_dir.to_path_buf(),
        source,
    };

    let mut groups: BTreeMap<String, Vec<SourceFile>> = BTreeMap::new();
    for entry in fs::read_dir(out_dir).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        if !entry.file_type().map_err(list_err)?.is_file() {
            continue;
        }

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(group) = group_key(name) else {
            log::trace!("Not a disk record file: {name}");
            continue;
        };

        groups.entry(group.to_string()).or_default().push(SourceFile {
            disk_id: name.to_string(),
            path: entry.path(),
        });
    }

    for sources in groups.values_mut() {
        sources.sort_by(|a, b| a.disk_id.cmp(&b.disk_id));
    }
    Ok(groups)
}
