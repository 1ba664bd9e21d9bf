//! Three-way merge of section lists.
//!
//! Sections are matched by [`SectionId`], never by position. For every id
//! seen locally or remotely, the local and remote copies are compared with
//! the origin copy (the content both sides last agreed on):
//!
//! | origin | local | remote | outcome |
//! |--------|-------|--------|---------|
//! | -      | L     | -      | accept L (local addition) |
//! | -      | -     | R      | accept R (remote addition) |
//! | O      | O     | -      | dropped (remote deletion) |
//! | O      | -     | O      | dropped (local deletion) |
//! | O      | L     | O      | accept L |
//! | O      | O     | R      | accept R |
//! | *      | X     | X      | accept X |
//! | O      | L     | R      | conflict (L, R) |
//! | O      | L     | -      | conflict (L, none) |
//! | O      | -     | R      | conflict (none, R) |
//!
//! Without origin content every id is treated as new, so deletions since the
//! origin cannot be told apart from additions and show up as additions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{PassfileError, Result};
use crate::model::{PassFileId, Section, SectionId};

/// Version and content timestamp of one side of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionStamp {
    pub version: u32,
    pub changed_on: DateTime<Utc>,
}

/// How the operator settled a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    KeepLocal,
    KeepRemote,
    /// Keep both; the remote copy gets a fresh section id.
    KeepBoth,
    /// Drop the section entirely.
    Discard,
}

/// Divergent copies of one section. At most one side is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict<S> {
    pub id: SectionId,
    pub local: Option<S>,
    pub remote: Option<S>,
    resolution: Option<Resolution>,
}

impl<S> Conflict<S> {
    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum MergeEntry<S> {
    Accepted(S),
    Conflict(Conflict<S>),
}

/// Result of merging a passfile's local content with its remote content.
#[derive(Debug, Clone)]
pub struct PassFileMerge<S> {
    pub passfile_id: PassFileId,
    pub local: VersionStamp,
    pub remote: VersionStamp,
    /// The branching point; `None` for passfiles never synced before.
    pub origin: Option<VersionStamp>,
    /// Origin content was unavailable, so deletions could not be detected.
    pub degraded: bool,
    entries: Vec<MergeEntry<S>>,
}

impl<S: Section> PassFileMerge<S> {
    /// Merge `local` and `remote` against `origin`.
    ///
    /// Pass `origin_sections = None` when the origin content is not cached
    /// locally; the merge then runs degraded.
    pub fn new(
        passfile_id: PassFileId,
        local: VersionStamp,
        remote: VersionStamp,
        origin: Option<VersionStamp>,
        local_sections: &[S],
        origin_sections: Option<&[S]>,
        remote_sections: &[S],
    ) -> Self {
        let degraded = origin_sections.is_none();
        if degraded {
            tracing::warn!(
                "Merging passfile {} without origin content; deletions since the origin will reappear",
                passfile_id
            );
        }
        let entries = merge_sections(local_sections, origin_sections, remote_sections);
        Self {
            passfile_id,
            local,
            remote,
            origin,
            degraded,
            entries,
        }
    }

    /// Conflicts in union order.
    pub fn conflicts(&self) -> Vec<&Conflict<S>> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                MergeEntry::Conflict(conflict) => Some(conflict),
                MergeEntry::Accepted(_) => None,
            })
            .collect()
    }

    pub fn conflict_count(&self) -> usize {
        self.conflicts().len()
    }

    pub fn unresolved_count(&self) -> usize {
        self.conflicts()
            .iter()
            .filter(|conflict| !conflict.is_resolved())
            .count()
    }

    pub fn is_resolved(&self) -> bool {
        self.unresolved_count() == 0
    }

    /// Settle the conflict at `index` (position in [`conflicts`](Self::conflicts)).
    ///
    /// A conflict may be re-resolved until the merge is committed.
    pub fn resolve(&mut self, index: usize, resolution: Resolution) -> Result<()> {
        let conflict = self
            .entries
            .iter_mut()
            .filter_map(|entry| match entry {
                MergeEntry::Conflict(conflict) => Some(conflict),
                MergeEntry::Accepted(_) => None,
            })
            .nth(index)
            .ok_or_else(|| {
                PassfileError::InvalidInput(format!("No merge conflict at index {}", index))
            })?;
        conflict.resolution = Some(resolution);
        Ok(())
    }

    /// Settle every open conflict the same way.
    pub fn resolve_all(&mut self, resolution: Resolution) {
        for entry in &mut self.entries {
            if let MergeEntry::Conflict(conflict) = entry {
                if conflict.resolution.is_none() {
                    conflict.resolution = Some(resolution);
                }
            }
        }
    }

    /// The merged section list.
    ///
    /// # Errors
    ///
    /// Returns `PassfileError::UnresolvedConflicts` while any conflict is open.
    pub fn result(&self) -> Result<Vec<S>> {
        let unresolved = self.unresolved_count();
        if unresolved > 0 {
            return Err(PassfileError::UnresolvedConflicts(unresolved));
        }
        let mut sections = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            match entry {
                MergeEntry::Accepted(section) => sections.push(section.clone()),
                MergeEntry::Conflict(conflict) => {
                    apply_resolution(conflict, &mut sections);
                }
            }
        }
        Ok(sections)
    }
}

fn apply_resolution<S: Section>(conflict: &Conflict<S>, sections: &mut Vec<S>) {
    match conflict.resolution {
        Some(Resolution::KeepLocal) => sections.extend(conflict.local.clone()),
        Some(Resolution::KeepRemote) => sections.extend(conflict.remote.clone()),
        Some(Resolution::KeepBoth) => {
            sections.extend(conflict.local.clone());
            if let Some(remote) = &conflict.remote {
                if conflict.local.is_some() {
                    sections.push(with_fresh_id(remote));
                } else {
                    sections.push(remote.clone());
                }
            }
        }
        Some(Resolution::Discard) | None => {}
    }
}

/// Copy of `section` under a new identity, so both copies can coexist.
fn with_fresh_id<S: Section>(section: &S) -> S {
    // Sections serialize their id under "id"; swapping it through the
    // serde value keeps this generic over every section shape.
    let mut value = match serde_json::to_value(section) {
        Ok(value) => value,
        Err(_) => return section.clone(),
    };
    if let Some(object) = value.as_object_mut() {
        object.insert(
            "id".to_string(),
            serde_json::Value::String(SectionId::new().to_string()),
        );
    }
    serde_json::from_value(value).unwrap_or_else(|_| section.clone())
}

fn merge_sections<S: Section>(
    local: &[S],
    origin: Option<&[S]>,
    remote: &[S],
) -> Vec<MergeEntry<S>> {
    let origin_by_id: HashMap<SectionId, &S> = origin
        .unwrap_or_default()
        .iter()
        .map(|section| (section.id(), section))
        .collect();
    let remote_by_id: HashMap<SectionId, &S> =
        remote.iter().map(|section| (section.id(), section)).collect();
    let local_by_id: HashMap<SectionId, &S> =
        local.iter().map(|section| (section.id(), section)).collect();

    let union = local
        .iter()
        .map(Section::id)
        .chain(
            remote
                .iter()
                .map(Section::id)
                .filter(|id| !local_by_id.contains_key(id)),
        );

    let mut entries = Vec::new();
    for id in union {
        let base = origin_by_id.get(&id).copied();
        let mine = local_by_id.get(&id).copied();
        let theirs = remote_by_id.get(&id).copied();
        if let Some(entry) = merge_one(id, base, mine, theirs) {
            entries.push(entry);
        }
    }
    entries
}

fn merge_one<S: Section>(
    id: SectionId,
    base: Option<&S>,
    mine: Option<&S>,
    theirs: Option<&S>,
) -> Option<MergeEntry<S>> {
    let conflict = |local: Option<&S>, remote: Option<&S>| {
        MergeEntry::Conflict(Conflict {
            id,
            local: local.cloned(),
            remote: remote.cloned(),
            resolution: None,
        })
    };
    match (base, mine, theirs) {
        (_, Some(l), Some(r)) if l == r => Some(MergeEntry::Accepted(l.clone())),
        (None, Some(l), None) => Some(MergeEntry::Accepted(l.clone())),
        (None, None, Some(r)) => Some(MergeEntry::Accepted(r.clone())),
        (None, Some(l), Some(r)) => Some(conflict(Some(l), Some(r))),
        (Some(o), Some(l), Some(r)) => {
            if l == o {
                Some(MergeEntry::Accepted(r.clone()))
            } else if r == o {
                Some(MergeEntry::Accepted(l.clone()))
            } else {
                Some(conflict(Some(l), Some(r)))
            }
        }
        (Some(o), Some(l), None) => {
            if l == o {
                None
            } else {
                Some(conflict(Some(l), None))
            }
        }
        (Some(o), None, Some(r)) => {
            if r == o {
                None
            } else {
                Some(conflict(None, Some(r)))
            }
        }
        (_, None, None) => None,
    }
}
