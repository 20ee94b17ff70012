//! True-parent resolution
//!
//! Decides where a process belongs in the forest from the evidence carried
//! by its record. Rules are tried in order of decreasing evidence strength
//! and the first match wins:
//!
//! 1. a live submitter becomes the parent (`submitted-by-pid`)
//! 2. a submitter that has exited falls back to the kernel parent and the
//!    node is annotated (`submitted-by-terminated`)
//! 3. a launch descriptor becomes the parent (`launch-origin`)
//! 4. a responsible process other than itself becomes the parent
//!    (`responsible-pid`)
//! 5. the kernel parent (`raw-ppid`)
//!
//! Resolution reads the registry but never mutates it. Applying the
//! annotation and creating launch-origin nodes is left to the builder.

use crate::models::{Evidence, ProcessRecord};
use crate::registry::NodeRegistry;

/// Where a process should be attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentTarget<'a> {
    /// The node of a process, which may or may not be live
    Process(u32),
    /// The shared node of a launch descriptor
    LaunchOrigin(&'a str),
}

/// Outcome of resolving one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    pub target: ParentTarget<'a>,
    pub evidence: Evidence,
    /// Suffix to append to the node's display path
    pub annotation: Option<String>,
}

impl<'a> Resolution<'a> {
    fn new(target: ParentTarget<'a>, evidence: Evidence) -> Self {
        Self {
            target,
            evidence,
            annotation: None,
        }
    }
}

/// Resolve the true parent of a non-root process
pub fn resolve<'a>(record: &'a ProcessRecord, registry: &NodeRegistry) -> Resolution<'a> {
    if let Some(submitter) = record.submitted_by_pid {
        if registry.is_live(submitter) {
            return Resolution::new(ParentTarget::Process(submitter), Evidence::SubmittedByPid);
        }

        let mut resolution = Resolution::new(
            ParentTarget::Process(record.ppid),
            Evidence::SubmittedByTerminated,
        );
        resolution.annotation = Some(terminated_submitter_note(
            submitter,
            record.submitted_by_name.as_deref(),
        ));
        return resolution;
    }

    if let Some(plist) = record.plist_path.as_deref() {
        return Resolution::new(ParentTarget::LaunchOrigin(plist), Evidence::LaunchOrigin);
    }

    if record.responsible_pid != record.pid {
        return Resolution::new(
            ParentTarget::Process(record.responsible_pid),
            Evidence::ResponsiblePid,
        );
    }

    Resolution::new(ParentTarget::Process(record.ppid), Evidence::RawPpid)
}

/// Display suffix naming a submitter that is no longer running
pub fn terminated_submitter_note(pid: u32, name: Option<&str>) -> String {
    match name {
        Some(name) => format!(" (true parent {} \"{}\" has terminated)", pid, name),
        None => format!(" (true parent {} has terminated)", pid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use time::OffsetDateTime;

    fn record(pid: u32, ppid: u32, responsible: u32) -> ProcessRecord {
        ProcessRecord::new(
            pid,
            ppid,
            responsible,
            format!("/usr/bin/p{}", pid),
            OffsetDateTime::UNIX_EPOCH,
        )
    }

    fn registry(pids: &[u32]) -> NodeRegistry {
        let records: Vec<_> = pids.iter().map(|pid| record(*pid, 1, *pid)).collect();
        NodeRegistry::build_from(&records)
    }

    #[test]
    fn test_live_submitter_wins() {
        let registry = registry(&[1, 100, 300]);
        let mut proc = record(200, 100, 1);
        proc.submitted_by_pid = Some(300);
        proc.plist_path = Some("/Library/LaunchAgents/x.plist".to_string());

        let resolution = resolve(&proc, &registry);
        assert_eq!(resolution.target, ParentTarget::Process(300));
        assert_eq!(resolution.evidence, Evidence::SubmittedByPid);
        assert!(resolution.annotation.is_none());
    }

    #[test]
    fn test_terminated_submitter_falls_back_to_ppid() {
        let registry = registry(&[1, 100]);
        let mut proc = record(200, 100, 200);
        proc.submitted_by_pid = Some(999);
        proc.submitted_by_name = Some("Finder".to_string());

        let resolution = resolve(&proc, &registry);
        assert_eq!(resolution.target, ParentTarget::Process(100));
        assert_eq!(resolution.evidence, Evidence::SubmittedByTerminated);
        assert_eq!(
            resolution.annotation.as_deref(),
            Some(" (true parent 999 \"Finder\" has terminated)")
        );
    }

    #[test]
    fn test_terminated_submitter_without_name_is_still_annotated() {
        let registry = registry(&[1, 100]);
        let mut proc = record(200, 100, 200);
        proc.submitted_by_pid = Some(999);

        let resolution = resolve(&proc, &registry);
        let note = resolution.annotation.unwrap();
        assert!(note.contains("999"));
        assert!(note.contains("terminated"));
    }

    #[test]
    fn test_launch_descriptor_beats_responsible_pid() {
        let registry = registry(&[1, 500]);
        let mut proc = record(200, 1, 500);
        proc.plist_path = Some("/System/Library/LaunchDaemons/com.apple.x.plist".to_string());

        let resolution = resolve(&proc, &registry);
        assert_eq!(
            resolution.target,
            ParentTarget::LaunchOrigin("/System/Library/LaunchDaemons/com.apple.x.plist")
        );
        assert_eq!(resolution.evidence, Evidence::LaunchOrigin);
    }

    #[test]
    fn test_responsible_pid_when_different_from_self() {
        let registry = registry(&[1, 500]);
        let proc = record(501, 1, 500);

        let resolution = resolve(&proc, &registry);
        assert_eq!(resolution.target, ParentTarget::Process(500));
        assert_eq!(resolution.evidence, Evidence::ResponsiblePid);
    }

    #[test]
    fn test_raw_ppid_as_last_resort() {
        let registry = registry(&[1, 100]);
        let proc = record(200, 100, 200);

        let resolution = resolve(&proc, &registry);
        assert_eq!(resolution.target, ParentTarget::Process(100));
        assert_eq!(resolution.evidence, Evidence::RawPpid);
    }

    proptest! {
        #[test]
        fn prop_resolution_is_deterministic(
            pid in 2u32..64,
            ppid in 1u32..64,
            responsible in 1u32..64,
            submitter in proptest::option::of(1u32..64),
            has_plist in any::<bool>(),
            live in proptest::collection::vec(1u32..64, 0..16),
        ) {
            let mut proc = record(pid, ppid, responsible);
            proc.submitted_by_pid = submitter;
            if has_plist {
                proc.plist_path = Some("/Library/LaunchDaemons/p.plist".to_string());
            }
            let registry = registry(&live);

            let first = resolve(&proc, &registry);
            let same = proc.clone();
            let second = resolve(&same, &registry);
            prop_assert_eq!(&first, &second);

            match first.evidence {
                Evidence::SubmittedByPid => prop_assert!(submitter.is_some_and(|s| registry.is_live(s))),
                Evidence::SubmittedByTerminated => prop_assert!(first.annotation.is_some()),
                Evidence::LaunchOrigin => prop_assert!(submitter.is_none() && has_plist),
                Evidence::ResponsiblePid => prop_assert_ne!(responsible, pid),
                Evidence::RawPpid => prop_assert_eq!(first.target, ParentTarget::Process(ppid)),
                other => prop_assert!(false, "unexpected evidence {:?}", other),
            }
        }
    }
}
