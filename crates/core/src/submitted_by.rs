//! Parsing of launchd job descriptors
//!
//! launchd describes the job behind a process with a free-form `path`
//! descriptor and a `program` string. Input contract:
//!
//! ```text
//! descriptor   := ... "submitted by " name "." pid [")"] ...
//!               | ... "=" plist-path                     (contains ".plist")
//! name         := any text, may contain spaces and dots
//! pid          := decimal digits after the last "."
//! ```
//!
//! Examples: `(submitted by smd.1234)` yields submitter `smd` / 1234;
//! `system/com.apple.foo = /Library/LaunchDaemons/com.apple.foo.plist`
//! yields the plist path. Anything that does not fit is treated as absent.

use crate::models::ProcessRecord;
use serde::{Deserialize, Serialize};

const SUBMITTED_BY_MARKER: &str = "submitted by ";
const PLIST_MARKER: &str = ".plist";

/// Raw launchd strings for one process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchdDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
}

/// Fields recovered from a [`LaunchdDescriptor`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchdAttributes {
    pub submitted_by_pid: Option<u32>,
    pub submitted_by_name: Option<String>,
    pub plist_path: Option<String>,
    pub program_path: Option<String>,
}

impl LaunchdDescriptor {
    pub fn parse(&self) -> LaunchdAttributes {
        let mut attrs = LaunchdAttributes::default();

        if let Some(path) = self.path.as_deref() {
            if let Some(submitter) = parse_submitted_by(path) {
                attrs.submitted_by_name = Some(submitter.name);
                attrs.submitted_by_pid = Some(submitter.pid);
            }
            attrs.plist_path = parse_plist_path(path);
        }

        attrs.program_path = self
            .program
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        attrs
    }
}

impl LaunchdAttributes {
    /// Fill the record's launchd fields that are still empty
    pub fn apply_to(self, record: &mut ProcessRecord) {
        if record.submitted_by_pid.is_none() {
            record.submitted_by_pid = self.submitted_by_pid;
        }
        if record.submitted_by_name.is_none() {
            record.submitted_by_name = self.submitted_by_name;
        }
        if record.plist_path.is_none() {
            record.plist_path = self.plist_path;
        }
        if record.program_path.is_none() {
            record.program_path = self.program_path;
        }
    }
}

/// The process that submitted a job to launchd
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitter {
    pub name: String,
    pub pid: u32,
}

/// Extract `name.pid` following `submitted by `
pub fn parse_submitted_by(descriptor: &str) -> Option<Submitter> {
    let start = descriptor.find(SUBMITTED_BY_MARKER)? + SUBMITTED_BY_MARKER.len();
    let rest = &descriptor[start..];
    let body = match rest.find(')') {
        Some(end) => &rest[..end],
        None => rest,
    }
    .trim();

    let (name, pid) = body.rsplit_once('.')?;
    let name = name.trim();
    if name.is_empty() || pid.is_empty() || !pid.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(Submitter {
        name: name.to_string(),
        pid: pid.parse().ok()?,
    })
}

/// Extract the launch descriptor path from a descriptor mentioning a plist
pub fn parse_plist_path(descriptor: &str) -> Option<String> {
    if !descriptor.contains(PLIST_MARKER) {
        return None;
    }
    let path = descriptor
        .rsplit_once('=')
        .map(|(_, path)| path)
        .unwrap_or(descriptor)
        .trim();
    if path.is_empty() || !path.contains(PLIST_MARKER) {
        return None;
    }
    Some(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("(submitted by smd.1234)", Some(("smd", 1234)))]
    #[case("(submitted by Google Chrome.812)", Some(("Google Chrome", 812)))]
    #[case("(submitted by com.apple.xpc.launchd.512)", Some(("com.apple.xpc.launchd", 512)))]
    #[case("gui/501/(submitted by Finder.77) extra", Some(("Finder", 77)))]
    #[case("(submitted by smd.)", None)]
    #[case("(submitted by .1234)", None)]
    #[case("(submitted by smd.12a4)", None)]
    #[case("(submitted by smd)", None)]
    #[case("(submitted by smd.99999999999)", None)]
    #[case("system/com.apple.foo", None)]
    #[case("", None)]
    fn test_parse_submitted_by(#[case] input: &str, #[case] expected: Option<(&str, u32)>) {
        let parsed = parse_submitted_by(input).map(|s| (s.name, s.pid));
        assert_eq!(
            parsed,
            expected.map(|(name, pid)| (name.to_string(), pid))
        );
    }

    #[rstest]
    #[case(
        "system/com.apple.foo = /Library/LaunchDaemons/com.apple.foo.plist",
        Some("/Library/LaunchDaemons/com.apple.foo.plist")
    )]
    #[case(
        "/Users/a/Library/LaunchAgents/com.evil.plist",
        Some("/Users/a/Library/LaunchAgents/com.evil.plist")
    )]
    #[case("gui/501/com.example.agent = ", None)]
    #[case("com.plist.thing = /usr/libexec/agent", None)]
    #[case("(submitted by smd.1234)", None)]
    fn test_parse_plist_path(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(parse_plist_path(input).as_deref(), expected);
    }

    #[test]
    fn test_descriptor_parse_collects_all_fields() {
        let descriptor = LaunchdDescriptor {
            path: Some("(submitted by loginwindow.402)".to_string()),
            program: Some(" /usr/libexec/foo ".to_string()),
        };
        let attrs = descriptor.parse();
        assert_eq!(attrs.submitted_by_pid, Some(402));
        assert_eq!(attrs.submitted_by_name.as_deref(), Some("loginwindow"));
        assert_eq!(attrs.plist_path, None);
        assert_eq!(attrs.program_path.as_deref(), Some("/usr/libexec/foo"));
    }

    #[test]
    fn test_empty_program_is_absent() {
        let descriptor = LaunchdDescriptor {
            path: None,
            program: Some("   ".to_string()),
        };
        assert_eq!(descriptor.parse(), LaunchdAttributes::default());
    }

    #[test]
    fn test_apply_to_keeps_existing_fields() {
        let mut record = ProcessRecord::new(
            10,
            1,
            10,
            "/usr/bin/x",
            time::OffsetDateTime::UNIX_EPOCH,
        );
        record.plist_path = Some("/already/set.plist".to_string());

        LaunchdAttributes {
            submitted_by_pid: Some(5),
            submitted_by_name: Some("smd".to_string()),
            plist_path: Some("/other.plist".to_string()),
            program_path: None,
        }
        .apply_to(&mut record);

        assert_eq!(record.submitted_by_pid, Some(5));
        assert_eq!(record.plist_path.as_deref(), Some("/already/set.plist"));
        assert_eq!(record.program_path, None);
    }
}
