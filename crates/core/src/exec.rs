//! Image-replacement detection
//!
//! launchd remembers the program it originally started. When that program's
//! file name differs from the image the process runs now, the process
//! replaced itself and both images are shown: a synthetic marker for the
//! launched program with the live process as its only child.

use crate::models::{file_name, ProcessRecord};

/// Suffix appended to the display path of an exec marker
pub const EXEC_MARKER_SUFFIX: &str = " (image replaced by below process)";

/// Display path of the exec marker for `record`, if it replaced its image.
///
/// File names are compared case-insensitively, so a re-exec of the same
/// binary under a different letter case is not reported.
pub fn detect_exec(record: &ProcessRecord) -> Option<String> {
    let program = record.program_path.as_deref()?;
    if same_file_name(program, &record.path) {
        return None;
    }
    Some(format!("{}{}", program, EXEC_MARKER_SUFFIX))
}

fn same_file_name(a: &str, b: &str) -> bool {
    file_name(a).to_lowercase() == file_name(b).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use time::OffsetDateTime;

    fn record(path: &str, program: Option<&str>) -> ProcessRecord {
        let mut record = ProcessRecord::new(300, 1, 300, path, OffsetDateTime::UNIX_EPOCH);
        record.program_path = program.map(str::to_string);
        record
    }

    #[rstest]
    #[case("/usr/libexec/bar", Some("/usr/libexec/foo"), true)]
    #[case("/usr/libexec/foo", Some("/usr/libexec/foo"), false)]
    #[case("/usr/libexec/Foo", Some("/usr/libexec/fOO"), false)]
    #[case("/Applications/App.app/Contents/MacOS/App", Some("/usr/libexec/App"), false)]
    #[case("/usr/bin/python3", Some("/usr/bin/env"), true)]
    #[case("/usr/libexec/bar", None, false)]
    fn test_detect_exec(#[case] path: &str, #[case] program: Option<&str>, #[case] fires: bool) {
        assert_eq!(detect_exec(&record(path, program)).is_some(), fires);
    }

    #[test]
    fn test_marker_keeps_program_path() {
        let marker = detect_exec(&record("/usr/libexec/bar", Some("/usr/libexec/foo"))).unwrap();
        assert!(marker.starts_with("/usr/libexec/foo"));
        assert!(marker.ends_with(EXEC_MARKER_SUFFIX));
    }

    proptest! {
        #[test]
        fn prop_case_only_differences_never_fire(name in "[a-zA-Z]{1,12}", flips in proptest::collection::vec(any::<bool>(), 12)) {
            let swapped: String = name
                .chars()
                .zip(flips.iter().cycle())
                .map(|(c, flip)| if *flip { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
                .collect();
            let rec = record(&format!("/usr/bin/{}", name), Some(&format!("/opt/{}", swapped)));
            prop_assert!(detect_exec(&rec).is_none());
        }

        #[test]
        fn prop_different_names_fire(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
            prop_assume!(a != b);
            let rec = record(&format!("/usr/bin/{}", a), Some(&format!("/usr/bin/{}", b)));
            prop_assert!(detect_exec(&rec).is_some());
        }
    }
}
