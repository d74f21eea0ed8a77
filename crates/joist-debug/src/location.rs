//! Source-location resolution, including the legacy string fallback for
//! engines without direct location queries.

use joist_build_model::{BuildModel, SourceLocation, TargetRef, TaskRef};

/// How locations are obtained from the engine; resolved once per build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum LocationMode {
    #[default]
    Direct,
    Legacy,
}

pub(crate) fn task_location<M: BuildModel>(
    model: &M,
    mode: LocationMode,
    task: TaskRef,
) -> SourceLocation {
    match mode {
        LocationMode::Direct => model.task_location(task).unwrap_or_else(SourceLocation::unknown),
        LocationMode::Legacy => model
            .task_location_legacy(task)
            .map(|raw| parse_legacy_location(&raw))
            .unwrap_or_else(SourceLocation::unknown),
    }
}

pub(crate) fn target_location<M: BuildModel>(
    model: &M,
    mode: LocationMode,
    target: TargetRef,
) -> SourceLocation {
    match mode {
        LocationMode::Direct => model
            .target_location(target)
            .unwrap_or_else(SourceLocation::unknown),
        LocationMode::Legacy => model
            .target_location_legacy(target)
            .map(|raw| parse_legacy_location(&raw))
            .unwrap_or_else(SourceLocation::unknown),
    }
}

/// Parse a legacy `"file: line: "` location string.
///
/// Splits at the last interior colon so drive-letter paths survive. Anything
/// unparsable degrades to line `0` / unknown file rather than failing.
pub fn parse_legacy_location(raw: &str) -> SourceLocation {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix(':').unwrap_or(trimmed).trim_end();
    if trimmed.is_empty() {
        return SourceLocation::unknown();
    }

    let Some((file, line)) = trimmed.rsplit_once(':') else {
        return SourceLocation {
            file: Some(trimmed.to_string()),
            line: 0,
        };
    };

    let line = line.trim().parse::<u32>().unwrap_or(0);
    let file = file.trim_end();
    if file.is_empty() {
        return SourceLocation { file: None, line };
    }
    SourceLocation::new(file, line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_strings() {
        assert_eq!(
            parse_legacy_location("build.xml: 12: "),
            SourceLocation::new("build.xml", 12)
        );
        assert_eq!(
            parse_legacy_location("/src/build.xml: 3:"),
            SourceLocation::new("/src/build.xml", 3)
        );
    }

    #[test]
    fn splits_at_the_last_colon_for_drive_letters() {
        assert_eq!(
            parse_legacy_location("C:\\src\\build.xml: 40: "),
            SourceLocation::new("C:\\src\\build.xml", 40)
        );
    }

    #[test]
    fn degrades_instead_of_failing() {
        assert_eq!(parse_legacy_location(""), SourceLocation::unknown());
        assert_eq!(parse_legacy_location("   "), SourceLocation::unknown());
        assert_eq!(
            parse_legacy_location("build.xml"),
            SourceLocation {
                file: Some("build.xml".to_string()),
                line: 0,
            }
        );
        assert_eq!(
            parse_legacy_location("build.xml: eleven: "),
            SourceLocation {
                file: Some("build.xml".to_string()),
                line: 0,
            }
        );
    }
}
