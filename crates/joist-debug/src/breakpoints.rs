use std::collections::BTreeSet;

use joist_build_model::SourceLocation;

/// Line breakpoints registered by the debugger client.
///
/// Matching is exact on (file, line); locations without a file never match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BreakpointSet {
    lines: BTreeSet<(String, u32)>,
}

impl BreakpointSet {
    pub fn add(&mut self, file: impl Into<String>, line: u32) {
        self.lines.insert((file.into(), line));
    }

    pub fn remove(&mut self, file: &str, line: u32) -> bool {
        self.lines.remove(&(file.to_string(), line))
    }

    pub fn matches(&self, location: &SourceLocation) -> bool {
        match &location.file {
            Some(file) => self.lines.contains(&(file.clone(), location.line)),
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}
