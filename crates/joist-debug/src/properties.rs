use joist_build_model::PropertyTable;

/// Origin of a build property, as reported to the debugger's properties view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyKind {
    /// Present before any target ran and not supplied by the user.
    System,
    /// Supplied by the user when the build was invoked.
    User,
    /// First defined while the build was running.
    Runtime,
}

impl PropertyKind {
    /// Numeric code used on the wire.
    pub fn code(self) -> u8 {
        match self {
            PropertyKind::System => 0,
            PropertyKind::User => 1,
            PropertyKind::Runtime => 2,
        }
    }
}

/// Classify a property by cross-referencing the pre-build snapshot and the
/// user-supplied table.
pub fn classify(initial: &PropertyTable, user: &PropertyTable, name: &str) -> PropertyKind {
    if initial.contains_key(name) {
        if user.contains_key(name) {
            PropertyKind::User
        } else {
            PropertyKind::System
        }
    } else if user.contains_key(name) {
        PropertyKind::User
    } else {
        PropertyKind::Runtime
    }
}
