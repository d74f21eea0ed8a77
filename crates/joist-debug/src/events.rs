use joist_build_model::SourceLocation;

/// Why the build thread parked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SuspendReason {
    /// The debugger client asked for a pause.
    ClientRequest,
    /// A step request reached its boundary.
    Step,
    /// Execution reached a registered breakpoint.
    Breakpoint(SourceLocation),
}

/// What released a parked build thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumeMode {
    ClientRequest,
    Step,
}

/// Downstream sink for build/debug lifecycle notifications.
///
/// `suspended` fires on the build thread just before it parks; `resumed` fires
/// on the command thread that released it. The tracker lock is not held during
/// any callback, so implementations may query the tracker (e.g. marshal the
/// stack), but they must not block on the build thread making progress.
pub trait DebugListener: Send + Sync {
    fn build_started(&self) {}
    fn suspended(&self, _reason: SuspendReason) {}
    fn resumed(&self, _mode: ResumeMode) {}
    fn build_finished(&self) {}
}

/// Listener that discards every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullListener;

impl DebugListener for NullListener {}
