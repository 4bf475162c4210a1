/// Processor lifecycle.
///
/// ```text
/// idle → starting → running → stopping → idle
///           ↓
///          idle   (failed start, after rollback)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
}

impl EngineState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}
