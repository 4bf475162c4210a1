/// Receives the outcome of a permission request.
pub type PermissionCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Microphone permission subsystem of the platform.
pub trait PermissionProvider: Send + Sync {
    /// Whether recording is currently allowed. A permission that has not
    /// been decided yet counts as allowed; only an explicit denial is `false`.
    fn has_record_permission(&self) -> bool;

    /// Ask the user for permission. `callback` runs exactly once, possibly
    /// on another thread.
    fn request_record_permission(&self, callback: PermissionCallback);
}
