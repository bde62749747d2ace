//! Steps shipped with the engine

mod call_detail;
mod dialog_tracking;
mod session_guard;

pub use call_detail::CallDetailStep;
pub use dialog_tracking::DialogTrackingStep;
pub use session_guard::RequireSessionDescription;
