mod error;
mod explorer;
mod navigation;
mod session;

#[cfg(test)]
mod testing;

pub use error::{ControllerError, Notice, NoticeLevel};
pub use explorer::{classify, is_absolute_path, Explorer, Intent, Submitted};
pub use navigation::{NavigationController, NavigationState, ViewMode};
pub use session::{
    SearchSessionController, SessionPhase, SessionSnapshot, SessionStatus, SessionToken,
};
