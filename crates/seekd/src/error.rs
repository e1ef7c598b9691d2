use serde::{Deserialize, Serialize};
use seekcore_query::FilterError;
use seekcore_shell::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    #[error("cannot open {path}: {reason}")]
    DirectoryUnreadable { path: String, reason: String },
    #[error("cannot modify {path}: {reason}")]
    MutationFailed { path: String, reason: String },
    #[error("filter already present: {0}")]
    DuplicateFilter(String),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("search could not be started: {0}")]
    SearchInitiationFailed(String),
    #[error("load superseded by a newer request")]
    Superseded,
}

impl ControllerError {
    pub(crate) fn unreadable(path: &str, err: ServiceError) -> Self {
        match err {
            ServiceError::DirectoryUnreadable { path, reason } => {
                Self::DirectoryUnreadable { path, reason }
            }
            other => Self::DirectoryUnreadable {
                path: path.to_string(),
                reason: other.to_string(),
            },
        }
    }

    pub(crate) fn mutation(path: &str, err: ServiceError) -> Self {
        match err {
            ServiceError::MutationFailed { path, reason } => Self::MutationFailed { path, reason },
            ServiceError::InvalidRequest(reason) => Self::MutationFailed {
                path: path.to_string(),
                reason,
            },
            other => Self::MutationFailed {
                path: path.to_string(),
                reason: other.to_string(),
            },
        }
    }

    pub fn notice(&self) -> Notice {
        let level = match self {
            Self::Superseded => NoticeLevel::Info,
            Self::DuplicateFilter(_) | Self::InvalidFilter(_) => NoticeLevel::Warning,
            Self::DirectoryUnreadable { .. }
            | Self::MutationFailed { .. }
            | Self::SearchInitiationFailed(_) => NoticeLevel::Error,
        };
        Notice {
            level,
            message: self.to_string(),
        }
    }
}

impl From<FilterError> for ControllerError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::DuplicateFilter(label) => Self::DuplicateFilter(label),
            FilterError::InvalidFilter(reason) => Self::InvalidFilter(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Transient user-facing message produced from a controller error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl From<&ControllerError> for Notice {
    fn from(err: &ControllerError) -> Self {
        err.notice()
    }
}

impl From<ControllerError> for Notice {
    fn from(err: ControllerError) -> Self {
        err.notice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_levels() {
        assert_eq!(ControllerError::Superseded.notice().level, NoticeLevel::Info);
        assert_eq!(
            Notice::from(ControllerError::DuplicateFilter("type: pdf".into())).level,
            NoticeLevel::Warning
        );
        let notice = Notice::from(&ControllerError::SearchInitiationFailed("offline".into()));
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "search could not be started: offline");
    }

    #[test]
    fn service_unreadable_keeps_its_path() {
        let err = ControllerError::unreadable(
            "/requested",
            ServiceError::DirectoryUnreadable {
                path: "/real".into(),
                reason: "permission denied".into(),
            },
        );
        assert_eq!(
            err,
            ControllerError::DirectoryUnreadable {
                path: "/real".into(),
                reason: "permission denied".into()
            }
        );

        let other = ControllerError::unreadable("/x", ServiceError::Backend("boom".into()));
        assert!(matches!(other, ControllerError::DirectoryUnreadable { path, .. } if path == "/x"));
    }

    #[test]
    fn mutation_failures_name_the_entry() {
        let err = ControllerError::mutation(
            "/srv/a.txt",
            ServiceError::InvalidRequest("invalid entry name `..`".into()),
        );
        assert_eq!(
            err,
            ControllerError::MutationFailed {
                path: "/srv/a.txt".into(),
                reason: "invalid entry name `..`".into()
            }
        );
        assert_eq!(err.notice().level, NoticeLevel::Error);
        assert_eq!(
            err.notice().message,
            "cannot modify /srv/a.txt: invalid entry name `..`"
        );
    }
}
