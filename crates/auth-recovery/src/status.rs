//! Externally visible recovery status.

use crate::collaborators::Presenter;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// Tri-state authorization indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authorization {
    Unauthenticated,
    Refreshing,
    Authenticated,
}

impl Authorization {
    /// Numeric form used by status indicators (-1, 0, 1).
    pub fn as_i8(self) -> i8 {
        match self {
            Authorization::Unauthenticated => -1,
            Authorization::Refreshing => 0,
            Authorization::Authenticated => 1,
        }
    }
}

/// Transient message accompanying the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusNotice {
    Reauthorizing,
    NetworkRetrying,
    ServerRetrying,
}

impl StatusNotice {
    pub fn message(self) -> &'static str {
        match self {
            StatusNotice::Reauthorizing => "Reauthorizing...",
            StatusNotice::NetworkRetrying => "Network error, retrying...",
            StatusNotice::ServerRetrying => "Server error, retrying...",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub authorization: Authorization,
    pub popup_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<StatusNotice>,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            authorization: Authorization::Authenticated,
            popup_active: false,
            notice: None,
        }
    }
}

/// Shared status cell. Every update is rendered through the presenter.
#[derive(Clone)]
pub struct StatusBoard {
    status: Arc<Mutex<Status>>,
    presenter: Arc<dyn Presenter>,
}

impl StatusBoard {
    pub fn new(presenter: Arc<dyn Presenter>) -> Self {
        Self {
            status: Arc::new(Mutex::new(Status::default())),
            presenter,
        }
    }

    pub fn snapshot(&self) -> Status {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply `change`, then render the resulting status.
    pub fn update(&self, change: impl FnOnce(&mut Status)) -> Status {
        let snapshot = {
            let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
            change(&mut status);
            status.clone()
        };
        self.presenter.render_status(&snapshot);
        snapshot
    }

    pub fn presenter(&self) -> &Arc<dyn Presenter> {
        &self.presenter
    }
}
