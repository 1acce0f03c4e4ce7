use std::fmt;

use tokio::sync::mpsc;

use crate::error::{ComposeError, StreamError};

/// A user-facing report of something that went wrong. None of these end the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Live updates are unavailable; the last known messages stay on screen.
    Offline { reason: String },
    ImageUnreadable { reason: String },
    SendFailed { reason: String },
}

impl Notice {
    /// Blocking notices want an explicit dismissal; the rest can be toasts.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Notice::ImageUnreadable { .. })
    }

    pub fn offline(err: &StreamError) -> Self {
        Notice::Offline {
            reason: err.to_string(),
        }
    }
}

impl From<&ComposeError> for Notice {
    fn from(err: &ComposeError) -> Self {
        match err {
            ComposeError::ImageRead(e) => Notice::ImageUnreadable {
                reason: e.to_string(),
            },
            ComposeError::Append(e) => Notice::SendFailed {
                reason: e.to_string(),
            },
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Offline { reason } => {
                write!(f, "Connection problem, showing offline messages ({reason})")
            }
            Notice::ImageUnreadable { reason } => {
                write!(f, "Could not convert or send the image ({reason})")
            }
            Notice::SendFailed { reason } => write!(f, "Message not sent ({reason})"),
        }
    }
}

pub type NoticeSender = mpsc::UnboundedSender<Notice>;
pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;

pub fn channel() -> (NoticeSender, NoticeReceiver) {
    mpsc::unbounded_channel()
}

/// Sends a notice, ignoring a receiver that has already gone away.
pub fn post(notices: &NoticeSender, notice: Notice) {
    if notices.send(notice).is_err() {
        log::debug!("notice dropped, nobody is listening");
    }
}
