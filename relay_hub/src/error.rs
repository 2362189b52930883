use crate::application::ServerStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to bind {address}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot {action} while {status:?}")]
    InvalidState {
        action: &'static str,
        status: ServerStatus,
    },

    #[error("Hub is not running")]
    NotRunning,

    #[error("Registry unavailable: {0}")]
    Mailbox(#[from] actix::MailboxError),

    #[error(transparent)]
    Client(#[from] relay_client::Error),
}
