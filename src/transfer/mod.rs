mod state;
mod sessions;

pub use state::{TransferState, TransferStatus};
pub use sessions::TransferSessions;
