//! Error type shared by all collectors.

use crate::collector::procfs::parser::ParseError;

/// Error type for collection failures.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// I/O error reading kernel files or talking to the netlink socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Parse error in kernel text files.
    #[error("parse error: {0}")]
    Parse(String),
    /// The kernel answered a dump request with an `NLMSG_ERROR` marker.
    #[error("netlink error: errno {errno}")]
    Netlink { errno: i32 },
    /// The netlink stream ended before the `NLMSG_DONE` marker.
    #[error("netlink stream ended before NLMSG_DONE")]
    Truncated,
    /// The requested logical CPU is not tracked by the engine.
    #[error("no such cpu: {0}")]
    NoSuchCpu(usize),
    /// The running kernel does not expose the required interface.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

impl From<ParseError> for CollectError {
    fn from(e: ParseError) -> Self {
        CollectError::Parse(e.message)
    }
}
