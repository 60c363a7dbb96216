mod framing;
mod outbox;
mod stats;
mod tcp;
mod transport;

pub use framing::{MAX_FRAME_SIZE, read_frame, write_frame};
pub use outbox::{Outbox, SendError};
pub use stats::NetworkStats;
pub use tcp::TcpTransport;
pub use transport::{DisconnectReason, Transport, TransportError, TransportEvent};
