//! The tunnel protocol: negotiation frames, the three-channel session
//! handshake, and the two forwarding loops.
//!
//! ```text
//!   SessionNegotiator ---> SessionChannels ---> recv_loop / send_loop
//!         (frames)          (receive, send)       (packet copying)
//! ```

pub mod forward;
pub mod frame;
pub mod session;

pub use frame::ChannelRole;
pub use session::{ChannelState, SessionChannels, SessionNegotiator};
