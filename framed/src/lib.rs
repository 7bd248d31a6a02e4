//! A modified version of the `tokio` UDP socket
//! designed to work with high level DHCP messages.

mod socket;

pub use self::socket::{DhcpFramed, BUFFER_READ_CAPACITY, BUFFER_WRITE_CAPACITY};
