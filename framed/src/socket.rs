//! The main DHCP socket module.

use std::{io, net::SocketAddr};

use tokio::net::UdpSocket;

use dhcp_protocol::Message;

/// Must be enough to decode all the options.
pub const BUFFER_READ_CAPACITY: usize = 8192;
/// Must be enough to encode all the options.
pub const BUFFER_WRITE_CAPACITY: usize = 8192;

/// A UDP socket abstraction working with high level DHCP messages.
pub struct DhcpFramed {
    /// `tokio::UdpSocket`.
    socket: UdpSocket,
    /// Stores received data and is used for deserialization.
    buf_read: Vec<u8>,
    /// Stores pending data and is used for serialization.
    buf_write: Vec<u8>,
}

impl DhcpFramed {
    pub fn new(socket: UdpSocket) -> Self {
        DhcpFramed {
            socket,
            buf_read: vec![0u8; BUFFER_READ_CAPACITY],
            buf_write: vec![0u8; BUFFER_WRITE_CAPACITY],
        }
    }

    /// Receives one datagram and decodes it.
    ///
    /// Returns `None` for datagrams that do not decode into a DHCP
    /// message, so that garbage on the port does not tear the socket down.
    ///
    /// # Errors
    /// `io::Error` on a socket error.
    pub async fn recv(&mut self) -> io::Result<Option<(SocketAddr, Message)>> {
        let (amount, addr) = self.socket.recv_from(&mut self.buf_read).await?;
        match Message::from_bytes(&self.buf_read[..amount]) {
            Ok(message) => Ok(Some((addr, message))),
            Err(_) => Ok(None),
        }
    }

    /// Encodes a message and sends it in a single datagram.
    ///
    /// # Errors
    /// `io::Error` on an encoding error, a socket error, or a partial write.
    pub async fn send(
        &mut self,
        addr: SocketAddr,
        message: &Message,
        max_size: Option<u16>,
    ) -> io::Result<()> {
        let amount = message.to_bytes(&mut self.buf_write, max_size)?;
        let sent = self.socket.send_to(&self.buf_write[..amount], &addr).await?;
        if sent != amount {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "Failed to write entire datagram to socket",
            ));
        }
        Ok(())
    }
}
