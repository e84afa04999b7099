use std::io;

use bytes::Bytes;
use codec::Address;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

/// Acknowledgment written back by the listening side after every frame.
pub const ACK: &[u8; 3] = b"ACK";

/// An outbound link to one known remote peer.
///
/// Frames queue up in order and go out together on [`Node::flush`] over
/// a persistent connection that is only opened on first use. A register
/// node is the client end of the control connection to the root and
/// never carries data traffic.
pub struct Node {
    address: Address,
    register: bool,
    socket: Option<TcpStream>,
    out_buf: Vec<Bytes>,
}

impl Node {
    pub fn new(address: Address, register: bool) -> Self {
        Self {
            address,
            register,
            socket: None,
            out_buf: Vec::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn is_register(&self) -> bool {
        self.register
    }

    pub fn enqueue(&mut self, frame: Bytes) {
        self.out_buf.push(frame);
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.out_buf.len()
    }

    /// Transmits the queued frames in order, waiting for the remote
    /// `ACK` after each one. Any transport failure drops the connection
    /// and the whole queue; the caller treats the error as a dead link
    /// and evicts this node.
    pub async fn flush(&mut self) -> io::Result<()> {
        if self.out_buf.is_empty() {
            return Ok(());
        }

        let result = self.try_flush().await;
        if result.is_err() {
            self.socket = None;
        }

        self.out_buf.clear();
        result
    }

    async fn try_flush(&mut self) -> io::Result<()> {
        if self.socket.is_none() {
            let socket = TcpStream::connect((self.address.ip, self.address.port)).await?;
            if let Err(e) = socket.set_nodelay(true) {
                log::warn!("set nodelay failed: addr={}, err={e}", self.address);
            }

            self.socket = Some(socket);
        }

        let mut ack = [0u8; 3];
        if let Some(socket) = self.socket.as_mut() {
            for frame in &self.out_buf {
                socket.write_all(frame).await?;
                socket.read_exact(&mut ack).await?;
                if &ack != ACK {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "remote did not acknowledge",
                    ));
                }
            }
        }

        Ok(())
    }
}
