pub mod node;

use std::sync::Arc;

use ahash::{HashMap, HashMapExt};
use anyhow::Result;
use bytes::{Bytes, BytesMut};
use codec::Address;
use parking_lot::Mutex;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

use self::node::{ACK, Node};

/// Upper bound for a single frame; anything claiming more than this is
/// treated as a poisoned connection.
pub const MAX_FRAME_SIZE: usize = 2048;

/// One data link per known remote, plus at most one register link.
///
/// The register link is the client's control connection to the root and
/// carries nothing but register and advertise requests. It is kept out
/// of the address map on purpose: the first clients are handed the root
/// itself as their tree parent, and their join, message and reunion
/// frames to that same address still have to travel a plain data link.
#[derive(Default)]
struct Nodes {
    data: HashMap<Address, Node>,
    register: Option<Node>,
}

/// The connection layer of one peer.
///
/// Owns the listening endpoint: an accept loop reassembles frames from
/// every inbound connection into the shared in-buffer and acknowledges
/// each one. Outbound, it keeps one [`Node`] per known remote and
/// flushes their queues on demand, evicting whichever links die.
pub struct Stream {
    local: Address,
    in_buf: Mutex<Vec<Bytes>>,
    nodes: tokio::sync::Mutex<Nodes>,
}

impl Stream {
    /// Binds the listener at `local` and starts the accept loop.
    pub async fn bind(local: Address) -> Result<Arc<Self>> {
        let listener = TcpListener::bind((local.ip, local.port)).await?;

        let stream = Arc::new(Self {
            local,
            in_buf: Mutex::new(Vec::new()),
            nodes: tokio::sync::Mutex::new(Nodes::default()),
        });

        let this = stream.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, address)) = listener.accept().await {
                log::info!(
                    "tcp socket accept: addr={address:?}, interface={}",
                    this.local
                );

                if let Err(e) = socket.set_nodelay(true) {
                    log::error!("tcp socket set nodelay failed!: addr={address}, err={e}");
                }

                let this = this.clone();
                tokio::spawn(async move {
                    let mut buffer = BytesMut::with_capacity(MAX_FRAME_SIZE);

                    'a: loop {
                        match socket.read_buf(&mut buffer).await {
                            // A zero read means the remote closed the
                            // connection.
                            Ok(0) | Err(_) => break,
                            Ok(_) => {}
                        }

                        // A stalled sender must not pin unbounded memory.
                        if buffer.len() > MAX_FRAME_SIZE * 3 {
                            break;
                        }

                        loop {
                            // Not enough bytes yet to even read the
                            // length field.
                            if buffer.len() < 8 {
                                break;
                            }

                            let size = match codec::frame_size(&buffer) {
                                Ok(size) if size <= MAX_FRAME_SIZE => size,
                                _ => {
                                    log::warn!(
                                        "unframeable input: addr={address:?}, interface={}",
                                        this.local
                                    );

                                    break 'a;
                                }
                            };

                            if size > buffer.len() {
                                break;
                            }

                            let frame = buffer.split_to(size).freeze();
                            this.in_buf.lock().push(frame);

                            if socket.write_all(ACK).await.is_err() {
                                break 'a;
                            }
                        }
                    }

                    log::info!(
                        "tcp socket disconnect: addr={address:?}, interface={}",
                        this.local
                    );
                });
            }

            log::error!("tcp server close: interface={}", this.local);
        });

        log::info!("peer listening: listen={}", stream.local);

        Ok(stream)
    }

    pub fn local_address(&self) -> Address {
        self.local
    }

    /// Snapshot of the inbound frames, cleared in the same critical
    /// section so nothing slips between the read and the clear.
    pub fn read_in_buf(&self) -> Vec<Bytes> {
        std::mem::take(&mut *self.in_buf.lock())
    }

    /// Registers a remote, keeping an existing node (and its queue) if
    /// one is already there.
    pub async fn add_node(&self, address: Address, register: bool) {
        let mut nodes = self.nodes.lock().await;
        if register {
            if nodes.register.is_none() {
                nodes.register = Some(Node::new(address, true));
            }
        } else {
            nodes
                .data
                .entry(address)
                .or_insert_with(|| Node::new(address, false));
        }
    }

    pub async fn remove_node(&self, address: &Address) {
        if self.nodes.lock().await.data.remove(address).is_some() {
            log::info!("node removed: addr={address}");
        }
    }

    pub async fn contains_node(&self, address: &Address) -> bool {
        self.nodes.lock().await.data.contains_key(address)
    }

    /// Queues a frame for one data link. An unknown destination is a
    /// routine condition (a pruned or never-joined neighbor) and only
    /// costs a log line.
    pub async fn enqueue(&self, address: &Address, frame: Bytes) {
        match self.nodes.lock().await.data.get_mut(address) {
            Some(node) => node.enqueue(frame),
            None => log::warn!("unknown destination: addr={address}"),
        }
    }

    /// Queues a control frame for the register link.
    pub async fn enqueue_register(&self, frame: Bytes) {
        match self.nodes.lock().await.register.as_mut() {
            Some(node) => node.enqueue(frame),
            None => log::warn!("no register link"),
        }
    }

    /// Flushes every link, or only the register one, and evicts the
    /// links that died doing it. Returns the evicted addresses.
    pub async fn flush(&self, only_register: bool) -> Vec<Address> {
        let mut nodes = self.nodes.lock().await;

        let mut evicted = Vec::new();
        if let Some(register) = nodes.register.as_mut() {
            if let Err(e) = register.flush().await {
                log::warn!("register link dead: addr={}, err={e}", register.address());
                evicted.push(register.address());
                nodes.register = None;
            }
        }

        if !only_register {
            for node in nodes.data.values_mut() {
                if let Err(e) = node.flush().await {
                    log::warn!("link dead: addr={}, err={e}", node.address());
                    evicted.push(node.address());
                }
            }

            for address in &evicted {
                nodes.data.remove(address);
            }
        }

        evicted
    }

    #[cfg(test)]
    pub(crate) async fn pending(&self, address: &Address) -> usize {
        self.nodes
            .lock()
            .await
            .data
            .get(address)
            .map(Node::pending)
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) async fn pending_register(&self) -> usize {
        self.nodes
            .lock()
            .await
            .register
            .as_ref()
            .map(Node::pending)
            .unwrap_or_default()
    }
}
