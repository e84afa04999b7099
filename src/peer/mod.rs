pub mod reunion;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::BytesMut;
use codec::{Address, MAX_PATH_ENTRIES, Packet, Payload};
use parking_lot::Mutex;
use service::{
    graph::NetworkGraph,
    link::LinkState,
    routing::{self, Route},
    session::LivenessRegistry,
};

use crate::{
    config::{Boot, Config},
    server::Stream,
    ui::{Command, UserInterface},
};

/// Root-only state: the admitted tree and the reunion arrival record.
pub struct RootState {
    pub graph: Mutex<NetworkGraph>,
    pub registry: LivenessRegistry,
}

/// Client-only state; the mutable part lives in [`Peer::link`].
pub struct ClientState {
    pub root: Address,
}

pub enum Role {
    Root(RootState),
    Client(ClientState),
}

/// One overlay participant.
///
/// The same object runs both roles: the root admits peers, assigns
/// parents and prunes dead subtrees, while a client bootstraps itself
/// into the tree and keeps proving its liveness. Two cooperative loops
/// drive it, the main loop ([`Peer::run`]) and the reunion daemon
/// ([`Peer::run_reunion`]).
pub struct Peer {
    pub(crate) address: Address,
    pub(crate) stream: Arc<Stream>,
    pub(crate) ui: UserInterface,
    pub(crate) link: Mutex<LinkState>,
    pub(crate) role: Role,
    pub(crate) tick_interval: Duration,
    pub(crate) reunion_interval: Duration,
    pub(crate) reunion_timeout: Duration,
}

impl Peer {
    pub async fn new(
        boot: Boot,
        config: &Config,
        stream: Arc<Stream>,
        ui: UserInterface,
    ) -> Arc<Self> {
        let address = stream.local_address();

        let role = match boot {
            Boot::Root { .. } => Role::Root(RootState {
                graph: Mutex::new(NetworkGraph::new(address)),
                registry: LivenessRegistry::default(),
            }),
            Boot::Client { root, .. } => {
                stream.add_node(root, true).await;
                log::info!("root address set: root={root}");

                Role::Client(ClientState { root })
            }
        };

        Arc::new(Self {
            address,
            stream,
            ui,
            link: Mutex::new(LinkState::default()),
            role,
            tick_interval: Duration::from_secs(config.daemons.tick_interval),
            reunion_interval: Duration::from_secs(config.daemons.reunion_interval),
            reunion_timeout: Duration::from_secs(config.daemons.reunion_timeout),
        })
    }

    pub fn is_root(&self) -> bool {
        matches!(self.role, Role::Root(_))
    }

    /// The main loop: drain inbound, dispatch, drain the console, flush
    /// outbound. A client whose data path is not up yet only listens for
    /// the advertise response that will bring it up.
    pub async fn run(self: Arc<Self>) {
        let mut tick = tokio::time::interval(self.tick_interval);

        loop {
            tick.tick().await;

            let connected = self.is_root() || self.link.lock().connected;

            for frame in self.stream.read_in_buf() {
                let packet = match Packet::decode(&frame) {
                    Ok(packet) => packet,
                    Err(e) => {
                        log::warn!("bad packet: err={e}, size={}", frame.len());
                        continue;
                    }
                };

                if connected || matches!(packet.payload, Payload::AdvertiseRes { .. }) {
                    self.dispatch(packet).await;
                } else {
                    log::debug!(
                        "dropped while disconnected: kind={:?}, from={}",
                        packet.payload.kind(),
                        packet.source
                    );
                }
            }

            self.handle_commands().await;

            if connected {
                self.stream.flush(false).await;
            }
        }
    }

    pub(crate) async fn dispatch(&self, packet: Packet) {
        log::debug!(
            "packet received: kind={:?}, from={}",
            packet.payload.kind(),
            packet.source
        );

        match &packet.payload {
            Payload::RegisterReq { .. } | Payload::RegisterRes => {
                self.handle_register(&packet).await
            }
            Payload::AdvertiseReq | Payload::AdvertiseRes { .. } => {
                self.handle_advertise(&packet).await
            }
            Payload::Join => self.handle_join(&packet).await,
            Payload::Message { .. } => self.handle_message(packet).await,
            Payload::ReunionHello { .. } | Payload::ReunionHelloBack { .. } => {
                self.handle_reunion(packet).await
            }
        }
    }

    async fn handle_commands(&self) {
        for line in self.ui.drain() {
            let Some(command) = Command::parse(&line) else {
                log::debug!("ignored input: line={line:?}");
                continue;
            };

            log::info!("handling command: {command:?}");
            match command {
                Command::Register => {
                    let Role::Client(client) = &self.role else {
                        log::warn!("the root does not register anywhere");
                        continue;
                    };

                    self.send_register(
                        Packet::new(
                            self.address,
                            Payload::RegisterReq {
                                address: self.address,
                            },
                        ),
                        client.root,
                    )
                    .await;
                    self.stream.flush(true).await;
                }
                Command::Advertise => {
                    let Role::Client(client) = &self.role else {
                        log::warn!("the root does not advertise anywhere");
                        continue;
                    };

                    self.send_register(Packet::new(self.address, Payload::AdvertiseReq), client.root)
                        .await;
                    self.stream.flush(true).await;
                }
                Command::SendMessage(text) => {
                    self.broadcast(Packet::new(self.address, Payload::Message { text }), None)
                        .await;
                }
            }
        }
    }

    /// Only the root admits registrations; a client just hears the
    /// acknowledgment of its own.
    async fn handle_register(&self, packet: &Packet) {
        match (&self.role, &packet.payload) {
            (Role::Root(state), Payload::RegisterReq { address }) => {
                if *address != packet.source {
                    log::debug!(
                        "registrant body disagrees with header: body={address}, header={}",
                        packet.source
                    );
                }

                let sender = packet.source;
                if !state.registry.register(sender, Instant::now()) {
                    log::debug!("already registered: addr={sender}");
                    return;
                }

                self.stream.add_node(sender, false).await;
                self.send(Packet::new(self.address, Payload::RegisterRes), sender)
                    .await;

                log::info!("peer registered: addr={sender}");
            }
            (Role::Client(_), Payload::RegisterRes) => {
                log::info!("registration acknowledged: root={}", packet.source);
            }
            _ => log::debug!("register dropped: from={}", packet.source),
        }
    }

    /// The root answers an advertise request with the shallowest live
    /// parent and records the attachment; the client takes the response
    /// as its parent assignment and joins it.
    async fn handle_advertise(&self, packet: &Packet) {
        match (&self.role, &packet.payload) {
            (Role::Root(state), Payload::AdvertiseReq) => {
                let sender = packet.source;
                if !state.registry.contains(&sender) {
                    log::debug!("advertise from unregistered peer: addr={sender}");
                    return;
                }

                let neighbor = {
                    let mut graph = state.graph.lock();
                    let Some(neighbor) = graph.find_live_parent(&sender).map(|node| node.address)
                    else {
                        log::warn!("no open slot in the tree: addr={sender}");
                        return;
                    };

                    if !graph.add_node(sender, neighbor) {
                        log::warn!("graph attach failed: addr={sender}, parent={neighbor}");
                        return;
                    }

                    neighbor
                };

                log::info!("neighbor assigned: addr={sender}, parent={neighbor}");
                self.send(
                    Packet::new(self.address, Payload::AdvertiseRes { neighbor }),
                    sender,
                )
                .await;
            }
            (Role::Client(_), Payload::AdvertiseRes { neighbor }) => {
                let neighbor = *neighbor;

                self.stream.add_node(neighbor, false).await;
                self.link.lock().attach(neighbor);

                log::info!("parent assigned: parent={neighbor}");
                self.send(Packet::new(self.address, Payload::Join), neighbor)
                    .await;
            }
            _ => log::debug!("advertise dropped: from={}", packet.source),
        }
    }

    /// An advertised peer announcing itself to its assigned parent.
    async fn handle_join(&self, packet: &Packet) {
        let sender = packet.source;

        self.stream.add_node(sender, false).await;
        if self.link.lock().add_child(sender) {
            log::info!("child joined: addr={sender}");
        }
    }

    /// Tree flood: hand the text to the console and pass the frame on to
    /// every data neighbor except the link it arrived over.
    async fn handle_message(&self, packet: Packet) {
        if let Payload::Message { text } = &packet.payload {
            log::info!("message received: from={}, text={text:?}", packet.source);
        }

        let arrived_from = packet.source;
        self.broadcast(packet, Some(arrived_from)).await;
    }

    async fn handle_reunion(&self, packet: Packet) {
        match &self.role {
            Role::Root(state) => self.handle_reunion_root(state, packet).await,
            Role::Client(_) => self.handle_reunion_client(packet).await,
        }
    }

    /// The root is the hello terminus: it refreshes the originator's
    /// liveness record and reflects the path back down, reversed so the
    /// next hop leads and the originator trails.
    async fn handle_reunion_root(&self, state: &RootState, packet: Packet) {
        let Payload::ReunionHello { path } = packet.payload else {
            log::debug!("helloback dropped at the root: from={}", packet.source);
            return;
        };

        let Some(originator) = path.first().copied() else {
            return;
        };

        state.registry.touch(originator, Instant::now());
        state.graph.lock().turn_on_node(&originator);

        log::debug!("hello arrived: origin={originator}, hops={}", path.len());

        let mut reversed = path;
        reversed.reverse();

        self.broadcast(
            Packet::new(self.address, Payload::ReunionHelloBack { path: reversed }),
            None,
        )
        .await;
    }

    async fn handle_reunion_client(&self, packet: Packet) {
        match packet.payload {
            Payload::ReunionHello { mut path } => {
                if path.len() >= MAX_PATH_ENTRIES {
                    log::warn!("reunion path overflow: hops={}", path.len());
                    return;
                }

                path.push(self.address);
                self.broadcast(
                    Packet::new(self.address, Payload::ReunionHello { path }),
                    Some(packet.source),
                )
                .await;
            }
            Payload::ReunionHelloBack { path } => match helloback_step(self.address, path) {
                ReunionStep::Terminal => {
                    self.link.lock().awaiting_helloback = false;
                    log::debug!("reunion accepted");
                }
                ReunionStep::Forward(path) => {
                    self.broadcast(
                        Packet::new(self.address, Payload::ReunionHelloBack { path }),
                        Some(packet.source),
                    )
                    .await;
                }
                ReunionStep::Exhausted => {}
            },
            _ => {}
        }
    }

    /// Fans a frame out according to the direction policy, stamping this
    /// peer as the emitter. Bodies are never touched here.
    pub(crate) async fn broadcast(&self, mut packet: Packet, arrived_from: Option<Address>) {
        packet.source = self.address;

        let route = {
            let link = self.link.lock();
            routing::route(&packet.payload, self.is_root(), &link, arrived_from)
        };

        match route {
            Route::Targets(targets) => {
                let mut bytes = BytesMut::with_capacity(256);
                packet.encode(&mut bytes);
                let frame = bytes.freeze();

                for target in targets {
                    self.stream.enqueue(&target, frame.clone()).await;
                }
            }
            Route::RegisterLink => {
                if let Role::Client(client) = &self.role {
                    self.send_register(packet, client.root).await;
                }
            }
            Route::Drop => {}
        }
    }

    /// Point-to-point send over a data link, with the emitter stamp.
    pub(crate) async fn send(&self, mut packet: Packet, target: Address) {
        packet.source = self.address;

        let mut bytes = BytesMut::with_capacity(256);
        packet.encode(&mut bytes);

        self.stream.enqueue(&target, bytes.freeze()).await;
    }

    /// Control send over the register link, re-establishing it first if
    /// an earlier flush evicted it.
    pub(crate) async fn send_register(&self, mut packet: Packet, root: Address) {
        packet.source = self.address;

        let mut bytes = BytesMut::with_capacity(256);
        packet.encode(&mut bytes);

        self.stream.add_node(root, true).await;
        self.stream.enqueue_register(bytes.freeze()).await;
    }
}

enum ReunionStep {
    /// The path ends at this peer; the round trip is complete.
    Terminal,
    /// Keep falling with the consumed hop stripped off the front.
    Forward(Vec<Address>),
    /// An off-path copy that has burned through its hops.
    Exhausted,
}

/// One falling step of a helloback path: the trailing entry names the
/// originator the echo is for, the leading entry names the hop that was
/// just consumed.
fn helloback_step(local: Address, mut path: Vec<Address>) -> ReunionStep {
    if path.is_empty() {
        return ReunionStep::Exhausted;
    }

    if path.last() == Some(&local) {
        return ReunionStep::Terminal;
    }

    path.remove(0);
    if path.is_empty() {
        return ReunionStep::Exhausted;
    }

    ReunionStep::Forward(path)
}
