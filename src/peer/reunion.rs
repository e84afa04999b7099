use std::{sync::Arc, time::Instant};

use codec::{Address, Packet, Payload};

use super::{Peer, Role};

enum ClientAction {
    Hello,
    Readvertise(Address),
}

impl Peer {
    /// The reunion daemon.
    ///
    /// The root watches for peers whose hellos stopped arriving and
    /// prunes their subtrees. A connected client alternates between
    /// launching a hello up the tree and watching the acceptance
    /// deadline of the one in flight; missing the deadline means the
    /// path to the root is gone and the client re-advertises over its
    /// register link, since the main loop holds the data path while
    /// disconnected.
    pub async fn run_reunion(self: Arc<Self>) {
        let mut tick = tokio::time::interval(self.reunion_interval);

        loop {
            tick.tick().await;

            match &self.role {
                Role::Root(_) => self.prune_expired(),
                Role::Client(client) => {
                    let root = client.root;
                    self.client_reunion_cycle(root).await;
                }
            }
        }
    }

    pub(crate) fn prune_expired(&self) {
        let Role::Root(state) = &self.role else {
            return;
        };

        for address in state.registry.expired(Instant::now(), self.reunion_timeout) {
            log::warn!("reunion timeout, pruning subtree: addr={address}");

            let mut graph = state.graph.lock();
            graph.turn_off_subtree(&address);
            state.registry.remove(&address);
            graph.remove_node(&address);
        }
    }

    pub(crate) async fn client_reunion_cycle(&self, root: Address) {
        let action = {
            let mut link = self.link.lock();
            if !link.connected {
                None
            } else if !link.awaiting_helloback {
                link.awaiting_helloback = true;
                link.last_hello_sent_at = Some(Instant::now());

                Some(ClientAction::Hello)
            } else if link
                .last_hello_sent_at
                .is_none_or(|at| at.elapsed() >= self.reunion_timeout)
            {
                link.detach();

                Some(ClientAction::Readvertise(root))
            } else {
                None
            }
        };

        match action {
            Some(ClientAction::Hello) => {
                self.broadcast(
                    Packet::new(
                        self.address,
                        Payload::ReunionHello {
                            path: vec![self.address],
                        },
                    ),
                    None,
                )
                .await;
            }
            Some(ClientAction::Readvertise(root)) => {
                log::warn!("reunion failed, advertising again: root={root}");

                self.send_register(Packet::new(self.address, Payload::AdvertiseReq), root)
                    .await;
                self.stream.flush(true).await;
            }
            None => {}
        }
    }
}
