use std::time::Instant;

use codec::Address;

/// A peer's own view of its tree neighborhood.
///
/// The root only ever fills `children`; the client fields track the
/// bootstrap handshake and the reunion round-trip in flight.
#[derive(Debug, Default)]
pub struct LinkState {
    pub parent: Option<Address>,
    pub children: Vec<Address>,
    pub connected: bool,
    pub awaiting_helloback: bool,
    pub last_hello_sent_at: Option<Instant>,
}

impl LinkState {
    /// Records the advertised parent and marks the data path live.
    pub fn attach(&mut self, parent: Address) {
        self.parent = Some(parent);
        self.connected = true;
    }

    /// Reunion failure: back to the unconnected state. Children stay;
    /// the subtree below keeps existing whether or not the path to the
    /// root does.
    pub fn detach(&mut self) {
        self.parent = None;
        self.connected = false;
        self.awaiting_helloback = false;
    }

    /// Returns false for a child that already joined.
    pub fn add_child(&mut self, child: Address) -> bool {
        if self.children.contains(&child) {
            return false;
        }

        self.children.push(child);
        true
    }
}
