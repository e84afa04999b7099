//! ## Overlay service state
//!
//! The pure state of the overlay, with no sockets attached: the root's
//! tree of admitted peers ([`graph::NetworkGraph`]), the root's record of
//! reunion arrivals ([`session::LivenessRegistry`]), a peer's own view of
//! its tree neighbors ([`link::LinkState`]) and the policy that decides
//! which neighbors a frame fans out to ([`routing::route`]).
//!
//! The peer loop owns all of it; everything here is deterministic and
//! driven entirely by decoded packets and clock readings handed in from
//! outside.

pub mod graph;
pub mod link;
pub mod routing;
pub mod session;

pub use self::{
    graph::{GraphNode, NetworkGraph},
    link::LinkState,
    routing::{Route, route},
    session::LivenessRegistry,
};
