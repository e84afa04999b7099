use codec::{Address, Payload};

use super::link::LinkState;

/// Where a frame leaves the local peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Data links, in fan-out order.
    Targets(Vec<Address>),
    /// The client's control connection to the root.
    RegisterLink,
    /// Nowhere; the frame ends here.
    Drop,
}

/// The broadcast direction policy.
///
/// Reunion hellos rise through the parent link and die at the root;
/// hellobacks fall through the children; messages spread both ways; and
/// register or advertise requests only ever use the register link, which
/// in turn never carries any of the data traffic.
///
/// `arrived_from` is the adjacent emitter taken from the incoming frame
/// header and is excluded from the fan-out, so a spreading message never
/// reflects back over the link it came in on.
pub fn route(
    payload: &Payload,
    is_root: bool,
    link: &LinkState,
    arrived_from: Option<Address>,
) -> Route {
    let targets = match payload {
        Payload::RegisterReq { .. } | Payload::AdvertiseReq => {
            return if is_root { Route::Drop } else { Route::RegisterLink };
        }
        Payload::ReunionHello { .. } => {
            if is_root {
                return Route::Drop;
            }

            match link.parent {
                Some(parent) => vec![parent],
                None => return Route::Drop,
            }
        }
        Payload::ReunionHelloBack { .. } => link.children.clone(),
        Payload::Message { .. } => {
            let mut targets = Vec::with_capacity(link.children.len() + 1);
            if !is_root {
                if let Some(parent) = link.parent {
                    targets.push(parent);
                }
            }

            targets.extend_from_slice(&link.children);
            targets
        }
        // Point-to-point responses are sent directly, never broadcast.
        Payload::RegisterRes | Payload::AdvertiseRes { .. } | Payload::Join => return Route::Drop,
    };

    let targets: Vec<Address> = targets
        .into_iter()
        .filter(|target| Some(*target) != arrived_from)
        .collect();

    if targets.is_empty() {
        Route::Drop
    } else {
        Route::Targets(targets)
    }
}
