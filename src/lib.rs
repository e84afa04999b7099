pub mod config;
pub mod peer;
pub mod server;
pub mod ui;

use std::sync::Arc;

use self::{
    config::{Boot, Config},
    peer::Peer,
    server::Stream,
    ui::UserInterface,
};

/// Binds the listening endpoint, wires the peer up and runs it until the
/// process is killed. Opened up as a function so integration tests can
/// start a peer without going through the binary.
pub async fn startup(config: Arc<Config>, boot: Boot) -> anyhow::Result<()> {
    let stream = Stream::bind(boot.address()).await?;
    let peer = Peer::new(boot, &config, stream, UserInterface::spawn()).await;

    tokio::spawn(peer.clone().run_reunion());
    peer.run().await;

    Ok(())
}
