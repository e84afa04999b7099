#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::Arc;

use arbor_peer::config::{Boot, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::load()?);
    simple_logger::init_with_level(config.log.level.as_level())?;

    // The one boot line decides the role before anything is bound:
    //
    //   add root <ip> <port>
    //   add client <ip> <port> <root-ip> <root-port>
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    let Some(boot) = Boot::parse(&line) else {
        println!("WRONG_COMMAND");
        std::process::exit(1);
    };

    arbor_peer::startup(config, boot).await
}
