use std::{net::Ipv4Addr, time::Duration};

use anyhow::Result;
use arbor_peer::server::Stream;
use bytes::{Bytes, BytesMut};
use codec::{Address, Packet, Payload};

fn local(port: u16) -> Address {
    Address::new(Ipv4Addr::LOCALHOST, port)
}

fn frame(source: Address, payload: Payload) -> Bytes {
    let mut bytes = BytesMut::with_capacity(256);
    Packet::new(source, payload).encode(&mut bytes);
    bytes.freeze()
}

#[tokio::test]
async fn delivers_frames_in_enqueue_order() -> Result<()> {
    let sender = Stream::bind(local(47210)).await?;
    let receiver = Stream::bind(local(47211)).await?;

    let target = receiver.local_address();
    sender.add_node(target, false).await;

    for text in ["first", "second", "third"] {
        sender
            .enqueue(
                &target,
                frame(
                    sender.local_address(),
                    Payload::Message {
                        text: text.to_string(),
                    },
                ),
            )
            .await;
    }

    // Flush returns once every frame is acknowledged, so the receiver
    // buffer is already complete.
    assert!(sender.flush(false).await.is_empty());

    let texts: Vec<String> = receiver
        .read_in_buf()
        .iter()
        .map(|frame| match Packet::decode(frame).unwrap().payload {
            Payload::Message { text } => text,
            payload => panic!("unexpected payload: {payload:?}"),
        })
        .collect();

    assert_eq!(texts, vec!["first", "second", "third"]);
    assert!(receiver.read_in_buf().is_empty());

    Ok(())
}

#[tokio::test]
async fn evicts_dead_links_and_keeps_the_rest() -> Result<()> {
    let sender = Stream::bind(local(47213)).await?;
    let receiver = Stream::bind(local(47214)).await?;

    let live = receiver.local_address();
    let dead = local(47299);

    sender.add_node(live, false).await;
    sender.add_node(dead, false).await;

    let payload = Payload::Join;
    sender.enqueue(&live, frame(sender.local_address(), payload.clone())).await;
    sender.enqueue(&dead, frame(sender.local_address(), payload)).await;

    // Nothing listens on the dead port; that link alone is evicted.
    assert_eq!(sender.flush(false).await, vec![dead]);
    assert!(sender.contains_node(&live).await);
    assert!(!sender.contains_node(&dead).await);

    assert_eq!(receiver.read_in_buf().len(), 1);

    Ok(())
}

#[tokio::test]
async fn register_only_flush_holds_data_links_back() -> Result<()> {
    let sender = Stream::bind(local(47216)).await?;
    let control = Stream::bind(local(47217)).await?;
    let data = Stream::bind(local(47218)).await?;

    sender.add_node(control.local_address(), true).await;
    sender.add_node(data.local_address(), false).await;

    sender
        .enqueue_register(frame(sender.local_address(), Payload::AdvertiseReq))
        .await;
    sender
        .enqueue(
            &data.local_address(),
            frame(sender.local_address(), Payload::Join),
        )
        .await;

    sender.flush(true).await;
    assert_eq!(control.read_in_buf().len(), 1);
    assert!(data.read_in_buf().is_empty());

    sender.flush(false).await;
    assert_eq!(data.read_in_buf().len(), 1);

    Ok(())
}

#[tokio::test]
async fn unknown_destinations_are_dropped_quietly() -> Result<()> {
    let sender = Stream::bind(local(47220)).await?;

    sender
        .enqueue(&local(47221), frame(sender.local_address(), Payload::Join))
        .await;
    assert!(sender.flush(false).await.is_empty());

    Ok(())
}

#[tokio::test]
async fn coalesced_writes_still_split_into_frames() -> Result<()> {
    // Two frames written in one TCP segment must come out as two
    // buffered frames on the receiving side.
    let receiver = Stream::bind(local(47222)).await?;

    let mut joined = BytesMut::with_capacity(256);
    for text in ["one", "two"] {
        joined.extend_from_slice(&frame(
            local(47223),
            Payload::Message {
                text: text.to_string(),
            },
        ));
    }

    let mut socket = tokio::net::TcpStream::connect((Ipv4Addr::LOCALHOST, 47222)).await?;
    tokio::io::AsyncWriteExt::write_all(&mut socket, &joined).await?;

    let mut ack = [0u8; 6];
    tokio::io::AsyncReadExt::read_exact(&mut socket, &mut ack).await?;
    assert_eq!(&ack, b"ACKACK");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(receiver.read_in_buf().len(), 2);

    Ok(())
}
