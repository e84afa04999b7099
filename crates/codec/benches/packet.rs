use arbor_peer_codec::{Address, Packet, Payload};
use bytes::BytesMut;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};

fn criterion_benchmark(c: &mut Criterion) {
    let source: Address = "192.168.000.001:65000".parse().unwrap();
    let path: Vec<Address> = (1..=8)
        .map(|i| Address::new([10, 0, 0, i].into(), 10_000 + i as u16))
        .collect();

    let packets = [
        Packet::new(
            source,
            Payload::Message {
                text: "Hello World!".to_string(),
            },
        ),
        Packet::new(source, Payload::ReunionHello { path }),
        Packet::new(source, Payload::AdvertiseRes { neighbor: source }),
    ];

    let mut frames = Vec::new();
    for packet in &packets {
        let mut bytes = BytesMut::with_capacity(256);
        packet.encode(&mut bytes);
        frames.push(bytes.freeze());
    }

    let mut packet_criterion = c.benchmark_group("packet");
    packet_criterion.throughput(Throughput::Elements(1));

    let mut encode_targets = packets.iter().cycle();
    let mut scratch = BytesMut::with_capacity(256);
    packet_criterion.bench_function("encode", |bencher| {
        bencher.iter(|| {
            encode_targets.next().unwrap().encode(&mut scratch);
        })
    });

    let mut decode_targets = frames.iter().cycle();
    packet_criterion.bench_function("decode", |bencher| {
        bencher.iter(|| {
            Packet::decode(decode_targets.next().unwrap()).unwrap();
        })
    });

    packet_criterion.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
