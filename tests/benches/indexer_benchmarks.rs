//! # Blockview Benchmarks
//!
//! Hot paths of the request pipeline:
//!
//! | Path | Operation |
//! |------|-----------|
//! | Raw tx | parse + double SHA-256 |
//! | Packets | fragment / reassemble a large message |
//! | Envelope | bincode encode + command decode |

use bv_03_session::{
    decode_envelope, encode_envelope, fragment, method, Command, CommandEnvelope, Packet,
    Reassembler,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shared_types::entities::{OutPoint, ScrAddr};
use shared_types::tx::{Transaction, TxBuilder};

fn script(tag: u8) -> Vec<u8> {
    let mut s = vec![0x76, 0xa9, 0x14];
    s.extend_from_slice(&[tag; 20]);
    s.extend_from_slice(&[0x88, 0xac]);
    s
}

fn bench_tx_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("raw-tx");
    for inputs in [1u32, 10, 100] {
        let mut builder = TxBuilder::new();
        for i in 0..inputs {
            builder = builder.spend(OutPoint::new([i as u8; 32], i));
        }
        let raw = builder.pay(script(1), 1_000).pay(script(2), 2_000).build().serialize();

        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse_and_hash", inputs), &raw, |b, raw| {
            b.iter(|| {
                let tx = Transaction::parse(black_box(raw)).unwrap();
                black_box(tx.hash())
            })
        });
    }
    group.finish();
}

fn bench_packets(c: &mut Criterion) {
    let mut group = c.benchmark_group("packets");
    let message = vec![0xAB; 256 * 1024];
    group.throughput(Throughput::Bytes(message.len() as u64));

    group.bench_function("fragment_256k", |b| {
        b.iter(|| {
            let packets = fragment(7, black_box(&message), 1_500).unwrap();
            black_box(packets.iter().map(Packet::encode).count())
        })
    });

    let encoded: Vec<Vec<u8>> = fragment(7, &message, 1_500)
        .unwrap()
        .iter()
        .map(Packet::encode)
        .collect();
    group.bench_function("reassemble_256k", |b| {
        b.iter(|| {
            let mut reassembler = Reassembler::default();
            let mut whole = None;
            for raw in &encoded {
                whole = reassembler.push(Packet::decode(raw).unwrap()).unwrap();
            }
            black_box(whole)
        })
    });
    group.finish();
}

fn bench_envelope(c: &mut Criterion) {
    let mut env = CommandEnvelope::new(method::REGISTER_WALLET).with_session("bench");
    env.wallet_id = Some("wallet".into());
    env.bin_args = (0..100u8)
        .map(|tag| ScrAddr::from_script(&script(tag)).as_bytes().to_vec())
        .collect();
    env.flag = Some(true);
    let bytes = encode_envelope(&env).unwrap();

    c.bench_function("envelope_decode_register_100", |b| {
        b.iter(|| {
            let env = decode_envelope(black_box(&bytes)).unwrap();
            black_box(Command::try_from(env).unwrap())
        })
    });
}

criterion_group!(benches, bench_tx_parse, bench_packets, bench_envelope);
criterion_main!(benches);
