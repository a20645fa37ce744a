//! Frame codec and record protection benchmarks.
//!
//! The tunnel adds one RC4 pass and one HMAC-SHA1 per packet; these
//! benches keep an eye on that per-packet cost at MTU-sized payloads.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use l3tun::crypto::{prf, DirectionKeys, RecordCipher};
use l3tun::tls::ClientHelloBuilder;
use l3tun::tunnel::frame::{self, ChannelRole};
use l3tun::TOKEN_LEN;

fn bench_encode_request(c: &mut Criterion) {
    let token = [0x42u8; TOKEN_LEN];

    c.bench_function("encode_request", |b| {
        b.iter(|| {
            black_box(frame::encode_request(
                ChannelRole::Send,
                &token,
                [40, 30, 20, 10],
            ))
        })
    });
}

fn bench_decode_request(c: &mut Criterion) {
    let token = [0x42u8; TOKEN_LEN];
    let encoded = frame::encode_request(ChannelRole::Receive, &token, [40, 30, 20, 10]);

    c.bench_function("decode_request", |b| {
        b.iter(|| black_box(frame::decode_request(&encoded).unwrap()))
    });
}

fn bench_prf_key_block(c: &mut Criterion) {
    let secret = [0x42u8; 48];
    let seed = [0x17u8; 64];

    c.bench_function("prf_key_block_72_bytes", |b| {
        b.iter(|| black_box(prf(&secret, b"key expansion", &seed, 72)))
    });
}

fn bench_record_protect(c: &mut Criterion) {
    let keys = DirectionKeys {
        mac_key: [0x0Au8; 20],
        cipher_key: [0x0Bu8; 16],
    };
    let mut cipher = RecordCipher::new(&keys);
    let payload = vec![0u8; 1500]; // MTU-sized packet

    let mut group = c.benchmark_group("record_protect");
    group.throughput(Throughput::Bytes(1500));

    group.bench_function("1500_bytes", |b| {
        b.iter(|| black_box(cipher.protect(23, &payload)))
    });

    group.finish();
}

fn bench_record_roundtrip(c: &mut Criterion) {
    // RC4 keystreams advance per record, so the roundtrip pairs fresh
    // ciphers each iteration.
    let keys = DirectionKeys {
        mac_key: [0x0Au8; 20],
        cipher_key: [0x0Bu8; 16],
    };
    let payload = vec![0u8; 1500];

    let mut group = c.benchmark_group("record_roundtrip");
    group.throughput(Throughput::Bytes(1500));

    group.bench_function("1500_bytes", |b| {
        b.iter(|| {
            let mut tx = RecordCipher::new(&keys);
            let mut rx = RecordCipher::new(&keys);
            let protected = tx.protect(23, &payload);
            black_box(rx.deprotect(23, &protected).unwrap())
        })
    });

    group.finish();
}

fn bench_client_hello_build(c: &mut Criterion) {
    c.bench_function("client_hello_build", |b| {
        b.iter(|| black_box(ClientHelloBuilder::new().build()))
    });
}

criterion_group!(
    benches,
    bench_encode_request,
    bench_decode_request,
    bench_prf_key_block,
    bench_record_protect,
    bench_record_roundtrip,
    bench_client_hello_build,
);

criterion_main!(benches);
