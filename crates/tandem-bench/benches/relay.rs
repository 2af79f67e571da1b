//! Relay benchmarks: admission, routing and teardown.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tandem_bench::{paired_rooms, wire, BenchClient};
use tandem_core::{ConnectionId, Relay, RoomDirectory};
use tandem_protocol::ClientFrame;

/// Admit-then-evict on the directory alone.
fn bench_directory(c: &mut Criterion) {
    let mut group = c.benchmark_group("directory");

    group.bench_function("admit_evict", |b| {
        let directory = RoomDirectory::new();
        let a = ConnectionId::from_raw(1);
        let b2 = ConnectionId::from_raw(2);
        b.iter(|| {
            directory.try_admit(black_box("room"), a).unwrap();
            directory.try_admit(black_box("room"), b2).unwrap();
            directory.evict("room", a);
            directory.evict("room", b2);
        });
    });

    group.bench_function("admit_close", |b| {
        let directory = RoomDirectory::new();
        let a = ConnectionId::from_raw(1);
        let b2 = ConnectionId::from_raw(2);
        b.iter(|| {
            directory.try_admit(black_box("room"), a).unwrap();
            directory.try_admit(black_box("room"), b2).unwrap();
            directory.close("room", a)
        });
    });

    group.bench_function("reject_full", |b| {
        let directory = RoomDirectory::new();
        directory.try_admit("room", ConnectionId::from_raw(1)).unwrap();
        directory.try_admit("room", ConnectionId::from_raw(2)).unwrap();
        let late = ConnectionId::from_raw(3);
        b.iter(|| directory.try_admit(black_box("room"), late).unwrap_err());
    });

    group.finish();
}

/// Chat routing through the full relay, including decode.
fn bench_chat(c: &mut Criterion) {
    let mut group = c.benchmark_group("chat");

    for rooms in [1usize, 100, 10_000] {
        let relay = Relay::new();
        let mut pairs = paired_rooms(&relay, rooms);
        let frame = wire(&ClientFrame::chat("hello, how are you?"));

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("route", rooms), &rooms, |b, _| {
            let (sender, receiver) = &mut pairs[0];
            b.iter(|| {
                relay.handle_frame(sender.id, black_box(&frame)).unwrap();
                receiver.drain()
            });
        });
    }

    group.finish();
}

/// Join, leave and disconnect cycles.
fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");
    let join = wire(&ClientFrame::join("lobby"));
    let leave = wire(&ClientFrame::leave());

    group.bench_function("join_leave", |b| {
        let relay = Relay::new();
        let mut client = BenchClient::connect(&relay);
        b.iter(|| {
            relay.handle_frame(client.id, black_box(&join)).unwrap();
            relay.handle_frame(client.id, black_box(&leave)).unwrap();
            client.drain()
        });
    });

    group.bench_function("connect_join_disconnect", |b| {
        let relay = Relay::new();
        b.iter(|| {
            let client = BenchClient::connect(&relay);
            relay.handle_frame(client.id, &join).unwrap();
            relay.disconnect(client.id);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_directory, bench_chat, bench_lifecycle);
criterion_main!(benches);
