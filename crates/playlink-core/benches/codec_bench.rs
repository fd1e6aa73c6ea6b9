//! Criterion benchmarks for the Playlink frame codec.
//!
//! Run with:
//! ```bash
//! cargo bench --package playlink-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use playlink_core::protocol::messages::{
    ControlRequest, PlaybackState, PlayerCommand, PlayerStatus, TrackInfo,
};
use playlink_core::{decode_frame, encode_frame, Message, MessageId};

fn fixtures() -> Vec<(&'static str, Message)> {
    let status = PlayerStatus {
        state: PlaybackState::Play,
        volume: 70,
        repeat: true,
        shuffle: false,
    };
    let track = TrackInfo {
        id: "file:///music/track-01.flac".to_string(),
        title: "Some Title".to_string(),
        artist: "Some Artist".to_string(),
        album: "Some Album".to_string(),
        length_secs: 245,
        rating: 3,
    };
    let control = ControlRequest {
        command: PlayerCommand::Next,
        param: 0,
    };
    vec![
        ("status", Message::with_record(MessageId::PLAYER_STATUS, &status)),
        ("track", Message::with_record(MessageId::PLAYER_TRACK, &track)),
        ("control", Message::with_record(MessageId::PLAYER_CONTROL, &control)),
    ]
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_frame");
    for (name, msg) in fixtures() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &msg, |b, m| {
            b.iter(|| encode_frame(black_box(m)).unwrap())
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_frame");
    for (name, msg) in fixtures() {
        let bytes = encode_frame(&msg).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &bytes, |b, bytes| {
            b.iter(|| decode_frame(black_box(bytes)).unwrap())
        });
    }
    group.finish();
}

fn bench_track_decode_record(c: &mut Criterion) {
    let (_, msg) = fixtures().swap_remove(1);
    c.bench_function("decode_record/track", |b| {
        b.iter(|| black_box(&msg).decode_record::<TrackInfo>().unwrap())
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_track_decode_record);
criterion_main!(benches);
