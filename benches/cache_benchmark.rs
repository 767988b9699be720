use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::{
    path::Path,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use httpwire::{cache, response};

fn parse_http_date_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_http_date");

    let dates = [
        ("rfc1123", "Sun, 06 Nov 1994 08:49:37 GMT"),
        ("rfc850", "Sunday, 06-Nov-94 08:49:37 GMT"),
        ("asctime", "Sun Nov  6 08:49:37 1994"),
        ("invalid", "not a date at all"),
    ];

    for (name, date) in dates.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(name), date, |b, date| {
            b.iter(|| {
                let _ = cache::parse_http_date(black_box(date));
            });
        });
    }

    group.finish();
}

fn is_not_modified_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("is_not_modified");
    let mtime = UNIX_EPOCH + Duration::from_secs(784111777);

    let headers = [
        ("hit", Some("Sun, 06 Nov 1994 08:49:37 GMT")),
        ("miss", Some("Thu, 01 Jan 1970 00:00:00 GMT")),
        ("absent", None),
        ("garbage", Some("yesterday")),
    ];

    for (name, header) in headers.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(name), header, |b, header| {
            b.iter(|| {
                black_box(cache::is_not_modified(black_box(mtime), black_box(*header)));
            });
        });
    }

    group.finish();
}

fn last_modified_round_trip_benchmark(c: &mut Criterion) {
    c.bench_function("last_modified_round_trip", |b| {
        let now = SystemTime::now();
        b.iter(|| {
            let stamp = response::format_date(&cache::to_http_time(black_box(now)));
            black_box(cache::is_not_modified(now, Some(&stamp)));
        });
    });
}

fn evaluate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_evaluate");
    let dir = tempfile::tempdir().unwrap();

    for content_size in [1024usize, 10240, 102400].iter() {
        let path = dir.path().join(format!("file{}.bin", content_size));
        std::fs::write(&path, vec![0u8; *content_size]).unwrap();
        let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();
        let stamp = response::format_date(&cache::to_http_time(mtime));

        group.bench_with_input(
            BenchmarkId::new("send", content_size),
            &path,
            |b, path| {
                b.iter(|| {
                    let _ = cache::evaluate(black_box(path), mtime, None).unwrap();
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("not_modified", content_size),
            &path,
            |b, path| {
                b.iter(|| {
                    let _ = cache::evaluate(black_box(path), mtime, Some(&stamp)).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn get_mime_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_mime");

    for name in ["index.html", "data.json", "archive.tar.gz", "noextension"].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(name), name, |b, name| {
            b.iter(|| {
                black_box(response::get_mime(black_box(Path::new(name))));
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    parse_http_date_benchmark,
    is_not_modified_benchmark,
    last_modified_round_trip_benchmark,
    evaluate_benchmark,
    get_mime_benchmark
);
criterion_main!(benches);
