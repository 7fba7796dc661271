//! Database write and read path benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use datumdb_core::{sys, Attr, Claim, Config, Database, Request, TempId};

fn person_db() -> Database {
    let db = Database::new(Config::default());
    db.declare(&[
        Attr::new("person/name", sys::ATTR_TYPE_STRING).unique(sys::ATTR_UNIQUE_IDENTITY),
        Attr::new("person/age", sys::ATTR_TYPE_INT),
        Attr::new("person/score", sys::ATTR_TYPE_FLOAT),
    ])
    .unwrap();
    db
}

fn person_request(n: usize) -> Request {
    let mut claims = Vec::with_capacity(n * 3);
    for i in 0..n {
        let temp = TempId::from(i.to_string());
        claims.push(Claim::assert(
            temp.clone(),
            "person/name",
            format!("person-{i}"),
        ));
        claims.push(Claim::assert(temp.clone(), "person/age", i as i64));
        claims.push(Claim::assert(temp, "person/score", i as f64 / 7.0));
    }
    Request::new(claims)
}

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");
    for batch in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(batch as u64 * 3));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            let db = person_db();
            let req = person_request(batch);
            b.iter(|| {
                let res = db.write(black_box(req.clone()));
                assert!(res.is_ok());
            });
        });
    }
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");

    group.bench_function("snapshot", |b| {
        let db = person_db();
        db.write(person_request(1000));
        b.iter(|| black_box(db.read()));
    });

    group.bench_function("find", |b| {
        let db = person_db();
        db.write(person_request(1000));
        let snapshot = db.read();
        let claim = Claim::av("person/name", "person-500");
        b.iter(|| {
            let count = snapshot.select(black_box(&claim)).unwrap().count();
            assert_eq!(count, 1);
        });
    });

    group.bench_function("select_entity", |b| {
        let db = person_db();
        let res = db.write(person_request(1000));
        let p = res.new_id("500").unwrap();
        let snapshot = db.read();
        b.iter(|| {
            let datums = snapshot.select(black_box(&Claim::entity(p))).unwrap();
            assert_eq!(datums.count(), 3);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_write, bench_read);
criterion_main!(benches);
