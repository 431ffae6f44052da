//! Safety sensor classification benchmark.
//!
//! The classifier runs on every safety poll; keep it allocation-light
//! on the no-violation path.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use fts_common::config::SafetySensors;
use fts_common::safety::{ContactType, EdgeType, SafetySensor};
use fts_station::safety::SafetySensorSet;
use std::collections::HashMap;

fn sensor_set() -> SafetySensorSet {
    SafetySensorSet::new(&SafetySensors {
        door: SafetySensor {
            pin: 4,
            contact: ContactType::B,
            edge: EdgeType::Falling,
        },
        clamp: SafetySensor {
            pin: 5,
            contact: ContactType::A,
            edge: EdgeType::Rising,
        },
        chain: SafetySensor {
            pin: 6,
            contact: ContactType::A,
            edge: EdgeType::Rising,
        },
    })
}

fn bench_classification(c: &mut Criterion) {
    let sensors = sensor_set();
    let safe: HashMap<u8, bool> = HashMap::from([(4, false), (5, true), (6, true)]);
    let violation: HashMap<u8, bool> = HashMap::from([(4, true), (5, false), (6, true)]);

    c.bench_function("sensor_check_all_safe", |b| {
        b.iter(|| sensors.check(black_box(&safe)))
    });
    c.bench_function("sensor_check_violation", |b| {
        b.iter(|| sensors.check(black_box(&violation)))
    });
}

criterion_group!(benches, bench_classification);
criterion_main!(benches);
