use std::sync::Arc;

use axum::http::HeaderMap;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};

use vestibule::client_state::{ClientState, ClientStateEvent, ClientStateStore, StateSnapshot};
use vestibule::config::{StateKeys, Storage};
use vestibule::error::AuthResult;

/// Writer that accepts everything; isolates the log/commit cost from any
/// store cost.
struct NullStore;

impl ClientStateStore for NullStore {
    fn read_state(&self, _headers: &HeaderMap) -> AuthResult<Option<StateSnapshot>> {
        Ok(None)
    }

    fn write_state(
        &self,
        _headers: &mut HeaderMap,
        _snapshot: Option<&StateSnapshot>,
        events: &[ClientStateEvent],
    ) -> AuthResult<()> {
        std::hint::black_box(events);
        Ok(())
    }
}

fn bench_stage_and_commit(c: &mut Criterion) {
    let storage = Storage { session: Some(Arc::new(NullStore)), cookie: None };
    let mut rng = StdRng::seed_from_u64(42);

    let mut group = c.benchmark_group("client_state");
    for events in [4usize, 64, 1024] {
        let keys: Vec<String> =
            (0..events).map(|_| format!("k{}", rng.gen_range(0..1_000_000))).collect();
        group.throughput(Throughput::Elements(events as u64));
        group.bench_with_input(BenchmarkId::new("stage_and_commit", events), &keys, |b, keys| {
            b.iter(|| {
                let mut state =
                    ClientState::load(&storage, StateKeys::default(), &HeaderMap::new())
                        .expect("load");
                for key in keys {
                    state.put_session(key, "value");
                }
                let mut headers = HeaderMap::new();
                state.commit(&mut headers).expect("commit");
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_stage_and_commit);
criterion_main!(benches);
