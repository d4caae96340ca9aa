use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use sce_auth::config::HashingSettings;
use sce_auth::storage::StorageKeys;
use sce_auth::{
    can_access, permissions_for, permissions_for_name, AuthSettings, MemoryStore, Permission, PublicUser, Role,
    SessionManager, SessionSnapshot, UserStore,
};

fn user(role: Role) -> PublicUser {
    PublicUser {
        id: "bench-user".into(),
        username: "bench".into(),
        email: "bench@example.com".into(),
        role,
        created_at: chrono::Utc::now(),
        is_email_verified: true,
    }
}

fn bench_catalog(c: &mut Criterion) {
    let mut group = c.benchmark_group("permission_catalog");
    group.throughput(Throughput::Elements(Role::all().len() as u64));
    group.bench_function("permissions_for_all_roles", |b| {
        b.iter(|| {
            for &r in Role::all() {
                criterion::black_box(permissions_for(criterion::black_box(r)));
            }
        });
    });
    group.bench_function("permissions_for_name", |b| {
        b.iter(|| criterion::black_box(permissions_for_name(criterion::black_box("researcher"))));
    });
    group.finish();
}

fn bench_gate(c: &mut Criterion) {
    let mut group = c.benchmark_group("gate");
    let cases = [
        ("anonymous", SessionSnapshot::anonymous()),
        ("reader", SessionSnapshot::signed_in(user(Role::Reader))),
        ("admin", SessionSnapshot::signed_in(user(Role::Admin))),
    ];
    for (name, snap) in cases.iter() {
        group.bench_with_input(BenchmarkId::new("can_access", name), snap, |b, snap| {
            b.iter(|| {
                for &p in Permission::all() {
                    criterion::black_box(can_access(snap, Some(p), "/admin/objects"));
                }
            });
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    // Read-through lookups over a populated collection.
    let ns = [10usize, 1_000usize];
    let mut group = c.benchmark_group("user_store");
    group.sample_size(20);
    for &n in &ns {
        let kv = Arc::new(MemoryStore::new());
        let store = UserStore::new(kv.clone(), StorageKeys::default());
        for i in 0..n {
            let _ = store.create(sce_auth::NewUser {
                username: format!("u{}", i),
                email: format!("u{}@example.com", i),
                password_secret: "$argon2id$bench".into(),
                role: Role::Reader,
                is_email_verified: true,
                verification_token: None,
            });
        }
        let target = format!("u{}@example.com", n - 1);
        group.bench_with_input(BenchmarkId::new("find_by_email", n), &target, |b, t| {
            b.iter(|| criterion::black_box(store.find_by_email(t)));
        });

        let settings = AuthSettings {
            hashing: HashingSettings { memory_kib: 256, iterations: 1, parallelism: 1 },
            ..Default::default()
        };
        let Ok(sm) = SessionManager::new(kv, settings) else { continue };
        sm.restore_session();
        group.bench_with_input(BenchmarkId::new("has_permission_anonymous", n), &n, |b, _| {
            b.iter(|| criterion::black_box(sm.has_permission(Permission::ViewPost)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_catalog, bench_gate, bench_lookup);
criterion_main!(benches);
