use chrono::Utc;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Money, NewRoom, Room, RoomType};
use store::{InMemoryStore, Store, Transaction};

fn room(number: usize) -> Room {
    Room::new(
        NewRoom {
            room_number: format!("{number}"),
            room_type: RoomType::NonAc,
            price_per_night: Money::from_major(40),
            capacity: 1_000_000,
        },
        Utc::now(),
    )
    .unwrap()
}

fn bench_insert_room(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let mut n = 0;

    c.bench_function("store/insert_room", |b| {
        b.iter(|| {
            n += 1;
            rt.block_on(async {
                let mut tx = Transaction::begin(&store);
                tx.insert_room(room(n));
                tx.commit().await.unwrap();
            });
        });
    });
}

fn bench_versioned_update(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let seeded = room(0);
    let id = seeded.id();
    rt.block_on(async {
        let mut tx = Transaction::begin(&store);
        tx.insert_room(seeded);
        tx.commit().await.unwrap();
    });

    c.bench_function("store/reserve_and_release", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut tx = Transaction::begin(&store);
                let mut room = tx.room(id).await.unwrap().unwrap();
                room.reserve_beds(1, Utc::now()).unwrap();
                room.release_beds(1, Utc::now()).unwrap();
                tx.update_room(room).unwrap();
                tx.commit().await.unwrap();
            });
        });
    });
}

fn bench_list_rooms(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    rt.block_on(async {
        let mut tx = Transaction::begin(&store);
        for n in 0..200 {
            tx.insert_room(room(n));
        }
        tx.commit().await.unwrap();
    });

    c.bench_function("store/list_200_rooms", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.list_rooms(true).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_insert_room,
    bench_versioned_update,
    bench_list_rooms
);
criterion_main!(benches);
