use std::sync::Arc;

use booking::{
    BookingConfig, BookingOrchestrator, CreateBookingRequest, GuestCounts, InMemoryPaymentGateway,
    LoggingNotifier,
};
use chrono::{Days, Utc};
use common::UserId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Money, NewResident, NewRoom, RoomType};
use store::InMemoryStore;

fn bench_create_cancel_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let orchestrator = BookingOrchestrator::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryPaymentGateway::new()),
        Arc::new(LoggingNotifier),
        BookingConfig::default(),
    );

    let (room_id, users) = rt.block_on(async {
        let room = orchestrator
            .add_room(NewRoom {
                room_number: "B-1".to_string(),
                room_type: RoomType::Ac,
                price_per_night: Money::from_major(100),
                capacity: 4,
            })
            .await
            .unwrap();
        let mut users = Vec::new();
        for n in 0..64 {
            let user_id = UserId::new();
            orchestrator
                .register_resident(NewResident {
                    user_id,
                    name: format!("Guest {n}"),
                    email: format!("guest{n}@example.com"),
                })
                .await
                .unwrap();
            users.push(user_id);
        }
        (room.id(), users)
    });

    let today = Utc::now().date_naive();
    let mut n = 0usize;
    c.bench_function("booking/create_cancel_cycle", |b| {
        b.iter(|| {
            let user = users[n % users.len()];
            n += 1;
            rt.block_on(async {
                let confirmation = orchestrator
                    .create_booking(
                        user,
                        CreateBookingRequest {
                            room_id,
                            check_in_date: (today + Days::new(7)).to_string(),
                            check_out_date: (today + Days::new(10)).to_string(),
                            guests: GuestCounts {
                                adults: 1,
                                children: 1,
                                infants_under_2: 0,
                            },
                        },
                    )
                    .await
                    .unwrap();
                orchestrator
                    .cancel_booking(confirmation.booking_reference.as_str())
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_quote(c: &mut Criterion) {
    let policy = domain::PricingPolicy::default();
    let check_in = Utc::now().date_naive() + Days::new(3);
    let stay = domain::StayDates::new(check_in, check_in + Days::new(5)).unwrap();
    let guests = domain::Guests::from_counts(2, 1, 1).unwrap();

    c.bench_function("booking/quote", |b| {
        b.iter(|| policy.quote(Money::from_major(75), &stay, &guests).unwrap());
    });
}

criterion_group!(benches, bench_create_cancel_cycle, bench_quote);
criterion_main!(benches);
