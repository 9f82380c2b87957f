use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use lending_core::config::LendingPolicy;
use lending_core::{ItemId, Library, NewItem, NewPatron, PatronId};

fn stocked_library(items: usize, patrons: usize) -> Library {
    let mut library = Library::in_memory(LendingPolicy::default()).expect("valid policy");
    for i in 0..items {
        library
            .add_item(NewItem {
                id: ItemId::new(format!("B-{}", i)),
                title: format!("Title {}", i),
                author: "Author".to_string(),
                isbn: String::new(),
                genre: "General".to_string(),
                total_copies: 4,
            })
            .expect("Add should succeed");
    }
    for i in 0..patrons {
        library
            .register_patron(NewPatron {
                id: PatronId::new(format!("P-{}", i)),
                name: format!("Patron {}", i),
                email: format!("p{}@example.com", i),
                borrow_limit: Some(10),
            })
            .expect("Register should succeed");
    }
    library
}

fn lending_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("Library Operations");
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    group.bench_function("borrow", |b| {
        b.iter_batched(
            || stocked_library(100, 10),
            |mut library| {
                library
                    .borrow(&PatronId::new("P-0"), &ItemId::new("B-0"), now, None)
                    .expect("Borrow should succeed");
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("borrow_and_return_late", |b| {
        b.iter_batched(
            || stocked_library(100, 10),
            |mut library| {
                let loan = library
                    .borrow(&PatronId::new("P-0"), &ItemId::new("B-0"), now, None)
                    .expect("Borrow should succeed");
                let fine = library
                    .return_loan(loan.id, loan.due_at + Duration::days(3), None)
                    .expect("Return should succeed");
                black_box(fine);
            },
            BatchSize::SmallInput,
        );
    });

    // Dashboard over a busy ledger
    let mut busy = stocked_library(200, 20);
    for p in 0..20 {
        for i in 0..10 {
            let item = ItemId::new(format!("B-{}", p * 10 + i));
            busy.borrow(&PatronId::new(format!("P-{}", p)), &item, now, None)
                .expect("Borrow should succeed");
        }
    }
    group.bench_function("dashboard_200_loans", |b| {
        b.iter(|| black_box(busy.reports().dashboard(now + Duration::days(45))));
    });

    group.finish();
}

criterion_group!(benches, lending_bench);
criterion_main!(benches);
