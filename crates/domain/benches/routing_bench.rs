use criterion::{Criterion, criterion_group, criterion_main};
use domain::{CartItem, Money, RoutingPolicy, route};

fn large_cart(lines: usize) -> Vec<CartItem> {
    (0..lines)
        .map(|i| {
            if i % 3 == 0 {
                CartItem::firearm(format!("RIFLE-{i:03}"), 1, Money::from_cents(79900))
            } else {
                CartItem::new(format!("ACC-{i:03}"), 2, Money::from_cents(1999))
            }
        })
        .collect()
}

fn bench_route_small_cart(c: &mut Criterion) {
    let cart = large_cart(5);
    let policy = RoutingPolicy::new().with_in_house_sku("RIFLE-000");

    c.bench_function("fulfillment/route_5_items", |b| {
        b.iter(|| route(&cart, &policy));
    });
}

fn bench_route_large_cart(c: &mut Criterion) {
    let cart = large_cart(100);
    let mut policy = RoutingPolicy::new();
    for i in 0..20 {
        policy = policy.with_in_house_sku(format!("RIFLE-{:03}", i * 3));
    }

    c.bench_function("fulfillment/route_100_items", |b| {
        b.iter(|| route(&cart, &policy));
    });
}

criterion_group!(benches, bench_route_small_cart, bench_route_large_cart);
criterion_main!(benches);
