use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use vdom::{Child, Props, VNode, create_node, diff};

const SMALL_LIST: usize = 64;
const LARGE_LIST: usize = 5_000;

fn keyed_list(keys: impl Iterator<Item = usize>) -> VNode {
    let items: Vec<VNode> = keys
        .map(|k| {
            create_node(
                "li",
                Props::new().with("key", k.to_string()).with("className", "row"),
                [format!("item {k}")],
            )
        })
        .collect();
    create_node("ul", Props::new(), [Child::from(items)])
}

fn unkeyed_list(len: usize) -> VNode {
    let items: Vec<VNode> = (0..len)
        .map(|k| create_node("li", Props::new(), [format!("item {k}")]))
        .collect();
    create_node("ul", Props::new(), [Child::from(items)])
}

fn bench_keyed_reverse(c: &mut Criterion) {
    let old = keyed_list(0..LARGE_LIST);
    let new = keyed_list((0..LARGE_LIST).rev());
    c.bench_function("bench_keyed_reverse_large", |b| {
        b.iter(|| {
            let patch = diff(Some(black_box(&old)), Some(black_box(&new)));
            black_box(patch.map(|p| p.op_count()));
        });
    });
}

fn bench_keyed_rotate_small(c: &mut Criterion) {
    let old = keyed_list(0..SMALL_LIST);
    let new = keyed_list((1..SMALL_LIST).chain(std::iter::once(0)));
    c.bench_function("bench_keyed_rotate_small", |b| {
        b.iter(|| black_box(diff(Some(&old), Some(&new))));
    });
}

fn bench_positional_append(c: &mut Criterion) {
    c.bench_function("bench_positional_append_large", |b| {
        b.iter_batched(
            || (unkeyed_list(LARGE_LIST), unkeyed_list(LARGE_LIST + 1)),
            |(old, new)| black_box(diff(Some(&old), Some(&new))),
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_keyed_reverse,
    bench_keyed_rotate_small,
    bench_positional_append
);
criterion_main!(benches);
