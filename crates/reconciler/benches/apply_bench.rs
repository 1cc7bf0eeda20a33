use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use host::{HostId, HostTree, MemoryHost};
use reconciler::apply_patch;
use vdom::{Patch, Props, VNode, create_node, diff};

const LIST_LEN: usize = 1_000;

fn keyed_list(keys: impl Iterator<Item = usize>) -> VNode {
    let items: Vec<VNode> = keys
        .map(|k| create_node("li", Props::new().with("key", k.to_string()), [format!("item {k}")]))
        .collect();
    create_node("ul", Props::new(), [items])
}

fn mounted(node: &VNode) -> (MemoryHost, HostId) {
    let mut host = MemoryHost::new();
    let root = host.create_root("main");
    let create = Patch::Create { node: node.clone() };
    if let Err(err) = apply_patch(&mut host, root, &create, 0) {
        panic!("mount failed: {err}");
    }
    (host, root)
}

fn bench_apply_keyed_reverse(c: &mut Criterion) {
    let old = keyed_list(0..LIST_LEN);
    let new = keyed_list((0..LIST_LEN).rev());
    let patch = diff(Some(&old), Some(&new)).unwrap_or(Patch::Remove);
    c.bench_function("bench_apply_keyed_reverse", |b| {
        b.iter_batched(
            || mounted(&old),
            |(mut host, root)| {
                let result = apply_patch(&mut host, root, black_box(&patch), 0);
                black_box(result.is_ok());
                host
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_mount(c: &mut Criterion) {
    let list = keyed_list(0..LIST_LEN);
    c.bench_function("bench_mount_keyed_list", |b| {
        b.iter(|| {
            let (host, root) = mounted(black_box(&list));
            black_box(host.child_count(root))
        });
    });
}

criterion_group!(benches, bench_apply_keyed_reverse, bench_mount);
criterion_main!(benches);
