#![no_main]

use std::rc::Rc;

use libfuzzer_sys::fuzz_target;

use host::{HostTree, MemoryHost};
use reconciler::{Reconciler, ReconcilerConfig};
use scheduler::Immediate;
use vdom::{Props, VNode, create_node};

/// Low nibble picks the key, high nibble the text; repeated keys are skipped.
fn items(bytes: &[u8]) -> Vec<(u8, u8)> {
    let mut seen = [false; 16];
    let mut out = Vec::new();
    for &b in bytes {
        let key = b & 0x0f;
        if !seen[key as usize] {
            seen[key as usize] = true;
            out.push((key, b >> 4));
        }
    }
    out
}

fn list(items: &[(u8, u8)]) -> VNode {
    let rows: Vec<VNode> = items
        .iter()
        .map(|(key, text)| {
            create_node(
                "li",
                Props::new().with("key", format!("k{key}")),
                [format!("t{text}")],
            )
        })
        .collect();
    create_node("ul", Props::new(), [rows])
}

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = (split as usize).min(rest.len());
    let (old_bytes, new_bytes) = rest.split_at(split);
    let old = list(&items(old_bytes));
    let new = list(&items(new_bytes));

    if let Some(patch) = vdom::diff(Some(&new), Some(&new)) {
        assert!(patch.is_noop(), "self-diff must be a no-op");
    }

    let mut host = MemoryHost::new();
    let container = host.create_root("main");
    let reconciler = Reconciler::new(host, Rc::new(Immediate), ReconcilerConfig::default());
    reconciler.render(container, old);
    reconciler.render(container, new.clone());

    let host = reconciler.host();
    let Some(ul) = host.child_at(container, 0) else {
        panic!("rendered list missing");
    };
    let actual: Vec<(String, String)> = host
        .children(ul)
        .iter()
        .map(|id| {
            (
                host.attribute(*id, "data-key").unwrap_or_default().to_string(),
                host.text_content(*id),
            )
        })
        .collect();
    let expected: Vec<(String, String)> = new
        .children()
        .iter()
        .map(|li| {
            (
                li.key().unwrap_or_default().to_string(),
                li.children()[0].as_text().unwrap_or_default().to_string(),
            )
        })
        .collect();
    assert_eq!(actual, expected);
});
