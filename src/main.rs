use component::{EventBus, Lifecycle, PropRule, PropType, StateStore, validate_props};
use host::snapshot::HostSnapshot;
use host::{HostTree, MemoryHost};
use log::{info, warn};
use reconciler::{Reconciler, ReconcilerConfig};
use scheduler::TickQueue;
use serde::Deserialize;
use std::error::Error;
use std::rc::Rc;
use vdom::{Handler, PropValue, Props, VNode, create_node};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DemoConfig {
    reconciler: ReconcilerConfig,
    demo: DemoOptions,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DemoOptions {
    /// Print the host tree after every generation.
    print_snapshots: bool,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            print_snapshots: true,
        }
    }
}

fn load_config() -> Result<DemoConfig, Box<dyn Error>> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(DemoConfig::default());
    };
    let content = std::fs::read_to_string(&path)?;
    let config: DemoConfig = toml::from_str(&content)?;
    config.reconciler.validate()?;
    info!("loaded config from {path}");
    Ok(config)
}

#[derive(Debug, Default)]
struct TodoApp {
    renders: usize,
}

fn todo_item(key: &str, text: &str, done: bool) -> VNode {
    let props = Props::new()
        .with("key", key)
        .with("className", if done { "done" } else { "open" });
    create_node("li", props, [text])
}

fn todo_list(items: &[(&str, &str, bool)], on_clear: &Handler) -> VNode {
    let rows: Vec<VNode> = items
        .iter()
        .map(|(key, text, done)| todo_item(key, text, *done))
        .collect();
    create_node(
        "section",
        Props::new(),
        [
            create_node("ul", Props::new().with("className", "todos"), [rows]),
            create_node(
                "button",
                Props::new().with("onClick", on_clear.clone()),
                ["Clear done"],
            ),
        ],
    )
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = load_config()?;

    let ticks = TickQueue::new();
    let mut host = MemoryHost::new();
    let container = host.create_root("main");
    let mut reconciler = Reconciler::new(host, ticks.clone(), config.reconciler.clone());
    reconciler.set_error_hook(|err| warn!("patch failed: {err}"));

    let bus = EventBus::with_max_listeners(config.reconciler.max_listeners);
    let store = StateStore::new();
    let mut lifecycle = Lifecycle::new(TodoApp::default());
    lifecycle.on_mounted(|app| {
        info!("mounted after {} render(s)", app.renders);
        Ok(())
    });
    lifecycle.on_updated(|app| {
        app.renders += 1;
        Ok(())
    });

    let clear_store = store.clone();
    let _clear = bus.on("clear", move |_| {
        clear_store.set_state("cleared", true);
        Ok(())
    });
    let _watch = store.subscribe("cleared", |new, old| {
        info!("cleared: {:?} -> {}", old.map(PropValue::fragment), new.fragment());
        Ok(())
    });
    let click_bus = bus.clone();
    let on_clear = Handler::new(move |event| {
        click_bus.emit("clear", &[PropValue::from(event.target.0 as f64)]);
    });

    let schema = [
        ("key", PropRule::new().of_type(PropType::String).required()),
        ("className", PropRule::new().of_type(PropType::String)),
    ];
    let generations: [&[(&str, &str, bool)]; 4] = [
        &[("1", "Write the differ", false), ("2", "Write the patcher", false), ("3", "Ship", false)],
        &[("3", "Ship", false), ("1", "Write the differ", true), ("4", "Benchmark", false)],
        &[("4", "Benchmark", false), ("3", "Ship", false), ("1", "Write the differ", true)],
        &[("3", "Ship", true)],
    ];

    lifecycle.run_hook(component::Hook::BeforeMount);
    for (generation, items) in generations.iter().enumerate() {
        for (key, text, done) in items.iter() {
            let props = Props::new()
                .with("key", *key)
                .with("className", if *done { "done" } else { "open" });
            for violation in validate_props(&props, &schema) {
                warn!("{text}: {violation}");
            }
        }

        let header = reconciler.memoize_with("header", &[PropValue::from(items.len() as f64)], || {
            create_node("h1", Props::new(), [format!("{} todos", items.len())])
        });
        info!("generation {generation}: header {:?}", header.children()[0].as_text());

        if generation > 0 {
            lifecycle.run_hook(component::Hook::BeforeUpdate);
        }
        reconciler.render(container, todo_list(items, &on_clear));
        let flushed = ticks.run_pending();
        if generation == 0 {
            lifecycle.run_hook(component::Hook::Mounted);
        } else {
            lifecycle.run_hook(component::Hook::Updated);
        }
        info!("generation {generation}: {flushed} tick(s) flushed");

        if config.demo.print_snapshots {
            println!("--- generation {generation} ---");
            println!("{}", HostSnapshot::children_of(&reconciler.host(), container));
        }
    }

    let button = {
        let host = reconciler.host();
        host.child_at(container, 0)
            .and_then(|section| host.child_at(section, 1))
    };
    if let Some(button) = button {
        reconciler.dispatch(button, "click");
    }

    reconciler.unmount(container);
    ticks.run_pending();
    if let Some(app) = lifecycle.destroy() {
        info!("done after {} update(s); cache {:?}", app.renders, reconciler.cache().stats());
    }
    bus.destroy();
    store.destroy();
    Ok(())
}
