//! Benchmarks for store change delivery.
//!
//! - `notify/fan_out`: one dispatch through a connected parent to N connected
//!   children whose props never change (pure forwarding path).
//! - `notify/render_path`: one dispatch where the parent's props change and
//!   the host commits before children are notified.
//!
//! Run with: cargo bench -p tether --bench notify_bench

use std::cell::RefCell;
use std::hint::black_box;
use std::rc::{Rc, Weak};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tether::{
    BasicStore, Component, ConnectOptions, ConnectedInstance, MapState, Props, StageInput, Store,
    TreeContext, connect,
};

struct Sink;

impl Component for Sink {
    type Output = usize;

    fn name(&self) -> &str {
        "Sink"
    }

    fn render(&self, props: &Props) -> usize {
        props.len()
    }
}

type Instance = ConnectedInstance<Sink, u64, u64>;
type Options = ConnectOptions<u64, u64>;

fn counter_store() -> Rc<BasicStore<u64, u64>> {
    BasicStore::new(0, |s, a| s + a)
}

/// Parent plus `children` connected children, all attached.
fn tree(
    store: &Rc<BasicStore<u64, u64>>,
    parent_map: MapState<u64>,
    children: usize,
) -> (Rc<Instance>, Vec<Instance>) {
    let fixed = Props::builder().value("fixed", true).build();
    let child_map = MapState::new(move |_: &u64| fixed.clone());

    let parent_slot: Rc<RefCell<Weak<Instance>>> = Rc::new(RefCell::new(Weak::new()));
    let slot = Rc::clone(&parent_slot);
    let parent = connect(parent_map, StageInput::Absent, StageInput::Absent, Options::default())
        .wrap(Sink)
        .and_then(|w| {
            w.mount(
                &TreeContext::provide(store.handle()),
                Props::new(),
                Rc::new(move || {
                    // Synchronous host: render and commit on request.
                    let current = slot.borrow().upgrade();
                    if let Some(parent) = current {
                        let _ = black_box(parent.render());
                        parent.controller().commit();
                    }
                }),
            )
        })
        .map(Rc::new)
        .expect("parent mounts");
    *parent_slot.borrow_mut() = Rc::downgrade(&parent);

    let child = connect(child_map, StageInput::Absent, StageInput::Absent, Options::default())
        .wrap(Sink)
        .expect("child wraps");
    let cx = parent.child_context();
    let kids: Vec<Instance> = (0..children)
        .map(|_| child.mount(&cx, Props::new(), Rc::new(|| {})).expect("child mounts"))
        .collect();
    for kid in &kids {
        kid.controller().commit();
        kid.controller().attach();
    }
    parent.controller().commit();
    parent.controller().attach();
    (parent, kids)
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify/fan_out");
    for &children in &[1usize, 16, 256] {
        let store = counter_store();
        let fixed = Props::builder().value("parent", true).build();
        let (_parent, _kids) = tree(&store, MapState::new(move |_: &u64| fixed.clone()), children);
        group.bench_with_input(BenchmarkId::from_parameter(children), &children, |b, _| {
            b.iter(|| black_box(store.dispatch(1)))
        });
    }
    group.finish();
}

fn bench_render_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify/render_path");
    for &children in &[1usize, 16, 256] {
        let store = counter_store();
        let map = MapState::new(|s: &u64| Props::builder().value("count", *s).build());
        let (_parent, _kids) = tree(&store, map, children);
        group.bench_with_input(BenchmarkId::from_parameter(children), &children, |b, _| {
            b.iter(|| black_box(store.dispatch(1)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fan_out, bench_render_path);
criterion_main!(benches);
