use tracemodel_model::flow::FlowEvent;
use tracemodel_model::model::{FinalizeOptions, Model};
use tracemodel_model::sample::Sample;
use tracemodel_model::slice::Slice;
use tracemodel_model::thread::ThreadKey;

fn slice(title: &str, start: f64) -> Slice {
    Slice::new("cat".to_owned(), title.to_owned(), 0, start)
}

#[test]
fn finalize_closes_prunes_shifts_and_indexes() {
    let mut model = Model::new();
    {
        let thread = model.get_or_create_process(1).get_or_create_thread(1);
        thread.slice_group.begin_slice(slice("open", 10.0));
        let mut closed = slice("closed", 12.0);
        closed.duration = Some(8.0);
        let index = thread.slice_group.slices.len();
        thread.slice_group.slices.push(closed);
        assert_eq!(index, 1);
    }
    // An eventless thread, to be pruned.
    model.get_or_create_process(1).get_or_create_thread(2);
    model
        .get_or_create_process(1)
        .objects
        .id_was_created("x", "cat", "Foo", 11.0)
        .unwrap();
    let mut flow = FlowEvent::new("cat".to_owned(), "f".to_owned(), 0, "1".to_owned(), 13.0);
    flow.end = 19.0;
    model.flow_events.push(flow);
    model.samples.push(Sample {
        thread: ThreadKey { pid: 1, tid: 1 },
        title: "Trace Event Sample".to_owned(),
        ts: 15.0,
        leaf_stack_frame: None,
        weight: 1.0,
    });
    model.samples.push(Sample {
        thread: ThreadKey { pid: 1, tid: 1 },
        title: "Trace Event Sample".to_owned(),
        ts: 11.0,
        leaf_stack_frame: None,
        weight: 1.0,
    });

    model.finalize(&FinalizeOptions::default());

    // Samples sorted, world shifted to zero, bounds recomputed.
    assert!(model.samples[0].ts <= model.samples[1].ts);
    assert_eq!(model.bounds.min(), Some(0.0));
    assert_eq!(model.bounds.max(), Some(10.0));

    let process = model.process(1).unwrap();
    assert!(!process.threads.contains_key(&2));
    let group = &process.threads[&1].slice_group;
    assert_eq!(group.open_slice_count(), 0);
    // The open slice was closed at the world max before shifting.
    let open = group.slices.iter().find(|s| s.title == "open").unwrap();
    assert_eq!(open.start, 0.0);
    assert_eq!(open.duration, Some(10.0));
    assert_eq!(group.top_level_slices.len(), 1);

    // Still-live objects are implicitly deleted at the world max.
    let instance = &process.objects.instances[0];
    assert_eq!(instance.deletion_ts, Some(10.0));
    assert!(instance.deletion_was_implicit);

    // Flow indices and the interval tree cover the shifted flow.
    assert_eq!(model.indices.flow_events_by_id["1"], vec![0]);
    assert_eq!(model.flow_events[0].start, 3.0);
    assert_eq!(model.flow_interval_tree.find_intersection(4.0, 5.0).len(), 1);
}

#[test]
fn categories_are_collected_world_wide() {
    let mut model = Model::new();
    {
        let thread = model.get_or_create_process(1).get_or_create_thread(1);
        let mut a = slice("a", 0.0);
        a.category = "render".to_owned();
        a.duration = Some(1.0);
        thread.slice_group.slices.push(a);
    }
    model
        .get_or_create_process(1)
        .get_or_create_counter("metrics", "mem");
    model.compute_world_bounds();
    assert!(model.categories.contains("render"));
    assert!(model.categories.contains("metrics"));
    assert_eq!(model.categories.len(), 2);
}
