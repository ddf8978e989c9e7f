//! End-to-end scenarios driven purely through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use flowpipe::error::{ErrorPolicy, PipelineEvent, Severity};
use flowpipe::input::InputTransformer;
use flowpipe::output::OutputTransformer;
use flowpipe::pipeline::Pipeline;

fn feed_of(pipeline: &Arc<Pipeline<i32>>) -> impl Fn(i32) {
    let input = InputTransformer::passthrough("feed");
    input.attach(pipeline.head());
    let inline = input.inline().unwrap();
    move |v| inline(v)
}

#[test]
fn single_input_single_output_single_processor() {
    let pipeline = Pipeline::<i32>::new();
    pipeline
        .add_processor("add-one", 10, Arc::new(|v: i32, fwd: &dyn Fn(i32)| fwd(v + 1)))
        .unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = seen.clone();
    pipeline
        .tail()
        .register_output(OutputTransformer::passthrough("out", 0, Arc::new(move |v: i32| {
            seen2.lock().unwrap().push(v);
        })))
        .unwrap();

    let feed = feed_of(&pipeline);
    feed(1);

    assert_eq!(*seen.lock().unwrap(), vec![2]);
}

#[test]
fn fan_out_to_two_outputs() {
    let pipeline = Pipeline::<i32>::new();
    let a = Arc::new(AtomicUsize::new(0));
    let b = Arc::new(AtomicUsize::new(0));
    let (a2, b2) = (a.clone(), b.clone());
    pipeline
        .tail()
        .register_output(OutputTransformer::passthrough("a", 0, Arc::new(move |_: i32| {
            a2.fetch_add(1, Ordering::SeqCst);
        })))
        .unwrap();
    pipeline
        .tail()
        .register_output(OutputTransformer::passthrough("b", 1, Arc::new(move |_: i32| {
            b2.fetch_add(1, Ordering::SeqCst);
        })))
        .unwrap();

    let feed = feed_of(&pipeline);
    feed(0);

    assert_eq!(a.load(Ordering::SeqCst), 1);
    assert_eq!(b.load(Ordering::SeqCst), 1);
}

#[test]
fn disable_mid_stream() {
    let pipeline = Pipeline::<i32>::new();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let calls2 = calls.clone();
    let node = pipeline
        .add_processor("tap", 10, Arc::new(move |v: i32, fwd: &dyn Fn(i32)| {
            calls2.lock().unwrap().push(v);
            fwd(v);
        }))
        .unwrap();
    let downstream = Arc::new(Mutex::new(Vec::new()));
    let downstream2 = downstream.clone();
    pipeline
        .tail()
        .register_output(OutputTransformer::passthrough("out", 0, Arc::new(move |v: i32| {
            downstream2.lock().unwrap().push(v);
        })))
        .unwrap();

    let feed = feed_of(&pipeline);
    feed(1);
    node.set_enabled(false);
    feed(2);
    node.set_enabled(true);
    feed(3);

    assert_eq!(*calls.lock().unwrap(), vec![1, 3]);
    // the disabled processor is skipped by relink, so downstream still sees every input
    assert_eq!(*downstream.lock().unwrap(), vec![1, 2, 3]);
}

#[test]
fn peek_restoration() {
    let pipeline = Pipeline::<i32>::new();
    let node = pipeline
        .add_processor("through", 10, Arc::new(|v: i32, fwd: &dyn Fn(i32)| fwd(v)))
        .unwrap();
    let downstream = Arc::new(Mutex::new(Vec::new()));
    let downstream2 = downstream.clone();
    pipeline
        .tail()
        .register_output(OutputTransformer::passthrough("out", 0, Arc::new(move |v: i32| {
            downstream2.lock().unwrap().push(v);
        })))
        .unwrap();

    let peeked = Arc::new(Mutex::new(Vec::new()));
    let peeked2 = peeked.clone();
    let guard = node.peek_with_dereg(Arc::new(move |v: i32| {
        peeked2.lock().unwrap().push(v);
    }));

    let feed = feed_of(&pipeline);
    feed(1);
    guard.unregister();
    feed(2);

    assert_eq!(*peeked.lock().unwrap(), vec![1]);
    assert_eq!(*downstream.lock().unwrap(), vec![1, 2]);
}

#[test]
fn output_switch_selects_exactly_one() {
    let pipeline = Pipeline::<i32>::new();
    let a_calls = Arc::new(AtomicUsize::new(0));
    let b_calls = Arc::new(AtomicUsize::new(0));
    let (a2, b2) = (a_calls.clone(), b_calls.clone());
    let out_a = OutputTransformer::passthrough("a", 0, Arc::new(move |_: i32| {
        a2.fetch_add(1, Ordering::SeqCst);
    }));
    let out_b = OutputTransformer::passthrough("b", 1, Arc::new(move |_: i32| {
        b2.fetch_add(1, Ordering::SeqCst);
    }));
    pipeline.tail().switch.add_candidate(out_a.clone());
    pipeline.tail().switch.add_candidate(out_b.clone());
    pipeline.tail().switch.select("a");

    let feed = feed_of(&pipeline);
    feed(0);
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 0);

    pipeline.tail().switch.select("b");
    feed(0);
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn retry_then_fail_reports_exactly_one_error_event() {
    let pipeline = Pipeline::<i32>::new();
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts2 = attempts.clone();
    let node = pipeline
        .add_processor("flaky", 10, Arc::new(move |_: i32, _fwd: &dyn Fn(i32)| {
            attempts2.fetch_add(1, Ordering::SeqCst);
            panic!("always fails");
        }))
        .unwrap();
    node.set_error_policy(Some(ErrorPolicy::Retry)).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let events2 = events.clone();
    pipeline.add_listener(Arc::new(move |event: &PipelineEvent| {
        if let PipelineEvent::PipelineError { severity, .. } = event {
            events2.lock().unwrap().push(*severity);
        }
    }));

    let feed = feed_of(&pipeline);
    feed(1);

    // one initial attempt plus exactly one retry
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(*events.lock().unwrap(), vec![Severity::Error]);
}
