use std::sync::Arc;
use tracing::info;

use flowpipe::input::InputTransformer;
use flowpipe::output::OutputTransformer;
use flowpipe::pipeline::Pipeline;

fn main() {
    tracing_subscriber::fmt().init();

    let pipeline = Pipeline::<i32>::new();

    pipeline
        .add_processor("double", 10, Arc::new(|v: i32, forward: &dyn Fn(i32)| forward(v * 2)))
        .unwrap();
    pipeline
        .add_processor("stringify-len", 20, Arc::new(|v: i32, forward: &dyn Fn(i32)| {
            info!(value = v, "processed");
            forward(v);
        }))
        .unwrap();

    let printer = OutputTransformer::passthrough(
        "stdout",
        0,
        Arc::new(|v: i32| println!("output: {v}")),
    );
    pipeline.tail().register_output(printer).unwrap();

    let input = InputTransformer::passthrough("feed");
    input.attach(pipeline.head());
    let feed = input.inline().unwrap();

    for i in 1..=3 {
        feed(i);
    }
}
