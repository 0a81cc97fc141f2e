//! Handler failures are isolated and reported through the error hook.

use tidings_bus::{EventBus, HandlerInvocationError, ThreadMode};
use tidings_test::{
    DEFAULT_WAIT, EventA, EventB, Recorder, RecordingSubscriber, init_test_logging,
};

fn bus_with_hook(failures: &Recorder<HandlerInvocationError>) -> EventBus {
    let sink = failures.clone();
    EventBus::builder()
        .with_computation_threads(2)
        .with_thread_name_prefix("failures")
        .with_error_hook(move |err| sink.push(err.clone()))
        .build()
        .unwrap()
}

#[test]
fn failing_handler_reported_once_per_event() {
    init_test_logging();
    let failures = Recorder::new();
    let bus = bus_with_hook(&failures);
    let s = RecordingSubscriber::new("broken")
        .failing::<EventB>(ThreadMode::Posting, "cannot count")
        .into_arc();
    bus.register(&s).unwrap();

    bus.post(EventB(1));
    bus.post(EventB(2));

    let failures = failures.snapshot();
    assert_eq!(failures.len(), 2);
    for failure in &failures {
        assert_eq!(failure.subscriber, "broken");
        assert_eq!(failure.message, "cannot count");
        assert_eq!(failure.thread_mode, ThreadMode::Posting);
        assert!(!failure.panicked);
    }
    assert!(bus.is_registered(&s));
}

#[test]
fn panicking_handler_does_not_reach_publisher() {
    init_test_logging();
    let failures = Recorder::new();
    let bus = bus_with_hook(&failures);
    let s = RecordingSubscriber::new("explosive")
        .panicking::<EventA>(ThreadMode::Posting, "kaboom")
        .into_arc();
    bus.register(&s).unwrap();

    // Would unwind through this call if the panic escaped.
    bus.post(EventA::new("light fuse"));

    let failures = failures.snapshot();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].panicked);
    assert_eq!(failures[0].message, "kaboom");
}

#[test]
fn failure_leaves_other_subscriptions_working() {
    init_test_logging();
    let failures = Recorder::new();
    let bus = bus_with_hook(&failures);
    let healthy = Recorder::new();

    let broken = RecordingSubscriber::new("broken")
        .panicking::<EventB>(ThreadMode::Single, "worker panic")
        .into_arc();
    let fine = RecordingSubscriber::new("fine")
        .recording::<EventB>(ThreadMode::Single, &healthy)
        .into_arc();
    bus.register(&broken).unwrap();
    bus.register(&fine).unwrap();

    for i in 0..10 {
        bus.post(EventB(i));
    }

    // The single worker survives every panic and keeps serving both.
    assert!(healthy.wait_for_len(10, DEFAULT_WAIT));
    assert!(failures.wait_for_len(10, DEFAULT_WAIT));
    assert!(failures.snapshot().iter().all(|f| f.subscriber == "broken"));
}

#[test]
fn pooled_failures_are_reported() {
    init_test_logging();
    let failures = Recorder::new();
    let bus = bus_with_hook(&failures);
    let s = RecordingSubscriber::new("pool")
        .failing::<EventA>(ThreadMode::Io, "io failed")
        .panicking::<EventB>(ThreadMode::Computation, "compute panicked")
        .into_arc();
    bus.register(&s).unwrap();

    bus.post(EventA::new("x"));
    bus.post(EventB(1));
    assert!(failures.wait_for_len(2, DEFAULT_WAIT));

    let mut modes: Vec<_> = failures.snapshot().iter().map(|f| f.thread_mode).collect();
    modes.sort_by_key(|m| m.as_str());
    assert_eq!(modes, vec![ThreadMode::Computation, ThreadMode::Io]);
}
