//! Sticky cache and replay behavior.

use std::thread;

use tidings_bus::{SubscribeOptions, ThreadMode};
use tidings_test::{
    DEFAULT_WAIT, EventA, EventB, Recorder, RecordingSubscriber, init_test_logging,
    manual_test_bus, test_bus,
};

fn sticky(mode: ThreadMode) -> SubscribeOptions {
    SubscribeOptions::from(mode).sticky()
}

#[test]
fn sticky_event_replayed_exactly_once() {
    init_test_logging();
    let bus = test_bus();
    bus.post_sticky(EventB(7));

    let seen = Recorder::new();
    let s = RecordingSubscriber::new("late")
        .recording::<EventB>(sticky(ThreadMode::Single), &seen)
        .into_arc();
    bus.register(&s).unwrap();

    assert!(seen.wait_for_len(1, DEFAULT_WAIT));
    // A flushing event on the same FIFO worker proves nothing else was queued.
    let flush = Recorder::new();
    let flusher = RecordingSubscriber::new("flusher")
        .recording::<EventA>(ThreadMode::Single, &flush)
        .into_arc();
    bus.register(&flusher).unwrap();
    bus.post(EventA::new("flush"));
    assert!(flush.wait_for_len(1, DEFAULT_WAIT));

    assert_eq!(seen.snapshot(), vec![EventB(7)]);
    bus.unregister(&s).unwrap();
    bus.unregister(&flusher).unwrap();
}

#[test]
fn every_sticky_subscriber_gets_its_own_replay() {
    init_test_logging();
    let bus = test_bus();
    bus.post_sticky(EventA::new("cached"));

    let first = Recorder::new();
    let second = Recorder::new();
    let a = RecordingSubscriber::new("a")
        .recording::<EventA>(sticky(ThreadMode::Posting), &first)
        .into_arc();
    let b = RecordingSubscriber::new("b")
        .recording::<EventA>(sticky(ThreadMode::Posting), &second)
        .into_arc();
    bus.register(&a).unwrap();
    bus.register(&b).unwrap();

    assert_eq!(first.snapshot(), vec![EventA::new("cached")]);
    assert_eq!(second.snapshot(), vec![EventA::new("cached")]);
}

#[test]
fn latest_sticky_event_wins() {
    init_test_logging();
    let bus = test_bus();
    bus.post_sticky(EventB(1));
    bus.post_sticky(EventB(2));

    let seen = Recorder::new();
    let s = RecordingSubscriber::new("s")
        .recording::<EventB>(sticky(ThreadMode::Posting), &seen)
        .into_arc();
    bus.register(&s).unwrap();

    assert_eq!(seen.snapshot(), vec![EventB(2)]);
    assert_eq!(bus.sticky_event::<EventB>().as_deref(), Some(&EventB(2)));
}

#[test]
fn remove_sticky_event_requires_equal_value() {
    init_test_logging();
    let bus = test_bus();
    bus.post_sticky(EventA::new("keep"));

    assert!(!bus.remove_sticky_event(&EventA::new("other")));
    assert!(bus.sticky_event::<EventA>().is_some());
    assert!(bus.remove_sticky_event(&EventA::new("keep")));
    assert!(bus.sticky_event::<EventA>().is_none());

    // Nothing cached, nothing replayed.
    let seen = Recorder::new();
    let s = RecordingSubscriber::new("s")
        .recording::<EventA>(sticky(ThreadMode::Posting), &seen)
        .into_arc();
    bus.register(&s).unwrap();
    assert!(seen.is_empty());
}

#[test]
fn remove_all_sticky_events_clears_every_type() {
    init_test_logging();
    let bus = test_bus();
    bus.post_sticky(EventA::new("a"));
    bus.post_sticky(EventB(1));
    assert_eq!(bus.sticky_count(), 2);

    bus.remove_all_sticky_events();
    assert_eq!(bus.sticky_count(), 0);
    assert!(bus.sticky_event::<EventA>().is_none());
    assert!(bus.sticky_event::<EventB>().is_none());
}

#[test]
fn sticky_without_subscribers_is_still_cached() {
    init_test_logging();
    let bus = test_bus();
    assert_eq!(bus.post_sticky(EventB(3)), 0);
    assert_eq!(bus.sticky_event::<EventB>().as_deref(), Some(&EventB(3)));
}

#[test]
fn racing_sticky_post_is_seen_at_least_once_and_at_most_twice() {
    init_test_logging();
    for round in 0..50_u32 {
        let bus = test_bus();
        let seen = Recorder::new();
        let s = RecordingSubscriber::new("racer")
            .recording::<EventB>(sticky(ThreadMode::Posting), &seen)
            .into_arc();

        let poster = {
            let bus = bus.clone();
            thread::spawn(move || bus.post_sticky(EventB(round)))
        };
        bus.register(&s).unwrap();
        poster.join().unwrap();

        // Registered after the post: replay. Before it: live. Both: twice.
        let count = seen.snapshot().iter().filter(|e| **e == EventB(round)).count();
        assert!((1..=2).contains(&count), "round {round}: seen {count} times");
        bus.unregister(&s).unwrap();
    }
}

#[test]
fn duplicate_sticky_handlers_of_one_type_replay_once() {
    init_test_logging();
    let bus = test_bus();
    bus.post_sticky(EventB(5));

    let replaced = Recorder::new();
    let kept = Recorder::new();
    let s = RecordingSubscriber::new("twice")
        .recording::<EventB>(sticky(ThreadMode::Posting), &replaced)
        .recording::<EventB>(sticky(ThreadMode::Posting), &kept)
        .into_arc();
    bus.register(&s).unwrap();

    assert_eq!(bus.subscriptions_of(&s), 1);
    assert!(replaced.is_empty());
    assert_eq!(kept.snapshot(), vec![EventB(5)]);
}

#[test]
fn reregistering_drops_the_pending_replay_of_the_old_subscription() {
    init_test_logging();
    let bus = manual_test_bus();
    let main_loop = bus.main_loop().unwrap();
    bus.post_sticky(EventA::new("cached"));

    let seen = Recorder::new();
    let s = RecordingSubscriber::new("again")
        .recording::<EventA>(sticky(ThreadMode::MainOrdered), &seen)
        .into_arc();
    bus.register(&s).unwrap();
    bus.register(&s).unwrap();

    main_loop.run_pending().unwrap();
    assert_eq!(seen.snapshot(), vec![EventA::new("cached")]);
}

#[test]
fn scoped_unregister_drops_pending_replay_of_that_type() {
    init_test_logging();
    let bus = manual_test_bus();
    let main_loop = bus.main_loop().unwrap();
    bus.post_sticky(EventA::new("a"));
    bus.post_sticky(EventB(1));

    let a = Recorder::new();
    let b = Recorder::new();
    let s = RecordingSubscriber::new("scoped")
        .recording::<EventA>(sticky(ThreadMode::MainOrdered), &a)
        .recording::<EventB>(sticky(ThreadMode::MainOrdered), &b)
        .into_arc();
    bus.register(&s).unwrap();
    bus.unregister_event::<EventA, _>(&s).unwrap();

    main_loop.run_pending().unwrap();
    assert!(a.is_empty());
    assert_eq!(b.snapshot(), vec![EventB(1)]);
    assert!(bus.is_registered(&s));
}
