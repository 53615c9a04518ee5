use std::cell::Cell;
use std::rc::Rc;

use vrepeat_testing::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn reaching_the_bottom_requests_once_on_the_next_frame() {
    init_logging();
    let fx = Fixture::builder(1000).with_load_more().attached();

    fx.scroll_and_settle(19_600.0);
    assert_eq!(fx.repeat.load_more_state(), LoadMoreState::Scheduled);
    assert_eq!(fx.probe.call_count(), 0);

    fx.scroll_and_settle(19_590.0);
    fx.scroll_and_settle(19_600.0);
    fx.frame();

    assert_eq!(fx.probe.call_count(), 1);
    assert_eq!(
        fx.probe.calls()[0],
        ScrollContext {
            top_index: 979,
            is_at_top: false,
            is_at_bottom: true,
        }
    );
    assert_eq!(fx.repeat.load_more_state(), LoadMoreState::Idle);
    assert_eq!(fx.repeat.stats().load_more_calls, 1);

    fx.frame();
    assert_eq!(fx.probe.call_count(), 1);
}

#[test]
fn deferred_completion_holds_off_further_requests() {
    let fx = Fixture::builder(1000).with_load_more().attached();
    fx.probe.set_deferred(true);

    fx.scroll_and_settle(19_600.0);
    fx.frame();
    assert_eq!(fx.probe.call_count(), 1);
    assert_eq!(fx.probe.pending(), 1);
    assert_eq!(fx.repeat.load_more_state(), LoadMoreState::InFlight);

    fx.scroll_and_settle(19_580.0);
    fx.scroll_and_settle(19_600.0);
    fx.frame();
    assert_eq!(fx.probe.call_count(), 1);

    assert_eq!(fx.probe.complete_all(), 1);
    fx.pump();
    assert_eq!(fx.repeat.load_more_state(), LoadMoreState::Idle);

    fx.scroll_and_settle(19_580.0);
    fx.scroll_and_settle(19_600.0);
    fx.frame();
    assert_eq!(fx.probe.call_count(), 2);
}

#[test]
fn approaching_the_top_reports_is_at_top() {
    let fx = Fixture::builder(1000).with_load_more().attached();
    fx.scroll_and_settle(200.0);
    fx.frame();
    assert_eq!(fx.probe.call_count(), 0);

    fx.scroll_and_settle(60.0);
    fx.frame();

    assert_eq!(
        fx.probe.calls(),
        vec![ScrollContext {
            top_index: 3,
            is_at_top: true,
            is_at_bottom: false,
        }]
    );
}

#[test]
fn handler_appending_items_extends_the_window_below() {
    let fx = Fixture::builder(1000).with_load_more().attached();
    let list = fx.list.clone();
    fx.context.set_function("getMore", move |_, is_at_bottom, _| {
        if is_at_bottom {
            let len = list.len() as u32;
            list.extend(len..len + 100);
        }
        LoadMoreOutcome::Done
    });

    fx.scroll_and_settle(19_600.0);
    fx.frame();

    assert_eq!(fx.list.len(), 1100);
    assert_eq!(fx.repeat.item_count(), 1100);
    assert_eq!(fx.repeat.window().range(), Some(VisibleRange::new(979, 999)));
    assert_eq!(fx.host.state().bottom_buffer_height, 100.0 * 20.0);
    fx.assert_consistent();

    fx.scroll_and_settle(21_600.0);
    assert_eq!(fx.repeat.window().range(), Some(VisibleRange::new(1079, 1099)));
    fx.frame();
    assert_eq!(fx.list.len(), 1200);
    fx.assert_consistent();
}

#[test]
fn handler_is_resolved_again_at_call_time() {
    let fx = Fixture::builder(1000).with_load_more().attached();
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    fx.context.set_function("getMore", move |_, _, _| {
        counter.set(counter.get() + 1);
        LoadMoreOutcome::Done
    });

    fx.scroll_and_settle(19_600.0);
    fx.frame();

    assert_eq!(calls.get(), 1);
    assert_eq!(fx.probe.call_count(), 0);
}

#[test]
fn handler_turned_into_a_value_is_skipped() {
    let fx = Fixture::builder(1000).with_load_more().attached();
    fx.context
        .set_member("getMore", ContextMember::Value("undefined".into()));

    fx.scroll_and_settle(19_600.0);
    fx.frame();

    assert_eq!(fx.repeat.load_more_state(), LoadMoreState::Idle);
    assert_eq!(fx.repeat.stats().load_more_calls, 0);
}

#[test]
fn expression_binding_receives_the_scroll_context() {
    let fx = Fixture::builder(1000).build();
    let seen = Rc::new(Cell::new(None));
    let sink = Rc::clone(&seen);
    let expression: ContextExpression = Rc::new(move |context: &ScrollContext| {
        sink.set(Some(*context));
        LoadMoreOutcome::Done
    });
    fx.repeat
        .bind(
            BindingScope::new("row", fx.context.clone())
                .with_load_more(LoadMoreBinding::Expression(expression)),
        )
        .unwrap();
    fx.attach().unwrap();

    fx.scroll_and_settle(19_600.0);
    fx.frame();

    assert_eq!(
        seen.get(),
        Some(ScrollContext {
            top_index: 979,
            is_at_top: false,
            is_at_bottom: true,
        })
    );
    fx.repeat
        .with_container(|container| assert!(container.views().iter().all(|v| v.item_name == "row")));
}

#[test]
fn without_a_binding_nothing_is_requested() {
    let fx = Fixture::builder(1000).attached();

    fx.scroll_and_settle(19_600.0);
    fx.frame();

    assert_eq!(fx.repeat.load_more_state(), LoadMoreState::Idle);
    assert_eq!(fx.repeat.stats().load_more_calls, 0);
}

#[test]
fn detach_cancels_a_scheduled_request() {
    let fx = Fixture::builder(1000).with_load_more().attached();
    fx.scroll_and_settle(19_600.0);
    assert_eq!(fx.repeat.load_more_state(), LoadMoreState::Scheduled);

    fx.repeat.detach();
    fx.frame();

    assert_eq!(fx.probe.call_count(), 0);
    assert_eq!(fx.repeat.load_more_state(), LoadMoreState::Idle);
}

#[test]
fn detach_between_frame_and_call_skips_the_handler() {
    let fx = Fixture::builder(1000).with_load_more().attached();
    fx.scroll_and_settle(19_600.0);
    assert_eq!(fx.repeat.load_more_state(), LoadMoreState::Scheduled);

    let repeat = fx.repeat.clone();
    fx.runtime
        .handle()
        .register_frame_callback(move |_| repeat.detach());
    fx.frame();

    assert_eq!(fx.repeat.lifecycle(), Lifecycle::Detached);
    assert_eq!(fx.probe.call_count(), 0);
    assert_eq!(fx.repeat.load_more_state(), LoadMoreState::Idle);
}

#[test]
fn detach_drops_an_in_flight_request() {
    let fx = Fixture::builder(1000).with_load_more().attached();
    fx.probe.set_deferred(true);
    fx.scroll_and_settle(19_600.0);
    fx.frame();
    assert_eq!(fx.repeat.load_more_state(), LoadMoreState::InFlight);

    fx.repeat.detach();
    assert_eq!(fx.runtime.pending_task_count(), 0);
    fx.probe.complete_all();
    fx.pump();

    assert_eq!(fx.repeat.load_more_state(), LoadMoreState::Idle);
}
