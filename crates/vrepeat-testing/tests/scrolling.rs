use vrepeat_testing::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn initial_window_covers_viewport_plus_one() {
    init_logging();
    let fx = Fixture::builder(1000).attached();

    assert_eq!(fx.repeat.lifecycle(), Lifecycle::Steady);
    assert_eq!(fx.repeat.min_views(), 21);
    assert_eq!(fx.repeat.window().range(), Some(VisibleRange::new(0, 20)));
    assert_eq!(fx.indices(), (0..=20).collect::<Vec<_>>());
    assert_eq!(fx.host.state().top_buffer_height, 0.0);
    assert_eq!(fx.host.state().bottom_buffer_height, 979.0 * 20.0);
    assert_eq!(fx.host.state().views_created, 21);
    fx.assert_consistent();
}

#[test]
fn views_see_their_binding_flags() {
    let fx = Fixture::builder(3).attached();
    fx.repeat.with_container(|container| {
        let views = container.views();
        assert_eq!(views.len(), 3);
        assert!(views[0].is_first && views[0].is_even);
        assert!(!views[1].is_first && !views[1].is_last && !views[1].is_even);
        assert!(views[2].is_last);
        assert!(views.iter().all(|view| view.item_name == "item"));
    });
}

#[test]
fn scrolling_down_recycles_head_views_to_the_tail() {
    init_logging();
    let fx = Fixture::builder(1000).attached();
    let before = fx.view_ids();
    let rebinds = fx.repeat.stats().rebinds;

    fx.scroll_and_settle(100.0);

    assert_eq!(
        fx.repeat.last_transition(),
        Some(ScrollTransition::ScrollDown { moved: 5 })
    );
    assert_eq!(fx.indices(), (5..=25).collect::<Vec<_>>());
    let mut expected = before[5..].to_vec();
    expected.extend_from_slice(&before[..5]);
    assert_eq!(fx.view_ids(), expected);
    assert_eq!(fx.host.state().views_created, 21);
    assert_eq!(fx.host.state().views_moved, 5);
    assert_eq!(fx.repeat.stats().rebinds - rebinds, 5);
    assert_eq!(fx.host.state().top_buffer_height, 100.0);
    fx.assert_consistent();
}

#[test]
fn scrolling_up_recycles_tail_views_to_the_head() {
    let fx = Fixture::builder(1000).attached();
    fx.scroll_and_settle(200.0);
    let before = fx.view_ids();

    fx.scroll_and_settle(140.0);

    assert_eq!(
        fx.repeat.last_transition(),
        Some(ScrollTransition::ScrollUp { moved: 3 })
    );
    assert_eq!(fx.indices(), (7..=27).collect::<Vec<_>>());
    let mut expected = before[18..].to_vec();
    expected.extend_from_slice(&before[..18]);
    assert_eq!(fx.view_ids(), expected);
    assert_eq!(fx.host.state().views_created, 21);
    fx.assert_consistent();
}

#[test]
fn rapid_scroll_events_coalesce_into_one_pass() {
    let fx = Fixture::builder(1000).attached();

    fx.scroll_to(100.0);
    fx.scroll_to(200.0);
    fx.scroll_to(300.0);
    assert_eq!(fx.repeat.activity(), ActivityState::ScrollPending);
    fx.pump();

    assert_eq!(fx.repeat.activity(), ActivityState::Idle);
    assert_eq!(
        fx.repeat.last_transition(),
        Some(ScrollTransition::ScrollDown { moved: 15 })
    );
    assert_eq!(fx.repeat.stats().views_moved, 15);
    assert_eq!(fx.indices(), (15..=35).collect::<Vec<_>>());
    fx.assert_consistent();
}

#[test]
fn jump_rebuilds_the_window_in_place() {
    let fx = Fixture::builder(1000).attached();

    fx.scroll_and_settle(10_000.0);

    assert_eq!(
        fx.repeat.last_transition(),
        Some(ScrollTransition::Jump {
            direction: JumpDirection::Down
        })
    );
    let stats = fx.repeat.stats();
    assert_eq!(stats.remeasures, 1);
    assert_eq!(stats.views_moved, 0);
    assert_eq!(fx.host.state().views_created, 21);
    assert_eq!(fx.indices(), (500..=520).collect::<Vec<_>>());
    fx.assert_consistent();

    fx.scroll_and_settle(0.0);
    assert_eq!(
        fx.repeat.last_transition(),
        Some(ScrollTransition::Jump {
            direction: JumpDirection::Up
        })
    );
    assert_eq!(fx.indices(), (0..=20).collect::<Vec<_>>());
    fx.assert_consistent();
}

#[test]
fn jump_picks_up_a_new_item_height() {
    let fx = Fixture::builder(1000).attached();
    fx.host.update(|state| state.item_height = 40.0);

    fx.scroll_and_settle(10_000.0);

    let window = fx.repeat.window();
    assert_eq!(window.item_height, 40.0);
    assert_eq!(fx.repeat.min_views(), 11);
    assert_eq!(window.range(), Some(VisibleRange::new(250, 260)));
    assert_eq!(fx.host.state().views_destroyed, 10);
    fx.assert_consistent();
}

#[test]
fn scrolling_past_the_end_clamps_the_window() {
    let fx = Fixture::builder(1000).attached();

    fx.scroll_and_settle(19_600.0);

    assert_eq!(fx.repeat.window().range(), Some(VisibleRange::new(979, 999)));
    assert_eq!(fx.host.state().bottom_buffer_height, 0.0);
    assert_eq!(fx.host.state().top_buffer_height, 979.0 * 20.0);
    fx.assert_consistent();

    fx.scroll_and_settle(19_590.0);
    assert_eq!(fx.repeat.last_transition(), Some(ScrollTransition::PinnedBottom));
    assert_eq!(fx.repeat.window().range(), Some(VisibleRange::new(979, 999)));
}

#[test]
fn buffers_stay_consistent_across_a_scroll_session() {
    let fx = Fixture::builder(1000).attached();
    let offsets = [
        0.0, 37.0, 400.0, 415.0, 5_000.0, 19_600.0, 19_590.0, 12_000.0, 11_990.0, 11_000.0, 0.0,
    ];
    for offset in offsets {
        fx.scroll_and_settle(offset);
        fx.assert_consistent();
        let window = fx.repeat.window();
        let expected = compute_visible_range(1000, 21, 20.0, fx.host.state().scroll_top)
            .map(|range| range.start);
        assert_eq!(Some(window.first_index), expected, "offset {offset}");
    }
    assert_eq!(fx.host.state().views_created, 21);
    assert_eq!(fx.repeat.stats().unclassified_transitions, 0);
}

#[test]
fn short_list_renders_everything_and_stays_pinned() {
    let fx = Fixture::builder(5).attached();
    assert_eq!(fx.indices(), vec![0, 1, 2, 3, 4]);
    assert_eq!(fx.host.state().bottom_buffer_height, 0.0);

    fx.scroll_and_settle(50.0);
    assert_eq!(fx.repeat.last_transition(), Some(ScrollTransition::PinnedBottom));
    assert_eq!(fx.indices(), vec![0, 1, 2, 3, 4]);
    fx.assert_consistent();
}

#[test]
fn scroll_before_attach_is_ignored() {
    let fx = Fixture::builder(100).build();
    fx.scroll_to(100.0);
    fx.pump();
    assert_eq!(fx.repeat.lifecycle(), Lifecycle::Detached);
    assert!(fx.indices().is_empty());
    assert_eq!(fx.repeat.last_transition(), None);
}
