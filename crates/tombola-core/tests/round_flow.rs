// Round-level behaviour of the draw engine, exercised through the public
// `Game` API with seeded generators.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use tombola_core::planner::NoiseGap;
use tombola_core::round::{QueueEntry, RoundPhase};
use tombola_core::{Game, RoundConfig, RoundEvent};

type TestGame = Game<ChaCha8Rng, Vec<RoundEvent>>;

fn new_game(config: RoundConfig, seed: u64) -> TestGame {
    Game::new(config, ChaCha8Rng::seed_from_u64(seed), Vec::new()).expect("valid config")
}

fn over_events(game: &TestGame) -> Vec<&RoundEvent> {
    game.notifier()
        .iter()
        .filter(|e| matches!(e, RoundEvent::Over(_)))
        .collect()
}

// ===========================================================================
// End-to-end
// ===========================================================================

#[test]
fn preset_pair_wins_a_one_winner_round() {
    let mut game = new_game(RoundConfig::new(5, 2, 1), 1);
    game.push_preset(&[3, 3]).unwrap();

    let first = game.draw_one();
    let second = game.draw_one();

    assert_eq!(first.number, 3);
    assert_eq!(second.number, 3);
    assert_eq!(game.state().have(3), 2);
    assert_eq!(game.state().winners(), &[3]);
    assert_eq!(game.state().phase(), RoundPhase::Over);

    let overs = over_events(&game);
    assert_eq!(overs.len(), 1);
    match overs[0] {
        RoundEvent::Over(over) => assert_eq!(over.winners, vec![3]),
        other => panic!("expected round:over, got {other:?}"),
    }
}

#[test]
fn stealth_plan_with_unit_gap_forces_target_to_win() {
    let mut game = new_game(RoundConfig::new(10, 3, 1), 23);
    game.build_plan(&[5], NoiseGap::new(1, 1)).unwrap();

    let queue: Vec<QueueEntry> = game.state().stealth_queue().iter().copied().collect();
    let forced: Vec<usize> = queue
        .iter()
        .enumerate()
        .filter(|(_, e)| **e == QueueEntry::Forced(5))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(forced.len(), 3);
    for i in forced {
        assert!(i > 0 && queue[i - 1] == QueueEntry::Noise);
    }

    while !game.state().stealth_queue().is_empty() {
        game.draw_one();
    }
    assert!(game.state().is_winner(5));
}

#[test]
fn multi_target_plan_makes_every_target_win() {
    for seed in 0..10 {
        let mut game = new_game(RoundConfig::new(20, 4, 3), seed);
        game.build_plan(&[2, 11, 17], NoiseGap::default()).unwrap();

        let mut guard = 0;
        while !game.state().stealth_queue().is_empty() {
            game.draw_one();
            guard += 1;
            assert!(guard < 200, "stealth queue did not drain");
        }
        for target in [2, 11, 17] {
            assert!(game.state().is_winner(target), "seed {seed}: {target} did not win");
        }
    }
}

// ===========================================================================
// Invariants over long random rounds
// ===========================================================================

#[test]
fn counts_grow_by_one_per_draw_and_winners_never_shrink() {
    let mut game = new_game(RoundConfig::new(10, 4, 10), 99);
    game.build_plan(&[7], NoiseGap::default()).unwrap();
    game.push_preset(&[1, 2, 1]).unwrap();

    let mut previous_counts = game.state().counts().clone();
    let mut previous_winners: Vec<u32> = Vec::new();

    for _ in 0..80 {
        let payload = game.draw_one();
        let n = payload.number;

        for (number, count) in &payload.counts {
            let before = previous_counts.get(number).copied().unwrap_or(0);
            let expected = if *number == n { before + 1 } else { before };
            assert_eq!(*count, expected, "count of {number}");
        }

        // Winners only grow, keep their order, and hold no duplicates.
        assert!(payload.winners.starts_with(&previous_winners));
        let mut sorted = payload.winners.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), payload.winners.len());
        for w in &payload.winners {
            assert!(payload.counts[w] >= 4);
        }

        previous_counts = payload.counts;
        previous_winners = payload.winners;
    }
}

#[test]
fn no_immediate_repeat_with_multiple_candidates() {
    let mut game = new_game(RoundConfig::new(5, 20, 10), 4);
    let mut last = None;
    for _ in 0..50 {
        let n = game.draw_one().number;
        assert_ne!(Some(n), last);
        last = Some(n);
    }
}

#[test]
fn round_over_fires_once_until_reset() {
    let config = RoundConfig::new(5, 1, 2);
    let mut game = new_game(config, 8);

    for _ in 0..10 {
        game.draw_one();
    }
    assert_eq!(over_events(&game).len(), 1);

    game.reset(config).unwrap();
    for _ in 0..10 {
        game.draw_one();
    }
    assert_eq!(over_events(&game).len(), 2);
}

#[test]
fn round_over_reports_winners_at_quota() {
    let mut game = new_game(RoundConfig::new(5, 1, 2), 8);
    while game.state().is_active() {
        game.draw_one();
    }
    match over_events(&game)[0] {
        RoundEvent::Over(over) => assert_eq!(over.winners.len(), 2),
        other => panic!("expected round:over, got {other:?}"),
    }
}

// ===========================================================================
// Reset and prediction
// ===========================================================================

#[test]
fn reset_keeps_planned_winners_until_cleared() {
    let config = RoundConfig::new(10, 3, 2);
    let mut game = new_game(config, 12);
    game.build_plan(&[4, 9], NoiseGap::default()).unwrap();
    game.draw_one();
    game.draw_one();

    game.reset(config).unwrap();
    let snap = game.snapshot();
    assert!(snap.counts.is_empty());
    assert!(snap.drawn.is_empty());
    assert!(snap.winners.is_empty());
    assert!(snap.stealth_queue.is_empty());
    assert_eq!(snap.planned_winners, vec![4, 9]);

    game.clear_plan();
    game.reset(config).unwrap();
    assert!(game.snapshot().planned_winners.is_empty());
}

#[test]
fn prediction_is_idempotent_and_tracks_queues() {
    let mut game = new_game(RoundConfig::new(10, 3, 2), 5);
    game.force_win(6).unwrap();
    game.build_plan(&[2], NoiseGap::default()).unwrap();
    game.draw_one();

    let a = game.prediction();
    let b = game.prediction();
    assert_eq!(a, b);

    let six = a.list.iter().find(|e| e.number == 6).unwrap();
    let two = a.list.iter().find(|e| e.number == 2).unwrap();
    // The first draw resolves a noise marker, which may land on either.
    assert!(six.have + six.in_queue >= 3);
    assert!(two.have + two.in_queue >= 3);
    assert_eq!(six.remaining, 0);
    assert_eq!(two.remaining, 0);
}

#[test]
fn events_follow_issuance_order() {
    let mut game = new_game(RoundConfig::new(5, 1, 1), 2);
    game.draw_one();
    game.reset(RoundConfig::new(10, 2, 1)).unwrap();
    game.draw_one();

    let names: Vec<&str> = game.notifier().iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["draw", "round:over", "round:reset", "draw"]);
}
