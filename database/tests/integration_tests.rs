//! Contract tests run against every TournamentStore implementation.

use chrono::Utc;
use database::{connect, CommitRecord, DatabaseConfig, DatabaseError, MemoryStore, TournamentStore};
use types::{Color, Match, MatchKind, Person, Player, PlayerSummary, Round, Tournament};

async fn stores() -> Vec<(&'static str, Box<dyn TournamentStore>)> {
    let sqlite = connect(&DatabaseConfig::with_url("sqlite::memory:"))
        .await
        .expect("Failed to open sqlite store");
    vec![
        ("memory", Box::new(MemoryStore::new())),
        ("sqlite", Box::new(sqlite)),
    ]
}

async fn seeded(store: &dyn TournamentStore, players: usize) -> (Tournament, Vec<Person>) {
    let tournament = Tournament::new("Test Fall", "testfall", Utc::now());
    store
        .create_tournament(&tournament)
        .await
        .expect("Failed to create tournament");
    let mut people = Vec::new();
    for i in 0..players {
        let person = Person::new(&format!("Player {i}"), &format!("p{i}"))
            .with_color(Color::ALL[i % Color::ALL.len()]);
        store.save_person(&person).await.expect("Failed to save person");
        store
            .add_player_summary(&PlayerSummary::new(tournament.id, &person, i))
            .await
            .expect("Failed to add summary");
        people.push(person);
    }
    (tournament, people)
}

fn match_with(tournament: &Tournament, index: usize, people: &[Person]) -> Match {
    let mut m = Match::new(tournament.id, index, MatchKind::Qualifying, 10);
    for person in people {
        m.add_player(Player::from_person(person)).expect("room in match");
    }
    m
}

#[tokio::test]
async fn test_people_round_trip_and_random_selection() {
    for (name, store) in stores().await {
        let (_, mut people) = seeded(store.as_ref(), 3).await;

        let loaded = store.get_person(people[0].id).await.expect(name);
        assert_eq!(loaded, people[0], "{name}");

        people[1].disable();
        store.save_person(&people[1]).await.expect(name);
        let exclude = [people[0].id];
        for _ in 0..10 {
            let picked = store.random_person(&exclude).await.expect(name).expect(name);
            assert_eq!(picked.id, people[2].id, "{name}");
        }

        let all: Vec<_> = people.iter().map(|p| p.id).collect();
        assert!(store.random_person(&all).await.expect(name).is_none(), "{name}");

        let missing = store.get_person(uuid::Uuid::new_v4()).await;
        assert!(matches!(missing, Err(DatabaseError::PersonNotFound(_))), "{name}");
    }
}

#[tokio::test]
async fn test_tournament_save_requires_existing_row() {
    for (name, store) in stores().await {
        let (mut tournament, _) = seeded(store.as_ref(), 0).await;
        tournament.started = Some(Utc::now());
        store.save_tournament(&tournament).await.expect(name);
        let loaded = store.get_tournament(tournament.id).await.expect(name);
        assert!(loaded.is_started(), "{name}");

        let stranger = Tournament::new("Other", "other", Utc::now());
        let err = store.save_tournament(&stranger).await.unwrap_err();
        assert!(err.is_not_found(), "{name}: {err}");
    }
}

#[tokio::test]
async fn test_roster_is_kept_in_joining_order() {
    for (name, store) in stores().await {
        let (tournament, people) = seeded(store.as_ref(), 5).await;
        store
            .remove_player_summary(tournament.id, people[2].id)
            .await
            .expect(name);
        let seats: Vec<_> = store
            .player_summaries(tournament.id)
            .await
            .expect(name)
            .iter()
            .map(|s| s.seat)
            .collect();
        assert_eq!(seats, vec![0, 1, 3, 4], "{name}");

        let err = store.player_summary(tournament.id, people[2].id).await.unwrap_err();
        assert!(err.is_not_found(), "{name}");
    }
}

#[tokio::test]
async fn test_matches_are_append_only_and_feed_summaries() {
    for (name, store) in stores().await {
        let (tournament, people) = seeded(store.as_ref(), 8).await;

        let out_of_order = match_with(&tournament, 1, &people[0..4]);
        let err = store.create_match(&out_of_order).await.unwrap_err();
        assert!(matches!(err, DatabaseError::OutOfSequence { index: 1, expected: 0 }), "{name}");

        let mut first = match_with(&tournament, 0, &people[0..4]);
        let second = match_with(&tournament, 1, &people[4..8]);
        store.create_match(&first).await.expect(name);
        store.create_match(&second).await.expect(name);
        assert_eq!(store.unfinished_qualifying(tournament.id).await.expect(name), 2, "{name}");
        assert!(store.current_match(tournament.id).await.expect(name).is_none(), "{name}");

        first.start(Utc::now(), &[]).expect(name);
        first
            .commit(Round::from_parts([3, 1, 0, 0], [0; 4], [false; 4]), Utc::now())
            .expect(name);
        store.save_match(&first).await.expect(name);

        let current = store.current_match(tournament.id).await.expect(name).expect(name);
        assert_eq!(current.index, 0, "{name}");
        assert_eq!(current.rounds.len(), 1, "{name}");

        let summary = store.player_summary(tournament.id, people[0].id).await.expect(name);
        assert_eq!(summary.matches, 1, "{name}");
        assert_eq!(summary.tally.kills, 3, "{name}");
        assert_eq!(summary.tally.sweeps, 1, "{name}");
        assert_eq!(summary.total_score, first.players[0].total_score(), "{name}");

        let untouched = store.player_summary(tournament.id, people[4].id).await.expect(name);
        assert_eq!(untouched.matches, 0, "{name}");

        first.end(Utc::now(), 1.0).expect(name);
        store.save_match(&first).await.expect(name);
        let next = store.next_match(tournament.id).await.expect(name).expect(name);
        assert_eq!(next.index, 1, "{name}");
        assert_eq!(store.unfinished_qualifying(tournament.id).await.expect(name), 1, "{name}");

        let winner = first.kill_order[0];
        let summary = store
            .player_summary(tournament.id, first.players[winner].person_id)
            .await
            .expect(name);
        assert_eq!(summary.skill_score, first.players[winner].total_score(), "{name}");
    }
}

#[tokio::test]
async fn test_runnerups_skip_seated_players() {
    for (name, store) in stores().await {
        let (tournament, people) = seeded(store.as_ref(), 10).await;
        let mut played = match_with(&tournament, 0, &people[0..4]);
        store.create_match(&played).await.expect(name);
        played.start(Utc::now(), &[]).expect(name);
        played
            .commit(Round::from_parts([1, 0, 0, 0], [0; 4], [false; 4]), Utc::now())
            .expect(name);
        played.end(Utc::now(), 1.0).expect(name);
        store.save_match(&played).await.expect(name);

        let seated = match_with(&tournament, 1, &people[4..8]);
        store.create_match(&seated).await.expect(name);

        let runnerups = store.runnerups(tournament.id, None).await.expect(name);
        let nicks: Vec<_> = runnerups.iter().map(|s| s.nick.as_str()).collect();
        // fresh players first, then the veterans by skill
        assert_eq!(&nicks[0..2], &["p8", "p9"], "{name}");
        assert_eq!(nicks.len(), 6, "{name}");
        assert_eq!(nicks[2], played.players[played.kill_order[0]].nick, "{name}");

        let top = store.runnerups(tournament.id, Some(4)).await.expect(name);
        assert_eq!(top.len(), 4, "{name}");

        let playoff = store.playoff_players(tournament.id, 3).await.expect(name);
        assert_eq!(playoff[0].person_id, played.players[played.kill_order[0]].person_id, "{name}");
        assert_eq!(playoff.len(), 3, "{name}");
    }
}

#[tokio::test]
async fn test_commits_round_trip() {
    for (name, store) in stores().await {
        let (tournament, people) = seeded(store.as_ref(), 4).await;
        let mut m = match_with(&tournament, 0, &people);
        store.create_match(&m).await.expect(name);
        m.start(Utc::now(), &[]).expect(name);
        m.commit(Round::from_parts([0, 2, 0, 1], [1, 0, 0, 0], [false, false, true, false]), Utc::now())
            .expect(name);

        let record = CommitRecord::latest(&m).expect(name);
        store.insert_commit(&record).await.expect(name);

        let stored = store.commits(tournament.id, 0).await.expect(name);
        assert_eq!(stored.len(), 1, "{name}");
        assert!(stored[0].id.is_some(), "{name}");
        assert_eq!(stored[0].kills, [0, 2, 0, 1], "{name}");
        assert_eq!(stored[0].shots, [false, false, true, false], "{name}");
        assert_eq!(stored[0].round, 1, "{name}");
        assert!(store.commits(tournament.id, 1).await.expect(name).is_empty(), "{name}");
    }
}
