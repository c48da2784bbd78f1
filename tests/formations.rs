mod common;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use fpl_seasons::export::write_formation_csv;
use fpl_seasons::formations::{
    FormationAggregator, FormationCatalog, FormationShape, PlayerPoints, score, score_season,
    top_points,
};
use fpl_seasons::records::Position;
use fpl_seasons::season::SeasonCompiler;

use common::*;

fn squad(lines: Vec<(Position, Vec<i64>)>) -> Vec<PlayerPoints> {
    let mut out = Vec::new();
    let mut element = 1;
    for (position, points) in lines {
        for p in points {
            out.push(PlayerPoints {
                element,
                name: format!("player_{element}"),
                position,
                points: p,
            });
            element += 1;
        }
    }
    out
}

fn sample_gameweek() -> Vec<PlayerPoints> {
    squad(vec![
        (Position::Goalkeeper, vec![12, 1]),
        (Position::Forward, vec![10, 8, 6, 2]),
        (Position::Midfielder, vec![9, 7, 5, 4, 3]),
        (Position::Defender, vec![6, 6, 5, 4]),
    ])
}

#[test]
fn four_three_three_takes_the_best_of_each_line() {
    let catalog = FormationCatalog::new(vec![FormationShape::new("4-3-3", 4, 3, 3)]).unwrap();
    let scores = score(&sample_gameweek(), &catalog);
    assert_eq!(scores.len(), 1);
    let s = &scores[0];
    assert_eq!(s.name, "4-3-3");
    assert_eq!(s.forwards, 24);
    assert_eq!(s.midfielders, 21);
    assert_eq!(s.defenders, 21);
    assert_eq!(s.total_points, 66);
}

#[test]
fn totals_are_the_sum_of_the_lines() {
    let catalog = FormationCatalog::standard();
    let scores = score(&sample_gameweek(), &catalog);
    assert_eq!(scores.len(), catalog.shapes().len());
    for (s, shape) in scores.iter().zip(catalog.shapes()) {
        assert_eq!(s.name, shape.name);
        assert_eq!(s.total_points, s.forwards + s.midfielders + s.defenders);
    }
}

#[test]
fn goalkeepers_never_count() {
    let catalog = FormationCatalog::standard();
    let with_keepers = score(&sample_gameweek(), &catalog);
    let without: Vec<PlayerPoints> = sample_gameweek()
        .into_iter()
        .filter(|p| p.position != Position::Goalkeeper)
        .collect();
    assert_eq!(with_keepers, score(&without, &catalog));
}

#[test]
fn input_order_does_not_change_scores() {
    let catalog = FormationCatalog::standard();
    let expected = score(&sample_gameweek(), &catalog);
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let mut players = sample_gameweek();
        players.shuffle(&mut rng);
        assert_eq!(score(&players, &catalog), expected);
    }
}

#[test]
fn short_lines_sum_what_is_available() {
    let players = squad(vec![
        (Position::Forward, vec![7]),
        (Position::Defender, vec![3, 2]),
    ]);
    let catalog = FormationCatalog::new(vec![FormationShape::new("5-4-1", 5, 4, 1)]).unwrap();
    let s = &score(&players, &catalog)[0];
    assert_eq!(s.forwards, 7);
    assert_eq!(s.midfielders, 0);
    assert_eq!(s.defenders, 5);
    assert_eq!(s.total_points, 12);
    assert_eq!(top_points(&[], Position::Forward, 3), 0);
}

#[test]
fn season_scoring_covers_every_round_and_shape() {
    let config = config();
    let loader = loader();
    let corrections = config.correction_registry();
    let compiler = SeasonCompiler::new(&loader, &config.sources, &corrections, ROUNDS);
    let catalog = FormationCatalog::standard();

    let table = compiler.compile(REGULAR).unwrap();
    let rows = score_season(REGULAR, &table.records, &catalog, ROUNDS);
    assert_eq!(rows.len(), ROUNDS as usize * catalog.shapes().len());
    assert!(rows.iter().all(|row| row.year == REGULAR));

    // one forward, one midfielder, one defender in the squad
    let round_5 = rows.iter().find(|row| row.round == 5 && row.name == "4-4-2").unwrap();
    assert_eq!(round_5.forwards, points(4, 5));
    assert_eq!(round_5.midfielders, points(3, 5));
    assert_eq!(round_5.defenders, points(2, 5));
}

#[test]
fn aggregation_is_byte_identical_across_runs() {
    let config = config();
    let catalog = FormationCatalog::standard();
    let seasons = config.seasons.clone();

    let render = || {
        let loader = loader();
        let corrections = config.correction_registry();
        let compiler = SeasonCompiler::new(&loader, &config.sources, &corrections, ROUNDS)
            .with_parallelism(4);
        let outcome = FormationAggregator::new(&compiler, &catalog).aggregate_seasons(&seasons);
        assert!(outcome.failures.is_empty());
        let mut buf = Vec::new();
        write_formation_csv(&mut buf, &outcome.rows).unwrap();
        buf
    };

    let first = render();
    assert_eq!(first, render());
    let text = String::from_utf8(first).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("name,forwards,midfielders,defenders,round,total_points,year")
    );
    assert_eq!(lines.count(), 2 * ROUNDS as usize * catalog.shapes().len());
}

#[test]
fn failing_season_is_skipped_by_the_aggregator() {
    let config = config();
    let loader = loader();
    let corrections = config.correction_registry();
    let compiler = SeasonCompiler::new(&loader, &config.sources, &corrections, ROUNDS);
    let catalog = FormationCatalog::standard();

    let seasons = vec![
        REGULAR.to_string(),
        "2020-21".to_string(),
        POSTPONED.to_string(),
    ];
    let outcome = FormationAggregator::new(&compiler, &catalog).aggregate_seasons(&seasons);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].0, "2020-21");
    assert_eq!(outcome.rows.len(), 2 * ROUNDS as usize * catalog.shapes().len());
    assert_eq!(outcome.rows[0].year, REGULAR);
    assert_eq!(outcome.rows.last().map(|r| r.year.as_str()), Some(POSTPONED));
}
