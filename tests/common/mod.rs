#![allow(dead_code)]

use fpl_seasons::config::PipelineConfig;
use fpl_seasons::source::{MemoryFetch, SourceLoader};

pub const BASE: &str = "https://fpl.test";
pub const REGULAR: &str = "2018-19";
pub const POSTPONED: &str = "2019-20";
pub const ROUNDS: u32 = 38;

/// Player present in every snapshot but missing from the player reference.
pub const GHOST: u32 = 99;
/// Forward who plays twice in gameweek 2 of the regular season.
pub const DOUBLE_PLAYER: u32 = 4;
pub const DOUBLE_ROUND: u32 = 2;
pub const SECOND_FIXTURE_POINTS: i64 = 3;

const GW_HEADER: &str = "name,assists,bonus,bps,clean_sheets,creativity,element,goals_conceded,goals_scored,ict_index,influence,minutes,opponent_team,red_cards,round,saves,selected,threat,total_points,transfers_in,transfers_out,value,was_home,yellow_cards";

/// (element, name, own team id, element_type)
const SQUAD: [(u32, &str, u32, u32); 4] = [
    (1, "Bernd_Leno", 1, 1),
    (2, "Kieran_Tierney", 1, 2),
    (3, "Dwight_McNeil", 2, 3),
    (4, "Chris_Wood", 2, 4),
];

/// Points scored by `element` in the snapshot file numbered `source_round`.
pub fn points(element: u32, source_round: u32) -> i64 {
    i64::from((element * 3 + source_round) % 11)
}

/// Raw file index the snapshot for canonical `round` lives in.
pub fn source_round(season: &str, round: u32) -> u32 {
    if season == POSTPONED && round > 29 {
        round + 9
    } else {
        round
    }
}

fn gw_row(
    element: u32,
    name: &str,
    round_cell: u32,
    opponent: u32,
    home: bool,
    minutes: i64,
    points: i64,
) -> String {
    let home = if home { "True" } else { "False" };
    format!(
        "{name},0,0,10,0,1.5,{element},0,0,2.0,3.0,{minutes},{opponent},0,{round_cell},0,1000,4.0,{points},10,5,50,{home},0"
    )
}

fn gameweek_body(season: &str, source: u32) -> String {
    let mut body = String::from(GW_HEADER);
    for (element, name, team, _) in SQUAD {
        let opponent = if team == 1 { 2 } else { 1 };
        body.push('\n');
        body.push_str(&gw_row(
            element,
            name,
            source,
            opponent,
            team == 1,
            90,
            points(element, source),
        ));
    }
    body.push('\n');
    body.push_str(&gw_row(GHOST, "Nobody", source, 1, true, 90, 5));
    if season == REGULAR && source == DOUBLE_ROUND {
        body.push('\n');
        body.push_str(&gw_row(
            DOUBLE_PLAYER,
            "Chris_Wood",
            source,
            1,
            true,
            30,
            SECOND_FIXTURE_POINTS,
        ));
    }
    body.push('\n');
    body
}

fn players_body() -> String {
    let mut body = String::from("id,first_name,team,element_type,total_points");
    for (element, name, team, element_type) in SQUAD {
        body.push_str(&format!("\n{element},{name},{team},{element_type},100"));
    }
    // team 7 does not exist in either season
    body.push_str("\n5,Lost_Player,7,3,0\n");
    body
}

fn teams_body(season: &str) -> String {
    if season == POSTPONED {
        "id,name,short_name,strength\n1,Arsenal,ARS,4\n2,Burnley,BUR,2\n".to_string()
    } else {
        "id,name\n1,Arsenal\n2,Burnley\n".to_string()
    }
}

pub fn gameweek_key(season: &str, source: u32) -> String {
    format!("{BASE}/{season}/gws/gw{source}.csv")
}

pub fn teams_key(season: &str) -> String {
    format!("{BASE}/{season}/teams.csv")
}

/// Every resource of `season`, keyed by URL.
pub fn season_bodies(season: &str) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = (1..=ROUNDS)
        .map(|round| {
            let source = source_round(season, round);
            (gameweek_key(season, source), gameweek_body(season, source))
        })
        .collect();
    out.push((format!("{BASE}/{season}/players_raw.csv"), players_body()));
    out.push((teams_key(season), teams_body(season)));
    out
}

pub fn league() -> MemoryFetch {
    let mut fetch = MemoryFetch::new();
    for season in [REGULAR, POSTPONED] {
        for (key, body) in season_bodies(season) {
            fetch.insert(key, body);
        }
    }
    fetch
}

pub fn loader() -> SourceLoader {
    SourceLoader::new(league())
}

pub fn config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.sources.raw_base = BASE.to_string();
    config.sources.teams = "{raw_base}/{season}/teams.csv".to_string();
    config.seasons = vec![REGULAR.to_string(), POSTPONED.to_string()];
    config.fetch_parallelism = 2;
    config.use_http_cache = false;
    config
}
