//! Competition tables.

use std::cmp::Reverse;
use std::collections::HashMap;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    config::ScoringRules,
    dao::models::{MatchEntity, MatchStatus, StandingEntity},
    dto::competition::StandingSummary,
    error::ServiceError,
    services::{competition_service::load_competition, sse_events},
    state::SharedState,
};

const UNKNOWN_TEAM: &str = "(deleted team)";

/// Build one row per registered team from the completed matches of a competition.
///
/// Rows are ordered by points, score difference and score for (all descending),
/// then by team name. Matches involving unregistered teams are ignored.
pub fn compute_standings(
    competition_id: Uuid,
    team_ids: &[Uuid],
    matches: &[MatchEntity],
    scoring: ScoringRules,
    team_names: &HashMap<Uuid, String>,
) -> Vec<StandingEntity> {
    let mut rows: IndexMap<Uuid, StandingEntity> = team_ids
        .iter()
        .map(|team_id| {
            (
                *team_id,
                StandingEntity {
                    competition_id,
                    team_id: *team_id,
                    played: 0,
                    wins: 0,
                    draws: 0,
                    losses: 0,
                    points: 0,
                    score_for: 0,
                    score_against: 0,
                },
            )
        })
        .collect();

    let completed: Vec<&MatchEntity> = matches
        .iter()
        .filter(|game| {
            game.competition_id == competition_id
                && game.status == MatchStatus::Completed
                && rows.contains_key(&game.home_team_id)
                && rows.contains_key(&game.away_team_id)
        })
        .collect();

    for game in completed {
        let sides = [
            (game.home_team_id, game.home_score, game.away_score),
            (game.away_team_id, game.away_score, game.home_score),
        ];
        for (team_id, scored, conceded) in sides {
            let Some(row) = rows.get_mut(&team_id) else {
                continue;
            };
            row.played += 1;
            row.score_for += scored;
            row.score_against += conceded;
            if scored > conceded {
                row.wins += 1;
                row.points += scoring.win_points;
            } else if scored == conceded {
                row.draws += 1;
                row.points += scoring.draw_points;
            } else {
                row.losses += 1;
                row.points += scoring.loss_points;
            }
        }
    }

    let name_of = |team_id: &Uuid| {
        team_names
            .get(team_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_TEAM)
    };

    let mut rows: Vec<StandingEntity> = rows.into_values().collect();
    rows.sort_by(|a, b| {
        let key = |row: &StandingEntity| {
            (
                Reverse(row.points),
                Reverse(i64::from(row.score_for) - i64::from(row.score_against)),
                Reverse(row.score_for),
            )
        };
        key(a)
            .cmp(&key(b))
            .then_with(|| name_of(&a.team_id).cmp(name_of(&b.team_id)))
    });
    rows
}

async fn team_names(
    state: &SharedState,
    team_ids: &[Uuid],
) -> Result<HashMap<Uuid, String>, ServiceError> {
    let store = state.require_store().await?;
    let mut names = HashMap::with_capacity(team_ids.len());
    for team_id in team_ids {
        if let Some(team) = store.find_team(*team_id).await? {
            names.insert(*team_id, team.name);
        }
    }
    Ok(names)
}

fn summarize(rows: &[StandingEntity], names: &HashMap<Uuid, String>) -> Vec<StandingSummary> {
    rows.iter()
        .map(|row| {
            let name = names
                .get(&row.team_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_TEAM.to_string());
            StandingSummary::new(row, name)
        })
        .collect()
}

/// Recompute, persist and broadcast the table of a competition.
pub async fn recompute_standings(
    state: &SharedState,
    competition_id: Uuid,
) -> Result<Vec<StandingSummary>, ServiceError> {
    let store = state.require_store().await?;
    let competition = load_competition(&store, competition_id).await?;
    let matches = store.list_matches(Some(competition_id)).await?;
    let names = team_names(state, &competition.team_ids).await?;

    let rows = compute_standings(
        competition_id,
        &competition.team_ids,
        &matches,
        state.config().scoring(),
        &names,
    );
    store.replace_standings(competition_id, rows.clone()).await?;

    let summaries = summarize(&rows, &names);
    sse_events::broadcast_standings_updated(state, competition_id, summaries.clone());
    Ok(summaries)
}

/// Stored table of a competition with team names attached.
pub async fn standings(
    state: &SharedState,
    competition_id: Uuid,
) -> Result<Vec<StandingSummary>, ServiceError> {
    let store = state.require_store().await?;
    let competition = load_competition(&store, competition_id).await?;
    let rows = store.list_standings(competition_id).await?;
    let names = team_names(state, &competition.team_ids).await?;
    Ok(summarize(&rows, &names))
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn completed(
        competition_id: Uuid,
        home: Uuid,
        away: Uuid,
        home_score: u32,
        away_score: u32,
    ) -> MatchEntity {
        MatchEntity {
            id: Uuid::new_v4(),
            competition_id,
            home_team_id: home,
            away_team_id: away,
            question_ids: Vec::new(),
            status: MatchStatus::Completed,
            current_question: None,
            home_score,
            away_score,
            scheduled_at: None,
            started_at: None,
            completed_at: Some(SystemTime::now()),
            updated_at: SystemTime::now(),
        }
    }

    #[test]
    fn wins_draws_and_losses_use_scoring_rules() {
        let competition_id = Uuid::new_v4();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let names = HashMap::from([
            (a, "Alpha".to_string()),
            (b, "Bravo".to_string()),
            (c, "Charlie".to_string()),
        ]);
        let mut live = completed(competition_id, b, c, 90, 0);
        live.status = MatchStatus::Live;
        let matches = vec![
            completed(competition_id, a, b, 30, 10),
            completed(competition_id, b, a, 20, 20),
            live,
        ];

        let rows = compute_standings(
            competition_id,
            &[a, b, c],
            &matches,
            ScoringRules::default(),
            &names,
        );

        assert_eq!(
            rows.iter().map(|row| row.team_id).collect::<Vec<_>>(),
            vec![a, b, c]
        );
        assert_eq!((rows[0].wins, rows[0].draws, rows[0].points), (1, 1, 4));
        assert_eq!((rows[1].losses, rows[1].draws, rows[1].points), (1, 1, 1));
        assert_eq!(rows[1].score_for, 30);
        assert_eq!(rows[1].score_against, 50);
        assert_eq!(rows[2].played, 0);
    }

    #[test]
    fn ties_fall_back_to_difference_then_score_then_name() {
        let competition_id = Uuid::new_v4();
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let names = HashMap::from([
            (a, "Zulu".to_string()),
            (b, "Yankee".to_string()),
            (c, "Alpha".to_string()),
            (d, "Bravo".to_string()),
        ]);
        // a and c both win by 10; a scored more. b and d never played.
        let matches = vec![
            completed(competition_id, a, b, 40, 30),
            completed(competition_id, c, d, 20, 10),
        ];
        let rows = compute_standings(
            competition_id,
            &[a, b, c, d],
            &matches,
            ScoringRules::default(),
            &names,
        );
        let order: Vec<Uuid> = rows.iter().map(|row| row.team_id).collect();
        // b: -10 diff, 30 for; d: -10 diff, 10 for.
        assert_eq!(order, vec![a, c, b, d]);

        let rows = compute_standings(
            competition_id,
            &[a, c],
            &[],
            ScoringRules::default(),
            &names,
        );
        assert_eq!(rows[0].team_id, c);
    }

    #[test]
    fn matches_outside_the_table_are_ignored() {
        let competition_id = Uuid::new_v4();
        let (a, b, outsider) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let names = HashMap::from([(a, "Alpha".to_string()), (b, "Bravo".to_string())]);
        let matches = vec![
            completed(competition_id, a, outsider, 50, 0),
            completed(Uuid::new_v4(), a, b, 50, 0),
            completed(competition_id, b, a, 10, 0),
        ];

        let rows = compute_standings(
            competition_id,
            &[a, b],
            &matches,
            ScoringRules::default(),
            &names,
        );

        assert_eq!(rows[0].team_id, b);
        assert_eq!((rows[0].played, rows[0].wins), (1, 1));
        assert_eq!((rows[1].played, rows[1].score_for), (1, 0));
    }
}
