//! TV partial-deletion algorithm (§4.6.2). Pure over the episode list — no
//! I/O — so it can be exhaustively unit-tested against spec invariants 5 & 6
//! and scenario S6 without a fake Sonarr server.

use crate::http::Episode;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupMode {
    All,
    KeepEpisodes,
    KeepSeasons,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    pub delete_episode_file_ids: Vec<u64>,
    pub unmonitor_episode_ids: Vec<u64>,
    pub delete_entire_series: bool,
}

/// Computes what to delete/unmonitor for a series under the configured
/// cleanup mode. `episodes` need not be sorted; this function sorts its own
/// working copy.
pub fn plan_deletion(
    episodes: &[Episode],
    mode: CleanupMode,
    keep_count: u32,
    now: DateTime<Utc>,
) -> DeletionPlan {
    if mode == CleanupMode::All {
        return DeletionPlan {
            delete_entire_series: true,
            ..Default::default()
        };
    }

    let (specials, mut regular): (Vec<&Episode>, Vec<&Episode>) =
        episodes.iter().partition(|e| e.season_number == 0);
    regular.sort_by_key(|e| (e.season_number, e.episode_number));

    match mode {
        CleanupMode::All => unreachable!(),
        CleanupMode::KeepEpisodes => plan_keep_episodes(&specials, &regular, keep_count, now),
        CleanupMode::KeepSeasons => plan_keep_seasons(&specials, &regular, keep_count, now),
    }
}

fn has_aired(episode: &Episode, now: DateTime<Utc>) -> bool {
    episode.air_date_utc.is_some_and(|d| d < now)
}

fn plan_keep_episodes(
    _specials: &[&Episode],
    regular: &[&Episode],
    keep_count: u32,
    now: DateTime<Utc>,
) -> DeletionPlan {
    let keep_count = keep_count as usize;
    let mut delete_episode_file_ids = Vec::new();
    let mut unmonitor_episode_ids = Vec::new();

    // Specials: always kept, never deleted, never unmonitored.

    let mut kept_with_file = 0usize;
    for (idx, episode) in regular.iter().enumerate() {
        let has_file = episode.episode_file_id.is_some();
        let keep = has_file && kept_with_file < keep_count;
        if keep {
            kept_with_file += 1;
            continue;
        }
        if let Some(file_id) = episode.episode_file_id {
            delete_episode_file_ids.push(file_id);
        }
        if idx >= keep_count && has_aired(episode, now) {
            unmonitor_episode_ids.push(episode.id);
        }
    }

    DeletionPlan {
        delete_episode_file_ids,
        unmonitor_episode_ids,
        delete_entire_series: false,
    }
}

fn plan_keep_seasons(
    _specials: &[&Episode],
    regular: &[&Episode],
    keep_count: u32,
    now: DateTime<Utc>,
) -> DeletionPlan {
    let keep_count = keep_count as usize;

    // Group by season, preserving ascending season order (regular is sorted).
    let mut season_order: Vec<u32> = Vec::new();
    let mut by_season: std::collections::HashMap<u32, Vec<&Episode>> = std::collections::HashMap::new();
    for episode in regular {
        if !by_season.contains_key(&episode.season_number) {
            season_order.push(episode.season_number);
        }
        by_season.entry(episode.season_number).or_default().push(episode);
    }

    // "fully-aired" season = every episode in it has aired.
    let fully_aired = |season: u32| -> bool {
        by_season[&season].iter().all(|e| has_aired(e, now))
    };

    let mut kept_seasons: std::collections::HashSet<u32> = std::collections::HashSet::new();
    let mut kept = 0usize;
    for &season in &season_order {
        if kept >= keep_count {
            break;
        }
        if fully_aired(season) {
            kept_seasons.insert(season);
            kept += 1;
        }
    }

    let mut delete_episode_file_ids = Vec::new();
    let mut unmonitor_episode_ids = Vec::new();
    for &season in &season_order {
        if kept_seasons.contains(&season) {
            continue;
        }
        for episode in &by_season[&season] {
            if let Some(file_id) = episode.episode_file_id {
                delete_episode_file_ids.push(file_id);
            }
            if has_aired(episode, now) {
                unmonitor_episode_ids.push(episode.id);
            }
        }
    }

    DeletionPlan {
        delete_episode_file_ids,
        unmonitor_episode_ids,
        delete_entire_series: false,
    }
}
