//! Transfer decision engine: availability, valuation, and budget-constrained
//! transfer selection.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::Result;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::api::{FplClient, HistoryEntry, TransferRequest};
use crate::db::RecordStore;
use crate::models::{
    fixture_difficulty, Fixture, PlayerSnapshot, Position, TransferCandidate, TransferRecord,
    NEUTRAL_DIFFICULTY,
};
use crate::prediction::{training_samples, PlayerFeatures, Predictor, TrainingSample};

use super::TransferConfig;

/// Recent gameweeks averaged by the fallback estimate.
pub const FALLBACK_WINDOW: usize = 3;

/// Fallback scaling by fixture difficulty (1 easiest, 5 hardest).
pub fn difficulty_multiplier(difficulty: u8) -> f64 {
    match difficulty {
        1 => 1.4,
        2 => 1.3,
        4 => 1.0,
        5 => 0.8,
        _ => 1.2,
    }
}

/// Expected points per million. A zero price is worth nothing.
pub fn calculate_player_value(price: u32, expected_points: f64) -> f64 {
    if price == 0 {
        return 0.0;
    }
    expected_points / (f64::from(price) / 10.0)
}

/// Average of the last [`FALLBACK_WINDOW`] gameweeks scaled by difficulty.
pub fn fallback_expected_points(history: &[HistoryEntry], difficulty: u8) -> f64 {
    let recent = &history[history.len().saturating_sub(FALLBACK_WINDOW)..];
    if recent.is_empty() {
        return 0.0;
    }

    let average =
        recent.iter().map(|h| f64::from(h.total_points)).sum::<f64>() / recent.len() as f64;
    average * difficulty_multiplier(difficulty)
}

/// A transfer's penalty spread over the incoming player's price, in value units.
fn amortized_cost(cost: u32, price: u32) -> f64 {
    if price == 0 {
        return 0.0;
    }
    f64::from(cost) / (f64::from(price) / 10.0)
}

/// A player with the estimate the engine ranks by.
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub player: PlayerSnapshot,
    pub expected_points: f64,
    pub value: f64,
}

/// An incoming player paired with the squad member they would replace.
struct Pairing<'a> {
    incoming: &'a Valuation,
    outgoing: &'a Valuation,
    gain: f64,
}

/// Higher value first, then greater gain, then cheaper, then lower id.
fn rank_order(a: &Pairing, b: &Pairing) -> Ordering {
    b.incoming
        .value
        .total_cmp(&a.incoming.value)
        .then(b.gain.total_cmp(&a.gain))
        .then(a.incoming.player.price.cmp(&b.incoming.player.price))
        .then(a.incoming.player.id.cmp(&b.incoming.player.id))
}

/// Outcome of one decision cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    /// Executed remotely (recording may still have failed; see logs)
    Executed(Vec<TransferCandidate>),
    DryRun(Vec<TransferCandidate>),
    NoTransfers,
    Skipped { reason: String },
}

fn skipped(reason: impl Into<String>) -> CycleReport {
    let reason = reason.into();
    warn!(reason = %reason, "Skipping transfer cycle");
    CycleReport::Skipped { reason }
}

/// Mutable bookkeeping while transfers are accepted one by one.
struct Selection {
    funds: i64,
    sold: HashSet<u32>,
    bought: HashSet<u32>,
    club_counts: HashMap<u32, usize>,
}

pub struct TransferEngine<P, S> {
    config: TransferConfig,
    predictor: P,
    store: S,
}

impl<P: Predictor, S: RecordStore> TransferEngine<P, S> {
    pub fn new(config: TransferConfig, predictor: P, store: S) -> Self {
        Self {
            config,
            predictor,
            store,
        }
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    /// Not injured, suspended or unavailable, and likely enough to play.
    /// Missing fields count in the player's favour.
    pub fn is_player_available(&self, player: &PlayerSnapshot) -> bool {
        if player.status.is_some_and(|s| s.rules_out()) {
            return false;
        }
        match player.chance_of_playing_next_round {
            Some(chance) => chance >= self.config.min_chance_of_playing,
            None => true,
        }
    }

    /// Predicted points for the next fixture, falling back to recent form when
    /// the predictor is untrained or returns garbage.
    pub fn calculate_expected_points(
        &self,
        player: &PlayerSnapshot,
        history: &[HistoryEntry],
        difficulty: u8,
    ) -> f64 {
        let difficulty = if (1..=5).contains(&difficulty) {
            difficulty
        } else {
            NEUTRAL_DIFFICULTY
        };

        if self.predictor.is_trained() {
            let features = match history.last() {
                Some(entry) => PlayerFeatures::from_history(entry, player, difficulty),
                None => PlayerFeatures::from_snapshot(player, difficulty),
            };
            let predicted = self.predictor.predict(&features);
            if predicted.is_finite() {
                return predicted.max(0.0);
            }
            warn!(
                player = %player.web_name,
                predicted,
                "Predictor returned a non-finite estimate, using fallback"
            );
        }

        fallback_expected_points(history, difficulty)
    }

    fn valuation(
        &self,
        player: &PlayerSnapshot,
        history: &[HistoryEntry],
        fixtures: &[Fixture],
        gameweek: u32,
    ) -> Valuation {
        let difficulty = fixture_difficulty(fixtures, player.team, gameweek);
        let expected_points = self.calculate_expected_points(player, history, difficulty);

        Valuation {
            player: player.clone(),
            expected_points,
            value: calculate_player_value(player.price, expected_points),
        }
    }

    /// Choose transfers for `gameweek`.
    ///
    /// `squad` is the full current squad; only members present in
    /// `squad_values` may be sold. `bank` is in tenths of a million. Each
    /// round accepts the best-ranked pairing whose gain is positive. The
    /// result is ordered by projected gain, then by incoming price.
    pub fn select_transfers(
        &self,
        squad: &[PlayerSnapshot],
        squad_values: &HashMap<u32, Valuation>,
        candidates: &[Valuation],
        bank: i64,
        gameweek: u32,
    ) -> Vec<TransferCandidate> {
        let squad_ids: HashSet<u32> = squad.iter().map(|p| p.id).collect();

        let mut state = Selection {
            funds: (bank - i64::from(self.config.budget_buffer)).max(0),
            sold: HashSet::new(),
            bought: HashSet::new(),
            club_counts: HashMap::new(),
        };
        for player in squad {
            *state.club_counts.entry(player.team).or_default() += 1;
        }

        let eligible: Vec<&Valuation> = candidates
            .iter()
            .filter(|c| !squad_ids.contains(&c.player.id) && self.is_player_available(&c.player))
            .collect();

        let mut selected: Vec<TransferCandidate> = Vec::new();

        // Pairings are recomputed after each accepted transfer
        while selected.len() < self.config.max_transfers {
            let cost = self.config.cost_of(selected.len());

            let best = eligible
                .iter()
                .filter(|c| !state.bought.contains(&c.player.id))
                .filter_map(|&incoming| {
                    let outgoing = self.replacement_for(incoming, squad, squad_values, &state)?;
                    let gain = incoming.value
                        - outgoing.value
                        - amortized_cost(cost, incoming.player.price);
                    (gain > 0.0).then_some(Pairing {
                        incoming,
                        outgoing,
                        gain,
                    })
                })
                .min_by(rank_order);

            let Some(Pairing {
                incoming,
                outgoing,
                gain,
            }) = best
            else {
                debug!(cost, selected = selected.len(), "No further transfer covers its cost");
                break;
            };

            state.funds += i64::from(outgoing.player.price) - i64::from(incoming.player.price);
            state.sold.insert(outgoing.player.id);
            state.bought.insert(incoming.player.id);
            if let Some(count) = state.club_counts.get_mut(&outgoing.player.team) {
                *count = count.saturating_sub(1);
            }
            *state.club_counts.entry(incoming.player.team).or_default() += 1;

            info!(
                player_out = %outgoing.player.web_name,
                player_in = %incoming.player.web_name,
                gain,
                cost,
                "Transfer selected"
            );

            selected.push(TransferCandidate {
                player_out: outgoing.player.clone(),
                player_in: incoming.player.clone(),
                value_out: outgoing.value,
                value_in: incoming.value,
                projected_gain: gain,
                cost,
                gameweek,
            });
        }

        selected.sort_by(|a, b| {
            b.projected_gain
                .total_cmp(&a.projected_gain)
                .then(a.player_in.price.cmp(&b.player_in.price))
                .then(a.player_in.id.cmp(&b.player_in.id))
        });
        selected
    }

    /// Lowest-value unsold squad member `incoming` can legally replace.
    fn replacement_for<'a>(
        &self,
        incoming: &Valuation,
        squad: &[PlayerSnapshot],
        squad_values: &'a HashMap<u32, Valuation>,
        state: &Selection,
    ) -> Option<&'a Valuation> {
        let club_count = state
            .club_counts
            .get(&incoming.player.team)
            .copied()
            .unwrap_or(0);

        squad
            .iter()
            .filter(|p| !state.sold.contains(&p.id) && p.position == incoming.player.position)
            .filter_map(|p| squad_values.get(&p.id))
            .filter(|out| {
                i64::from(incoming.player.price) <= i64::from(out.player.price) + state.funds
            })
            .filter(|out| {
                let after = if out.player.team == incoming.player.team {
                    club_count
                } else {
                    club_count + 1
                };
                after <= self.config.max_per_club
            })
            .min_by(|a, b| a.value.total_cmp(&b.value).then(a.player.id.cmp(&b.player.id)))
    }

    async fn persist(&mut self, transfers: &[TransferCandidate]) -> Result<()> {
        for transfer in transfers {
            self.store.add(&TransferRecord::from_candidate(transfer)).await?;
        }
        self.store.commit().await
    }

    /// Record executed transfers in one transaction. Failures roll back and are
    /// logged; the remote transfers stand either way.
    pub async fn record_transfers(&mut self, transfers: &[TransferCandidate]) -> bool {
        match self.persist(transfers).await {
            Ok(()) => {
                info!(count = transfers.len(), "Recorded transfers");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to record transfers, rolling back");
                if let Err(e) = self.store.rollback().await {
                    error!(error = %e, "Rollback failed");
                }
                false
            }
        }
    }

    /// Non-squad available players per position with the best form.
    fn shortlist<'a>(
        &self,
        players: &'a [PlayerSnapshot],
        squad_ids: &HashSet<u32>,
    ) -> Vec<&'a PlayerSnapshot> {
        let mut by_position: BTreeMap<Position, Vec<&PlayerSnapshot>> = BTreeMap::new();
        for player in players
            .iter()
            .filter(|p| !squad_ids.contains(&p.id) && self.is_player_available(p))
        {
            by_position.entry(player.position).or_default().push(player);
        }

        by_position
            .into_values()
            .flat_map(|mut group| {
                group.sort_by(|a, b| b.form.total_cmp(&a.form).then(a.id.cmp(&b.id)));
                group.truncate(self.config.shortlist_per_position);
                group
            })
            .collect()
    }

    fn train_predictor(
        &mut self,
        players: &HashMap<u32, &PlayerSnapshot>,
        histories: &HashMap<u32, Vec<HistoryEntry>>,
        fixtures: &[Fixture],
    ) {
        let difficulty_of = |entry: &HistoryEntry| {
            fixtures
                .iter()
                .find(|f| f.id == entry.fixture)
                .map(|f| {
                    if entry.was_home {
                        f.team_h_difficulty
                    } else {
                        f.team_a_difficulty
                    }
                })
                .unwrap_or(NEUTRAL_DIFFICULTY)
        };

        let mut ids: Vec<&u32> = histories.keys().collect();
        ids.sort();

        let samples: Vec<TrainingSample> = ids
            .into_iter()
            .filter_map(|id| Some((players.get(id)?, histories.get(id)?)))
            .flat_map(|(player, history)| training_samples(player, history, difficulty_of))
            .collect();

        if self.predictor.train(&samples) {
            info!(samples = samples.len(), "Predictor trained from player histories");
        } else {
            info!(samples = samples.len(), "Predictor not trained, using form fallback");
        }
    }

    /// One full decision cycle: fetch, value, select, then execute and record
    /// unless `dry_run`.
    pub async fn run_cycle(&mut self, client: &FplClient, dry_run: bool) -> CycleReport {
        let bootstrap = match client.get_bootstrap_static().await {
            Ok(bootstrap) => bootstrap,
            Err(e) => return skipped(format!("bootstrap data unavailable: {}", e)),
        };

        let (Some(current), Some(target)) =
            (bootstrap.current_gameweek(), bootstrap.next_gameweek())
        else {
            return skipped("could not determine the gameweek");
        };

        let picks = match client.get_picks(Some(current)).await {
            Ok(picks) => picks,
            Err(e) => return skipped(format!("squad unavailable: {}", e)),
        };

        let fixtures = client.get_fixtures().await.unwrap_or_else(|e| {
            warn!(error = %e, "Fixtures unavailable, using neutral difficulty");
            Vec::new()
        });

        let players = bootstrap.snapshots();
        let by_id: HashMap<u32, &PlayerSnapshot> = players.iter().map(|p| (p.id, p)).collect();

        let squad: Vec<PlayerSnapshot> = picks
            .picks
            .iter()
            .filter_map(|pick| match by_id.get(&pick.element) {
                Some(player) => Some((*player).clone()),
                None => {
                    warn!(player_id = pick.element, "Picked player missing from bootstrap");
                    None
                }
            })
            .collect();
        if squad.is_empty() {
            return skipped("squad is empty");
        }

        let squad_ids: HashSet<u32> = squad.iter().map(|p| p.id).collect();
        let shortlist = self.shortlist(&players, &squad_ids);

        let ids: Vec<u32> = squad
            .iter()
            .map(|p| p.id)
            .chain(shortlist.iter().map(|p| p.id))
            .collect();
        let histories = fetch_histories(client, &ids).await;
        info!(
            gameweek = target,
            squad = squad.len(),
            shortlisted = shortlist.len(),
            histories = histories.len(),
            "Fetched player data"
        );

        if self.config.train_predictor && !self.predictor.is_trained() {
            self.train_predictor(&by_id, &histories, &fixtures);
        }

        // Unfetched squad members stay in the squad but are never sold
        let squad_values: HashMap<u32, Valuation> = squad
            .iter()
            .filter_map(|player| {
                let history = histories.get(&player.id)?;
                let mut valuation = self.valuation(player, history, &fixtures, target);
                if !self.is_player_available(player) {
                    valuation.expected_points = 0.0;
                    valuation.value = 0.0;
                }
                Some((player.id, valuation))
            })
            .collect();

        let candidates: Vec<Valuation> = shortlist
            .iter()
            .filter_map(|player| {
                let history = histories.get(&player.id)?;
                Some(self.valuation(player, history, &fixtures, target))
            })
            .collect();

        let transfers = self.select_transfers(
            &squad,
            &squad_values,
            &candidates,
            picks.entry_history.bank,
            target,
        );

        if transfers.is_empty() {
            info!(gameweek = target, "No beneficial transfers found");
            return CycleReport::NoTransfers;
        }

        if dry_run {
            for t in &transfers {
                info!(
                    player_out = %t.player_out.web_name,
                    player_in = %t.player_in.web_name,
                    gain = t.projected_gain,
                    cost = t.cost,
                    "Dry run, transfer not executed"
                );
            }
            return CycleReport::DryRun(transfers);
        }

        let requests: Vec<TransferRequest> = transfers.iter().map(TransferRequest::from).collect();
        if !client.execute_transfers(target, &requests).await {
            return skipped("transfer execution failed");
        }

        self.record_transfers(&transfers).await;
        CycleReport::Executed(transfers)
    }
}

async fn fetch_histories(client: &FplClient, ids: &[u32]) -> HashMap<u32, Vec<HistoryEntry>> {
    let results = join_all(ids.iter().map(|&id| client.get_element_summary(id))).await;

    ids.iter()
        .zip(results)
        .filter_map(|(&id, result)| match result {
            Ok(summary) => Some((id, summary.history)),
            Err(e) => {
                warn!(player_id = id, error = %e, "Player history unavailable");
                None
            }
        })
        .collect()
}
