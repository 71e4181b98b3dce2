//! Session state machine and per-session worker
//!
//! A session walks WaitingForPlayers -> AboutToStart -> (GracePeriod) ->
//! InProgress -> Finished on its own tokio task. All shared state sits
//! behind one lock; player-visible text is produced under the lock and
//! delivered after it is released.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::util::time::{
    GRACE_STEP, LEADERBOARD_LINE_PACE, PLACEMENT_PACE, SECTION_PAUSE, SPAWN_PACE, SUB_TICK,
    SUB_TICKS_PER_ROUND,
};
use crate::world::{BlockPos, Participant, ParticipantId, SessionId, WorldId, WorldServices};

use super::broadcast::{tagged, Broadcaster};
use super::config::GameConfig;
use super::error::SessionError;
use super::player::{PlayerState, PlayerSummary};
use super::scoring::{KillReport, ScoringEngine};
use super::state::MatchState;
use super::types::{Difficulty, GameMode, SessionStatus, Team};
use super::zone::{Zone, ZoneKind};

/// Entries shown in a leaderboard announcement
pub const LEADERBOARD_SIZE: usize = 5;

const MATCH_TITLE: &str = "TNT Wars";

/// What a participant is trying to do to the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildAction {
    PlaceBlock,
    BreakBlock,
    PlaceOrdnance,
}

/// Which blocks a periodic score announcement includes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scoreboard {
    pub team_totals: bool,
    pub personal: bool,
    pub leaderboard: bool,
}

impl Scoreboard {
    /// TDM alternates two short rounds with one full round; FFA is always full
    pub fn for_round(mode: GameMode, round: u32) -> Self {
        match mode {
            GameMode::Tdm => Self {
                team_totals: true,
                personal: true,
                leaderboard: round % 3 == 0,
            },
            GameMode::Ffa => Self {
                team_totals: false,
                personal: true,
                leaderboard: true,
            },
        }
    }
}

/// Countdown line for the given remaining seconds, if it is a milestone
pub fn grace_milestone(remaining: u32) -> Option<String> {
    let text = match remaining {
        300 | 240 | 180 | 120 => format!("{} minutes remaining!", remaining / 60),
        90 => "1 minute and 30 seconds remaining!".to_string(),
        60 => "1 minute remaining!".to_string(),
        45 | 30 | 15 | 10 | 9 | 8 | 7 | 6 | 5 | 4 | 3 | 2 => {
            format!("{remaining} seconds remaining!")
        }
        1 => "1 second remaining!".to_string(),
        _ => return None,
    };
    Some(tagged(text))
}

/// "1st", "2nd", "3rd", "4th", ... "11th", "21st"
pub fn ordinal(rank: usize) -> String {
    let suffix = match (rank % 10, rank % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{rank}{suffix}")
}

/// Lookup view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub world: WorldId,
    pub status: SessionStatus,
    pub mode: GameMode,
    pub difficulty: Difficulty,
    pub red_score: i32,
    pub blue_score: i32,
    pub score_required: i32,
    pub no_ordnance_zones: usize,
    pub damage_immune_zones: usize,
    pub created_at: DateTime<Utc>,
    pub players: Vec<PlayerSummary>,
}

pub struct GameSession {
    id: SessionId,
    world: WorldId,
    created_at: DateTime<Utc>,
    state: Mutex<MatchState>,
    services: WorldServices,
    broadcaster: Broadcaster,
    stop: watch::Sender<bool>,
}

impl GameSession {
    pub fn new(
        id: SessionId,
        world: WorldId,
        mode: GameMode,
        difficulty: Difficulty,
        config: GameConfig,
        services: WorldServices,
    ) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            id,
            world,
            created_at: Utc::now(),
            state: Mutex::new(MatchState::new(mode, difficulty, config)),
            broadcaster: Broadcaster::new(services.messenger.clone()),
            services,
            stop,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn world(&self) -> &WorldId {
        &self.world
    }

    pub fn status(&self) -> SessionStatus {
        self.state.lock().status
    }

    pub fn mode(&self) -> GameMode {
        self.state.lock().mode
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.state.lock().roster.contains(id)
    }

    pub fn summary(&self) -> SessionSummary {
        let state = self.state.lock();
        SessionSummary {
            id: self.id,
            world: self.world.clone(),
            status: state.status,
            mode: state.mode,
            difficulty: state.difficulty,
            red_score: state.red_score,
            blue_score: state.blue_score,
            score_required: state.config.score_required,
            no_ordnance_zones: state.zones(ZoneKind::NoOrdnance).count(),
            damage_immune_zones: state.zones(ZoneKind::BlockDamageImmune).count(),
            created_at: self.created_at,
            players: state.roster.iter().map(PlayerState::summary).collect(),
        }
    }

    fn recipients(&self) -> Vec<Arc<Participant>> {
        self.state.lock().roster.participants()
    }

    fn message_all(&self, line: &str) {
        let recipients = self.recipients();
        self.broadcaster.to_all(&recipients, line);
    }

    // ------------------------------------------------------------------
    // Membership and setup
    // ------------------------------------------------------------------

    /// Enrol a participant. In TDM they are placed on a team right away.
    pub fn add_participant(
        &self,
        participant: Arc<Participant>,
        spectator: bool,
    ) -> Result<Team, SessionError> {
        let id = participant.id();
        let mut state = self.state.lock();
        if state.status == SessionStatus::Finished {
            return Err(SessionError::AlreadyStarted(state.status));
        }
        if state.roster.contains(&id) {
            return Err(SessionError::AlreadyJoined(id));
        }

        let mut player = PlayerState::new(participant.clone(), spectator);
        player.reset_for_match(state.difficulty);
        state.roster.push(player);

        let team = if state.mode == GameMode::Tdm {
            let (red, blue) = (state.red_score, state.blue_score);
            state
                .roster
                .auto_assign_team(&id, red, blue)
                .unwrap_or_default()
        } else {
            Team::None
        };

        participant.update(|flags| {
            flags.session_id = Some(self.id);
            if state.status.is_live() {
                flags.in_match = true;
                flags.can_build = !spectator && state.status == SessionStatus::InProgress;
            }
        });
        drop(state);

        info!(session_id = self.id, participant = %id, ?team, spectator, "Participant joined session");
        Ok(team)
    }

    /// Remove a participant and hand their world state back
    pub fn remove_participant(&self, id: &ParticipantId) -> Result<(), SessionError> {
        let player = self
            .state
            .lock()
            .roster
            .remove(id)
            .ok_or(SessionError::UnknownParticipant(*id))?;

        player.participant.update(|flags| {
            flags.in_match = false;
            flags.can_build = true;
            flags.cosmetics = player.saved_cosmetics.clone();
        });
        info!(session_id = self.id, participant = %id, "Participant left session");
        Ok(())
    }

    pub fn set_spectator(&self, id: &ParticipantId, spectator: bool) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        let in_progress = state.status == SessionStatus::InProgress;
        let player = state
            .roster
            .find_mut(id)
            .ok_or(SessionError::UnknownParticipant(*id))?;
        player.spectator = spectator;
        if spectator {
            player.participant.set_can_build(false);
        } else if in_progress {
            player.participant.set_can_build(true);
        }
        Ok(())
    }

    /// Change mode; only allowed before the match starts
    pub fn set_mode(&self, mode: GameMode) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        if state.status != SessionStatus::WaitingForPlayers {
            return Err(SessionError::ModeLocked);
        }
        state.mode = mode;
        let recipients = state.roster.participants();
        let mut assignments = Vec::new();

        match mode {
            GameMode::Tdm => {
                for participant in &recipients {
                    let (red, blue) = (state.red_score, state.blue_score);
                    let team = state.roster.auto_assign_team(&participant.id(), red, blue);
                    let spectator = state
                        .roster
                        .find(&participant.id())
                        .map(|p| p.spectator)
                        .unwrap_or(false);
                    let mut line = format!("{} is now", participant.name());
                    match team {
                        Some(Team::Red) => line.push_str(" on the red team"),
                        Some(Team::Blue) => line.push_str(" on the blue team"),
                        _ => {}
                    }
                    if spectator {
                        line.push_str(" (as a spectator)");
                    }
                    assignments.push(line);
                }
            }
            GameMode::Ffa => {
                for player in state.roster.iter_mut() {
                    player.team = Team::None;
                    player.participant.set_color(&player.saved_cosmetics.color);
                }
            }
        }
        drop(state);

        self.broadcaster.to_all(
            &recipients,
            &tagged(format!("Changed gamemode to {}", mode.label())),
        );
        for line in assignments {
            self.broadcaster.global(&line);
        }
        info!(session_id = self.id, ?mode, "Game mode changed");
        Ok(())
    }

    pub fn set_spawn(&self, team: Team, pos: BlockPos) {
        let mut state = self.state.lock();
        match team {
            Team::Red => state.red_spawn = Some(pos),
            Team::Blue => state.blue_spawn = Some(pos),
            Team::None => {}
        }
    }

    pub fn add_zone(&self, kind: ZoneKind, zone: Zone) {
        self.state.lock().zones_mut(kind).push(zone);
    }

    // ------------------------------------------------------------------
    // Queries for the world's build-permission check
    // ------------------------------------------------------------------

    /// Whether `id` may perform `action` at `pos` right now
    pub fn can_build_at(&self, id: &ParticipantId, pos: BlockPos, action: BuildAction) -> bool {
        let state = self.state.lock();
        let Some(player) = state.roster.find(id) else {
            return !state.status.is_live();
        };
        if player.spectator {
            return false;
        }
        match state.status {
            SessionStatus::WaitingForPlayers | SessionStatus::Finished => true,
            SessionStatus::AboutToStart | SessionStatus::GracePeriod => false,
            SessionStatus::InProgress => {
                if !player.participant.can_build() {
                    return false;
                }
                match action {
                    BuildAction::PlaceOrdnance => {
                        !state.no_ordnance.contains(pos)
                            && player.active_ordnance < state.config.max_active_ordnance
                    }
                    BuildAction::PlaceBlock | BuildAction::BreakBlock => true,
                }
            }
        }
    }

    /// Blocks at `pos` survive explosions
    pub fn is_block_damage_immune(&self, pos: BlockPos) -> bool {
        self.state.lock().damage_immune.contains(pos)
    }

    pub fn record_ordnance_placed(&self, id: &ParticipantId) -> Result<u32, SessionError> {
        let mut state = self.state.lock();
        let player = state
            .roster
            .find_mut(id)
            .ok_or(SessionError::UnknownParticipant(*id))?;
        player.active_ordnance += 1;
        Ok(player.active_ordnance)
    }

    pub fn record_ordnance_detonated(&self, id: &ParticipantId) -> Result<u32, SessionError> {
        let mut state = self.state.lock();
        let player = state
            .roster
            .find_mut(id)
            .ok_or(SessionError::UnknownParticipant(*id))?;
        player.active_ordnance = player.active_ordnance.saturating_sub(1);
        Ok(player.active_ordnance)
    }

    // ------------------------------------------------------------------
    // Kill events
    // ------------------------------------------------------------------

    /// Resolve one explosion from `attacker` hitting `victims`
    pub fn handle_kill(
        &self,
        attacker: ParticipantId,
        victims: &[ParticipantId],
    ) -> Result<KillReport, SessionError> {
        let (mut report, recipients) = {
            let mut state = self.state.lock();
            if state.status != SessionStatus::InProgress {
                return Err(SessionError::NotInProgress);
            }
            let report = ScoringEngine::resolve(&mut state, attacker, victims)?;
            (report, state.roster.participants())
        };

        self.broadcaster
            .dispatch(&recipients, std::mem::take(&mut report.notices));
        for (participant, spawn) in &report.respawns {
            if let Err(e) = self.services.control.return_to_spawn(participant, *spawn) {
                warn!(session_id = self.id, participant = %participant.id(), error = %e, "Respawn failed");
            }
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Begin the match on a dedicated task
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>, SessionError> {
        if self.world.is_empty() {
            return Err(SessionError::NoWorld);
        }
        {
            let mut state = self.state.lock();
            if state.status != SessionStatus::WaitingForPlayers {
                return Err(SessionError::AlreadyStarted(state.status));
            }
            state.advance(SessionStatus::AboutToStart)?;
        }
        info!(session_id = self.id, world = %self.world, "Session starting");

        let session = Arc::clone(self);
        Ok(tokio::spawn(async move { session.run().await }))
    }

    /// Ask the session to end at its next suspension point
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            if state.status == SessionStatus::WaitingForPlayers {
                // Never started: no worker to clean up after it
                state.status = SessionStatus::Finished;
            }
        }
        self.stop.send_replace(true);
        info!(session_id = self.id, "Session stop requested");
    }

    pub fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// Termination predicate, including an external stop
    pub fn should_end(&self) -> bool {
        self.stop_requested() || self.state.lock().termination_reached()
    }

    /// Sleep for `duration`; false if a stop arrived first
    async fn pause(&self, duration: Duration) -> bool {
        let mut stop = self.stop.subscribe();
        if *stop.borrow() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = stop.changed() => false,
        }
    }

    async fn run(self: Arc<Self>) {
        if let Err(e) = self.prepare().await {
            error!(session_id = self.id, world = %self.world, error = %e, "Session setup failed");
            self.abort(&e);
            return;
        }

        let mut live = self.spawn_everyone().await;
        if live {
            self.announce_start();
        }
        let grace = self.state.lock().config.initial_grace_period;
        if live && grace {
            live = self.grace_period().await;
        }
        if live {
            self.begin_play();
            self.main_loop().await;
        }
        self.finish().await;
    }

    /// Back up the world and reset every member's combat state
    async fn prepare(&self) -> Result<(), SessionError> {
        let snapshot = self
            .services
            .snapshots
            .backup(&self.world)
            .await
            .map_err(SessionError::SetupFailure)?;
        info!(session_id = self.id, world = %self.world, snapshot = snapshot.0, "World backed up");

        if let Err(e) = self.services.control.enable_match_physics(&self.world) {
            warn!(session_id = self.id, error = %e, "Could not switch world physics");
        }

        let (grace, spectators, recipients) = {
            let mut state = self.state.lock();
            state.snapshot = Some(snapshot);
            let grace = state.config.initial_grace_period;
            let difficulty = state.difficulty;
            let mode = state.mode;
            let mut spectators = Vec::new();

            for player in state.roster.iter_mut() {
                player.reset_for_match(difficulty);
                let color = match mode {
                    GameMode::Tdm => player.team.color(),
                    GameMode::Ffa => None,
                };
                let spectator = player.spectator;
                player.participant.update(|flags| {
                    flags.in_match = true;
                    flags.session_id = Some(self.id);
                    if grace || spectator {
                        flags.can_build = false;
                    }
                    flags.cosmetics.title = MATCH_TITLE.to_string();
                    if let Some(color) = color {
                        flags.cosmetics.color = color.to_string();
                    }
                });
                if spectator {
                    spectators.push(player.participant.clone());
                }
            }
            (grace, spectators, state.roster.participants())
        };

        for spectator in &spectators {
            self.broadcaster.to_one(
                spectator,
                &tagged("Disabled building because you are a spectator!"),
            );
        }
        if grace {
            self.broadcaster
                .to_all(&recipients, &tagged("Disabled building during Grace Period!"));
        }
        Ok(())
    }

    fn abort(&self, error: &SessionError) {
        let line = format!("{error}, stopping game");
        self.message_all(&line);
        self.broadcaster.global(&line);
        let mut state = self.state.lock();
        if let Err(e) = state.advance(SessionStatus::Finished) {
            warn!(session_id = self.id, error = %e, "Unexpected status during abort");
        }
    }

    /// Bring everyone into the world and onto a spawn point
    async fn spawn_everyone(&self) -> bool {
        let (players, mode) = {
            let state = self.state.lock();
            let players: Vec<_> = state
                .roster
                .iter()
                .map(|p| (p.participant.clone(), state.spawn_for(p.team)))
                .collect();
            (players, state.mode)
        };

        for (participant, _) in &players {
            if participant.world() == self.world {
                continue;
            }
            match self.services.control.relocate(participant, &self.world) {
                Ok(()) => participant.update(|flags| flags.in_match_world = true),
                Err(e) => {
                    warn!(session_id = self.id, participant = %participant.id(), error = %e, "Relocation failed")
                }
            }
        }
        if mode == GameMode::Tdm {
            self.services.control.reload_visuals(&self.world);
        }

        for (participant, spawn) in players {
            if let Err(e) = self.services.control.return_to_spawn(&participant, spawn) {
                warn!(session_id = self.id, participant = %participant.id(), error = %e, "Spawn failed");
            }
            if !self.pause(SPAWN_PACE).await {
                return false;
            }
        }
        true
    }

    fn announce_start(&self) {
        let line = {
            let state = self.state.lock();
            let difficulty = state.difficulty;
            let config = &state.config;
            format!(
                "TNT Wars on {} has started {} with a difficulty of {} ({} hits to die, a {} explosion delay and with a {} explosion size), team killing is {} and you can place {} TNT at a time and there is a score limit of {}!!",
                self.world,
                state.mode.label(),
                difficulty.label(),
                difficulty.hits_to_die(),
                difficulty.explosion_delay(),
                difficulty.explosion_size(),
                if config.team_kills { "Enabled" } else { "Disabled" },
                config.max_active_ordnance,
                config.score_required,
            )
        };
        self.broadcaster.global(&line);
    }

    /// Count down the grace period; false if stopped part way
    async fn grace_period(&self) -> bool {
        let remaining = {
            let mut state = self.state.lock();
            if let Err(e) = state.advance(SessionStatus::GracePeriod) {
                warn!(session_id = self.id, error = %e, "Cannot enter grace period");
                return false;
            }
            state.config.grace_period_secs
        };
        info!(session_id = self.id, seconds = remaining, "Grace period started");
        self.message_all(&tagged(format!("Grace Period of {remaining} seconds")));

        for left in (1..=remaining).rev() {
            if let Some(line) = grace_milestone(left) {
                self.message_all(&line);
            }
            if !self.pause(GRACE_STEP).await {
                return false;
            }
        }

        self.message_all(&tagged("Grace Period is over!!!!!"));
        self.message_all(&tagged("You may now place TNT"));
        true
    }

    fn begin_play(&self) {
        let (grace, recipients) = {
            let mut state = self.state.lock();
            if let Err(e) = state.advance(SessionStatus::InProgress) {
                error!(session_id = self.id, error = %e, "Cannot enter play");
                return;
            }
            for player in state.roster.iter().filter(|p| !p.spectator) {
                player.participant.set_can_build(true);
            }
            (state.config.initial_grace_period, state.roster.participants())
        };
        info!(session_id = self.id, "Match in progress");

        self.broadcaster
            .to_all(&recipients, &tagged("The Game Has Started!!!!!"));
        if grace {
            self.broadcaster
                .to_all(&recipients, &tagged("You can now build!!"));
        }
    }

    async fn main_loop(&self) {
        let mut round = 0;
        'rounds: while !self.should_end() {
            for _ in 0..SUB_TICKS_PER_ROUND {
                if !self.pause(SUB_TICK).await || self.should_end() {
                    break 'rounds;
                }
            }
            round += 1;
            self.announce_scores(Scoreboard::for_round(self.mode(), round))
                .await;
        }
    }

    async fn announce_scores(&self, board: Scoreboard) {
        if board.team_totals {
            let lines = {
                let state = self.state.lock();
                let required = state.config.score_required;
                vec![
                    "TNT Wars Scores:".to_string(),
                    format!("RED: {} ({} needed)", state.red_score, required - state.red_score),
                    format!("BLUE: {} ({} needed)", state.blue_score, required - state.blue_score),
                ]
            };
            for line in lines {
                self.message_all(&line);
            }
            self.pause(SECTION_PAUSE).await;
        }
        if board.leaderboard {
            self.announce_leaderboard().await;
        }
        if board.personal {
            let scores: Vec<_> = {
                let state = self.state.lock();
                state
                    .roster
                    .iter()
                    .filter(|p| !p.spectator)
                    .map(|p| (p.participant.clone(), p.score))
                    .collect()
            };
            for (participant, score) in scores {
                self.broadcaster
                    .to_one(&participant, &tagged(format!("Your Score is {score}")));
            }
            self.pause(SECTION_PAUSE).await;
        }
    }

    async fn announce_leaderboard(&self) {
        let lines: Vec<String> = {
            let state = self.state.lock();
            state
                .roster
                .sorted_by_score()
                .into_iter()
                .take(LEADERBOARD_SIZE)
                .enumerate()
                .map(|(i, p)| format!("{}: {} - {}", i + 1, p.name(), p.score))
                .collect()
        };
        for line in lines {
            self.message_all(&line);
            self.pause(LEADERBOARD_LINE_PACE).await;
        }
        self.pause(SECTION_PAUSE).await;
    }

    /// Hand the world back and announce the result
    async fn finish(&self) {
        let (players, active) = {
            let mut state = self.state.lock();
            if state.status != SessionStatus::Finished {
                if let Err(e) = state.advance(SessionStatus::Finished) {
                    warn!(session_id = self.id, error = %e, "Unexpected status at finish");
                }
            }
            for player in state.roster.iter() {
                let spectator = player.spectator;
                let saved = player.saved_cosmetics.clone();
                player.participant.update(|flags| {
                    if !spectator {
                        flags.can_build = true;
                    }
                    flags.in_match = false;
                    flags.cosmetics = saved;
                });
            }
            (state.roster.participants(), state.roster.active_count())
        };

        for participant in &players {
            if let Err(e) = self.services.control.return_to_spawn(participant, None) {
                warn!(session_id = self.id, participant = %participant.id(), error = %e, "Return to spawn failed");
            }
        }

        if active <= 1 {
            self.broadcaster
                .global("TNT Wars has ended because there are no longer enough players!");
        } else {
            self.broadcaster.global("TNT Wars has ended!!");
        }
        self.announce_outcome().await;

        let snapshot = self.state.lock().snapshot;
        if let Some(handle) = snapshot {
            match self.services.snapshots.restore(handle, &self.world).await {
                Ok(()) => info!(session_id = self.id, snapshot = handle.0, "World restored"),
                Err(e) => error!(session_id = self.id, error = %e, "World restore failed"),
            }
        }
        info!(session_id = self.id, world = %self.world, "Session finished");
    }

    async fn announce_outcome(&self) {
        let mode = self.mode();
        match mode {
            GameMode::Tdm => {
                let (red, blue, personal) = {
                    let state = self.state.lock();
                    let personal: Vec<_> = state
                        .roster
                        .iter()
                        .filter(|p| !p.spectator)
                        .map(|p| (p.participant.clone(), p.score))
                        .collect();
                    (state.red_score, state.blue_score, personal)
                };
                let verdict = if red > blue {
                    format!("Team Red won TNT Wars by {} points!", red - blue)
                } else if blue > red {
                    format!("Team Blue won TNT Wars by {} points!", blue - red)
                } else {
                    format!("TNT Wars ended in a draw at {red} points each!")
                };
                self.broadcaster.global(&verdict);
                for (participant, score) in personal {
                    self.broadcaster
                        .to_one(&participant, &tagged(format!("You Scored {score} points")));
                }
                self.message_all(&tagged("Top Scores:"));
                self.announce_leaderboard().await;
            }
            GameMode::Ffa => {
                let placements: Vec<(String, i32)> = {
                    let state = self.state.lock();
                    state
                        .roster
                        .sorted_by_score()
                        .into_iter()
                        .map(|p| (p.name().to_string(), p.score))
                        .collect()
                };
                for (i, (name, score)) in placements.into_iter().enumerate() {
                    let line = format!(
                        "TNT Wars {} Place: {name} with a score of {score}",
                        ordinal(i + 1)
                    );
                    if i == 0 {
                        self.broadcaster.global(&line);
                    } else {
                        self.message_all(&line);
                    }
                    self.pause(PLACEMENT_PACE).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::MemoryWorld;
    use tokio_test::{assert_err, assert_ok};

    fn setup(
        mode: GameMode,
        difficulty: Difficulty,
        config: GameConfig,
    ) -> (Arc<MemoryWorld>, Arc<GameSession>) {
        let world = Arc::new(MemoryWorld::new());
        let session = Arc::new(GameSession::new(
            1,
            WorldId::new("arena"),
            mode,
            difficulty,
            config,
            WorldServices::from_backend(world.clone()),
        ));
        (world, session)
    }

    fn quick_config(grace_secs: u32) -> GameConfig {
        GameConfig {
            score_required: 10,
            initial_grace_period: grace_secs > 0,
            grace_period_secs: grace_secs,
            ..GameConfig::default()
        }
    }

    #[test]
    fn milestones_fire_only_on_schedule() {
        for secs in [300, 240, 180, 120, 90, 60, 45, 30, 15, 10, 9, 5, 2, 1] {
            assert!(grace_milestone(secs).is_some(), "{secs} should announce");
        }
        for secs in [301, 299, 100, 59, 44, 20, 11, 0] {
            assert!(grace_milestone(secs).is_none(), "{secs} should be silent");
        }
        assert_eq!(
            grace_milestone(300).as_deref(),
            Some("TNT Wars: 5 minutes remaining!")
        );
    }

    #[test]
    fn ordinals_use_rank() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(22), "22nd");
    }

    #[test]
    fn tdm_rounds_show_leaderboard_every_third() {
        let rounds: Vec<bool> = (1..=6)
            .map(|r| Scoreboard::for_round(GameMode::Tdm, r).leaderboard)
            .collect();
        assert_eq!(rounds, vec![false, false, true, false, false, true]);
        let ffa = Scoreboard::for_round(GameMode::Ffa, 1);
        assert!(ffa.leaderboard && ffa.personal && !ffa.team_totals);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_backup_finishes_without_a_match() {
        let (world, session) = setup(GameMode::Ffa, Difficulty::Normal, quick_config(0));
        let a = world.connect("alice", WorldId::new("arena"));
        let b = world.connect("bob", WorldId::new("arena"));
        session.add_participant(a.clone(), false).unwrap();
        session.add_participant(b.clone(), false).unwrap();
        world.fail_backups(true);

        let worker = session.start().unwrap();
        worker.await.unwrap();

        assert_eq!(session.status(), SessionStatus::Finished);
        assert_eq!(world.spawn_count(&a.id()), 0);
        assert!(world.restored().is_empty());
        assert!(!a.in_match());
        assert!(world
            .global_log()
            .iter()
            .any(|l| l.contains("stopping game")));
        assert!(!world
            .inbox(&a.id())
            .iter()
            .any(|l| l.contains("The Game Has Started")));
    }

    #[tokio::test(start_paused = true)]
    async fn ffa_match_runs_to_score_limit() {
        let (world, session) = setup(GameMode::Ffa, Difficulty::Hard, quick_config(3));
        let a = world.connect("alice", WorldId::new("arena"));
        let b = world.connect("bob", WorldId::new("lobby"));
        session.add_participant(a.clone(), false).unwrap();
        session.add_participant(b.clone(), false).unwrap();

        let worker = session.start().unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(session.status(), SessionStatus::GracePeriod);
        assert!(!a.can_build());
        assert_eq!(b.world(), WorldId::new("arena"));
        assert_err!(session.handle_kill(a.id(), &[b.id()]));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(session.status(), SessionStatus::InProgress);
        assert!(a.can_build());

        let report = assert_ok!(session.handle_kill(a.id(), &[b.id()]));
        assert_eq!(report.kills, 1);
        assert_eq!(report.score_delta, 10);
        worker.await.unwrap();

        assert_eq!(session.status(), SessionStatus::Finished);
        assert_eq!(world.restored().len(), 1);
        assert!(!a.in_match());
        assert!(a.can_build());
        let global = world.global_log();
        assert!(global.iter().any(|l| l.contains("has started Free For All")));
        assert!(global.iter().any(|l| l.contains("1st Place: alice with a score of 10")));

        let inbox = world.inbox(&b.id());
        assert!(inbox.iter().any(|l| l == "TNT Wars: 3 seconds remaining!"));
        assert!(inbox.iter().any(|l| l.contains("2nd Place: bob")));
        assert!(inbox.iter().any(|l| l.contains("alice killed bob")));
    }

    #[tokio::test(start_paused = true)]
    async fn forced_stop_during_grace_skips_play() {
        let (world, session) = setup(GameMode::Tdm, Difficulty::Normal, quick_config(60));
        let a = world.connect("alice", WorldId::new("arena"));
        let b = world.connect("bob", WorldId::new("arena"));
        session.add_participant(a.clone(), false).unwrap();
        session.add_participant(b.clone(), false).unwrap();

        let worker = session.start().unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        session.stop();
        worker.await.unwrap();

        assert_eq!(session.status(), SessionStatus::Finished);
        assert!(!world
            .inbox(&a.id())
            .iter()
            .any(|l| l.contains("The Game Has Started")));
        assert!(a.can_build());
        assert_eq!(world.restored().len(), 1);
        assert!(world.global_log().iter().any(|l| l.contains("draw")));
    }

    #[tokio::test(start_paused = true)]
    async fn lone_player_ends_immediately() {
        let (world, session) = setup(GameMode::Ffa, Difficulty::Normal, quick_config(0));
        let a = world.connect("alice", WorldId::new("arena"));
        session.add_participant(a, false).unwrap();

        session.start().unwrap().await.unwrap();
        assert_eq!(session.status(), SessionStatus::Finished);
        assert!(world
            .global_log()
            .iter()
            .any(|l| l.contains("no longer enough players")));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_player_does_not_break_the_match() {
        let (world, session) = setup(GameMode::Ffa, Difficulty::Hard, quick_config(0));
        let a = world.connect("alice", WorldId::new("arena"));
        let b = world.connect("bob", WorldId::new("lobby"));
        let c = world.connect("carol", WorldId::new("arena"));
        for p in [&a, &b, &c] {
            session.add_participant(p.clone(), false).unwrap();
        }
        world.drop_recipient(b.id());

        let worker = session.start().unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(session.status(), SessionStatus::InProgress);
        // Relocation failed for bob, the others still play
        assert_eq!(b.world(), WorldId::new("lobby"));

        session.handle_kill(a.id(), &[b.id()]).unwrap();
        assert!(world.inbox(&c.id()).iter().any(|l| l.contains("alice killed bob")));
        session.stop();
        worker.await.unwrap();
        assert_eq!(session.status(), SessionStatus::Finished);
    }

    #[tokio::test]
    async fn start_and_mode_are_guarded() {
        let (world, session) = setup(GameMode::Ffa, Difficulty::Normal, quick_config(30));
        let a = world.connect("alice", WorldId::new("arena"));
        let b = world.connect("bob", WorldId::new("arena"));
        let spec = world.connect("sam", WorldId::new("arena"));
        session.add_participant(a.clone(), false).unwrap();
        session.add_participant(b.clone(), false).unwrap();
        session.add_participant(spec.clone(), true).unwrap();
        assert!(matches!(
            session.add_participant(a.clone(), false),
            Err(SessionError::AlreadyJoined(_))
        ));

        assert_ok!(session.set_mode(GameMode::Tdm));
        let summary = session.summary();
        let red = summary.players.iter().filter(|p| p.team == Team::Red).count();
        let blue = summary.players.iter().filter(|p| p.team == Team::Blue).count();
        assert_eq!((red, blue), (2, 1));
        assert!(world
            .global_log()
            .iter()
            .any(|l| l.contains("sam is now") && l.contains("(as a spectator)")));

        let worker = session.start().unwrap();
        assert!(matches!(
            session.start(),
            Err(SessionError::AlreadyStarted(_))
        ));
        assert!(matches!(
            session.set_mode(GameMode::Ffa),
            Err(SessionError::ModeLocked)
        ));
        session.stop();
        worker.await.unwrap();
    }

    #[test]
    fn build_permission_follows_phase_zones_and_ordnance() {
        let (world, session) = setup(GameMode::Ffa, Difficulty::Normal, quick_config(0));
        let a = world.connect("alice", WorldId::new("arena"));
        let spec = world.connect("sam", WorldId::new("arena"));
        session.add_participant(a.clone(), false).unwrap();
        session.add_participant(spec.clone(), true).unwrap();
        session.add_zone(
            ZoneKind::NoOrdnance,
            Zone::from_corners(BlockPos::new(0, 0, 0), BlockPos::new(4, 4, 4)),
        );
        session.add_zone(
            ZoneKind::BlockDamageImmune,
            Zone::from_corners(BlockPos::new(10, 0, 10), BlockPos::new(12, 3, 12)),
        );
        let inside = BlockPos::new(4, 4, 4);
        let outside = BlockPos::new(5, 4, 4);

        assert!(session.can_build_at(&a.id(), inside, BuildAction::PlaceOrdnance));

        session.state.lock().status = SessionStatus::GracePeriod;
        assert!(!session.can_build_at(&a.id(), outside, BuildAction::PlaceBlock));

        session.state.lock().status = SessionStatus::InProgress;
        assert!(!session.can_build_at(&a.id(), inside, BuildAction::PlaceOrdnance));
        assert!(session.can_build_at(&a.id(), outside, BuildAction::PlaceOrdnance));
        assert!(session.can_build_at(&a.id(), inside, BuildAction::PlaceBlock));
        assert!(!session.can_build_at(&spec.id(), outside, BuildAction::PlaceBlock));

        session.record_ordnance_placed(&a.id()).unwrap();
        assert!(!session.can_build_at(&a.id(), outside, BuildAction::PlaceOrdnance));
        session.record_ordnance_detonated(&a.id()).unwrap();
        assert!(session.can_build_at(&a.id(), outside, BuildAction::PlaceOrdnance));

        assert!(session.is_block_damage_immune(BlockPos::new(12, 3, 10)));
        assert!(!session.is_block_damage_immune(BlockPos::new(13, 3, 10)));
    }

    #[test]
    fn leaving_spectator_mode_mid_match_restores_building() {
        let (world, session) = setup(GameMode::Ffa, Difficulty::Normal, quick_config(0));
        let a = world.connect("alice", WorldId::new("arena"));
        session.add_participant(a.clone(), false).unwrap();
        session.state.lock().status = SessionStatus::InProgress;
        let pos = BlockPos::new(20, 5, 20);

        session.set_spectator(&a.id(), true).unwrap();
        assert!(!a.can_build());
        assert!(!session.can_build_at(&a.id(), pos, BuildAction::PlaceBlock));

        session.set_spectator(&a.id(), false).unwrap();
        assert!(a.can_build());
        assert!(session.can_build_at(&a.id(), pos, BuildAction::PlaceBlock));
    }
}
