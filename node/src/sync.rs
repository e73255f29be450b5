use minemesh_core::{Board, Coord2, GameError};
use minemesh_protocol::{CellAction, GameConfig, GameOverReason, Millis, SessionState};

use crate::error::{NodeError, Result};

/// Per-node game lifecycle. Transitions only ever move
/// `NoGame -> Configuring -> InGame -> NoGame`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum GamePhase {
    #[default]
    NoGame,
    Configuring,
    InGame,
}

/// Net effect of applying one cell action, merged over the whole flood.
/// Terminal outcomes are derived locally on every node; there is no
/// authoritative arbiter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Unchanged,
    Updated,
    Won,
    Lost,
}

struct Session {
    config: GameConfig,
    board: Board,
    started_at: Millis,
    /// Set once a mine layout exists, locally placed or adopted from a
    /// FIRST_REVEAL. Guards against overwriting an established layout.
    mines_placed: bool,
}

/// Owns this node's canonical view of the shared game: the lobby config
/// (last write wins) and the active session, applying local and remote cell
/// actions through the board engine.
#[derive(Default)]
pub struct GameSync {
    phase: GamePhase,
    config: Option<GameConfig>,
    session: Option<Session>,
}

impl GameSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn config(&self) -> Option<&GameConfig> {
        self.config.as_ref()
    }

    pub fn board(&self) -> Option<&Board> {
        self.session.as_ref().map(|session| &session.board)
    }

    pub fn in_game(&self) -> bool {
        self.session.is_some()
    }

    /// Snapshot for priming a new peer or broadcasting full-board catch-up.
    pub fn session_state(&self) -> Option<SessionState> {
        self.session.as_ref().map(|session| SessionState {
            config: session.config,
            board: session.board.blueprint(),
            start_time: session.started_at,
        })
    }

    /// Replaces the lobby config wholesale, for both local edits and remote
    /// GAME_CONFIG broadcasts. No merge.
    pub fn set_config(&mut self, config: GameConfig) {
        self.config = Some(config);
        if self.phase == GamePhase::NoGame {
            self.phase = GamePhase::Configuring;
        }
    }

    /// Validates and starts a game locally with an empty board. The mine
    /// layout is deferred to the first reveal, so feasibility is checked
    /// against the worst-case 3x3 safe zone up front: nothing may be
    /// broadcast that could later fail to place.
    pub fn start(&mut self, config: GameConfig, now: Millis) -> Result<SessionState> {
        if self.session.is_some() {
            return Err(NodeError::AlreadyInGame);
        }
        let board = Board::empty(config.width, config.height)?;
        let available = board.total_cells().saturating_sub(9);
        if config.bomb_count > available {
            return Err(GameError::InfeasibleMineCount {
                requested: config.bomb_count,
                available,
            }
            .into());
        }

        self.config = Some(config);
        self.session = Some(Session {
            config,
            board,
            started_at: now,
            mines_placed: false,
        });
        self.phase = GamePhase::InGame;
        log::debug!("Game started locally at {}", now);
        self.session_state().ok_or(NodeError::NotInGame)
    }

    /// Adopts a GAME_START broadcast verbatim; `started_at` is the local
    /// receipt time, so countdowns on different peers may disagree by
    /// network latency.
    pub fn start_remote(&mut self, config: GameConfig, board: &minemesh_core::Blueprint, now: Millis) -> Result<()> {
        let board = board.to_board()?;
        let mines_placed = board.has_mines();
        self.config = Some(config);
        self.session = Some(Session {
            config,
            board,
            started_at: now,
            mines_placed,
        });
        self.phase = GamePhase::InGame;
        log::debug!("Game adopted from peer at {}", now);
        Ok(())
    }

    /// Full-board resync; idempotent, applying the same state twice yields
    /// the same board.
    ///
    /// A terminal board arriving while no session is active is the tail of a
    /// game that already ended here and is dropped, otherwise every node
    /// would resurrect the finished game from its peers' final broadcasts.
    pub fn apply_state(&mut self, state: &SessionState, now: Millis) -> Result<ApplyOutcome> {
        let board = state.board.to_board()?;
        let mines_placed = board.has_mines();
        let started_at = self
            .session
            .as_ref()
            .map(|session| session.started_at)
            .unwrap_or(now);
        let outcome = Self::evaluate(&board);
        if self.session.is_none() && outcome != ApplyOutcome::Updated {
            return Ok(ApplyOutcome::Unchanged);
        }
        self.config = Some(state.config);
        self.session = Some(Session {
            config: state.config,
            board,
            started_at,
            mines_placed,
        });
        self.phase = GamePhase::InGame;
        Ok(outcome)
    }

    /// Applies a local reveal. The first reveal of a session places the mine
    /// layout with a safe zone around the click and yields a FIRST_REVEAL
    /// action carrying the resulting blueprint.
    pub fn local_reveal(
        &mut self,
        coords: Coord2,
        seed: u64,
    ) -> Result<(Option<CellAction>, ApplyOutcome)> {
        let session = self.session.as_mut().ok_or(NodeError::NotInGame)?;
        let (x, y) = coords;

        if !session.mines_placed {
            let placed = session
                .board
                .place_mines(session.config.bomb_count, coords, seed)?;
            session.board = placed.reveal(coords);
            session.mines_placed = true;
            let action = CellAction::FirstReveal {
                x,
                y,
                board: session.board.blueprint(),
            };
            return Ok((Some(action), Self::evaluate(&session.board)));
        }

        let next = session.board.reveal(coords);
        if next == session.board {
            return Ok((None, ApplyOutcome::Unchanged));
        }
        session.board = next;
        Ok((
            Some(CellAction::Reveal { x, y }),
            Self::evaluate(&session.board),
        ))
    }

    pub fn local_flag(&mut self, coords: Coord2) -> Result<(Option<CellAction>, ApplyOutcome)> {
        let session = self.session.as_mut().ok_or(NodeError::NotInGame)?;
        let next = session.board.toggle_flag(coords);
        if next == session.board {
            return Ok((None, ApplyOutcome::Unchanged));
        }
        session.board = next;
        let (x, y) = coords;
        Ok((
            Some(CellAction::Flag { x, y }),
            Self::evaluate(&session.board),
        ))
    }

    /// Replays a remote cell action. A FIRST_REVEAL that loses the race
    /// against an established mine layout degrades to a plain reveal so the
    /// boards cannot diverge.
    pub fn apply_remote(&mut self, action: &CellAction) -> Result<ApplyOutcome> {
        let Some(session) = self.session.as_mut() else {
            log::debug!("Dropping cell action outside a game");
            return Ok(ApplyOutcome::Unchanged);
        };

        match action {
            CellAction::Reveal { x, y } => {
                session.board = session.board.reveal((*x, *y));
            }
            CellAction::Flag { x, y } => {
                session.board = session.board.toggle_flag((*x, *y));
            }
            CellAction::FirstReveal { x, y, board } => {
                if session.mines_placed {
                    log::debug!("Mine layout already established, degrading FIRST_REVEAL to reveal");
                    session.board = session.board.reveal((*x, *y));
                } else {
                    session.board = session.board.apply_blueprint(board)?.reveal((*x, *y));
                    session.mines_placed = true;
                }
            }
        }
        Ok(Self::evaluate(&session.board))
    }

    /// Ends the session: reveals every mine and hands back the final state
    /// for broadcasting. The session is destroyed either way.
    pub fn finish(&mut self, reason: GameOverReason) -> Option<SessionState> {
        let session = self.session.take()?;
        self.phase = GamePhase::NoGame;
        let board = session.board.reveal_all_mines();
        log::debug!("Game over: {:?}", reason);
        Some(SessionState {
            config: session.config,
            board: board.blueprint(),
            start_time: session.started_at,
        })
    }

    /// Tears the session down on a remote GAME_OVER without re-broadcasting.
    pub fn clear(&mut self) -> bool {
        self.phase = GamePhase::NoGame;
        self.session.take().is_some()
    }

    fn evaluate(board: &Board) -> ApplyOutcome {
        if board.any_mine_revealed() {
            ApplyOutcome::Lost
        } else if board.check_win() {
            ApplyOutcome::Won
        } else {
            ApplyOutcome::Updated
        }
    }
}
