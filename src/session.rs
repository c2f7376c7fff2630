//! Interactive re-simulation.
//!
//! A [`SimulationSession`] owns the fixed inputs of one program run (population,
//! initial compartments, time grid) together with the current parameters and
//! the trajectory on display. Every parameter change recomputes the whole
//! trajectory from scratch with the same initial values and grid.
//!
//! [`SessionHandle::spawn`] puts a session behind a single-consumer queue so
//! that UI events arriving from any thread are processed one at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::config::ScenarioConfig;
use crate::error::{SimError, SimResult};
use crate::model::sir::{Compartments, SirParams};
use crate::model::time_grid::TimeGrid;
use crate::model::trajectory::Trajectory;
use crate::solver::{simulate_with, SolverOptions};

/// One user action on the parameter controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamChange {
    Beta(f64),
    Gamma(f64),
    Both(SirParams),
    /// Back to the parameters the session started with.
    Reset,
}

impl ParamChange {
    pub fn apply_to(self, current: SirParams, baseline: SirParams) -> SirParams {
        match self {
            ParamChange::Beta(beta) => SirParams { beta, ..current },
            ParamChange::Gamma(gamma) => SirParams { gamma, ..current },
            ParamChange::Both(p) => p,
            ParamChange::Reset => baseline,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Recomputing,
}

/// What the display layer receives after each successful recompute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionUpdate {
    pub revision: u64,
    pub params: SirParams,
    pub trajectory: Trajectory,
}

pub struct SimulationSession {
    population: f64,
    initial: Compartments,
    grid: TimeGrid,
    options: SolverOptions,
    baseline: SirParams,
    params: SirParams,
    trajectory: Trajectory,
    revision: u64,
}

impl SimulationSession {
    /// Validate the fixed inputs and compute the first trajectory.
    pub fn new(
        population: f64,
        initial: Compartments,
        grid: TimeGrid,
        baseline: SirParams,
        options: SolverOptions,
    ) -> SimResult<Self> {
        let trajectory = simulate_with(population, initial, baseline, grid.as_slice(), &options)?;
        Ok(Self {
            population,
            initial,
            grid,
            options,
            baseline,
            params: baseline,
            trajectory,
            revision: 0,
        })
    }

    pub fn from_config(cfg: &ScenarioConfig) -> SimResult<Self> {
        Self::new(cfg.population, cfg.initial(), cfg.time_grid()?, cfg.params(), cfg.solver.clone())
    }

    /// Recompute with the changed parameters. On failure the previous
    /// parameters and trajectory stay current.
    pub fn apply(&mut self, change: ParamChange) -> SimResult<&Trajectory> {
        let target = change.apply_to(self.params, self.baseline);
        let result = target
            .check()
            .and_then(|_| simulate_with(self.population, self.initial, target, self.grid.as_slice(), &self.options));
        match result {
            Ok(trajectory) => {
                self.trajectory = trajectory;
                self.params = target;
                self.revision += 1;
                info!(
                    "session: recomputed revision {} (beta={}, gamma={})",
                    self.revision, target.beta, target.gamma
                );
                Ok(&self.trajectory)
            }
            Err(e) => {
                warn!("session: rejected beta={} gamma={}: {e}", target.beta, target.gamma);
                Err(e)
            }
        }
    }

    pub fn update(&self) -> SessionUpdate {
        SessionUpdate {
            revision: self.revision,
            params: self.params,
            trajectory: self.trajectory.clone(),
        }
    }

    pub fn params(&self) -> SirParams {
        self.params
    }

    pub fn baseline(&self) -> SirParams {
        self.baseline
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn population(&self) -> f64 {
        self.population
    }

    pub fn initial(&self) -> Compartments {
        self.initial
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }
}

/// Receives results from a session worker.
pub trait TrajectorySink: Send {
    fn on_update(&mut self, update: &SessionUpdate);

    fn on_error(&mut self, params: SirParams, err: &SimError) {
        warn!("session: change to beta={} gamma={} failed: {err}", params.beta, params.gamma);
    }
}

impl<F> TrajectorySink for F
where
    F: FnMut(&SessionUpdate) + Send,
{
    fn on_update(&mut self, update: &SessionUpdate) {
        (self)(update)
    }
}

/// Sink that keeps only the newest update and the newest error, for readers
/// that poll (the HTTP service).
#[derive(Debug, Clone, Default)]
pub struct SharedLatest {
    update: Arc<RwLock<Option<SessionUpdate>>>,
    error: Arc<RwLock<Option<String>>>,
}

impl SharedLatest {
    pub fn latest(&self) -> Option<SessionUpdate> {
        match self.update.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn last_error(&self) -> Option<String> {
        match self.error.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TrajectorySink for SharedLatest {
    fn on_update(&mut self, update: &SessionUpdate) {
        if let Ok(mut g) = self.update.write() {
            *g = Some(update.clone());
        }
        if let Ok(mut g) = self.error.write() {
            *g = None;
        }
    }

    fn on_error(&mut self, params: SirParams, err: &SimError) {
        warn!("session: change to beta={} gamma={} failed: {err}", params.beta, params.gamma);
        if let Ok(mut g) = self.error.write() {
            *g = Some(err.to_string());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session worker has stopped")]
pub struct SessionClosed;

enum Command {
    Change(ParamChange),
    Shutdown,
}

/// Handle to a session running on its own thread.
pub struct SessionHandle {
    tx: Sender<Command>,
    busy: Arc<AtomicBool>,
    join: JoinHandle<SimulationSession>,
}

impl SessionHandle {
    /// Start the worker. The sink first receives the session's current
    /// trajectory, then one update per recompute. With `coalesce`, changes
    /// queued while a recompute runs are folded into a single recompute.
    pub fn spawn<K>(session: SimulationSession, sink: K, coalesce: bool) -> Self
    where
        K: TrajectorySink + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let busy = Arc::new(AtomicBool::new(false));
        let worker_busy = Arc::clone(&busy);
        let join = thread::spawn(move || run_worker(session, rx, sink, worker_busy, coalesce));
        Self { tx, busy, join }
    }

    pub fn submit(&self, change: ParamChange) -> Result<(), SessionClosed> {
        self.tx.send(Command::Change(change)).map_err(|_| SessionClosed)
    }

    pub fn state(&self) -> SessionState {
        if self.busy.load(Ordering::SeqCst) {
            SessionState::Recomputing
        } else {
            SessionState::Idle
        }
    }

    /// Process everything already queued, stop the worker and hand the
    /// session back.
    pub fn shutdown(self) -> anyhow::Result<SimulationSession> {
        // a worker that already exited still reports through join()
        let _ = self.tx.send(Command::Shutdown);
        self.join
            .join()
            .map_err(|_| anyhow::anyhow!("session worker panicked"))
    }
}

fn run_worker<K: TrajectorySink>(
    mut session: SimulationSession,
    rx: Receiver<Command>,
    mut sink: K,
    busy: Arc<AtomicBool>,
    coalesce: bool,
) -> SimulationSession {
    sink.on_update(&session.update());

    while let Ok(cmd) = rx.recv() {
        let first = match cmd {
            Command::Change(c) => c,
            Command::Shutdown => break,
        };

        let baseline = session.baseline();
        let mut target = session.params();
        let mut dirty = false;
        let mut stop = false;
        let mut fold = |change: ParamChange, target: &mut SirParams, sink: &mut K| {
            let candidate = change.apply_to(*target, baseline);
            match candidate.check() {
                Ok(()) => {
                    *target = candidate;
                    dirty = true;
                }
                Err(e) => sink.on_error(candidate, &e),
            }
        };

        fold(first, &mut target, &mut sink);
        if coalesce {
            while let Ok(next) = rx.try_recv() {
                match next {
                    Command::Change(c) => fold(c, &mut target, &mut sink),
                    Command::Shutdown => {
                        stop = true;
                        break;
                    }
                }
            }
        }

        if dirty {
            busy.store(true, Ordering::SeqCst);
            match session.apply(ParamChange::Both(target)) {
                Ok(_) => sink.on_update(&session.update()),
                Err(e) => sink.on_error(target, &e),
            }
            busy.store(false, Ordering::SeqCst);
        }

        if stop {
            break;
        }
    }

    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::simulate;
    use std::sync::Mutex;

    fn small_session() -> SimulationSession {
        let grid = TimeGrid::linspace(0.0, 60.0, 31).unwrap();
        SimulationSession::new(
            10_000.0,
            Compartments::seeded(10_000.0, 5.0, 0.0),
            grid,
            SirParams::new(0.5, 0.2),
            SolverOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn change_helpers_compose() {
        let base = SirParams::new(0.5, 0.2);
        let cur = SirParams::new(0.1, 0.1);
        assert_eq!(ParamChange::Beta(0.7).apply_to(cur, base), SirParams::new(0.7, 0.1));
        assert_eq!(ParamChange::Gamma(0.3).apply_to(cur, base), SirParams::new(0.1, 0.3));
        assert_eq!(ParamChange::Reset.apply_to(cur, base), base);
    }

    #[test]
    fn apply_replaces_trajectory_with_fresh_run() {
        let mut s = small_session();
        let before = s.trajectory().clone();
        let tr = s.apply(ParamChange::Beta(0.8)).unwrap().clone();
        assert_ne!(tr, before);
        assert_eq!(s.revision(), 1);
        assert_eq!(s.params(), SirParams::new(0.8, 0.2));
        let direct = simulate(10_000.0, s.initial(), s.params(), s.grid().as_slice()).unwrap();
        assert_eq!(&direct, s.trajectory());
    }

    #[test]
    fn failed_change_keeps_previous_state() {
        let mut s = small_session();
        let before = s.update();
        assert!(matches!(s.apply(ParamChange::Gamma(-1.0)), Err(SimError::InvalidParameters(_))));
        assert_eq!(s.update(), before);
    }

    #[test]
    fn reset_returns_to_baseline_trajectory() {
        let mut s = small_session();
        let before = s.trajectory().clone();
        s.apply(ParamChange::Both(SirParams::new(0.9, 0.05))).unwrap();
        s.apply(ParamChange::Reset).unwrap();
        assert_eq!(s.trajectory(), &before);
        assert_eq!(s.revision(), 2);
    }

    #[test]
    fn worker_processes_every_queued_change() {
        let seen: Arc<Mutex<Vec<SessionUpdate>>> = Arc::default();
        let sink_seen = Arc::clone(&seen);
        let handle = SessionHandle::spawn(
            small_session(),
            move |u: &SessionUpdate| sink_seen.lock().unwrap().push(u.clone()),
            false,
        );
        handle.submit(ParamChange::Beta(0.6)).unwrap();
        handle.submit(ParamChange::Gamma(0.25)).unwrap();
        handle.submit(ParamChange::Beta(-2.0)).unwrap();
        let session = handle.shutdown().unwrap();

        let seen = seen.lock().unwrap();
        // initial display + two successful recomputes
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].revision, 0);
        assert_eq!(seen[2].params, SirParams::new(0.6, 0.25));
        assert_eq!(session.params(), SirParams::new(0.6, 0.25));
        assert_eq!(session.revision(), 2);
    }

    #[test]
    fn coalescing_worker_ends_on_folded_parameters() {
        let latest = SharedLatest::default();
        let handle = SessionHandle::spawn(small_session(), latest.clone(), true);
        for k in 1..=20 {
            handle.submit(ParamChange::Beta(0.3 + 0.01 * k as f64)).unwrap();
        }
        handle.submit(ParamChange::Gamma(0.15)).unwrap();
        let session = handle.shutdown().unwrap();

        let expected = SirParams::new(0.3 + 0.01 * 20.0, 0.15);
        assert_eq!(session.params(), expected);
        let last = latest.latest().unwrap();
        assert_eq!(last.params, expected);
        assert!(last.revision >= 1 && last.revision <= 21);
        assert_eq!(&last.trajectory, session.trajectory());
        assert!(latest.last_error().is_none());
    }

    #[test]
    fn shared_latest_records_errors() {
        let latest = SharedLatest::default();
        let handle = SessionHandle::spawn(small_session(), latest.clone(), true);
        handle.submit(ParamChange::Beta(f64::NAN)).unwrap();
        let session = handle.shutdown().unwrap();
        assert_eq!(session.revision(), 0);
        assert!(latest.last_error().unwrap().contains("beta"));
    }

    #[test]
    fn worker_without_changes_is_idle() {
        let handle = SessionHandle::spawn(small_session(), |_: &SessionUpdate| {}, false);
        assert_eq!(handle.state(), SessionState::Idle);
        assert_eq!(handle.shutdown().unwrap().revision(), 0);
    }

    #[test]
    fn state_reports_recomputing_while_a_change_is_processed() {
        use std::sync::Barrier;
        use std::time::{Duration, Instant};

        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let (sink_entered, sink_release) = (Arc::clone(&entered), Arc::clone(&release));
        let handle = SessionHandle::spawn(
            small_session(),
            move |u: &SessionUpdate| {
                // hold the worker inside the first recompute
                if u.revision == 1 {
                    sink_entered.wait();
                    sink_release.wait();
                }
            },
            true,
        );

        handle.submit(ParamChange::Beta(0.7)).unwrap();
        entered.wait();
        assert_eq!(handle.state(), SessionState::Recomputing);
        release.wait();

        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.state() != SessionState::Idle && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(handle.state(), SessionState::Idle);
        assert_eq!(handle.shutdown().unwrap().params().beta, 0.7);
    }
}
