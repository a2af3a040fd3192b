//! Watch runner: the task that owns the controller.
//!
//! ```text
//! API / CLI ──► [command channel] ──► WatchRunner ──► WatchController
//!                                        ▲
//!              tick / housekeeping / verify intervals
//! ```
//!
//! Ticks, timers and commands are serialized through one `select!` loop, so
//! a disarm can never interleave with a tick's execution. Timers only run
//! while the watch is armed.
//!
//! Session verification talks to the broker tab and the auth service, so it
//! runs on its own task. An invalid session comes back as a `Disarm` command.

use chrono::Utc;
use std::future::{pending, Future};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::lifecycle::{WatchController, REASON_MANUAL};
use super::state::WatchStatus;
use crate::auth::{SessionCheck, SessionManager};
use crate::config::WatchConfig;
use crate::types::{Direction, FocusSelection, ReleaseRecord, TradeLogEntry, WatchError};

const COMMAND_CHANNEL_CAPACITY: usize = 32;

type Reply<T> = oneshot::Sender<T>;

#[derive(Debug)]
pub enum Command {
    Arm {
        focus: FocusSelection,
        asset: String,
        pair: String,
        reply: Reply<Result<WatchStatus, WatchError>>,
    },
    Disarm {
        reason: String,
        reply: Reply<WatchStatus>,
    },
    Status {
        reply: Reply<WatchStatus>,
    },
    Reset {
        reply: Reply<WatchStatus>,
    },
    Refresh {
        reply: Reply<Result<Vec<ReleaseRecord>, WatchError>>,
    },
    Releases {
        min_importance: u8,
        reply: Reply<Vec<ReleaseRecord>>,
    },
    Trades {
        reply: Reply<Vec<TradeLogEntry>>,
    },
    Click {
        direction: Direction,
        reply: Reply<Result<(), WatchError>>,
    },
}

/// Cheap, cloneable front door to the runner.
#[derive(Clone)]
pub struct WatchHandle {
    tx: mpsc::Sender<Command>,
}

impl WatchHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, WatchError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| WatchError::Unavailable("watch runner stopped".into()))?;
        rx.await
            .map_err(|_| WatchError::Unavailable("watch runner dropped the request".into()))
    }

    pub async fn arm(
        &self,
        focus: FocusSelection,
        asset: &str,
        pair: &str,
    ) -> Result<WatchStatus, WatchError> {
        let (asset, pair) = (asset.to_string(), pair.to_string());
        self.request(|reply| Command::Arm { focus, asset, pair, reply }).await?
    }

    pub async fn disarm(&self, reason: &str) -> Result<WatchStatus, WatchError> {
        let reason = reason.to_string();
        self.request(|reply| Command::Disarm { reason, reply }).await
    }

    pub async fn status(&self) -> Result<WatchStatus, WatchError> {
        self.request(|reply| Command::Status { reply }).await
    }

    pub async fn reset(&self) -> Result<WatchStatus, WatchError> {
        self.request(|reply| Command::Reset { reply }).await
    }

    pub async fn refresh(&self) -> Result<Vec<ReleaseRecord>, WatchError> {
        self.request(|reply| Command::Refresh { reply }).await?
    }

    pub async fn releases(&self, min_importance: u8) -> Result<Vec<ReleaseRecord>, WatchError> {
        self.request(|reply| Command::Releases { min_importance, reply }).await
    }

    pub async fn trades(&self) -> Result<Vec<TradeLogEntry>, WatchError> {
        self.request(|reply| Command::Trades { reply }).await
    }

    pub async fn click(&self, direction: Direction) -> Result<(), WatchError> {
        self.request(|reply| Command::Click { direction, reply }).await?
    }
}

/// Timers that exist only while the watch is armed.
struct Schedule {
    tick_period: Duration,
    housekeeping_period: Duration,
    tick: Option<Interval>,
    housekeeping: Option<Interval>,
}

impl Schedule {
    fn new(cfg: &WatchConfig) -> Self {
        Self {
            tick_period: Duration::from_millis(cfg.tick_interval_ms.max(1)),
            housekeeping_period: Duration::from_secs(cfg.housekeeping_interval_secs.max(1)),
            tick: None,
            housekeeping: None,
        }
    }

    fn is_running(&self) -> bool {
        self.tick.is_some()
    }

    fn start(&mut self) {
        let mut tick = interval(self.tick_period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut housekeeping = interval_at(
            Instant::now() + self.housekeeping_period,
            self.housekeeping_period,
        );
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.tick = Some(tick);
        self.housekeeping = Some(housekeeping);
        debug!(tick_ms = self.tick_period.as_millis() as u64, "Timers started");
    }

    fn stop(&mut self) {
        self.tick = None;
        self.housekeeping = None;
        debug!("Timers stopped");
    }
}

/// Resolves on the next tick, or never if the timer is off.
async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(t) => {
            t.tick().await;
        }
        None => pending::<()>().await,
    }
}

pub struct WatchRunner {
    controller: WatchController,
    commands: mpsc::Receiver<Command>,
    schedule: Schedule,
    session: Option<Arc<SessionManager>>,
    require_session: bool,
    verify: Option<Interval>,
    verifying: Option<JoinHandle<()>>,
    // Weak so that verification never keeps the runner alive.
    loopback: mpsc::WeakSender<Command>,
}

impl WatchRunner {
    pub fn new(controller: WatchController, cfg: &WatchConfig) -> (Self, WatchHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let runner = Self {
            controller,
            commands,
            schedule: Schedule::new(cfg),
            session: None,
            require_session: false,
            verify: None,
            verifying: None,
            loopback: tx.downgrade(),
        };
        (runner, WatchHandle { tx })
    }

    /// Gate arming on `session` and re-verify it every `verify_every`.
    pub fn with_session(
        mut self,
        session: Arc<SessionManager>,
        require_session: bool,
        verify_every: Duration,
    ) -> Self {
        let period = verify_every.max(Duration::from_secs(1));
        let mut verify = interval_at(Instant::now() + period, period);
        verify.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.session = Some(session);
        self.require_session = require_session;
        self.verify = Some(verify);
        self
    }

    /// Run until `shutdown` resolves or every handle is dropped.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        self.sync_schedule();
        info!(armed = self.controller.is_armed(), "Watch runner started");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => {
                        info!("All watch handles dropped");
                        break;
                    }
                },
                _ = next_tick(&mut self.schedule.tick) => {
                    let outcome = self.controller.tick(Utc::now()).await;
                    debug!(?outcome, "Tick");
                }
                _ = next_tick(&mut self.schedule.housekeeping) => {
                    self.controller.housekeeping().await;
                }
                _ = next_tick(&mut self.verify) => {
                    self.spawn_verification();
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
            self.sync_schedule();
        }
        if let Some(task) = self.verifying.take() {
            task.abort();
        }
        info!(armed = self.controller.is_armed(), "Watch runner stopped");
    }

    fn sync_schedule(&mut self) {
        match (self.controller.is_armed(), self.schedule.is_running()) {
            (true, false) => self.schedule.start(),
            (false, true) => self.schedule.stop(),
            _ => {}
        }
    }

    fn spawn_verification(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        if self.verifying.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("Previous session check still running, skipping");
            return;
        }
        let loopback = self.loopback.clone();
        self.verifying = Some(tokio::spawn(async move {
            let SessionCheck::Invalid(reason) = session.verify().await else {
                return;
            };
            let Some(tx) = loopback.upgrade() else {
                return;
            };
            let (reply, _) = oneshot::channel();
            if tx.send(Command::Disarm { reason, reply }).await.is_err() {
                debug!("Runner stopped before the session disarm arrived");
            }
        }));
    }

    fn check_session(&self) -> Result<(), WatchError> {
        match &self.session {
            Some(session) if self.require_session && !session.is_logged_in() => {
                Err(WatchError::Auth("login required to arm".into()))
            }
            _ => Ok(()),
        }
    }

    async fn handle(&mut self, cmd: Command) {
        // A dropped receiver only means the caller went away.
        match cmd {
            Command::Arm { focus, asset, pair, reply } => {
                let result = self
                    .check_session()
                    .and_then(|_| self.controller.arm(focus, &asset, &pair, Utc::now()))
                    .map(|_| self.controller.status());
                if let Err(e) = &result {
                    warn!(error = %e, "Arm rejected");
                }
                let _ = reply.send(result);
            }
            Command::Disarm { reason, reply } => {
                let reason = if reason.trim().is_empty() { REASON_MANUAL.to_string() } else { reason };
                self.controller.disarm(&reason).await;
                let _ = reply.send(self.controller.status());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.controller.status());
            }
            Command::Reset { reply } => {
                self.controller.reset_history();
                let _ = reply.send(self.controller.status());
            }
            Command::Refresh { reply } => {
                let _ = reply.send(self.controller.refresh().await);
            }
            Command::Releases { min_importance, reply } => {
                let releases = self
                    .controller
                    .latest_releases()
                    .iter()
                    .filter(|r| r.importance >= min_importance)
                    .cloned()
                    .collect();
                let _ = reply.send(releases);
            }
            Command::Trades { reply } => {
                let _ = reply.send(self.controller.trade_history());
            }
            Command::Click { direction, reply } => {
                let _ = reply.send(self.controller.manual_click(direction).await);
            }
        }
    }
}
