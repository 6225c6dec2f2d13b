//! Physics on its own thread. The owner sends `Init` / `Step` / `Shot`
//! over a bounded channel and reads back whole-state updates; the world is
//! never touched from the owner's thread.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::thread::JoinHandle;
use std::time::Duration;

use pool_shared::ball::{Ball, BallKey};
use pool_shared::config::PhysicsConfig;
use pool_shared::events::GameEvent;
use pool_shared::table::Table;
use pool_shared::vec2::Vec2;
use pool_shared::PhysicsWorld;

pub enum WorkerMsg {
    Init {
        config: PhysicsConfig,
        table: Table,
        balls: Vec<Ball>,
    },
    Step {
        dt: f32,
    },
    Shot {
        ball: BallKey,
        impulse: Vec2,
    },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerUpdate {
    pub balls: Vec<Ball>,
    pub events: Vec<GameEvent>,
    pub shot_in_flight: bool,
    pub state_hash: u64,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerError {
    #[error("Physics worker queue is full")]
    Full,

    #[error("Physics worker has stopped")]
    Disconnected,
}

pub struct PhysicsWorker {
    tx: SyncSender<WorkerMsg>,
    rx: Receiver<WorkerUpdate>,
    handle: Option<JoinHandle<()>>,
}

impl PhysicsWorker {
    /// Spawn the worker. `capacity` bounds the inbound queue.
    pub fn spawn(capacity: usize) -> Result<Self, WorkerError> {
        let (tx, inbox) = mpsc::sync_channel::<WorkerMsg>(capacity.max(1));
        let (outbox, rx) = mpsc::channel::<WorkerUpdate>();
        let handle = std::thread::Builder::new()
            .name("pool-physics".to_string())
            .spawn(move || run_worker(inbox, outbox))
            .map_err(|e| {
                tracing::error!("failed to spawn physics worker: {}", e);
                WorkerError::Disconnected
            })?;
        Ok(Self {
            tx,
            rx,
            handle: Some(handle),
        })
    }

    /// Queue a message without blocking.
    pub fn send(&self, msg: WorkerMsg) -> Result<(), WorkerError> {
        self.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => WorkerError::Full,
            TrySendError::Disconnected(_) => WorkerError::Disconnected,
        })
    }

    /// Every update produced since the last poll.
    pub fn poll(&self) -> Result<Vec<WorkerUpdate>, WorkerError> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(update) => out.push(update),
                Err(TryRecvError::Empty) => return Ok(out),
                Err(TryRecvError::Disconnected) if !out.is_empty() => return Ok(out),
                Err(TryRecvError::Disconnected) => return Err(WorkerError::Disconnected),
            }
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<WorkerUpdate>, WorkerError> {
        match self.rx.recv_timeout(timeout) {
            Ok(update) => Ok(Some(update)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(WorkerError::Disconnected),
        }
    }
}

impl Drop for PhysicsWorker {
    fn drop(&mut self) {
        // A full queue still drains; a blocking send lets Shutdown through
        let _ = self.tx.send(WorkerMsg::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn snapshot(world: &PhysicsWorld, events: Vec<GameEvent>) -> WorkerUpdate {
    WorkerUpdate {
        balls: world.balls(),
        events,
        shot_in_flight: world.is_shot_in_flight(),
        state_hash: world.state_hash(),
    }
}

fn run_worker(inbox: Receiver<WorkerMsg>, outbox: mpsc::Sender<WorkerUpdate>) {
    let mut world: Option<PhysicsWorld> = None;

    while let Ok(msg) = inbox.recv() {
        let update = match msg {
            WorkerMsg::Init {
                config,
                table,
                balls,
            } => {
                let w = PhysicsWorld::new(config, table, &balls);
                let update = snapshot(&w, Vec::new());
                world = Some(w);
                update
            }
            WorkerMsg::Step { dt } => {
                let Some(w) = world.as_mut() else {
                    tracing::warn!("physics worker stepped before init");
                    continue;
                };
                let events = w.step(dt);
                snapshot(w, events)
            }
            WorkerMsg::Shot { ball, impulse } => {
                let Some(w) = world.as_mut() else {
                    tracing::warn!("physics worker shot before init");
                    continue;
                };
                w.rebuild();
                let events = w.apply_shot(ball, impulse).into_iter().collect();
                snapshot(w, events)
            }
            WorkerMsg::Shutdown => break,
        };
        if outbox.send(update).is_err() {
            break;
        }
    }
    tracing::debug!("physics worker stopped");
}
