mod availability;
mod error;
mod mutations;
mod queries;
#[cfg(test)]
mod tests;

pub use availability::{floor_of, group_by_floor, occupancy, room_status};
pub use error::EngineError;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedRwLockWriteGuard, RwLock};

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type Pending = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the WAL. Each wakeup takes the first append plus whatever appends are
/// already queued, writes them all, and fsyncs once for the whole batch.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let first = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![first];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }
        commit(&mut wal, &mut batch);
        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn commit(wal: &mut Wal, batch: &mut Vec<Pending>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[Pending]) -> io::Result<()> {
    let appended = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so half-buffered bytes don't leak
    // into the next batch.
    let flushed = wal.flush_sync();
    appended.and(flushed)
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result =
                Wal::write_compact_file(wal.path(), &events).and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// Rooms with their weekly schedules and bookings, plus the usage log.
///
/// Every mutation is journaled before it is applied. State is rebuilt from
/// the journal on startup.
pub struct Engine {
    pub(super) rooms: DashMap<String, SharedRoomState>,
    pub(super) reports: RwLock<Vec<UsageReport>>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Mutations hold this shared; compaction holds it exclusively so the
    /// snapshot it writes matches the journal it replaces.
    pub(super) commit_gate: RwLock<()>,
    /// Held by room creation and deletion from the existence check until the
    /// map is updated. Taken after `commit_gate`, before any room lock.
    pub(super) registry: Mutex<()>,
}

/// Apply a room-scoped event. Caller holds the room lock.
pub(super) fn apply_to_room(rs: &mut RoomState, event: &Event) {
    match event {
        Event::RoomUpdated { capacity, .. } => rs.capacity = *capacity,
        Event::SlotSet {
            day,
            period,
            comment,
            ..
        } => {
            rs.recurring.insert((*day, *period), comment.clone());
        }
        Event::SlotCleared { day, period, .. } => {
            rs.recurring.remove(&(*day, *period));
        }
        Event::BookingAdded {
            date,
            period,
            reserved_by,
            ..
        } => {
            rs.temporary.insert((*date, *period), *reserved_by);
        }
        Event::BookingRemoved { date, period, .. } => {
            rs.temporary.remove(&(*date, *period));
        }
        // Registry-level and log events never reach a single room.
        Event::RoomCreated { .. } | Event::RoomDeleted { .. } | Event::ReportSubmitted { .. } => {}
    }
}

impl Engine {
    /// Replay the journal at `wal_path` and start its writer task.
    /// Must be called inside a tokio runtime.
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;

        let mut rooms: HashMap<String, RoomState> = HashMap::new();
        let mut reports = Vec::new();
        for event in &events {
            match event {
                Event::RoomCreated { number, capacity } => {
                    rooms.insert(number.clone(), RoomState::new(number.clone(), *capacity));
                }
                Event::RoomDeleted { number } => {
                    rooms.remove(number);
                }
                Event::ReportSubmitted { report } => reports.push(report.clone()),
                other => {
                    if let Some(rs) = rooms.get_mut(other.room()) {
                        apply_to_room(rs, other);
                    }
                }
            }
        }
        tracing::info!(
            path = %wal_path.display(),
            events = events.len(),
            rooms = rooms.len(),
            reports = reports.len(),
            "journal replayed"
        );
        metrics::gauge!(crate::observability::ROOMS_TOTAL).set(rooms.len() as f64);

        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self {
            rooms: rooms
                .into_iter()
                .map(|(k, rs)| (k, Arc::new(RwLock::new(rs))))
                .collect(),
            reports: RwLock::new(reports),
            wal_tx,
            notify,
            commit_gate: RwLock::new(()),
            registry: Mutex::new(()),
        })
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_room(&self, number: &str) -> Option<SharedRoomState> {
        self.rooms.get(number).map(|e| e.value().clone())
    }

    pub(super) fn room_or_not_found(&self, number: &str) -> Result<SharedRoomState, EngineError> {
        self.get_room(number)
            .ok_or_else(|| EngineError::NotFound(format!("room {number}")))
    }

    /// Write-lock a room, failing with `NotFound` if it was deleted (or
    /// deleted and re-created) while this caller waited for the lock.
    pub(super) async fn lock_room(
        &self,
        number: &str,
    ) -> Result<OwnedRwLockWriteGuard<RoomState>, EngineError> {
        let rs = self.room_or_not_found(number)?;
        let guard = rs.clone().write_owned().await;
        if !self.is_current(number, &rs) {
            return Err(EngineError::NotFound(format!("room {number}")));
        }
        Ok(guard)
    }

    /// Whether `rs` is still the registered state for `number`.
    pub(super) fn is_current(&self, number: &str, rs: &SharedRoomState) -> bool {
        self.get_room(number)
            .is_some_and(|current| Arc::ptr_eq(&current, rs))
    }

    /// WAL-append + apply + notify for an event scoped to one room.
    pub(super) async fn persist_and_apply(
        &self,
        rs: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_room(rs, event);
        self.notify.send(event);
        Ok(())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
