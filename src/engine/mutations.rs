use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, info};

use crate::limits::*;
use crate::model::*;
use crate::schedule::{parse_row, rows_until_blank, ImportRow, PastedImport};

use super::{Engine, EngineError, WalCommand};

fn validate_room_number(number: &str) -> Result<(), EngineError> {
    let len = number.chars().count();
    if len == 0 || len > MAX_ROOM_NUMBER_LEN || number.trim() != number {
        return Err(EngineError::InvalidInput(format!(
            "room number must be 1..={MAX_ROOM_NUMBER_LEN} characters without surrounding spaces, got {number:?}"
        )));
    }
    Ok(())
}

fn validate_capacity(capacity: u32) -> Result<(), EngineError> {
    if capacity > MAX_ROOM_CAPACITY {
        return Err(EngineError::LimitExceeded("room capacity too large"));
    }
    Ok(())
}

fn validate_comment(comment: &str) -> Result<(), EngineError> {
    if comment.chars().count() > MAX_COMMENT_LEN {
        return Err(EngineError::LimitExceeded("comment too long"));
    }
    Ok(())
}

impl Engine {
    // ── Room registry ────────────────────────────────────────

    pub async fn create_room(&self, number: String, capacity: u32) -> Result<(), EngineError> {
        validate_room_number(&number)?;
        validate_capacity(capacity)?;
        let _gate = self.commit_gate.read().await;
        let _registry = self.registry.lock().await;
        if self.rooms.len() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if self.rooms.contains_key(&number) {
            return Err(EngineError::AlreadyExists(format!("room {number}")));
        }

        let event = Event::RoomCreated {
            number: number.clone(),
            capacity,
        };
        self.wal_append(&event).await?;
        let rs = RoomState::new(number.clone(), capacity);
        self.rooms.insert(number, Arc::new(RwLock::new(rs)));
        self.notify.send(&event);
        metrics::gauge!(crate::observability::ROOMS_TOTAL).set(self.rooms.len() as f64);
        Ok(())
    }

    pub async fn update_room(&self, number: &str, capacity: u32) -> Result<(), EngineError> {
        validate_capacity(capacity)?;
        let _gate = self.commit_gate.read().await;
        let mut guard = self.lock_room(number).await?;
        if guard.capacity == capacity {
            return Ok(());
        }
        let event = Event::RoomUpdated {
            number: number.to_string(),
            capacity,
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Remove a room together with its weekly slots and bookings. Usage
    /// reports that name it are kept.
    pub async fn delete_room(&self, number: &str) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        let _registry = self.registry.lock().await;
        let _guard = self.lock_room(number).await?;

        let event = Event::RoomDeleted {
            number: number.to_string(),
        };
        self.wal_append(&event).await?;
        self.rooms.remove(number);
        self.notify.send(&event);
        metrics::gauge!(crate::observability::ROOMS_TOTAL).set(self.rooms.len() as f64);
        Ok(())
    }

    // ── Weekly schedule ──────────────────────────────────────

    /// Empty (or blank) comment clears the slot; anything else creates or
    /// replaces it. Re-submitting the current comment journals nothing.
    pub async fn set_recurring_comment(
        &self,
        day: DayOfWeek,
        period: Period,
        room: &str,
        comment: &str,
    ) -> Result<Change, EngineError> {
        let comment = comment.trim();
        validate_comment(comment)?;
        let _gate = self.commit_gate.read().await;
        let mut guard = self.lock_room(room).await?;
        self.upsert_slot(&mut guard, day, period, comment).await
    }

    async fn upsert_slot(
        &self,
        rs: &mut RoomState,
        day: DayOfWeek,
        period: Period,
        comment: &str,
    ) -> Result<Change, EngineError> {
        let room = rs.number.clone();
        let (event, change) = match (rs.recurring_comment(day, period), comment.is_empty()) {
            (None, true) => return Ok(Change::Unchanged),
            (Some(current), false) if current == comment => return Ok(Change::Unchanged),
            (Some(_), true) => (Event::SlotCleared { room, day, period }, Change::Cleared),
            (existing, false) => {
                let change = if existing.is_some() {
                    Change::Updated
                } else {
                    Change::Created
                };
                let event = Event::SlotSet {
                    room,
                    day,
                    period,
                    comment: comment.to_string(),
                };
                (event, change)
            }
        };
        self.persist_and_apply(rs, &event).await?;
        Ok(change)
    }

    /// Apply one weekday of the admin grid.
    ///
    /// `columns[p - 1]` holds the comments for period `p`, one per room in
    /// room-number order. Comments past the last room are ignored and rooms
    /// past the end of a short column are left as they are.
    pub async fn submit_grid_day(
        &self,
        day: DayOfWeek,
        columns: &[Vec<String>],
    ) -> Result<GridUpdateSummary, EngineError> {
        if columns.len() > usize::from(Period::COUNT) {
            return Err(EngineError::InvalidInput(format!(
                "expected at most {} period columns, got {}",
                Period::COUNT,
                columns.len()
            )));
        }
        for comment in columns.iter().flatten() {
            validate_comment(comment.trim())?;
        }

        let _gate = self.commit_gate.read().await;
        let rooms = self.sorted_rooms();
        let mut summary = GridUpdateSummary::default();
        for (period, column) in Period::all().zip(columns) {
            for (comment, rs) in column.iter().zip(&rooms) {
                let mut guard = rs.write().await;
                if !self.is_current(&guard.number, rs) {
                    continue;
                }
                let change = self.upsert_slot(&mut guard, day, period, comment.trim()).await?;
                summary.record(change);
            }
        }
        info!(
            day = day.get(),
            created = summary.created,
            updated = summary.updated,
            cleared = summary.cleared,
            "weekly grid updated"
        );
        Ok(summary)
    }

    // ── Temporary bookings ───────────────────────────────────

    /// Book `room` for one period on `date`, replacing the group size of an
    /// existing booking.
    pub async fn add_temporary_booking(
        &self,
        room: &str,
        date: NaiveDate,
        period: Period,
        reserved_by: u32,
    ) -> Result<Change, EngineError> {
        if reserved_by > MAX_RESERVED_BY {
            return Err(EngineError::LimitExceeded("reserved_by too large"));
        }
        let _gate = self.commit_gate.read().await;
        let mut guard = self.lock_room(room).await?;
        let change = match guard.booking(date, period) {
            Some(current) if current == reserved_by => return Ok(Change::Unchanged),
            Some(_) => Change::Updated,
            None => Change::Created,
        };
        let event = Event::BookingAdded {
            room: room.to_string(),
            date,
            period,
            reserved_by,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(change)
    }

    pub async fn cancel_temporary_booking(
        &self,
        room: &str,
        date: NaiveDate,
        period: Period,
    ) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        let mut guard = self.lock_room(room).await?;
        if guard.booking(date, period).is_none() {
            return Err(EngineError::NotFound(format!(
                "booking of {room} on {date} period {period}"
            )));
        }
        let event = Event::BookingRemoved {
            room: room.to_string(),
            date,
            period,
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Turn calendar-export rows into bookings, numbering them from 1.
    pub async fn import_bookings(&self, rows: &[ImportRow]) -> Result<ImportReport, EngineError> {
        let rows = rows
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, row)| (i + 1, row))
            .collect();
        self.import_pasted(PastedImport {
            rows,
            rejected: Vec::new(),
        })
        .await
    }

    /// Turn numbered calendar-export rows into bookings.
    ///
    /// Processing stops at the first row with a blank room label; lines the
    /// text parser already rejected past that point are dropped too. Each
    /// remaining row is parsed into a room, a date and a run of periods; a
    /// booking is created for every period that has none yet. Rows that fail
    /// to parse or name an unknown room are rejected on their own.
    pub async fn import_pasted(&self, pasted: PastedImport) -> Result<ImportReport, EngineError> {
        let PastedImport { rows, rejected } = pasted;
        if rows.is_empty() && rejected.is_empty() {
            return Err(EngineError::InvalidInput("no rows".into()));
        }
        if rows.len() + rejected.len() > MAX_IMPORT_ROWS {
            return Err(EngineError::LimitExceeded("too many import rows"));
        }

        let kept = rows_until_blank(&rows);
        let stop = rows.get(kept.len()).map(|(line, _)| *line);
        let mut report = ImportReport {
            rejected: rejected
                .into_iter()
                .filter(|r| stop.is_none_or(|stop| r.line < stop))
                .collect(),
            ..ImportReport::default()
        };
        report.rows_read = report.rejected.len();

        let _gate = self.commit_gate.read().await;
        for (line, row) in kept {
            let line = *line;
            report.rows_read += 1;
            let parsed = match parse_row(row) {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!("import line {line} rejected: {e}");
                    report.rejected.push(RejectedRow {
                        line,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            let Ok(mut guard) = self.lock_room(&parsed.room).await else {
                report.rejected.push(RejectedRow {
                    line,
                    reason: format!("unknown room {}", parsed.room),
                });
                continue;
            };

            for period in parsed.periods {
                if guard.booking(parsed.date, period).is_some() {
                    report.already_present += 1;
                    continue;
                }
                let event = Event::BookingAdded {
                    room: parsed.room.clone(),
                    date: parsed.date,
                    period,
                    reserved_by: 0,
                };
                self.persist_and_apply(&mut guard, &event).await?;
                report.created += 1;
            }
        }
        report.rejected.sort_by_key(|r| r.line);

        let rejected = report.rejected.len();
        metrics::counter!(crate::observability::IMPORT_ROWS_TOTAL, "outcome" => "accepted")
            .increment((report.rows_read - rejected) as u64);
        metrics::counter!(crate::observability::IMPORT_ROWS_TOTAL, "outcome" => "rejected")
            .increment(rejected as u64);
        info!(
            rows = report.rows_read,
            created = report.created,
            already_present = report.already_present,
            rejected,
            "bookings imported"
        );
        Ok(report)
    }

    /// Drop every booking dated before `cutoff`. Returns how many went.
    pub async fn purge_bookings_before(&self, cutoff: NaiveDate) -> Result<usize, EngineError> {
        let _gate = self.commit_gate.read().await;
        let mut purged = 0;
        for rs in self.sorted_rooms() {
            let mut guard = rs.write().await;
            if !self.is_current(&guard.number, &rs) {
                continue;
            }
            for (date, period) in guard.bookings_before(cutoff) {
                let event = Event::BookingRemoved {
                    room: guard.number.clone(),
                    date,
                    period,
                };
                self.persist_and_apply(&mut guard, &event).await?;
                purged += 1;
            }
        }
        Ok(purged)
    }

    // ── Usage log ────────────────────────────────────────────

    pub async fn submit_report(
        &self,
        submission: ReportSubmission,
        date: NaiveDate,
    ) -> Result<UsageReport, EngineError> {
        let student = submission.student.trim();
        let len = student.chars().count();
        if len == 0 || len > MAX_STUDENT_NUMBER_LEN {
            return Err(EngineError::InvalidInput(format!(
                "student number must be 1..={MAX_STUDENT_NUMBER_LEN} characters"
            )));
        }
        if submission.occupancy > MAX_OCCUPANCY {
            return Err(EngineError::LimitExceeded("occupancy too large"));
        }

        let _gate = self.commit_gate.read().await;
        self.room_or_not_found(&submission.room)?;
        let mut reports = self.reports.write().await;
        if reports.len() >= MAX_REPORTS {
            return Err(EngineError::LimitExceeded("too many usage reports"));
        }

        let report = UsageReport {
            id: ulid::Ulid::new(),
            student: student.to_string(),
            room: submission.room,
            period: submission.period,
            date,
            occupancy: submission.occupancy,
            noise: submission.noise,
        };
        let event = Event::ReportSubmitted {
            report: report.clone(),
        };
        self.wal_append(&event).await?;
        reports.push(report.clone());
        self.notify.send(&event);
        Ok(report)
    }

    // ── Journal maintenance ──────────────────────────────────

    /// Rewrite the journal as the minimal event list that rebuilds the
    /// current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.commit_gate.write().await;
        let mut events = Vec::new();
        for rs in self.sorted_rooms() {
            let guard = rs.read().await;
            let room = guard.number.clone();
            events.push(Event::RoomCreated {
                number: room.clone(),
                capacity: guard.capacity,
            });
            for ((day, period), comment) in &guard.recurring {
                events.push(Event::SlotSet {
                    room: room.clone(),
                    day: *day,
                    period: *period,
                    comment: comment.clone(),
                });
            }
            for ((date, period), reserved_by) in &guard.temporary {
                events.push(Event::BookingAdded {
                    room: room.clone(),
                    date: *date,
                    period: *period,
                    reserved_by: *reserved_by,
                });
            }
        }
        for report in self.reports.read().await.iter() {
            events.push(Event::ReportSubmitted {
                report: report.clone(),
            });
        }

        let kept = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        info!(events = kept, "journal compacted");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
