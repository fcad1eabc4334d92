use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::model::*;

use super::availability::{group_by_floor, room_status};
use super::{Engine, SharedRoomState};

impl Engine {
    /// Room handles in room-number order.
    pub(super) fn sorted_rooms(&self) -> Vec<SharedRoomState> {
        let mut rooms: Vec<(String, SharedRoomState)> = self
            .rooms
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        rooms.sort_by(|a, b| a.0.cmp(&b.0));
        rooms.into_iter().map(|(_, rs)| rs).collect()
    }

    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut out = Vec::with_capacity(self.rooms.len());
        for rs in self.sorted_rooms() {
            out.push(rs.read().await.info());
        }
        out
    }

    pub async fn room_info(&self, number: &str) -> Option<RoomInfo> {
        let rs = self.get_room(number)?;
        let guard = rs.read().await;
        Some(guard.info())
    }

    // ── Availability ─────────────────────────────────────────

    /// Every room's state for one period on `date`, in room-number order.
    pub async fn room_statuses(&self, date: NaiveDate, period: Period) -> Vec<RoomStatus> {
        let mut out = Vec::with_capacity(self.rooms.len());
        for rs in self.sorted_rooms() {
            out.push(room_status(&*rs.read().await, date, period));
        }
        out
    }

    /// All rooms minus those reserved by the weekly schedule or a booking.
    pub async fn free_rooms(&self, date: NaiveDate, period: Period) -> Vec<String> {
        self.room_statuses(date, period)
            .await
            .into_iter()
            .filter(|s| s.occupancy.is_free())
            .map(|s| s.number)
            .collect()
    }

    pub async fn availability_board(&self, date: NaiveDate, period: Period) -> Vec<FloorGroup> {
        group_by_floor(self.room_statuses(date, period).await)
    }

    /// Boards for all six periods of `date`.
    pub async fn day_board(&self, date: NaiveDate) -> Vec<PeriodBoard> {
        let mut boards = Vec::with_capacity(usize::from(Period::COUNT));
        for period in Period::all() {
            boards.push(PeriodBoard {
                period,
                floors: self.availability_board(date, period).await,
            });
        }
        boards
    }

    // ── Weekly schedule ──────────────────────────────────────

    /// The admin grid: per room, a 7×6 matrix of comments.
    pub async fn recurring_grid(&self) -> Vec<GridRow> {
        let mut rows = Vec::with_capacity(self.rooms.len());
        for rs in self.sorted_rooms() {
            let guard = rs.read().await;
            let mut comments =
                vec![vec![String::new(); usize::from(Period::COUNT)]; usize::from(DayOfWeek::COUNT)];
            for ((day, period), comment) in &guard.recurring {
                comments[day.index()][period.index()] = comment.clone();
            }
            rows.push(GridRow {
                room: guard.number.clone(),
                capacity: guard.capacity,
                comments,
            });
        }
        rows
    }

    pub async fn recurring_slots(&self, day: Option<DayOfWeek>) -> Vec<RecurringSlot> {
        let mut slots = Vec::new();
        for rs in self.sorted_rooms() {
            let guard = rs.read().await;
            slots.extend(
                guard
                    .recurring
                    .iter()
                    .filter(|((d, _), _)| day.is_none_or(|want| *d == want))
                    .map(|((d, p), comment)| RecurringSlot {
                        day: *d,
                        period: *p,
                        room: guard.number.clone(),
                        comment: comment.clone(),
                    }),
            );
        }
        slots.sort_by_key(|s| (s.day, s.period));
        slots
    }

    // ── Temporary bookings ───────────────────────────────────

    /// Bookings ordered by date, period, then room.
    pub async fn temporary_bookings(
        &self,
        date: Option<NaiveDate>,
        room: Option<&str>,
    ) -> Vec<TemporaryBooking> {
        let rooms = match room {
            Some(number) => self.get_room(number).into_iter().collect(),
            None => self.sorted_rooms(),
        };
        let mut out = Vec::new();
        for rs in rooms {
            let guard = rs.read().await;
            let to_booking = |on: NaiveDate, period: Period, reserved_by: u32| TemporaryBooking {
                room: guard.number.clone(),
                period,
                date: on,
                reserved_by,
            };
            match date {
                Some(d) => out.extend(guard.bookings_on(d).map(|(p, r)| to_booking(d, p, r))),
                None => out.extend(
                    guard
                        .temporary
                        .iter()
                        .map(|((d, p), r)| to_booking(*d, *p, *r)),
                ),
            }
        }
        out.sort_by(|a, b| (a.date, a.period, &a.room).cmp(&(b.date, b.period, &b.room)));
        out
    }

    // ── Usage log ────────────────────────────────────────────

    /// Reports in submission order.
    pub async fn usage_reports(
        &self,
        room: Option<&str>,
        date: Option<NaiveDate>,
    ) -> Vec<UsageReport> {
        self.reports
            .read()
            .await
            .iter()
            .filter(|r| room.is_none_or(|want| r.room == want))
            .filter(|r| date.is_none_or(|want| r.date == want))
            .cloned()
            .collect()
    }

    /// Per-room report count and mean occupancy / noise, by room number.
    /// The mean noise is also given as the label of its nearest level.
    pub async fn usage_summary(&self) -> Vec<UsageSummary> {
        let mut totals: BTreeMap<String, (usize, u64, u64)> = BTreeMap::new();
        for report in self.reports.read().await.iter() {
            let entry = totals.entry(report.room.clone()).or_default();
            entry.0 += 1;
            entry.1 += u64::from(report.occupancy);
            entry.2 += u64::from(u8::from(report.noise));
        }
        totals
            .into_iter()
            .map(|(room, (n, occupancy, noise))| {
                let mean_noise = noise as f64 / n as f64;
                let noise_label = NoiseLevel::new(mean_noise.round() as u8)
                    .map(NoiseLevel::label)
                    .unwrap_or_default()
                    .to_string();
                UsageSummary {
                    room,
                    reports: n,
                    mean_occupancy: occupancy as f64 / n as f64,
                    mean_noise,
                    noise_label,
                }
            })
            .collect()
    }
}
