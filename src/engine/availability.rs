use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::model::*;

// ── Availability rule ─────────────────────────────────────────────

/// Whether `room` can be used on `date` during `period`.
///
/// Two independent sources reserve a room: the weekly schedule, keyed by the
/// weekday of `date`, and date-specific temporary bookings. The room is free
/// only when neither has an entry; when both do, the weekly slot is reported.
pub fn occupancy(room: &RoomState, date: NaiveDate, period: Period) -> Occupancy {
    if let Some(comment) = room.recurring_comment(DayOfWeek::of(date), period) {
        return Occupancy::Recurring {
            comment: comment.to_string(),
        };
    }
    match room.booking(date, period) {
        Some(reserved_by) => Occupancy::Temporary { reserved_by },
        None => Occupancy::Free,
    }
}

pub fn room_status(room: &RoomState, date: NaiveDate, period: Period) -> RoomStatus {
    RoomStatus {
        number: room.number.clone(),
        capacity: room.capacity,
        floor: floor_of(&room.number),
        occupancy: occupancy(room, date, period),
    }
}

// ── Floor grouping ────────────────────────────────────────────────

const HALL_FLOOR: u8 = 3;
const DEFAULT_FLOOR: u8 = 2;

/// Floor a room sits on, read from its number: `F<d>` names floor `d`
/// (`F301` → 3), a hall (`H…`) is on floor 3, anything else on floor 2.
pub fn floor_of(number: &str) -> u8 {
    let chars: Vec<char> = number.chars().collect();
    let marked = chars
        .windows(2)
        .find(|w| w[0] == 'F' && w[1].is_ascii_digit())
        .and_then(|w| w[1].to_digit(10));
    match marked {
        Some(d) => d as u8,
        None if number.contains('H') => HALL_FLOOR,
        None => DEFAULT_FLOOR,
    }
}

/// Bucket statuses by floor, floors ascending and rooms by number.
pub fn group_by_floor(statuses: Vec<RoomStatus>) -> Vec<FloorGroup> {
    let mut floors: BTreeMap<u8, Vec<RoomStatus>> = BTreeMap::new();
    for status in statuses {
        floors.entry(status.floor).or_default().push(status);
    }
    floors
        .into_iter()
        .map(|(floor, mut rooms)| {
            rooms.sort_by(|a, b| a.number.cmp(&b.number));
            FloorGroup { floor, rooms }
        })
        .collect()
}
