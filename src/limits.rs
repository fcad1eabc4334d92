pub const MAX_ROOMS: usize = 2_000;
pub const MAX_ROOM_NUMBER_LEN: usize = 6;
pub const MAX_ROOM_CAPACITY: u32 = 10_000;
pub const MAX_COMMENT_LEN: usize = 255;
pub const MAX_STUDENT_NUMBER_LEN: usize = 11;
pub const MAX_OCCUPANCY: u32 = 10_000;
/// Student group size carried by a temporary booking.
pub const MAX_RESERVED_BY: u32 = 10_000;
pub const MAX_IMPORT_ROWS: usize = 5_000;
pub const MAX_IMPORT_LABEL_LEN: usize = 256;
pub const MAX_REPORTS: usize = 1_000_000;
