/// Longest bookable / priceable stay.
pub const MAX_STAY_NIGHTS: u32 = 365;

/// Widest window `search_available` will scan.
pub const MAX_SEARCH_NIGHTS: u32 = 90;

pub const MAX_ROOMS: usize = 10_000;
pub const MAX_BOOKINGS_PER_ROOM: usize = 50_000;
pub const MAX_KEYS_PER_BOOKING: usize = 8;

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_ROOM_NUMBER_LEN: usize = 16;
pub const MAX_NOTES_LEN: usize = 500;
pub const MAX_PARTY_SIZE: u32 = 50;
pub const MAX_ROOM_CAPACITY: u32 = 12;
