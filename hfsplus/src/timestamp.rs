//! HFS epoch conversion.
//!
//! HFS timestamps are unsigned 32-bit seconds since 1904-01-01 00:00 UTC.
//! HFS+ stores them as UTC; classic HFS stores them as local time with no
//! reliable timezone record on disk, so classic-HFS timestamps are tagged
//! `TimeKind::Local` rather than guessed at.

/// Seconds between the HFS epoch (1904-01-01) and the POSIX epoch (1970-01-01).
pub const HFS_EPOCH_OFFSET: i64 = 2_082_844_800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeKind {
    Utc,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HfsTimestamp {
    pub hfs_seconds: u32,
    pub kind: TimeKind,
}

impl HfsTimestamp {
    pub fn new(hfs_seconds: u32, kind: TimeKind) -> Self {
        HfsTimestamp { hfs_seconds, kind }
    }

    /// Convert to POSIX seconds. Valid regardless of `kind` — the caller
    /// decides whether to treat the result as UTC or as a local wall clock.
    pub fn to_posix_seconds(self) -> i64 {
        self.hfs_seconds as i64 - HFS_EPOCH_OFFSET
    }
}

/// Decode the little-endian signed 32-bit "added time" embedded in the
/// extended finder-info blob when the 0x0080 flag is set.
pub fn decode_added_time(raw_le_bytes: [u8; 4]) -> i32 {
    i32::from_le_bytes(raw_le_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_conversion_matches_known_value() {
        // 1970-01-01 00:00:00 UTC in the HFS epoch.
        let ts = HfsTimestamp::new(HFS_EPOCH_OFFSET as u32, TimeKind::Utc);
        assert_eq!(ts.to_posix_seconds(), 0);
    }
}
