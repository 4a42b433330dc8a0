use core::cmp::Ordering;
use core::fmt;
use core::ops::{Add, Sub};

/// Number of system frames before the SFN wraps
pub const NOF_SFNS: u32 = 1024;

/// Number of 1 ms subframes in a radio frame
pub const NOF_SUBFRAMES_PER_FRAME: u32 = 10;

/// Highest supported numerology (240 kHz SCS)
pub const MAX_NUMEROLOGY: u8 = 4;

/// An NR slot counter, wrapping at the hyper-frame boundary (1024 frames).
///
/// The wrap depends on the numerology `mu`: a frame holds `10 << mu` slots, so
/// the counter wraps at `10240 << mu`. A SlotPoint may be invalid (never set, or
/// cleared); an invalid SlotPoint compares unequal to, and unordered against, every slot.
#[derive(Clone, Copy)]
pub struct SlotPoint {
    count: u32,
    mu: u8,
    valid: bool,
}

impl Default for SlotPoint {
    /// Returns an invalid SlotPoint
    fn default() -> SlotPoint {
        SlotPoint::invalid()
    }
}

impl SlotPoint {
    /// Builds a slot from an absolute slot count. The count is reduced modulo the wrap.
    pub fn new(mu: u8, count: u32) -> SlotPoint {
        assert!(mu <= MAX_NUMEROLOGY, "numerology {} out of range", mu);
        let wrap = Self::nof_slots_per_hf_for(mu);
        SlotPoint { count: count % wrap, mu, valid: true }
    }

    /// Builds a slot from a system frame number and a slot index within that frame
    pub fn from_sfn(mu: u8, sfn: u32, slot_idx: u32) -> SlotPoint {
        let per_frame = NOF_SUBFRAMES_PER_FRAME << mu;
        assert!(slot_idx < per_frame, "slot index {} exceeds frame of {} slots", slot_idx, per_frame);
        SlotPoint::new(mu, (sfn % NOF_SFNS) * per_frame + slot_idx)
    }

    pub const fn invalid() -> SlotPoint {
        SlotPoint { count: 0, mu: 0, valid: false }
    }

    #[inline]
    const fn nof_slots_per_hf_for(mu: u8) -> u32 {
        (NOF_SFNS * NOF_SUBFRAMES_PER_FRAME) << mu
    }

    #[inline]
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Invalidates this slot
    pub fn clear(&mut self) {
        *self = SlotPoint::invalid();
    }

    #[inline]
    pub fn numerology(&self) -> u8 {
        self.mu
    }

    /// Absolute slot count within the hyper-frame
    #[inline]
    pub fn to_uint(&self) -> u32 {
        self.count
    }

    pub fn nof_slots_per_frame(&self) -> u32 {
        NOF_SUBFRAMES_PER_FRAME << self.mu
    }

    pub fn nof_slots_per_hf(&self) -> u32 {
        Self::nof_slots_per_hf_for(self.mu)
    }

    /// Slot index within the current 10 ms frame
    #[inline]
    pub fn slot_idx(&self) -> u32 {
        self.count % self.nof_slots_per_frame()
    }

    pub fn sfn(&self) -> u32 {
        self.count / self.nof_slots_per_frame()
    }

    /// Add a (possibly negative) number of slots
    pub fn add_slots(self, nof_slots: i32) -> SlotPoint {
        debug_assert!(self.valid, "arithmetic on invalid SlotPoint");
        let wrap = self.nof_slots_per_hf() as i64;
        let count = (self.count as i64 + nof_slots as i64).rem_euclid(wrap) as u32;
        SlotPoint { count, mu: self.mu, valid: self.valid }
    }

    /// Difference between two slots, handling wrap-around. The result lies in
    /// `[-wrap/2, wrap/2)`.
    pub fn diff(self, other: SlotPoint) -> i32 {
        debug_assert!(self.mu == other.mu, "comparing slots of different numerology");
        let wrap = self.nof_slots_per_hf() as i32;
        let mut diff = self.count as i32 - other.count as i32;
        if diff < -wrap / 2 {
            diff += wrap;
        } else if diff >= wrap / 2 {
            diff -= wrap;
        }
        diff
    }
}

impl Add<u32> for SlotPoint {
    type Output = SlotPoint;
    fn add(self, rhs: u32) -> SlotPoint {
        self.add_slots(rhs as i32)
    }
}

impl Sub<u32> for SlotPoint {
    type Output = SlotPoint;
    fn sub(self, rhs: u32) -> SlotPoint {
        self.add_slots(-(rhs as i32))
    }
}

impl Sub<SlotPoint> for SlotPoint {
    type Output = i32;
    fn sub(self, rhs: SlotPoint) -> i32 {
        self.diff(rhs)
    }
}

impl PartialEq for SlotPoint {
    fn eq(&self, other: &Self) -> bool {
        self.valid && other.valid && self.mu == other.mu && self.count == other.count
    }
}

impl PartialOrd for SlotPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if !self.valid || !other.valid || self.mu != other.mu {
            return None;
        }
        Some(self.diff(*other).cmp(&0))
    }
}

impl fmt::Display for SlotPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            write!(f, "{:4}.{:02}", self.sfn(), self.slot_idx())
        } else {
            write!(f, "----.--")
        }
    }
}

impl fmt::Debug for SlotPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
