use serde::Deserialize;

use crate::NOF_SYMBOLS_PER_SLOT;

/// Transmission direction of a single OFDM symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Dl,
    Ul,
    Flexible,
}

/// A single TDD UL/DL pattern (TS 38.213 11.1, tdd-UL-DL-ConfigurationCommon pattern1).
///
/// Within each period of `period_slots` slots, the first `nof_dl_slots` slots are DL,
/// followed by `nof_dl_symbols` DL symbols at the start of the next slot. The last
/// `nof_ul_slots` slots are UL, preceded by `nof_ul_symbols` UL symbols at the end of
/// the slot before them. Everything else is flexible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TddPattern {
    pub period_slots: u32,
    pub nof_dl_slots: u32,
    #[serde(default)]
    pub nof_dl_symbols: u32,
    pub nof_ul_slots: u32,
    #[serde(default)]
    pub nof_ul_symbols: u32,
}

impl TddPattern {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.period_slots == 0 {
            return Err("TDD period must be at least one slot");
        }
        if self.nof_dl_symbols >= NOF_SYMBOLS_PER_SLOT || self.nof_ul_symbols >= NOF_SYMBOLS_PER_SLOT {
            return Err("partial slot symbol count must be below 14");
        }
        let full_slots = self.nof_dl_slots + self.nof_ul_slots;
        if full_slots > self.period_slots {
            return Err("DL and UL slots exceed the TDD period");
        }
        if self.nof_dl_symbols > 0 || self.nof_ul_symbols > 0 {
            match self.period_slots - full_slots {
                0 => return Err("partial DL/UL symbols need a slot outside the full DL/UL slots"),
                1 if self.nof_dl_symbols + self.nof_ul_symbols > NOF_SYMBOLS_PER_SLOT => {
                    return Err("DL and UL symbols overlap in the special slot");
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn symbol_kind(&self, slot_idx: u32, symbol: u32) -> SymbolKind {
        let idx = slot_idx % self.period_slots;
        let first_ul_slot = self.period_slots - self.nof_ul_slots;

        if idx < self.nof_dl_slots {
            return SymbolKind::Dl;
        }
        if idx >= first_ul_slot {
            return SymbolKind::Ul;
        }
        if idx == self.nof_dl_slots && symbol < self.nof_dl_symbols {
            return SymbolKind::Dl;
        }
        if idx + 1 == first_ul_slot && symbol >= NOF_SYMBOLS_PER_SLOT - self.nof_ul_symbols {
            return SymbolKind::Ul;
        }
        SymbolKind::Flexible
    }

    fn is_dl(&self, slot_idx: u32) -> bool {
        let idx = slot_idx % self.period_slots;
        idx < self.nof_dl_slots || (idx == self.nof_dl_slots && self.nof_dl_symbols != 0)
    }

    fn is_ul(&self, slot_idx: u32) -> bool {
        let idx = slot_idx % self.period_slots;
        let first_ul_slot = self.period_slots - self.nof_ul_slots;
        idx >= first_ul_slot || (idx + 1 == first_ul_slot && self.nof_ul_symbols != 0)
    }
}

/// Static per-cell duplex descriptor. Immutable after cell bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplexConfig {
    /// Paired spectrum, every slot carries both directions
    Fdd,
    Tdd(TddPattern),
}

impl DuplexConfig {
    /// Duplex oracle: direction of `symbol` in the slot with index `slot_idx` (index within the frame)
    pub fn symbol_kind(&self, slot_idx: u32, symbol: u32) -> SymbolKind {
        debug_assert!(symbol < NOF_SYMBOLS_PER_SLOT);
        match self {
            // Paired spectrum, both directions available on their own carrier
            DuplexConfig::Fdd => SymbolKind::Flexible,
            DuplexConfig::Tdd(pattern) => pattern.symbol_kind(slot_idx, symbol),
        }
    }

    /// True if the slot holds at least one DL symbol
    pub fn is_dl(&self, slot_idx: u32) -> bool {
        match self {
            DuplexConfig::Fdd => true,
            DuplexConfig::Tdd(pattern) => pattern.is_dl(slot_idx),
        }
    }

    /// True if the slot holds at least one UL symbol
    pub fn is_ul(&self, slot_idx: u32) -> bool {
        match self {
            DuplexConfig::Fdd => true,
            DuplexConfig::Tdd(pattern) => pattern.is_ul(slot_idx),
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        match self {
            DuplexConfig::Fdd => Ok(()),
            DuplexConfig::Tdd(pattern) => pattern.validate(),
        }
    }
}
