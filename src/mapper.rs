//! MegaROM mapper emulation.
//!
//! Oversized cartridge images expose 8KB banks through four visible windows
//! at 0x4000-0xBFFF; writes into mapper-specific control ranges re-aim the
//! windows. Each supported mapper is a variant with one pure control-write
//! handler, so the generic memory write path stays free of address-range
//! special cases.

use serde::{Deserialize, Serialize};

/// Bank selection state for one cartridge slot: the 8KB bank index backing
/// each window, plus per-window SRAM overlay flags for the +SRAM mappers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTable {
    pub banks: [u8; 4],
    pub sram: [bool; 4],
}

impl BankTable {
    /// Window order at power-on: identity for unbanked and Konami images,
    /// bank 0 everywhere for the switched mappers.
    pub fn initial(kind: MapperKind) -> Self {
        let banks = match kind {
            MapperKind::Normal | MapperKind::Konami => [0, 1, 2, 3],
            _ => [0, 0, 0, 0],
        };
        Self { banks, sram: [false; 4] }
    }

    /// A 16KB image mirrors its two banks into the upper window pair.
    pub fn mirrored_16k() -> Self {
        Self { banks: [0, 1, 0, 1], sram: [false; 4] }
    }
}

/// Outcome of a write landing in a cartridge block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartridgeWrite {
    /// Not a control address; the write is dropped (ROM semantics).
    Ignored,
    /// Bank table changed; the caller re-runs bank switchover.
    Banks(BankTable),
    /// The address belongs to the wavetable chip, not the mapper.
    Scc { addr: u16, value: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapperKind {
    Normal,
    Ascii8,
    Ascii8Sram,
    Ascii16,
    Ascii16Sram,
    Konami,
    KonamiScc,
}

impl MapperKind {
    pub fn has_sram(&self) -> bool {
        matches!(self, MapperKind::Ascii8Sram | MapperKind::Ascii16Sram)
    }

    pub fn has_scc(&self) -> bool {
        matches!(self, MapperKind::KonamiScc)
    }

    /// Apply a CPU write at `addr` (absolute, inside 0x4000-0xBFFF) to the
    /// current bank table.
    pub fn on_cartridge_write(&self, table: BankTable, addr: u16, value: u8) -> CartridgeWrite {
        match self {
            MapperKind::Normal => CartridgeWrite::Ignored,
            MapperKind::Ascii8 => ascii8(table, addr, value),
            MapperKind::Ascii8Sram => {
                let mut table = table;
                // any control write refreshes the SRAM overlay at 0x8000
                table.sram[2] = value & 0xf0 != 0;
                match ascii8(table, addr, value & 0x0f) {
                    CartridgeWrite::Ignored => CartridgeWrite::Banks(table),
                    other => other,
                }
            }
            MapperKind::Ascii16 => ascii16(table, addr, value),
            MapperKind::Ascii16Sram => {
                let mut table = table;
                table.sram[2] = value & 0x10 != 0;
                match ascii16(table, addr, value & 0x0f) {
                    CartridgeWrite::Ignored => CartridgeWrite::Banks(table),
                    other => other,
                }
            }
            MapperKind::Konami => konami(table, addr, value),
            MapperKind::KonamiScc => konami_scc(table, addr, value),
        }
    }
}

fn ascii8(mut table: BankTable, addr: u16, value: u8) -> CartridgeWrite {
    let window = match addr {
        0x6000..=0x67ff => 0,
        0x6800..=0x6fff => 1,
        0x7000..=0x77ff => 2,
        0x7800..=0x7fff => 3,
        _ => return CartridgeWrite::Ignored,
    };
    table.banks[window] = value;
    CartridgeWrite::Banks(table)
}

fn ascii16(mut table: BankTable, addr: u16, value: u8) -> CartridgeWrite {
    // a write selects a 16KB pair (2n, 2n+1)
    let window = match addr {
        0x6000..=0x67ff => 0,
        0x7000..=0x77ff => 2,
        _ => return CartridgeWrite::Ignored,
    };
    table.banks[window] = value.wrapping_mul(2);
    table.banks[window + 1] = value.wrapping_mul(2).wrapping_add(1);
    CartridgeWrite::Banks(table)
}

fn konami(mut table: BankTable, addr: u16, value: u8) -> CartridgeWrite {
    // window 0 (0x4000) is fixed on this mapper
    let window = match addr {
        0x6000..=0x6fff => 1,
        0x8000..=0x9fff => 2,
        0xa000..=0xbfff => 3,
        _ => return CartridgeWrite::Ignored,
    };
    table.banks[window] = value;
    CartridgeWrite::Banks(table)
}

fn konami_scc(mut table: BankTable, addr: u16, value: u8) -> CartridgeWrite {
    let window = match addr {
        0x5000..=0x5fff => 0,
        0x7000..=0x7fff => 1,
        0x9000..=0x97ff => 2,
        0x9800..=0x9fff => return CartridgeWrite::Scc { addr, value },
        0xb000..=0xbfff => 3,
        _ => return CartridgeWrite::Ignored,
    };
    table.banks[window] = value;
    CartridgeWrite::Banks(table)
}
