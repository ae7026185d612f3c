//! Slot/page memory management unit.
//!
//! The CPU's 64KB address space is four 16KB pages, each resolved through a
//! primary (and, on expanded slots, secondary) slot select to a bank of
//! 8KB data blocks. MegaROM cartridges re-aim their blocks through the
//! mapper control writes; DISK/FM BIOS pages carry pass-through windows to
//! the floppy controller and FM chip.
//!
//! Unlike the hardware, the unit owns every byte it serves: installed ROM
//! images are copied into internal buffers and blocks reference them by
//! index, so a savestate stores bank numbers and a restore simply re-runs
//! bank switchover.

use derivative::Derivative;
use serde::{Deserialize, Serialize};

use crate::mapper::{BankTable, CartridgeWrite, MapperKind};
use crate::savestate::{ByteReader, ByteWriter};

pub const BLOCK_SIZE: usize = 0x2000;
pub const RAM_SIZE: usize = 0x10000;
pub const SRAM_SIZE: usize = 0x2000;
pub const PAC_SIZE: usize = 0x2000;

/// Pass-through targets reachable from mapped memory. The machine implements
/// this over its peripheral set; tests can use [`NoHooks`].
pub trait SlotHooks {
    fn scc_read(&mut self, addr: u16) -> u8;
    fn scc_write(&mut self, addr: u16, value: u8);
    fn disk_read(&mut self, addr: u16) -> u8;
    fn disk_write(&mut self, addr: u16, value: u8);
    fn fm_write(&mut self, addr: u16, value: u8);
}

/// Hooks for a machine with none of the optional hardware present.
pub struct NoHooks;

impl SlotHooks for NoHooks {
    fn scc_read(&mut self, _addr: u16) -> u8 {
        0xff
    }
    fn scc_write(&mut self, _addr: u16, _value: u8) {}
    fn disk_read(&mut self, _addr: u16) -> u8 {
        0xff
    }
    fn disk_write(&mut self, _addr: u16, _value: u8) {}
    fn fm_write(&mut self, _addr: u16, _value: u8) {}
}

/// What backs one 8KB block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockContent {
    Empty,
    /// Offset into main RAM.
    Ram(usize),
    /// Installed ROM image index and offset within it.
    Rom(usize, usize),
    /// Offset into the cartridge image; re-aimed by bank switchover.
    Cartridge(usize),
    /// Cartridge SRAM overlay.
    Sram,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataBlock8 {
    pub label: String,
    pub content: BlockContent,
    pub is_ram: bool,
    pub is_cartridge: bool,
    pub is_disk_bios: bool,
    pub is_fm_bios: bool,
}

impl Default for DataBlock8 {
    fn default() -> Self {
        Self {
            label: String::new(),
            content: BlockContent::Empty,
            is_ram: false,
            is_cartridge: false,
            is_disk_bios: false,
            is_fm_bios: false,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
struct PageSlotState {
    pri: u8,
    sec: u8,
    reg: u8,
}

/// Savestated register state. Bank positions live here as indices; pointers
/// are re-derived by `bank_switchover`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MmuContext {
    pslot: [PageSlotState; 4],
    pri: [u8; 4],
    sec: [u8; 4],
    /// Memory-mapper extension registers (ports 0xFC..0xFF). Stored and
    /// savestated; the 64KB main RAM model does not re-segment.
    pub mmap: [u8; 4],
    /// Bank tables for the two cartridge-capable primary slots (1 and 2).
    pub bank: [BankTable; 2],
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct Mmu {
    pub ctx: MmuContext,
    secondary_exist: [bool; 4],
    #[derivative(Debug = "ignore")]
    slots: Vec<DataBlock8>, // 4 * 4 * 8, indexed [pri][sec][block]
    #[derivative(Debug = "ignore")]
    ram: Vec<u8>,
    #[derivative(Debug = "ignore")]
    sram: Vec<u8>,
    #[derivative(Debug = "ignore")]
    pac: Vec<u8>,
    #[derivative(Debug = "ignore")]
    images: Vec<Vec<u8>>,
    #[derivative(Debug = "ignore")]
    cartridge: Vec<u8>,
    pub cartridge_kind: Option<MapperKind>,
    pub scc_enabled: bool,
    pub sram_enabled: bool,
}

fn slot_index(pri: usize, sec: usize, idx: usize) -> usize {
    (pri * 4 + sec) * 8 + idx
}

impl Mmu {
    pub fn new() -> Self {
        Self {
            ctx: MmuContext::default(),
            secondary_exist: [false; 4],
            slots: vec![DataBlock8::default(); 4 * 4 * 8],
            ram: vec![0; RAM_SIZE],
            sram: vec![0; SRAM_SIZE],
            pac: vec![0; PAC_SIZE],
            images: Vec::new(),
            cartridge: Vec::new(),
            cartridge_kind: None,
            scc_enabled: false,
            sram_enabled: false,
        }
    }

    pub fn setup_secondary_exist(&mut self, exist: [bool; 4]) {
        self.secondary_exist = exist;
    }

    pub fn reset(&mut self) {
        self.ctx = MmuContext::default();
        self.ram.fill(0);
        self.ctx.mmap = [3, 2, 1, 0];
        if let Some(kind) = self.cartridge_kind {
            let table = if kind == MapperKind::Normal && self.cartridge.len() <= 0x4000 {
                BankTable::mirrored_16k()
            } else {
                BankTable::initial(kind)
            };
            self.ctx.bank = [table, table];
        } else {
            self.ctx.bank = [BankTable::initial(MapperKind::Normal); 2];
        }
        self.bank_switchover();
    }

    /// Install consecutive 8KB blocks of `data` at slot (pri, sec), starting
    /// at block `idx`. The image is copied; short tails are padded with 0xFF.
    /// "DISK" and "FM" labels mark the pass-through BIOS windows.
    pub fn setup(&mut self, pri: usize, sec: usize, idx: usize, data: &[u8], label: &str) {
        if pri > 3 || sec > 3 || idx > 7 || data.is_empty() {
            tracing::warn!("ignored setup of slot {}-{} block {}", pri, sec, idx);
            return;
        }
        tracing::info!(
            "setup slot {}-{} ${:04X}~${:04X} = {}",
            pri,
            sec,
            idx * BLOCK_SIZE,
            (idx * BLOCK_SIZE + data.len()).min(0x10000) - 1,
            label
        );
        let blocks = data.len().div_ceil(BLOCK_SIZE);
        let mut image = data.to_vec();
        image.resize(blocks * BLOCK_SIZE, 0xff);
        let image_index = self.images.len();
        self.images.push(image);
        for k in 0..blocks {
            if idx + k > 7 {
                break;
            }
            let block = &mut self.slots[slot_index(pri, sec, idx + k)];
            block.label = label.chars().take(4).collect();
            block.is_ram = false;
            block.is_cartridge = false;
            block.is_disk_bios = label == "DISK";
            block.is_fm_bios = label == "FM";
            block.content = BlockContent::Rom(image_index, k * BLOCK_SIZE);
        }
        self.bank_switchover();
    }

    /// Map the whole 64KB of slot (pri, sec) to main RAM.
    pub fn setup_ram(&mut self, pri: usize, sec: usize) {
        if pri > 3 || sec > 3 {
            return;
        }
        tracing::info!("setup slot {}-{} $0000~$FFFF = RAM", pri, sec);
        for i in 0..8 {
            let block = &mut self.slots[slot_index(pri, sec, i)];
            block.label = "RAM".into();
            block.is_ram = true;
            block.is_cartridge = false;
            block.is_disk_bios = false;
            block.is_fm_bios = false;
            block.content = BlockContent::Ram(i * BLOCK_SIZE);
        }
    }

    /// Install a cartridge image with its mapper. A 16KB image is mirrored
    /// into the upper window pair the way unbanked boards wire it.
    pub fn setup_cartridge(&mut self, pri: usize, sec: usize, idx: usize, data: &[u8], kind: MapperKind) {
        if pri == 0 || pri > 3 || sec > 3 || idx > 7 || data.is_empty() {
            tracing::warn!("ignored cartridge setup at slot {}-{}", pri, sec);
            return;
        }
        self.cartridge = data.to_vec();
        self.cartridge_kind = Some(kind);
        self.scc_enabled = kind.has_scc();
        self.sram_enabled = kind.has_sram();
        if self.sram_enabled {
            self.sram.fill(0);
        }

        let window_blocks = if data.len() < 0x8000 { 2 } else { 4 };
        let mirrored = kind == MapperKind::Normal && data.len() <= 0x4000;
        let installed = if mirrored { 4 } else { window_blocks };
        for k in 0..installed {
            if idx + k > 7 {
                break;
            }
            let block = &mut self.slots[slot_index(pri, sec, idx + k)];
            block.label = "CART".into();
            block.is_ram = false;
            block.is_cartridge = true;
            block.is_disk_bios = false;
            block.is_fm_bios = false;
            block.content = BlockContent::Cartridge(0);
        }
        let table = if mirrored { BankTable::mirrored_16k() } else { BankTable::initial(kind) };
        self.ctx.bank[pri - 1] = table;
        tracing::info!("cartridge installed: {} bytes, {:?}", data.len(), kind);
        self.bank_switchover();
    }

    /// Remove the cartridge and clear both cartridge-capable primary slots.
    pub fn clear_cartridge(&mut self) {
        self.cartridge.clear();
        self.cartridge_kind = None;
        self.scc_enabled = false;
        self.sram_enabled = false;
        self.ctx.bank = [BankTable::initial(MapperKind::Normal); 2];
        for pri in 1..3 {
            for idx in 0..8 {
                self.slots[slot_index(pri, 0, idx)] = DataBlock8::default();
            }
        }
    }

    /// Re-aim every cartridge block from the stored bank indices. Runs after
    /// mapper writes and after a savestate restore. Out-of-range banks wrap
    /// modulo the image.
    pub fn bank_switchover(&mut self) {
        if self.cartridge.is_empty() {
            return;
        }
        let bank_count = self.cartridge.len().div_ceil(BLOCK_SIZE).max(1);
        for pri in 1..3usize {
            for idx in 2..6usize {
                let table = self.ctx.bank[pri - 1];
                let block = &mut self.slots[slot_index(pri, 0, idx)];
                if !block.is_cartridge {
                    continue;
                }
                let window = idx - 2;
                if table.sram[window] && self.sram_enabled {
                    block.content = BlockContent::Sram;
                    block.is_ram = true;
                } else {
                    let bank = table.banks[window] as usize % bank_count;
                    block.content = BlockContent::Cartridge(bank * BLOCK_SIZE);
                    block.is_ram = false;
                }
            }
        }
    }

    /// Resolved (primary, secondary) pair for one 16KB page.
    pub fn page_slot(&self, page: usize) -> (u8, u8) {
        (self.ctx.pri[page & 3], self.ctx.sec[page & 3])
    }

    /// Packed primary-select register (port 0xA8 read).
    pub fn primary(&self) -> u8 {
        (self.ctx.pri[3] << 6) | (self.ctx.pri[2] << 4) | (self.ctx.pri[1] << 2) | self.ctx.pri[0]
    }

    /// Primary-select write: two bits per page, low bits select page 0.
    pub fn update_primary(&mut self, value: u8) {
        let mut v = value;
        for page in 0..4 {
            let pri = (v & 0b11) as usize;
            self.ctx.pslot[page].pri = pri as u8;
            self.ctx.pslot[page].sec = (self.ctx.pslot[pri].reg >> (page * 2)) & 0b11;
            let sec = if self.secondary_exist[pri] { self.ctx.pslot[page].sec } else { 0 };
            self.ctx.pri[page] = pri as u8;
            self.ctx.sec[page] = sec;
            v >>= 2;
        }
    }

    /// Secondary-select register of the primary slot visible on page 3,
    /// read back complemented (address 0xFFFF).
    pub fn secondary(&self) -> u8 {
        let pri3 = self.ctx.pslot[3].pri as usize;
        if self.secondary_exist[pri3] {
            !self.ctx.pslot[pri3].reg
        } else {
            0xff
        }
    }

    /// Secondary-select write: updates the register of the primary occupying
    /// page 3 and re-resolves every page currently mapped to that primary.
    pub fn update_secondary(&mut self, value: u8) {
        let pri = self.ctx.pslot[3].pri;
        if !self.secondary_exist[pri as usize] {
            return;
        }
        self.ctx.pslot[pri as usize].reg = value;
        let mut v = value;
        for page in 0..4 {
            if self.ctx.pslot[page].pri == pri {
                let sec = v & 0b11;
                self.ctx.pslot[page].sec = sec;
                self.ctx.pri[page] = pri;
                self.ctx.sec[page] = sec;
            }
            v >>= 2;
        }
    }

    pub fn block_at(&self, addr: u16) -> &DataBlock8 {
        let page = (addr >> 14) as usize;
        let pri = self.ctx.pri[page] as usize;
        let sec = self.ctx.sec[page] as usize;
        &self.slots[slot_index(pri, sec, (addr as usize) / BLOCK_SIZE)]
    }

    fn block_byte(&self, content: BlockContent, addr: u16) -> u8 {
        let offset = addr as usize & (BLOCK_SIZE - 1);
        match content {
            BlockContent::Empty => 0xff,
            BlockContent::Ram(base) => self.ram[base + offset],
            BlockContent::Rom(image, base) => self.images[image][base + offset],
            BlockContent::Cartridge(base) => {
                self.cartridge.get(base + offset).copied().unwrap_or(0xff)
            }
            BlockContent::Sram => self.sram[offset],
        }
    }

    fn pac_sram_enabled(&self) -> bool {
        self.pac[0x1ffe] == 0x4d && self.pac[0x1fff] == 0x69
    }

    pub fn read(&mut self, addr: u16, hooks: &mut dyn SlotHooks) -> u8 {
        if addr == 0xffff {
            return self.secondary();
        }
        let block = self.block_at(addr);
        let content = block.content;
        if block.is_disk_bios && (addr & 0x3fff) >= 0x3ff0 {
            return hooks.disk_read(addr & 0x3fff);
        }
        if block.is_fm_bios && self.pac_sram_enabled() && (addr & 0x3fff) < 0x1ffe {
            return self.pac[addr as usize & 0x1fff];
        }
        if block.is_cartridge && self.scc_enabled && (0x9800..=0x9fff).contains(&addr) {
            return hooks.scc_read(addr);
        }
        self.block_byte(content, addr)
    }

    pub fn write(&mut self, addr: u16, value: u8, hooks: &mut dyn SlotHooks) {
        if addr == 0xffff {
            self.update_secondary(value);
            return;
        }
        let page = (addr >> 14) as usize;
        let pri = self.ctx.pri[page] as usize;
        let block = self.block_at(addr);
        let content = block.content;
        let (is_ram, is_disk_bios, is_fm_bios, is_cartridge) =
            (block.is_ram, block.is_disk_bios, block.is_fm_bios, block.is_cartridge);
        if is_ram {
            let offset = addr as usize & (BLOCK_SIZE - 1);
            match content {
                BlockContent::Ram(base) => self.ram[base + offset] = value,
                BlockContent::Sram => self.sram[offset] = value,
                _ => {}
            }
        } else if is_disk_bios {
            hooks.disk_write(addr & 0x3fff, value);
        } else if is_fm_bios {
            match addr & 0x3fff {
                0x1ffe => self.pac[0x1ffe] = value,
                0x1fff => self.pac[0x1fff] = value,
                offset => {
                    if self.pac_sram_enabled() && offset < 0x2000 {
                        self.pac[offset as usize & 0x1fff] = value;
                    } else {
                        hooks.fm_write(offset, value);
                    }
                }
            }
        } else if is_cartridge {
            let Some(kind) = self.cartridge_kind else {
                return;
            };
            if pri == 0 || pri > 2 {
                return;
            }
            match kind.on_cartridge_write(self.ctx.bank[pri - 1], addr, value) {
                CartridgeWrite::Ignored => {}
                CartridgeWrite::Banks(table) => {
                    self.ctx.bank[pri - 1] = table;
                    self.bank_switchover();
                }
                CartridgeWrite::Scc { addr, value } => hooks.scc_write(addr, value),
            }
        } else {
            tracing::trace!("write to non-RAM address ${:04X} dropped", addr);
        }
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn ram_mut(&mut self) -> &mut [u8] {
        &mut self.ram
    }

    pub fn sram(&self) -> &[u8] {
        &self.sram
    }

    pub fn sram_mut(&mut self) -> &mut [u8] {
        &mut self.sram
    }

    pub fn pac(&self) -> &[u8] {
        &self.pac
    }

    pub fn pac_mut(&mut self) -> &mut [u8] {
        &mut self.pac
    }

    /// Memory-mapper extension register write (ports 0xFC..0xFF).
    pub fn update_memory_mapper(&mut self, page: usize, value: u8) {
        if page < 4 {
            self.ctx.mmap[page] = value;
        }
    }

    pub fn context_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        for p in &self.ctx.pslot {
            w.u8(p.pri);
            w.u8(p.sec);
            w.u8(p.reg);
        }
        w.bytes(&self.ctx.pri);
        w.bytes(&self.ctx.sec);
        w.bytes(&self.ctx.mmap);
        for table in &self.ctx.bank {
            w.bytes(&table.banks);
            for s in table.sram {
                w.u8(s as u8);
            }
        }
        w.into_bytes()
    }

    /// Restores register state only; the caller re-runs `bank_switchover`.
    /// Slot indices are masked so a corrupt chunk cannot address outside
    /// the 4x4 slot grid.
    pub fn restore_context(&mut self, bytes: &[u8]) {
        let mut r = ByteReader::new(bytes);
        for p in &mut self.ctx.pslot {
            p.pri = r.u8() & 3;
            p.sec = r.u8() & 3;
            p.reg = r.u8();
        }
        r.bytes(&mut self.ctx.pri);
        r.bytes(&mut self.ctx.sec);
        for v in self.ctx.pri.iter_mut().chain(self.ctx.sec.iter_mut()) {
            *v &= 3;
        }
        r.bytes(&mut self.ctx.mmap);
        for table in &mut self.ctx.bank {
            r.bytes(&mut table.banks);
            for s in &mut table.sram {
                *s = r.u8() != 0;
            }
        }
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}
