//! Machine orchestrator.
//!
//! Owns one of every component, the 256-entry I/O port dispatch, the
//! fractional-clock fan-out that keeps the sound, video and RTC domains in
//! sync with the CPU, and the tagged-chunk savestate codec. The CPU
//! interpreter itself is external: the board implements [`CpuBus`] and the
//! machine drives any [`Cpu`] one instruction at a time until the VDP
//! reports the end of a frame.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;

use crate::cpu::{Cpu, CpuBus};
use crate::error::MachineError;
use crate::fdc::FloppyController;
use crate::kanji::Kanji;
use crate::keyboard::{self, KeyAssign, KEY_CODES};
use crate::mapper::MapperKind;
use crate::mmu::{Mmu, SlotHooks};
use crate::rtc::Rtc;
use crate::savestate::{ByteReader, ByteWriter, ChunkIter, ChunkWriter, PassthroughCodec, SnapshotCodec};
use crate::sound::{NullSound, SoundChip};
use crate::vdp::{ColorMode, ScanlineCallback, Vdp, VdpRevision, VdpSignal};

pub const CPU_CLOCK: u32 = 3_584_160;
pub const VDP_CLOCK: u32 = 21_504_960;
pub const PSG_CLOCK: u32 = 44_100;

/// Interleaved i16 ring; power of two so the cursor can wrap with a mask.
const SOUND_BUFFER_SAMPLES: usize = 16384;

/// Upper bound on one burst, in case an interpreter never consumes clock.
const MAX_BURST_INSTRUCTIONS: u32 = 4_000_000;

const TAG_BRD: [u8; 4] = *b"BRD\0";
const TAG_CPU: [u8; 4] = *b"Z80\0";
const TAG_MMU: [u8; 4] = *b"MMU\0";
const TAG_PAC: [u8; 4] = *b"PAC\0";
const TAG_RAM: [u8; 4] = *b"R:0\0";
const TAG_SRAM: [u8; 4] = *b"SRM\0";
const TAG_SCC: [u8; 4] = *b"SCC\0";
const TAG_PSG: [u8; 4] = *b"PSG\0";
const TAG_RTC: [u8; 4] = *b"RTC\0";
const TAG_KANJI: [u8; 4] = *b"KNJ\0";
const TAG_VDP: [u8; 4] = *b"VDP\0";
const TAG_FDC: [u8; 4] = *b"FDC\0";
const TAG_FDC_JOURNAL_COUNT: [u8; 4] = *b"JCT\0";
const TAG_FDC_JOURNAL_DATA: [u8; 4] = *b"JDT\0";
const TAG_OPLL: [u8; 4] = *b"OPL\0";

#[derive(Debug, Clone, Copy)]
enum IrqEvent {
    Request,
    Cancel,
}

/// Latched per-tick input and PPI-visible state, savestated as one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineContext {
    #[serde(with = "BigArray")]
    pub io: [u8; 256],
    pub key: u8,
    pub reg_c: u8,
    pub selected_key_row: u8,
}

impl Default for MachineContext {
    fn default() -> Self {
        Self { io: [0; 256], key: 0, reg_c: 0x50, selected_key_row: 0 }
    }
}

/// Everything on the bus side of the CPU. Implements [`CpuBus`]; the CPU
/// interpreter reaches memory, ports and the clock fan-out through it.
pub struct Board {
    pub mmu: Mmu,
    pub vdp: Vdp,
    pub psg: Box<dyn SoundChip>,
    pub scc: Option<Box<dyn SoundChip>>,
    pub opll: Option<Box<dyn SoundChip>>,
    pub rtc: Rtc,
    pub kanji: Kanji,
    pub fdc: Option<Box<dyn FloppyController>>,
    pub ctx: MachineContext,
    key_matrix: Option<[u8; 16]>,
    key_assign: [KeyAssign; 2],
    pads: (u8, u8),
    psg_latch: u8,
    sound_buffer: Vec<i16>,
    sound_cursor: usize,
    psg_bobo: i64,
    vdp_bobo: i64,
    rtc_bobo: i64,
    irq_events: VecDeque<IrqEvent>,
    frame_done: bool,
}

/// Splits the board so the MMU can call back into the peripherals it does
/// not own while it is itself mutably borrowed.
struct PeripheralHooks<'a> {
    scc: &'a mut Option<Box<dyn SoundChip>>,
    opll: &'a mut Option<Box<dyn SoundChip>>,
    fdc: &'a mut Option<Box<dyn FloppyController>>,
}

impl SlotHooks for PeripheralHooks<'_> {
    fn scc_read(&mut self, addr: u16) -> u8 {
        self.scc.as_mut().map(|scc| scc.read(addr)).unwrap_or(0xff)
    }

    fn scc_write(&mut self, addr: u16, value: u8) {
        if let Some(scc) = self.scc.as_mut() {
            scc.write(addr, value);
        }
    }

    fn disk_read(&mut self, addr: u16) -> u8 {
        let Some(fdc) = self.fdc.as_mut() else {
            return 0xff;
        };
        match addr {
            0x3ffa => fdc.read(4),
            0x3ffb => fdc.read(5),
            _ => 0xff,
        }
    }

    fn disk_write(&mut self, addr: u16, value: u8) {
        let Some(fdc) = self.fdc.as_mut() else {
            return;
        };
        match addr {
            0x3ff8 => fdc.write(2, value),
            0x3ff9 => fdc.write(3, value),
            0x3ffa => fdc.write(4, value),
            0x3ffb => fdc.write(5, value),
            _ => {}
        }
    }

    fn fm_write(&mut self, addr: u16, value: u8) {
        let Some(opll) = self.opll.as_mut() else {
            return;
        };
        match addr {
            0x3ff4 => opll.write(0, value),
            0x3ff5 => opll.write(1, value),
            _ => {}
        }
    }
}

impl Board {
    fn new(revision: VdpRevision, color_mode: ColorMode, psg: Box<dyn SoundChip>) -> Self {
        Self {
            mmu: Mmu::new(),
            vdp: Vdp::new(revision, color_mode),
            psg,
            scc: None,
            opll: None,
            rtc: Rtc::new(),
            kanji: Kanji::new(),
            fdc: None,
            ctx: MachineContext::default(),
            key_matrix: None,
            key_assign: [KeyAssign::default(); 2],
            pads: (0xff, 0xff),
            psg_latch: 0,
            sound_buffer: vec![0; SOUND_BUFFER_SAMPLES],
            sound_cursor: 0,
            psg_bobo: 0,
            vdp_bobo: 0,
            rtc_bobo: 0,
            irq_events: VecDeque::new(),
            frame_done: false,
        }
    }

    fn reset(&mut self) {
        self.ctx = MachineContext::default();
        self.key_matrix = None;
        self.psg_latch = 0;
        self.sound_buffer.fill(0);
        self.sound_cursor = 0;
        self.psg_bobo = 0;
        self.vdp_bobo = 0;
        self.rtc_bobo = 0;
        self.irq_events.clear();
        self.frame_done = false;
        self.mmu.reset();
        self.vdp.reset();
        self.psg.reset();
        if let Some(scc) = self.scc.as_mut() {
            scc.reset();
        }
        if let Some(opll) = self.opll.as_mut() {
            opll.reset();
        }
        self.rtc.reset();
        self.kanji.reset();
        if let Some(fdc) = self.fdc.as_mut() {
            fdc.reset();
        }
    }

    fn drain_vdp_signals(&mut self) {
        while let Some(signal) = self.vdp.take_signal() {
            match signal {
                VdpSignal::RequestInterrupt => self.irq_events.push_back(IrqEvent::Request),
                VdpSignal::CancelInterrupt => self.irq_events.push_back(IrqEvent::Cancel),
                VdpSignal::FrameComplete => self.frame_done = true,
            }
        }
    }

    fn in_port(&mut self, port: u8) -> u8 {
        match port {
            0x81 => 0xff, // 8251 status
            0x88 | 0x98 => self.vdp.in_port_98(),
            0x89 | 0x99 => self.vdp.in_port_99(),
            0x90 => 0x00, // printer status
            0xa2 => {
                let mut result = self.psg.read(0);
                if self.psg_latch == 14 || self.psg_latch == 15 {
                    // S1/S2 travel through the keyboard assigns instead
                    result |= 0b11000000;
                }
                result
            }
            0xa8 => self.mmu.primary(),
            0xa9 => keyboard::read_row(
                self.ctx.selected_key_row,
                self.ctx.key,
                self.key_matrix.as_ref(),
                &self.key_assign,
                self.pads,
            ),
            0xaa => self.ctx.reg_c,
            0xb5 => self.rtc.in_b5(),
            0xb8..=0xba => 0x00, // light pen
            0xbb => 0xff,
            0xc0 => 0xff, // MSX-Audio
            0xc8 => 0xff, // MSX interface
            0xc9..=0xcf => 0x00,
            0xd9 => self.kanji.in_d9(),
            0xdb => self.kanji.in_db(),
            0xf4 => self.vdp.in_port_f4(),
            0xf7 => 0xff, // AV control
            _ => {
                tracing::trace!("read from unhandled port ${:02X}", port);
                self.ctx.io[port as usize]
            }
        }
    }

    fn out_port(&mut self, port: u8, value: u8) {
        self.ctx.io[port as usize] = value;
        match port {
            0x7c => {
                if let Some(opll) = self.opll.as_mut() {
                    opll.write(0, value);
                }
            }
            0x7d => {
                if let Some(opll) = self.opll.as_mut() {
                    opll.write(1, value);
                }
            }
            0x81 | 0x90 | 0x91 => {}
            0x88 | 0x98 => self.vdp.out_port_98(value),
            0x89 | 0x99 => self.vdp.out_port_99(value),
            0x8a | 0x9a => self.vdp.out_port_9a(value),
            0x8b | 0x9b => self.vdp.out_port_9b(value),
            0xa0 => {
                self.psg_latch = value & 0x0f;
                self.psg.latch(value);
            }
            0xa1 => self.psg.write(0, value),
            0xa8 => self.mmu.update_primary(value),
            0xaa => {
                let modified = self.ctx.reg_c ^ value;
                if modified != 0 {
                    self.ctx.reg_c = value;
                    if modified & 0x0f != 0 {
                        self.ctx.selected_key_row = self.ctx.reg_c & 0x0f;
                    }
                }
            }
            0xab => {
                // single-bit set/clear path into the same register C
                if value & 0x80 == 0 {
                    let bit = (value & 0x0e) >> 1;
                    if value & 0x01 != 0 {
                        self.ctx.reg_c |= 1 << bit;
                    } else {
                        self.ctx.reg_c &= !(1 << bit);
                    }
                    if bit <= 3 {
                        self.ctx.selected_key_row = self.ctx.reg_c & 0x0f;
                    }
                }
            }
            0xb4 => self.rtc.out_b4(value),
            0xb5 => self.rtc.out_b5(value),
            0xb8..=0xbb => {} // light pen
            0xd8 => self.kanji.out_d8(value),
            0xd9 => self.kanji.out_d9(value),
            0xda => self.kanji.out_da(value),
            0xdb => self.kanji.out_db(value),
            0xf3 | 0xf5 => {} // screen-mode / system control latches
            0xf4 => self.vdp.out_port_f4(value),
            0xf7 => {
                self.vdp.ctx.reverse_r9_bit4 = (value & 0b01000000 != 0) as u8;
                self.vdp.ctx.reverse_r9_bit5 = (value & 0b10000000 != 0) as u8;
            }
            0xfc..=0xff => self.mmu.update_memory_mapper((port - 0xfc) as usize, value),
            _ => {
                tracing::trace!("write to unhandled port ${:02X} = ${:02X}", port, value);
            }
        }
    }

    fn context_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.bytes(&self.ctx.io);
        w.u8(self.ctx.key);
        w.u8(self.ctx.reg_c);
        w.u8(self.ctx.selected_key_row);
        // fractional-clock residues, so a restored machine stays phase-exact
        w.i64(self.psg_bobo);
        w.i64(self.vdp_bobo);
        w.i64(self.rtc_bobo);
        w.into_bytes()
    }

    fn restore_context(&mut self, bytes: &[u8]) {
        let mut r = ByteReader::new(bytes);
        r.bytes(&mut self.ctx.io);
        self.ctx.key = r.u8();
        self.ctx.reg_c = r.u8();
        self.ctx.selected_key_row = r.u8();
        self.psg_bobo = r.i64();
        self.vdp_bobo = r.i64();
        self.rtc_bobo = r.i64();
    }
}

impl CpuBus for Board {
    fn memory_read(&mut self, addr: u16) -> u8 {
        let Board { mmu, scc, opll, fdc, .. } = self;
        let mut hooks = PeripheralHooks { scc, opll, fdc };
        mmu.read(addr, &mut hooks)
    }

    fn memory_write(&mut self, addr: u16, value: u8) {
        let Board { mmu, scc, opll, fdc, .. } = self;
        let mut hooks = PeripheralHooks { scc, opll, fdc };
        mmu.write(addr, value, &mut hooks);
    }

    fn port_read(&mut self, port: u8) -> u8 {
        self.in_port(port)
    }

    fn port_write(&mut self, port: u8, value: u8) {
        self.out_port(port, value);
    }

    /// Fan CPU cycles into the three peripheral clock domains. Each domain
    /// keeps a fractional accumulator and emits zero or more of its own
    /// ticks, so no shared scheduler is needed.
    fn consume_clock(&mut self, cycles: u32) {
        self.psg_bobo += cycles as i64 * PSG_CLOCK as i64;
        while self.psg_bobo > 0 {
            self.psg_bobo -= CPU_CLOCK as i64;
            let mut l = 0i32;
            let mut r = 0i32;
            self.psg.tick(&mut l, &mut r);
            if let Some(scc) = self.scc.as_mut() {
                scc.tick(&mut l, &mut r);
            }
            if let Some(opll) = self.opll.as_mut() {
                opll.tick(&mut l, &mut r);
            }
            self.sound_buffer[self.sound_cursor] = l.clamp(-32768, 32767) as i16;
            self.sound_buffer[self.sound_cursor + 1] = r.clamp(-32768, 32767) as i16;
            self.sound_cursor = (self.sound_cursor + 2) & (SOUND_BUFFER_SAMPLES - 1);
        }

        self.vdp_bobo += cycles as i64 * VDP_CLOCK as i64;
        while self.vdp_bobo > 0 {
            self.vdp_bobo -= CPU_CLOCK as i64;
            self.vdp.tick();
        }
        self.drain_vdp_signals();

        self.rtc_bobo += cycles as i64;
        while self.rtc_bobo >= CPU_CLOCK as i64 {
            self.rtc_bobo -= CPU_CLOCK as i64;
            self.rtc.tick();
        }
    }
}

pub struct Machine<C: Cpu> {
    pub cpu: C,
    pub board: Board,
    codec: Box<dyn SnapshotCodec>,
}

pub struct MachineBuilder<C: Cpu> {
    cpu: C,
    revision: VdpRevision,
    color_mode: ColorMode,
    psg: Option<Box<dyn SoundChip>>,
    codec: Option<Box<dyn SnapshotCodec>>,
}

impl<C: Cpu> MachineBuilder<C> {
    pub fn new(cpu: C) -> Self {
        Self {
            cpu,
            revision: VdpRevision::V9958,
            color_mode: ColorMode::Rgb565,
            psg: None,
            codec: None,
        }
    }

    pub fn revision(mut self, revision: VdpRevision) -> Self {
        self.revision = revision;
        self
    }

    pub fn color_mode(mut self, color_mode: ColorMode) -> Self {
        self.color_mode = color_mode;
        self
    }

    pub fn psg(mut self, psg: Box<dyn SoundChip>) -> Self {
        self.psg = Some(psg);
        self
    }

    pub fn codec(mut self, codec: Box<dyn SnapshotCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn build(self) -> Machine<C> {
        let psg = self.psg.unwrap_or_else(|| Box::new(NullSound::new()));
        let mut machine = Machine {
            cpu: self.cpu,
            board: Board::new(self.revision, self.color_mode, psg),
            codec: self.codec.unwrap_or_else(|| Box::new(PassthroughCodec)),
        };
        machine.reset();
        machine
    }
}

impl<C: Cpu> Machine<C> {
    // -- configuration ------------------------------------------------------

    pub fn setup_secondary_exist(&mut self, exist: [bool; 4]) {
        self.board.mmu.setup_secondary_exist(exist);
    }

    pub fn setup_ram(&mut self, pri: usize, sec: usize) {
        self.board.mmu.setup_ram(pri, sec);
    }

    /// Install a BIOS/extension ROM. The "DISK" and "FM" labels activate the
    /// pass-through windows; the actual controller/chip instances are
    /// attached with [`Machine::set_floppy_controller`] / the sound setters.
    pub fn setup(&mut self, pri: usize, sec: usize, idx: usize, data: &[u8], label: &str) {
        if label == "DISK" && self.board.fdc.is_none() {
            tracing::warn!("DISK BIOS installed without a floppy controller attached");
        }
        if label == "FM" && self.board.opll.is_none() {
            tracing::warn!("FM BIOS installed without an FM chip attached");
        }
        self.board.mmu.setup(pri, sec, idx, data, label);
    }

    pub fn set_floppy_controller(&mut self, fdc: Option<Box<dyn FloppyController>>) {
        self.board.fdc = fdc;
    }

    pub fn set_scc(&mut self, scc: Option<Box<dyn SoundChip>>) {
        self.board.scc = scc;
    }

    pub fn set_opll(&mut self, opll: Option<Box<dyn SoundChip>>) {
        self.board.opll = opll;
    }

    pub fn load_font(&mut self, data: &[u8]) {
        self.board.kanji.load_font(data);
    }

    /// Map a joystick button to a key code for one player.
    pub fn setup_key_assign(&mut self, player: usize, button: u8, key: u8) {
        if player > 1 {
            return;
        }
        let code = KEY_CODES[key as usize];
        if !code.exist {
            return;
        }
        match button {
            keyboard::JOY_S1 => self.board.key_assign[player].s1 = Some(code),
            keyboard::JOY_S2 => self.board.key_assign[player].s2 = Some(code),
            _ => {}
        }
    }

    /// Install a cartridge and reset, the way a power-cycle with a new
    /// cartridge behaves.
    pub fn load_rom(&mut self, data: &[u8], kind: MapperKind) -> Result<(), MachineError> {
        if data.is_empty() {
            return Err(MachineError::EmptyRom);
        }
        self.board.mmu.setup_cartridge(1, 0, 2, data, kind);
        if kind.has_scc() && self.board.scc.is_none() {
            tracing::warn!("Konami SCC cartridge loaded without an SCC chip attached");
        }
        self.reset();
        Ok(())
    }

    pub fn eject_rom(&mut self) {
        self.board.mmu.clear_cartridge();
        self.reset();
    }

    pub fn insert_disk(&mut self, drive: usize, image: &[u8], read_only: bool) -> Result<(), MachineError> {
        match self.board.fdc.as_mut() {
            Some(fdc) => fdc.insert_disk(drive, image, read_only),
            None => Err(MachineError::NoFdc),
        }
    }

    pub fn eject_disk(&mut self, drive: usize) {
        if let Some(fdc) = self.board.fdc.as_mut() {
            fdc.eject_disk(drive);
        }
    }

    // -- execution ----------------------------------------------------------

    /// Run one frame with the "current key" input model.
    pub fn tick(&mut self, pad1: u8, pad2: u8, key: u8) {
        self.board.psg.set_pads(pad1, pad2);
        self.board.pads = (pad1, pad2);
        self.board.ctx.key = key;
        self.board.key_matrix = None;
        self.run_burst();
    }

    /// Run one frame with the full key-matrix input model.
    pub fn tick_with_key_matrix(&mut self, pad1: u8, pad2: u8, matrix: &[u8; 16]) {
        self.board.psg.set_pads(pad1, pad2);
        self.board.pads = (pad1, pad2);
        self.board.ctx.key = 0;
        self.board.key_matrix = Some(*matrix);
        self.run_burst();
    }

    fn run_burst(&mut self) {
        self.board.frame_done = false;
        let mut steps = 0u32;
        while !self.board.frame_done {
            while let Some(event) = self.board.irq_events.pop_front() {
                match event {
                    IrqEvent::Request => self.cpu.set_irq(true),
                    IrqEvent::Cancel => self.cpu.set_irq(false),
                }
            }
            self.cpu.step(&mut self.board);
            steps += 1;
            if steps >= MAX_BURST_INSTRUCTIONS {
                tracing::warn!("burst aborted after {} instructions without a frame", steps);
                break;
            }
        }
        while let Some(event) = self.board.irq_events.pop_front() {
            match event {
                IrqEvent::Request => self.cpu.set_irq(true),
                IrqEvent::Cancel => self.cpu.set_irq(false),
            }
        }
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
        self.board.reset();
    }

    // -- output -------------------------------------------------------------

    pub fn display(&self) -> &[u16] {
        self.board.vdp.display()
    }

    pub fn display_width(&self) -> usize {
        self.board.vdp.display_width()
    }

    pub fn display_height(&self) -> usize {
        self.board.vdp.display_height()
    }

    pub fn backdrop_color(&self) -> u16 {
        self.board.vdp.backdrop_color()
    }

    pub fn set_scanline_callback(&mut self, callback: Option<ScanlineCallback>) {
        self.board.vdp.set_scanline_callback(callback);
    }

    /// Interleaved PCM accumulated since the last call; draining resets the
    /// buffer. Audio callbacks that find it empty must play silence.
    pub fn get_sound(&mut self) -> Vec<i16> {
        let out = self.board.sound_buffer[..self.board.sound_cursor].to_vec();
        self.board.sound_cursor = 0;
        out
    }

    pub fn sound_len(&self) -> usize {
        self.board.sound_cursor
    }

    pub fn max_sound_len(&self) -> usize {
        SOUND_BUFFER_SAMPLES
    }

    // -- savestate ----------------------------------------------------------

    /// Snapshot every live component as a tagged chunk and run the stream
    /// through the codec.
    pub fn quick_save(&mut self) -> Vec<u8> {
        let mut w = ChunkWriter::new();
        w.chunk(&TAG_BRD, &self.board.context_bytes());
        w.chunk(&TAG_CPU, &self.cpu.context_bytes());
        w.chunk(&TAG_MMU, &self.board.mmu.context_bytes());
        w.chunk(&TAG_PAC, self.board.mmu.pac());
        w.chunk(&TAG_RAM, self.board.mmu.ram());
        if self.board.mmu.sram_enabled {
            w.chunk(&TAG_SRAM, self.board.mmu.sram());
        }
        if self.board.mmu.scc_enabled {
            if let Some(scc) = self.board.scc.as_ref() {
                w.chunk(&TAG_SCC, &scc.context_bytes());
            }
        }
        w.chunk(&TAG_PSG, &self.board.psg.context_bytes());
        w.chunk(&TAG_RTC, &self.board.rtc.context_bytes());
        w.chunk(&TAG_KANJI, &self.board.kanji.context_bytes());
        w.chunk(&TAG_VDP, &self.board.vdp.context_bytes());
        if let Some(fdc) = self.board.fdc.as_ref() {
            w.chunk(&TAG_FDC, &fdc.context_bytes());
            w.chunk(&TAG_FDC_JOURNAL_COUNT, &fdc.journal_count().to_le_bytes());
            let journal = fdc.journal_bytes();
            if !journal.is_empty() {
                w.chunk(&TAG_FDC_JOURNAL_DATA, &journal);
            }
        }
        if let Some(opll) = self.board.opll.as_ref() {
            w.chunk(&TAG_OPLL, &opll.context_bytes());
        }
        self.codec.compress(&w.into_bytes())
    }

    /// Restore a savestate. Unknown tags and chunks for absent peripherals
    /// are skipped; a malformed record ends the scan with everything applied
    /// so far still in effect.
    pub fn quick_load(&mut self, data: &[u8]) -> Result<(), MachineError> {
        let limit = self.savestate_size_limit();
        let raw = self.codec.decompress(data, limit).ok_or(MachineError::BadSavestate)?;
        self.reset();
        let mut journal_count = 0u32;
        for (tag, payload) in ChunkIter::new(&raw) {
            match tag {
                TAG_BRD => self.board.restore_context(payload),
                TAG_CPU => self.cpu.restore_context(payload),
                TAG_MMU => {
                    self.board.mmu.restore_context(payload);
                    // bank indices were stored, pointers are re-derived
                    self.board.mmu.bank_switchover();
                }
                TAG_PAC => copy_into(self.board.mmu.pac_mut(), payload),
                TAG_RAM => copy_into(self.board.mmu.ram_mut(), payload),
                TAG_SRAM => copy_into(self.board.mmu.sram_mut(), payload),
                TAG_SCC => match self.board.scc.as_mut() {
                    Some(scc) => scc.restore_context(payload),
                    None => tracing::debug!("ignored SCC chunk, no chip attached"),
                },
                TAG_PSG => self.board.psg.restore_context(payload),
                TAG_RTC => self.board.rtc.restore_context(payload),
                TAG_KANJI => self.board.kanji.restore_context(payload),
                TAG_VDP => {
                    self.board.vdp.restore_context(payload);
                    // both are register-derived caches
                    self.board.vdp.update_all_palettes();
                    self.board.vdp.rebuild_event_tables();
                }
                TAG_FDC => match self.board.fdc.as_mut() {
                    Some(fdc) => fdc.restore_context(payload),
                    None => tracing::debug!("ignored FDC chunk, no controller attached"),
                },
                TAG_FDC_JOURNAL_COUNT => {
                    let mut r = ByteReader::new(payload);
                    journal_count = r.u32();
                }
                TAG_FDC_JOURNAL_DATA => {
                    if let Some(fdc) = self.board.fdc.as_mut() {
                        fdc.restore_journal(journal_count, payload);
                    }
                }
                TAG_OPLL => match self.board.opll.as_mut() {
                    Some(opll) => opll.restore_context(payload),
                    None => tracing::debug!("ignored OPL chunk, no chip attached"),
                },
                other => {
                    tracing::debug!("skipped unknown savestate chunk {:?}", other);
                }
            }
        }
        Ok(())
    }

    fn savestate_size_limit(&self) -> usize {
        // every possible chunk at its largest, plus headers
        let fixed = 0x200 + 0x10000 + 0x2000 + 0x2000 + 0x40000 + self.board.vdp.vram_mask() + 1;
        fixed + 32 * 12
    }
}

fn copy_into(dst: &mut [u8], src: &[u8]) {
    let n = dst.len().min(src.len());
    dst[..n].copy_from_slice(&src[..n]);
}
