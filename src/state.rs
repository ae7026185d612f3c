//! Introspection snapshot for debuggers and front-end status panes.

use serde::{Deserialize, Serialize};

use crate::cpu::Cpu;
use crate::machine::Machine;
use crate::mapper::MapperKind;

/// Human-oriented summary of the machine; this is NOT the savestate (see
/// `machine::quick_save` for the binary format).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    pub screen_mode: u8,
    pub screen_enabled: bool,
    pub line_count: i32,
    pub frame: u32,
    pub vram_addr: u32,
    pub command: u8,
    pub primary_slot: u8,
    pub mapper: Option<MapperKind>,
    pub selected_key_row: u8,
    pub sound_samples: usize,
}

impl MachineState {
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub trait ReportState {
    fn report_state(&self) -> MachineState;
}

impl<C: Cpu> ReportState for Machine<C> {
    fn report_state(&self) -> MachineState {
        MachineState {
            screen_mode: self.board.vdp.screen_mode(),
            screen_enabled: self.board.vdp.screen_enabled(),
            line_count: self.board.vdp.line_count(),
            frame: self.board.vdp.ctx.counter,
            vram_addr: self.board.vdp.ctx.addr,
            command: self.board.vdp.ctx.command,
            primary_slot: self.board.mmu.primary(),
            mapper: self.board.mmu.cartridge_kind,
            selected_key_row: self.board.ctx.selected_key_row,
            sound_samples: self.sound_len(),
        }
    }
}
