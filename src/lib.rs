//! MSX2+ machine core.
//!
//! Emulates the hard parts of the machine — the V99x8 video display
//! processor with its blit/line/search command engine, the slot/page
//! bank-switched MMU with MegaROM mapper emulation, and the orchestrator
//! that fans one master clock out to the sound/video/RTC domains while
//! dispatching the 256-entry I/O port space. The CPU interpreter, the sound
//! chips, the floppy controller and the savestate compressor are external
//! collaborators plugged in through the traits in [`cpu`], [`sound`],
//! [`fdc`] and [`savestate`].

pub mod cpu;
pub mod error;
pub mod fdc;
pub mod kanji;
pub mod keyboard;
pub mod machine;
pub mod mapper;
pub mod mmu;
pub mod rtc;
pub mod savestate;
pub mod sound;
pub mod state;
pub mod vdp;

mod command;
mod renderer;

pub use cpu::{Cpu, CpuBus};
pub use error::MachineError;
pub use fdc::FloppyController;
pub use machine::{Machine, MachineBuilder};
pub use mapper::MapperKind;
pub use mmu::Mmu;
pub use savestate::{PassthroughCodec, SnapshotCodec};
pub use sound::{NullSound, SoundChip};
pub use state::{MachineState, ReportState};
pub use vdp::{ColorMode, Vdp, VdpRevision};
