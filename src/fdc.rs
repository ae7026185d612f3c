//! Floppy-controller collaborator interface.
//!
//! The controller itself (a TC8566AF-style chip) lives outside this crate.
//! The machine exposes its eight command/status registers through the two
//! visible windows at the top of the DISK BIOS page and forwards disk
//! insertion from the host.

use crate::error::MachineError;

pub trait FloppyController {
    fn reset(&mut self);

    /// Register file access, `reg` in 0..8 (2/3 control, 4 status, 5 data).
    fn read(&mut self, reg: u8) -> u8;
    fn write(&mut self, reg: u8, value: u8);

    /// Replaces the medium in `drive`. An image larger than the drive
    /// geometry is refused, not truncated.
    fn insert_disk(&mut self, drive: usize, image: &[u8], read_only: bool) -> Result<(), MachineError>;
    fn eject_disk(&mut self, drive: usize);

    /// Controller register context for the savestate FDC chunk.
    fn context_bytes(&self) -> Vec<u8>;
    fn restore_context(&mut self, bytes: &[u8]);

    /// Write journal since the last full image flush; saved as a count chunk
    /// plus a data chunk so a restore can replay sector writes onto a
    /// pristine image.
    fn journal_count(&self) -> u32;
    fn journal_bytes(&self) -> Vec<u8>;
    fn restore_journal(&mut self, count: u32, bytes: &[u8]);
}
