use thiserror::Error;

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("ROM image is empty")]
    EmptyRom,

    #[error("disk image of {0} bytes exceeds the drive geometry")]
    OversizedDisk(usize),

    #[error("savestate buffer could not be decoded")]
    BadSavestate,

    #[error("no floppy controller is installed")]
    NoFdc,
}
