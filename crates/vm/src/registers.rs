/// Architectural state of one process, saved in its PCB between time slices.
///
/// `pc` is relative to the segment base, so a process restored from disk at
/// a different base resumes without rewriting its program counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub pc: u16,
    pub acc: u8,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }
}
