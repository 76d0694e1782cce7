//! Vocabulary shared by the compiler, the VM and the kernel.

pub mod pid;
pub use pid::Pid;

pub mod opcode;
pub use opcode::{Opcode, WORD_BYTES};

pub mod image;
pub use image::{ExecutableImage, ImageFormatError};

pub mod diagnostic;
pub use diagnostic::{DiagnosticMessage, Diagnostics, Position, Severity, Stage};

pub mod primitives;

// used for serialization
pub trait SerializeField {
    /// Appends `self` into `buf` at `*offset`, advancing the offset.
    fn serialize_field(&self, buf: &mut [u8], offset: &mut usize);
}
