//! The on-disk container format: magic-framed records, volume headers and
//! footers, and the writer/reader pair that produces and consumes them.
//!
//! Every record shares one framing: a 4-byte magic, the archive id, an
//! `fs_id`, a length-prefixed, Fletcher-32-checksummed attribute record,
//! and (for data blocks) raw payload bytes. [`writer::FramedWriter`] and
//! [`reader::FramedReader`] are the only things in this crate that touch a
//! file descriptor; everything above them works with in-memory
//! [`fsarc_attr::AttributeRecord`]s.

pub mod format;
pub mod frame;
pub mod magic;
pub mod reader;
pub mod volume;
pub mod writer;

pub use format::WireFormat;
pub use magic::Magic;
pub use reader::{FramedReader, FORMAT_ID_KEY};
pub use volume::volume_path;
pub use writer::FramedWriter;
