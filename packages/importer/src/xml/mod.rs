//! XML token-stream access for the import engine.
//!
//! The physical tokenizer is `roxmltree`; [`cursor::Cursor`] exposes the
//! pull-event view (element start, element end, end of document) the engine
//! consumes. The main cursor only ever moves forward.

pub mod cursor;

pub use cursor::{collect_text, Cursor, Event};
