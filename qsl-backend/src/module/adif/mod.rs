///! ADIF (Amateur Data Interchange Format) log parsing
///!
///! Text is split into records on `<EOR>`, each record into `<NAME:LENGTH>`
///! fields, and the fields are mapped onto [`qsl_common::Qso`].

pub mod tokenizer;
pub mod record;
pub mod parser;

pub use parser::AdifParser;
pub use record::{AdifField, RecordError};
