//! iCalendar parsing: content-line lexing, value decoding and component assembly.

mod assembler;
mod error;
mod lexer;
mod parser;
mod values;

pub use assembler::{Assembled, ComponentAssembler};
pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use lexer::{LineUnfolder, parse_content_line, split_lines};
pub use parser::{Document, parse_document, parse_property};
pub use values::{parse_date, parse_datetime, parse_duration, parse_utc_offset, unescape_text};
