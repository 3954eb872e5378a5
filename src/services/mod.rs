//! Adapters for the external tools the pipeline drives.
//!
//! - Report parsing (`TopParser`)
//! - Player gear parsing (`GearParser`)
//! - Raw log compression (`Compressor`)

mod compressor;
mod gear_parser;
mod process;
mod top_parser;

pub use compressor::{Compressor, SevenZip};
pub use gear_parser::{CommandGearParser, GearParser};
pub use top_parser::{CommandTopParser, TopParser};
