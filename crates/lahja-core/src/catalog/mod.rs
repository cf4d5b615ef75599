//! Dialect catalog: the canonical place for variant metadata, identifier
//! parsing, and the bundled sample listing.

mod dialect;
mod samples;

pub use dialect::{parse_dialect, Dialect, ParseDialectError};
pub use samples::{find_sample, samples_for, SampleInfo};
