//! XML document tree and tag-path field extraction.

mod extract;
mod tree;

pub use extract::{extract, find_all, find_first, ExtractMode, MULTI_SEPARATOR};
pub use tree::{Descendants, Element, TreeError};
