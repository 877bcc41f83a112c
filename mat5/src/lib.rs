//! Reader and writer for MATLAB Level-5 MAT-files.
//!
//! Only the subset needed to consume dataset list files is covered: numeric,
//! character and cell arrays, stored plainly or inside `miCOMPRESSED`
//! elements.

mod common;
pub mod array;
pub mod reader;
pub mod types;
pub mod writer;

pub use array::{Array, ArrayData};
pub use reader::{Endian, Header, MatFile};
pub use types::{ArrayClass, DataType};
pub use writer::MatWriter;
