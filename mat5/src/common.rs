pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt as _};
pub use indexmap::IndexMap;
pub use itertools::Itertools as _;
pub use log::{debug, warn};
pub use std::{
    convert::TryFrom,
    fmt,
    fs,
    io::{self, Read, Write},
    path::Path,
};
