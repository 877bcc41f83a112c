use crate::{common::*, types::ArrayClass};

/// A named MATLAB array.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub name: String,
    pub class: ArrayClass,
    /// Dimensions in MATLAB order. Data is stored column-major.
    pub dims: Vec<usize>,
    pub data: ArrayData,
}

/// The payload of an array.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    /// Numeric values widened to `f64`, whatever the storage type was.
    Numeric {
        real: Vec<f64>,
        imag: Option<Vec<f64>>,
    },
    Char(Vec<char>),
    Cell(Vec<Array>),
    /// Struct, object and sparse arrays are skipped.
    Unsupported,
}

impl Array {
    /// Build a `double` array. `values` are in column-major order.
    pub fn numeric(name: impl Into<String>, dims: Vec<usize>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            class: ArrayClass::Double,
            dims,
            data: ArrayData::Numeric {
                real: values,
                imag: None,
            },
        }
    }

    /// Build a `1×N` character array.
    pub fn char_row(name: impl Into<String>, text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        Self {
            name: name.into(),
            class: ArrayClass::Char,
            dims: vec![1, chars.len()],
            data: ArrayData::Char(chars),
        }
    }

    /// Build a cell array. `cells` are in column-major order.
    pub fn cell(name: impl Into<String>, dims: Vec<usize>, cells: Vec<Array>) -> Self {
        Self {
            name: name.into(),
            class: ArrayClass::Cell,
            dims,
            data: ArrayData::Cell(cells),
        }
    }

    /// The `[]` matrix, which is stored as a zero-length element.
    pub(crate) fn empty() -> Self {
        Self::numeric("", vec![0, 0], vec![])
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numbers(&self) -> Result<&[f64]> {
        match &self.data {
            ArrayData::Numeric { real, .. } => Ok(real),
            _ => bail!(
                "array '{}' of class {} is not numeric",
                self.name,
                self.class
            ),
        }
    }

    pub fn as_cells(&self) -> Result<&[Array]> {
        match &self.data {
            ArrayData::Cell(cells) => Ok(cells),
            _ => bail!(
                "array '{}' of class {} is not a cell array",
                self.name,
                self.class
            ),
        }
    }

    /// Get the text of a character array with at most one row.
    pub fn as_string(&self) -> Result<String> {
        let chars = self.as_chars()?;
        let rows = self.dims.first().copied().unwrap_or(0);
        ensure!(
            rows <= 1,
            "character array '{}' has {} rows, expect at most one",
            self.name,
            rows
        );
        Ok(chars.iter().collect())
    }

    fn as_chars(&self) -> Result<&[char]> {
        match &self.data {
            ArrayData::Char(chars) => Ok(chars),
            _ => bail!(
                "array '{}' of class {} is not a character array",
                self.name,
                self.class
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_matrix_is_not_a_string() {
        // "ab" and "cd" stored column-major
        let array = Array {
            name: "names".into(),
            class: ArrayClass::Char,
            dims: vec![2, 2],
            data: ArrayData::Char(vec!['a', 'c', 'b', 'd']),
        };
        assert!(array.as_string().is_err());
    }

    #[test]
    fn accessor_mismatch() {
        let array = Array::char_row("path", "a/b.jpg");
        assert_eq!(array.as_string().unwrap(), "a/b.jpg");
        assert_eq!(array.len(), 7);
        assert!(array.as_numbers().is_err());
        assert!(array.as_cells().is_err());
        assert!(Array::empty().is_empty());
    }
}
