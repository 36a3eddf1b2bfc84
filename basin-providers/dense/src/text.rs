//! Delimited UTF-8 text input: one point per line, one coordinate per field.
//!
//! Blank lines and lines starting with `#` are skipped. Without an explicit
//! delimiter, fields are separated by commas, whitespace, or both.

use std::io::BufRead;

use crate::errors::DenseProviderError;

/// Parses every point line of `reader` into a row-major buffer.
///
/// Returns the buffer together with the number of coordinates per point,
/// which is zero when the input holds no point line.
pub(crate) fn read_delimited<R: BufRead>(
    reader: R,
    delimiter: Option<char>,
) -> Result<(Vec<f32>, usize), DenseProviderError> {
    let mut values = Vec::new();
    let mut dimension = None;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let number = index + 1;
        let before = values.len();
        for (position, field) in fields(trimmed, delimiter).enumerate() {
            let value = field
                .parse::<f32>()
                .map_err(|_| DenseProviderError::Parse {
                    line: number,
                    field: position + 1,
                    text: field.to_owned(),
                })?;
            values.push(value);
        }
        let actual = values.len() - before;
        match dimension {
            None => dimension = Some(actual),
            Some(expected) if expected != actual => {
                return Err(DenseProviderError::RaggedLine {
                    line: number,
                    expected,
                    actual,
                });
            }
            Some(_) => {}
        }
    }
    Ok((values, dimension.unwrap_or(0)))
}

fn fields(line: &str, delimiter: Option<char>) -> Box<dyn Iterator<Item = &str> + '_> {
    match delimiter {
        Some(delimiter) => Box::new(line.split(delimiter).map(str::trim)),
        None => Box::new(
            line.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|field| !field.is_empty()),
        ),
    }
}
