//! Label file loading

use anyhow::{Context, Result};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Load labels from the given file, one label per line.
///
/// Line `i` names output index `i` of the model, so blank lines in the middle
/// of the file are kept.
pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open label file {}", path.display()))?;

    parse_labels(BufReader::new(file))
        .with_context(|| format!("Failed to read label file {}", path.display()))
}

/// Split on `\n`, dropping a trailing `\r`. Bytes that are not UTF-8 become
/// U+FFFD instead of failing the whole file.
pub fn parse_labels(reader: impl BufRead) -> Result<Vec<String>> {
    reader
        .split(b'\n')
        .map(|line| {
            let mut line = line?;
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            Ok(String::from_utf8_lossy(&line).into_owned())
        })
        .collect()
}
