use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{
    error::CalibrationError,
    matrices::{Matrix3, Matrix3x4},
};

/// The float values of every parsable line in a key-value calibration file.
///
/// Each non-empty line of the file has the form `KEY: f0 f1 f2 ...`. Lines whose
/// values do not all parse as floats (e.g. `calib_time: 09-Jan-2012 13:57:47`) are
/// skipped, as are blank lines. If a key appears more than once the last line wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyValueCalibration {
    entries: HashMap<String, Vec<f32>>,
}

impl KeyValueCalibration {
    /// Parse a key-value calibration from a buffered reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - A reader over the calibration text.
    ///
    /// # Returns
    ///
    /// The parsed entries. Only I/O failures are reported as errors.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, CalibrationError> {
        let mut entries = HashMap::new();

        for line in reader.lines() {
            let line = line?;
            if let Some((key, values)) = parse_line(&line) {
                entries.insert(key, values);
            }
        }

        log::debug!("parsed {} calibration entries", entries.len());

        Ok(Self { entries })
    }

    /// Read and parse a key-value calibration file.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the calibration text file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse a key-value calibration held in memory.
    pub fn parse_str(text: &str) -> Self {
        let entries = text.lines().filter_map(parse_line).collect();
        Self { entries }
    }

    /// Number of parsed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no entry was parsed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the raw values stored under `key`.
    pub fn get(&self, key: &str) -> Option<&[f32]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Get the values under `key`, failing if the key is absent or the count differs.
    pub fn values<const N: usize>(&self, key: &str) -> Result<[f32; N], CalibrationError> {
        let values = self
            .get(key)
            .ok_or_else(|| CalibrationError::MissingKey(key.to_string()))?;

        values
            .try_into()
            .map_err(|_| CalibrationError::InvalidShape {
                key: key.to_string(),
                expected: N.to_string(),
                got: values.len(),
            })
    }

    /// Get the values under `key` reshaped row-major to a 3x4 matrix.
    pub fn matrix3x4(&self, key: &str) -> Result<Matrix3x4, CalibrationError> {
        let v = self.values::<12>(key)?;
        Ok([
            [v[0], v[1], v[2], v[3]],
            [v[4], v[5], v[6], v[7]],
            [v[8], v[9], v[10], v[11]],
        ])
    }

    /// Get the values under `key` reshaped row-major to a 3x3 matrix.
    pub fn matrix3(&self, key: &str) -> Result<Matrix3, CalibrationError> {
        let v = self.values::<9>(key)?;
        Ok([[v[0], v[1], v[2]], [v[3], v[4], v[5]], [v[6], v[7], v[8]]])
    }
}

/// Parse one `KEY: f0 f1 ...` line. Returns `None` for blank or non-numeric lines.
fn parse_line(line: &str) -> Option<(String, Vec<f32>)> {
    let mut tokens = line.split_whitespace();
    let key = tokens.next()?;
    let key = key.strip_suffix(':').unwrap_or(key);

    match tokens.map(str::parse::<f32>).collect::<Result<Vec<_>, _>>() {
        Ok(values) => Some((key.to_string(), values)),
        Err(_) => {
            log::trace!("skipping non-numeric calibration line: {line}");
            None
        }
    }
}
