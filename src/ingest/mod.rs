//! Measurement tables
use log::warn;
use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};
use strum_macros::{Display, EnumString};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    errors::{Error, ParsingError},
    estimator::{FieldMeasurement, SampleSet, EXPERIMENT_A, EXPERIMENT_B},
    spread::Sample,
};

/// Tables are expressed in millimeters
const MILLIMETER: f64 = 1.0E-3;

/// Nature of a measurement table
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Display, EnumString)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case")]
pub enum DataType {
    /// Pair of measured distance distributions: `distance count_a count_b`,
    /// one row per distance bin, counts are occurrences.
    #[default]
    Experiment,
    /// Single measured distance distribution: `distance count_a`.
    /// Must be requested explicitly, a two column table is otherwise
    /// likely to be a misconfigured modelling table.
    SingleExperiment,
    /// Simulated particle coordinates: `x y`, one row per particle.
    Modelling,
}

/// [Table] is the content of one measurement file, taken at one field setting.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// [DataType] of this table
    pub data_type: DataType,
    /// One [SampleSet] per experiment (or axis), values in meters
    pub sets: Vec<SampleSet>,
}

fn tokenize(line: &str) -> Vec<&str> {
    if line.contains(',') || line.contains(';') {
        line.split(|c: char| c == ',' || c == ';')
            .map(|item| item.trim())
            .collect()
    } else {
        line.split_ascii_whitespace().collect()
    }
}

fn parse_number(line: usize, item: &str) -> Result<Option<f64>, ParsingError> {
    if item.is_empty() {
        return Ok(None);
    }
    let value = item
        .parse::<f64>()
        .map_err(|_| ParsingError::InvalidNumber {
            line,
            content: item.to_string(),
        })?;
    if value.is_nan() {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

impl Table {
    /// Parse a [Table] from any [Read]able input.
    /// Blank lines and lines starting with `#` are ignored.
    pub fn parse<R: Read>(
        reader: &mut BufReader<R>,
        data_type: DataType,
    ) -> Result<Self, ParsingError> {
        let mut nb_columns: Option<usize> = None;
        let mut columns: Vec<Vec<Sample>> = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_number = index + 1;

            let content = line.trim();
            if content.is_empty() || content.starts_with('#') {
                continue;
            }

            let items = tokenize(content);
            let found = items.len();

            let expected = match data_type {
                DataType::Experiment => found == 3,
                DataType::SingleExperiment | DataType::Modelling => found == 2,
            };

            if !expected || nb_columns.map_or(false, |n| n != found) {
                return Err(ParsingError::ColumnLayout {
                    line: line_number,
                    expected: match data_type {
                        DataType::Experiment => "experiment (distance count_a count_b)",
                        DataType::SingleExperiment => "single experiment (distance count_a)",
                        DataType::Modelling => "modelling (x y)",
                    },
                    found,
                });
            }

            if nb_columns.is_none() {
                let nb_sets = match data_type {
                    DataType::Experiment | DataType::SingleExperiment => found - 1,
                    DataType::Modelling => 2,
                };
                nb_columns = Some(found);
                columns = vec![Vec::new(); nb_sets];
            }

            let values = items
                .iter()
                .map(|item| parse_number(line_number, item))
                .collect::<Result<Vec<_>, _>>()?;

            match data_type {
                DataType::Experiment | DataType::SingleExperiment => {
                    let distance = match values[0] {
                        Some(distance) => distance * MILLIMETER,
                        None => {
                            warn!("line {}: missing distance", line_number);
                            continue;
                        },
                    };
                    for (column, count) in columns.iter_mut().zip(values.iter().skip(1)) {
                        match count {
                            Some(count) if *count != 0.0 => {
                                column.push(Sample::new(distance, *count));
                            },
                            Some(_) => {},
                            None => warn!("line {}: missing count", line_number),
                        }
                    }
                },
                DataType::Modelling => {
                    for (column, (item, value)) in
                        columns.iter_mut().zip(items.iter().zip(values.iter()))
                    {
                        let value = value.ok_or_else(|| ParsingError::InvalidNumber {
                            line: line_number,
                            content: item.to_string(),
                        })?;
                        column.push(Sample::new(value * MILLIMETER, 1.0));
                    }
                },
            }
        }

        if nb_columns.is_none() {
            return Err(ParsingError::EmptyTable);
        }

        let names: &[&str] = match data_type {
            DataType::Experiment | DataType::SingleExperiment => &[EXPERIMENT_A, EXPERIMENT_B],
            DataType::Modelling => &["x", "y"],
        };

        let sets = columns
            .into_iter()
            .zip(names.iter())
            .map(|(samples, name)| SampleSet::new(name, samples))
            .collect();

        Ok(Self { data_type, sets })
    }

    /// Parse a [Table] from a local file.
    pub fn from_file<P: AsRef<Path>>(path: P, data_type: DataType) -> Result<Self, ParsingError> {
        let fd = File::open(path)?;
        let mut reader = BufReader::new(fd);
        Self::parse(&mut reader, data_type)
    }

    /// Converts this [Table] to a [FieldMeasurement] taken at this field setting.
    pub fn into_measurement(self, field: f64) -> Result<FieldMeasurement, Error> {
        FieldMeasurement::new(field, self.sets)
    }
}
