use crate::{errors::Error, spread::Sample};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Name of the first experiment of a measurement pair
pub const EXPERIMENT_A: &str = "A";

/// Name of the second experiment of a measurement pair
pub const EXPERIMENT_B: &str = "B";

/// [SampleSet] is one measured distribution: a repeated experiment,
/// or one transverse axis of a simulated beam.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SampleSet {
    /// Name of this set, identical across the whole scan
    pub name: String,
    /// Weighted samples
    pub samples: Vec<Sample>,
}

impl SampleSet {
    pub fn new(name: &str, samples: Vec<Sample>) -> Self {
        Self {
            name: name.to_string(),
            samples,
        }
    }
}

/// [FieldMeasurement] gathers all the distributions measured
/// at one field setting. Deserialization goes through [FieldMeasurement::new].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "UncheckedMeasurement"))]
pub struct FieldMeasurement {
    field: f64,
    sets: Vec<SampleSet>,
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct UncheckedMeasurement {
    field: f64,
    sets: Vec<SampleSet>,
}

#[cfg(feature = "serde")]
impl TryFrom<UncheckedMeasurement> for FieldMeasurement {
    type Error = Error;
    fn try_from(unchecked: UncheckedMeasurement) -> Result<Self, Self::Error> {
        Self::new(unchecked.field, unchecked.sets)
    }
}

impl FieldMeasurement {
    /// Builds a new [FieldMeasurement] from one or two uniquely named [SampleSet]s.
    pub fn new(field: f64, sets: Vec<SampleSet>) -> Result<Self, Error> {
        let names: Vec<String> = sets.iter().map(|set| set.name.clone()).collect();

        let unique = names.len() < 2 || names[0] != names[1];

        if !field.is_finite() || sets.is_empty() || sets.len() > 2 || !unique {
            return Err(Error::InvalidSampleSets { field, names });
        }

        Ok(Self { field, sets })
    }

    /// Builds a [FieldMeasurement] made of a single experiment
    pub fn single(field: f64, samples: Vec<Sample>) -> Result<Self, Error> {
        Self::new(field, vec![SampleSet::new(EXPERIMENT_A, samples)])
    }

    /// Builds a [FieldMeasurement] made of two independent experiments
    pub fn pair(field: f64, a: Vec<Sample>, b: Vec<Sample>) -> Result<Self, Error> {
        Self::new(
            field,
            vec![
                SampleSet::new(EXPERIMENT_A, a),
                SampleSet::new(EXPERIMENT_B, b),
            ],
        )
    }

    /// Field setting
    pub fn field(&self) -> f64 {
        self.field
    }

    /// Iterates over the [SampleSet]s
    pub fn sets(&self) -> impl Iterator<Item = &SampleSet> {
        self.sets.iter()
    }

    /// Names of the [SampleSet]s, in order
    pub fn set_names(&self) -> Vec<String> {
        self.sets.iter().map(|set| set.name.clone()).collect()
    }

    /// Returns the [SampleSet] by that name
    pub fn set(&self, name: &str) -> Option<&SampleSet> {
        self.sets.iter().find(|set| set.name == name)
    }
}
