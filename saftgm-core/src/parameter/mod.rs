//! Structures and traits that can be used to build model parameters for equations of state.
//!
//! Records are plain `serde` types. Loading them from files or databases is left to the
//! caller; parameters are constructed from already deserialized records.
use indexmap::IndexSet;
use ndarray::Array2;
use serde::de::DeserializeOwned;
use thiserror::Error;

mod identifier;
mod model_record;
mod segment;

pub use identifier::{Identifier, IdentifierOption};
pub use model_record::{BinaryRecord, PureRecord};
pub use segment::{ChemicalRecord, FromSegments, SegmentRecord};

/// Construction of a model's parameter set from pure and binary records.
pub trait Parameter
where
    Self: Sized,
{
    type Pure: Clone + DeserializeOwned;
    type Binary: Clone + DeserializeOwned + Default;

    /// Creates parameters from records for pure substances and possibly binary parameters.
    fn from_records(
        pure_records: Vec<PureRecord<Self::Pure>>,
        binary_records: Option<Array2<Self::Binary>>,
    ) -> Result<Self, ParameterError>;

    /// Creates parameters for a pure component from a pure record.
    fn new_pure(pure_record: PureRecord<Self::Pure>) -> Result<Self, ParameterError> {
        Self::from_records(vec![pure_record], None)
    }

    /// Creates parameters for a binary system from pure records and an optional
    /// binary interaction parameter.
    fn new_binary(
        pure_records: Vec<PureRecord<Self::Pure>>,
        binary_record: Option<Self::Binary>,
    ) -> Result<Self, ParameterError> {
        let binary_record = binary_record.map(|br| {
            Array2::from_shape_fn([2, 2], |(i, j)| {
                if i == j {
                    Self::Binary::default()
                } else {
                    br.clone()
                }
            })
        });
        Self::from_records(pure_records, binary_record)
    }

    /// Creates parameters from model records with default values for the molar weight,
    /// identifiers, and binary interaction parameters.
    fn from_model_records(model_records: Vec<Self::Pure>) -> Result<Self, ParameterError> {
        let pure_records = model_records
            .into_iter()
            .map(|r| PureRecord::new(Default::default(), Default::default(), r))
            .collect();
        Self::from_records(pure_records, None)
    }

    /// Creates parameters from the group counts of every molecule and the
    /// records of the groups they are built from.
    fn from_segments(
        chemical_records: &[ChemicalRecord],
        segment_records: &[SegmentRecord<Self::Pure>],
    ) -> Result<Self, ParameterError>
    where
        Self::Pure: FromSegments,
    {
        let pure_records = chemical_records
            .iter()
            .map(|cr| {
                let segments = cr.segment_map(segment_records)?;
                PureRecord::from_segments(cr.identifier.clone(), &segments)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_records(pure_records, None)
    }

    /// Return the original pure and binary records that were used to construct the parameters.
    #[allow(clippy::type_complexity)]
    fn records(&self) -> (&[PureRecord<Self::Pure>], Option<&Array2<Self::Binary>>);

    /// Arrange binary records in a matrix following the order of `pure_records`.
    ///
    /// Records are matched by the identifier field selected with `option`
    /// regardless of the order of `id1` and `id2`. Pairs without a record get
    /// `Self::Binary::default()`.
    fn binary_matrix_from_records(
        pure_records: &[PureRecord<Self::Pure>],
        binary_records: &[BinaryRecord<Identifier, Self::Binary>],
        option: IdentifierOption,
    ) -> Result<Option<Array2<Self::Binary>>, ParameterError> {
        if binary_records.is_empty() {
            return Ok(None);
        }

        let keys: IndexSet<&str> = pure_records
            .iter()
            .map(|r| {
                r.identifier
                    .get(option)
                    .ok_or_else(|| ParameterError::IdentifierNotFound(r.identifier.to_string()))
            })
            .collect::<Result<_, _>>()?;
        if keys.len() != pure_records.len() {
            return Err(ParameterError::IncompatibleParameters(
                "A substance was defined more than once.".to_string(),
            ));
        }

        let mut matrix = Array2::from_elem([keys.len(); 2], Self::Binary::default());
        for record in binary_records {
            let Some((a, b)) = record.key(option) else {
                continue;
            };
            if let (Some(i), Some(j)) = (keys.get_index_of(a), keys.get_index_of(b)) {
                matrix[[i, j]] = record.model_record.clone();
                matrix[[j, i]] = record.model_record.clone();
            }
        }
        Ok(Some(matrix))
    }

    /// Return a parameter set containing the subset of components specified in `component_list`.
    fn subset(&self, component_list: &[usize]) -> Result<Self, ParameterError> {
        let (pure_records, binary_records) = self.records();
        if let Some(&i) = component_list.iter().find(|&&i| i >= pure_records.len()) {
            return Err(ParameterError::IncompatibleParameters(format!(
                "component index {} out of bounds for {} components",
                i,
                pure_records.len()
            )));
        }
        let pure_records = component_list
            .iter()
            .map(|&i| pure_records[i].clone())
            .collect();
        let n = component_list.len();
        let binary_records = binary_records.map(|br| {
            Array2::from_shape_fn([n, n], |(i, j)| {
                br[(component_list[i], component_list[j])].clone()
            })
        });

        Self::from_records(pure_records, binary_records)
    }
}

/// Error type for incomplete or inconsistent parameter information.
#[derive(Error, Debug)]
pub enum ParameterError {
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("The record of {0} lacks the identifier used for matching.")]
    IdentifierNotFound(String),
    #[error("Information missing.")]
    InsufficientInformation,
    #[error("Incompatible parameters: {0}")]
    IncompatibleParameters(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, f64),
}
