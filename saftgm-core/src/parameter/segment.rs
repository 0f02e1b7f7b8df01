use super::identifier::Identifier;
use super::model_record::PureRecord;
use super::ParameterError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameters describing an individual functional group of a molecule.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SegmentRecord<M> {
    pub identifier: String,
    /// Molar weight of the group in g/mol
    pub molarweight: f64,
    pub model_record: M,
}

impl<M> SegmentRecord<M> {
    pub fn new(identifier: String, molarweight: f64, model_record: M) -> Self {
        Self {
            identifier,
            molarweight,
            model_record,
        }
    }
}

impl<M: fmt::Display> fmt::Display for SegmentRecord<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.identifier, self.model_record)
    }
}

/// Group counts of a single molecule.
///
/// ```json
/// {"identifier": {"name": "n-butane"}, "segments": [["CH3", 2.0], ["CH2", 2.0]]}
/// ```
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChemicalRecord {
    pub identifier: Identifier,
    pub segments: Vec<(String, f64)>,
}

impl ChemicalRecord {
    pub fn new(identifier: Identifier, segments: Vec<(String, f64)>) -> Self {
        Self {
            identifier,
            segments,
        }
    }

    /// Pair every group of the molecule with its record and count.
    pub fn segment_map<'a, M>(
        &self,
        segment_records: &'a [SegmentRecord<M>],
    ) -> Result<Vec<(&'a SegmentRecord<M>, f64)>, ParameterError> {
        if self.segments.is_empty() {
            return Err(ParameterError::InsufficientInformation);
        }
        self.segments
            .iter()
            .map(|(id, count)| {
                if !(count.is_finite() && *count > 0.0) {
                    return Err(ParameterError::InvalidValue(format!("count of {id}"), *count));
                }
                segment_records
                    .iter()
                    .find(|s| &s.identifier == id)
                    .map(|s| (s, *count))
                    .ok_or_else(|| {
                        ParameterError::IncompatibleParameters(format!(
                            "no segment record for group {id} of {}",
                            self.identifier
                        ))
                    })
            })
            .collect()
    }
}

/// Models whose pure-component record can be assembled from group records.
pub trait FromSegments: Clone {
    /// Builds the record of a molecule from its group records and the
    /// number of occurrences of each group.
    fn from_segments(segments: &[(Self, f64)]) -> Result<Self, ParameterError>;
}

impl<M: FromSegments> PureRecord<M> {
    /// Molecular record from group records; molar weights are additive.
    pub fn from_segments(
        identifier: Identifier,
        segments: &[(&SegmentRecord<M>, f64)],
    ) -> Result<Self, ParameterError> {
        let molarweight = segments.iter().map(|(s, n)| s.molarweight * n).sum();
        let model_segments: Vec<_> = segments
            .iter()
            .map(|(s, n)| (s.model_record.clone(), *n))
            .collect();
        let model_record = M::from_segments(&model_segments)?;
        Ok(Self::new(identifier, molarweight, model_record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Debug, Clone)]
    struct Size {
        volume: f64,
    }

    impl FromSegments for Size {
        fn from_segments(segments: &[(Self, f64)]) -> Result<Self, ParameterError> {
            let volume = segments.iter().map(|(s, n)| s.volume * n).sum();
            Ok(Self { volume })
        }
    }

    fn groups() -> Vec<SegmentRecord<Size>> {
        vec![
            SegmentRecord::new("CH3".into(), 15.035, Size { volume: 2.0 }),
            SegmentRecord::new("CH2".into(), 14.027, Size { volume: 1.5 }),
        ]
    }

    #[test]
    fn molecule_from_groups() -> Result<(), ParameterError> {
        let butane: ChemicalRecord = serde_json::from_str(
            r#"{"identifier": {"name": "n-butane"}, "segments": [["CH3", 2.0], ["CH2", 2.0]]}"#,
        )?;
        let records = groups();
        let segments = butane.segment_map(&records)?;
        let record = PureRecord::from_segments(butane.identifier.clone(), &segments)?;
        assert_eq!(record.model_record.volume, 7.0);
        assert!((record.molarweight - 58.124).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn unknown_group_is_rejected() {
        let records = groups();
        let propanol = ChemicalRecord::new(
            Identifier::from_name("1-propanol"),
            vec![("CH3".into(), 1.0), ("OH".into(), 1.0)],
        );
        assert!(matches!(
            propanol.segment_map(&records),
            Err(ParameterError::IncompatibleParameters(_))
        ));
        let empty = ChemicalRecord::new(Identifier::from_name("nothing"), vec![]);
        assert!(matches!(
            empty.segment_map(&records),
            Err(ParameterError::InsufficientInformation)
        ));
        let negative = ChemicalRecord::new(Identifier::from_name("x"), vec![("CH2".into(), -1.0)]);
        assert!(matches!(
            negative.segment_map(&records),
            Err(ParameterError::InvalidValue(..))
        ));
    }
}
