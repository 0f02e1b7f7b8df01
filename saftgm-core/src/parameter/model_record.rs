use super::identifier::{Identifier, IdentifierOption};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Model parameters of a single substance together with its identifier.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PureRecord<M> {
    pub identifier: Identifier,
    /// Molar weight in g/mol; zero if unknown.
    #[serde(default)]
    pub molarweight: f64,
    pub model_record: M,
}

impl<M> PureRecord<M> {
    pub fn new(identifier: Identifier, molarweight: f64, model_record: M) -> Self {
        Self {
            identifier,
            molarweight,
            model_record,
        }
    }
}

impl<M: fmt::Display> fmt::Display for PureRecord<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.identifier, self.model_record)?;
        if self.molarweight > 0.0 {
            write!(f, ", M = {} g/mol", self.molarweight)?;
        }
        Ok(())
    }
}

/// Interaction parameters of an unordered pair of substances.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BinaryRecord<I, B> {
    pub id1: I,
    pub id2: I,
    pub model_record: B,
}

impl<I, B> BinaryRecord<I, B> {
    pub fn new(id1: I, id2: I, model_record: B) -> Self {
        Self {
            id1,
            id2,
            model_record,
        }
    }
}

impl<B> BinaryRecord<Identifier, B> {
    /// The pair of keys selected by `option`, in lexical order.
    pub fn key(&self, option: IdentifierOption) -> Option<(&str, &str)> {
        let (a, b) = (self.id1.get(option)?, self.id2.get(option)?);
        Some(if a <= b { (a, b) } else { (b, a) })
    }
}

impl<I: fmt::Display, B: fmt::Display> fmt::Display for BinaryRecord<I, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}: {}", self.id1, self.id2, self.model_record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Debug, Default, Clone)]
    struct Kij {
        k_ij: f64,
    }

    #[test]
    fn pure_record_without_molarweight() -> Result<(), serde_json::Error> {
        let record: PureRecord<Kij> = serde_json::from_str(
            r#"{"identifier": {"name": "argon"}, "model_record": {"k_ij": 0.0}}"#,
        )?;
        assert_eq!(record.identifier.name.as_deref(), Some("argon"));
        assert_eq!(record.molarweight, 0.0);
        Ok(())
    }

    #[test]
    fn binary_key_is_unordered() -> Result<(), serde_json::Error> {
        let record: BinaryRecord<Identifier, Kij> = serde_json::from_str(
            r#"{"id1": {"cas": "7732-18-5"}, "id2": {"cas": "67-56-1"}, "model_record": {"k_ij": -0.02}}"#,
        )?;
        assert_eq!(
            record.key(IdentifierOption::Cas),
            Some(("67-56-1", "7732-18-5"))
        );
        assert_eq!(record.key(IdentifierOption::Name), None);
        Ok(())
    }
}
