use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Field of an [Identifier] used to match pure and binary records.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentifierOption {
    #[default]
    Cas,
    Name,
    Formula,
}

/// Names under which a substance can be looked up.
///
/// Two identifiers are equal if their CAS numbers and names agree.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Identifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Sum formula, e.g. `CH4`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

impl Identifier {
    /// ```
    /// # use saftgm_core::parameter::{Identifier, IdentifierOption};
    /// let methane = Identifier::new(Some("74-82-8"), Some("methane"), Some("CH4"));
    /// assert_eq!(methane.get(IdentifierOption::Formula), Some("CH4"));
    /// ```
    pub fn new(cas: Option<&str>, name: Option<&str>, formula: Option<&str>) -> Self {
        Self {
            cas: cas.map(String::from),
            name: name.map(String::from),
            formula: formula.map(String::from),
        }
    }

    pub fn from_name(name: &str) -> Self {
        Self::new(None, Some(name), None)
    }

    /// The field selected by `option`, if present.
    pub fn get(&self, option: IdentifierOption) -> Option<&str> {
        match option {
            IdentifierOption::Cas => self.cas.as_deref(),
            IdentifierOption::Name => self.name.as_deref(),
            IdentifierOption::Formula => self.formula.as_deref(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self
            .name
            .as_deref()
            .or(self.formula.as_deref())
            .unwrap_or("unnamed");
        match &self.cas {
            Some(cas) => write!(f, "{label} [{cas}]"),
            None => write!(f, "{label}"),
        }
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.cas == other.cas && self.name == other.name
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cas.hash(state);
        self.name.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let methane = Identifier::new(Some("74-82-8"), Some("methane"), None);
        assert_eq!(methane.to_string(), "methane [74-82-8]");
        assert_eq!(Identifier::new(None, None, Some("C2H6")).to_string(), "C2H6");
    }

    #[test]
    fn lookup_ignores_formula() {
        let a = Identifier::new(None, Some("ethane"), Some("C2H6"));
        let b = Identifier::from_name("ethane");
        assert_eq!(a, b);
        assert_eq!(b.get(IdentifierOption::Name), Some("ethane"));
        assert_eq!(b.get(IdentifierOption::Cas), None);
    }
}
