//! Chain spec parsing
//!
//! A chain is a JSON array of `{"operation": ..., "spec": ...}` entries.
//! Operations are named either by their short name or by the class name
//! used in chain files written for the reference implementation.

use super::cardinality::CardinalitySpec;
use super::default::Defaults;
use super::error::JoltError;
use super::modify::{Mode, Modify};
use super::remove::Remove;
use super::shift::Shift;
use super::sort::sort;
use serde_json::Value;

type Result<T> = std::result::Result<T, JoltError>;

/// One step of a chain
#[derive(Debug, Clone)]
pub enum Operation {
    Shift(Shift),
    Default(Defaults),
    Remove(Remove),
    Sort,
    Cardinality(CardinalitySpec),
    Modify(Modify),
}

impl Operation {
    /// Parse the chain entry at `index`
    pub fn from_entry(index: usize, entry: &Value) -> Result<Self> {
        let location = format!("[{}]", index);
        let Value::Object(entry) = entry else {
            return Err(JoltError::spec_at(location, "chain entry must be a JSON object"));
        };

        let name = match entry.get("operation") {
            Some(Value::String(name)) => name.as_str(),
            Some(_) => {
                return Err(JoltError::spec_at(
                    format!("{}.operation", location),
                    "operation must be a string",
                ))
            }
            None => {
                return Err(JoltError::spec_at(location, "missing 'operation'"));
            }
        };

        let spec_location = format!("{}.spec", location);
        let spec = || {
            entry
                .get("spec")
                .filter(|spec| !spec.is_null())
                .ok_or_else(|| {
                    JoltError::spec_at(&spec_location, format!("operation '{}' requires a spec", name))
                })
        };

        let operation = match name {
            "shift" | "com.bazaarvoice.jolt.Shiftr" => Operation::Shift(Shift::new(spec()?)?),
            "default" | "com.bazaarvoice.jolt.Defaultr" => {
                Operation::Default(Defaults::new(spec()?)?)
            }
            "remove" | "com.bazaarvoice.jolt.Removr" => Operation::Remove(Remove::new(spec()?)?),
            "sort" | "com.bazaarvoice.jolt.Sortr" => Operation::Sort,
            "cardinality" | "com.bazaarvoice.jolt.CardinalityTransform" => {
                Operation::Cardinality(CardinalitySpec::new(spec()?)?)
            }
            "modify-overwrite-beta" | "com.bazaarvoice.jolt.Modifier$Overwritr" => {
                Operation::Modify(Modify::new(Mode::Overwrite, spec()?)?)
            }
            "modify-default-beta" | "com.bazaarvoice.jolt.Modifier$Defaultr" => {
                Operation::Modify(Modify::new(Mode::Default, spec()?)?)
            }
            "modify-define-beta" | "com.bazaarvoice.jolt.Modifier$Definr" => {
                Operation::Modify(Modify::new(Mode::Define, spec()?)?)
            }
            other => {
                return Err(JoltError::spec_at(
                    format!("{}.operation", location),
                    format!("unknown operation '{}'", other),
                ))
            }
        };
        Ok(operation)
    }

    /// Short operation name
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Shift(_) => "shift",
            Operation::Default(_) => "default",
            Operation::Remove(_) => "remove",
            Operation::Sort => "sort",
            Operation::Cardinality(_) => "cardinality",
            Operation::Modify(modify) => modify.mode().name(),
        }
    }

    /// Run this step on a document
    pub fn apply(&self, input: Value) -> Result<Value> {
        Ok(match self {
            Operation::Shift(shift) => shift.apply(&input)?,
            Operation::Default(defaults) => defaults.apply(input),
            Operation::Remove(remove) => remove.apply(input),
            Operation::Sort => sort(input),
            Operation::Cardinality(cardinality) => cardinality.apply(input),
            Operation::Modify(modify) => modify.apply(input)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_names_and_aliases() {
        let op = Operation::from_entry(0, &json!({"operation": "com.bazaarvoice.jolt.Shiftr", "spec": {"a": "b"}})).unwrap();
        assert_eq!(op.name(), "shift");
        let op = Operation::from_entry(0, &json!({"operation": "sort"})).unwrap();
        assert_eq!(op.name(), "sort");
    }

    #[test]
    fn test_missing_spec_is_an_error() {
        let err = Operation::from_entry(2, &json!({"operation": "shift"})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid Jolt spec at [2].spec: operation 'shift' requires a spec"
        );
    }

    #[test]
    fn test_unknown_operation() {
        let err = Operation::from_entry(0, &json!({"operation": "nosuch", "spec": {}})).unwrap_err();
        assert!(err.to_string().contains("unknown operation 'nosuch'"));
    }

    #[test]
    fn test_modify_operations() {
        for name in ["modify-overwrite-beta", "modify-default-beta", "modify-define-beta"] {
            let op = Operation::from_entry(0, &json!({"operation": name, "spec": {"a": "=toUpper"}})).unwrap();
            assert_eq!(op.name(), name);
        }
        let op = Operation::from_entry(0, &json!({"operation": "modify-overwrite-beta", "spec": {"a": "=toUpper"}})).unwrap();
        assert_eq!(op.apply(json!({"a": "x"})).unwrap(), json!({"a": "X"}));
        let op = Operation::from_entry(0, &json!({"operation": "com.bazaarvoice.jolt.Modifier$Definr", "spec": {"a": 1}})).unwrap();
        assert_eq!(op.apply(json!({"a": null})).unwrap(), json!({"a": null}));
    }

    #[test]
    fn test_entry_shape() {
        assert!(Operation::from_entry(0, &json!("shift")).is_err());
        assert!(Operation::from_entry(0, &json!({"spec": {}})).is_err());
        assert!(Operation::from_entry(0, &json!({"operation": 1})).is_err());
    }
}
