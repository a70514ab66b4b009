use serde::{Deserialize, Serialize};
use thiserror::Error;
use toml::{Table, Value};

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("empty path")]
    EmptyPath,
    #[error("key '{0}' is not a table")]
    NotATable(String),
}

/// A deployed flow instance file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct InstanceFile {
    #[serde(default)]
    pub input: InstanceInput,
    #[serde(default)]
    pub steps: Vec<InstanceStep>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct InstanceInput {
    #[serde(default)]
    pub mqtt: InstanceMqtt,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct InstanceMqtt {
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct InstanceStep {
    #[serde(default)]
    pub script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_every_seconds: Option<i64>,
}

/// Set a value in a nested TOML table given a path of keys, creating
/// intermediate tables as needed.
pub fn set_nested_value(
    table: &mut Table,
    path: &[&str],
    value: Value,
) -> Result<(), InstanceError> {
    let Some((last, parents)) = path.split_last() else {
        return Err(InstanceError::EmptyPath);
    };
    let mut current = table;
    for key in parents {
        let entry = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        current = entry
            .as_table_mut()
            .ok_or_else(|| InstanceError::NotATable(key.to_string()))?;
    }
    current.insert(last.to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_set() {
        let mut table = Table::new();
        set_nested_value(&mut table, &["foo"], Value::Integer(42)).unwrap();
        assert_eq!(table["foo"], Value::Integer(42));
    }

    #[test]
    fn nested_set_creates_tables() {
        let mut table = Table::new();
        set_nested_value(&mut table, &["a", "b", "c"], Value::String("bar".into())).unwrap();
        assert_eq!(table["a"]["b"]["c"], Value::String("bar".into()));
    }

    #[test]
    fn overwrites_existing_value() {
        let mut table: Table = toml::from_str("[x]\ny = 1\n").unwrap();
        set_nested_value(&mut table, &["x", "y"], Value::Integer(99)).unwrap();
        assert_eq!(table["x"]["y"], Value::Integer(99));
    }

    #[test]
    fn errors_on_non_table_intermediate() {
        let mut table: Table = toml::from_str("foo = 123\n").unwrap();
        let result = set_nested_value(&mut table, &["foo", "bar"], Value::Integer(1));
        assert!(matches!(result, Err(InstanceError::NotATable(_))));
        // original value untouched
        assert_eq!(table["foo"], Value::Integer(123));
    }

    #[test]
    fn errors_on_empty_path() {
        let mut table = Table::new();
        let result = set_nested_value(&mut table, &[], Value::Integer(1));
        assert!(matches!(result, Err(InstanceError::EmptyPath)));
    }

    #[test]
    fn instance_file_round_trip() {
        let raw = r#"
[input.mqtt]
topics = ["te/device/main///m/+"]

[[steps]]
script = "/images/counter:1.0/dist/main.mjs"
tick_every_seconds = 5
"#;
        let parsed: InstanceFile = toml::from_str(raw).unwrap();
        assert_eq!(parsed.input.mqtt.topics.len(), 1);
        assert_eq!(parsed.steps[0].tick_every_seconds, Some(5));

        let rendered = toml::to_string(&parsed).unwrap();
        let reparsed: InstanceFile = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed.steps[0].script, parsed.steps[0].script);
    }
}
