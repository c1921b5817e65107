use anyhow::Result;
use std::collections::BTreeMap;

use super::TelemetryBus;

#[derive(Clone, Debug, PartialEq)]
pub enum BusValue {
    Number(f64),
    Text(String),
}

/// In-process bus. Keeps the latest value per `table/key`.
#[derive(Clone, Debug, Default)]
pub struct MemoryBus {
    entries: BTreeMap<String, BusValue>,
    writes: u64,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table: &str, key: &str) -> Option<&BusValue> {
        self.entries.get(&entry_key(table, key))
    }

    pub fn number(&self, table: &str, key: &str) -> Option<f64> {
        match self.get(table, key) {
            Some(BusValue::Number(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn string(&self, table: &str, key: &str) -> Option<&str> {
        match self.get(table, key) {
            Some(BusValue::Text(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total writes since creation.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl TelemetryBus for MemoryBus {
    fn put_number(&mut self, table: &str, key: &str, value: f64) -> Result<()> {
        self.writes += 1;
        self.entries
            .insert(entry_key(table, key), BusValue::Number(value));
        Ok(())
    }

    fn put_string(&mut self, table: &str, key: &str, value: &str) -> Result<()> {
        self.writes += 1;
        self.entries
            .insert(entry_key(table, key), BusValue::Text(value.to_string()));
        Ok(())
    }
}

fn entry_key(table: &str, key: &str) -> String {
    format!("{}/{}", table, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_latest_value_per_key() {
        let mut bus = MemoryBus::new();
        bus.put_number("t", "a", 1.0).unwrap();
        bus.put_number("t", "a", 2.0).unwrap();
        bus.put_string("t", "b", "x").unwrap();
        assert_eq!(bus.number("t", "a"), Some(2.0));
        assert_eq!(bus.string("t", "b"), Some("x"));
        assert_eq!(bus.number("t", "b"), None);
        assert_eq!(bus.len(), 2);
        assert_eq!(bus.writes(), 3);
    }
}
