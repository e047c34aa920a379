//! Session-scoped measurement ledger
//!
//! Ordered store of confirmed measurements. Insertion order drives the
//! operator-facing reading numbers, so removal must never reorder the
//! remaining entries. Aggregates are recomputed on demand, never
//! cached.

use crate::error::EngineError;
use crate::models::{AggregateGroup, Measurement};

#[derive(Debug, Default)]
pub struct MeasurementLedger {
    entries: Vec<Measurement>,
}

impl MeasurementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[Measurement] {
        &self.entries
    }

    /// Append a confirmed measurement; no dedupe
    pub fn append(&mut self, measurement: Measurement) {
        self.entries.push(measurement);
    }

    /// Remove the entry at `index`, preserving the order of the rest
    pub fn remove_at(&mut self, index: usize) -> Result<Measurement, EngineError> {
        if index >= self.entries.len() {
            return Err(EngineError::IndexOutOfRange(index));
        }
        Ok(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Group entries by material, first-seen order, original order
    /// preserved within each group
    pub fn group_by_material(&self) -> Vec<(i64, Vec<&Measurement>)> {
        let mut groups: Vec<(i64, Vec<&Measurement>)> = Vec::new();
        for measurement in &self.entries {
            let material_id = measurement.material.id;
            match groups.iter_mut().find(|(id, _)| *id == material_id) {
                Some((_, members)) => members.push(measurement),
                None => groups.push((material_id, vec![measurement])),
            }
        }
        groups
    }

    /// Recompute the aggregate for one material from current entries
    pub fn aggregate(&self, material_id: i64) -> Option<AggregateGroup> {
        let members: Vec<&Measurement> = self
            .entries
            .iter()
            .filter(|m| m.material.id == material_id)
            .collect();
        let first = members.first()?;

        let total_quantity = members.iter().map(|m| m.measured_quantity).sum();
        let color_sum: f64 = members.iter().map(|m| m.color_deviation_percent).sum();
        let earliest_timestamp = members
            .iter()
            .map(|m| m.timestamp)
            .min()
            .unwrap_or(first.timestamp);

        Some(AggregateGroup {
            material: first.material.clone(),
            total_quantity,
            count: members.len(),
            average_color_deviation: color_sum / members.len() as f64,
            earliest_timestamp,
        })
    }

    /// Aggregates for every material present, first-seen order
    pub fn aggregates(&self) -> Vec<AggregateGroup> {
        self.group_by_material()
            .iter()
            .filter_map(|(material_id, _)| self.aggregate(*material_id))
            .collect()
    }
}
