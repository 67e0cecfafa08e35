use serde::Serialize;

/// One normalized generator row from an eGRID GEN sheet.
///
/// Every field is required: rows that cannot produce all five values are
/// dropped during normalization, never defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub generator_id: String,
    pub plant_name: String,
    pub plant_state: String,
    pub plant_code: String,
    pub net_generation: f64,
}

/// Aggregated net generation for one plant within a state, as returned by
/// the top-plants query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantAggregate {
    pub id: String,
    pub name: String,
    pub state: String,
    pub net_generation: f64,
}
