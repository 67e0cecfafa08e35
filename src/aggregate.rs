use std::collections::{hash_map::Entry, HashMap};

use crate::domain::{CanonicalRecord, PlantAggregate};

/// Top `limit` plants by summed net generation within one state.
///
/// Filtering is an exact, case-sensitive match on `plant_state`; an
/// unmatched state yields an empty result. Groups are keyed by
/// `(plant_code, plant_name)` and ordered by summed generation descending,
/// with plant code ascending as the deterministic tie-break.
pub fn top_plants(records: &[CanonicalRecord], state: &str, limit: usize) -> Vec<PlantAggregate> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<PlantAggregate> = Vec::new();

    for r in records.iter().filter(|r| r.plant_state == state) {
        match index.entry((r.plant_code.clone(), r.plant_name.clone())) {
            Entry::Occupied(e) => {
                groups[*e.get()].net_generation += r.net_generation;
            }
            Entry::Vacant(e) => {
                e.insert(groups.len());
                groups.push(PlantAggregate {
                    id: r.plant_code.clone(),
                    name: r.plant_name.clone(),
                    state: r.plant_state.clone(),
                    net_generation: r.net_generation,
                });
            }
        }
    }

    groups.sort_by(|a, b| {
        b.net_generation
            .total_cmp(&a.net_generation)
            .then_with(|| a.id.cmp(&b.id))
    });
    groups.truncate(limit);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(generator_id: &str, plant: &str, state: &str, code: &str, net: f64) -> CanonicalRecord {
        CanonicalRecord {
            generator_id: generator_id.to_string(),
            plant_name: plant.to_string(),
            plant_state: state.to_string(),
            plant_code: code.to_string(),
            net_generation: net,
        }
    }

    #[test]
    fn sums_generation_per_plant() {
        let records = vec![
            record("g1", "Alpha", "CA", "55", 100.0),
            record("g2", "Alpha", "CA", "55", 50.0),
        ];
        let top = top_plants(&records, "CA", 10);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, "55");
        assert_eq!(top[0].net_generation, 150.0);
    }

    #[test]
    fn orders_descending_and_respects_limit() {
        let records = vec![
            record("g1", "Alpha", "CA", "55", 10.0),
            record("g2", "Beta", "CA", "56", 300.0),
            record("g3", "Gamma", "CA", "57", 200.0),
        ];
        let top = top_plants(&records, "CA", 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "Beta");
        assert_eq!(top[1].name, "Gamma");
        assert!(top[0].net_generation >= top[1].net_generation);
    }

    #[test]
    fn equal_sums_break_ties_by_plant_code() {
        let records = vec![
            record("g1", "Zeta", "CA", "9", 100.0),
            record("g2", "Alpha", "CA", "1", 100.0),
        ];
        let top = top_plants(&records, "CA", 10);
        assert_eq!(top[0].id, "1");
        assert_eq!(top[1].id, "9");
    }

    #[test]
    fn state_match_is_exact_and_case_sensitive() {
        let records = vec![record("g1", "Alpha", "CA", "55", 100.0)];
        assert!(top_plants(&records, "ca", 10).is_empty());
        assert!(top_plants(&records, "ZZ", 5).is_empty());
    }

    #[test]
    fn same_code_different_name_stays_separate() {
        let records = vec![
            record("g1", "Alpha", "CA", "55", 100.0),
            record("g2", "Alpha Unit 2", "CA", "55", 50.0),
        ];
        let top = top_plants(&records, "CA", 10);
        assert_eq!(top.len(), 2);
    }
}
