use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use utoipa::ToSchema;
use uuid::Uuid;

/// One BOM requirement as seen by the calculator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BomLine {
    pub item_id: Uuid,
    pub part_id: Uuid,
    pub subsystem: String,
    pub quantity_needed: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentState {
    FullyStocked,
    PartiallyStocked,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ItemFulfillment {
    pub item_id: Uuid,
    pub part_id: Uuid,
    pub subsystem: String,
    pub quantity_needed: i32,
    pub on_hand: i32,
    pub shortfall: i32,
    pub state: FulfillmentState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SubsystemProgress {
    pub subsystem: String,
    pub total_needed: i64,
    pub fulfilled: i64,
    pub percent_complete: u8,
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FulfillmentReport {
    pub items: Vec<ItemFulfillment>,
    /// Sorted by subsystem name
    pub subsystems: Vec<SubsystemProgress>,
    pub fully_stocked: usize,
    pub item_count: usize,
    pub overall_percent: u8,
}

/// Classifies one requirement against the quantity on hand.
///
/// Negative on-hand counts are treated as zero.
pub fn evaluate_line(line: &BomLine, on_hand: i32) -> ItemFulfillment {
    let have = on_hand.max(0);
    let needed = line.quantity_needed.max(0);
    let shortfall = (needed - have).max(0);

    let state = if have >= needed {
        FulfillmentState::FullyStocked
    } else if have > 0 {
        FulfillmentState::PartiallyStocked
    } else {
        FulfillmentState::Missing
    };

    ItemFulfillment {
        item_id: line.item_id,
        part_id: line.part_id,
        subsystem: line.subsystem.clone(),
        quantity_needed: needed,
        on_hand: have,
        shortfall,
        state,
    }
}

/// Nearest-integer percentage of `part / whole`, halves rounded away from zero.
///
/// Returns 100 for an empty whole. Inputs are clamped so the result stays in [0, 100].
pub fn round_percent(part: i64, whole: i64) -> u8 {
    if whole <= 0 {
        return 100;
    }
    let part = part.clamp(0, whole);
    // round(100 * p / w) == floor((200 * p + w) / (2 * w)) for non-negative p
    let pct = (200 * part + whole) / (2 * whole);
    pct as u8
}

/// Builds the full fulfillment report for a team's BOM.
///
/// Parts absent from `on_hand` (for example deleted ones) count as zero.
pub fn calculate(lines: &[BomLine], on_hand: &HashMap<Uuid, i32>) -> FulfillmentReport {
    let items: Vec<ItemFulfillment> = lines
        .iter()
        .map(|line| evaluate_line(line, on_hand.get(&line.part_id).copied().unwrap_or(0)))
        .collect();

    let mut by_subsystem: BTreeMap<&str, (i64, i64, usize)> = BTreeMap::new();
    for item in &items {
        let entry = by_subsystem.entry(item.subsystem.as_str()).or_default();
        entry.0 += i64::from(item.quantity_needed);
        entry.1 += i64::from(item.on_hand.min(item.quantity_needed));
        entry.2 += 1;
    }

    let subsystems = by_subsystem
        .into_iter()
        .map(|(name, (total, fulfilled, count))| SubsystemProgress {
            subsystem: name.to_string(),
            total_needed: total,
            fulfilled,
            percent_complete: round_percent(fulfilled, total),
            item_count: count,
        })
        .collect();

    let fully_stocked = items
        .iter()
        .filter(|i| i.state == FulfillmentState::FullyStocked)
        .count();
    let item_count = items.len();

    FulfillmentReport {
        overall_percent: round_percent(fully_stocked as i64, item_count as i64),
        items,
        subsystems,
        fully_stocked,
        item_count,
    }
}

/// Items still short of their requirement, largest shortfall first.
///
/// Equal shortfalls keep their input order.
pub fn shortages(items: &[ItemFulfillment]) -> Vec<ItemFulfillment> {
    let mut short: Vec<ItemFulfillment> = items
        .iter()
        .filter(|i| i.shortfall > 0)
        .cloned()
        .collect();
    short.sort_by(|a, b| b.shortfall.cmp(&a.shortfall));
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(subsystem: &str, needed: i32) -> (BomLine, Uuid) {
        let part_id = Uuid::new_v4();
        (
            BomLine {
                item_id: Uuid::new_v4(),
                part_id,
                subsystem: subsystem.to_string(),
                quantity_needed: needed,
            },
            part_id,
        )
    }

    fn build(specs: &[(&str, i32, i32)]) -> (Vec<BomLine>, HashMap<Uuid, i32>) {
        let mut lines = Vec::new();
        let mut stock = HashMap::new();
        for (subsystem, needed, have) in specs {
            let (l, part) = line(subsystem, *needed);
            stock.insert(part, *have);
            lines.push(l);
        }
        (lines, stock)
    }

    #[test]
    fn subsystem_percentage_uses_capped_fulfilment() {
        let (lines, stock) = build(&[("drivetrain", 10, 4), ("drivetrain", 5, 5)]);
        let report = calculate(&lines, &stock);

        let drivetrain = &report.subsystems[0];
        assert_eq!(drivetrain.fulfilled, 9);
        assert_eq!(drivetrain.total_needed, 15);
        assert_eq!(drivetrain.percent_complete, 60);
    }

    #[test]
    fn surplus_stock_does_not_inflate_progress() {
        let (lines, stock) = build(&[("intake", 2, 50), ("intake", 2, 0)]);
        let report = calculate(&lines, &stock);
        assert_eq!(report.subsystems[0].percent_complete, 50);
    }

    #[test]
    fn shortages_sorted_by_shortfall_descending() {
        let (lines, stock) = build(&[("a", 10, 2), ("a", 3, 3), ("a", 4, 0)]);
        let report = calculate(&lines, &stock);
        let short = shortages(&report.items);

        assert_eq!(short.len(), 2);
        assert_eq!(short[0].shortfall, 8);
        assert_eq!(short[0].item_id, lines[0].item_id);
        assert_eq!(short[1].shortfall, 4);
        assert_eq!(short[1].item_id, lines[2].item_id);
    }

    #[test]
    fn ties_keep_input_order() {
        let (lines, stock) = build(&[("a", 3, 0), ("b", 5, 2), ("c", 3, 0)]);
        let report = calculate(&lines, &stock);
        let ids: Vec<_> = shortages(&report.items).iter().map(|i| i.item_id).collect();
        assert_eq!(ids, vec![lines[0].item_id, lines[1].item_id, lines[2].item_id]);
    }

    #[test]
    fn classification_covers_all_states() {
        let (lines, stock) = build(&[("s", 4, 4), ("s", 4, 1), ("s", 4, 0)]);
        let report = calculate(&lines, &stock);
        let states: Vec<_> = report.items.iter().map(|i| i.state).collect();
        assert_eq!(
            states,
            vec![
                FulfillmentState::FullyStocked,
                FulfillmentState::PartiallyStocked,
                FulfillmentState::Missing
            ]
        );
        assert_eq!(report.fully_stocked, 1);
        assert_eq!(report.overall_percent, 33);
    }

    #[test]
    fn missing_part_counts_as_zero_on_hand() {
        let (l, _) = line("arm", 3);
        let report = calculate(&[l], &HashMap::new());
        assert_eq!(report.items[0].on_hand, 0);
        assert_eq!(report.items[0].shortfall, 3);
        assert_eq!(report.items[0].state, FulfillmentState::Missing);
    }

    #[test]
    fn zero_requirement_is_fully_stocked() {
        let (lines, stock) = build(&[("spare", 0, 0)]);
        let report = calculate(&lines, &stock);
        assert_eq!(report.items[0].state, FulfillmentState::FullyStocked);
        assert_eq!(report.subsystems[0].percent_complete, 100);
    }

    #[test]
    fn empty_bom_is_complete() {
        let report = calculate(&[], &HashMap::new());
        assert_eq!(report.overall_percent, 100);
        assert!(report.subsystems.is_empty());
    }

    #[test]
    fn subsystems_are_alphabetical() {
        let (lines, stock) = build(&[("wrist", 1, 1), ("arm", 1, 0), ("lift", 1, 1)]);
        let report = calculate(&lines, &stock);
        let names: Vec<_> = report.subsystems.iter().map(|s| s.subsystem.as_str()).collect();
        assert_eq!(names, vec!["arm", "lift", "wrist"]);
    }

    #[test]
    fn rounding_halves_go_up() {
        assert_eq!(round_percent(1, 8), 13); // 12.5
        assert_eq!(round_percent(1, 3), 33);
        assert_eq!(round_percent(2, 3), 67);
        assert_eq!(round_percent(1, 200), 1); // 0.5
        assert_eq!(round_percent(0, 0), 100);
    }
}
