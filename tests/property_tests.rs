//! Property-based tests for the inventory and BOM arithmetic.

use std::collections::{BTreeMap, HashMap};

use proptest::prelude::*;
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use teamhub_api::{
    bom::{self, BomLine, FulfillmentState},
    errors::ServiceError,
    services::parts::apply_adjustment,
};
use uuid::Uuid;

fn subsystem_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["Drivetrain", "Lift", "Intake", "Claw", "Electronics"])
        .prop_map(str::to_string)
}

/// BOM lines paired with the stock on hand for each line's part.
fn bom_strategy() -> impl Strategy<Value = Vec<(String, i32, i32)>> {
    prop::collection::vec((subsystem_strategy(), 0i32..500, -5i32..600), 0..40)
}

fn build(rows: &[(String, i32, i32)]) -> (Vec<BomLine>, HashMap<Uuid, i32>) {
    let mut lines = Vec::with_capacity(rows.len());
    let mut stock = HashMap::new();
    for (subsystem, needed, on_hand) in rows {
        let part_id = Uuid::new_v4();
        stock.insert(part_id, *on_hand);
        lines.push(BomLine {
            item_id: Uuid::new_v4(),
            part_id,
            subsystem: subsystem.clone(),
            quantity_needed: *needed,
        });
    }
    (lines, stock)
}

/// `round(100 * part / whole)` with halves away from zero, in decimal arithmetic.
fn expected_percent(part: i64, whole: i64) -> u8 {
    if whole == 0 {
        return 100;
    }
    (Decimal::from(100 * part) / Decimal::from(whole))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u8()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn percent_stays_in_range(part in -1_000i64..1_000_000, whole in -10i64..1_000_000) {
        let pct = bom::round_percent(part, whole);
        prop_assert!(pct <= 100);
        if whole <= 0 {
            prop_assert_eq!(pct, 100);
        }
    }

    #[test]
    fn percent_is_monotonic_in_the_numerator(a in 0i64..10_000, b in 0i64..10_000, whole in 1i64..10_000) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(bom::round_percent(lo, whole) <= bom::round_percent(hi, whole));
    }

    #[test]
    fn report_counts_agree_with_items(rows in bom_strategy()) {
        let (lines, stock) = build(&rows);
        let report = bom::calculate(&lines, &stock);

        prop_assert_eq!(report.item_count, lines.len());
        prop_assert!(report.overall_percent <= 100);
        if lines.is_empty() {
            prop_assert_eq!(report.overall_percent, 100);
        }

        let fully = report.items.iter().filter(|i| i.state == FulfillmentState::FullyStocked).count();
        prop_assert_eq!(report.fully_stocked, fully);

        let per_subsystem: usize = report.subsystems.iter().map(|s| s.item_count).sum();
        prop_assert_eq!(per_subsystem, lines.len());
        for progress in &report.subsystems {
            prop_assert!(progress.fulfilled <= progress.total_needed);
            prop_assert!(progress.percent_complete <= 100);
        }
        prop_assert!(report.subsystems.windows(2).all(|w| w[0].subsystem < w[1].subsystem));
    }

    #[test]
    fn percentages_match_the_rounded_ratios(rows in bom_strategy()) {
        let (lines, stock) = build(&rows);
        let report = bom::calculate(&lines, &stock);

        let mut expected: BTreeMap<String, (i64, i64, usize)> = BTreeMap::new();
        let mut fully_stocked = 0usize;
        for (subsystem, needed, on_hand) in &rows {
            let have = i64::from((*on_hand).max(0));
            let need = i64::from(*needed);
            let entry = expected.entry(subsystem.clone()).or_default();
            entry.0 += need;
            entry.1 += have.min(need);
            entry.2 += 1;
            if have >= need {
                fully_stocked += 1;
            }
        }

        prop_assert_eq!(report.subsystems.len(), expected.len());
        for (progress, (name, (total, fulfilled, count))) in report.subsystems.iter().zip(&expected) {
            prop_assert_eq!(&progress.subsystem, name);
            prop_assert_eq!(progress.total_needed, *total);
            prop_assert_eq!(progress.fulfilled, *fulfilled);
            prop_assert_eq!(progress.item_count, *count);
            prop_assert_eq!(progress.percent_complete, expected_percent(*fulfilled, *total));
        }

        prop_assert_eq!(report.fully_stocked, fully_stocked);
        prop_assert_eq!(
            report.overall_percent,
            expected_percent(fully_stocked as i64, rows.len() as i64)
        );
    }

    #[test]
    fn shortages_are_exactly_the_short_items(rows in bom_strategy()) {
        let (lines, stock) = build(&rows);
        let report = bom::calculate(&lines, &stock);
        let short = bom::shortages(&report.items);

        let expected = report.items.iter().filter(|i| i.state != FulfillmentState::FullyStocked).count();
        prop_assert_eq!(short.len(), expected);
        prop_assert!(short.iter().all(|i| i.shortfall == i.quantity_needed - i.on_hand));
        prop_assert!(short.windows(2).all(|w| w[0].shortfall >= w[1].shortfall));
    }

    #[test]
    fn adjustments_never_go_negative(current in 0i32..100_000, delta in -200_000i32..200_000, reorder in 0i32..1_000) {
        match apply_adjustment(current, delta, reorder) {
            Ok(adjusted) => {
                prop_assert_eq!(adjusted.previous_quantity, current);
                prop_assert_eq!(adjusted.new_quantity, current + delta);
                prop_assert!(adjusted.new_quantity >= 0);
                prop_assert_eq!(adjusted.low_stock, adjusted.new_quantity <= reorder);
            }
            Err(ServiceError::InsufficientStock(_)) => prop_assert!(current + delta < 0),
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }

    #[test]
    fn opposite_adjustments_cancel(current in 0i32..100_000, delta in 0i32..100_000, reorder in 0i32..1_000) {
        let up = apply_adjustment(current, delta, reorder).unwrap();
        let down = apply_adjustment(up.new_quantity, -delta, reorder).unwrap();
        prop_assert_eq!(down.new_quantity, current);
    }
}
