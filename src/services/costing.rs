use rust_decimal::{Decimal, RoundingStrategy};

/// Scale of the backing `Decimal(19,4)` cost/amount columns.
pub const COST_SCALE: u32 = 4;

/// Rounds a cost or amount to the storage scale, half-even.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(COST_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Moving weighted-average cost after a receipt.
///
/// Blends the incoming cost into the existing average, weighted by quantity.
/// With nothing on hand (or a net-zero total) the incoming cost becomes the
/// average outright. Outbound movements never call this: depletion keeps the
/// existing average.
pub fn moving_average(
    old_qty: Decimal,
    old_cost: Decimal,
    new_qty: Decimal,
    new_cost: Decimal,
) -> Decimal {
    let total_qty = old_qty + new_qty;
    if total_qty > Decimal::ZERO {
        round_money((old_qty * old_cost + new_qty * new_cost) / total_qty)
    } else {
        round_money(new_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn first_receipt_sets_the_average() {
        assert_eq!(
            moving_average(dec!(0), dec!(0), dec!(100), dec!(10)),
            dec!(10)
        );
    }

    #[test]
    fn receipts_blend_by_quantity() {
        // 100 @ 10 then 50 @ 16 -> (1000 + 800) / 150 = 12
        assert_eq!(
            moving_average(dec!(100), dec!(10), dec!(50), dec!(16)),
            dec!(12)
        );
    }

    #[test]
    fn uneven_blend_rounds_half_even_at_scale_four() {
        // (3 * 1 + 3 * 2) / 6 = 1.5 exactly; no rounding needed
        assert_eq!(moving_average(dec!(3), dec!(1), dec!(3), dec!(2)), dec!(1.5));
        // (1 * 0.0001 + 2 * 0.0002) / 3 = 0.00016666... -> 0.0002
        assert_eq!(
            moving_average(dec!(1), dec!(0.0001), dec!(2), dec!(0.0002)),
            dec!(0.0002)
        );
        // Half-even: (1 * 0.0001 + 1 * 0.0002) / 2 = 0.00015 -> 0.0002
        assert_eq!(
            moving_average(dec!(1), dec!(0.0001), dec!(1), dec!(0.0002)),
            dec!(0.0002)
        );
    }

    #[test]
    fn no_binary_float_drift() {
        // 0.1 + 0.2 style inputs stay exact in decimal
        let avg = moving_average(dec!(10), dec!(0.1), dec!(20), dec!(0.2));
        assert_eq!(avg, dec!(0.1667));
    }

    #[test]
    fn zero_total_falls_back_to_incoming_cost() {
        assert_eq!(
            moving_average(dec!(-5), dec!(3), dec!(5), dec!(7)),
            dec!(7)
        );
    }
}
