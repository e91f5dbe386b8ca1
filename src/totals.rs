use serde::Serialize;

use crate::model::LineItem;

/// Derived money amounts for one invoice.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct Totals {
    pub subtotal: f64,
    pub discount: f64,
    pub tax: f64,
    pub total: f64,
}

/// Recomputes every derived amount from the current inputs. The discount
/// applies to the subtotal, tax applies to the discounted base. Negative
/// and NaN inputs are not rejected; they propagate arithmetically.
pub fn calculate_totals(items: &[LineItem], tax_rate: f64, discount_rate: f64) -> Totals {
    let subtotal: f64 = items.iter().map(|i| i.quantity * i.rate).sum();
    let discount = subtotal * (discount_rate / 100.0);
    let taxable = subtotal - discount;
    let tax = taxable * (tax_rate / 100.0);
    Totals {
        subtotal,
        discount,
        tax,
        total: taxable + tax,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::new_id;
    use proptest::prelude::*;

    fn item(quantity: f64, rate: f64) -> LineItem {
        LineItem {
            id: new_id(),
            description: String::new(),
            quantity,
            rate,
        }
    }

    #[test]
    fn discount_applies_before_tax() {
        let items = vec![item(2.0, 50.0), item(1.0, 100.0)];
        let totals = calculate_totals(&items, 10.0, 10.0);
        assert_eq!(totals.subtotal, 200.0);
        assert_eq!(totals.discount, 20.0);
        assert_eq!(totals.tax, 18.0);
        assert_eq!(totals.total, 198.0);
    }

    #[test]
    fn zero_rates_leave_subtotal_untouched() {
        let items = vec![item(3.0, 25.0)];
        let totals = calculate_totals(&items, 0.0, 0.0);
        assert_eq!(totals.subtotal, 75.0);
        assert_eq!(totals.discount, 0.0);
        assert_eq!(totals.tax, 0.0);
        assert_eq!(totals.total, 75.0);
    }

    #[test]
    fn empty_item_list_is_all_zero() {
        let totals = calculate_totals(&[], 8.875, 5.0);
        assert_eq!(totals.subtotal, 0.0);
        assert_eq!(totals.total, 0.0);
    }

    #[test]
    fn negative_values_propagate() {
        let items = vec![item(1.0, -50.0)];
        let totals = calculate_totals(&items, 10.0, 0.0);
        assert_eq!(totals.subtotal, -50.0);
        assert_eq!(totals.total, -55.0);
    }

    #[test]
    fn nan_propagates() {
        let items = vec![item(f64::NAN, 10.0)];
        let totals = calculate_totals(&items, 5.0, 5.0);
        assert!(totals.subtotal.is_nan());
        assert!(totals.total.is_nan());
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        #[test]
        fn prop_subtotal_is_sum_of_amounts(
            rows in prop::collection::vec((0.0f64..1000.0, 0.0f64..1000.0), 1..12)
        ) {
            let items: Vec<LineItem> = rows.iter().map(|(q, r)| item(*q, *r)).collect();
            let expected: f64 = items.iter().map(|i| i.quantity * i.rate).sum();
            let totals = calculate_totals(&items, 0.0, 0.0);
            prop_assert_eq!(totals.subtotal, expected);
        }

        #[test]
        fn prop_total_is_discounted_base_plus_tax(
            rows in prop::collection::vec((0.0f64..1000.0, 0.0f64..1000.0), 1..12),
            tax_rate in 0.0f64..50.0,
            discount_rate in 0.0f64..50.0,
        ) {
            let items: Vec<LineItem> = rows.iter().map(|(q, r)| item(*q, *r)).collect();
            let totals = calculate_totals(&items, tax_rate, discount_rate);
            prop_assert_eq!(totals.total, (totals.subtotal - totals.discount) + totals.tax);
        }

        #[test]
        fn prop_recomputation_is_deterministic(
            rows in prop::collection::vec((0.0f64..1000.0, 0.0f64..1000.0), 1..12),
            tax_rate in 0.0f64..50.0,
            discount_rate in 0.0f64..50.0,
        ) {
            let items: Vec<LineItem> = rows.iter().map(|(q, r)| item(*q, *r)).collect();
            let a = calculate_totals(&items, tax_rate, discount_rate);
            let b = calculate_totals(&items, tax_rate, discount_rate);
            prop_assert_eq!(a, b);
        }
    }
}
