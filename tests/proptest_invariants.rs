//! Property-based invariant tests for totals and tender reconciliation.
//!
//! Generates carts and tender lists and asserts the bookkeeping identities:
//! total = subtotal + tax, tax = round(taxable base × rate / 100),
//! is_paid ⇔ Σamount ≥ total, remaining = max(0, total − Σamount).

use cafe_pos::{compute_totals, reconcile, round_money, OrderLine, PaymentMethod, Tender};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn arb_line() -> impl Strategy<Value = OrderLine> {
    (0i64..100_000, 1u32..20, any::<bool>()).prop_map(|(cents, quantity, is_taxable)| OrderLine {
        product_id: format!("p{}", cents % 7),
        name: "item".into(),
        variant: None,
        quantity,
        price: Decimal::new(cents, 2),
        note: None,
        is_taxable,
    })
}

fn arb_tender() -> impl Strategy<Value = Tender> {
    (
        0i64..200_000,
        0i64..5_000,
        prop_oneof![
            Just(PaymentMethod::Cash),
            Just(PaymentMethod::Card),
            Just(PaymentMethod::BankTransfer),
            Just(PaymentMethod::Wallet),
        ],
    )
        .prop_map(|(amount, tip, method)| Tender {
            method,
            amount: Decimal::new(amount, 2),
            tip: Decimal::new(tip, 2),
            reference: None,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_total_is_subtotal_plus_tax(
        lines in prop::collection::vec(arb_line(), 0..12),
        rate_bp in 0i64..=10_000,
    ) {
        let rate = Decimal::new(rate_bp, 2);
        let totals = compute_totals(&lines, rate).unwrap();
        prop_assert_eq!(totals.total, totals.subtotal + totals.tax_amount);
        prop_assert!(totals.total >= Decimal::ZERO);
        prop_assert!(totals.taxable_base <= totals.subtotal);

        let base: Decimal = lines.iter().filter(|l| l.is_taxable).map(|l| l.line_total().unwrap()).sum();
        prop_assert_eq!(totals.taxable_base, round_money(base));
        prop_assert_eq!(
            totals.tax_amount,
            round_money(totals.taxable_base * rate / Decimal::ONE_HUNDRED)
        );
    }

    #[test]
    fn prop_reconcile_identities(
        total_cents in 0i64..500_000,
        tenders in prop::collection::vec(arb_tender(), 0..6),
    ) {
        let total = Decimal::new(total_cents, 2);
        let s = reconcile(total, &tenders).unwrap();
        let tendered: Decimal = tenders.iter().map(|t| t.amount).sum();
        let tips: Decimal = tenders.iter().map(|t| t.tip).sum();

        prop_assert_eq!(s.is_paid, tendered >= total);
        prop_assert_eq!(s.remaining_amount, (total - tendered).max(Decimal::ZERO));
        prop_assert_eq!(s.paid_amount, tendered + tips);
        prop_assert!(s.remaining_amount >= Decimal::ZERO);
        prop_assert!(s.change_due == Decimal::ZERO || s.remaining_amount == Decimal::ZERO);
    }
}

#[test]
fn documented_scenarios() {
    let lines = vec![
        OrderLine {
            product_id: "a".into(),
            name: "A".into(),
            variant: None,
            quantity: 2,
            price: Decimal::from(100),
            note: None,
            is_taxable: true,
        },
        OrderLine {
            product_id: "b".into(),
            name: "B".into(),
            variant: Some("large".into()),
            quantity: 1,
            price: Decimal::from(50),
            note: None,
            is_taxable: false,
        },
    ];
    let totals = compute_totals(&lines, Decimal::from(16)).unwrap();
    assert_eq!(totals.total, Decimal::from(282));

    let single = reconcile(
        totals.total,
        &[Tender {
            method: PaymentMethod::Cash,
            amount: Decimal::from(300),
            tip: Decimal::ZERO,
            reference: None,
        }],
    )
    .unwrap();
    assert_eq!(single.paid_amount, Decimal::from(300));
    assert!(single.is_paid);
}
