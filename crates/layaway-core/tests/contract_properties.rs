use std::collections::BTreeSet;

use layaway_core::contract::{self, ContractViolation};
use layaway_core::{Amount, Currency, LinearId, Operation, Party, PartyIdentity, PurchaseRecord};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::USD),
        Just(Currency::GBP),
        Just(Currency::EUR),
    ]
}

fn amount(minor_units: i64, currency: Currency) -> Amount {
    Amount::new(Decimal::new(minor_units, 2), currency)
}

fn purchase(
    buyer: &Party,
    seller: &Party,
    currency: Currency,
    price: i64,
    paid: i64,
) -> PurchaseRecord {
    PurchaseRecord {
        buyer: buyer.clone(),
        seller: seller.clone(),
        price: amount(price, currency),
        amount_paid: amount(paid, currency),
        item_id: 1,
        linear_id: LinearId::fresh(),
    }
}

proptest! {
    #[test]
    fn prop_installment_accepted_iff_growing_and_within_price(
        currency in currency_strategy(),
        price in 1i64..=10_000,
        previous_paid in 0i64..=10_000,
        proposed_paid in 0i64..=20_000,
    ) {
        let previous_paid = previous_paid.min(price);

        let buyer = PartyIdentity::generate("Buyer").party();
        let seller = PartyIdentity::generate("Seller").party();
        let previous = purchase(&buyer, &seller, currency, price, previous_paid);
        let proposed = previous.with_amount_paid(amount(proposed_paid, currency));
        let signers = previous.required_signers();

        let verdict = contract::verify(
            Operation::PayInstallment,
            std::slice::from_ref(&previous),
            std::slice::from_ref(&proposed),
            &signers,
        );

        let should_pass = proposed_paid > previous_paid && proposed_paid <= price;
        prop_assert_eq!(verdict.is_ok(), should_pass, "verdict was {:?}", verdict);

        if proposed_paid <= previous_paid {
            prop_assert_eq!(
                verdict,
                Err(ContractViolation::AmountPaidNotIncreased {
                    previous: amount(previous_paid, currency),
                    proposed: amount(proposed_paid, currency),
                })
            );
        } else if proposed_paid > price {
            prop_assert_eq!(
                verdict,
                Err(ContractViolation::AmountPaidExceedsPrice {
                    proposed: amount(proposed_paid, currency),
                    price: amount(price, currency),
                })
            );
        }
    }

    #[test]
    fn prop_openings_with_positive_prices_always_verify(
        currency in currency_strategy(),
        price in 1i64..=1_000_000,
        item_id in 0u64..=u64::MAX,
    ) {
        let buyer = PartyIdentity::generate("Buyer").party();
        let seller = PartyIdentity::generate("Seller").party();
        let mut opened = purchase(&buyer, &seller, currency, price, 0);
        opened.item_id = item_id;
        let signers = opened.required_signers();

        prop_assert_eq!(
            contract::verify(Operation::Initiate, &[], &[opened], &signers),
            Ok(())
        );
    }

    #[test]
    fn prop_completion_accepted_iff_fully_paid(
        currency in currency_strategy(),
        price in 1i64..=10_000,
        paid in 0i64..=10_000,
    ) {
        let paid = paid.min(price);

        let buyer = PartyIdentity::generate("Buyer").party();
        let seller = PartyIdentity::generate("Seller").party();
        let settled = purchase(&buyer, &seller, currency, price, paid);
        let signers = settled.required_signers();

        let verdict = contract::verify(Operation::Complete, &[settled], &[], &signers);
        prop_assert_eq!(verdict.is_ok(), paid == price, "verdict was {:?}", verdict);
    }

    #[test]
    fn prop_verdicts_are_deterministic(
        currency in currency_strategy(),
        price in 1i64..=10_000,
        previous_paid in 0i64..=10_000,
        proposed_paid in 0i64..=20_000,
    ) {
        let buyer = PartyIdentity::generate("Buyer").party();
        let seller = PartyIdentity::generate("Seller").party();
        let previous = purchase(&buyer, &seller, currency, price, previous_paid.min(price));
        let proposed = previous.with_amount_paid(amount(proposed_paid, currency));
        let signers = previous.required_signers();

        let first = contract::verify(
            Operation::PayInstallment,
            std::slice::from_ref(&previous),
            std::slice::from_ref(&proposed),
            &signers,
        );
        let second = contract::verify(
            Operation::PayInstallment,
            std::slice::from_ref(&previous),
            std::slice::from_ref(&proposed),
            &signers,
        );
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_single_signer_never_suffices(
        currency in currency_strategy(),
        price in 1i64..=10_000,
        buyer_signs in prop::bool::ANY,
    ) {
        let buyer = PartyIdentity::generate("Buyer").party();
        let seller = PartyIdentity::generate("Seller").party();
        let opened = purchase(&buyer, &seller, currency, price, 0);
        let lone = BTreeSet::from([if buyer_signs { buyer.key } else { seller.key }]);

        prop_assert_eq!(
            contract::verify(Operation::Initiate, &[], &[opened], &lone),
            Err(ContractViolation::SignerSetMismatch {
                operation: Operation::Initiate,
            })
        );
    }
}
