use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::PartyKey;
use crate::models::PurchaseRecord;
use crate::money::{Amount, Currency};
use crate::proposal::{Operation, Proposal};

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractViolation {
    #[error("{} consumes {expected} input record(s), found {found}", .operation.describe())]
    WrongInputCount {
        operation: Operation,
        expected: usize,
        found: usize,
    },
    #[error("{} produces {expected} output record(s), found {found}", .operation.describe())]
    WrongOutputCount {
        operation: Operation,
        expected: usize,
        found: usize,
    },
    #[error("price must be greater than zero, got {price}")]
    PriceNotPositive { price: Amount },
    #[error("amount paid must open at zero, got {amount_paid}")]
    OpeningAmountPaidNotZero { amount_paid: Amount },
    #[error("buyer and seller must be different parties")]
    BuyerIsSeller,
    #[error("only the amount paid may change between versions")]
    ImmutableFieldChanged,
    #[error("amounts must be denominated in {expected}, got {found}")]
    CurrencyMismatch {
        expected: Currency,
        found: Currency,
    },
    #[error("amount paid must increase: {previous} to {proposed} does not")]
    AmountPaidNotIncreased { previous: Amount, proposed: Amount },
    #[error("amount paid {proposed} must not exceed the price {price}")]
    AmountPaidExceedsPrice { proposed: Amount, price: Amount },
    #[error("purchase is not fully paid: {paid} of {price}")]
    NotFullyPaid { paid: Amount, price: Amount },
    #[error("{} requires signatures from exactly the buyer and the seller", .operation.describe())]
    SignerSetMismatch { operation: Operation },
}

pub fn verify_proposal(
    proposal: &Proposal,
    resolved_inputs: &[PurchaseRecord],
) -> Result<(), ContractViolation> {
    verify(
        proposal.operation,
        resolved_inputs,
        &proposal.outputs,
        &proposal.signers,
    )
}

pub fn verify(
    operation: Operation,
    inputs: &[PurchaseRecord],
    outputs: &[PurchaseRecord],
    signers: &BTreeSet<PartyKey>,
) -> Result<(), ContractViolation> {
    match operation {
        Operation::Initiate => {
            expect_counts(operation, inputs, 0, outputs, 1)?;
            let opened = &outputs[0];

            if !opened.price.is_positive() {
                return Err(ContractViolation::PriceNotPositive {
                    price: opened.price,
                });
            }
            if opened.amount_paid.currency != opened.price.currency {
                return Err(ContractViolation::CurrencyMismatch {
                    expected: opened.price.currency,
                    found: opened.amount_paid.currency,
                });
            }
            if !opened.amount_paid.is_zero() {
                return Err(ContractViolation::OpeningAmountPaidNotZero {
                    amount_paid: opened.amount_paid,
                });
            }
            if opened.buyer.key == opened.seller.key {
                return Err(ContractViolation::BuyerIsSeller);
            }

            expect_signers(operation, opened, signers)
        }
        Operation::PayInstallment => {
            expect_counts(operation, inputs, 1, outputs, 1)?;
            let previous = &inputs[0];
            let proposed = &outputs[0];

            if *proposed != previous.with_amount_paid(proposed.amount_paid) {
                return Err(ContractViolation::ImmutableFieldChanged);
            }

            let price = previous.price;
            for paid in [previous.amount_paid, proposed.amount_paid] {
                if paid.currency != price.currency {
                    return Err(ContractViolation::CurrencyMismatch {
                        expected: price.currency,
                        found: paid.currency,
                    });
                }
            }
            if proposed.amount_paid <= previous.amount_paid {
                return Err(ContractViolation::AmountPaidNotIncreased {
                    previous: previous.amount_paid,
                    proposed: proposed.amount_paid,
                });
            }
            if proposed.amount_paid > price {
                return Err(ContractViolation::AmountPaidExceedsPrice {
                    proposed: proposed.amount_paid,
                    price,
                });
            }

            expect_signers(operation, previous, signers)
        }
        Operation::Complete => {
            expect_counts(operation, inputs, 1, outputs, 0)?;
            let settled = &inputs[0];

            if settled.amount_paid != settled.price {
                return Err(ContractViolation::NotFullyPaid {
                    paid: settled.amount_paid,
                    price: settled.price,
                });
            }

            expect_signers(operation, settled, signers)
        }
    }
}

fn expect_counts(
    operation: Operation,
    inputs: &[PurchaseRecord],
    expected_inputs: usize,
    outputs: &[PurchaseRecord],
    expected_outputs: usize,
) -> Result<(), ContractViolation> {
    if inputs.len() != expected_inputs {
        return Err(ContractViolation::WrongInputCount {
            operation,
            expected: expected_inputs,
            found: inputs.len(),
        });
    }
    if outputs.len() != expected_outputs {
        return Err(ContractViolation::WrongOutputCount {
            operation,
            expected: expected_outputs,
            found: outputs.len(),
        });
    }
    Ok(())
}

fn expect_signers(
    operation: Operation,
    record: &PurchaseRecord,
    signers: &BTreeSet<PartyKey>,
) -> Result<(), ContractViolation> {
    if *signers != record.required_signers() {
        return Err(ContractViolation::SignerSetMismatch { operation });
    }
    Ok(())
}
