//! Checkout math across the core and admin crates: catalog repricing,
//! discounts, IVA, settlement and stock.

use rust_decimal_macros::dec;

use optica_admin::models::{CartLineRequest, CartRequest};
use optica_admin::services::ServiceError;
use optica_admin::services::checkout::{build_cart, payment_rows, stock_after_sale};
use optica_core::pos::{Discount, Payment, PosError, settle};
use optica_core::{DEFAULT_TAX_RATE, PaymentMethod, ProductId, ProductStatus, SaleStatus, UserId};
use optica_integration_tests::product;

fn line(id: i32, quantity: u32, discount: Option<Discount>) -> CartLineRequest {
    CartLineRequest {
        product_id: ProductId::new(id),
        quantity,
        discount,
    }
}

fn counter_cart() -> CartRequest {
    CartRequest {
        lines: vec![
            line(1, 1, None),
            line(2, 1, Some(Discount::Percent(dec!(10)))),
            line(1, 1, None),
        ],
        discount: Some(Discount::Amount(dec!(791))),
    }
}

#[test]
fn test_cart_is_repriced_from_catalog() {
    let catalog = [product(1, dec!(11900), 5), product(2, dec!(29990), 1)];
    let cart = build_cart(&counter_cart(), &catalog).unwrap();

    // The duplicate frame line is merged.
    assert_eq!(cart.lines().len(), 2);
    assert_eq!(cart.item_count(), 3);

    let totals = cart.totals(DEFAULT_TAX_RATE);
    assert_eq!(totals.subtotal, dec!(53790));
    assert_eq!(totals.discount, dec!(3790));
    assert_eq!(totals.total, dec!(50000));
    assert_eq!(totals.net + totals.tax, totals.total);
    assert_eq!(totals.net, dec!(42017));
}

#[test]
fn test_mixed_tenders_give_change_in_cash() {
    let catalog = [product(1, dec!(11900), 5), product(2, dec!(29990), 1)];
    let cart = build_cart(&counter_cart(), &catalog).unwrap();
    let due = cart.totals(DEFAULT_TAX_RATE).total;

    let payments = [
        Payment {
            method: PaymentMethod::Debit,
            amount: dec!(30000),
        },
        Payment {
            method: PaymentMethod::Cash,
            amount: dec!(25000),
        },
    ];
    let settlement = settle(due, &payments).unwrap();
    assert_eq!(settlement.status, SaleStatus::Paid);
    assert_eq!(settlement.change, dec!(5000));
    assert_eq!(settlement.applied, dec!(50000));

    let rows = payment_rows(&payments, settlement.change, UserId::new(4));
    assert_eq!(rows[0].change, dec!(0));
    assert_eq!(rows[1].change, dec!(5000));
}

#[test]
fn test_deposit_then_balance() {
    let deposit = settle(
        dec!(50000),
        &[Payment {
            method: PaymentMethod::Cash,
            amount: dec!(20000),
        }],
    )
    .unwrap();
    assert_eq!(deposit.status, SaleStatus::PartiallyPaid);
    assert_eq!(deposit.balance, dec!(30000));

    let balance = settle(
        deposit.balance,
        &[Payment {
            method: PaymentMethod::Credit,
            amount: dec!(30000),
        }],
    )
    .unwrap();
    assert_eq!(balance.status, SaleStatus::Paid);
    assert_eq!(balance.balance, dec!(0));

    // Cards are charged exactly; only cash can exceed what is owed.
    assert!(matches!(
        settle(
            dec!(30000),
            &[Payment {
                method: PaymentMethod::Debit,
                amount: dec!(31000),
            }],
        ),
        Err(PosError::NonCashOverpayment { .. })
    ));
}

#[test]
fn test_stock_is_checked_for_tracked_products() {
    let mut lens_service = product(3, dec!(5000), 0);
    lens_service.track_inventory = false;
    let catalog = [product(1, dec!(11900), 2), lens_service];

    let request = CartRequest {
        lines: vec![line(1, 2, None), line(3, 4, None)],
        discount: None,
    };
    let cart = build_cart(&request, &catalog).unwrap();
    assert_eq!(
        stock_after_sale(&cart, &catalog).unwrap(),
        vec![(ProductId::new(1), 0)]
    );

    let request = CartRequest {
        lines: vec![line(1, 3, None)],
        discount: None,
    };
    let cart = build_cart(&request, &catalog).unwrap();
    let err = stock_after_sale(&cart, &catalog).unwrap_err();
    assert!(err.to_string().contains("not enough stock of ARM-1"), "{err}");
}

#[test]
fn test_archived_and_unknown_products_are_rejected() {
    let mut archived = product(1, dec!(11900), 5);
    archived.status = ProductStatus::Archived;

    let request = CartRequest {
        lines: vec![line(1, 1, None)],
        discount: None,
    };
    assert!(matches!(
        build_cart(&request, &[archived]),
        Err(ServiceError::Rule(_))
    ));
    assert!(matches!(
        build_cart(&request, &[]),
        Err(ServiceError::NotFound(_))
    ));
}
