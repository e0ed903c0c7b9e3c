//! Lens matrices through pricing and presbyopia solutions.

use rust_decimal_macros::dec;

use optica_admin::services::lens::validate_matrix;
use optica_core::LensType;
use optica_core::lens::{LensError, SolutionKind, presbyopia_solutions, price_pair};
use optica_integration_tests::{family, row, rx};

#[test]
fn test_cheapest_overlapping_row_prices_each_eye() {
    let progressive = family(2, "Progresivo Digital", LensType::Progressive);
    let rows = vec![
        row((dec!(-4), dec!(4)), Some((dec!(0.75), dec!(3.5))), dec!(90000)),
        row((dec!(-4), dec!(4)), Some((dec!(0.75), dec!(2))), dec!(80000)),
    ];
    validate_matrix(&rows).unwrap();

    let pair = price_pair(&progressive, &rows, &rx(dec!(-1), dec!(1.5))).unwrap();
    assert_eq!(pair.right, dec!(80000));
    assert_eq!(pair.total, dec!(160000));

    let pair = price_pair(&progressive, &rows, &rx(dec!(-1), dec!(2.5))).unwrap();
    assert_eq!(pair.total, dec!(180000));
}

#[test]
fn test_uncovered_prescription_names_the_eye() {
    let single = family(1, "Monofocal CR-39", LensType::SingleVision);
    let rows = vec![row((dec!(-6), dec!(6)), None, dec!(20000))];

    let err = price_pair(&single, &rows, &rx(dec!(-8), dec!(0))).unwrap_err();
    assert!(matches!(err, LensError::NoCoverage { .. }));
}

#[test]
fn test_presbyope_gets_every_option_cheapest_first() {
    let catalog = vec![
        (
            family(1, "Monofocal CR-39", LensType::SingleVision),
            vec![row((dec!(-6), dec!(6)), None, dec!(20000))],
        ),
        (
            family(2, "Progresivo Digital", LensType::Progressive),
            vec![row((dec!(-4), dec!(4)), Some((dec!(0.75), dec!(3.5))), dec!(80000))],
        ),
    ];

    let solutions = presbyopia_solutions(&rx(dec!(-1), dec!(1.5)), &catalog);
    let kinds: Vec<_> = solutions.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            SolutionKind::NearOnly,
            SolutionKind::TwoPairs,
            SolutionKind::Progressive
        ]
    );
    assert_eq!(solutions[0].total, dec!(40000));
    assert_eq!(solutions[1].total, dec!(80000));
    assert_eq!(solutions[1].pairs.len(), 2);
    assert_eq!(solutions[2].total, dec!(160000));
}

#[test]
fn test_no_addition_lists_distance_options_only() {
    let catalog = vec![
        (
            family(1, "Monofocal CR-39", LensType::SingleVision),
            vec![row((dec!(-6), dec!(6)), None, dec!(20000))],
        ),
        (
            family(2, "Progresivo Digital", LensType::Progressive),
            vec![row((dec!(-4), dec!(4)), Some((dec!(0.75), dec!(3.5))), dec!(80000))],
        ),
    ];

    let solutions = presbyopia_solutions(&rx(dec!(-2), dec!(0)), &catalog);
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].kind, SolutionKind::SingleVision);
    assert_eq!(solutions[0].name(), "Monofocal CR-39");
}

#[test]
fn test_invalid_matrix_is_rejected_before_storage() {
    let rows = vec![
        row((dec!(-6), dec!(6)), None, dec!(20000)),
        row((dec!(-6), dec!(6)), None, dec!(-1)),
    ];
    let err = validate_matrix(&rows).unwrap_err();
    assert!(err.to_string().starts_with("row 2:"), "{err}");
}
