use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{LensFamily, MatrixRow, PairPrice, Prescription, price_pair};
use crate::types::LensType;

/// How a prescription is solved with actual glasses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionKind {
    /// Distance glasses only (no addition).
    SingleVision,
    Progressive,
    Bifocal,
    Occupational,
    /// One single-vision pair for distance and another for near.
    TwoPairs,
    /// Single-vision reading glasses only.
    NearOnly,
}

/// A priced option offered to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub kind: SolutionKind,
    /// One pair, or two for [`SolutionKind::TwoPairs`] (distance first).
    pub pairs: Vec<PairPrice>,
    pub total: Decimal,
}

impl Solution {
    fn new(kind: SolutionKind, pairs: Vec<PairPrice>) -> Self {
        let total = pairs.iter().map(|p| p.total).sum();
        Self { kind, pairs, total }
    }

    /// Display name: the family names involved.
    #[must_use]
    pub fn name(&self) -> String {
        self.pairs
            .iter()
            .map(|p| p.family_name.as_str())
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

/// Every way the active families can solve `rx`, cheapest first.
///
/// Without an addition only distance single-vision options are produced.
/// With an addition, multifocal families are priced on the full Rx and
/// single-vision families yield near-only and two-pair options. Both pairs
/// of a two-pair option come from the same family, and no two-pair option
/// is offered when the distance Rx is plano in both eyes. Families
/// whose matrix does not cover the Rx are skipped. Ties on price are broken
/// by name.
#[must_use]
pub fn presbyopia_solutions(rx: &Prescription, catalog: &[(LensFamily, Vec<MatrixRow>)]) -> Vec<Solution> {
    let presbyopic = rx.has_addition();
    let distance = rx.distance();
    let near = rx.near();
    let distance_is_plano = distance.right.is_plano() && distance.left.is_plano();

    let mut solutions = Vec::new();
    for (family, rows) in catalog.iter().filter(|(f, _)| f.active) {
        match family.lens_type {
            LensType::SingleVision if !presbyopic => {
                if let Ok(pair) = price_pair(family, rows, &distance) {
                    solutions.push(Solution::new(SolutionKind::SingleVision, vec![pair]));
                }
            }
            LensType::SingleVision => {
                let Ok(near_pair) = price_pair(family, rows, &near) else {
                    continue;
                };
                if !distance_is_plano && let Ok(distance_pair) = price_pair(family, rows, &distance) {
                    solutions.push(Solution::new(
                        SolutionKind::TwoPairs,
                        vec![distance_pair, near_pair.clone()],
                    ));
                }
                solutions.push(Solution::new(SolutionKind::NearOnly, vec![near_pair]));
            }
            _ if !presbyopic => {}
            multifocal => {
                if let Ok(pair) = price_pair(family, rows, rx) {
                    let kind = match multifocal {
                        LensType::Bifocal => SolutionKind::Bifocal,
                        LensType::Occupational => SolutionKind::Occupational,
                        _ => SolutionKind::Progressive,
                    };
                    solutions.push(Solution::new(kind, vec![pair]));
                }
            }
        }
    }

    solutions.sort_by(|a, b| match a.total.cmp(&b.total) {
        Ordering::Equal => a.name().cmp(&b.name()),
        other => other,
    });
    solutions
}
