use thiserror::Error;

use crate::models::BoundSpec;
use crate::store::ProductFrame;

/// Store prices are per kilogram; quantities are solved in 100g servings.
/// This factor is applied exactly once, here.
pub const PRICE_PER_KG_TO_PER_100G: f64 = 0.1;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssembleError {
    #[error("no nutrients selected")]
    NoBoundsSelected,
    #[error("bound for {nutrient_id} has lower {lower} above upper {upper}")]
    InvalidBound {
        nutrient_id: String,
        lower: f64,
        upper: f64,
    },
    #[error("selection is missing nutrient column {0}")]
    MissingColumn(String),
}

/// Dense arrays for one optimization call. Row `i` of `a` is the nutrient
/// column of `nutrient_ids[i]`, which is the `i`-th entry of the bounds the
/// caller passed in; that ordering is relied on from here through slack
/// interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct DietLp {
    pub nutrient_ids: Vec<String>,
    /// n_nutrients rows, each of length n_products (content per 100g).
    pub a: Vec<Vec<f64>>,
    pub lower: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    /// Cost per 100g serving of each product.
    pub costs: Vec<f64>,
}

impl DietLp {
    pub fn num_nutrients(&self) -> usize {
        self.nutrient_ids.len()
    }

    pub fn num_products(&self) -> usize {
        self.costs.len()
    }
}

/// Turn an ordered bound selection plus a product selection into the dense
/// `(A, lb, ub, c)` arrays. Pure; no side effects.
pub fn assemble(bounds: &[BoundSpec], frame: &ProductFrame) -> Result<DietLp, AssembleError> {
    if bounds.is_empty() {
        return Err(AssembleError::NoBoundsSelected);
    }

    let mut nutrient_ids = Vec::with_capacity(bounds.len());
    let mut a = Vec::with_capacity(bounds.len());
    let mut lower = Vec::with_capacity(bounds.len());
    let mut upper = Vec::with_capacity(bounds.len());

    for bound in bounds {
        if let (Some(lb), Some(ub)) = (bound.lower, bound.upper) {
            if lb > ub {
                return Err(AssembleError::InvalidBound {
                    nutrient_id: bound.nutrient_id.clone(),
                    lower: lb,
                    upper: ub,
                });
            }
        }
        let column = frame
            .nutrient_column(&bound.nutrient_id)
            .ok_or_else(|| AssembleError::MissingColumn(bound.nutrient_id.clone()))?;
        // The store masks missing values before we get here; a non-finite
        // entry at this point is a bug, not bad input.
        assert!(
            column.iter().all(|v| v.is_finite()),
            "non-finite value in nutrient column {}",
            bound.nutrient_id
        );
        nutrient_ids.push(bound.nutrient_id.clone());
        a.push(column.to_vec());
        lower.push(bound.lower);
        upper.push(bound.upper);
    }

    assert!(
        frame.cost.iter().all(|v| v.is_finite()),
        "non-finite value in cost column"
    );
    let costs = frame
        .cost
        .iter()
        .map(|price_per_kg| PRICE_PER_KG_TO_PER_100G * price_per_kg)
        .collect();

    Ok(DietLp {
        nutrient_ids,
        a,
        lower,
        upper,
        costs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(nutrients: Vec<(&str, Vec<f64>)>, cost: Vec<f64>) -> ProductFrame {
        let n = cost.len();
        ProductFrame {
            price_id: (1..=n as i64).collect(),
            product_code: vec![String::new(); n],
            product_name: vec![String::new(); n],
            ciqual_name: vec![String::new(); n],
            ciqual_code: vec![String::new(); n],
            location: vec![String::new(); n],
            location_osm_id: vec![0; n],
            cost,
            nutrients: nutrients
                .into_iter()
                .map(|(id, values)| (id.to_string(), values))
                .collect(),
        }
    }

    fn bound(id: &str, lower: Option<f64>, upper: Option<f64>) -> BoundSpec {
        BoundSpec {
            nutrient_id: id.to_string(),
            lower,
            upper,
        }
    }

    #[test]
    fn test_rows_follow_bound_order() {
        let frame = frame(
            vec![
                ("protein", vec![24.0, 7.5]),
                ("sodium", vec![0.01, 0.005]),
            ],
            vec![3.5, 2.9],
        );
        // Bounds listed sodium-first; row 0 must be sodium.
        let lp = assemble(
            &[
                bound("sodium", None, Some(2.3)),
                bound("protein", Some(120.0), None),
            ],
            &frame,
        )
        .unwrap();
        assert_eq!(lp.nutrient_ids, vec!["sodium", "protein"]);
        assert_eq!(lp.a[0], vec![0.01, 0.005]);
        assert_eq!(lp.a[1], vec![24.0, 7.5]);
        assert_eq!(lp.lower, vec![None, Some(120.0)]);
        assert_eq!(lp.upper, vec![Some(2.3), None]);
    }

    #[test]
    fn test_cost_is_converted_to_per_100g() {
        let frame = frame(vec![("protein", vec![10.0])], vec![3.5]);
        let lp = assemble(&[bound("protein", Some(1.0), None)], &frame).unwrap();
        assert!((lp.costs[0] - 0.35).abs() < 1e-12);
    }

    #[test]
    fn test_empty_bounds_are_rejected() {
        let frame = frame(vec![("protein", vec![10.0])], vec![3.5]);
        assert_eq!(assemble(&[], &frame), Err(AssembleError::NoBoundsSelected));
    }

    #[test]
    fn test_inverted_bound_is_rejected() {
        let frame = frame(vec![("protein", vec![10.0])], vec![3.5]);
        assert!(matches!(
            assemble(&[bound("protein", Some(5.0), Some(1.0))], &frame),
            Err(AssembleError::InvalidBound { .. })
        ));
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let frame = frame(vec![("protein", vec![10.0])], vec![3.5]);
        assert_eq!(
            assemble(&[bound("zinc", Some(1.0), None)], &frame),
            Err(AssembleError::MissingColumn("zinc".to_string()))
        );
    }

    #[test]
    #[should_panic(expected = "non-finite value")]
    fn test_non_finite_nutrient_value_panics() {
        let frame = frame(vec![("protein", vec![f64::NAN])], vec![3.5]);
        let _ = assemble(&[bound("protein", Some(1.0), None)], &frame);
    }
}
