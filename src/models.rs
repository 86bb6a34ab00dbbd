use serde::{Deserialize, Serialize};

// ---------- API (wire) types: owned & serde-friendly ----------

/// Body of `POST /optimize.csv`. Exactly one of `currency` / `objective`
/// selects the cost column; `bounds` is ordered and that order is preserved
/// all the way down to the constraint matrix rows.
#[derive(Serialize, Deserialize, Clone)]
pub struct OptimizeRequest {
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub objective: Option<String>,
    pub bounds: Vec<BoundSpec>,
    pub location_ids: Vec<i64>,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Currency {
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "CHF")]
    Chf,
}

impl Currency {
    /// Name of the store column holding the normalized price in this currency.
    pub fn cost_column(self) -> &'static str {
        match self {
            Currency::Eur => "price_eur",
            Currency::Chf => "price_chf",
        }
    }
}

/// One nutrient the user has chosen to constrain. An absent side means
/// "unconstrained" and produces no inequality row.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BoundSpec {
    pub nutrient_id: String,
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum BoundKind {
    Lower,
    Upper,
}

impl std::fmt::Display for BoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundKind::Lower => write!(f, "lower"),
            BoundKind::Upper => write!(f, "upper"),
        }
    }
}

/// A constraint that is tight at the optimum, reported back to the client in
/// the `X-Active-Constraints` response header.
#[derive(Serialize, Clone, PartialEq, Eq, Debug)]
pub struct ActiveConstraint {
    pub nutrient_id: String,
    pub bound: BoundKind,
}
