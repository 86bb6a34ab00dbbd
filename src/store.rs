use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use thiserror::Error;

use crate::models::Currency;
use crate::objective::{eval_row, EvalError, Expr};

/// Exchange rate used to normalize prices into both supported currencies.
/// Applied exactly once, at load time; `select` never converts again.
pub const EUR_TO_CHF: f64 = 0.96;

/// Columns every product CSV must carry. Every other header is treated as a
/// numeric nutrient column (value per 100g, empty cell = missing).
const REQUIRED_COLUMNS: &[&str] = &[
    "price_id",
    "product_code",
    "product_name",
    "ciqual_code",
    "ciqual_name",
    "price",
    "currency",
    "location",
    "location_id",
    "location_osm_id",
];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("product table is missing required column {0}")]
    MissingColumn(String),
    #[error("unparsable value in column {column} on line {line}")]
    Parse { column: String, line: usize },
    #[error("unknown column {0}")]
    UnknownColumn(String),
    #[error("no locations selected")]
    NoLocationsSelected,
    #[error("{0}")]
    Objective(EvalError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Numeric,
}

/// Which column of the store supplies the per-kilogram cost of each product.
pub enum CostSpec {
    Currency(Currency),
    /// A validated user expression over numeric columns.
    Expression(Expr),
}

/// Read-only, column-oriented table of candidate products, one row per
/// (product, point of sale) pairing. Loaded once at startup; shared across
/// requests without locking.
pub struct ProductStore {
    price_id: Vec<i64>,
    product_code: Vec<String>,
    product_name: Vec<String>,
    ciqual_name: Vec<String>,
    ciqual_code: Vec<String>,
    location: Vec<String>,
    location_id: Vec<i64>,
    location_osm_id: Vec<i64>,
    /// price_eur, price_chf and one column per nutrient id; NaN = missing.
    numeric: HashMap<String, Vec<f64>>,
    n_rows: usize,
}

/// The product selection handed to the constraint assembler: parallel
/// vectors, already masked so that the cost and every requested nutrient
/// value is finite.
#[derive(Debug, Clone)]
pub struct ProductFrame {
    pub price_id: Vec<i64>,
    pub product_code: Vec<String>,
    pub product_name: Vec<String>,
    pub ciqual_name: Vec<String>,
    pub ciqual_code: Vec<String>,
    pub location: Vec<String>,
    pub location_osm_id: Vec<i64>,
    /// Cost per kilogram, currency-normalized (or expression-derived).
    pub cost: Vec<f64>,
    /// One `(nutrient_id, values per 100g)` pair per requested nutrient, in
    /// request order.
    pub nutrients: Vec<(String, Vec<f64>)>,
}

impl ProductFrame {
    pub fn len(&self) -> usize {
        self.price_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.price_id.is_empty()
    }

    pub fn nutrient_column(&self, nutrient_id: &str) -> Option<&[f64]> {
        self.nutrients
            .iter()
            .find(|(id, _)| id == nutrient_id)
            .map(|(_, values)| values.as_slice())
    }
}

impl ProductStore {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, StoreError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let index_of = |name: &str| -> Result<usize, StoreError> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| StoreError::MissingColumn(name.to_string()))
        };

        let price_id_idx = index_of("price_id")?;
        let product_code_idx = index_of("product_code")?;
        let product_name_idx = index_of("product_name")?;
        let ciqual_code_idx = index_of("ciqual_code")?;
        let ciqual_name_idx = index_of("ciqual_name")?;
        let price_idx = index_of("price")?;
        let currency_idx = index_of("currency")?;
        let location_idx = index_of("location")?;
        let location_id_idx = index_of("location_id")?;
        let location_osm_id_idx = index_of("location_osm_id")?;

        let nutrient_columns: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !REQUIRED_COLUMNS.contains(h))
            .map(|(i, h)| (i, h.to_string()))
            .collect();

        let mut store = ProductStore {
            price_id: Vec::new(),
            product_code: Vec::new(),
            product_name: Vec::new(),
            ciqual_name: Vec::new(),
            ciqual_code: Vec::new(),
            location: Vec::new(),
            location_id: Vec::new(),
            location_osm_id: Vec::new(),
            numeric: HashMap::new(),
            n_rows: 0,
        };
        store.numeric.insert("price_eur".to_string(), Vec::new());
        store.numeric.insert("price_chf".to_string(), Vec::new());
        for (_, name) in &nutrient_columns {
            store.numeric.insert(name.clone(), Vec::new());
        }

        for (row_idx, record) in csv_reader.records().enumerate() {
            let record = record?;
            let line = row_idx + 2; // header is line 1

            // Rows without a usable price are not candidates.
            let price_text = record.get(price_idx).unwrap_or("");
            if price_text.is_empty() {
                continue;
            }
            let price: f64 = price_text.parse().map_err(|_| StoreError::Parse {
                column: "price".to_string(),
                line,
            })?;
            let (price_eur, price_chf) = match record.get(currency_idx).unwrap_or("") {
                "EUR" => (price, price * EUR_TO_CHF),
                "CHF" => (price / EUR_TO_CHF, price),
                _ => continue, // unsupported currency
            };

            let parse_i64 = |idx: usize, column: &str| -> Result<i64, StoreError> {
                record
                    .get(idx)
                    .unwrap_or("")
                    .parse()
                    .map_err(|_| StoreError::Parse {
                        column: column.to_string(),
                        line,
                    })
            };

            store.price_id.push(parse_i64(price_id_idx, "price_id")?);
            store
                .location_id
                .push(parse_i64(location_id_idx, "location_id")?);
            store
                .location_osm_id
                .push(parse_i64(location_osm_id_idx, "location_osm_id")?);
            store
                .product_code
                .push(record.get(product_code_idx).unwrap_or("").to_string());
            store
                .product_name
                .push(record.get(product_name_idx).unwrap_or("").to_string());
            store
                .ciqual_code
                .push(record.get(ciqual_code_idx).unwrap_or("").to_string());
            store
                .ciqual_name
                .push(record.get(ciqual_name_idx).unwrap_or("").to_string());
            store
                .location
                .push(record.get(location_idx).unwrap_or("").to_string());

            store
                .numeric
                .get_mut("price_eur")
                .unwrap()
                .push(price_eur);
            store
                .numeric
                .get_mut("price_chf")
                .unwrap()
                .push(price_chf);

            for (idx, name) in &nutrient_columns {
                let text = record.get(*idx).unwrap_or("");
                let value = if text.is_empty() {
                    f64::NAN
                } else {
                    text.parse().map_err(|_| StoreError::Parse {
                        column: name.clone(),
                        line,
                    })?
                };
                store.numeric.get_mut(name).unwrap().push(value);
            }

            store.n_rows += 1;
        }

        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// Schema probe for the objective validator. Identifier columns are
    /// `Integer` and deliberately not usable as cost terms.
    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        match name {
            "product_code" | "product_name" | "ciqual_code" | "ciqual_name" | "location" => {
                Some(ColumnKind::Text)
            }
            "price_id" | "location_id" | "location_osm_id" => Some(ColumnKind::Integer),
            _ => self.numeric.get(name).map(|_| ColumnKind::Numeric),
        }
    }

    /// Filtered candidate selection: rows at one of `location_ids` whose
    /// cost and requested nutrient values are all finite. Mirrors the SQL
    /// `IS NOT NULL` filters of the upstream query.
    pub fn select(
        &self,
        location_ids: &[i64],
        nutrient_ids: &[String],
        cost: &CostSpec,
    ) -> Result<ProductFrame, StoreError> {
        if location_ids.is_empty() {
            return Err(StoreError::NoLocationsSelected);
        }

        let mut nutrient_sources: Vec<(&String, &Vec<f64>)> = Vec::with_capacity(nutrient_ids.len());
        for id in nutrient_ids {
            let column = self
                .numeric
                .get(id)
                .ok_or_else(|| StoreError::UnknownColumn(id.clone()))?;
            nutrient_sources.push((id, column));
        }

        let wanted: HashSet<i64> = location_ids.iter().copied().collect();

        let mut frame = ProductFrame {
            price_id: Vec::new(),
            product_code: Vec::new(),
            product_name: Vec::new(),
            ciqual_name: Vec::new(),
            ciqual_code: Vec::new(),
            location: Vec::new(),
            location_osm_id: Vec::new(),
            cost: Vec::new(),
            nutrients: nutrient_ids
                .iter()
                .map(|id| (id.clone(), Vec::new()))
                .collect(),
        };

        for row in 0..self.n_rows {
            if !wanted.contains(&self.location_id[row]) {
                continue;
            }
            let cost_value = match cost {
                CostSpec::Currency(currency) => self.numeric[currency.cost_column()][row],
                CostSpec::Expression(expr) => {
                    match eval_row(expr, &|name| self.numeric.get(name).map(|col| col[row])) {
                        Ok(value) => value,
                        Err(EvalError::UnknownColumn(name)) => {
                            return Err(StoreError::UnknownColumn(name))
                        }
                        Err(other) => return Err(StoreError::Objective(other)),
                    }
                }
            };
            if !cost_value.is_finite() {
                continue;
            }
            if nutrient_sources.iter().any(|(_, col)| !col[row].is_finite()) {
                continue;
            }

            frame.price_id.push(self.price_id[row]);
            frame.product_code.push(self.product_code[row].clone());
            frame.product_name.push(self.product_name[row].clone());
            frame.ciqual_name.push(self.ciqual_name[row].clone());
            frame.ciqual_code.push(self.ciqual_code[row].clone());
            frame.location.push(self.location[row].clone());
            frame.location_osm_id.push(self.location_osm_id[row]);
            frame.cost.push(cost_value);
            for (slot, (_, source)) in frame.nutrients.iter_mut().zip(&nutrient_sources) {
                slot.1.push(source[row]);
            }
        }

        Ok(frame)
    }
}
