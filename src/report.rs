use crate::assemble::DietLp;
use crate::domain::optimize::{DietSolution, QUANTITY_EPSILON};
use crate::store::ProductFrame;

/// One product that made it into the optimized basket.
#[derive(Debug, Clone, PartialEq)]
pub struct BasketRow {
    pub id: i64,
    pub product_code: String,
    pub product_name: String,
    pub ciqual_name: String,
    pub ciqual_code: String,
    pub location: String,
    pub location_osm_id: i64,
    /// Grams to buy, rounded to 0.1g.
    pub quantity_g: f64,
    /// Cost of that quantity, rounded to cents.
    pub price: f64,
    /// This product's contribution to each constrained nutrient, in bound
    /// order.
    pub levels: Vec<f64>,
}

/// Display form of a point of sale: the first three comma-separated parts of
/// the OSM display name.
pub fn short_location(location: &str) -> String {
    location
        .split(", ")
        .take(3)
        .collect::<Vec<_>>()
        .join(", ")
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Shape the solved quantities into presentation rows: effectively-zero
/// quantities are dropped, the rest sorted by descending quantity with the
/// price id as a stable tie-breaker.
pub fn basket_rows(frame: &ProductFrame, lp: &DietLp, solution: &DietSolution) -> Vec<BasketRow> {
    let mut rows: Vec<BasketRow> = (0..frame.len())
        .filter(|&j| solution.x[j] > QUANTITY_EPSILON)
        .map(|j| BasketRow {
            id: frame.price_id[j],
            product_code: frame.product_code[j].clone(),
            product_name: frame.product_name[j].clone(),
            ciqual_name: frame.ciqual_name[j].clone(),
            ciqual_code: frame.ciqual_code[j].clone(),
            location: short_location(&frame.location[j]),
            location_osm_id: frame.location_osm_id[j],
            quantity_g: round_to(100.0 * solution.x[j], 1),
            price: round_to(lp.costs[j] * solution.x[j], 2),
            levels: lp.a.iter().map(|row| row[j] * solution.x[j]).collect(),
        })
        .collect();

    rows.sort_by(|a, b| {
        b.quantity_g
            .total_cmp(&a.quantity_g)
            .then(a.id.cmp(&b.id))
    });
    rows
}

/// Render the basket as the CSV document returned by `/optimize.csv`.
pub fn render_csv(lp: &DietLp, rows: &[BasketRow]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<String> = [
        "id",
        "product_code",
        "product_name",
        "ciqual_name",
        "ciqual_code",
        "location",
        "location_osm_id",
        "quantity_g",
        "price",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(lp.nutrient_ids.iter().cloned());
    writer.write_record(&header)?;

    for row in rows {
        let mut record: Vec<String> = vec![
            row.id.to_string(),
            row.product_code.clone(),
            row.product_name.clone(),
            row.ciqual_name.clone(),
            row.ciqual_code.clone(),
            row.location.clone(),
            row.location_osm_id.to_string(),
            format!("{:.1}", row.quantity_g),
            format!("{:.2}", row.price),
        ];
        record.extend(row.levels.iter().map(|level| level.to_string()));
        writer.write_record(&record)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
