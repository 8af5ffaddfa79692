//! Dataset insights: exploratory summary, KPIs, group totals and what-if scenarios

use std::collections::HashMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use super::columns::{CUSTOMER_NAME, ORDER_DATE, PRODUCT_LINE, SALES, TERRITORY, TOTAL_PROFIT};
use super::frame::{ColumnData, ColumnKind, SalesFrame};
use crate::error::{Result, SalesMlError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnStats {
    Numeric {
        count: usize,
        mean: Option<f64>,
        /// Sample standard deviation, absent below two values
        std: Option<f64>,
        min: Option<f64>,
        max: Option<f64>,
    },
    Categorical {
        count: usize,
        unique: usize,
        top: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,
    pub null_count: usize,
    pub stats: ColumnStats,
}

/// Exploratory summary of every column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdaSummary {
    pub n_rows: usize,
    pub n_columns: usize,
    pub columns: Vec<ColumnProfile>,
}

impl EdaSummary {
    pub fn from_frame(frame: &SalesFrame) -> Self {
        let columns = frame
            .columns()
            .iter()
            .map(|column| {
                let stats = match &column.data {
                    ColumnData::Numeric(values) => numeric_stats(values),
                    ColumnData::Text(values) => categorical_stats(values.iter().cloned()),
                    ColumnData::Date(values) => {
                        categorical_stats(values.iter().map(|v| v.map(|d| d.to_string())))
                    }
                };
                ColumnProfile {
                    name: column.name.clone(),
                    kind: column.data.kind(),
                    null_count: column.data.null_count(),
                    stats,
                }
            })
            .collect();

        Self {
            n_rows: frame.n_rows(),
            n_columns: frame.n_columns(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }
}

fn numeric_stats(values: &[Option<f64>]) -> ColumnStats {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let count = present.len();
    let mean = (count > 0).then(|| present.iter().sum::<f64>() / count as f64);
    let std = mean.filter(|_| count > 1).map(|m| {
        (present.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
    });
    ColumnStats::Numeric {
        count,
        mean,
        std,
        min: present.iter().copied().reduce(f64::min),
        max: present.iter().copied().reduce(f64::max),
    }
}

/// Distinct count and most frequent value; ties go to the value seen first
fn categorical_stats(values: impl Iterator<Item = Option<String>>) -> ColumnStats {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut count = 0;
    for value in values.flatten() {
        count += 1;
        match index.get(&value) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(value.clone(), order.len());
                order.push((value, 1));
            }
        }
    }
    let top = order
        .iter()
        .fold(None::<&(String, usize)>, |best, item| match best {
            Some(b) if b.1 >= item.1 => Some(b),
            _ => Some(item),
        })
        .map(|(value, _)| value.clone());

    ColumnStats::Categorical {
        count,
        unique: order.len(),
        top,
    }
}

/// Headline figures for a (possibly filtered) dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub total_sales: f64,
    pub total_orders: usize,
    pub average_order_value: f64,
    pub unique_customers: usize,
    pub total_profit: f64,
}

impl Kpis {
    pub fn from_frame(frame: &SalesFrame) -> Self {
        let sales: Vec<f64> = frame
            .numeric(SALES)
            .map(|v| v.iter().flatten().copied().collect())
            .unwrap_or_default();
        let total_sales: f64 = sales.iter().sum();
        let average_order_value = if sales.is_empty() {
            0.0
        } else {
            total_sales / sales.len() as f64
        };
        let unique_customers = (0..frame.n_rows())
            .filter_map(|row| frame.cell_label(CUSTOMER_NAME, row))
            .collect::<std::collections::HashSet<_>>()
            .len();
        let total_profit = frame
            .numeric(TOTAL_PROFIT)
            .map(|v| v.iter().flatten().sum())
            .unwrap_or(0.0);

        Self {
            total_sales,
            total_orders: frame.n_rows(),
            average_order_value,
            unique_customers,
            total_profit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupTotal {
    pub key: String,
    pub total: f64,
    pub count: usize,
}

/// Sum of `value` per distinct `key`, largest total first
///
/// Rows with a null key are skipped; null values count as zero.
pub fn group_totals(frame: &SalesFrame, key: &str, value: &str) -> Result<Vec<GroupTotal>> {
    let missing: Vec<String> = [key, value]
        .iter()
        .filter(|c| !frame.has_column(c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SalesMlError::MissingRequiredColumns { missing });
    }
    let values = frame.numeric(value).ok_or_else(|| {
        SalesMlError::InsufficientData(format!("column '{value}' is not numeric"))
    })?;

    let mut groups: Vec<GroupTotal> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (row, v) in values.iter().enumerate() {
        let Some(label) = frame.cell_label(key, row) else {
            continue;
        };
        let i = *index.entry(label.clone()).or_insert_with(|| {
            groups.push(GroupTotal {
                key: label,
                total: 0.0,
                count: 0,
            });
            groups.len() - 1
        });
        groups[i].total += v.unwrap_or(0.0);
        groups[i].count += 1;
    }
    groups.sort_by(|a, b| b.total.total_cmp(&a.total));
    Ok(groups)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    pub year: i32,
    pub month: u32,
    pub total: f64,
}

/// Sum of `value` per order month, oldest first
pub fn monthly_totals(frame: &SalesFrame, value: &str) -> Result<Vec<MonthlyTotal>> {
    let dates = frame.dates(ORDER_DATE).ok_or_else(|| SalesMlError::MissingRequiredColumns {
        missing: vec![ORDER_DATE.to_string()],
    })?;
    let values = frame.numeric(value).ok_or_else(|| SalesMlError::MissingRequiredColumns {
        missing: vec![value.to_string()],
    })?;

    let mut totals: std::collections::BTreeMap<(i32, u32), f64> = Default::default();
    for (date, v) in dates.iter().zip(values) {
        if let Some(date) = date {
            *totals.entry((date.year(), date.month())).or_default() += v.unwrap_or(0.0);
        }
    }
    Ok(totals
        .into_iter()
        .map(|((year, month), total)| MonthlyTotal { year, month, total })
        .collect())
}

/// Profit gained by growing the most profitable product line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioImpact {
    pub product_line: String,
    pub current_profit: f64,
    pub uplift_pct: f64,
    pub impact: f64,
}

/// Impact of raising the top product line's profit by `uplift_pct` percent
pub fn best_product_uplift(frame: &SalesFrame, uplift_pct: f64) -> Result<Option<ScenarioImpact>> {
    let totals = group_totals(frame, PRODUCT_LINE, TOTAL_PROFIT)?;
    Ok(totals.into_iter().next().map(|best| ScenarioImpact {
        impact: best.total * uplift_pct / 100.0,
        product_line: best.key,
        current_profit: best.total,
        uplift_pct,
    }))
}

/// Profit estimate from the historical profit/sales margin of matching rows
///
/// `None` when no row matches or the matching rows have no sales.
pub fn quick_profit_estimate(
    frame: &SalesFrame,
    product_line: &str,
    territory: &str,
    quantity: f64,
    price: f64,
) -> Result<Option<f64>> {
    let (Some(sales), Some(profit)) = (frame.numeric(SALES), frame.numeric(TOTAL_PROFIT)) else {
        return Err(SalesMlError::MissingRequiredColumns {
            missing: [SALES, TOTAL_PROFIT]
                .iter()
                .filter(|c| frame.numeric(c).is_none())
                .map(|c| c.to_string())
                .collect(),
        });
    };

    let (mut sales_sum, mut profit_sum, mut matched) = (0.0, 0.0, 0usize);
    for row in 0..frame.n_rows() {
        let matches = frame.cell_label(PRODUCT_LINE, row).as_deref() == Some(product_line)
            && frame.cell_label(TERRITORY, row).as_deref() == Some(territory);
        if matches {
            matched += 1;
            sales_sum += sales[row].unwrap_or(0.0);
            profit_sum += profit[row].unwrap_or(0.0);
        }
    }

    if matched == 0 || sales_sum == 0.0 {
        return Ok(None);
    }
    Ok(Some(quantity * price * profit_sum / sales_sum))
}
