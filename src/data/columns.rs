//! Canonical column names (case-sensitive, as they appear in the input header)

pub const QUANTITY: &str = "QUANTITYORDERED";
pub const PRICE_EACH: &str = "PRICEEACH";
pub const MSRP: &str = "MSRP";
pub const ORDER_DATE: &str = "ORDERDATE";
pub const DEAL_SIZE: &str = "DEALSIZE";
pub const STATUS: &str = "STATUS";
pub const TERRITORY: &str = "TERRITORY";
pub const PRODUCT_LINE: &str = "PRODUCTLINE";
pub const CUSTOMER_NAME: &str = "CUSTOMERNAME";
pub const SALES: &str = "SALES";
pub const QTR_ID: &str = "QTR_ID";
pub const MONTH_ID: &str = "MONTH_ID";
pub const YEAR_ID: &str = "YEAR_ID";
pub const ORDER_LINE_NUMBER: &str = "ORDERLINENUMBER";

// Derived
pub const TOTAL_PROFIT: &str = "TOTAL_PROFIT";
pub const CUSTOMER_SEGMENT: &str = "CUSTOMER_SEGMENT";
pub const DEAL_SIZE_NUMERIC: &str = "DEALSIZE_NUMERIC";
pub const STATUS_NUMERIC: &str = "STATUS_NUMERIC";
pub const TERRITORY_RANK: &str = "TERRITORY_RANK";
pub const YEAR: &str = "YEAR";
pub const MONTH: &str = "MONTH";
pub const DAY: &str = "DAY";
pub const DAY_OF_WEEK: &str = "DAYOFWEEK";
pub const QUARTER: &str = "QUARTER";
pub const PROFIT_MARGIN: &str = "PROFIT_MARGIN";
pub const TOTAL_QUANTITY: &str = "TOTAL_QUANTITY";
pub const AVG_SALES: &str = "AVG_SALES";
pub const ORDER_COUNT: &str = "ORDER_COUNT";

/// Columns a record cannot be modelled without
pub const REQUIRED: [&str; 3] = [SALES, QUANTITY, PRICE_EACH];

/// Default regression target
pub const DEFAULT_TARGET: &str = TOTAL_PROFIT;

/// Model features in their fixed order; only the ones present are used
pub const FEATURE_COLUMNS: [&str; 19] = [
    QUANTITY,
    PRICE_EACH,
    MSRP,
    QTR_ID,
    MONTH_ID,
    YEAR_ID,
    DEAL_SIZE_NUMERIC,
    STATUS_NUMERIC,
    TERRITORY_RANK,
    ORDER_LINE_NUMBER,
    YEAR,
    MONTH,
    DAY,
    DAY_OF_WEEK,
    QUARTER,
    PROFIT_MARGIN,
    TOTAL_QUANTITY,
    AVG_SALES,
    ORDER_COUNT,
];
