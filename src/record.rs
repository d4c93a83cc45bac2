use chrono::{NaiveDate, NaiveDateTime, Timelike};
use lazy_regex::regex;
use serde_json::Value;

pub const CURRENCY: &str = "VND";

/// Brand tokens looked up (case-insensitive) inside a product name when the
/// page itself does not state a brand. First match wins.
pub const BRAND_KEYWORDS: &[(&str, &str)] = &[
    ("thinkpad", "LENOVO"),
    ("ideapad", "LENOVO"),
    ("legion", "LENOVO"),
    ("macbook", "APPLE"),
    ("vivobook", "ASUS"),
    ("zenbook", "ASUS"),
    ("rog", "ASUS"),
    ("tuf", "ASUS"),
    ("pavilion", "HP"),
    ("dell", "DELL"),
    ("asus", "ASUS"),
    ("acer", "ACER"),
    ("lenovo", "LENOVO"),
    ("msi", "MSI"),
    ("apple", "APPLE"),
    ("razer", "RAZER"),
    ("gigabyte", "GIGABYTE"),
    ("huawei", "HUAWEI"),
    ("microsoft", "MICROSOFT"),
    ("samsung", "SAMSUNG"),
    ("xiaomi", "XIAOMI"),
    ("realme", "REALME"),
    ("hp", "HP"),
];

pub const LAPTOP_KEYWORDS: &[&str] = &[
    "laptop", "macbook", "notebook", "thinkpad", "vivobook", "tuf", "rog", "legion", "pavilion",
    "zenbook", "ideapad",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub brand: String,
    pub product_name: String,
    pub price: i64,
    pub currency: String,
    pub source: String,
    pub url: String,
    pub timestamp: NaiveDateTime,
    pub sold_count: Option<i64>,
}

impl ProductRecord {
    /// The (date, hour) pair the record falls into in `dim_time`.
    pub fn time_bucket(&self) -> (NaiveDate, u32) {
        (self.timestamp.date(), self.timestamp.hour())
    }
}

/// The brand field of an embedded product descriptor as found in the wild:
/// a bare string, a one-element list, an object with a `name`, or missing.
#[derive(Debug)]
pub enum BrandField<'a> {
    Str(&'a str),
    List(&'a [Value]),
    Object(&'a serde_json::Map<String, Value>),
    Absent,
}

impl<'a> BrandField<'a> {
    pub fn from_json(value: Option<&'a Value>) -> Self {
        match value {
            Some(Value::String(s)) => BrandField::Str(s),
            Some(Value::Array(items)) => BrandField::List(items),
            Some(Value::Object(map)) => BrandField::Object(map),
            _ => BrandField::Absent,
        }
    }

    /// Normalized (uppercased) brand name, if the field carries one.
    pub fn normalize(&self) -> Option<String> {
        let raw = match self {
            BrandField::Str(s) => Some(*s),
            BrandField::List(items) => items.first().and_then(|v| match v {
                Value::String(s) => Some(s.as_str()),
                Value::Object(map) => map.get("name").and_then(Value::as_str),
                _ => None,
            }),
            BrandField::Object(map) => map.get("name").and_then(Value::as_str),
            BrandField::Absent => None,
        };
        raw.map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_uppercase)
    }
}

/// Infer a brand from the product name via the keyword whitelist.
pub fn brand_from_name(name: &str) -> Option<String> {
    let lower = name.to_lowercase();
    BRAND_KEYWORDS
        .iter()
        .find(|(token, _)| lower.contains(token))
        .map(|(_, brand)| (*brand).to_string())
}

pub fn normalize_brand(brand: Option<String>, product_name: &str) -> String {
    brand
        .filter(|b| !b.trim().is_empty())
        .map(|b| b.trim().to_uppercase())
        .or_else(|| brand_from_name(product_name))
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

pub fn normalize_source(source: &str) -> String {
    source.trim().to_lowercase()
}

/// Parse a displayed price into whole currency units.
///
/// Price ranges ("15.990.000 - 17.990.000") take the lower bound. Dots and
/// commas are thousands separators. Anything that does not resolve to a
/// positive integer is `None`.
pub fn parse_price(text: &str) -> Option<i64> {
    let text = text.split('-').next()?;
    let run = regex!(r"[\d.,]+").find(text)?;
    let digits: String = run.as_str().chars().filter(char::is_ascii_digit).collect();
    let value = digits.parse::<i64>().ok()?;
    (value > 0).then(|| value)
}

/// Parse a "sold" figure, accepting `k` shorthand ("1.5k" is 1500) and
/// thousands separators ("2,000" is 2000). Unparsable input is `None`.
pub fn parse_sold_count(text: &str) -> Option<i64> {
    let s = text
        .to_lowercase()
        .replace("đã bán", "")
        .replace(' ', "")
        .replace('+', "");
    if let Some(prefix) = s.strip_suffix('k') {
        let n = prefix.replace(',', ".").parse::<f64>().ok()?;
        let v = (n * 1000.0) as i64;
        return (v >= 0).then(|| v);
    }
    let digits: String = s.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() || digits.len() != s.chars().filter(|c| *c != ',' && *c != '.').count() {
        return None;
    }
    digits.parse::<i64>().ok()
}
