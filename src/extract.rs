use crate::fetch::Fetcher;
use crate::record::{
    normalize_brand, normalize_source, parse_price, parse_sold_count, BrandField, ProductRecord,
    CURRENCY, LAPTOP_KEYWORDS,
};
use lazy_regex::{regex, regex_is_match};
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

const E: &str = "Invalid selector";
lazy_static! {
    static ref JSON_LD: Selector =
        Selector::parse(r#"script[type="application/ld+json"]"#).expect(E);
    static ref H1: Selector = Selector::parse("h1").expect(E);
    static ref TITLE: Selector = Selector::parse("title").expect(E);
    static ref PRICE_DISPLAY: Selector =
        Selector::parse(".price, .product-price, .price-value, .gia, .box-price-present")
            .expect(E);
    static ref PRICE_META: Selector =
        Selector::parse(r#"meta[itemprop="price"], meta[property="product:price:amount"]"#)
            .expect(E);
    static ref DATA_PRICE: Selector = Selector::parse("[data-price]").expect(E);
    static ref SCRIPT: Selector = Selector::parse("script").expect(E);
    static ref SOLD: Selector = Selector::parse(
        "span.quantity-sale, .product-quantity-sold, .productView-soldCount"
    )
    .expect(E);
}

/// Fetch one candidate URL and extract a validated product record from it.
/// Anything that goes wrong (fetch failure, no price, fails the sanity
/// checks) yields `None`; the caller logs and moves on.
pub async fn extract(fetcher: &Fetcher, url: &str, source: &str) -> Option<ProductRecord> {
    let body = fetcher.get(url).await?;
    let record = parse_product_page(&body, url, source);
    if record.is_none() {
        debug!("no valid product at {}", url);
    }
    record
}

/// The extraction chain over an already-fetched page: embedded structured
/// data first, then heading/title for the name, then a ladder of price
/// fallbacks, then brand inference from the name.
pub fn parse_product_page(body: &str, url: &str, source: &str) -> Option<ProductRecord> {
    let doc = Html::parse_document(body);
    let structured = embedded_product(&doc);

    let mut name = String::new();
    let mut brand: Option<String> = None;
    let mut price: Option<i64> = None;

    if let Some(product) = &structured {
        name = product
            .get("name")
            .or_else(|| product.get("headline"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string();
        brand = BrandField::from_json(product.get("brand")).normalize();
        price = offer_price(product);
    }

    if name.is_empty() {
        name = heading_text(&doc);
    }
    if price.is_none() {
        price = price_fallbacks(&doc);
    }
    let brand = normalize_brand(brand, &name);
    let sold_count = sold_count(&doc);

    let price = price.filter(|p| *p > 0)?;
    if name.is_empty() {
        return None;
    }
    // Without structured data the page could be anything; require a laptop
    // keyword in the name or a product-shaped URL.
    if structured.is_none() {
        let lname = name.to_lowercase();
        let keyword_hit = LAPTOP_KEYWORDS.iter().any(|k| lname.contains(k));
        if !keyword_hit && !is_product_path(url) {
            return None;
        }
    }

    Some(ProductRecord {
        brand,
        product_name: name,
        price,
        currency: CURRENCY.to_string(),
        source: normalize_source(source),
        url: url.trim().to_string(),
        timestamp: chrono::Local::now().naive_local(),
        sold_count,
    })
}

/// Locate a machine-readable `Product` descriptor among the page's JSON-LD
/// blocks, either top-level or inside a list.
fn embedded_product(doc: &Html) -> Option<Value> {
    for script in doc.select(&JSON_LD) {
        let text = script.text().collect::<String>();
        let Ok(data) = serde_json::from_str::<Value>(text.trim()) else {
            continue;
        };
        match data {
            Value::Object(_) if is_product(&data) => return Some(data),
            Value::Array(items) => {
                if let Some(item) = items.into_iter().find(is_product) {
                    return Some(item);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_product(value: &Value) -> bool {
    value.get("@type").and_then(Value::as_str) == Some("Product")
}

/// Price out of the descriptor's `offers` block, with the
/// `priceSpecification` variant some pages use instead.
fn offer_price(product: &Value) -> Option<i64> {
    let offers = product.get("offers")?;
    let raw = offers
        .get("price")
        .or_else(|| offers.get("priceSpecification")?.get("price"))?;
    match raw {
        Value::String(s) => parse_price(s),
        Value::Number(n) => n.as_i64().filter(|v| *v > 0),
        _ => None,
    }
}

fn heading_text(doc: &Html) -> String {
    doc.select(&H1)
        .next()
        .or_else(|| doc.select(&TITLE).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Price fallback ladder: display element, meta tags, `data-price`
/// attribute, and finally a regex scan of inline script text.
fn price_fallbacks(doc: &Html) -> Option<i64> {
    if let Some(el) = doc.select(&PRICE_DISPLAY).next() {
        let text = el.text().collect::<String>();
        if let Some(p) = parse_price(text.trim()) {
            return Some(p);
        }
    }

    if let Some(p) = doc
        .select(&PRICE_META)
        .next()
        .and_then(|el| el.value().attr("content"))
        .and_then(parse_price)
    {
        return Some(p);
    }

    if let Some(p) = doc
        .select(&DATA_PRICE)
        .next()
        .and_then(|el| el.value().attr("data-price"))
        .and_then(parse_price)
    {
        return Some(p);
    }

    for script in doc.select(&SCRIPT) {
        let text = script.text().collect::<String>();
        if let Some(cap) = regex!(r#""price"\s*:\s*"?([\d.,]+)"#).captures(&text) {
            if let Some(p) = parse_price(&cap[1]) {
                return Some(p);
            }
        }
    }

    None
}

fn sold_count(doc: &Html) -> Option<i64> {
    doc.select(&SOLD)
        .next()
        .map(|el| el.text().collect::<String>())
        .and_then(|text| parse_sold_count(text.trim()))
}

fn is_product_path(url: &str) -> bool {
    regex_is_match!(r"/laptop/|/macbook|-laptop-|/product/", &url.to_lowercase())
}
