//! Expression graph understood by the imagery platform.
//!
//! Nothing here is evaluated locally. Every method only grows an invocation tree
//! that gets serialised and shipped to the platform, which does the pixel work.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Value),
    /// Milliseconds since the unix epoch.
    Date(i64),
    Invocation {
        function: &'static str,
        args: BTreeMap<&'static str, Expr>,
    },
}

impl Expr {
    fn invoke<const N: usize>(function: &'static str, args: [(&'static str, Expr); N]) -> Self {
        Expr::Invocation { function, args: args.into_iter().collect() }
    }

    pub fn date(d: NaiveDate) -> Self {
        Expr::Date(d.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
    }

    pub fn to_json(&self) -> Value {
        match self {
            Expr::Constant(v) => v.clone(),
            Expr::Date(ms) => json!({ "type": "Date", "value": ms }),
            Expr::Invocation { function, args } => {
                let args: serde_json::Map<String, Value> =
                    args.iter().map(|(k, v)| (k.to_string(), v.to_json())).collect();
                json!({
                    "type": "Invocation",
                    "functionName": function,
                    "arguments": args,
                })
            }
        }
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Constant(v)
    }
}

/// A GeoJSON geometry literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry(Value);

impl Geometry {
    pub fn from_geojson(geojson: Value) -> Self {
        Geometry(geojson)
    }

    fn expr(&self) -> Expr {
        Expr::Constant(self.0.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter(Expr);

impl Filter {
    /// Matches `system:time_start` in `[start, end)`.
    pub fn date_range(start: NaiveDate, end: NaiveDate) -> Self {
        let range = Expr::invoke("DateRange", [("start", Expr::date(start)), ("end", Expr::date(end))]);
        Filter(Expr::invoke(
            "Filter.dateRangeContains",
            [("leftValue", range), ("rightField", json!("system:time_start").into())],
        ))
    }

    pub fn intersects(geometry: &Geometry) -> Self {
        Filter(Expr::invoke(
            "Filter.intersects",
            [("leftField", json!(".all").into()), ("rightValue", geometry.expr())],
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image(Expr);

impl Image {
    pub fn load(id: &str) -> Self {
        Image(Expr::invoke("Image.load", [("id", json!(id).into())]))
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Image(Expr::invoke("Image.constant", [("value", Expr::Constant(value.into()))]))
    }

    /// `ee.Image.cat`: bands of `first` followed by bands of `second`.
    pub fn cat(first: &Image, second: &Image) -> Self {
        Image(Expr::invoke("Image.addBands", [("dstImg", first.0.clone()), ("srcImg", second.0.clone())]))
    }

    pub fn select(&self, bands: &[&str]) -> Self {
        Image(Expr::invoke(
            "Image.select",
            [("input", self.0.clone()), ("bandSelectors", json!(bands).into())],
        ))
    }

    pub fn eq(&self, value: impl Into<Value>) -> Self {
        self.binary("Image.eq", &Image::constant(value))
    }

    pub fn or(&self, other: &Image) -> Self {
        self.binary("Image.or", other)
    }

    pub fn and(&self, other: &Image) -> Self {
        self.binary("Image.and", other)
    }

    pub fn not(&self) -> Self {
        Image(Expr::invoke("Image.not", [("value", self.0.clone())]))
    }

    /// Current mask of the image.
    pub fn mask(&self) -> Self {
        Image(Expr::invoke("Image.mask", [("image", self.0.clone())]))
    }

    /// Same image with `mask` replacing its mask.
    pub fn with_mask(&self, mask: &Image) -> Self {
        Image(Expr::invoke("Image.mask", [("image", self.0.clone()), ("mask", mask.0.clone())]))
    }

    pub fn rgb_to_hsv(&self) -> Self {
        Image(Expr::invoke("Image.rgbToHsv", [("image", self.0.clone())]))
    }

    pub fn hsv_to_rgb(&self) -> Self {
        Image(Expr::invoke("Image.hsvToRgb", [("image", self.0.clone())]))
    }

    pub fn clip(&self, geometry: &Geometry) -> Self {
        Image(Expr::invoke("Image.clip", [("input", self.0.clone()), ("geometry", geometry.expr())]))
    }

    pub fn visualize(&self, min: f64, max: f64, gamma: f64) -> Self {
        Image(Expr::invoke(
            "Image.visualize",
            [
                ("image", self.0.clone()),
                ("min", json!(min).into()),
                ("max", json!(max).into()),
                ("gamma", json!(gamma).into()),
            ],
        ))
    }

    pub fn expr(&self) -> &Expr {
        &self.0
    }

    fn binary(&self, function: &'static str, other: &Image) -> Self {
        Image(Expr::invoke(function, [("image1", self.0.clone()), ("image2", other.0.clone())]))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageCollection(Expr);

impl ImageCollection {
    pub fn load(id: &str) -> Self {
        ImageCollection(Expr::invoke("ImageCollection.load", [("id", json!(id).into())]))
    }

    pub fn filter(&self, filter: Filter) -> Self {
        ImageCollection(Expr::invoke("Collection.filter", [("collection", self.0.clone()), ("filter", filter.0)]))
    }

    pub fn filter_date(&self, start: NaiveDate, end: NaiveDate) -> Self {
        self.filter(Filter::date_range(start, end))
    }

    pub fn filter_bounds(&self, geometry: &Geometry) -> Self {
        self.filter(Filter::intersects(geometry))
    }

    pub fn sort(&self, property: &str, ascending: bool) -> Self {
        ImageCollection(Expr::invoke(
            "Collection.limit",
            [
                ("collection", self.0.clone()),
                ("key", json!(property).into()),
                ("ascending", json!(ascending).into()),
            ],
        ))
    }

    pub fn limit(&self, n: u32) -> Self {
        ImageCollection(Expr::invoke("Collection.limit", [("collection", self.0.clone()), ("limit", json!(n).into())]))
    }

    /// Per-pixel median over every image in the collection.
    pub fn median(&self) -> Image {
        Image(Expr::invoke("reduce.median", [("collection", self.0.clone())]))
    }

    pub fn expr(&self) -> &Expr {
        &self.0
    }
}
