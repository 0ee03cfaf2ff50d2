use std::collections::HashMap;
use std::num::{ParseFloatError, ParseIntError};

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("missing parameter `{0}`")]
    Missing(&'static str),
    #[error("`{name}` must be two comma separated values, got {value:?}")]
    Shape { name: &'static str, value: String },
    #[error("invalid number in `ll`: {0}")]
    Float(#[from] ParseFloatError),
    #[error("invalid integer in `dim`: {0}")]
    Int(#[from] ParseIntError),
    #[error("invalid `date` (expected YYYY-MM-DD): {0}")]
    Date(#[from] chrono::ParseError),
}

/// Requested resolution. Values other than `thumb`/`true` are carried as given.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Resolution {
    Thumb,
    #[default]
    True,
    Other(String),
}

impl From<&str> for Resolution {
    fn from(s: &str) -> Self {
        match s {
            "thumb" => Resolution::Thumb,
            "true" => Resolution::True,
            other => Resolution::Other(other.to_string()),
        }
    }
}

/// Requested output. Only `raw` changes behaviour; anything else renders as an image URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Img,
    Raw,
    Other(String),
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s {
            "img" => OutputFormat::Img,
            "raw" => OutputFormat::Raw,
            other => OutputFormat::Other(other.to_string()),
        }
    }
}

/// One truth lookup, as requested by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRequest {
    pub lat: f64,
    pub lon: f64,
    /// Pixel height.
    pub h: i64,
    /// Pixel width.
    pub w: i64,
    pub date: NaiveDate,
    pub res: Resolution,
    pub fmt: OutputFormat,
    /// Accepted for compatibility, not used by the lookup.
    pub asset: Option<String>,
}

fn pair<'a>(params: &'a HashMap<String, String>, name: &'static str) -> Result<(&'a str, &'a str), ParamError> {
    let raw = params.get(name).ok_or(ParamError::Missing(name))?;
    let mut parts = raw.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), None) => Ok((a.trim(), b.trim())),
        _ => Err(ParamError::Shape { name, value: raw.clone() }),
    }
}

/// Builds an [`AlertRequest`] from flat query parameters.
///
/// `ll` is "lat,lon", `dim` is "h,w", `date` is YYYY-MM-DD. `res` falls back to
/// `true` and `fmt` to `img`.
pub fn prepare_params(params: &HashMap<String, String>) -> Result<AlertRequest, ParamError> {
    let (lat, lon) = pair(params, "ll")?;
    let (h, w) = pair(params, "dim")?;
    let date = params.get("date").ok_or(ParamError::Missing("date"))?;

    Ok(AlertRequest {
        lat: lat.parse()?,
        lon: lon.parse()?,
        h: h.parse()?,
        w: w.parse()?,
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d")?,
        res: params.get("res").map(|s| Resolution::from(s.as_str())).unwrap_or_default(),
        fmt: params.get("fmt").map(|s| OutputFormat::from(s.as_str())).unwrap_or_default(),
        asset: params.get("asset").cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn parses_and_defaults() {
        let req = prepare_params(&params(&[("ll", "1.5,2.5"), ("dim", "100,200"), ("date", "2014-06-01")])).unwrap();
        assert_eq!(req.lat, 1.5);
        assert_eq!(req.lon, 2.5);
        assert_eq!(req.h, 100);
        assert_eq!(req.w, 200);
        assert_eq!(req.date, NaiveDate::from_ymd_opt(2014, 6, 1).unwrap());
        assert_eq!(req.res, Resolution::True);
        assert_eq!(req.fmt, OutputFormat::Img);
        assert_eq!(req.asset, None);
    }

    #[test]
    fn explicit_options() {
        let req = prepare_params(&params(&[
            ("ll", "-3.2, 112.9"),
            ("dim", "256,256"),
            ("date", "2013-12-24"),
            ("res", "thumb"),
            ("fmt", "raw"),
            ("asset", "forma"),
        ]))
        .unwrap();
        assert_eq!((req.lat, req.lon), (-3.2, 112.9));
        assert_eq!(req.res, Resolution::Thumb);
        assert_eq!(req.fmt, OutputFormat::Raw);
        assert_eq!(req.asset.as_deref(), Some("forma"));
    }

    #[test]
    fn malformed_inputs() {
        let base = [("ll", "1.0,2.0"), ("dim", "256,256"), ("date", "2014-06-01")];
        let with = |k: &str, v: &str| {
            let mut p = params(&base);
            p.insert(k.to_string(), v.to_string());
            prepare_params(&p)
        };

        assert!(matches!(with("ll", "1.0"), Err(ParamError::Shape { name: "ll", .. })));
        assert!(matches!(with("ll", "1.0,2.0,3.0"), Err(ParamError::Shape { name: "ll", .. })));
        assert!(matches!(with("ll", "north,2.0"), Err(ParamError::Float(_))));
        assert!(matches!(with("dim", "256.5,256"), Err(ParamError::Int(_))));
        assert!(matches!(with("dim", "256,wide"), Err(ParamError::Int(_))));
        assert!(matches!(with("date", "06/01/2014"), Err(ParamError::Date(_))));

        let mut p = params(&base);
        p.remove("dim");
        assert!(matches!(prepare_params(&p), Err(ParamError::Missing("dim"))));
    }

    #[test]
    fn only_types_are_checked() {
        let base = [("ll", "1.0,2.0"), ("dim", "256,256"), ("date", "2014-06-01")];
        let with = |k: &str, v: &str| {
            let mut p = params(&base);
            p.insert(k.to_string(), v.to_string());
            prepare_params(&p).unwrap()
        };

        let req = with("dim", "-256,256");
        assert_eq!((req.h, req.w), (-256, 256));
        assert_eq!(with("res", "high").res, Resolution::Other("high".into()));
        assert_eq!(with("fmt", "png").fmt, OutputFormat::Other("png".into()));
    }
}
