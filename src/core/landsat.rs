use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::collectors::earth_engine::{EarthEngine, EeError, ThumbnailRequest};
use crate::core::expr::{Geometry, Image, ImageCollection};
use crate::core::geometry::BoundingBox;

pub const LANDSAT8_TOA: &str = "LANDSAT/LC8_L1T_TOA";

/// BQA values flagging cloud: high-confidence cirrus, high-confidence
/// non-cirrus, low-confidence cirrus.
pub const CLOUD_BQA_VALUES: [u32; 3] = [61440, 53248, 28672];

pub const RGB_BANDS: [&str; 3] = ["B6", "B5", "B4"];
pub const PAN_BAND: &str = "B8";

pub const VIS_MIN: f64 = 0.01;
pub const VIS_MAX: f64 = 0.5;
pub const VIS_GAMMA: f64 = 1.7;
pub const THUMB_SCALE: u32 = 30;
pub const THUMB_CRS: &str = "EPSG:4326";

#[derive(Debug, Error)]
pub enum LandsatError {
    #[error(transparent)]
    Engine(#[from] EeError),
    #[error("no Landsat 8 scene in the {offset_days} days before {alert_date}")]
    NoScene { alert_date: NaiveDate, offset_days: i64 },
    #[error("{days} days before {date} is outside the supported calendar")]
    DateRange { date: NaiveDate, days: i64 },
    #[error("unexpected collection info: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Asset path of a single Landsat scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneId(String);

impl SceneId {
    pub fn new(id: impl Into<String>) -> Self {
        SceneId(id.into())
    }

    /// Full asset path; ids reported relative to the `LANDSAT/` root get it prefixed.
    pub fn asset_path(&self) -> String {
        if self.0.starts_with("LANDSAT/") {
            self.0.clone()
        } else {
            format!("LANDSAT/{}", self.0)
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeatureInfo {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    #[serde(default)]
    features: Vec<FeatureInfo>,
}

/// `date` moved `days` back, or [`LandsatError::DateRange`] past the calendar's start.
pub fn days_before(date: NaiveDate, days: i64) -> Result<NaiveDate, LandsatError> {
    Duration::try_days(days)
        .and_then(|d| date.checked_sub_signed(d))
        .ok_or(LandsatError::DateRange { date, days })
}

fn windowed(alert_date: NaiveDate, offset_days: i64) -> Result<ImageCollection, LandsatError> {
    let begin = days_before(alert_date, offset_days)?;
    Ok(ImageCollection::load(LANDSAT8_TOA).filter_date(begin, alert_date))
}

/// Most recent scene acquired within `offset_days` before `alert_date` that
/// touches the box.
pub async fn landsat_id<E: EarthEngine + ?Sized>(
    engine: &E,
    alert_date: NaiveDate,
    bbox: &BoundingBox,
    offset_days: i64,
) -> Result<SceneId, LandsatError> {
    let poly = Geometry::from_geojson(bbox.to_geojson());
    let latest = windowed(alert_date, offset_days)?
        .filter_bounds(&poly)
        .sort("system:time_start", false)
        .limit(1);

    let info: CollectionInfo = serde_json::from_value(engine.compute_value(latest.expr()).await?)?;
    let scene = info
        .features
        .into_iter()
        .next()
        .ok_or(LandsatError::NoScene { alert_date, offset_days })?;

    debug!(%alert_date, offset_days, scene = %scene.id, "Resolved nearest scene");
    Ok(SceneId(scene.id))
}

/// Per-pixel median of every scene in the window, clipped to the box.
pub fn landsat_median(alert_date: NaiveDate, bbox: &BoundingBox, offset_days: i64) -> Result<Image, LandsatError> {
    let poly = Geometry::from_geojson(bbox.to_geojson());
    Ok(windowed(alert_date, offset_days)?.median().clip(&poly))
}

pub fn cloud_mask(img: &Image) -> Image {
    let quality = img.select(&["BQA"]);
    let [hc, hn, lc] = CLOUD_BQA_VALUES.map(|v| quality.eq(v));
    let cloudy = hc.or(&hn).or(&lc);
    img.with_mask(&img.mask().and(&cloudy.not()))
}

/// Pan-sharpens `rgb` by swapping its HSV value channel for `gray`.
pub fn hsv_pan(rgb: &Image, gray: &Image) -> Image {
    let huesat = rgb.rgb_to_hsv().select(&["hue", "saturation"]);
    Image::cat(&huesat, gray).hsv_to_rgb()
}

/// Cloud-masked, pan-sharpened true-colour rendering of `scene` over the box.
pub fn thumbnail_request(scene: &SceneId, bbox: &BoundingBox) -> ThumbnailRequest {
    let input = cloud_mask(&Image::load(&scene.asset_path()));
    let rgb = input.select(&RGB_BANDS);
    let pan = input.select(&[PAN_BAND]);
    let sharp = hsv_pan(&rgb, &pan);

    ThumbnailRequest {
        image: sharp.visualize(VIS_MIN, VIS_MAX, VIS_GAMMA),
        scale: THUMB_SCALE,
        crs: THUMB_CRS,
        region: *bbox,
    }
}

pub async fn thumbnail_url<E: EarthEngine + ?Sized>(
    engine: &E,
    scene: &SceneId,
    bbox: &BoundingBox,
) -> Result<String, LandsatError> {
    Ok(engine.thumbnail_url(&thumbnail_request(scene, bbox)).await?)
}
