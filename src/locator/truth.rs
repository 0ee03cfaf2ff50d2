use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::collectors::earth_engine::{EarthEngine, EeError};
use crate::core::geometry::{create_box, BoundingBox};
use crate::core::landsat::{days_before, landsat_id, thumbnail_url, LandsatError};
use crate::locator::params::{prepare_params, AlertRequest, OutputFormat, ParamError};

/// Window searched backwards from each date for its nearest scene.
pub const SCENE_WINDOW_DAYS: i64 = 30;
/// Spacing between the historical snapshots.
pub const SNAPSHOT_STEP_DAYS: i64 = 30;

#[derive(Debug, Error)]
pub enum TruthError {
    #[error(transparent)]
    Params(#[from] ParamError),
    #[error(transparent)]
    Landsat(#[from] LandsatError),
    #[error("thumbnail fetch failed: {0}")]
    Fetch(#[source] EeError),
}

/// Thumbnail URLs on the alert date and 30, 60, 90 days before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThumbnailSet {
    pub alert_date: String,
    pub t_minus_one: String,
    pub t_minus_two: String,
    pub t_minus_three: String,
}

async fn snapshot<E: EarthEngine + ?Sized>(
    engine: &E,
    date: NaiveDate,
    bbox: &BoundingBox,
) -> Result<String, LandsatError> {
    let scene = landsat_id(engine, date, bbox, SCENE_WINDOW_DAYS).await?;
    thumbnail_url(engine, &scene, bbox).await
}

/// Resolves one thumbnail per snapshot date. Each date runs its own
/// nearest-scene search, one after another.
pub async fn thumbnail_set<E: EarthEngine + ?Sized>(
    engine: &E,
    req: &AlertRequest,
) -> Result<ThumbnailSet, LandsatError> {
    let bbox = create_box(req.lon, req.lat, req.w, req.h, true);
    let back = |steps: i64| days_before(req.date, SNAPSHOT_STEP_DAYS * steps);

    Ok(ThumbnailSet {
        alert_date: snapshot(engine, req.date, &bbox).await?,
        t_minus_one: snapshot(engine, back(1)?, &bbox).await?,
        t_minus_two: snapshot(engine, back(2)?, &bbox).await?,
        t_minus_three: snapshot(engine, back(3)?, &bbox).await?,
    })
}

/// Entry point for a truth lookup: returns the alert-date thumbnail URL.
///
/// The three historical thumbnails are still resolved but not returned. With
/// `fmt=raw` the alert-date image is downloaded as well and then dropped.
pub async fn find<E: EarthEngine + ?Sized>(
    engine: &E,
    params: &HashMap<String, String>,
) -> Result<String, TruthError> {
    let req = prepare_params(params)?;
    info!(?req, "Truth lookup");

    let set = thumbnail_set(engine, &req).await?;
    debug!(?set, "Resolved thumbnails");

    if req.fmt == OutputFormat::Raw {
        let raw = engine.fetch_thumbnail(&set.alert_date).await.map_err(TruthError::Fetch)?;
        debug!(bytes = raw.len(), "Fetched raw thumbnail");
    }

    Ok(set.alert_date)
}
