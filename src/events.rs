//! Celestial event lookups: visible ISS passes from the tracking API and
//! fixed lists of meteor showers and eclipses.

use crate::{
    config::SatelliteConfig,
    domain::{Observer, PassPredictor, RawPass},
    errors::EventsError,
    models::{EclipseEvent, MeteorShower, PassQuery, VisiblePass},
};
use chrono::{DateTime, FixedOffset};

/// Passes must be brighter than this visual magnitude.
pub const MAX_MAGNITUDE: f64 = 2.5;
/// Passes must climb above this elevation, in degrees.
pub const MIN_ELEVATION: f64 = 10.0;

const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

pub fn is_visible(pass: &RawPass) -> bool {
    pass.mag < MAX_MAGNITUDE && pass.max_el > MIN_ELEVATION
}

/// `125` -> `"2 min 5 sec"`, `45` -> `"45 sec"`.
pub fn format_duration(seconds: u32) -> String {
    let (minutes, seconds) = (seconds / 60, seconds % 60);
    if minutes > 0 {
        format!("{} min {} sec", minutes, seconds)
    } else {
        format!("{} sec", seconds)
    }
}

fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).expect("+05:30 is a valid offset")
}

/// `None` if the start timestamp is outside chrono's range.
pub fn to_visible_pass(pass: &RawPass) -> Option<VisiblePass> {
    let start = DateTime::from_timestamp(pass.start_utc, 0)?.with_timezone(&ist());
    Some(VisiblePass {
        time_ist: start.format("%H:%M:%S IST").to_string(),
        date_ist: start.format("%Y-%m-%d").to_string(),
        direction: pass.start_az_compass.clone(),
        duration: format_duration(pass.duration),
    })
}

/// Fills in missing query coordinates from the configured observer.
pub fn observer_for(query: &PassQuery, defaults: &SatelliteConfig) -> Observer {
    Observer {
        lat: query.lat.unwrap_or(defaults.default_lat),
        lon: query.lon.unwrap_or(defaults.default_lon),
        alt: query.alt.unwrap_or(defaults.default_alt),
    }
}

/// Bright, high passes for `observer`, in upstream order.
pub async fn visible_passes(
    predictor: &dyn PassPredictor,
    observer: Observer,
) -> Result<Vec<VisiblePass>, EventsError> {
    let passes = predictor.visual_passes(observer).await?;
    let total = passes.len();
    let visible = passes
        .iter()
        .filter(|p| is_visible(p))
        .map(|p| to_visible_pass(p).ok_or(EventsError::InvalidPassTime(p.start_utc)))
        .collect::<Result<Vec<VisiblePass>, _>>()?;
    tracing::info!(total, visible = visible.len(), lat = observer.lat, lon = observer.lon, "Filtered satellite passes");
    Ok(visible)
}

pub fn meteor_showers() -> Vec<MeteorShower> {
    let shower = |name: &str, date_range: &str| MeteorShower {
        name: name.to_string(),
        date_range: date_range.to_string(),
        peak_location: "New Delhi".to_string(),
        hemisphere: "Northern Hemisphere (Best)".to_string(),
    };
    vec![
        shower("Perseids", "12–13 Aug 2025"),
        shower("Draconids", "8–9 Oct 2025"),
    ]
}

fn eclipse(date: &str, kind: &str) -> EclipseEvent {
    EclipseEvent {
        date: date.to_string(),
        kind: kind.to_string(),
    }
}

pub fn solar_eclipses() -> Vec<EclipseEvent> {
    vec![
        eclipse("21 Sep 2025", "Partial Solar Eclipse"),
        eclipse("17 Feb 2026", "Annular Solar Eclipse"),
        eclipse("12 Aug 2026", "Total Solar Eclipse"),
    ]
}

pub fn lunar_eclipses() -> Vec<EclipseEvent> {
    vec![
        eclipse("7 Sep 2025", "Total Lunar Eclipse"),
        eclipse("3 Mar 2026", "Total Lunar Eclipse"),
        eclipse("28 Aug 2026", "Partial Lunar Eclipse"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::StaticPassPredictor;

    fn pass(mag: f64, max_el: f64) -> RawPass {
        RawPass {
            start_utc: 0,
            duration: 300,
            mag,
            max_el,
            start_az_compass: "NW".into(),
        }
    }

    #[test]
    fn filters_dim_and_low_passes() {
        assert!(!is_visible(&pass(3.0, 80.0)));
        assert!(!is_visible(&pass(-3.0, 5.0)));
        assert!(is_visible(&pass(1.0, 45.0)));
        // Bounds are strict.
        assert!(!is_visible(&pass(2.5, 45.0)));
        assert!(!is_visible(&pass(1.0, 10.0)));
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(125), "2 min 5 sec");
        assert_eq!(format_duration(45), "45 sec");
        assert_eq!(format_duration(60), "1 min 0 sec");
        assert_eq!(format_duration(0), "0 sec");
    }

    #[test]
    fn converts_start_to_ist() {
        // 2025-08-12T18:45:00Z
        let mut p = pass(1.0, 45.0);
        p.start_utc = 1_755_024_300;
        p.start_az_compass = "WSW".into();
        let visible = to_visible_pass(&p).unwrap();
        assert_eq!(visible.time_ist, "00:15:00 IST");
        assert_eq!(visible.date_ist, "2025-08-13");
        assert_eq!(visible.direction, "WSW");
        assert_eq!(visible.duration, "5 min 0 sec");
    }

    #[test]
    fn observer_defaults_fill_gaps() {
        let defaults = SatelliteConfig::default();
        let observer = observer_for(
            &PassQuery { lat: Some(10.0), lon: None, alt: None },
            &defaults,
        );
        assert_eq!(observer, Observer { lat: 10.0, lon: 77.2090, alt: 0 });
    }

    #[tokio::test]
    async fn keeps_upstream_order_of_surviving_passes() {
        let mut first = pass(1.0, 45.0);
        first.start_az_compass = "N".into();
        let mut last = pass(-1.0, 60.0);
        last.start_az_compass = "S".into();
        last.start_utc = -100; // earlier than `first`, must not be re-sorted
        let predictor = StaticPassPredictor::new(vec![first, pass(3.0, 50.0), pass(1.0, 5.0), last]);

        let visible = visible_passes(&predictor, Observer { lat: 0.0, lon: 0.0, alt: 0 })
            .await
            .unwrap();
        let directions: Vec<_> = visible.iter().map(|v| v.direction.as_str()).collect();
        assert_eq!(directions, ["N", "S"]);
    }

    #[test]
    fn static_lists_are_populated() {
        assert_eq!(meteor_showers().len(), 2);
        assert_eq!(solar_eclipses()[2].kind, "Total Solar Eclipse");
        assert_eq!(lunar_eclipses()[0].date, "7 Sep 2025");
    }

    #[tokio::test]
    async fn unrepresentable_start_time_is_an_upstream_error() {
        let mut broken = pass(1.0, 45.0);
        broken.start_utc = i64::MAX;
        let predictor = StaticPassPredictor::new(vec![pass(1.0, 45.0), broken]);

        let err = visible_passes(&predictor, Observer { lat: 0.0, lon: 0.0, alt: 0 })
            .await
            .unwrap_err();
        assert!(matches!(err, EventsError::InvalidPassTime(i64::MAX)));
    }
}
