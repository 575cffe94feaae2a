//! Declination at one location across the model's years.
//!
//! Each year is queried on January 1st, one call at a time. A year whose call
//! fails is skipped; the series only fails when no year could be fetched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::SeriesError,
    model::DeclinationRequest,
    provider::DeclinationProvider,
    validate::{self, MODEL_YEARS},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesRequest {
    latitude: f64,
    longitude: f64,
    elevation: Option<f64>,
    from_year: i32,
    to_year: i32,
    interval: u32,
}

impl SeriesRequest {
    pub fn new(
        latitude: f64,
        longitude: f64,
        elevation: Option<f64>,
        from_year: i32,
        to_year: i32,
        interval: u32,
    ) -> Result<Self, SeriesError> {
        validate::validate_coordinates(latitude, longitude)?;
        if let Some(meters) = elevation {
            validate::validate_elevation(meters)?;
        }
        for year in [from_year, to_year] {
            if !MODEL_YEARS.contains(&year) {
                return Err(validate::ValidationError::DateOutOfRange { year }.into());
            }
        }
        if from_year > to_year {
            return Err(SeriesError::InvalidRange { from: from_year, to: to_year });
        }
        if interval == 0 {
            return Err(SeriesError::ZeroInterval);
        }

        Ok(Self { latitude, longitude, elevation, from_year, to_year, interval })
    }

    /// Whole model window, one point per year.
    pub fn full_window(latitude: f64, longitude: f64) -> Result<Self, SeriesError> {
        Self::new(latitude, longitude, None, *MODEL_YEARS.start(), *MODEL_YEARS.end(), 1)
    }

    pub fn years(&self) -> impl Iterator<Item = i32> {
        (self.from_year..=self.to_year).step_by(self.interval as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub year: i32,
    pub declination_deg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub min_deg: f64,
    pub max_deg: f64,
    pub average_deg: f64,
    /// Last point minus first point.
    pub total_change_deg: f64,
    /// Zero when the points span less than a year.
    pub change_per_year_deg: f64,
}

impl SeriesStats {
    pub fn from_points(points: &[SeriesPoint]) -> Option<Self> {
        let (first, last) = (points.first()?, points.last()?);

        let min_deg = points.iter().map(|p| p.declination_deg).fold(f64::INFINITY, f64::min);
        let max_deg = points.iter().map(|p| p.declination_deg).fold(f64::NEG_INFINITY, f64::max);
        let average_deg =
            points.iter().map(|p| p.declination_deg).sum::<f64>() / points.len() as f64;

        let total_change_deg = last.declination_deg - first.declination_deg;
        let span = last.year - first.year;
        let change_per_year_deg = if span > 0 { total_change_deg / f64::from(span) } else { 0.0 };

        Some(Self { min_deg, max_deg, average_deg, total_change_deg, change_per_year_deg })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeclinationSeries {
    pub points: Vec<SeriesPoint>,
    /// Years whose call failed, with the error message.
    pub skipped: Vec<(i32, String)>,
    pub stats: SeriesStats,
}

pub async fn fetch_series<P>(
    provider: &P,
    request: &SeriesRequest,
) -> Result<DeclinationSeries, SeriesError>
where
    P: DeclinationProvider + ?Sized,
{
    let mut points = Vec::new();
    let mut skipped = Vec::new();

    for year in request.years() {
        let Some(date) = NaiveDate::from_ymd_opt(year, 1, 1) else {
            continue;
        };
        let query = DeclinationRequest {
            latitude: request.latitude,
            longitude: request.longitude,
            elevation: request.elevation,
            date,
        };

        match provider.declination(&query).await {
            Ok(decl) => points.push(SeriesPoint { year, declination_deg: decl.declination_deg }),
            Err(err) => {
                warn!(year, error = %format!("{err:#}"), "Skipping year");
                skipped.push((year, format!("{err:#}")));
            }
        }
    }

    let stats = SeriesStats::from_points(&points)
        .ok_or(SeriesError::NoData { from: request.from_year, to: request.to_year })?;

    info!(points = points.len(), skipped = skipped.len(), "Series fetched");
    Ok(DeclinationSeries { points, skipped, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Declination, FieldComponents};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::Datelike;
    use std::sync::Mutex;

    /// Declination drifts 0.5° a year from 10° in 2024; listed years fail.
    #[derive(Debug, Default)]
    struct DriftingProvider {
        failing_years: Vec<i32>,
        years_asked: Mutex<Vec<i32>>,
    }

    #[async_trait]
    impl DeclinationProvider for DriftingProvider {
        async fn declination(&self, request: &DeclinationRequest) -> anyhow::Result<Declination> {
            let year = request.date.year();
            self.years_asked.lock().expect("lock").push(year);

            if self.failing_years.contains(&year) {
                return Err(anyhow!("API responded with status: 503"));
            }
            Ok(Declination {
                latitude: request.latitude,
                longitude: request.longitude,
                elevation: 0.0,
                date: request.date,
                declination_deg: 10.0 + 0.5 * f64::from(year - 2024),
                annual_change_deg_per_year: 0.5,
                model: "WMMHR".into(),
                components: FieldComponents::default(),
            })
        }
    }

    #[tokio::test]
    async fn failed_year_is_skipped() {
        let provider = DriftingProvider { failing_years: vec![2026], ..Default::default() };
        let request = SeriesRequest::full_window(40.0, -105.25).expect("request");

        let series = fetch_series(&provider, &request).await.expect("series");

        let years: Vec<i32> = series.points.iter().map(|p| p.year).collect();
        assert_eq!(years, vec![2024, 2025, 2027, 2028, 2029]);
        assert_eq!(series.skipped.len(), 1);
        assert_eq!(series.skipped[0].0, 2026);
        assert!(series.skipped[0].1.contains("503"));
    }

    #[tokio::test]
    async fn every_year_failing_is_an_error() {
        let provider =
            DriftingProvider { failing_years: (2024..=2029).collect(), ..Default::default() };
        let request = SeriesRequest::new(0.0, 0.0, None, 2025, 2027, 1).expect("request");

        let err = fetch_series(&provider, &request).await.unwrap_err();

        assert!(matches!(err, SeriesError::NoData { from: 2025, to: 2027 }));
        assert!(err.to_string().contains("Failed to fetch data for any year"));
    }

    #[tokio::test]
    async fn interval_steps_through_years() {
        let provider = DriftingProvider::default();
        let request = SeriesRequest::new(10.0, 10.0, Some(50.0), 2024, 2029, 2).expect("request");

        fetch_series(&provider, &request).await.expect("series");

        assert_eq!(*provider.years_asked.lock().expect("lock"), vec![2024, 2026, 2028]);
    }

    #[test]
    fn stats_over_points() {
        let points = [
            SeriesPoint { year: 2024, declination_deg: 2.0 },
            SeriesPoint { year: 2026, declination_deg: -1.0 },
            SeriesPoint { year: 2028, declination_deg: 5.0 },
        ];

        let stats = SeriesStats::from_points(&points).expect("stats");
        assert_eq!(stats.min_deg, -1.0);
        assert_eq!(stats.max_deg, 5.0);
        assert_eq!(stats.average_deg, 2.0);
        assert_eq!(stats.total_change_deg, 3.0);
        assert_eq!(stats.change_per_year_deg, 0.75);
    }

    #[test]
    fn single_point_has_no_yearly_change() {
        let stats = SeriesStats::from_points(&[SeriesPoint { year: 2027, declination_deg: -4.5 }])
            .expect("stats");

        assert_eq!(stats.total_change_deg, 0.0);
        assert_eq!(stats.change_per_year_deg, 0.0);
        assert_eq!(stats.average_deg, -4.5);
        assert!(SeriesStats::from_points(&[]).is_none());
    }

    #[tokio::test]
    async fn single_surviving_year_still_yields_stats() {
        let provider = DriftingProvider { failing_years: vec![2024, 2025], ..Default::default() };
        let request = SeriesRequest::new(0.0, 0.0, None, 2024, 2026, 1).expect("request");

        let series = fetch_series(&provider, &request).await.expect("series");
        assert_eq!(series.points.len(), 1);
        assert_eq!(series.stats.change_per_year_deg, 0.0);
    }

    #[test]
    fn request_validation() {
        assert!(matches!(
            SeriesRequest::new(0.0, 0.0, None, 2023, 2025, 1),
            Err(SeriesError::Invalid(_))
        ));
        assert!(matches!(
            SeriesRequest::new(0.0, 0.0, None, 2028, 2025, 1),
            Err(SeriesError::InvalidRange { from: 2028, to: 2025 })
        ));
        assert!(matches!(
            SeriesRequest::new(0.0, 0.0, None, 2024, 2025, 0),
            Err(SeriesError::ZeroInterval)
        ));
        assert!(matches!(
            SeriesRequest::new(91.0, 0.0, None, 2024, 2025, 1),
            Err(SeriesError::Invalid(_))
        ));
    }
}
