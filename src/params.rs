//! Normalization of user-supplied analytics selectors.

use crate::dhis2::periods::{period_range, PeriodError};
use crate::model::ExtractionRequest;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("organisation unit level must be an integer, got {0:?}")]
    InvalidLevel(String),
    #[error(transparent)]
    Period(#[from] PeriodError),
}

/// Raw selectors as collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsParams {
    pub data_elements: Vec<String>,
    pub data_element_groups: Vec<String>,
    pub indicators: Vec<String>,
    pub indicator_groups: Vec<String>,
    pub periods: Vec<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub org_units: Vec<String>,
    pub org_unit_groups: Vec<String>,
    pub org_unit_levels: Vec<String>,
}

impl AnalyticsParams {
    pub fn normalize(self) -> Result<ExtractionRequest, ParamError> {
        let periods = resolve_periods(self.periods, self.start.as_deref(), self.end.as_deref())?;
        let org_unit_levels = parse_org_unit_levels(&self.org_unit_levels)?;
        Ok(ExtractionRequest {
            data_elements: self.data_elements,
            data_element_groups: self.data_element_groups,
            indicators: self.indicators,
            indicator_groups: self.indicator_groups,
            periods,
            org_units: self.org_units,
            org_unit_groups: self.org_unit_groups,
            org_unit_levels,
        })
    }
}

/// A start/end range, when both ends are given, replaces the discrete list.
pub fn resolve_periods(
    periods: Vec<String>,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Vec<String>, ParamError> {
    match (start, end) {
        (Some(start), Some(end)) => {
            if !periods.is_empty() {
                tracing::info!("Period range {start}..{end} replaces {} listed periods", periods.len());
            }
            Ok(period_range(start, end)?)
        }
        (Some(_), None) | (None, Some(_)) => {
            tracing::warn!("Ignoring incomplete period range: both start and end are required");
            Ok(periods)
        }
        (None, None) => Ok(periods),
    }
}

pub fn parse_org_unit_levels(levels: &[String]) -> Result<Vec<u32>, ParamError> {
    levels
        .iter()
        .map(|l| {
            l.trim()
                .parse::<u32>()
                .map_err(|_| ParamError::InvalidLevel(l.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn range_replaces_discrete_periods() {
        let periods = resolve_periods(strings(&["2020Q4"]), Some("2021Q1"), Some("2021Q2")).unwrap();
        assert_eq!(periods, strings(&["2021Q1", "2021Q2"]));
    }

    #[test]
    fn half_range_keeps_discrete_periods() {
        let periods = resolve_periods(strings(&["202101"]), Some("202102"), None).unwrap();
        assert_eq!(periods, strings(&["202101"]));
    }

    #[test]
    fn bad_range_is_fatal() {
        let err = resolve_periods(vec![], Some("2021Q1"), Some("nope")).unwrap_err();
        assert!(matches!(err, ParamError::Period(PeriodError::Invalid(_))));
    }

    #[test]
    fn levels_become_integers() {
        assert_eq!(parse_org_unit_levels(&strings(&["2", " 4"])).unwrap(), vec![2, 4]);
        assert_eq!(
            parse_org_unit_levels(&strings(&["2", "district"])).unwrap_err(),
            ParamError::InvalidLevel("district".into())
        );
    }

    #[test]
    fn normalize_builds_request() {
        let req = AnalyticsParams {
            data_elements: strings(&["de1"]),
            periods: strings(&["2021"]),
            org_unit_levels: strings(&["3"]),
            ..Default::default()
        }
        .normalize()
        .unwrap();
        assert_eq!(req.data_elements, strings(&["de1"]));
        assert_eq!(req.periods, strings(&["2021"]));
        assert_eq!(req.org_unit_levels, vec![3]);
    }
}
