use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};

use crate::{
    archers::{push_icontains, push_iexact},
    error::{AppResult, FieldErrors},
};

/// Query-string filters for the club list.
#[derive(Debug, Default, Deserialize)]
pub struct ClubFilter {
    #[serde(rename = "name__iexact")]
    pub name_iexact: Option<String>,
    #[serde(rename = "name__icontains")]
    pub name_icontains: Option<String>,
    pub created_at: Option<String>,
    #[serde(rename = "created_at__lt")]
    pub created_at_lt: Option<String>,
    #[serde(rename = "created_at__gt")]
    pub created_at_gt: Option<String>,
}

/// Parsed date bounds; building them up front turns bad input into a 400.
#[derive(Debug, Default, PartialEq)]
pub struct DateBounds {
    pub on: Option<NaiveDate>,
    pub before: Option<NaiveDateTime>,
    pub after: Option<NaiveDateTime>,
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DDTHH:MM:SS`
/// (fractional seconds allowed). A bare date means midnight.
pub fn parse_moment(raw: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

impl ClubFilter {
    pub fn date_bounds(&self) -> AppResult<DateBounds> {
        let mut errors = FieldErrors::new();

        let on = self.created_at.as_deref().and_then(|raw| {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok();
            if date.is_none() {
                errors.add("created_at", "Enter a valid date.");
            }
            date
        });
        let mut moment = |field: &str, raw: Option<&str>| {
            raw.and_then(|raw| {
                let parsed = parse_moment(raw);
                if parsed.is_none() {
                    errors.add(field, "Enter a valid date/time.");
                }
                parsed
            })
        };
        let before = moment("created_at__lt", self.created_at_lt.as_deref());
        let after = moment("created_at__gt", self.created_at_gt.as_deref());

        errors.into_result()?;
        Ok(DateBounds { on, before, after })
    }

    /// Append ` AND ...` conditions; the query must already contain a `WHERE`.
    pub fn push_conditions(&self, bounds: &DateBounds, query: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(value) = &self.name_iexact {
            push_iexact(query, "name", value);
        }
        if let Some(value) = &self.name_icontains {
            push_icontains(query, "name", value);
        }
        if let Some(on) = bounds.on {
            query.push(" AND date(created_at) = ");
            query.push_bind(on);
        }
        if let Some(before) = bounds.before {
            query.push(" AND created_at < ");
            query.push_bind(before);
        }
        if let Some(after) = bounds.after {
            query.push(" AND created_at > ");
            query.push_bind(after);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_moment() {
        let midnight = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_moment("2024-03-01"), Some(midnight));
        assert_eq!(
            parse_moment("2024-03-01T12:30:00"),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(12, 30, 0)
        );
        assert!(parse_moment("2024-03-01 12:30:00.5").is_some());
        assert_eq!(parse_moment("yesterday"), None);
    }

    #[test]
    fn test_bad_dates_are_field_errors() {
        let filter = ClubFilter {
            created_at: Some("01-03-2024".to_string()),
            created_at_gt: Some("soon".to_string()),
            ..Default::default()
        };
        let Err(crate::error::AppError::Validation(errors)) = filter.date_bounds() else {
            panic!("expected validation errors");
        };
        assert!(errors.get("created_at").is_some());
        assert!(errors.get("created_at__gt").is_some());
        assert!(errors.get("created_at__lt").is_none());
    }

    #[test]
    fn test_no_dates() {
        assert_eq!(ClubFilter::default().date_bounds().unwrap(), DateBounds::default());
    }
}
