//! Date expressions and date windows

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Serialize, Serializer};
use std::fmt;

/// Canonical textual form of calendar dates in documents
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// The reference point a date expression is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateAnchor {
    /// A fixed calendar date
    Date(NaiveDate),
    /// The study index date
    IndexDate,
    /// The date the extraction runs
    Today,
}

/// Calendar truncation applied to the anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Truncation {
    FirstDayOfMonth,
    LastDayOfMonth,
    FirstDayOfYear,
    LastDayOfYear,
}

impl Truncation {
    pub fn name(&self) -> &'static str {
        match self {
            Truncation::FirstDayOfMonth => "first_day_of_month",
            Truncation::LastDayOfMonth => "last_day_of_month",
            Truncation::FirstDayOfYear => "first_day_of_year",
            Truncation::LastDayOfYear => "last_day_of_year",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "first_day_of_month" => Some(Truncation::FirstDayOfMonth),
            "last_day_of_month" => Some(Truncation::LastDayOfMonth),
            "first_day_of_year" => Some(Truncation::FirstDayOfYear),
            "last_day_of_year" => Some(Truncation::LastDayOfYear),
            _ => None,
        }
    }

    fn apply(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Truncation::FirstDayOfMonth => date.with_day(1),
            Truncation::LastDayOfMonth => date
                .with_day(1)?
                .checked_add_months(Months::new(1))?
                .pred_opt(),
            Truncation::FirstDayOfYear => NaiveDate::from_ymd_opt(date.year(), 1, 1),
            Truncation::LastDayOfYear => NaiveDate::from_ymd_opt(date.year(), 12, 31),
        }
    }
}

/// Unit of a relative date offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodUnit {
    Day,
    Month,
    Year,
}

impl PeriodUnit {
    fn label(&self, amount: u32) -> &'static str {
        match (self, amount) {
            (PeriodUnit::Day, 1) => "day",
            (PeriodUnit::Day, _) => "days",
            (PeriodUnit::Month, 1) => "month",
            (PeriodUnit::Month, _) => "months",
            (PeriodUnit::Year, 1) => "year",
            (PeriodUnit::Year, _) => "years",
        }
    }
}

/// Signed offset such as `- 3 months`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Offset {
    pub amount: i32,
    pub unit: PeriodUnit,
}

impl Offset {
    pub const fn new(amount: i32, unit: PeriodUnit) -> Self {
        Self { amount, unit }
    }

    fn apply(&self, date: NaiveDate) -> Option<NaiveDate> {
        let magnitude = self.amount.unsigned_abs();
        let forward = self.amount >= 0;
        match self.unit {
            PeriodUnit::Day if forward => date.checked_add_days(Days::new(magnitude.into())),
            PeriodUnit::Day => date.checked_sub_days(Days::new(magnitude.into())),
            PeriodUnit::Month if forward => date.checked_add_months(Months::new(magnitude)),
            PeriodUnit::Month => date.checked_sub_months(Months::new(magnitude)),
            PeriodUnit::Year => {
                let months = Months::new(magnitude.checked_mul(12)?);
                if forward {
                    date.checked_add_months(months)
                } else {
                    date.checked_sub_months(months)
                }
            }
        }
    }
}

/// Dates that date expressions are resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateContext {
    pub index_date: NaiveDate,
    pub today: NaiveDate,
}

/// A date as written in a document: `2020-01-01`, `today`,
/// `index_date - 1 year`, `first_day_of_month(index_date) + 2 months`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateExpr {
    pub anchor: DateAnchor,
    pub truncation: Option<Truncation>,
    pub offset: Option<Offset>,
}

impl DateExpr {
    pub const fn absolute(date: NaiveDate) -> Self {
        Self {
            anchor: DateAnchor::Date(date),
            truncation: None,
            offset: None,
        }
    }

    pub const fn index_date() -> Self {
        Self {
            anchor: DateAnchor::IndexDate,
            truncation: None,
            offset: None,
        }
    }

    pub const fn today() -> Self {
        Self {
            anchor: DateAnchor::Today,
            truncation: None,
            offset: None,
        }
    }

    pub fn with_truncation(mut self, truncation: Truncation) -> Self {
        self.truncation = Some(truncation);
        self
    }

    pub fn with_offset(mut self, offset: Offset) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The literal date, if this expression is a bare calendar date
    pub fn as_absolute(&self) -> Option<NaiveDate> {
        match (self.anchor, self.truncation, self.offset) {
            (DateAnchor::Date(date), None, None) => Some(date),
            _ => None,
        }
    }

    pub fn depends_on_today(&self) -> bool {
        self.anchor == DateAnchor::Today
    }

    /// Resolve to a calendar date. Returns `None` when arithmetic leaves the
    /// representable range.
    pub fn resolve(&self, ctx: &DateContext) -> Option<NaiveDate> {
        let mut date = match self.anchor {
            DateAnchor::Date(date) => date,
            DateAnchor::IndexDate => ctx.index_date,
            DateAnchor::Today => ctx.today,
        };
        if let Some(truncation) = &self.truncation {
            date = truncation.apply(date)?;
        }
        if let Some(offset) = &self.offset {
            date = offset.apply(date)?;
        }
        Some(date)
    }
}

impl fmt::Display for DateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let anchor = match self.anchor {
            DateAnchor::Date(date) => date.format(ISO_DATE_FORMAT).to_string(),
            DateAnchor::IndexDate => "index_date".to_string(),
            DateAnchor::Today => "today".to_string(),
        };
        match &self.truncation {
            Some(truncation) => write!(f, "{}({})", truncation.name(), anchor)?,
            None => write!(f, "{}", anchor)?,
        }
        if let Some(offset) = &self.offset {
            let sign = if offset.amount < 0 { '-' } else { '+' };
            let magnitude = offset.amount.unsigned_abs();
            write!(f, " {} {} {}", sign, magnitude, offset.unit.label(magnitude))?;
        }
        Ok(())
    }
}

impl From<NaiveDate> for DateExpr {
    fn from(date: NaiveDate) -> Self {
        Self::absolute(date)
    }
}

impl Serialize for DateExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Temporal constraint on an operator's matches. Both bounds are inclusive;
/// a missing bound is unbounded on that side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct DateWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateExpr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateExpr>,
}

impl DateWindow {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn between(start: DateExpr, end: DateExpr) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn on_or_before(end: DateExpr) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    pub fn on_or_after(start: DateExpr) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Resolved bounds when both sides are present
    pub fn resolve(&self, ctx: &DateContext) -> Option<(NaiveDate, NaiveDate)> {
        let start = self.start.as_ref()?.resolve(ctx)?;
        let end = self.end.as_ref()?.resolve(ctx)?;
        Some((start, end))
    }

    /// Whether `start <= end` after resolution. Half-open windows are ordered.
    pub fn is_ordered(&self, ctx: &DateContext) -> bool {
        self.resolve(ctx).is_none_or(|(start, end)| start <= end)
    }
}
