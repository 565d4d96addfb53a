//! Order Extractor
//!
//! Best-effort, pattern-based recovery of an order from the user's side of a
//! voice conversation. Two independent layered tables run over the same
//! lower-cased text:
//!
//! - order patterns yield `(item, restaurant)`
//! - time patterns yield a raw time expression, later normalized to a
//!   timestamp on today's date
//!
//! In both tables the first pattern that matches wins; results are never
//! merged across patterns.
//!
//! # Bare hours
//!
//! An hour with no meridiem ("at 7") is read as afternoon/evening: hours
//! below 12 get 12 added. "At 9" for breakfast therefore lands at 21:00. This
//! matches the behaviour the service has always had and is kept on purpose
//! until product decides otherwise.

use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::Timestamp;

// ============================================================================
// EXTRACTED ORDER
// ============================================================================

/// What the extractor recovered from a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedOrder {
    pub order_item: Option<String>,
    pub restaurant: Option<String>,
    /// Always set; "now" when no usable time expression was found.
    pub delivery_time: Timestamp,
    pub raw_time_expression: Option<String>,
}

impl ExtractedOrder {
    /// Nothing recovered.
    pub fn absent(now: Timestamp) -> Self {
        Self {
            order_item: None,
            restaurant: None,
            delivery_time: now,
            raw_time_expression: None,
        }
    }

    /// Both item and restaurant are present and non-blank.
    pub fn is_complete(&self) -> bool {
        let filled = |field: &Option<String>| field.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.order_item) && filled(&self.restaurant)
    }

    /// Names of the fields that keep this order from being complete.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.order_item.as_deref().map_or(true, |s| s.trim().is_empty()) {
            missing.push("orderItem");
        }
        if self.restaurant.as_deref().map_or(true, |s| s.trim().is_empty()) {
            missing.push("restaurant");
        }
        missing
    }
}

/// Item and restaurant as captured by one order pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFields {
    pub item: Option<String>,
    pub restaurant: Option<String>,
}

// ============================================================================
// ORDER PATTERNS
// ============================================================================

/// Order pattern layers, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPatternKind {
    /// "want / like / get / order / have X from|at Y"
    DesireVerb,
    /// "can i|we get / order / have X from|at Y"
    PoliteRequest,
    /// "X from|at Y" with no leading verb
    FromOrAt,
}

impl OrderPatternKind {
    fn pattern(self) -> &'static str {
        match self {
            OrderPatternKind::DesireVerb => {
                r"(?i)(?:want|like|get|order|have)\s+(.*?)(?:\s+from\s+|\s+at\s+)(.*?)(?:\s+at\s+|\s+for\s+|$)"
            }
            OrderPatternKind::PoliteRequest => {
                r"(?i)can\s+(?:i|we)\s+(?:get|order|have)\s+(.*?)(?:\s+from\s+|\s+at\s+)(.*?)(?:\s+at\s+|\s+for\s+|$)"
            }
            OrderPatternKind::FromOrAt => {
                r"(?i)([^,.]+?)(?:\s+from\s+|\s+at\s+)(.*?)(?:\s+at\s+|\s+for\s+|$)"
            }
        }
    }
}

/// One layer of the order table. Group 1 is the item, group 2 the restaurant.
#[derive(Debug, Clone)]
pub struct OrderPattern {
    kind: OrderPatternKind,
    regex: Regex,
}

impl OrderPattern {
    fn new(kind: OrderPatternKind) -> Result<Self, regex::Error> {
        Ok(Self {
            kind,
            regex: Regex::new(kind.pattern())?,
        })
    }

    pub fn kind(&self) -> OrderPatternKind {
        self.kind
    }

    /// Apply this layer alone. `None` means the pattern did not match.
    pub fn capture(&self, text: &str) -> Option<OrderFields> {
        let caps = self.regex.captures(text)?;
        Some(OrderFields {
            item: trimmed_group(&caps, 1),
            restaurant: trimmed_group(&caps, 2),
        })
    }
}

// ============================================================================
// TIME PATTERNS
// ============================================================================

/// Time pattern layers, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePatternKind {
    /// "at 7pm", "at 7:30 p.m.", "at 12 noon"
    ClockWithMeridiem,
    /// "at 7", "at 7 o'clock", "at 7 o'clock am"
    HourOnly,
    /// "at noon", "at midnight", "at lunchtime", "at dinner time"
    NamedPeriod,
}

impl TimePatternKind {
    fn pattern(self) -> &'static str {
        match self {
            TimePatternKind::ClockWithMeridiem => {
                r"(?i)at\s+([0-9]{1,2}(?:\s*:\s*[0-9]{2})?\s*(?:a\.?m\.?|p\.?m\.?|noon|midnight))"
            }
            TimePatternKind::HourOnly => {
                r"(?i)at\s+([0-9]{1,2})\s*(?:o'?clock)?\s*(a\.?m\.?|p\.?m\.?)?"
            }
            TimePatternKind::NamedPeriod => r"(?i)at\s+(noon|midnight|lunch\s*time|dinner\s*time)",
        }
    }

    fn render(self, caps: &Captures<'_>) -> Option<String> {
        let expression = trimmed_group(caps, 1)?;
        match self {
            TimePatternKind::HourOnly => match trimmed_group(caps, 2) {
                Some(meridiem) => Some(format!("{} {}", expression, meridiem)),
                None => Some(expression),
            },
            TimePatternKind::ClockWithMeridiem | TimePatternKind::NamedPeriod => Some(expression),
        }
    }
}

/// One layer of the time table.
#[derive(Debug, Clone)]
pub struct TimePattern {
    kind: TimePatternKind,
    regex: Regex,
}

impl TimePattern {
    fn new(kind: TimePatternKind) -> Result<Self, regex::Error> {
        Ok(Self {
            kind,
            regex: Regex::new(kind.pattern())?,
        })
    }

    pub fn kind(&self) -> TimePatternKind {
        self.kind
    }

    /// Apply this layer alone, returning the raw time expression.
    pub fn capture(&self, text: &str) -> Option<String> {
        let caps = self.regex.captures(text)?;
        self.kind.render(&caps)
    }
}

// ============================================================================
// PATTERN TABLES
// ============================================================================

struct PatternTables {
    order: Vec<OrderPattern>,
    time: Vec<TimePattern>,
    clock: Regex,
}

impl PatternTables {
    fn build() -> Result<Self, regex::Error> {
        Ok(Self {
            order: [
                OrderPatternKind::DesireVerb,
                OrderPatternKind::PoliteRequest,
                OrderPatternKind::FromOrAt,
            ]
            .into_iter()
            .map(OrderPattern::new)
            .collect::<Result<_, _>>()?,
            time: [
                TimePatternKind::ClockWithMeridiem,
                TimePatternKind::HourOnly,
                TimePatternKind::NamedPeriod,
            ]
            .into_iter()
            .map(TimePattern::new)
            .collect::<Result<_, _>>()?,
            clock: Regex::new(r"(?i)([0-9]{1,2})(?::([0-9]{2}))?\s*(a\.?m\.?|p\.?m\.?)?")?,
        })
    }
}

static PATTERNS: Lazy<Result<PatternTables, regex::Error>> = Lazy::new(PatternTables::build);

fn tables() -> Option<&'static PatternTables> {
    match PATTERNS.as_ref() {
        Ok(tables) => Some(tables),
        Err(e) => {
            tracing::error!(error = %e, "Order extraction patterns failed to compile");
            None
        }
    }
}

/// The order table, highest priority first.
pub fn order_patterns() -> &'static [OrderPattern] {
    tables().map(|t| t.order.as_slice()).unwrap_or_default()
}

/// The time table, highest priority first.
pub fn time_patterns() -> &'static [TimePattern] {
    tables().map(|t| t.time.as_slice()).unwrap_or_default()
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// First matching order pattern's fields.
pub fn extract_order_fields(text: &str) -> Option<(OrderPatternKind, OrderFields)> {
    order_patterns()
        .iter()
        .find_map(|pattern| pattern.capture(text).map(|fields| (pattern.kind(), fields)))
}

/// First matching time pattern's raw expression.
pub fn extract_time_expression(text: &str) -> Option<(TimePatternKind, String)> {
    time_patterns()
        .iter()
        .find_map(|pattern| pattern.capture(text).map(|expr| (pattern.kind(), expr)))
}

/// Run both tables over `text`.
///
/// `now` fixes both the default delivery time and the calendar day that a
/// time-of-day is applied to, in `now`'s offset. Never fails: without usable
/// patterns the result is fully absent.
pub fn extract_order(text: &str, now: DateTime<FixedOffset>) -> ExtractedOrder {
    if tables().is_none() {
        return ExtractedOrder::absent(now.with_timezone(&Utc));
    }

    let fields = match extract_order_fields(text) {
        Some((kind, fields)) => {
            tracing::debug!(pattern = ?kind, item = ?fields.item, restaurant = ?fields.restaurant, "Order pattern matched");
            fields
        }
        None => {
            tracing::debug!("No order pattern matched");
            OrderFields::default()
        }
    };

    let raw_time_expression = extract_time_expression(text).map(|(kind, expr)| {
        tracing::debug!(pattern = ?kind, expression = %expr, "Time pattern matched");
        expr.to_lowercase()
    });

    let delivery_time = normalize_delivery_time(raw_time_expression.as_deref(), now);

    ExtractedOrder {
        order_item: fields.item,
        restaurant: fields.restaurant,
        delivery_time: delivery_time.with_timezone(&Utc),
        raw_time_expression,
    }
}

// ============================================================================
// TIME NORMALIZATION
// ============================================================================

/// Turn a raw time expression into an instant on `now`'s calendar day.
///
/// Seconds and sub-seconds are zeroed whenever a time-of-day is applied.
/// Without an expression, or with one that does not name a valid time of
/// day, `now` is returned unchanged.
pub fn normalize_delivery_time(
    expression: Option<&str>,
    now: DateTime<FixedOffset>,
) -> DateTime<FixedOffset> {
    let Some(expression) = expression else {
        return now;
    };
    let expression = expression.trim().to_lowercase();

    let Some((hour, minute)) = time_of_day(&expression) else {
        return now;
    };

    let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) else {
        tracing::warn!(expression = %expression, hour, minute, "Time expression is not a valid time of day; using now");
        return now;
    };

    let local = now.date_naive().and_time(time);
    now.offset().from_local_datetime(&local).single().unwrap_or(now)
}

fn time_of_day(expression: &str) -> Option<(u32, u32)> {
    if expression == "noon" {
        return Some((12, 0));
    }
    if expression == "midnight" {
        return Some((0, 0));
    }
    if expression.contains("lunch") {
        return Some((12, 0));
    }
    if expression.contains("dinner") {
        return Some((18, 0));
    }
    parse_clock(expression)
}

/// `hour[:minute][meridiem]` with the bare-hour-is-PM policy.
fn parse_clock(expression: &str) -> Option<(u32, u32)> {
    let caps = tables()?.clock.captures(expression)?;
    let mut hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };

    match caps.get(3).map(|m| m.as_str().to_lowercase()) {
        Some(meridiem) if meridiem.starts_with('p') => {
            if hour < 12 {
                hour += 12;
            }
        }
        Some(meridiem) if meridiem.starts_with('a') => {
            if hour == 12 {
                hour = 0;
            }
        }
        _ => {
            if hour < 12 {
                hour += 12;
            }
        }
    }

    Some((hour, minute))
}

fn trimmed_group(caps: &Captures<'_>, index: usize) -> Option<String> {
    caps.get(index)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
