//! Dashboard presentation
//!
//! Turns summaries into labelled value cards grouped the way the home screen
//! shows them ("In {year} ...", "Today", "Yesterday"). Readings without data
//! render as a dash.

use crate::types::{DailySummary, Reading, YearlySummary};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rendered in place of a value when there is no data
pub const NO_DATA: &str = "-";

/// Icon shown next to a card's value, tagged by icon set
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "set", content = "name", rename_all = "snake_case")]
pub enum Icon {
    #[default]
    None,
    FontAwesome(String),
    FontAwesome5(String),
    FontAwesome6(String),
    Ionicons(String),
}

impl fmt::Display for Icon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Icon::None => Ok(()),
            Icon::FontAwesome(name) => write!(f, "[fa:{name}]"),
            Icon::FontAwesome5(name) => write!(f, "[fa5:{name}]"),
            Icon::FontAwesome6(name) => write!(f, "[fa6:{name}]"),
            Icon::Ionicons(name) => write!(f, "[ion:{name}]"),
        }
    }
}

/// One labelled value with an optional change badge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCard {
    pub label: String,
    pub icon: Icon,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<String>,
}

impl ValueCard {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            icon: Icon::None,
            value: value.into(),
            change: None,
        }
    }

    pub fn with_icon(mut self, icon: Icon) -> Self {
        self.icon = icon;
        self
    }

    pub fn with_change(mut self, change: Option<String>) -> Self {
        self.change = change;
        self
    }
}

impl fmt::Display for ValueCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.label)?;
        if self.icon != Icon::None {
            write!(f, "{} ", self.icon)?;
        }
        write!(f, "{}", self.value)?;
        if let Some(change) = &self.change {
            write!(f, " +{change}")?;
        }
        Ok(())
    }
}

/// Titled card holding a column of values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardGroup {
    pub title: String,
    pub subtitle: String,
    pub cards: Vec<ValueCard>,
}

impl fmt::Display for CardGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "  {}", self.subtitle)?;
        for card in &self.cards {
            writeln!(f, "    {card}")?;
        }
        Ok(())
    }
}

/// The home screen: year, today and yesterday
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub groups: Vec<CardGroup>,
}

impl Dashboard {
    /// Lay out the three home screen groups.
    ///
    /// `steps_change` and `distance_change` are the increases reported by a
    /// [`ChangeTracker`] since the previous refresh.
    pub fn compose(
        today: &DailySummary,
        yesterday: &DailySummary,
        year: &YearlySummary,
        steps_change: Option<f64>,
        distance_change: Option<f64>,
    ) -> Self {
        let year_group = CardGroup {
            title: format!("In {} ...", year.year),
            subtitle: "Fitness".to_string(),
            cards: vec![
                steps_card(format_count(year.steps.total))
                    .with_change(Some(format!("{} today", format_count(today.steps)))),
                distance_card(format_km(year.distance_meters.total))
                    .with_change(Some(format!("{} today", format_km(today.distance_meters)))),
            ],
        };

        let mut today_cards = daily_cards(today);
        if let Some(card) = today_cards.get_mut(0) {
            card.change = steps_change.map(format_count);
        }
        if let Some(card) = today_cards.get_mut(1) {
            card.change = distance_change.map(|meters| format!("{:.2}", meters / 1000.0));
        }

        Self {
            groups: vec![
                year_group,
                CardGroup {
                    title: "Today".to_string(),
                    subtitle: "Fitness".to_string(),
                    cards: today_cards,
                },
                CardGroup {
                    title: "Yesterday".to_string(),
                    subtitle: "Fitness".to_string(),
                    cards: daily_cards(yesterday),
                },
            ],
        }
    }
}

impl fmt::Display for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for group in &self.groups {
            write!(f, "{group}")?;
        }
        Ok(())
    }
}

/// Cards for a single day
pub fn daily_cards(summary: &DailySummary) -> Vec<ValueCard> {
    vec![
        steps_card(format_count(summary.steps)),
        distance_card(format_km(summary.distance_meters)),
        ValueCard::new("Floors Climbed:", format_integer(Reading::Value(summary.flights)))
            .with_icon(Icon::FontAwesome6("stairs".to_string())),
        ValueCard::new("Active Calories Burned:", format_integer(Reading::Value(summary.calories)))
            .with_icon(Icon::FontAwesome5("fire-alt".to_string())),
        ValueCard::new("Average Heart Rate:", format_integer(summary.heart_rate))
            .with_icon(Icon::FontAwesome5("heartbeat".to_string())),
        ValueCard::new("Weight:", format_reading(summary.weight, |lb| format!("{lb:.1} lb")))
            .with_icon(Icon::FontAwesome5("weight".to_string())),
        ValueCard::new("Sleep:", format_hours(Reading::Value(summary.sleep_hours)))
            .with_icon(Icon::Ionicons("bed".to_string())),
    ]
}

/// Cards for a year: totals where they exist, per-day figures otherwise
pub fn yearly_cards(summary: &YearlySummary) -> Vec<ValueCard> {
    vec![
        steps_card(format_count(summary.steps.total))
            .with_change(Some(format!("{} / day", format_count(summary.steps.daily_average)))),
        distance_card(format_km(summary.distance_meters.total)).with_change(Some(format!(
            "{} / day",
            format_km(summary.distance_meters.daily_average)
        ))),
        ValueCard::new("Floors Climbed:", format_integer(Reading::Value(summary.flights.total)))
            .with_icon(Icon::FontAwesome6("stairs".to_string())),
        ValueCard::new(
            "Active Calories Burned / day:",
            format_integer(Reading::Value(summary.calories_daily_average)),
        )
        .with_icon(Icon::FontAwesome5("fire-alt".to_string())),
        ValueCard::new("Average Heart Rate:", format_integer(summary.heart_rate))
            .with_icon(Icon::FontAwesome5("heartbeat".to_string())),
        ValueCard::new("Weight:", format_reading(summary.weight, |lb| format!("{lb:.1} lb")))
            .with_icon(Icon::FontAwesome5("weight".to_string())),
        ValueCard::new("Sleep / night:", format_hours(summary.sleep_hours))
            .with_icon(Icon::Ionicons("bed".to_string())),
    ]
}

fn steps_card(value: String) -> ValueCard {
    ValueCard::new("Steps:", value).with_icon(Icon::Ionicons("footsteps".to_string()))
}

fn distance_card(value: String) -> ValueCard {
    ValueCard::new("Distance:", value)
        .with_icon(Icon::FontAwesome6("person-walking-luggage".to_string()))
}

/// Format a reading, or the dash when there is no data
pub fn format_reading(reading: Reading, format: impl FnOnce(f64) -> String) -> String {
    match reading {
        Reading::NoData => NO_DATA.to_string(),
        Reading::Value(v) => format(v),
    }
}

/// Rounded integer with thousands separators, e.g. `12,345`
pub fn format_count(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Meters as kilometers to two decimals
pub fn format_km(meters: f64) -> String {
    format!("{:.2} km", meters / 1000.0)
}

pub fn format_integer(reading: Reading) -> String {
    format_reading(reading, |v| format!("{}", v.round() as i64))
}

pub fn format_hours(reading: Reading) -> String {
    format_reading(reading, |h| format!("{h:.1} h"))
}

/// Tracks increases of a value between refreshes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeTracker {
    previous: f64,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increase since the last higher value seen, if the value went up
    pub fn observe(&mut self, current: f64) -> Option<f64> {
        if current > self.previous {
            let change = current - self.previous;
            self.previous = current;
            Some(change)
        } else {
            None
        }
    }
}

/// Change badges of the "Today" group, carried from one dashboard refresh to the next
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshTracker {
    pub steps: ChangeTracker,
    pub distance: ChangeTracker,
}

impl RefreshTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps and distance increases since the previous refresh
    pub fn observe(&mut self, today: &DailySummary) -> (Option<f64>, Option<f64>) {
        (
            self.steps.observe(today.steps),
            self.distance.observe(today.distance_meters),
        )
    }
}
