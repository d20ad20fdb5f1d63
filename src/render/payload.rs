use serde_json::{Map, Value};
use std::fmt;

/// Stat keys in the order they are displayed
pub const STAT_KEYS: [StatKey; 5] = [
    StatKey::Mean,
    StatKey::Max,
    StatKey::Min,
    StatKey::StdDev,
    StatKey::Latest,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKey {
    Mean,
    Max,
    Min,
    StdDev,
    Latest,
}

impl StatKey {
    /// Field name on the wire
    pub fn wire_name(self) -> &'static str {
        match self {
            StatKey::Mean => "mean",
            StatKey::Max => "max",
            StatKey::Min => "min",
            StatKey::StdDev => "std_dev",
            StatKey::Latest => "latest",
        }
    }

    /// Label shown next to the value
    pub fn label(self) -> &'static str {
        match self {
            StatKey::Mean => "Mean",
            StatKey::Max => "Max",
            StatKey::Min => "Min",
            StatKey::StdDev => "Std Dev",
            StatKey::Latest => "Latest",
        }
    }
}

/// A single stat value; the server sends numbers but strings are tolerated
#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Number(n) => f.write_str(&format_number(*n)),
            StatValue::Text(s) => f.write_str(s),
        }
    }
}

/// Format a number the way a browser prints it: integral values drop `.0`,
/// and magnitudes from 1e21 up or below 1e-6 switch to exponent form.
fn format_number(n: f64) -> String {
    if n == 0.0 {
        // Covers -0 as well
        return "0".to_string();
    }
    if !n.is_finite() {
        return if n.is_nan() {
            "NaN".to_string()
        } else if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };
    }

    let magnitude = n.abs();
    if !(1e-6..1e21).contains(&magnitude) {
        let exp = format!("{:e}", n);
        return match exp.split_once('e') {
            Some((mantissa, power)) if !power.starts_with('-') => format!("{}e+{}", mantissa, power),
            _ => exp,
        };
    }

    n.to_string()
}

/// Summary statistics for one symbol. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub mean: Option<StatValue>,
    pub max: Option<StatValue>,
    pub min: Option<StatValue>,
    pub std_dev: Option<StatValue>,
    pub latest: Option<StatValue>,
}

impl Stats {
    pub fn get(&self, key: StatKey) -> Option<&StatValue> {
        match key {
            StatKey::Mean => self.mean.as_ref(),
            StatKey::Max => self.max.as_ref(),
            StatKey::Min => self.min.as_ref(),
            StatKey::StdDev => self.std_dev.as_ref(),
            StatKey::Latest => self.latest.as_ref(),
        }
    }

    fn slot(&mut self, key: StatKey) -> &mut Option<StatValue> {
        match key {
            StatKey::Mean => &mut self.mean,
            StatKey::Max => &mut self.max,
            StatKey::Min => &mut self.min,
            StatKey::StdDev => &mut self.std_dev,
            StatKey::Latest => &mut self.latest,
        }
    }

    /// Present stats in display order
    pub fn entries(&self) -> impl Iterator<Item = (StatKey, &StatValue)> + '_ {
        STAT_KEYS
            .into_iter()
            .filter_map(move |key| self.get(key).map(|value| (key, value)))
    }
}

/// Outcome of one form submission as reported by the server
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionResult {
    Success {
        stats: Option<Stats>,
        images: Vec<String>,
    },
    Failure {
        message: Option<String>,
    },
}

impl SubmissionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionResult::Success { .. })
    }
}

/// Why a payload could not be classified
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload has none of plot_urls, stats or error")]
    Unrecognized,
    #[error("plot_urls must be a list of strings")]
    BadImages,
    #[error("stats must be an object")]
    BadStats,
    #[error("stat '{0}' must be a number or a string")]
    BadStatValue(&'static str),
    #[error("error must be a string")]
    BadError,
}

/// Classify a decoded JSON payload.
///
/// `plot_urls` is the only image field understood; the singular `plot_url`
/// is not recognized. A success shape wins over `error` when both appear.
pub fn decode(value: &Value) -> Result<SubmissionResult, PayloadError> {
    let obj = value.as_object().ok_or(PayloadError::NotAnObject)?;

    let images = present(obj, "plot_urls");
    let stats = present(obj, "stats");

    if images.is_some() || stats.is_some() {
        return Ok(SubmissionResult::Success {
            stats: stats.map(decode_stats).transpose()?,
            images: images.map(decode_images).transpose()?.unwrap_or_default(),
        });
    }

    match obj.get("error") {
        Some(Value::String(s)) => Ok(SubmissionResult::Failure {
            message: Some(s.clone()),
        }),
        Some(Value::Null) => Ok(SubmissionResult::Failure { message: None }),
        Some(_) => Err(PayloadError::BadError),
        None => Err(PayloadError::Unrecognized),
    }
}

fn present<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn decode_images(value: &Value) -> Result<Vec<String>, PayloadError> {
    let items = value.as_array().ok_or(PayloadError::BadImages)?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or(PayloadError::BadImages)
        })
        .collect()
}

fn decode_stats(value: &Value) -> Result<Stats, PayloadError> {
    let obj = value.as_object().ok_or(PayloadError::BadStats)?;
    let mut stats = Stats::default();

    for key in STAT_KEYS {
        let parsed = match obj.get(key.wire_name()) {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => n.as_f64().map(StatValue::Number),
            Some(Value::String(s)) => Some(StatValue::Text(s.clone())),
            Some(_) => return Err(PayloadError::BadStatValue(key.wire_name())),
        };
        *stats.slot(key) = parsed;
    }

    Ok(stats)
}
