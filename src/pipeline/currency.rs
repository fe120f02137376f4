//! Price text → lowest price in the reference currency (USD).

use crate::config::DEFAULT_CURRENCY_RATES;

/// Currency symbol → conversion rate to USD, kept longest-symbol-first so a
/// short symbol never matches inside a longer one (`$` inside `S$`).
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    rates: Vec<(String, f64)>,
}

impl RateTable {
    pub fn new<I, S>(rates: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut table = Self { rates: Vec::new() };
        for (symbol, rate) in rates {
            table.insert(symbol.into(), rate);
        }
        table
    }

    /// Copy of this table with `overrides` replacing or extending its entries.
    pub fn with_overrides(mut self, overrides: &[(String, f64)]) -> Self {
        for (symbol, rate) in overrides {
            self.insert(symbol.clone(), *rate);
        }
        self
    }

    fn insert(&mut self, symbol: String, rate: f64) {
        if symbol.is_empty() {
            return;
        }
        match self.rates.iter_mut().find(|(s, _)| *s == symbol) {
            Some(entry) => entry.1 = rate,
            None => self.rates.push((symbol, rate)),
        }
        // Stable: equal-length symbols keep insertion order.
        self.rates.sort_by_key(|(s, _)| std::cmp::Reverse(s.chars().count()));
    }

    /// First symbol, longest first, that occurs anywhere in `text`.
    pub fn match_symbol(&self, text: &str) -> Option<(&str, f64)> {
        self.rates
            .iter()
            .find(|(s, _)| text.contains(s.as_str()))
            .map(|(s, r)| (s.as_str(), *r))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.rates.iter().map(|(s, _)| s.as_str())
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::new(DEFAULT_CURRENCY_RATES.iter().copied())
    }
}

/// Lowest price of `price_text` converted to USD.
///
/// The matched symbol is removed everywhere in the text, the remainder is split
/// on `-` and every segment must parse as a finite number; the minimum segment
/// is multiplied by the symbol's rate. Text without a known symbol is parsed
/// as-is at rate 1.0. Returns `None` for anything malformed, including empty text.
pub fn normalize(price_text: &str, rates: &RateTable) -> Option<f64> {
    let (stripped, rate) = match rates.match_symbol(price_text) {
        Some((symbol, rate)) => (price_text.replace(symbol, ""), rate),
        None => (price_text.to_string(), 1.0),
    };

    let mut lowest: Option<f64> = None;
    for segment in stripped.split('-') {
        let value = segment.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
        lowest = Some(lowest.map_or(value, |l| l.min(value)));
    }
    lowest.map(|p| p * rate)
}
