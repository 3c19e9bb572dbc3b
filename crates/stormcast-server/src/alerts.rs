//! Timer-driven alert production.
//!
//! The broadcast engine treats the producer as a black box behind
//! [`AlertSource`]; the default [`SyntheticWeather`] source fabricates
//! environmental readings and derives a priority from them. Swapping in a
//! real data feed means implementing the trait, nothing else.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use stormcast_proto::{Alert, Priority};

/// Produces the next alert to broadcast. Invoked on a fixed interval.
pub trait AlertSource: Send + Sync {
    /// Generate one alert.
    fn next_alert(&self) -> Alert;
}

/// Fabricated weather readings.
#[derive(Debug, Clone, Copy)]
struct Readings {
    temperature: i32,
    humidity: u32,
    condition: &'static str,
}

/// Priority thresholds over the readings.
fn priority_for(readings: Readings) -> Priority {
    if readings.temperature > 30 || readings.humidity > 80 {
        Priority::High
    } else if readings.temperature > 25 || readings.humidity > 60 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Synthetic weather-alert source.
///
/// Alert ids increase monotonically, seeded from the Unix clock at
/// construction so ids stay unique across server restarts within a run of
/// acknowledgment logs.
pub struct SyntheticWeather {
    next_id: AtomicU64,
}

impl SyntheticWeather {
    const CONDITIONS: [&'static str; 5] = ["Clear", "Clouds", "Rain", "Thunderstorm", "Haze"];

    /// Create a source with ids seeded from the current Unix time.
    pub fn new() -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self { next_id: AtomicU64::new(seed) }
    }

    fn readings(&self) -> Readings {
        let mut rng = rand::thread_rng();
        Readings {
            temperature: rng.gen_range(-5..40),
            humidity: rng.gen_range(20..=100),
            condition: Self::CONDITIONS[rng.gen_range(0..Self::CONDITIONS.len())],
        }
    }
}

impl Default for SyntheticWeather {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertSource for SyntheticWeather {
    fn next_alert(&self) -> Alert {
        let readings = self.readings();
        let priority = priority_for(readings);

        let alert = Alert {
            priority,
            message: format!(
                "Weather Alert: Temp: {}°C, Humidity: {}%, Condition: {}",
                readings.temperature, readings.humidity, readings.condition
            ),
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            alert_id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        tracing::info!(priority = %alert.priority, alert_id = alert.alert_id, "generated alert");
        alert
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_thresholds() {
        let case = |temperature, humidity| {
            priority_for(Readings { temperature, humidity, condition: "Clear" })
        };

        assert_eq!(case(31, 40), Priority::High);
        assert_eq!(case(20, 81), Priority::High);
        assert_eq!(case(26, 40), Priority::Medium);
        assert_eq!(case(20, 61), Priority::Medium);
        assert_eq!(case(25, 60), Priority::Low);
        assert_eq!(case(-5, 20), Priority::Low);
    }

    #[test]
    fn alert_ids_increase_monotonically() {
        let source = SyntheticWeather::new();
        let a = source.next_alert();
        let b = source.next_alert();
        let c = source.next_alert();

        assert!(a.alert_id < b.alert_id);
        assert!(b.alert_id < c.alert_id);
    }

    #[test]
    fn timestamp_matches_expected_format() {
        let alert = SyntheticWeather::new().next_alert();
        // e.g. "2024-01-01 12:00:00"
        assert_eq!(alert.timestamp.len(), 19);
        assert_eq!(&alert.timestamp[4..5], "-");
        assert_eq!(&alert.timestamp[10..11], " ");
        assert_eq!(&alert.timestamp[13..14], ":");
    }

    #[test]
    fn message_carries_readings() {
        let alert = SyntheticWeather::new().next_alert();
        assert!(alert.message.starts_with("Weather Alert: Temp: "));
        assert!(alert.message.contains("Humidity: "));
        assert!(alert.message.contains("Condition: "));
    }
}
