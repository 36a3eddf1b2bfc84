//! `START:STOP:STEP` noise schedules for coarse graining.

use std::str::FromStr;

use thiserror::Error;

const ROUNDING_SLACK: f64 = 1e-9;
/// Largest number of thresholds a schedule may expand to.
pub const MAX_LEVELS: usize = 100_000;

/// Evenly spaced noise thresholds from `start` to `stop` inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseSchedule {
    start: f64,
    stop: f64,
    step: f64,
}

/// Rejected noise schedule.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    /// The text is not three colon-separated fields.
    #[error("expected START:STOP:STEP but found `{provided}`")]
    Format {
        /// Raw argument.
        provided: String,
    },
    /// A field is not a number.
    #[error("{field} `{text}` is not a number")]
    Number {
        /// Which of `start`, `stop` or `step` failed.
        field: &'static str,
        /// Rejected text.
        text: String,
    },
    /// A bound is negative or not finite.
    #[error("noise bounds must be finite and non-negative (got {start}:{stop})")]
    InvalidBounds {
        /// Lower bound.
        start: f64,
        /// Upper bound.
        stop: f64,
    },
    /// `stop` lies below `start`.
    #[error("schedule runs backwards: {start} > {stop}")]
    Reversed {
        /// Lower bound.
        start: f64,
        /// Upper bound.
        stop: f64,
    },
    /// The step is zero, negative or not finite.
    #[error("step must be finite and positive (got {step})")]
    InvalidStep {
        /// Rejected step.
        step: f64,
    },
    /// The schedule expands to more than [`MAX_LEVELS`] thresholds.
    #[error("schedule expands to {levels} thresholds; at most {MAX_LEVELS} are allowed")]
    TooManyLevels {
        /// Requested number of thresholds, infinite when it overflows.
        levels: f64,
    },
}

impl NoiseSchedule {
    /// Validates and builds a schedule.
    ///
    /// # Errors
    /// Returns [`ScheduleError`] for negative or non-finite bounds, reversed
    /// bounds, steps that are not strictly positive, and schedules longer
    /// than [`MAX_LEVELS`].
    pub fn new(start: f64, stop: f64, step: f64) -> Result<Self, ScheduleError> {
        let valid = |value: f64| value.is_finite() && value >= 0.0;
        if !(valid(start) && valid(stop)) {
            return Err(ScheduleError::InvalidBounds { start, stop });
        }
        if stop < start {
            return Err(ScheduleError::Reversed { start, stop });
        }
        if !(step.is_finite() && step > 0.0) {
            return Err(ScheduleError::InvalidStep { step });
        }
        let levels = level_count(start, stop, step);
        if !(levels.is_finite() && levels <= MAX_LEVELS as f64) {
            return Err(ScheduleError::TooManyLevels { levels });
        }
        Ok(Self { start, stop, step })
    }

    /// Returns the thresholds in increasing order.
    ///
    /// # Examples
    /// ```
    /// use basin_cli::cli::NoiseSchedule;
    ///
    /// let schedule: NoiseSchedule = "0:1:0.25".parse()?;
    /// assert_eq!(schedule.thresholds(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    /// # Ok::<(), basin_cli::cli::ScheduleError>(())
    /// ```
    #[must_use]
    pub fn thresholds(&self) -> Vec<f64> {
        let levels = level_count(self.start, self.stop, self.step) as usize;
        (0..levels)
            .map(|index| index as f64)
            .map(|index| self.step.mul_add(index, self.start).min(self.stop))
            .collect()
    }
}

impl FromStr for NoiseSchedule {
    type Err = ScheduleError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = raw.split(':').map(str::trim).collect();
        let [start, stop, step] = fields.as_slice() else {
            return Err(ScheduleError::Format {
                provided: raw.to_owned(),
            });
        };
        Self::new(
            number("start", start)?,
            number("stop", stop)?,
            number("step", step)?,
        )
    }
}

fn level_count(start: f64, stop: f64, step: f64) -> f64 {
    ((stop - start) / step + ROUNDING_SLACK).floor() + 1.0
}

fn number(field: &'static str, text: &str) -> Result<f64, ScheduleError> {
    text.parse().map_err(|_| ScheduleError::Number {
        field,
        text: text.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case("0:0:1", vec![0.0])]
    #[case("0:0.3:0.1", vec![0.0, 0.1, 0.2, 0.3])]
    #[case("1:2:0.4", vec![1.0, 1.4, 1.8])]
    #[case(" 0 : 1 : 0.5 ", vec![0.0, 0.5, 1.0])]
    fn expands_inclusive_ranges(#[case] raw: &str, #[case] expected: Vec<f64>) {
        let schedule: NoiseSchedule = raw.parse().expect("schedule must parse");
        let thresholds = schedule.thresholds();
        assert_eq!(thresholds.len(), expected.len());
        for (actual, wanted) in thresholds.iter().zip(&expected) {
            assert!((actual - wanted).abs() < 1e-12, "{actual} != {wanted}");
        }
    }

    #[rstest]
    #[case("0:1", ScheduleError::Format { provided: "0:1".into() })]
    #[case("0:1:2:3", ScheduleError::Format { provided: "0:1:2:3".into() })]
    #[case("a:1:0.1", ScheduleError::Number { field: "start", text: "a".into() })]
    #[case("0:1:x", ScheduleError::Number { field: "step", text: "x".into() })]
    #[case("-1:1:0.1", ScheduleError::InvalidBounds { start: -1.0, stop: 1.0 })]
    #[case("2:1:0.1", ScheduleError::Reversed { start: 2.0, stop: 1.0 })]
    #[case("0:1:0", ScheduleError::InvalidStep { step: 0.0 })]
    #[case("0:1:-0.5", ScheduleError::InvalidStep { step: -0.5 })]
    #[case("0:1e300:1e-300", ScheduleError::TooManyLevels { levels: f64::INFINITY })]
    fn rejects_malformed_schedules(#[case] raw: &str, #[case] expected: ScheduleError) {
        let err = raw.parse::<NoiseSchedule>().expect_err("schedule must be rejected");
        assert_eq!(err, expected);
    }

    #[rstest]
    #[case("0:10:1e-9")]
    #[case("0:100000:1")]
    fn rejects_oversized_schedules(#[case] raw: &str) {
        let err = raw.parse::<NoiseSchedule>().expect_err("schedule is too long");
        assert!(
            matches!(err, ScheduleError::TooManyLevels { levels } if levels > MAX_LEVELS as f64),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn largest_schedule_expands_fully() {
        let schedule: NoiseSchedule = "0:99999:1".parse().expect("schedule fits the cap");
        let thresholds = schedule.thresholds();
        assert_eq!(thresholds.len(), MAX_LEVELS);
        assert_eq!(thresholds.last(), Some(&99_999.0));
    }
}
