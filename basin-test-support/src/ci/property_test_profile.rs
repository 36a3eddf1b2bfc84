//! Property-test run profile read from the environment.
//!
//! CI raises case counts and enables forking for the long-running property
//! suites; local runs keep each suite's defaults.

use std::env;

/// Overrides the number of cases per property.
pub const PROGTEST_CASES_ENV_KEY: &str = "PROGTEST_CASES";
/// Runs each case in a forked subprocess when truthy.
pub const BASIN_PBT_FORK_ENV_KEY: &str = "BASIN_PBT_FORK";

/// Case count and fork policy for one property suite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProptestRunProfile {
    cases: u32,
    fork: bool,
}

impl ProptestRunProfile {
    /// Reads overrides from the environment, keeping the supplied defaults
    /// for unset or malformed variables.
    ///
    /// # Examples
    ///
    /// ```
    /// use basin_test_support::ci::property_test_profile::ProptestRunProfile;
    ///
    /// let profile = ProptestRunProfile::load(64, false);
    /// assert!(profile.cases() > 0);
    /// ```
    #[must_use]
    pub fn load(default_cases: u32, default_fork: bool) -> Self {
        Self {
            cases: override_or(PROGTEST_CASES_ENV_KEY, default_cases, parse_cases),
            fork: override_or(BASIN_PBT_FORK_ENV_KEY, default_fork, parse_switch),
        }
    }

    /// Returns the number of cases per property.
    #[must_use]
    pub fn cases(&self) -> u32 {
        self.cases
    }

    /// Returns whether cases run in forked subprocesses.
    #[must_use]
    pub fn fork(&self) -> bool {
        self.fork
    }
}

fn override_or<T: Copy>(key: &'static str, default: T, parse: fn(&str) -> Option<T>) -> T {
    let Ok(raw) = env::var(key) else {
        return default;
    };
    parse(raw.trim()).unwrap_or_else(|| {
        tracing::warn!(env = key, raw = %raw, "ignoring malformed property-test override");
        default
    })
}

fn parse_cases(raw: &str) -> Option<u32> {
    raw.parse::<u32>().ok().filter(|&cases| cases > 0)
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
