//! Named failure injection points (feature: `failpoints`).
//!
//! `fail_point!(name, |reason| err)` returns `Err(err)` from the enclosing
//! function when `name` has been enabled. Without the feature the macro
//! expands to nothing observable.

#[cfg(feature = "failpoints")]
use std::collections::HashMap;
#[cfg(feature = "failpoints")]
use std::sync::{Mutex, OnceLock};

#[cfg(feature = "failpoints")]
fn registry() -> &'static Mutex<HashMap<String, String>> {
    static POINTS: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
    POINTS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Arm `name`; the next checks of it fail with `reason` until disabled.
#[cfg(feature = "failpoints")]
pub fn enable(name: impl Into<String>, reason: impl Into<String>) {
    let mut points = registry().lock().unwrap_or_else(|p| p.into_inner());
    points.insert(name.into(), reason.into());
}

#[cfg(feature = "failpoints")]
pub fn disable(name: &str) {
    let mut points = registry().lock().unwrap_or_else(|p| p.into_inner());
    points.remove(name);
}

#[cfg(feature = "failpoints")]
pub fn check(name: &str) -> Option<String> {
    let points = registry().lock().unwrap_or_else(|p| p.into_inner());
    points.get(name).cloned()
}

#[cfg(feature = "failpoints")]
#[macro_export]
macro_rules! fail_point {
    ($name:expr, $on_fire:expr) => {
        if let Some(reason) = $crate::failpoints::check($name) {
            ::tracing::warn!(point = %$name, %reason, "failpoint fired");
            return Err(($on_fire)(reason));
        }
    };
}

#[cfg(not(feature = "failpoints"))]
#[macro_export]
macro_rules! fail_point {
    ($name:expr, $on_fire:expr) => {
        let _ = $name;
    };
}

#[cfg(all(test, feature = "failpoints"))]
mod tests {
    use super::*;

    fn guarded() -> Result<u8, String> {
        crate::fail_point!("tests.guarded", |reason: String| format!("boom: {reason}"));
        Ok(1)
    }

    #[test]
    fn enabled_point_returns_error() {
        assert_eq!(guarded(), Ok(1));
        enable("tests.guarded", "armed");
        assert_eq!(guarded(), Err("boom: armed".to_string()));
        disable("tests.guarded");
        assert_eq!(guarded(), Ok(1));
    }
}
