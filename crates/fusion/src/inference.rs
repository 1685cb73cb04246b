//! Deterministic attribute inference from listing titles.
//!
//! Used only when vision left a part's critical attribute empty.

use forgebom_core::TitleInference;
use regex_lite::Regex;
use std::sync::LazyLock;

const MM_PER_INCH: f64 = 25.4;

static BOLT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}(?:\.\d+)?)\s*[x*]\s*(\d{1,2}(?:\.\d+)?)\s*mm\b")
        .expect("bolt pattern regex")
});

static STATOR_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{2})(\d{2})(?:\.\d)?\b").expect("stator regex"));

static INCH_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(\d{1,2}(?:\.\d+)?)\s*(?:-\s*)?(?:inch(?:es)?\b|in\b|")"#)
        .expect("inch regex")
});

static PITCH_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}(?:\.\d+)?)\s*x\s*\d(?:\.\d+)?\b").expect("pitch regex")
});

static PROP_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([1-9])(\d)(\d{2})(\d)?\b").expect("prop code regex"));

static MM_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{2,3}(?:\.\d+)?)\s*mm\b").expect("mm regex"));

/// Run the inference rule registered for a part's critical attribute.
pub fn infer(rule: TitleInference, title: &str) -> Option<f64> {
    match rule {
        TitleInference::MotorMounting => infer_motor_mounting(title),
        TitleInference::PropDiameter => extract_prop_diameter(title),
    }
}

/// Motor mounting-bolt spacing in millimetres.
///
/// An explicit square pattern (`16x16mm`) wins. Otherwise the stator code
/// (`2207` = 22 mm wide, 7 mm tall) is mapped onto the usual bolt circle for
/// that stator width.
pub fn infer_motor_mounting(title: &str) -> Option<f64> {
    for caps in BOLT_PATTERN.captures_iter(title) {
        let a: f64 = caps[1].parse().ok()?;
        let b: f64 = caps[2].parse().ok()?;
        if a == b && (5.0..=40.0).contains(&a) {
            return Some(a);
        }
    }

    for caps in STATOR_CODE.captures_iter(title) {
        let whole = caps.get(0)?;
        let rest = title[whole.end()..].trim_start().to_lowercase();
        if rest.starts_with("kv") || rest.starts_with("mah") {
            continue;
        }
        let width: u32 = caps[1].parse().ok()?;
        let height: u32 = caps[2].parse().ok()?;
        if !(8..=40).contains(&width) || !(3..=20).contains(&height) {
            continue;
        }
        let spacing = match width {
            0..=16 => 9.0,
            17..=21 => 12.0,
            22..=26 => 16.0,
            _ => 19.0,
        };
        return Some(spacing);
    }

    None
}

/// Propeller diameter in millimetres.
///
/// Recognizes `5 inch` / `5"`, pitch pairs (`5x4.3`), the compact codes
/// shops use (`5143` = 5.1 in, `51433` = 5.1 in tri-blade), and finally
/// plain millimetre sizes for whoop props (`40mm`).
pub fn extract_prop_diameter(title: &str) -> Option<f64> {
    let inches = INCH_SIZE
        .captures(title)
        .and_then(|c| c[1].parse::<f64>().ok())
        .filter(|d| (1.0..=30.0).contains(d))
        .or_else(|| {
            PITCH_PAIR
                .captures(title)
                .and_then(|c| c[1].parse::<f64>().ok())
                .filter(|d| (1.0..=30.0).contains(d))
        })
        .or_else(|| {
            PROP_CODE.captures(title).and_then(|c| {
                let whole: f64 = c[1].parse().ok()?;
                let tenth: f64 = c[2].parse().ok()?;
                Some(whole + tenth / 10.0)
            })
        });

    if let Some(d) = inches {
        return Some(round2(d * MM_PER_INCH));
    }

    MM_SIZE
        .captures(title)
        .and_then(|c| c[1].parse::<f64>().ok())
        .filter(|mm| (20.0..=800.0).contains(mm))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
