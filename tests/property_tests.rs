//! Property-based tests for the import pipeline.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Filter registration never overwrites an existing name
//! - Progress percentage stays within bounds
//! - Date casts are deterministic and the sentinel is a fixed point
//! - Slot keys are always derived from the identifier

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use csv_importer::filters::{FilterKind, FilterRegistry, Subject};
use csv_importer::models::{ProgressPhase, ProgressSnapshot};
use csv_importer::rules::{DateCaster, DatePrecision, SENTINEL_DATE, SENTINEL_DATETIME};
use csv_importer::{ImportIdentifier, ValidationReport};
use proptest::prelude::*;
use test_case::test_case;

proptest! {
    /// Property: every registration gets a distinct name, `name`, `name_2`, ...
    #[test]
    fn prop_registration_never_overwrites(base in "[a-z]{1,12}", count in 1_usize..12) {
        let mut registry = FilterRegistry::new();
        let names: Vec<String> = (0..count)
            .map(|_| registry.register_validation_fn(|_s: Subject<'_>| true, Some(&base)))
            .collect();

        prop_assert_eq!(registry.all(FilterKind::Validation).len(), count);
        prop_assert_eq!(&names[0], &base);
        for (i, name) in names.iter().enumerate().skip(1) {
            prop_assert_eq!(name, &format!("{base}_{}", i + 1));
        }
    }

    /// Property: unnamed closures of one kind register as `filter`, `filter_2`, ...
    #[test]
    fn prop_unnamed_closures_are_numbered(count in 1_usize..8) {
        let mut registry = FilterRegistry::new();
        for _ in 0..count {
            registry.register_cast_fn(|v| v, None);
        }
        prop_assert!(registry.exists(FilterKind::Cast, "filter"));
        if count > 1 {
            let last = format!("filter_{count}");
            prop_assert!(registry.exists(FilterKind::Cast, &last));
        }
    }

    /// Property: percentage is within [0, 100] while processed <= quantity.
    #[test]
    fn prop_percentage_bounds(quantity in 1_u64..1_000_000, ratio in 0.0_f64..=1.0) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let processed = ((quantity as f64) * ratio) as u64;
        let snapshot = ProgressSnapshot {
            processed,
            quantity: Some(quantity),
            ..ProgressSnapshot::default()
        };
        let percentage = snapshot.percentage().unwrap();
        prop_assert!((0.0..=100.0).contains(&percentage));
        prop_assert_eq!(percentage.fract(), 0.0);
        prop_assert_eq!(snapshot.remains(), quantity - processed);
    }

    /// Property: a held lock never reports "not running".
    #[test]
    fn prop_locked_phase_is_never_not_running(processed in 0_u64..100, quantity in proptest::option::of(0_u64..100)) {
        let snapshot = ProgressSnapshot {
            processed,
            quantity,
            ..ProgressSnapshot::default()
        };
        prop_assert_ne!(ProgressPhase::select(&snapshot, true), ProgressPhase::NotRunning);
    }

    /// Property: casting with a strict format is total and idempotent on failure.
    #[test]
    fn prop_date_cast_sentinel_is_fixed_point(raw in "\\PC{0,20}") {
        let caster = DateCaster::new(Some("Y-m-d"));
        let once = caster.cast(&raw, DatePrecision::Date);
        let twice = caster.cast(&once, DatePrecision::Date);
        prop_assert_eq!(&once, &twice);
    }

    /// Property: valid calendar dates round-trip through the free-form caster.
    #[test]
    fn prop_free_form_dates_normalise(year in 1900_i32..2100, month in 1_u32..=12, day in 1_u32..=28) {
        let caster = DateCaster::new(None);
        let raw = format!("{year}/{month:02}/{day:02}");
        prop_assert_eq!(
            caster.cast(&raw, DatePrecision::Date),
            format!("{year}-{month:02}-{day:02}")
        );
    }

    /// Property: slot keys always start with the identifier.
    #[test]
    fn prop_slot_keys_are_namespaced(id in "[A-Za-z0-9_]{1,30}", suffix in "[a-z0-9_]{0,10}") {
        let identifier = ImportIdentifier::new(&id).concat(&suffix);
        let prefix = format!("{id}{suffix}_");
        for key in identifier.slot_keys().all() {
            prop_assert!(key.starts_with(&prefix));
        }
    }

    /// Property: the report quantity equals the number of pushed messages.
    #[test]
    fn prop_report_quantity_counts_messages(messages in proptest::collection::vec(("[a-c]", "[a-z ]{1,10}"), 0..20)) {
        let mut report = ValidationReport::new();
        for (category, message) in &messages {
            report.push(category.as_str(), message.as_str());
        }
        prop_assert_eq!(report.quantity(), messages.len());
        let total: usize = report.categories().map(|(_, m)| m.len()).sum();
        prop_assert_eq!(total, messages.len());
    }
}

#[test_case("2017/02/26", None, DatePrecision::Date, "2017-02-26" ; "free form date")]
#[test_case("26.02.2017 13:45", None, DatePrecision::DateTime, "2017-02-26 13:45:00" ; "free form datetime")]
#[test_case("not a date", Some("Y-m-d"), DatePrecision::Date, SENTINEL_DATE ; "strict format falls back to sentinel")]
#[test_case(SENTINEL_DATE, Some("Y-m-d"), DatePrecision::Date, SENTINEL_DATE ; "sentinel stays sentinel")]
#[test_case("garbage", None, DatePrecision::DateTime, SENTINEL_DATETIME ; "datetime sentinel")]
fn test_date_cast_determinism(raw: &str, format: Option<&str>, precision: DatePrecision, expected: &str) {
    assert_eq!(DateCaster::new(format).cast(raw, precision), expected);
}
