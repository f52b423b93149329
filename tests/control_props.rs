//! Property tests for request validation and output layout.

use proptest::prelude::*;

use vidctl::backend::validate_request;
use vidctl::output::render_controls;
use vidctl::{ControlError, ControlInfo};

proptest! {
    /// Any value on the step grid inside [min, max] validates.
    #[test]
    fn prop_on_grid_values_validate(
        min in -1000i64..1000,
        span in 1i64..2000,
        step in 1i64..50,
        k in 0i64..100,
    ) {
        let max = min + span;
        let value = min + (k * step).min(span - span % step);
        prop_assume!(value <= max);
        let ctrl = ControlInfo::integer("brightness", min, max, step, min);
        prop_assert!(validate_request(&ctrl, value).is_ok());
    }

    /// Values outside [min, max] are rejected locally with `OutOfRange`.
    #[test]
    fn prop_out_of_range_rejected(
        min in -1000i64..1000,
        span in 1i64..2000,
        overshoot in 1i64..500,
    ) {
        let max = min + span;
        let ctrl = ControlInfo::integer("contrast", min, max, 1, min);
        let above = validate_request(&ctrl, max + overshoot);
        let below = validate_request(&ctrl, min - overshoot);
        let above_out_of_range = matches!(above, Err(ControlError::OutOfRange { .. }));
        let below_out_of_range = matches!(below, Err(ControlError::OutOfRange { .. }));
        prop_assert!(above_out_of_range);
        prop_assert!(below_out_of_range);
    }

    /// In-range values off the step grid are rejected.
    #[test]
    fn prop_off_grid_rejected(
        min in -1000i64..1000,
        step in 2i64..50,
        k in 0i64..20,
        offset in 1i64..50,
    ) {
        prop_assume!(offset % step != 0);
        let max = min + step * 25 + 50;
        let value = min + k * step + offset;
        prop_assume!(value <= max);
        let ctrl = ControlInfo::integer("pan", min, max, step, min);
        let off_grid_rejected = matches!(
            validate_request(&ctrl, value),
            Err(ControlError::OutOfRange { .. })
        );
        prop_assert!(off_grid_rejected);
    }

    /// The name column width always equals the longest name in the set.
    #[test]
    fn prop_name_column_width_tracks_longest(
        names in proptest::collection::vec("[a-z_]{1,24}", 1..8)
    ) {
        let controls: Vec<ControlInfo> = names
            .iter()
            .map(|n| ControlInfo::integer(n.clone(), 0, 100, 1, 50))
            .collect();
        let width = names.iter().map(|n| n.len()).max().unwrap();

        let rendered = render_controls(&controls);
        for line in rendered.lines().filter(|l| l.contains("min=")) {
            let name_field = line.split(" (").next().unwrap();
            prop_assert_eq!(name_field.len(), width);
        }
    }
}
