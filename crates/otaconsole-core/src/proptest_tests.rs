//! Property-based tests for otaconsole-core types.

use proptest::prelude::*;

use crate::model::{parse_release_date, Platform};
use crate::validation::{is_object_id, Validate};
use crate::{CreateReleaseRequest, SetActiveBundleRequest};

/// Strategy for generating object ids.
fn object_id_strategy() -> impl Strategy<Value = String> {
    "[a-f0-9]{24}"
}

/// Strategy for generating non-blank form values.
fn field_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9._-]{0,30}"
}

fn platform_strategy() -> impl Strategy<Value = Platform> {
    prop_oneof![Just(Platform::Ios), Just(Platform::Android)]
}

proptest! {
    #[test]
    fn generated_object_ids_are_accepted(id in object_id_strategy()) {
        prop_assert!(is_object_id(&id));
    }

    #[test]
    fn wrong_length_ids_are_rejected(id in "[a-f0-9]{1,23}|[a-f0-9]{25,40}") {
        prop_assert!(!is_object_id(&id));
    }

    #[test]
    fn complete_create_requests_validate(
        platform in platform_strategy(),
        app_id in field_strategy(),
        version_name in field_strategy(),
        version_code in "[0-9]{1,6}",
        bundle_id in object_id_strategy(),
    ) {
        let req = CreateReleaseRequest {
            platform,
            app_id,
            version_name,
            version_code,
            builtin_bundle_id: bundle_id,
        };
        prop_assert!(req.is_valid());
    }

    #[test]
    fn set_active_rejects_any_blank_id(
        release_id in object_id_strategy(),
        blank in "[ \t]{0,4}",
    ) {
        let req = SetActiveBundleRequest { release_id, bundle_id: blank };
        prop_assert!(!req.is_valid());
    }

    #[test]
    fn platform_parses_its_own_display(platform in platform_strategy()) {
        prop_assert_eq!(platform.to_string().to_uppercase().parse::<Platform>().unwrap(), platform);
    }

    #[test]
    fn plain_dates_parse_to_midnight(year in 2000i32..2100, month in 1u32..=12, day in 1u32..=28) {
        let parsed = parse_release_date(&format!("{year:04}-{month:02}-{day:02}")).unwrap();
        prop_assert_eq!(parsed.format("%H:%M:%S").to_string(), "00:00:00");
    }
}
