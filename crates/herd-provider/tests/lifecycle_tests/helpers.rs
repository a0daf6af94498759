//! Shared fixtures for the lifecycle stories

use std::time::Duration;

use herd_common::wait::PollSpec;
use herd_provider::checks::removal_spec_with;
use herd_provider::CatalogSpec;

pub const FOO_URL: &str = "http://foo.com:8080";
pub const FOO_DESCRIPTION: &str = "Terraform catalog acceptance test";
pub const FOO_UPDATED_URL: &str = "http://foo.updated.com:8080";
pub const FOO_UPDATED_DESCRIPTION: &str = "Terraform catalog acceptance test - updated";

/// The catalog as first created
pub fn foo_spec() -> CatalogSpec {
    CatalogSpec::new("foo", FOO_URL).with_description(FOO_DESCRIPTION)
}

/// The catalog after its update
pub fn foo_updated_spec() -> CatalogSpec {
    CatalogSpec::new("foo", FOO_UPDATED_URL).with_description(FOO_UPDATED_DESCRIPTION)
}

/// Removal timing short enough for a paused clock to fast-forward through
pub fn quick_removal() -> PollSpec {
    removal_spec_with(
        Duration::from_secs(60),
        Duration::from_millis(500),
        Duration::from_secs(1),
    )
}
