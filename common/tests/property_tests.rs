//! Property tests for the HTTP builders and error messages.

use proptest::prelude::*;
use std::time::Duration;
use subhub_common::{HttpConfig, PlatformError};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn timeout_overrides_leave_pool_settings_alone(req in 1u64..3_600, connect in 1u64..120) {
        let base = HttpConfig::default();
        let tuned = base
            .clone()
            .with_timeout(Duration::from_secs(req))
            .with_connect_timeout(Duration::from_secs(connect));
        prop_assert_eq!(tuned.timeout, Duration::from_secs(req));
        prop_assert_eq!(tuned.connect_timeout, Duration::from_secs(connect));
        prop_assert_eq!(tuned.pool_max_idle_per_host, base.pool_max_idle_per_host);
        prop_assert_eq!(tuned.user_agent, base.user_agent);
    }

    #[test]
    fn component_is_appended_once(component in "[a-z][a-z-]{0,15}") {
        let config = HttpConfig::default().with_component(&component);
        let suffix = format!(" {component}");
        prop_assert!(config.user_agent.ends_with(&suffix));
        prop_assert_eq!(config.user_agent.matches(&suffix).count(), 1);
    }

    #[test]
    fn error_messages_carry_the_detail(msg in "[ -~]{0,60}") {
        prop_assert!(PlatformError::invalid_input(msg.clone()).to_string().ends_with(&msg));
    }
}
