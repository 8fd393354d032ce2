//! Property-based tests for secret handling policies.

use proptest::prelude::*;
use subhub_vault::{SecretPolicies, SecretPolicy, names, secrets::validate_secret_name};

// Strategy for generating secret values
fn secret_value_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9!@#$%^&*]{8,64}"
}

// Strategy for generating valid Key Vault secret names other than the OpenAI key
fn plain_secret_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(names::SNOWFLAKE_USERNAME.to_string()),
        Just(names::SNOWFLAKE_PASSWORD.to_string()),
        Just(names::LOOKER_CLIENT_SECRET.to_string()),
        "[a-z][a-z0-9-]{2,40}",
    ]
    .prop_filter("not the redacted key", |name| name != names::OPENAI_API_KEY)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every name without a policy entry comes back exactly as stored.
    #[test]
    fn prop_plain_secrets_unmodified(
        name in plain_secret_name_strategy(),
        value in secret_value_strategy(),
    ) {
        let resolved = SecretPolicies::default().apply(&name, value.clone());
        prop_assert!(!resolved.is_redacted());
        prop_assert_eq!(resolved.as_plain(), Some(value.as_str()));
        prop_assert_eq!(resolved.to_string(), value);
    }

    /// The redacted key never leaks through Debug or Display.
    #[test]
    fn prop_redacted_secret_not_exposed(value in secret_value_strategy()) {
        let resolved = SecretPolicies::default().apply(names::OPENAI_API_KEY, value.clone());

        let debug_output = format!("{resolved:?}");
        let display_output = resolved.to_string();

        prop_assert!(!debug_output.contains(&value), "Debug output should not contain secret value");
        prop_assert!(!display_output.contains(&value), "Display output should not contain secret value");
        prop_assert!(debug_output.contains("[REDACTED]"));

        // But we can still access the secret when needed
        prop_assert_eq!(resolved.expose(), value.as_str());
    }

    /// A configured table redacts exactly the names it lists.
    #[test]
    fn prop_policy_table_drives_redaction(
        name in "[a-z][a-z0-9-]{2,20}",
        other in "[a-z][a-z0-9-]{2,20}",
        value in secret_value_strategy(),
    ) {
        prop_assume!(name != other);
        let policies = SecretPolicies::plain().with_policy(name.clone(), SecretPolicy::Redacted);

        prop_assert!(policies.apply(&name, value.clone()).is_redacted());
        prop_assert!(!policies.apply(&other, value).is_redacted());
    }

    #[test]
    fn prop_valid_names_accepted(name in "[0-9a-zA-Z-]{1,127}") {
        prop_assert!(validate_secret_name(&name).is_ok());
    }

    #[test]
    fn prop_names_with_other_chars_rejected(
        prefix in "[a-z]{0,10}",
        bad in "[_./ :@]",
        suffix in "[a-z]{0,10}",
    ) {
        let name = format!("{prefix}{bad}{suffix}");
        prop_assert!(validate_secret_name(&name).is_err());
    }
}
