/// Feature flag gating the app registry endpoints.
pub const INTERNAL_CATCHALL: &str = "organizations:internal-catchall";

/// Feature names take the form `<namespace>:<name>`, lowercase.
pub fn validate_feature_name(feature: &str) -> Result<(), String> {
    let Some((namespace, name)) = feature.split_once(':') else {
        return Err(format!("feature '{feature}' must look like 'namespace:name'"));
    };

    let valid_part = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    };

    if !valid_part(namespace) || !valid_part(name) {
        return Err(format!(
            "feature '{feature}' may only contain lowercase letters, digits, hyphens, and underscores"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_feature_name() {
        assert!(validate_feature_name(INTERNAL_CATCHALL).is_ok());
        assert!(validate_feature_name("organizations").is_err());
        assert!(validate_feature_name("organizations:").is_err());
        assert!(validate_feature_name("Organizations:Foo").is_err());
        assert!(validate_feature_name("a:b:c").is_err());
    }
}
