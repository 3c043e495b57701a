#[cfg(test)]
mod tests {
    use crate::component::*;
    use crate::validate::{ErrorCategory, ErrorKind};

    fn widget_registry() -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        registry.register("Widget", "Widget", &["w"]).unwrap();
        registry.freeze();
        registry
    }

    #[test]
    fn test_primary_and_alias_resolve_to_same_type() {
        let registry = widget_registry();
        assert_eq!(
            registry.resolve("Widget"),
            TargetType::Component("Widget".to_string())
        );
        assert_eq!(
            registry.resolve("w"),
            TargetType::Component("Widget".to_string())
        );
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = widget_registry();
        assert_eq!(registry.lookup("WIDGET"), Some("Widget"));
        assert_eq!(registry.lookup("W"), Some("Widget"));
    }

    #[test]
    fn test_unknown_tag_falls_back_to_element() {
        let registry = widget_registry();
        assert_eq!(registry.lookup("ghost"), None);
        assert_eq!(registry.resolve("ghost"), TargetType::Element);
        assert_eq!(registry.resolve("div"), TargetType::Element);
    }

    #[test]
    fn test_text_tag_is_transparent_unless_registered() {
        let registry = widget_registry();
        assert_eq!(registry.resolve("text"), TargetType::Transparent);

        let mut custom = ComponentRegistry::new();
        custom.register("RichText", "text", &[]).unwrap();
        assert_eq!(
            custom.resolve("text"),
            TargetType::Component("RichText".to_string())
        );
    }

    #[test]
    fn test_conflicting_claim_is_rejected() {
        let mut registry = ComponentRegistry::new();
        registry.register("Widget", "Widget", &["w"]).unwrap();
        let err = registry.register("Wrapper", "Wrapper", &["W"]).unwrap_err();
        assert_eq!(
            err,
            RegistryError::AmbiguousTagName {
                tag: "W".to_string(),
                existing: "Widget".to_string(),
                incoming: "Wrapper".to_string(),
            }
        );
        assert_eq!(err.kind(), ErrorKind::AmbiguousTagName);
        assert_eq!(err.kind().category(), ErrorCategory::ResolutionError);
        // Rejected registrations insert nothing.
        assert_eq!(registry.lookup("Wrapper"), None);
    }

    #[test]
    fn test_reregistering_same_pair_is_allowed() {
        let mut registry = ComponentRegistry::new();
        registry.register("Widget", "Widget", &["w"]).unwrap();
        registry.register("Widget", "widget", &[]).unwrap();
        assert_eq!(registry.lookup("w"), Some("Widget"));
        assert_eq!(registry.lookup("Widget"), Some("Widget"));
    }

    #[test]
    fn test_frozen_registry_rejects_registration() {
        let mut registry = widget_registry();
        assert!(registry.is_frozen());
        assert_eq!(
            registry.register("Other", "Other", &[]),
            Err(RegistryError::Frozen {
                type_name: "Other".to_string()
            })
        );
        assert_eq!(registry.lookup("Other"), None);
    }

    #[test]
    fn test_from_registrations_freezes() {
        let json = r#"[{"typeName": "App.Button", "primaryName": "Button", "aliases": ["btn"]}]"#;
        let registrations: Vec<ComponentRegistration> = serde_json::from_str(json).unwrap();
        let registry = ComponentRegistry::from_registrations(&registrations).unwrap();
        assert!(registry.is_frozen());
        assert_eq!(registry.lookup("btn"), Some("App.Button"));
        assert_eq!(registry.lookup("button"), Some("App.Button"));
    }
}
