#[cfg(test)]
mod tests {
    use openai_kit::{
        AIMessage, ChatCompletionsRequest, KitConfig, Model, ModelFamily, OpenAIKit,
        OpenAIKitError, Role, Usage,
    };

    #[test]
    fn test_message_creation() {
        let msg = AIMessage::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert_eq!(AIMessage::system("be brief").role, Role::System);
    }

    #[test]
    fn test_model_string_conversion() {
        let model: Model = "gpt-3.5-turbo".into();
        assert_eq!(model, Model::Gpt3_5Turbo);
        assert_eq!(model.as_str(), "gpt-3.5-turbo");
        assert_eq!(model.family(), ModelFamily::Gpt3_5);
    }

    #[test]
    fn test_model_custom() {
        let model: Model = "ft:gpt-3.5-turbo:acme".into();
        assert!(matches!(model, Model::Custom(ref s) if s == "ft:gpt-3.5-turbo:acme"));
        assert_eq!(model.to_string(), "ft:gpt-3.5-turbo:acme");
    }

    #[test]
    fn test_chat_request_round_trips_through_json() {
        let request = ChatCompletionsRequest::builder()
            .model(Model::Gpt4)
            .user_message("Hello")
            .temperature(0.7)
            .max_tokens(100)
            .build();

        let json = serde_json::to_string(&request).expect("serializable");
        let back: ChatCompletionsRequest = serde_json::from_str(&json).expect("deserializable");
        assert_eq!(back.model, Model::Gpt4);
        assert_eq!(back.messages, vec![AIMessage::user("Hello")]);
        assert_eq!(back.max_tokens, Some(100));
        assert_eq!(back.stream, None);
    }

    #[test]
    fn test_usage_totals() {
        let usage = Usage::new(100, 50);
        assert_eq!(usage.total(), Some(150));
        assert_eq!(Usage::default().total(), None);
    }

    #[test]
    fn test_client_debug_hides_token() {
        let client = OpenAIKit::with_token("sk-very-secret").expect("client builds");
        let debug = format!("{client:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("active_streams"));
    }

    #[test]
    fn test_client_builds_with_pem_pin() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/pinned.pem");

        let client = OpenAIKit::new(
            KitConfig::builder()
                .api_token("sk")
                .base_url("https://localhost:8443")
                .pinned_certificate(path)
                .build(),
        )
        .expect("valid pin accepted");
        assert_eq!(client.config().pinned_certificate.as_deref(), Some(std::path::Path::new(path)));
    }

    #[test]
    fn test_invalid_pinned_certificate_is_rejected() {
        let path = std::env::temp_dir().join(format!("openai-kit-pin-{}.pem", std::process::id()));
        std::fs::write(&path, "not a certificate").expect("temp file writable");

        let result = OpenAIKit::new(
            KitConfig::builder()
                .api_token("sk")
                .pinned_certificate(path.clone())
                .build(),
        );
        let _ = std::fs::remove_file(&path);

        assert!(matches!(
            result,
            Err(OpenAIKitError::InvalidPinnedCertificate(_))
        ));
    }
}
