use yamdb_api::{
    LogMailer, MockMailer, SmtpMailer,
    config::SmtpConfig,
    mailer::{MailError, Mailer, SentMail},
};

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_messages_in_order() {
        let mock = MockMailer::new();
        mock.send_confirmation_code("a@example.com", "111111")
            .await
            .unwrap();
        mock.send_confirmation_code("b@example.com", "222222")
            .await
            .unwrap();
        mock.send_confirmation_code("a@example.com", "333333")
            .await
            .unwrap();

        assert_eq!(mock.sent().len(), 3);
        assert_eq!(
            mock.sent()[1],
            SentMail {
                to: "b@example.com".to_string(),
                code: "222222".to_string()
            }
        );
        assert_eq!(mock.last_code_for("a@example.com").as_deref(), Some("333333"));
        assert_eq!(mock.last_code_for("nobody@example.com"), None);
    }

    #[tokio::test]
    async fn test_mock_clones_share_outbox() {
        let mock = MockMailer::new();
        let clone = mock.clone();
        clone
            .send_confirmation_code("a@example.com", "123456")
            .await
            .unwrap();
        assert_eq!(mock.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockMailer::new_failing();
        let result = mock.send_confirmation_code("a@example.com", "123456").await;
        assert!(matches!(result, Err(MailError::Delivery(_))));
        assert!(mock.sent().is_empty());
    }
}

#[cfg(test)]
mod backend_tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        let mailer = LogMailer::new("noreply@yamdb.local");
        assert!(mailer
            .send_confirmation_code("a@example.com", "123456")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_smtp_mailer_construction() {
        let config = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 2525,
            user: Some("user".to_string()),
            password: Some("secret".to_string()),
        };
        assert!(SmtpMailer::new(&config, "noreply@yamdb.local").is_ok());
    }

    #[tokio::test]
    async fn test_smtp_mailer_rejects_bad_recipient_before_connecting() {
        let config = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 2525,
            user: None,
            password: None,
        };
        let mailer = SmtpMailer::new(&config, "noreply@yamdb.local").unwrap();
        let result = mailer.send_confirmation_code("not an address", "123456").await;
        assert!(matches!(result, Err(MailError::Address(_))));
    }
}
