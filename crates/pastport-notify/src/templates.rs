//! Email rendering for notification events.
//!
//! The email mirrors the in-app notification: the notification title
//! becomes the subject, the message becomes the body, wrapped in a
//! plain-text and an HTML shell.

/// Rendered multipart email content.
pub struct EmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl EmailContent {
    pub fn notification(title: &str, message: &str) -> Self {
        Self {
            subject: title.to_string(),
            text: Self::text_template(title, message),
            html: Self::html_template(title, message),
        }
    }

    fn text_template(heading: &str, body: &str) -> String {
        format!(
            r#"{}

{}

--
PastPort"#,
            heading, body
        )
    }

    fn html_template(heading: &str, body: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; margin: 0; padding: 0; background: #f5f5f5; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 40px 20px; }}
        .card {{ background: white; border-radius: 8px; padding: 40px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        h1 {{ color: #1a1a1a; margin-top: 0; font-size: 24px; }}
        .footer {{ margin-top: 32px; padding-top: 20px; border-top: 1px solid #eee; color: #888; font-size: 12px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="card">
            <h1>{}</h1>
            <p>{}</p>
            <div class="footer">
                <p>You are receiving this because unlock emails are enabled in your PastPort preferences.</p>
            </div>
        </div>
    </div>
</body>
</html>"#,
            heading, body
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_mirrors_notification_title() {
        let content =
            EmailContent::notification("\"letter to 2030 me\" has unlocked", "Open PastPort to read it.");
        assert_eq!(content.subject, "\"letter to 2030 me\" has unlocked");
    }

    #[test]
    fn both_bodies_carry_title_and_message() {
        let content = EmailContent::notification("Capsule unlocked", "A capsule from your past is ready.");
        assert!(content.text.contains("Capsule unlocked"));
        assert!(content.text.contains("A capsule from your past is ready."));
        assert!(content.html.contains("<!DOCTYPE html>"));
        assert!(content.html.contains("Capsule unlocked"));
        assert!(content.html.contains("A capsule from your past is ready."));
    }
}
