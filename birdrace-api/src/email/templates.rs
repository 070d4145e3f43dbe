//! Email templates

use super::EmailMessage;

const SITE_NAME: &str = "BirdRace";

/// Escape text for interpolation into HTML
pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Login email carrying the magic link
pub fn magic_link_email(to: &str, link: &str, ttl_minutes: i64) -> EmailMessage {
    let link = html_escape(link);
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; padding: 20px;">
    <h2>Welcome to {site}!</h2>
    <p>Click the link below to log in to your account:</p>
    <p>
        <a href="{link}"
           style="background-color: #4CAF50; color: white; padding: 14px 20px; text-decoration: none; border-radius: 4px; display: inline-block;">
            Log in to {site}
        </a>
    </p>
    <p style="color: #666; font-size: 14px;">This link will expire in {ttl} minutes and works once.</p>
    <p style="color: #666; font-size: 14px;">If you didn't request this login link, you can safely ignore this email.</p>
</body>
</html>"#,
        site = SITE_NAME,
        link = link,
        ttl = ttl_minutes,
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("Log in to {}", SITE_NAME),
        html,
        reply_to: None,
    }
}

/// Feature request forwarded to the site owner
///
/// The submitter's address, when given, becomes the reply-to.
pub fn feature_request_email(owner: &str, suggestion: &str, submitter: Option<&str>) -> EmailMessage {
    let reply_section = submitter
        .map(|email| format!("<p><strong>Reply to:</strong> {}</p>", html_escape(email)))
        .unwrap_or_default();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; padding: 20px;">
    <h2>New Feature Request</h2>
    {reply}
    <h3>Suggestion:</h3>
    <p style="background: #f5f5f5; padding: 15px; border-radius: 4px; white-space: pre-wrap;">{suggestion}</p>
    <hr style="border: 1px solid #eee; margin: 20px 0;">
    <p style="color: #999; font-size: 12px;">Submitted via the {site} leaderboard</p>
</body>
</html>"#,
        reply = reply_section,
        suggestion = html_escape(suggestion),
        site = SITE_NAME,
    );

    EmailMessage {
        to: owner.to_string(),
        subject: format!("{} feature request", SITE_NAME),
        html,
        reply_to: submitter.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<script>alert("x & y")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; y&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_magic_link_email_contains_link_and_ttl() {
        let msg = magic_link_email("a@example.com", "http://localhost:5173/auth/verify?token=abc", 15);
        assert_eq!(msg.to, "a@example.com");
        assert!(msg.html.contains("http://localhost:5173/auth/verify?token=abc"));
        assert!(msg.html.contains("15 minutes"));
        assert!(msg.reply_to.is_none());
    }

    #[test]
    fn test_feature_request_escapes_suggestion() {
        let msg = feature_request_email("owner@example.com", "Add <b>maps</b>", Some("fan@example.com"));
        assert!(msg.html.contains("Add &lt;b&gt;maps&lt;/b&gt;"));
        assert_eq!(msg.reply_to.as_deref(), Some("fan@example.com"));
    }
}
