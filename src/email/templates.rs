pub fn render_password_reset(reset_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>Password Reset</h2>
    <p>We received a request to reset your password. Use the link below to set a new one:</p>
    <p><a href="{reset_url}" style="display: inline-block; padding: 10px 20px; background: #0070f3; color: white; text-decoration: none; border-radius: 4px;">Reset Password</a></p>
    <p style="color: #666; font-size: 14px;">This link expires in 15 minutes. If you didn't request a password reset, you can ignore this email.</p>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_template_embeds_the_link() {
        let html = render_password_reset("https://app.example.com/reset-password?token=abc");
        assert!(html.contains("https://app.example.com/reset-password?token=abc"));
        assert!(html.contains("15 minutes"));
    }
}
