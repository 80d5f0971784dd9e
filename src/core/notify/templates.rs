//! Built-in email templates
//!
//! Templates use `{{Key}}` placeholders filled from the notification's JSON
//! data. Values are HTML-escaped.

use super::NotifyError;

/// Name of the post-registration "set your password" template
pub const SIGNUP_TEMPLATE: &str = "signup";

const SIGNUP_HTML: &str = r#"<!DOCTYPE html>
<html>
  <body style="font-family: Arial, sans-serif; color: #222;">
    <h2>Welcome to the CCI Member Portal, {{FirstName}}!</h2>
    <p>Your membership profile has been created. To finish setting up your
    account, choose a password using the link below.</p>
    <p><a href="{{Link}}">Set your password</a></p>
    <p>If the button does not work, copy this address into your browser:<br>{{Link}}</p>
    <p>This link can only be used once and expires after a limited time.</p>
  </body>
</html>
"#;

fn lookup(name: &str) -> Option<&'static str> {
    match name {
        SIGNUP_TEMPLATE => Some(SIGNUP_HTML),
        _ => None,
    }
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the named template with `data`
pub fn render_template(name: &str, data: &serde_json::Value) -> Result<String, NotifyError> {
    let template = lookup(name).ok_or_else(|| NotifyError::UnknownTemplate(name.to_string()))?;

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            // Unterminated placeholder; emit verbatim
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let key = after[..end].trim();
        let value = match data.get(key) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => {
                return Err(NotifyError::MissingValue(key.to_string()));
            }
            Some(other) => other.to_string(),
        };
        out.push_str(&escape_html(&value));
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_signup_template() {
        let html = render_template(
            SIGNUP_TEMPLATE,
            &json!({"FirstName": "Ada", "Link": "https://portal.example/set-password?token=abc"}),
        )
        .unwrap();

        assert!(html.contains("Welcome to the CCI Member Portal, Ada!"));
        assert!(html.contains("href=\"https://portal.example/set-password?token=abc\""));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_render_escapes_values() {
        let html = render_template(
            SIGNUP_TEMPLATE,
            &json!({"FirstName": "<script>", "Link": "x"}),
        )
        .unwrap();

        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_render_missing_value() {
        let result = render_template(SIGNUP_TEMPLATE, &json!({"FirstName": "Ada"}));
        assert!(matches!(result, Err(NotifyError::MissingValue(key)) if key == "Link"));
    }

    #[test]
    fn test_render_unknown_template() {
        let result = render_template("missing", &json!({}));
        assert!(matches!(result, Err(NotifyError::UnknownTemplate(_))));
    }
}
