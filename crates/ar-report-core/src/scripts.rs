//! In-page expressions evaluated through [`BrowsingSession::evaluate`].
//!
//! Every builder returns a self-invoking expression so the bridge can pass it
//! to the page verbatim.
//!
//! [`BrowsingSession::evaluate`]: ar_report_browser::BrowsingSession::evaluate

use serde_json::Value;

fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// True once the `<select>` holds more than its placeholder option.
pub fn options_populated(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({sel}); return Boolean(el && el.options && el.options.length > 1); }})()",
        sel = js_string(selector)
    )
}

/// Assigns a control's value and fires a bubbling `change` event. Evaluates to
/// the value the control holds afterwards.
pub fn set_value_and_notify(selector: &str, value: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({sel}); if (!el) {{ throw new Error('element not found: ' + {sel}); }} el.value = {val}; el.dispatchEvent(new Event('change', {{ bubbles: true }})); return el.value; }})()",
        sel = js_string(selector),
        val = js_string(value)
    )
}

pub fn element_present(selector: &str) -> String {
    format!(
        "(() => document.querySelector({sel}) !== null)()",
        sel = js_string(selector)
    )
}

/// Id, value and option count of every `<select>` on the page.
pub fn form_snapshot() -> String {
    "(() => Array.from(document.querySelectorAll('select')).map((el) => [el.id || el.name || '', el.value, el.options.length]))()".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_json_quoted() {
        let script = options_populated("#report_coach_id");
        assert!(script.contains(r##"document.querySelector("#report_coach_id")"##));
        assert!(script.contains("el.options.length > 1"));
    }

    #[test]
    fn quotes_in_values_are_escaped() {
        let script = set_value_and_notify(r#"a[id="3"]"#, "it's");
        assert!(script.contains(r#""a[id=\"3\"]""#));
        assert!(script.contains(r#"el.value = "it's";"#));
        assert!(script.contains("new Event('change', { bubbles: true })"));
    }

    #[test]
    fn expressions_self_invoke() {
        for script in [
            options_populated("#hub_options"),
            set_value_and_notify("#hub_options", "1"),
            element_present("input[name=\"login\"]"),
            form_snapshot(),
        ] {
            assert!(script.starts_with("(() =>"));
            assert!(script.ends_with(")()"));
        }
    }
}
