//! Client-side interceptor script.
//!
//! The script is shipped inside every rewritten document. It hijacks anchor
//! clicks and GET form submissions at the document level and sends them back
//! through the proxy endpoint; other form methods are blocked with an in-page
//! notice. Form fields include the submitter button when the browser
//! supports it.

/// Script template; `{{PROXY_ENDPOINT}}` is replaced with a JS string literal.
pub const INTERCEPTOR_TEMPLATE: &str = include_str!("interceptor.js");

/// Attribute that marks the injected `<script>` element.
pub const INTERCEPTOR_MARKER: &str = "data-ghostframe-interceptor";

const ENDPOINT_PLACEHOLDER: &str = "{{PROXY_ENDPOINT}}";

/// Render the interceptor `<script>` block for an endpoint path.
pub fn render(endpoint_path: &str) -> String {
    INTERCEPTOR_TEMPLATE.replace(ENDPOINT_PLACEHOLDER, &js_string_literal(endpoint_path))
}

/// Quote a value as a JS string literal that is safe inside a `<script>` element.
fn js_string_literal(value: &str) -> String {
    // Serializing a &str cannot fail.
    let quoted = serde_json::to_string(value).unwrap_or_else(|_| String::from("\"\""));
    quoted.replace("</", "<\\/")
}
