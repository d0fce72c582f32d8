//! Landing page fixtures
//!
//! Trimmed-down versions of the markup the token has been observed in.

/// A plausible live token: JWT-shaped and well over 100 characters.
pub fn live_token() -> String {
  format!(
    "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.{}.{}",
    "eyJ1c2VySWQiOiJhbm9ueW1vdXMiLCJzY29wZSI6Im1hdGNoZXMiLCJpYXQiOjE3NDM4NTQ0MDB9",
    "Q2hlY2tzdW1WYWx1ZUZvclRlc3RpbmdPbmx5"
  )
}

// Next.js page with the token inside __NEXT_DATA__
pub fn next_data_page(token: &str) -> String {
  format!(
    r#"<!DOCTYPE html>
<html lang="en">
<head><title>FotMob - Football Live Scores</title></head>
<body>
<div id="__next"><main>Loading matches...</main></div>
<script id="__NEXT_DATA__" type="application/json">{{"props":{{"pageProps":{{"fallback":{{}},"apiHeaders":{{"x-mas":"{token}"}}}}}},"page":"/","buildId":"abc123"}}</script>
</body>
</html>"#
  )
}

// Page with a token only inside an inline script assignment
pub fn inline_marker_page(token: &str) -> String {
  format!(
    r#"<html><head><script>window.__cfg = {{ "x-mas" : "{token}", "locale": "en" }};</script></head>
<body><h1>Matches</h1></body></html>"#
  )
}

// Page with no credential anywhere
pub fn tokenless_page() -> &'static str {
  r#"<html><head><title>FotMob</title></head>
<body><script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{}}}</script></body></html>"#
}
