//! Rendering of the TwiML returned to Twilio's call-setup webhook.

use reqwest::Url;

/// Spoken to the caller before the media stream connects.
pub const GREETING: &str = "Thank you for calling Absolute Healthcare - How may I help you?.";

/// Escapes text for use in XML content and attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Appends `callSid` and `token` query parameters to the stream URL.
pub fn stream_url(base: &Url, call_sid: Option<&str>, token: Option<&str>) -> String {
    let params: Vec<(&str, &str)> = [("callSid", call_sid), ("token", token)]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect();
    let mut url = base.clone();
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    url.to_string()
}

/// Builds the `<Say>` + `<Connect><Stream>` document for an incoming call.
///
/// The call SID and correlation token are sent both in the stream URL and
/// as stream `<Parameter>`s; Twilio only guarantees delivery of the latter.
pub fn connect_stream(
    greeting: &str,
    stream_base_url: &Url,
    call_sid: Option<&str>,
    token: Option<&str>,
) -> String {
    let url = stream_url(stream_base_url, call_sid, token);
    let mut parameters = String::new();
    for (name, value) in [("callSid", call_sid), ("token", token)] {
        if let Some(value) = value {
            parameters.push_str(&format!(
                r#"<Parameter name="{name}" value="{}"/>"#,
                escape_xml(value)
            ));
        }
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "<Response><Say>{greeting}</Say>",
            r#"<Connect><Stream url="{url}">{parameters}</Stream></Connect>"#,
            "</Response>"
        ),
        greeting = escape_xml(greeting),
        url = escape_xml(&url),
        parameters = parameters,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            escape_xml(r#"a & b < c > "d" 'e'"#),
            "a &amp; b &lt; c &gt; &quot;d&quot; &apos;e&apos;"
        );
        assert_eq!(escape_xml("plain"), "plain");
    }

    fn base(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    #[test]
    fn test_stream_url() {
        assert_eq!(
            stream_url(&base("wss://relay.test/media-stream"), Some("CA1"), Some("tok")),
            "wss://relay.test/media-stream?callSid=CA1&token=tok"
        );
        assert_eq!(
            stream_url(&base("wss://relay.test/media-stream?region=us"), None, Some("a b&c")),
            "wss://relay.test/media-stream?region=us&token=a+b%26c"
        );
        assert_eq!(
            stream_url(&base("wss://relay.test/media-stream"), None, None),
            "wss://relay.test/media-stream"
        );
    }

    #[test]
    fn test_connect_stream_document() {
        let twiml = connect_stream(
            "Hello & welcome",
            &base("wss://relay.test/media-stream"),
            Some("CA1"),
            Some("tok"),
        );

        assert_eq!(
            twiml,
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                "<Response><Say>Hello &amp; welcome</Say>",
                r#"<Connect><Stream url="wss://relay.test/media-stream?callSid=CA1&amp;token=tok">"#,
                r#"<Parameter name="callSid" value="CA1"/>"#,
                r#"<Parameter name="token" value="tok"/>"#,
                "</Stream></Connect></Response>"
            )
        );
    }

    #[test]
    fn test_connect_stream_without_call_sid() {
        let twiml = connect_stream(GREETING, &base("wss://relay.test/media-stream"), None, None);
        assert!(twiml.contains(r#"<Stream url="wss://relay.test/media-stream"></Stream>"#));
        assert!(!twiml.contains("<Parameter"));
    }
}
