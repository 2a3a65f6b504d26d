// SPDX-License-Identifier: GPL-3.0-only

//! Structured interpretation of decoded barcode text
//!
//! Codes often carry more than plain text: links, WiFi credentials, contact
//! cards. [`QrContent::parse`] recognizes the common payload conventions and
//! falls back to [`QrContent::Plain`] for everything else.

use crate::detector::ValueType;
use serde::{Deserialize, Serialize};

/// Encryption of a WiFi network shared through a code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WifiEncryption {
    Open,
    Wep,
    Wpa,
}

impl WifiEncryption {
    fn from_tag(tag: &str) -> Self {
        match tag.to_uppercase().as_str() {
            "WEP" => Self::Wep,
            "" | "NOPASS" | "NONE" => Self::Open,
            // WPA, WPA2, WPA3, SAE and enterprise variants
            _ => Self::Wpa,
        }
    }
}

/// Parsed content of a barcode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QrContent {
    Plain {
        text: String,
    },
    Url {
        url: String,
        title: Option<String>,
    },
    Wifi {
        ssid: String,
        password: Option<String>,
        encryption: WifiEncryption,
        hidden: bool,
    },
    Phone {
        number: String,
    },
    Email {
        address: String,
        subject: Option<String>,
        body: Option<String>,
    },
    Sms {
        number: String,
        message: Option<String>,
    },
    GeoPoint {
        lat: f64,
        lng: f64,
        label: Option<String>,
    },
    /// vCard or MECARD payload, kept verbatim
    ContactInfo {
        raw: String,
    },
    /// iCalendar payload, kept verbatim
    CalendarEvent {
        raw: String,
    },
}

impl QrContent {
    /// Classify a decoded payload
    pub fn parse(content: &str) -> Self {
        let trimmed = content.trim();

        if let Some(body) = strip_prefix_ci(trimmed, "WIFI:") {
            return parse_wifi(body);
        }
        if strip_prefix_ci(trimmed, "http://").is_some()
            || strip_prefix_ci(trimmed, "https://").is_some()
        {
            return Self::Url {
                url: trimmed.to_string(),
                title: None,
            };
        }
        if let Some(body) = strip_prefix_ci(trimmed, "MEBKM:") {
            return parse_bookmark(body);
        }
        if let Some(number) = strip_prefix_ci(trimmed, "tel:") {
            return Self::Phone {
                number: number.to_string(),
            };
        }
        if let Some(rest) = strip_prefix_ci(trimmed, "mailto:") {
            return parse_mailto(rest);
        }
        if let Some(body) = strip_prefix_ci(trimmed, "MATMSG:") {
            return parse_matmsg(body);
        }
        if let Some(rest) = strip_prefix_ci(trimmed, "smsto:") {
            return parse_smsto(rest);
        }
        if let Some(rest) = strip_prefix_ci(trimmed, "sms:") {
            return parse_sms_uri(rest);
        }
        if let Some(rest) = strip_prefix_ci(trimmed, "geo:")
            && let Some(geo) = parse_geo(rest)
        {
            return geo;
        }
        if strip_prefix_ci(trimmed, "BEGIN:VCARD").is_some()
            || strip_prefix_ci(trimmed, "MECARD:").is_some()
        {
            return Self::ContactInfo {
                raw: trimmed.to_string(),
            };
        }
        if strip_prefix_ci(trimmed, "BEGIN:VCALENDAR").is_some()
            || strip_prefix_ci(trimmed, "BEGIN:VEVENT").is_some()
        {
            return Self::CalendarEvent {
                raw: trimmed.to_string(),
            };
        }

        Self::Plain {
            text: content.to_string(),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Plain { .. } => ValueType::Text,
            Self::Url { .. } => ValueType::Url,
            Self::Wifi { .. } => ValueType::Wifi,
            Self::Phone { .. } => ValueType::Phone,
            Self::Email { .. } => ValueType::Email,
            Self::Sms { .. } => ValueType::Sms,
            Self::GeoPoint { .. } => ValueType::Geo,
            Self::ContactInfo { .. } => ValueType::ContactInfo,
            Self::CalendarEvent { .. } => ValueType::CalendarEvent,
        }
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        match self {
            Self::Plain { text } => text.clone(),
            Self::Url { url, title: Some(title) } => format!("{} ({})", title, url),
            Self::Url { url, .. } => url.clone(),
            Self::Wifi { ssid, encryption, .. } => format!("WiFi \"{}\" ({:?})", ssid, encryption),
            Self::Phone { number } => format!("Phone {}", number),
            Self::Email { address, .. } => format!("Email {}", address),
            Self::Sms { number, .. } => format!("SMS {}", number),
            Self::GeoPoint { lat, lng, .. } => format!("Location {}, {}", lat, lng),
            Self::ContactInfo { .. } => "Contact card".to_string(),
            Self::CalendarEvent { .. } => "Calendar event".to_string(),
        }
    }
}

/// ASCII case-insensitive `strip_prefix`
fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        s.get(prefix.len()..)
    } else {
        None
    }
}

/// Split `KEY:value;KEY:value;;` fields, honouring backslash escapes
fn split_fields(body: &str) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    let mut push_field = |raw: &mut String| {
        if let Some((key, value)) = raw.split_once(':') {
            fields.push((key.trim().to_uppercase(), value.to_string()));
        }
        raw.clear();
    };

    for c in body.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            ';' => push_field(&mut current),
            _ => current.push(c),
        }
    }
    push_field(&mut current);

    fields
}

fn parse_wifi(body: &str) -> QrContent {
    let mut ssid = String::new();
    let mut password = None;
    let mut encryption = WifiEncryption::Open;
    let mut hidden = false;

    for (key, value) in split_fields(body) {
        match key.as_str() {
            "S" => ssid = value,
            "P" => password = Some(value).filter(|p| !p.is_empty()),
            "T" => encryption = WifiEncryption::from_tag(&value),
            "H" => hidden = value.eq_ignore_ascii_case("true"),
            _ => {}
        }
    }

    QrContent::Wifi {
        ssid,
        password,
        encryption,
        hidden,
    }
}

fn parse_bookmark(body: &str) -> QrContent {
    let mut url = String::new();
    let mut title = None;

    for (key, value) in split_fields(body) {
        match key.as_str() {
            "URL" => url = value,
            "TITLE" => title = Some(value),
            _ => {}
        }
    }

    QrContent::Url { url, title }
}

fn parse_mailto(rest: &str) -> QrContent {
    let (address, query) = rest.split_once('?').unwrap_or((rest, ""));
    let mut subject = None;
    let mut body = None;

    for (key, value) in query_pairs(query) {
        match key.as_str() {
            "subject" => subject = Some(value),
            "body" => body = Some(value),
            _ => {}
        }
    }

    QrContent::Email {
        address: percent_decode(address),
        subject,
        body,
    }
}

fn parse_matmsg(body: &str) -> QrContent {
    let mut address = String::new();
    let mut subject = None;
    let mut text = None;

    for (key, value) in split_fields(body) {
        match key.as_str() {
            "TO" => address = value,
            "SUB" => subject = Some(value),
            "BODY" => text = Some(value),
            _ => {}
        }
    }

    QrContent::Email {
        address,
        subject,
        body: text,
    }
}

/// `SMSTO:number:message`
fn parse_smsto(rest: &str) -> QrContent {
    let (number, message) = match rest.split_once(':') {
        Some((number, message)) => (number, Some(message.to_string())),
        None => (rest, None),
    };
    QrContent::Sms {
        number: number.to_string(),
        message: message.filter(|m| !m.is_empty()),
    }
}

/// `sms:number?body=message`
fn parse_sms_uri(rest: &str) -> QrContent {
    let (number, query) = rest.split_once('?').unwrap_or((rest, ""));
    let message = query_pairs(query)
        .into_iter()
        .find(|(key, _)| key == "body")
        .map(|(_, value)| value);

    QrContent::Sms {
        number: number.to_string(),
        message,
    }
}

/// `geo:lat,lng[,alt][?q=label]`
fn parse_geo(rest: &str) -> Option<QrContent> {
    let (coords, query) = rest.split_once('?').unwrap_or((rest, ""));
    let mut parts = coords.split(',');
    let lat = parts.next()?.trim().parse::<f64>().ok()?;
    let lng = parts.next()?.trim().parse::<f64>().ok()?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return None;
    }

    let label = query_pairs(query)
        .into_iter()
        .find(|(key, _)| key == "q" || key == "label")
        .map(|(_, value)| value);

    Some(QrContent::GeoPoint { lat, lng, label })
}

fn query_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.to_lowercase(), percent_decode(value)))
        .collect()
}

/// Decode `%XX` escapes and `+` as space; invalid escapes are kept verbatim
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url() {
        assert_eq!(
            QrContent::parse("https://example.com/path"),
            QrContent::Url {
                url: "https://example.com/path".to_string(),
                title: None
            }
        );
        assert_eq!(QrContent::parse("HTTP://EXAMPLE.COM").value_type(), ValueType::Url);
    }

    #[test]
    fn test_parse_bookmark() {
        match QrContent::parse("MEBKM:TITLE:Docs;URL:https://docs.rs;;") {
            QrContent::Url { url, title } => {
                assert_eq!(url, "https://docs.rs");
                assert_eq!(title.as_deref(), Some("Docs"));
            }
            other => panic!("Expected Url, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_wifi_with_escapes() {
        match QrContent::parse(r"WIFI:T:WPA;S:My\;Net;P:pa\:ss;H:true;;") {
            QrContent::Wifi {
                ssid,
                password,
                encryption,
                hidden,
            } => {
                assert_eq!(ssid, "My;Net");
                assert_eq!(password.as_deref(), Some("pa:ss"));
                assert_eq!(encryption, WifiEncryption::Wpa);
                assert!(hidden);
            }
            other => panic!("Expected Wifi, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_open_wifi() {
        match QrContent::parse("WIFI:S:Cafe;T:nopass;P:;;") {
            QrContent::Wifi {
                password,
                encryption,
                ..
            } => {
                assert_eq!(password, None);
                assert_eq!(encryption, WifiEncryption::Open);
            }
            other => panic!("Expected Wifi, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_mailto() {
        assert_eq!(
            QrContent::parse("mailto:test@example.com?subject=Hello%20there&body=A+B"),
            QrContent::Email {
                address: "test@example.com".to_string(),
                subject: Some("Hello there".to_string()),
                body: Some("A B".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_matmsg() {
        match QrContent::parse("MATMSG:TO:a@b.c;SUB:Hi;BODY:Text;;") {
            QrContent::Email { address, subject, body } => {
                assert_eq!(address, "a@b.c");
                assert_eq!(subject.as_deref(), Some("Hi"));
                assert_eq!(body.as_deref(), Some("Text"));
            }
            other => panic!("Expected Email, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_sms_variants() {
        assert_eq!(
            QrContent::parse("SMSTO:+123:Hello"),
            QrContent::Sms {
                number: "+123".to_string(),
                message: Some("Hello".to_string())
            }
        );
        assert_eq!(
            QrContent::parse("sms:+456?body=Hi%21"),
            QrContent::Sms {
                number: "+456".to_string(),
                message: Some("Hi!".to_string())
            }
        );
    }

    #[test]
    fn test_parse_geo() {
        match QrContent::parse("geo:37.7749,-122.4194?q=San+Francisco") {
            QrContent::GeoPoint { lat, lng, label } => {
                assert!((lat - 37.7749).abs() < 1e-6);
                assert!((lng + 122.4194).abs() < 1e-6);
                assert_eq!(label.as_deref(), Some("San Francisco"));
            }
            other => panic!("Expected GeoPoint, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_geo_is_plain() {
        assert!(matches!(
            QrContent::parse("geo:123.0,10.0"),
            QrContent::Plain { .. }
        ));
    }

    #[test]
    fn test_parse_phone_and_cards() {
        assert_eq!(QrContent::parse("tel:+1234567890").value_type(), ValueType::Phone);
        assert_eq!(
            QrContent::parse("BEGIN:VCARD\nFN:Jo\nEND:VCARD").value_type(),
            ValueType::ContactInfo
        );
        assert_eq!(
            QrContent::parse("BEGIN:VEVENT\nSUMMARY:Talk\nEND:VEVENT").value_type(),
            ValueType::CalendarEvent
        );
    }

    #[test]
    fn test_plain_text_is_kept_verbatim() {
        assert_eq!(
            QrContent::parse("  Hello World!  "),
            QrContent::Plain {
                text: "  Hello World!  ".to_string()
            }
        );
    }

    #[test]
    fn test_percent_decode_utf8_and_invalid() {
        assert_eq!(percent_decode("caf%C3%A9"), "café");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }
}
