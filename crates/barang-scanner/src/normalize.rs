use barang_types::lookup::LookupRequest;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

const QR_PREFIX: &str = "qrcode:";
const LEGACY_LOCKER_PREFIX: &str = "locker:";

static STANDALONE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[0-9]{4}\b").expect("standalone code pattern is valid"));

/// Decoded text reduced to the key the locker lookup understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NormalizedPayload {
    /// Four-digit label code, possibly recovered from surrounding text.
    Code(String),
    /// Older labels that carried the locker code itself.
    LegacyLocker(String),
    /// Nothing recognisable; the lookup decides whether it is valid.
    Raw(String),
}

impl NormalizedPayload {
    pub fn value(&self) -> &str {
        match self {
            NormalizedPayload::Code(value)
            | NormalizedPayload::LegacyLocker(value)
            | NormalizedPayload::Raw(value) => value,
        }
    }

    pub fn into_request(self) -> LookupRequest {
        match self {
            NormalizedPayload::Code(code) => LookupRequest::payload(code),
            NormalizedPayload::LegacyLocker(code) => LookupRequest::locker_code(code),
            NormalizedPayload::Raw(raw) => LookupRequest::payload(raw),
        }
    }
}

pub fn is_locker_code(text: &str) -> bool {
    text.len() == 4 && text.bytes().all(|b| b.is_ascii_digit())
}

pub fn normalize_payload(raw: &str) -> NormalizedPayload {
    let text = raw.trim();
    if let Some(rest) = text.strip_prefix(QR_PREFIX) {
        let rest = rest.trim();
        return if is_locker_code(rest) {
            NormalizedPayload::Code(rest.to_string())
        } else {
            NormalizedPayload::Raw(rest.to_string())
        };
    }
    if let Some(rest) = text.strip_prefix(LEGACY_LOCKER_PREFIX) {
        return NormalizedPayload::LegacyLocker(rest.trim().to_string());
    }
    if is_locker_code(text) {
        return NormalizedPayload::Code(text.to_string());
    }
    match STANDALONE_CODE.find(text) {
        Some(found) => NormalizedPayload::Code(found.as_str().to_string()),
        None => NormalizedPayload::Raw(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_code_from_common_label_shapes() {
        let cases = [
            ("qrcode:4821", NormalizedPayload::Code("4821".into())),
            ("  qrcode: 4821 ", NormalizedPayload::Code("4821".into())),
            ("4821", NormalizedPayload::Code("4821".into())),
            ("please scan 4821 now", NormalizedPayload::Code("4821".into())),
            ("locker:ABC", NormalizedPayload::LegacyLocker("ABC".into())),
            ("qrcode:Box 4821", NormalizedPayload::Raw("Box 4821".into())),
            ("qrcode:locker:ABC", NormalizedPayload::Raw("locker:ABC".into())),
            ("https://example.com/x", NormalizedPayload::Raw("https://example.com/x".into())),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_payload(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn longer_digit_runs_are_not_codes() {
        assert_eq!(
            normalize_payload("serial 123456"),
            NormalizedPayload::Raw("serial 123456".into())
        );
        assert_eq!(
            normalize_payload("12345 then 6789"),
            NormalizedPayload::Code("6789".into())
        );
    }

    #[test]
    fn legacy_payload_becomes_locker_code_request() {
        assert_eq!(
            normalize_payload("locker:GARAGE").into_request(),
            LookupRequest::locker_code("GARAGE")
        );
        assert_eq!(
            normalize_payload("qrcode:4821").into_request(),
            LookupRequest::payload("4821")
        );
    }
}
