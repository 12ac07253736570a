//! Scrubs credential material from messages that leave the process

const REDACTED: &str = "[REDACTED]";
const ACCESS_KEY_LEN: usize = 20;
const ACCESS_KEY_PREFIXES: [&[u8]; 2] = [b"AKIA", b"ASIA"];

// Longest names first so `X-Amz-Credential=` wins over `Credential=`.
const SECRET_PARAMS: [&str; 4] = [
    "X-Amz-Security-Token=",
    "X-Amz-Credential=",
    "Credential=",
    "Signature=",
];

/// Replace access key ids and signed-request parameters with `[REDACTED]`
pub fn sanitize_message(message: &str) -> String {
    message.split_inclusive(char::is_whitespace).map(redact_word).collect()
}

fn redact_word(word: &str) -> String {
    let body = word.trim_end();
    let trailing = &word[body.len()..];
    let mut out = String::with_capacity(word.len());
    let mut rest = body;

    while let Some((idx, name)) = first_secret_param(rest) {
        let value_start = idx + name.len();
        out.push_str(&redact_access_keys(&rest[..value_start]));
        out.push_str(REDACTED);
        let value = &rest[value_start..];
        let value_end = value.find([',', '&', ';', '"', '\'']).unwrap_or(value.len());
        rest = &value[value_end..];
    }

    out.push_str(&redact_access_keys(rest));
    out.push_str(trailing);
    out
}

fn first_secret_param(text: &str) -> Option<(usize, &'static str)> {
    SECRET_PARAMS
        .iter()
        .filter_map(|name| text.find(name).map(|idx| (idx, *name)))
        .min_by_key(|(idx, _)| *idx)
}

fn redact_access_keys(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut i = 0;

    while i + ACCESS_KEY_LEN <= bytes.len() {
        let candidate = &bytes[i..i + ACCESS_KEY_LEN];
        let is_key = ACCESS_KEY_PREFIXES.iter().any(|p| candidate.starts_with(p))
            && candidate[4..]
                .iter()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        if is_key {
            out.push_str(&text[last..i]);
            out.push_str(REDACTED);
            i += ACCESS_KEY_LEN;
            last = i;
        } else {
            i += 1;
        }
    }

    out.push_str(&text[last..]);
    out
}
