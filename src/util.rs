//! Small utility helpers used across modules.

use rand::Rng;

/// Minimal prompt templating: every `{key}` in the template is replaced with
/// its value. No nesting, no conditionals.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = tpl.to_string();
    for (k, v) in pairs {
        let needle = format!("{{{}}}", k);
        out = out.replace(&needle, v);
    }
    out
}

const SHARE_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SHARE_CODE_LEN: usize = 6;

/// Short human-shareable quiz code, e.g. "K7Q2ZD".
pub fn share_code() -> String {
    let mut rng = rand::thread_rng();
    (0..SHARE_CODE_LEN)
        .map(|_| SHARE_CODE_CHARSET[rng.gen_range(0..SHARE_CODE_CHARSET.len())] as char)
        .collect()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}… ({} bytes total)", &s[..end], s.len())
}
