//! Strip tweet boilerplate before scoring.
//!
//! Transforms run in a fixed order: retweet marker, URLs, reply-style
//! mention prefixes, then any remaining mentions. No whitespace is
//! collapsed, so removals can leave doubled or trailing spaces.

use once_cell::sync::Lazy;
use regex::Regex;

const RETWEET_MARKER: &str = "RT ";

static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:https?|ftp)://[\n\S]+").expect("valid url pattern"));

// Handles are ASCII word characters only, 1-15 long
static REPLY_MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@[A-Za-z0-9_]{1,15}: ").expect("valid reply pattern"));

static MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@[A-Za-z0-9_]{1,15}").expect("valid mention pattern"));

/// Remove retweet markers, URLs and @mentions from raw message text.
pub fn sanitize(text: &str) -> String {
    let text = text.replace(RETWEET_MARKER, "");
    let text = URL.replace_all(&text, "");
    let text = REPLY_MENTION.replace_all(&text, "");
    MENTION.replace_all(&text, "").into_owned()
}
