use once_cell::sync::Lazy;
use regex::Regex;

static CRISIS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(suicid\w*|kill(ing)? myself|end(ing)? my life|want(ed)? to die|self[- ]?harm\w*|hurt(ing)? myself|cut(ting)? myself|no reason to live|better off dead|being (abused|bullied|hurt)|(someone|somebody) (is )?(hurting|touching) me|abuse[ds]?)\b",
    )
    .expect("valid regex")
});

/// True when a message mentions self-harm, abuse or a similar crisis.
pub fn requires_serious_mode(message: &str) -> bool {
    CRISIS_RE.is_match(message)
}
