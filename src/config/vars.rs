//! Environment variable interpolation for config files.
//!
//! Supported syntax:
//! - `$VAR` or `${VAR}` - substitute with the variable's value
//! - `${VAR:-default}` - use the default if VAR is unset or empty
//! - `$$` - escape sequence for a literal `$`
//!
//! Every missing variable is collected so the user sees all of them at
//! once instead of fixing the config one variable at a time.

use regex::Regex;
use std::env;
use std::sync::LazyLock;

static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}|\$([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("var pattern")
});

/// Interpolate environment variables in `input`.
///
/// Returns the expanded text, or the sorted list of variables that were
/// referenced without a default and are not set.
pub fn expand(input: &str) -> Result<String, Vec<String>> {
    let mut out = String::with_capacity(input.len());
    let mut tail = 0;
    let mut missing = Vec::new();

    for caps in VAR_PATTERN.captures_iter(input) {
        let matched = caps.get(0).expect("whole match");
        out.push_str(&input[tail..matched.start()]);
        tail = matched.end();

        if matched.as_str() == "$$" {
            out.push('$');
            continue;
        }

        let name = caps
            .get(1)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let fallback = caps.get(2).map(|m| m.as_str());

        match env::var(name) {
            Ok(value) if value.is_empty() && fallback.is_some() => {
                out.push_str(fallback.unwrap_or_default());
            }
            Ok(value) => out.push_str(&value),
            Err(_) => match fallback {
                Some(default) => out.push_str(default),
                None => missing.push(name.to_string()),
            },
        }
    }
    out.push_str(&input[tail..]);

    if missing.is_empty() {
        Ok(out)
    } else {
        missing.sort();
        missing.dedup();
        Err(missing)
    }
}
