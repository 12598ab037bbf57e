use std::{borrow::Borrow, collections::BTreeMap};

use regex::{Captures, Regex};

use crate::Result;

/// Token replaced by the configured base URL of each side.
pub const BASE_URL_TOKEN: &str = "baseUrl";

/// Replace every `{{name}}` whose name is in `values`, wherever it occurs.
/// Unknown tokens are copied verbatim and replacement values are not
/// scanned again.
pub fn substitute<K, V>(template: &str, values: &BTreeMap<K, V>) -> Result<String>
where
    K: Borrow<str> + Ord,
    V: AsRef<str>,
{
    if values.is_empty() {
        return Ok(template.to_string());
    }

    let names: Vec<String> = values.keys().map(|k| regex::escape(k.borrow())).collect();
    let re = Regex::new(&format!(r"\{{\{{({})\}}\}}", names.join("|")))?;

    let out = re.replace_all(template, |caps: &Captures| {
        values
            .get(&caps[1])
            .map(|v| v.as_ref().to_string())
            .unwrap_or_else(|| caps[0].to_string())
    });
    Ok(out.into_owned())
}

pub fn replace_base_url(url: &str, base_url: &str) -> Result<String> {
    let mut values = BTreeMap::new();
    values.insert(BASE_URL_TOKEN, base_url);
    substitute(url, &values)
}

/// Substitute placeholders in every header value; header names are kept as-is.
pub fn replace_header_placeholders(
    headers: &BTreeMap<String, String>,
    replacements: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>> {
    headers
        .iter()
        .map(|(k, v)| Ok((k.clone(), substitute(v, replacements)?)))
        .collect()
}
