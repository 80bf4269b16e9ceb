//! Effective update URL construction.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::context::RuntimeContext;
use crate::error::{Error, Result};

/// Characters left alone by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const LOCALE_TOKEN: &str = "%LOCALE%";

/// Substitutes every placeholder in `template`, encodes `+` and appends
/// the cache-busting `force=1` parameter.
pub fn build(template: &str, ctx: &RuntimeContext) -> Result<String> {
    let os_version = utf8_percent_encode(&ctx.os_version, URI_COMPONENT).to_string();

    let mut url = template
        .replace("%PRODUCT%", &ctx.product)
        .replace("%VERSION%", &ctx.version)
        .replace("%BUILD_ID%", &ctx.build_id)
        .replace("%BUILD_TARGET%", &ctx.build_target())
        .replace("%OS_VERSION%", &os_version);

    if url.contains(LOCALE_TOKEN) {
        let locale = ctx
            .locale
            .as_deref()
            .ok_or_else(|| Error::Config("update URL needs %LOCALE% but no locale is known".into()))?;
        url = url.replace(LOCALE_TOKEN, locale);
    }

    url = url
        .replace("%CHANNEL%", &ctx.channel)
        .replace("%PLATFORM_VERSION%", &ctx.platform_version)
        .replace("%DISTRIBUTION_VERSION%", &ctx.distribution_version)
        .replace("%DISTRIBUTION%", &ctx.distribution_id)
        .replace('+', "%2B");

    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str("force=1");
    Ok(url)
}
