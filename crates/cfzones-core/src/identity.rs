//! Resource identities
//!
//! Every declared resource is tracked across runs by a stable,
//! human-readable key built from the identifiers of its path in the
//! configuration tree, e.g. `main-com-web-v4` for the `v4` address of host
//! `web` under domain `com` of zone `main`.
//!
//! Keys are not escaped or normalized. Keeping sibling identifiers distinct is
//! a configuration authoring concern; [`crate::config::ZonesConfig::validate`]
//! rejects configurations whose identities collide.

/// Separator placed between identity segments
pub const IDENTITY_SEPARATOR: &str = "-";

/// Join non-empty segments with [`IDENTITY_SEPARATOR`]
///
/// ```
/// use cfzones_core::identity::identity;
///
/// assert_eq!(identity(["z1", "d1", "web", "v4"]), "z1-d1-web-v4");
/// assert_eq!(identity(["z1", "", "www"]), "z1-www");
/// ```
pub fn identity<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    join(IDENTITY_SEPARATOR, parts)
}

/// Join non-empty segments with an arbitrary separator
pub fn join<I, S>(sep: &str, parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for part in parts {
        let part = part.as_ref();
        if part.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str(sep);
        }
        out.push_str(part);
    }
    out
}
