use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DEX_RE: Regex = Regex::new(r"^(dex/)?classes([0-9]*)\.dex$")
        .expect("failed to compile dex filename regex");
}

pub(crate) fn is_dex(filename: &str) -> bool {
    DEX_RE.is_match(filename)
}

/// Loading order of a bytecode image: `classes.dex`, `classes2.dex`, ...,
/// then the same under `dex/`.
pub(crate) fn dex_rank(filename: &str) -> (bool, u32) {
    match DEX_RE.captures(filename) {
        Some(caps) => {
            let in_dir = caps.get(1).is_some();
            let n = caps
                .get(2)
                .and_then(|n| n.as_str().parse().ok())
                .unwrap_or(1);
            (in_dir, n)
        }
        None => (true, u32::MAX),
    }
}

pub(crate) fn is_manifest(filename: &str) -> bool {
    filename == "AndroidManifest.xml" || filename == "manifest/AndroidManifest.xml"
}

pub(crate) fn is_resources(filename: &str) -> bool {
    filename == "resources.arsc" || filename == "res/resources.arsc"
}
