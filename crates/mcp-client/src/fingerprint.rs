//! Configuration fingerprinting for session drift detection.

use sha2::{Digest, Sha256};

use td_domain::config::ServerSpec;

/// Content hash of the server list.
///
/// Used purely for equality comparison between the configuration a
/// session was built from and the configuration now in effect; never
/// persisted or shown to users. Stable across process restarts given
/// identical configuration, and different whenever any field of any
/// entry changes.
///
/// The list is hashed in its given order, so reordering servers also
/// changes the fingerprint. That is deliberate: catalog ownership on
/// name collisions is order-sensitive too, so a reorder genuinely
/// produces a different session.
pub fn fingerprint(specs: &[ServerSpec]) -> String {
    // Canonical form: struct fields serialize in declaration order
    // and `env` is a BTreeMap, so the JSON bytes are deterministic.
    let canonical = serde_json::to_vec(specs).expect("server specs always serialize to JSON");
    hex::encode(Sha256::digest(&canonical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn spec(name: &str, command: &str, args: &[&str]) -> ServerSpec {
        ServerSpec {
            name: name.into(),
            command: command.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: BTreeMap::new(),
        }
    }

    #[test]
    fn identical_lists_hash_identically() {
        let a = vec![spec("fs", "npx", &["-y", "server-filesystem"])];
        let b = vec![spec("fs", "npx", &["-y", "server-filesystem"])];
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn every_field_participates() {
        let base = vec![spec("fs", "npx", &["-y"])];
        let renamed = vec![spec("files", "npx", &["-y"])];
        let recommand = vec![spec("fs", "uvx", &["-y"])];
        let reargs = vec![spec("fs", "npx", &["-q"])];

        let mut reenv = base.clone();
        reenv[0].env.insert("TOKEN".into(), "abc".into());

        let fp = fingerprint(&base);
        assert_ne!(fp, fingerprint(&renamed));
        assert_ne!(fp, fingerprint(&recommand));
        assert_ne!(fp, fingerprint(&reargs));
        assert_ne!(fp, fingerprint(&reenv));
    }

    #[test]
    fn env_value_and_key_changes_differ() {
        let mut a = spec("s", "cmd", &[]);
        a.env.insert("KEY".into(), "1".into());
        let mut b = spec("s", "cmd", &[]);
        b.env.insert("KEY".into(), "2".into());
        let mut c = spec("s", "cmd", &[]);
        c.env.insert("OTHER".into(), "1".into());

        let (fa, fb, fc) = (
            fingerprint(std::slice::from_ref(&a)),
            fingerprint(std::slice::from_ref(&b)),
            fingerprint(std::slice::from_ref(&c)),
        );
        assert_ne!(fa, fb);
        assert_ne!(fa, fc);
    }

    #[test]
    fn server_count_and_order_matter() {
        let one = vec![spec("a", "cmd", &[])];
        let two = vec![spec("a", "cmd", &[]), spec("b", "cmd", &[])];
        let swapped = vec![spec("b", "cmd", &[]), spec("a", "cmd", &[])];

        assert_ne!(fingerprint(&one), fingerprint(&two));
        assert_ne!(fingerprint(&two), fingerprint(&swapped));
    }

    #[test]
    fn digest_is_hex_sha256() {
        let fp = fingerprint(&[]);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
