//! Property-based tests for checksums, ref resolution and spec rewriting.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use chrono::NaiveDate;
use proptest::prelude::*;

use distmirror::directives::{DirectiveSet, SpecChange, SpecRewriter};
use distmirror::lookaside::checksum::{verify, HashAlgorithm};
use distmirror::resolve::{Resolution, Resolver, ResolverSettings};

fn algorithm() -> impl Strategy<Value = HashAlgorithm> {
    prop_oneof![
        Just(HashAlgorithm::Md5),
        Just(HashAlgorithm::Sha1),
        Just(HashAlgorithm::Sha256),
        Just(HashAlgorithm::Sha512),
    ]
}

/// Strategy for `name-version-release` triples that look like real packages.
fn nvr() -> impl Strategy<Value = (String, String, String)> {
    (
        "[a-z][a-z0-9]{0,8}(-[a-z][a-z0-9]{0,5})?",
        "[0-9]{1,2}(\\.[0-9]{1,2}){0,2}",
        "[0-9]{1,2}(\\.[0-9]{1,2})?",
    )
        .prop_map(|(name, version, release)| (name, version, format!("{release}.el8")))
}

/// A spec field line with a value that may mention `centos`.
fn spec_line() -> impl Strategy<Value = String> {
    let field = prop::sample::select(vec![
        "Name",
        "Version",
        "Release",
        "Summary",
        "URL",
        "BuildRequires",
        "Source0",
        "Source1",
        "Patch0",
    ]);
    let word = prop::sample::select(vec!["centos", "httpd", "2.4", "%{name}", "foo-bar", ""]);
    prop_oneof![
        (field, prop::collection::vec(word, 0..4), 1usize..12)
            .prop_map(|(f, words, pad)| format!("{f}:{}{}", " ".repeat(pad), words.join(" "))),
        "[a-z ]{0,20}".prop_map(|s| s.to_string()),
        Just("%description".to_string()),
        Just("built for centos".to_string()),
        Just(String::new()),
    ]
}

fn rebrand() -> DirectiveSet {
    DirectiveSet::parse(
        r#"
[[spec_change.search_and_replace]]
any = true
find = "centos"
replace = "rocky"
"#,
    )
    .unwrap()
}

proptest! {
    /// A digest computed with any algorithm verifies, in either hex case.
    #[test]
    fn computed_digest_verifies(bytes in prop::collection::vec(any::<u8>(), 0..512), alg in algorithm()) {
        let digest = alg.hex_digest(&bytes);
        prop_assert_eq!(digest.len(), alg.hex_len());
        prop_assert_eq!(HashAlgorithm::from_digest(&digest), Some(alg));
        prop_assert_eq!(verify(&bytes, &digest), Some(alg));
        prop_assert_eq!(verify(&bytes, &digest.to_ascii_uppercase()), Some(alg));
    }

    /// Changing one hex digit makes verification fail.
    #[test]
    fn altered_digest_fails(bytes in prop::collection::vec(any::<u8>(), 0..256), alg in algorithm(), pos in any::<prop::sample::Index>()) {
        let mut digest: Vec<char> = alg.hex_digest(&bytes).chars().collect();
        let i = pos.index(digest.len());
        digest[i] = if digest[i] == '0' { '1' } else { '0' };
        let altered: String = digest.into_iter().collect();
        prop_assert_eq!(verify(&bytes, &altered), None);
    }

    /// Digest lengths other than the four known sizes never verify.
    #[test]
    fn unknown_digest_length_never_verifies(bytes in prop::collection::vec(any::<u8>(), 0..64), digest in "[0-9a-f]{0,140}") {
        prop_assume!(![32, 40, 64, 128].contains(&digest.len()));
        prop_assert_eq!(verify(&bytes, &digest), None);
    }

    /// An upstream import tag maps onto the downstream prefix with the
    /// same NVR.
    #[test]
    fn import_tag_maps_to_push_branch((name, version, release) in nvr(), major in 7u32..11) {
        let resolver = Resolver::new(ResolverSettings {
            version: major,
            ..ResolverSettings::new(name.clone())
        })
        .unwrap();

        let nvr = format!("{name}-{version}-{release}");
        let upstream = format!("refs/tags/imports/c{major}/{nvr}");
        match resolver.resolve(&upstream) {
            Resolution::Import(resolved) => {
                let push_branch = format!("r{major}");
                prop_assert_eq!(resolved.push_branch.as_str(), push_branch.as_str());
                prop_assert_eq!(resolved.new_tag, format!("imports/r{major}/{nvr}"));
                prop_assert_eq!(resolved.nvr, nvr);
                prop_assert_eq!(resolved.upstream_ref, upstream);
            }
            Resolution::Skip(reason) => prop_assert!(false, "skipped {}: {}", upstream, reason),
        }
    }

    /// Tags for another major version never resolve.
    #[test]
    fn other_major_versions_are_skipped((name, version, release) in nvr()) {
        let resolver = Resolver::new(ResolverSettings::new(name.clone())).unwrap();
        let upstream = format!("refs/tags/imports/c7/{name}-{version}-{release}");
        prop_assert!(matches!(resolver.resolve(&upstream), Resolution::Skip(_)));
    }

    /// Rewriting a spec twice with the same rules changes nothing the
    /// second time.
    #[test]
    fn spec_rewrite_is_idempotent(lines in prop::collection::vec(spec_line(), 0..20)) {
        let set = rebrand();
        let change = set.spec_change.as_ref().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let rewriter = SpecRewriter::new(change, None, today);

        let input = format!("{}\n", lines.join("\n"));
        let once = rewriter.rewrite(&input).unwrap();
        let twice = rewriter.rewrite(&once).unwrap();

        prop_assert!(!once.contains("centos"));
        prop_assert_eq!(once.lines().count(), input.lines().count());
        prop_assert_eq!(twice, once);
    }

    /// With no operations a rewrite only aligns field values, so aligned
    /// input comes back unchanged.
    #[test]
    fn empty_change_keeps_aligned_spec(lines in prop::collection::vec(spec_line(), 0..20)) {
        let change = SpecChange::default();
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let rewriter = SpecRewriter::new(&change, None, today);

        let aligned = rewriter.rewrite(&format!("{}\n", lines.join("\n"))).unwrap();
        prop_assert_eq!(rewriter.rewrite(&aligned).unwrap(), aligned);
    }
}
