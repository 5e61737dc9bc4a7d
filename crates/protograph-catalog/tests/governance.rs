//! Compound governance queries against a naive full scan.

use proptest::prelude::*;
use protograph::{ArtifactKind, Urn};
use protograph_catalog::{Artifact, CatalogIndex, Classification, GovernanceQuery};
use rstest::rstest;

const NAMESPACES: [&str; 3] = ["billing", "identity", "search"];
const TAGS: [&str; 5] = ["billing", "gdpr", "pci", "public", "sox"];
const OWNERS: [&str; 3] = ["payments-team", "platform", "data-eng"];

fn urn(s: &str) -> Urn {
    Urn::parse(s).unwrap_or_else(|e| panic!("bad test URN {s}: {e}"))
}

fn artifact(name: &str, tags: &[&str], pii: bool) -> Artifact {
    let mut artifact = Artifact::new(urn(&format!("urn:proto:api:acme.com/{name}")), "billing");
    artifact.tags = tags.iter().map(ToString::to_string).collect();
    artifact.pii = pii;
    artifact
}

fn urns(artifacts: &[&Artifact]) -> Vec<String> {
    artifacts.iter().map(|a| a.urn.to_string()).collect()
}

fn naive<'a>(index: &'a CatalogIndex, query: &GovernanceQuery) -> Vec<&'a Artifact> {
    index.artifacts().filter(|a| query.matches(a)).collect()
}

#[test]
fn pii_and_billing_query_matches_exactly_the_intersection() {
    let index = CatalogIndex::build([
        artifact("invoices", &["billing", "sox"], true),
        artifact("refunds", &["billing"], false),
        artifact("profiles", &["gdpr"], true),
        artifact("cards", &["billing", "pci"], true),
        artifact("status", &[], false),
    ]);
    let query = GovernanceQuery::new().pii(true).tag("billing");

    let hits = index.query(&query);

    assert_eq!(
        urns(&hits),
        vec!["urn:proto:api:acme.com/cards", "urn:proto:api:acme.com/invoices"]
    );
    assert_eq!(urns(&hits), urns(&naive(&index, &query)));
}

#[rstest]
#[case::no_criteria(GovernanceQuery::new(), 4)]
#[case::pii_false(GovernanceQuery::new().pii(false), 1)]
#[case::every_tag_required(GovernanceQuery::new().tag("billing").tag("sox"), 1)]
#[case::compliance_subset(GovernanceQuery::new().pii(true).compliance_tag("pci"), 1)]
#[case::unknown_tag(GovernanceQuery::new().tag("hipaa"), 0)]
#[case::unknown_namespace(GovernanceQuery::new().namespace("nowhere"), 0)]
#[case::unowned(GovernanceQuery::new().owner("nobody"), 0)]
fn query_edge_cases(#[case] query: GovernanceQuery, #[case] expected: usize) {
    let index = CatalogIndex::build([
        artifact("invoices", &["billing", "sox"], true),
        artifact("refunds", &["billing"], false),
        artifact("profiles", &["gdpr"], true),
        artifact("cards", &["billing", "pci"], true),
    ]);

    let hits = index.query(&query);

    assert_eq!(hits.len(), expected);
    assert_eq!(urns(&hits), urns(&naive(&index, &query)));
}

#[test]
fn any_tag_query_is_a_union() {
    let index = CatalogIndex::build([
        artifact("invoices", &["billing", "sox"], true),
        artifact("profiles", &["gdpr"], true),
        artifact("status", &["public"], false),
    ]);

    let hits = index.find_by_any_tag(&["sox", "gdpr"]);

    assert_eq!(
        urns(&hits),
        vec!["urn:proto:api:acme.com/invoices", "urn:proto:api:acme.com/profiles"]
    );
}

fn arb_artifact(id: usize) -> impl Strategy<Value = Artifact> {
    (
        prop::sample::select(ArtifactKind::ALL.to_vec()),
        prop::sample::select(NAMESPACES.to_vec()),
        prop::option::of(prop::sample::select(OWNERS.to_vec())),
        prop::sample::subsequence(TAGS.to_vec(), 0..=TAGS.len()),
        any::<bool>(),
        prop::sample::select(Classification::ALL.to_vec()),
    )
        .prop_map(move |(kind, namespace, owner, tags, pii, classification)| {
            let mut artifact =
                Artifact::new(urn(&format!("urn:proto:{kind}:acme.com/a{id:03}")), namespace);
            artifact.owner = owner.map(ToString::to_string);
            artifact.tags = tags.into_iter().map(ToString::to_string).collect();
            artifact.pii = pii;
            artifact.classification = classification;
            artifact
        })
}

fn arb_catalog() -> impl Strategy<Value = Vec<Artifact>> {
    (0usize..40).prop_flat_map(|count| (0..count).map(arb_artifact).collect::<Vec<_>>())
}

fn arb_query() -> impl Strategy<Value = GovernanceQuery> {
    (
        prop::option::of(prop::sample::select(NAMESPACES.to_vec())),
        prop::option::of(prop::sample::select(OWNERS.to_vec())),
        prop::option::of(any::<bool>()),
        prop::option::of(prop::sample::select(Classification::ALL.to_vec())),
        prop::option::of(prop::sample::select(ArtifactKind::ALL.to_vec())),
        prop::sample::subsequence(TAGS.to_vec(), 0..=2),
        prop::sample::subsequence(TAGS.to_vec(), 0..=1),
    )
        .prop_map(
            |(namespace, owner, pii, classification, kind, tags, compliance)| GovernanceQuery {
                namespace: namespace.map(ToString::to_string),
                owner: owner.map(ToString::to_string),
                pii,
                classification,
                kind,
                tags: tags.into_iter().map(ToString::to_string).collect(),
                compliance_tags: compliance.into_iter().map(ToString::to_string).collect(),
            },
        )
}

proptest! {
    #[test]
    fn indexed_query_agrees_with_full_scan(catalog in arb_catalog(), query in arb_query()) {
        let index = CatalogIndex::build(catalog);

        prop_assert_eq!(urns(&index.query(&query)), urns(&naive(&index, &query)));
    }

    #[test]
    fn stats_agree_with_point_queries(catalog in arb_catalog()) {
        let index = CatalogIndex::build(catalog);
        let stats = index.stats();

        prop_assert_eq!(stats.total, index.len());
        prop_assert_eq!(stats.pii, index.find_pii().len());
        for namespace in NAMESPACES {
            let expected = index.find_by_namespace(namespace).len();
            prop_assert_eq!(stats.by_namespace.get(namespace).copied().unwrap_or(0), expected);
        }
    }
}
