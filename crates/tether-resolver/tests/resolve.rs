use std::collections::BTreeMap;

use tether_core::attribute::{Attributes, Directives, Value};
use tether_core::namespace::{
    CARDINALITY_MULTIPLE, DIRECTIVE_CARDINALITY, DIRECTIVE_RESOLUTION, DIRECTIVE_USES,
    DIRECTIVE_VISIBILITY, PACKAGE, RESOLUTION_OPTIONAL, VISIBILITY_REEXPORT,
};
use tether_core::{Repository, ResourceBuilder, ResourceId, Version, WireMap};
use tether_resolver::{RepositoryContext, ResolutionError, ResolveContext, Resolver};

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

fn import_filtered(builder: ResourceBuilder, filter: &str) -> ResourceBuilder {
    builder.requirement(PACKAGE, Some(filter), Directives::new())
}

fn service(builder: ResourceBuilder, name: &str, uses: Option<&str>) -> ResourceBuilder {
    let mut attributes = Attributes::new();
    attributes.insert("service".to_string(), Value::from(name));
    let mut directives = Directives::new();
    if let Some(uses) = uses {
        directives.insert(DIRECTIVE_USES.to_string(), uses.to_string());
    }
    builder.capability("service", attributes, directives)
}

fn require_services(builder: ResourceBuilder, name: &str) -> ResourceBuilder {
    let mut directives = Directives::new();
    directives.insert(DIRECTIVE_CARDINALITY.to_string(), CARDINALITY_MULTIPLE.to_string());
    let filter = format!("(service={name})");
    builder.requirement("service", Some(filter.as_str()), directives)
}

/// Provider of the wire through which `requirer` sees `package`.
fn package_provider(
    repo: &Repository,
    wires: &WireMap,
    requirer: ResourceId,
    package: &str,
) -> Option<ResourceId> {
    wires.get(&requirer)?.iter().find_map(|w| {
        let cap = repo.capability(w.capability);
        (cap.namespace == PACKAGE && cap.name() == Some(package)).then_some(w.provider)
    })
}

fn assert_sound(repo: &Repository, wires: &WireMap) {
    for list in wires.values() {
        for wire in list {
            assert!(
                repo.matches(wire.requirement, wire.capability),
                "wire {} -> {} does not match",
                repo.describe_requirement(wire.requirement),
                repo.describe_capability(wire.capability)
            );
        }
    }
}

fn assert_uses_consistent(repo: &Repository, wires: &WireMap) {
    for list in wires.values() {
        let mut seen: BTreeMap<&str, ResourceId> = BTreeMap::new();
        for wire in list {
            let cap = repo.capability(wire.capability);
            if cap.namespace != PACKAGE {
                continue;
            }
            let Some(name) = cap.name() else { continue };
            let provider = *seen.entry(name).or_insert(wire.provider);
            assert_eq!(provider, wire.provider, "two providers of {name}");
        }
    }
}

/// C imports foo and bar. A and B both export foo; only B exports bar, and
/// B's bar uses foo.
fn split_providers() -> (RepositoryContext, ResourceId, ResourceId, ResourceId) {
    let mut repo = Repository::new();
    let a = repo
        .add(ResourceBuilder::new("A", v("1.0")).export("foo", v("1.0"), &[]))
        .unwrap();
    let b = repo
        .add(
            ResourceBuilder::new("B", v("1.0"))
                .export("foo", v("1.0"), &[])
                .export("bar", v("1.0"), &["foo"]),
        )
        .unwrap();
    let c = repo
        .add(ResourceBuilder::new("C", v("1.0")).import("foo").import("bar"))
        .unwrap();
    (RepositoryContext::new(repo).with_mandatory(vec![c]), a, b, c)
}

#[test]
fn test_single_import_wires_to_exporter() {
    let mut repo = Repository::new();
    let a = repo
        .add(ResourceBuilder::new("A", v("1.0")).export("foo", v("1.0"), &[]))
        .unwrap();
    let b = repo.add(ResourceBuilder::new("B", v("1.0")).import("foo")).unwrap();
    let ctx = RepositoryContext::new(repo).with_mandatory(vec![b]);

    let wires = Resolver::default().resolve(&ctx).unwrap();
    let repo = ctx.repository();
    assert_eq!(wires[&b].len(), 1);
    let wire = wires[&b][0];
    assert_eq!(wire.provider, a);
    let cap = repo.capability(wire.capability);
    assert_eq!(cap.namespace, PACKAGE);
    assert_eq!(cap.name(), Some("foo"));
    assert_sound(repo, &wires);
}

#[test]
fn test_uses_constraint_picks_consistent_provider() {
    let (ctx, a, b, c) = split_providers();
    let wires = Resolver::default().resolve(&ctx).unwrap();
    let repo = ctx.repository();

    assert_eq!(package_provider(repo, &wires, c, "foo"), Some(b));
    assert_eq!(package_provider(repo, &wires, c, "bar"), Some(b));
    assert!(!wires.contains_key(&a));
    assert_sound(repo, &wires);
    assert_uses_consistent(repo, &wires);
}

#[test]
fn test_missing_transitive_bundle_is_reported() {
    let mut repo = Repository::new();
    let a = repo
        .add(
            ResourceBuilder::new("A", v("1.0"))
                .require_bundle("B")
                .require_bundle("C"),
        )
        .unwrap();
    repo.add(ResourceBuilder::new("B", v("1.0"))).unwrap();
    let c = repo
        .add(ResourceBuilder::new("C", v("1.0")).require_bundle("D"))
        .unwrap();
    let ctx = RepositoryContext::new(repo).with_mandatory(vec![a]);

    let err = Resolver::default().resolve(&ctx).unwrap_err();
    let repo = ctx.repository();
    let on_d = repo.resource(c).requirements[0];
    assert!(matches!(err, ResolutionError::Unresolved { .. }));
    assert!(err
        .unresolved()
        .iter()
        .any(|u| u.resource == c && u.requirement == on_d));
    assert!(err.unresolved().iter().any(|u| u.resource == a));
    assert!(err.to_string().contains("(bundle=D)"));
}

#[test]
fn test_resolution_is_deterministic() {
    let (ctx, _, _, _) = split_providers();
    let resolver = Resolver::default();
    let first = resolver.resolve(&ctx).unwrap();
    let second = resolver.resolve(&ctx).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_resolving_resolved_resources_adds_nothing() {
    let (mut ctx, _, _, _) = split_providers();
    let resolver = Resolver::default();
    let wires = resolver.resolve(&ctx).unwrap();
    ctx.commit(&wires);

    let again = resolver.resolve(&ctx).unwrap();
    assert!(again.is_empty());
}

#[test]
fn test_uses_conflict_without_alternative_fails() {
    let mut repo = Repository::new();
    repo.add(ResourceBuilder::new("A1", v("1.0")).export("foo", v("1.0"), &[]))
        .unwrap();
    repo.add(ResourceBuilder::new("A2", v("1.0")).export("foo", v("2.0"), &[]))
        .unwrap();
    repo.add(import_filtered(
        ResourceBuilder::new("B", v("1.0")).export("bar", v("1.0"), &["foo"]),
        "(&(package=foo)(version=2.0))",
    ))
    .unwrap();
    let x = repo
        .add(
            import_filtered(
                ResourceBuilder::new("X", v("1.0")),
                "(&(package=foo)(version=1.0))",
            )
            .import("bar"),
        )
        .unwrap();
    let ctx = RepositoryContext::new(repo).with_mandatory(vec![x]);

    let err = Resolver::default().resolve(&ctx).unwrap_err();
    let entry = err
        .unresolved()
        .iter()
        .find(|u| u.conflict.is_some())
        .expect("a uses conflict is reported");
    let conflict = entry.conflict.as_ref().unwrap();
    assert_eq!(conflict.resource, x);
    assert_eq!(conflict.package, "foo");
    assert!(conflict.direct.is_some());
    assert!(entry.reason.contains("Uses constraint violation"));
}

#[test]
fn test_faulty_optional_resource_is_dropped() {
    let mut repo = Repository::new();
    repo.add(ResourceBuilder::new("A1", v("1.0")).export("foo", v("1.0"), &[]))
        .unwrap();
    let a2 = repo
        .add(ResourceBuilder::new("A2", v("1.0")).export("foo", v("2.0"), &[]))
        .unwrap();
    repo.add(import_filtered(
        ResourceBuilder::new("B", v("1.0")).export("bar", v("1.0"), &["foo"]),
        "(&(package=foo)(version=2.0))",
    ))
    .unwrap();
    let x = repo
        .add(
            import_filtered(
                ResourceBuilder::new("X", v("1.0")),
                "(&(package=foo)(version=1.0))",
            )
            .import("bar"),
        )
        .unwrap();
    let m = repo.add(ResourceBuilder::new("M", v("1.0")).import("foo")).unwrap();
    let ctx = RepositoryContext::new(repo)
        .with_mandatory(vec![m])
        .with_optional(vec![x]);

    let wires = Resolver::default().resolve(&ctx).unwrap();
    assert!(!wires.contains_key(&x));
    assert_eq!(package_provider(ctx.repository(), &wires, m, "foo"), Some(a2));
}

#[test]
fn test_optional_resource_without_provider_is_skipped() {
    let mut repo = Repository::new();
    let a = repo.add(ResourceBuilder::new("A", v("1.0"))).unwrap();
    let x = repo.add(ResourceBuilder::new("X", v("1.0")).import("missing")).unwrap();
    let ctx = RepositoryContext::new(repo)
        .with_mandatory(vec![a])
        .with_optional(vec![x]);

    let wires = Resolver::default().resolve(&ctx).unwrap();
    assert!(wires.contains_key(&a));
    assert!(!wires.contains_key(&x));
}

#[test]
fn test_optional_requirement_without_provider_gets_no_wire() {
    let mut repo = Repository::new();
    let mut directives = Directives::new();
    directives.insert(DIRECTIVE_RESOLUTION.to_string(), RESOLUTION_OPTIONAL.to_string());
    let a = repo
        .add(ResourceBuilder::new("A", v("1.0")).requirement(
            PACKAGE,
            Some("(package=missing)"),
            directives,
        ))
        .unwrap();
    let ctx = RepositoryContext::new(repo).with_mandatory(vec![a]);

    let wires = Resolver::default().resolve(&ctx).unwrap();
    assert!(wires[&a].is_empty());
}

#[test]
fn test_multiple_cardinality_wires_every_provider() {
    let mut repo = Repository::new();
    let p1 = repo
        .add(service(ResourceBuilder::new("P1", v("1.0")), "log", None))
        .unwrap();
    let p2 = repo
        .add(service(ResourceBuilder::new("P2", v("1.0")), "log", None))
        .unwrap();
    repo.add(service(ResourceBuilder::new("Q", v("1.0")), "metrics", None))
        .unwrap();
    let r = repo
        .add(require_services(ResourceBuilder::new("R", v("1.0")), "log"))
        .unwrap();
    let ctx = RepositoryContext::new(repo).with_mandatory(vec![r]);

    let wires = Resolver::default().resolve(&ctx).unwrap();
    let providers: Vec<ResourceId> = wires[&r].iter().map(|w| w.provider).collect();
    assert_eq!(providers, vec![p1, p2]);
    assert_sound(ctx.repository(), &wires);
}

#[test]
fn test_multiple_cardinality_drops_conflicting_provider() {
    let mut repo = Repository::new();
    repo.add(ResourceBuilder::new("B", v("1.0")).export("foo", v("2.0"), &[]))
        .unwrap();
    let p1 = repo
        .add(service(ResourceBuilder::new("P1", v("1.0")), "log", Some("foo")).import("foo"))
        .unwrap();
    let p2 = repo
        .add(service(ResourceBuilder::new("P2", v("1.0")), "log", None))
        .unwrap();
    let r = repo
        .add(require_services(
            ResourceBuilder::new("R", v("1.0")).export("foo", v("1.0"), &[]),
            "log",
        ))
        .unwrap();
    let ctx = RepositoryContext::new(repo).with_mandatory(vec![r]);

    let wires = Resolver::default().resolve(&ctx).unwrap();
    let providers: Vec<ResourceId> = wires[&r].iter().map(|w| w.provider).collect();
    assert_eq!(providers, vec![p2]);
    assert!(!wires.contains_key(&p1));
}

#[test]
fn test_reexported_bundle_is_wired_through() {
    let mut repo = Repository::new();
    let b = repo
        .add(ResourceBuilder::new("B", v("1.0")).export("foo", v("1.0"), &[]))
        .unwrap();
    let mut reexport = Directives::new();
    reexport.insert(DIRECTIVE_VISIBILITY.to_string(), VISIBILITY_REEXPORT.to_string());
    let a = repo
        .add(ResourceBuilder::new("A", v("1.0")).requirement(
            "bundle",
            Some("(bundle=B)"),
            reexport,
        ))
        .unwrap();
    let c = repo
        .add(ResourceBuilder::new("C", v("1.0")).require_bundle("A"))
        .unwrap();
    let ctx = RepositoryContext::new(repo).with_mandatory(vec![c]);

    let wires = Resolver::default().resolve(&ctx).unwrap();
    assert_eq!(wires[&c][0].provider, a);
    assert_eq!(wires[&a][0].provider, b);
    assert!(wires[&b].is_empty());
}

#[test]
fn test_import_substitutes_own_export() {
    let mut repo = Repository::new();
    let a = repo
        .add(
            ResourceBuilder::new("A", v("1.0"))
                .export("foo", v("1.0"), &[])
                .import("foo"),
        )
        .unwrap();
    let b = repo
        .add(ResourceBuilder::new("B", v("1.0")).export("foo", v("2.0"), &[]))
        .unwrap();
    let c = repo.add(ResourceBuilder::new("C", v("1.0")).import("foo")).unwrap();
    let mut ctx = RepositoryContext::new(repo).with_mandatory(vec![a, c]);

    let wires = Resolver::default().resolve(&ctx).unwrap();
    let repo = ctx.repository();
    assert_eq!(package_provider(repo, &wires, a, "foo"), Some(b));
    assert_eq!(package_provider(repo, &wires, c, "foo"), Some(b));
    assert_uses_consistent(repo, &wires);

    ctx.commit(&wires);
    let exports_foo = ctx.wirings()[&a].capabilities.iter().any(|h| {
        ctx.repository().capability(h.capability).name() == Some("foo")
    });
    assert!(!exports_foo);
}

#[test]
fn test_own_export_preferred_is_not_wired_to_self() {
    let mut repo = Repository::new();
    let a = repo
        .add(
            ResourceBuilder::new("A", v("1.0"))
                .export("foo", v("2.0"), &[])
                .import("foo"),
        )
        .unwrap();
    repo.add(ResourceBuilder::new("B", v("1.0")).export("foo", v("1.0"), &[]))
        .unwrap();
    let c = repo.add(ResourceBuilder::new("C", v("1.0")).import("foo")).unwrap();
    let ctx = RepositoryContext::new(repo).with_mandatory(vec![a, c]);

    let wires = Resolver::default().resolve(&ctx).unwrap();
    assert!(wires[&a].is_empty());
    assert_eq!(package_provider(ctx.repository(), &wires, c, "foo"), Some(a));
}

#[test]
fn test_conflicting_optional_resource_does_not_fail_mandatory() {
    let mut repo = Repository::new();
    let a1 = repo
        .add(ResourceBuilder::new("A1", v("1.0")).export("foo", v("2.0"), &[]))
        .unwrap();
    let a2 = repo
        .add(ResourceBuilder::new("A2", v("1.0")).export("foo", v("1.0"), &[]))
        .unwrap();
    let s = repo
        .add(
            ResourceBuilder::new("S", v("1.0"))
                .export("s", v("1.0"), &["foo"])
                .import("foo"),
        )
        .unwrap();
    let m = repo
        .add(
            import_filtered(
                ResourceBuilder::new("M", v("1.0")),
                "(&(package=foo)(version=1.0))",
            )
            .import("s"),
        )
        .unwrap();
    let o = repo
        .add(
            import_filtered(
                ResourceBuilder::new("O", v("1.0")),
                "(&(package=foo)(version=2.0))",
            )
            .import("s"),
        )
        .unwrap();
    let ctx = RepositoryContext::new(repo)
        .with_mandatory(vec![m])
        .with_optional(vec![o]);

    let wires = Resolver::default().resolve(&ctx).unwrap();
    let repo = ctx.repository();
    assert!(!wires.contains_key(&o));
    assert_eq!(package_provider(repo, &wires, m, "foo"), Some(a2));
    assert_eq!(package_provider(repo, &wires, m, "s"), Some(s));
    assert_eq!(package_provider(repo, &wires, s, "foo"), Some(a2));
    assert!(wires.values().flatten().all(|w| w.provider != a1));
    assert_sound(repo, &wires);
    assert_uses_consistent(repo, &wires);
}

#[test]
fn test_cyclic_uses_terminates() {
    let mut repo = Repository::new();
    let a = repo
        .add(
            ResourceBuilder::new("A", v("1.0"))
                .export("x", v("1.0"), &["y"])
                .import("y"),
        )
        .unwrap();
    let b = repo
        .add(
            ResourceBuilder::new("B", v("1.0"))
                .export("y", v("1.0"), &["x"])
                .import("x"),
        )
        .unwrap();
    let c = repo
        .add(ResourceBuilder::new("C", v("1.0")).import("x").import("y"))
        .unwrap();
    let ctx = RepositoryContext::new(repo).with_mandatory(vec![c]);

    let wires = Resolver::default().resolve(&ctx).unwrap();
    let repo = ctx.repository();
    assert_eq!(package_provider(repo, &wires, c, "x"), Some(a));
    assert_eq!(package_provider(repo, &wires, c, "y"), Some(b));
    assert_eq!(package_provider(repo, &wires, a, "y"), Some(b));
    assert_eq!(package_provider(repo, &wires, b, "x"), Some(a));
    assert_sound(repo, &wires);
    assert_uses_consistent(repo, &wires);
}

#[test]
fn test_every_failing_mandatory_resource_is_reported() {
    let mut repo = Repository::new();
    let x = repo
        .add(ResourceBuilder::new("X", v("1.0")).import("nope1"))
        .unwrap();
    let y = repo
        .add(ResourceBuilder::new("Y", v("1.0")).import("nope2"))
        .unwrap();
    let ctx = RepositoryContext::new(repo).with_mandatory(vec![x, y]);

    let err = Resolver::default().resolve(&ctx).unwrap_err();
    let repo = ctx.repository();
    let mut reported: Vec<_> = err
        .unresolved()
        .iter()
        .map(|u| (u.resource, u.requirement))
        .collect();
    reported.sort();
    assert_eq!(
        reported,
        vec![
            (x, repo.resource(x).requirements[0]),
            (y, repo.resource(y).requirements[0]),
        ]
    );
    let text = err.to_string();
    assert!(text.contains("(package=nope1)"), "got: {text}");
    assert!(text.contains("(package=nope2)"), "got: {text}");
}
