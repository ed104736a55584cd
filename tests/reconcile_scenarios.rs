//! End-to-end reconcile/correct scenarios on manifest text.

use apisurface::{
    CorrectionError, Declaration, Divergence, DivergenceKind, ManifestFile, NullabilityState,
    Partition, SurfaceSnapshot, apply, reconcile,
};
use apisurface::NullabilityState::{NonNull, Nullable, Oblivious, Unannotated};

/// `C`, its constructor, and the given fields.
fn class_c(fields: &[(&str, Option<NullabilityState>)]) -> SurfaceSnapshot {
    let mut decls = vec![Declaration::value("C"), Declaration::value("C.C() -> void")];
    decls.extend(
        fields
            .iter()
            .map(|(name, fact)| Declaration::reference(format!("C.{} -> string", name), *fact)),
    );
    SurfaceSnapshot::new(decls).unwrap()
}

fn load(text: &str) -> ManifestFile {
    ManifestFile::load(text).unwrap()
}

/// Reconcile, correct, and check the corrected pair is a fixed point.
fn fix(snapshot: &SurfaceSnapshot, shipped: &str, unshipped: &str) -> (String, String) {
    let (shipped, unshipped) = (load(shipped), load(unshipped));
    let report = reconcile(snapshot, &shipped, &unshipped);
    let (s, u) = apply(&report.divergences, &shipped, &unshipped).unwrap();
    let again = reconcile(snapshot, &s, &u);
    assert!(again.is_clean(), "not a fixed point: {:?}", again.divergences);
    (s.save(), u.save())
}

#[test]
fn test_unannotated_unshipped_nullable_member_is_clean() {
    let snapshot = class_c(&[("Field", Some(Nullable))]);
    let report = reconcile(
        &snapshot,
        &load(""),
        &load("C\nC.C() -> void\nC.Field -> string"),
    );
    assert!(report.is_clean());
    assert!(!report.annotation_mode);
}

#[test]
fn test_unannotated_shipped_is_clean() {
    let snapshot = class_c(&[("Field", Some(Nullable)), ("Field2", Some(NonNull))]);
    let report = reconcile(
        &snapshot,
        &load("C\nC.C() -> void\nC.Field -> string\nC.Field2 -> string"),
        &load(""),
    );
    assert!(report.is_clean());
}

#[test]
fn test_annotated_shipped_members_are_annotated() {
    let snapshot = class_c(&[
        ("OldField", Some(Nullable)),
        ("Field", Some(Nullable)),
        ("Field2", Some(NonNull)),
    ]);
    let shipped = "#nullable enable\nC\nC.C() -> void\nC.OldField -> string?\nC.Field -> string\nC.Field2 -> string";

    let report = reconcile(&snapshot, &load(shipped), &load(""));
    assert_eq!(
        report.divergences,
        vec![
            Divergence::AnnotationMismatch {
                id: "C.Field -> string".into(),
                partition: Partition::Shipped,
                expected: Nullable,
                actual: Unannotated,
            },
            Divergence::AnnotationMismatch {
                id: "C.Field2 -> string".into(),
                partition: Partition::Shipped,
                expected: NonNull,
                actual: Unannotated,
            },
        ]
    );

    let (s, u) = fix(&snapshot, shipped, "");
    assert_eq!(
        s,
        "#nullable enable\nC\nC.C() -> void\nC.OldField -> string?\nC.Field -> string?\nC.Field2 -> string!"
    );
    assert_eq!(u, "");
}

#[test]
fn test_annotation_enabled_via_either_file() {
    let snapshot = class_c(&[
        ("OldField", Some(Nullable)),
        ("Field", Some(Nullable)),
        ("Field2", Some(NonNull)),
    ]);
    let body = "C\nC.C() -> void\nC.OldField -> string?\nC.Field -> string\nC.Field2 -> string";
    let fixed = "C\nC.C() -> void\nC.OldField -> string?\nC.Field -> string?\nC.Field2 -> string!";

    // Header in unshipped only.
    let (s, u) = fix(&snapshot, "", &format!("#nullable enable\n{}", body));
    assert_eq!(s, "");
    assert_eq!(u, format!("#nullable enable\n{}", fixed));

    // Header in shipped only.
    let (s, u) = fix(&snapshot, "#nullable enable", body);
    assert_eq!(s, "#nullable enable");
    assert_eq!(u, fixed);

    // Header in both.
    let (s, u) = fix(
        &snapshot,
        "#nullable enable",
        &format!("#nullable enable\n{}", body),
    );
    assert_eq!(s, "#nullable enable");
    assert_eq!(u, format!("#nullable enable\n{}", fixed));
}

#[test]
fn test_legacy_member_gets_oblivious_marker() {
    let snapshot = class_c(&[("Field", Some(Oblivious))]);

    let (s, u) = fix(
        &snapshot,
        "#nullable enable",
        "C\nC.C() -> void\nC.Field -> string",
    );
    assert_eq!(s, "#nullable enable");
    assert_eq!(u, "C\nC.C() -> void\n~C.Field -> string");

    let (s, u) = fix(
        &snapshot,
        "#nullable enable\nC\nC.C() -> void\nC.Field -> string",
        "",
    );
    assert_eq!(s, "#nullable enable\nC\nC.C() -> void\n~C.Field -> string");
    assert_eq!(u, "");
}

#[test]
fn test_oblivious_member_gets_resolved() {
    let shipped = "#nullable enable\nC\nC.C() -> void\n~C.Field -> string";
    for (fact, line) in [
        (Nullable, "C.Field -> string?"),
        (NonNull, "C.Field -> string!"),
    ] {
        let snapshot = class_c(&[("Field", Some(fact))]);
        let report = reconcile(&snapshot, &load(shipped), &load(""));
        assert_eq!(
            report.divergences,
            vec![Divergence::ObliviousResolvable {
                id: "C.Field -> string".into(),
                partition: Partition::Shipped,
                resolved: fact,
            }]
        );

        let (s, _) = fix(&snapshot, shipped, "");
        assert_eq!(s, format!("#nullable enable\nC\nC.C() -> void\n{}", line));
    }
}

#[test]
fn test_scenario_a_unannotated_reference_needs_decision() {
    let snapshot = class_c(&[("Field", Some(Unannotated))]);
    let unshipped = "#nullable enable\nC\nC.C() -> void\nC.Field -> string";

    let report = reconcile(&snapshot, &load(""), &load(unshipped));
    assert_eq!(
        report.divergences,
        vec![Divergence::RequiresAnnotationDecision {
            id: "C.Field -> string".into(),
            partition: Partition::Unshipped,
        }]
    );

    let (s, u) = fix(&snapshot, "", unshipped);
    assert_eq!(s, "");
    assert_eq!(u, "#nullable enable\nC\nC.C() -> void\n~C.Field -> string");
}

#[test]
fn test_scenario_a_new_type_lands_in_unshipped() {
    let snapshot = class_c(&[("Field", None)]);
    let (s, u) = fix(&snapshot, "", "#nullable enable");
    assert_eq!(s, "");
    assert_eq!(u, "#nullable enable\nC\nC.C() -> void\n~C.Field -> string");
}

#[test]
fn test_scenario_b_mismatch_rewritten_in_place() {
    let snapshot = class_c(&[("Field", Some(Nullable)), ("Other", Some(NonNull))]);
    let shipped = "#nullable enable\nC\nC.Field -> string\nC.C() -> void\nC.Other -> string!";
    let (s, _) = fix(&snapshot, shipped, "");
    assert_eq!(
        s,
        "#nullable enable\nC\nC.Field -> string?\nC.C() -> void\nC.Other -> string!"
    );
}

#[test]
fn test_scenario_c_stale_removed_from_shipped_only() {
    let snapshot = class_c(&[]);
    let shipped = "C\nC.Old -> void";
    let unshipped = "C.C() -> void";

    let report = reconcile(&snapshot, &load(shipped), &load(unshipped));
    assert_eq!(
        report.divergences,
        vec![Divergence::Stale {
            id: "C.Old -> void".into(),
            partition: Partition::Shipped,
        }]
    );

    let (s, u) = fix(&snapshot, shipped, unshipped);
    assert_eq!(s, "C");
    assert_eq!(u, unshipped);
}

#[test]
fn test_scenario_d_legacy_never_mismatches() {
    let snapshot = class_c(&[("Field", None)]);
    let report = reconcile(
        &snapshot,
        &load("C\nC.C() -> void\nC.Field -> string"),
        &load(""),
    );
    assert!(report.is_clean());
}

#[test]
fn test_scenario_e_duplicate_across_partitions_is_fatal() {
    let snapshot = class_c(&[]);
    let shipped = load("C\nC.C() -> void");
    let unshipped = load("C.C() -> void");

    let report = reconcile(&snapshot, &shipped, &unshipped);
    assert_eq!(
        report.divergences,
        vec![Divergence::DuplicateAcrossPartitions {
            id: "C.C() -> void".into()
        }]
    );
    assert_eq!(report.fatal().len(), 1);

    let err = apply(&report.divergences, &shipped, &unshipped).unwrap_err();
    assert!(matches!(err, CorrectionError::DuplicateAcrossPartitions(ids) if ids.len() == 1));
}

#[test]
fn test_divergence_groups_are_ordered() {
    let snapshot = SurfaceSnapshot::new([
        Declaration::reference("C.Z -> string", Some(NonNull)),
        Declaration::reference("C.Resolve -> string", Some(Nullable)),
        Declaration::reference("C.Decide -> string", None),
        Declaration::reference("C.Mismatch -> string", Some(Nullable)),
        Declaration::reference("C.A -> string", Some(Nullable)),
    ])
    .unwrap();
    let shipped = load(
        "#nullable enable\n~C.Resolve -> string\nC.Decide -> string\nC.Mismatch -> string!\nC.Gone -> void",
    );

    let report = reconcile(&snapshot, &shipped, &load(""));
    let kinds: Vec<_> = report.divergences.iter().map(|d| d.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            DivergenceKind::Undeclared,
            DivergenceKind::Undeclared,
            DivergenceKind::Stale,
            DivergenceKind::AnnotationMismatch,
            DivergenceKind::RequiresAnnotationDecision,
            DivergenceKind::ObliviousResolvable,
        ]
    );
    let undeclared: Vec<_> = report
        .of_kind(DivergenceKind::Undeclared)
        .iter()
        .map(|d| d.id().to_string())
        .collect();
    assert_eq!(undeclared, vec!["C.Z -> string", "C.A -> string"]);

    let (s, u) = apply(&report.divergences, &shipped, &load("")).unwrap();
    assert_eq!(
        s.save(),
        "#nullable enable\nC.Resolve -> string?\n~C.Decide -> string\nC.Mismatch -> string?"
    );
    assert_eq!(u.save(), "C.Z -> string!\nC.A -> string?");
}
