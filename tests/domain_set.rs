//! End-to-end scenarios for the static domain set, mirroring the seeded
//! test suite in this repository's design documents.

use hipermap_domainset::{deserialize, CalibrationLimits, Database, Lookup};

fn compile(patterns: &[&str]) -> Database<Vec<u8>> {
    Database::compile(patterns.iter().copied(), &CalibrationLimits::default()).unwrap()
}

#[test]
fn scenario_basic_mixed_set() {
    let db = compile(&["example.com", "site.com.", "images.google.com", "GO.com"]);

    assert_eq!(db.find(b"example.com"), Lookup::Found);
    assert_eq!(db.find(b"api.example.com"), Lookup::Found);
    assert_eq!(db.find(b"a.b.images.google.com."), Lookup::Found);
    assert_eq!(db.find(b"go.com"), Lookup::Found);
    assert_eq!(db.find(b"com"), Lookup::NotFound);
    assert_eq!(db.find(b"google.com"), Lookup::NotFound);
    assert_eq!(db.find(b"not-listed.org"), Lookup::NotFound);
    assert_eq!(db.find(b"white space.com"), Lookup::InvalidInput);
}

#[test]
fn scenario_single_long_pattern() {
    let db = compile(&["a.b.c.d.e"]);

    assert_eq!(db.find(b"a.b.c.d.e"), Lookup::Found);
    assert_eq!(db.find(b"b.c.d.e"), Lookup::NotFound);
    assert_eq!(db.find(b"x.a.b.c.d.e"), Lookup::Found);
}

#[test]
fn scenario_popular_suffix_discovery() {
    let mut patterns: Vec<String> = Vec::new();
    for i in 0..20 {
        patterns.push(format!("x{i}.a.b.c"));
        patterns.push(format!("y{i}.a.b.c"));
    }
    let db = Database::compile(patterns.iter().map(String::as_str), &CalibrationLimits::default())
        .unwrap();

    for i in 0..20 {
        assert_eq!(db.find(format!("x{i}.a.b.c").as_bytes()), Lookup::Found);
        assert_eq!(db.find(format!("y{i}.a.b.c").as_bytes()), Lookup::Found);
        assert_eq!(db.find(format!("z.x{i}.a.b.c").as_bytes()), Lookup::Found);
    }
    assert_eq!(db.find(b"a.b.c"), Lookup::NotFound);
    assert!(db.popular_count() > 0);
}

#[test]
fn scenario_too_many_popular_suffixes_fails_compile() {
    let mut patterns = Vec::new();
    for g in 0..300 {
        for m in 0..17 {
            patterns.push(format!("leaf{m}.group{g}.example{g}.net"));
        }
    }
    let err = Database::compile(patterns.iter().map(String::as_str), &CalibrationLimits::default())
        .unwrap_err();
    assert!(matches!(err, hipermap_domainset::Error::TooManyPopular(_)));
}

#[test]
fn scenario_round_trip_after_mutation() {
    let base = ["example.com", "images.google.com", "a.b.c.d.e"];
    let db = compile(&base);

    let mut out = vec![0u8; db.serialized_len()];
    db.serialize(&mut out).unwrap();
    let reloaded = deserialize(&out).unwrap();

    let probes = [
        "example.com",
        "eexample.com",
        "xample.com",
        "sub.example.com",
        "images.google.com",
        "a.images.google.com",
        "a.b.c.d.e",
        "b.c.d.e",
        "z.a.b.c.d.e",
    ];
    for p in probes {
        assert_eq!(db.find(p.as_bytes()), reloaded.find(p.as_bytes()), "mismatch on {p}");
    }

    let mut out2 = vec![0u8; reloaded.serialized_len()];
    reloaded.serialize(&mut out2).unwrap();
    assert_eq!(out, out2);
}

#[test]
fn scenario_adversarial_many_single_letter_labels() {
    let mut pattern = String::new();
    for c in 'a'..='z' {
        pattern.push(c);
        pattern.push('.');
    }
    pattern.push_str("tail.example");
    let db = compile(&[pattern.as_str()]);
    assert_eq!(db.find(pattern.as_bytes()), Lookup::Found);
}

#[test]
fn determinism_same_input_same_bytes() {
    let patterns = ["example.com", "images.google.com", "a.b.c"];
    let db1 = compile(&patterns);
    let db2 = compile(&patterns);

    let mut b1 = vec![0u8; db1.serialized_len()];
    let mut b2 = vec![0u8; db2.serialized_len()];
    db1.serialize(&mut b1).unwrap();
    db2.serialize(&mut b2).unwrap();
    assert_eq!(b1, b2);
}

#[test]
fn rejects_empty_pattern_list() {
    let err = Database::compile(Vec::<&str>::new(), &CalibrationLimits::default()).unwrap_err();
    assert!(matches!(err, hipermap_domainset::Error::NoPatterns));
}

#[test]
fn rejects_top_level_pattern() {
    let err = Database::compile(["com"], &CalibrationLimits::default()).unwrap_err();
    assert!(matches!(err, hipermap_domainset::Error::TopLevelDomain(_)));
}
