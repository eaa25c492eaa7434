use crate::models::Urn;

// Paths exercising separators, dot runs, encoding and unicode
const SAMPLES: &[&str] = &[
    "",
    "/",
    "a",
    "/a/b/c.txt",
    "//a///b//",
    "/a/./b/../c",
    "a/.../b/",
    "/my%20dir/file%2Bplus.txt",
    "/déjà vu/Ünïcödé.md",
    "/trailing/",
    "relative/dir/",
];

#[test]
fn test_normalization_is_idempotent() {
    for sample in SAMPLES {
        let once = Urn::new(sample).path();
        assert_eq!(Urn::new(&once).path(), once, "sample {:?}", sample);
    }
}

#[test]
fn test_directory_flag_invariant() {
    for sample in SAMPLES {
        assert!(Urn::directory(sample).path().ends_with('/'), "sample {:?}", sample);

        let plain = Urn::new(sample).path();
        let collapsed_input_had_slash = sample.ends_with('/') || sample.is_empty();
        assert_eq!(plain.ends_with('/'), collapsed_input_had_slash, "sample {:?}", sample);
    }
}

#[test]
fn test_parent_and_filename_are_inverse() {
    for sample in SAMPLES {
        let urn = Urn::new(sample);
        if urn.is_root() {
            continue;
        }
        let rebuilt = Urn::new(&format!("{}{}", urn.parent(), urn.filename()));
        assert_eq!(rebuilt.path(), urn.path(), "sample {:?}", sample);
    }
}

#[test]
fn test_quote_then_decode_returns_path() {
    for sample in SAMPLES {
        let urn = Urn::new(sample);
        assert_eq!(Urn::new(&urn.quote()).path(), urn.path(), "sample {:?}", sample);
    }
}
