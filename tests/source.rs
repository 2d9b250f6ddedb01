mod common;

use common::TestWorkspace;
use encoding_rs::{UTF_8, WINDOWS_1252};
use ppmidb::source::SourceReader;

#[test]
fn listed_files_come_before_zip_members() {
    let workspace = TestWorkspace::new();
    let loose = workspace.write("Loose.csv", "PATNO\n1\n");
    let archive = workspace.write_zip(
        "release.zip",
        &[
            ("Second.csv", &b"B\n2\n"[..]),
            ("nested/", &b""[..]),
            ("nested/notes.md", &b"# notes"[..]),
            ("nested/Third.csv", &b"C\n3\n"[..]),
        ],
    );

    let sources = SourceReader::new(&[loose.clone()], Some(archive.as_path()), WINDOWS_1252)
        .collect::<Result<Vec<_>, _>>()
        .expect("all sources readable");

    let names = sources
        .iter()
        .map(|source| source.name.clone())
        .collect::<Vec<_>>();
    let archive_name = archive.display().to_string();
    assert_eq!(
        names,
        vec![
            loose.display().to_string(),
            format!("{archive_name}!Second.csv"),
            format!("{archive_name}!nested/Third.csv"),
        ]
    );
    assert_eq!(sources[1].content, "B\n2");
}

#[test]
fn missing_archive_is_a_single_read_failure() {
    let workspace = TestWorkspace::new();
    let good = workspace.write("Good.csv", "A\n1\n");
    let missing = workspace.path().join("missing.zip");

    let results = SourceReader::new(&[good], Some(missing.as_path()), WINDOWS_1252)
        .collect::<Vec<_>>();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    let err = results[1].as_ref().unwrap_err();
    assert_eq!(err.kind(), "read");
    assert!(err.to_string().contains("Opening zip archive"));
}

#[test]
fn undecodable_member_does_not_hide_later_members() {
    let workspace = TestWorkspace::new();
    let archive = workspace.write_zip(
        "mixed.zip",
        &[
            ("Bad.csv", &b"A\n\xc3\x28\n"[..]),
            ("Good.csv", &b"A\n1\n"[..]),
        ],
    );

    let results = SourceReader::new(&[], Some(archive.as_path()), UTF_8).collect::<Vec<_>>();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap_err().kind(), "read");
    assert_eq!(results[1].as_ref().expect("good member").content, "A\n1");
}

#[test]
fn corrupt_diagnosis_row_is_repaired_inside_archives() {
    let workspace = TestWorkspace::new();
    let archive = workspace.write_zip(
        "release.zip",
        &[(
            "Primary_Clinical_Diagnosis_20250401.csv",
            &b"PATNO,NOTE,CODE,SCORE,EXTRA\n1,\"no tremors today. \\\"\",,\"3\",\n"[..],
        )],
    );

    let source = SourceReader::new(&[], Some(archive.as_path()), WINDOWS_1252)
        .next()
        .expect("one member")
        .expect("readable member");

    assert!(source.content.ends_with("1,\"no tremors today.\",,\"3\","));
    let columns = ppmidb::schema::read_header_names(&source.content).expect("header parses");
    assert_eq!(columns.len(), 5);
}
