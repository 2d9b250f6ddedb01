use anyhow::{Result, bail};
use ppmidb::{
    config::{Config, Overrides, Settings},
    error::FileError,
    load::{LoadJob, Target, run_load},
    source::SourceFile,
};

#[derive(Debug, Clone, PartialEq)]
struct RecordedJob {
    table: String,
    column_names: Vec<String>,
    ddl: Option<String>,
    column_count: Option<usize>,
}

/// In-memory target that refuses any table listed in `reject`.
#[derive(Default)]
struct RecordingTarget {
    reject: Vec<String>,
    committed: Vec<RecordedJob>,
}

impl Target for RecordingTarget {
    fn describe(&self) -> String {
        "recording target".to_string()
    }

    fn load(&mut self, job: &LoadJob<'_>) -> Result<u64> {
        if self.reject.iter().any(|table| table == job.table) {
            bail!("relation \"{}\" violates a constraint", job.table);
        }
        self.committed.push(RecordedJob {
            table: job.table.to_string(),
            column_names: job.column_names.to_vec(),
            ddl: job.ddl.map(str::to_string),
            column_count: job.columns.map(<[_]>::len),
        });
        Ok(job.content.lines().skip(1).count() as u64)
    }
}

fn settings() -> Settings {
    Settings::resolve(&Config::default(), &Overrides::default()).expect("settings")
}

fn source(name: &str, content: &str) -> Result<SourceFile, FileError> {
    Ok(SourceFile {
        name: name.to_string(),
        content: content.to_string(),
    })
}

#[test]
fn one_failing_file_leaves_the_others_loaded() {
    let mut target = RecordingTarget {
        reject: vec!["vital_signs".to_string()],
        ..RecordingTarget::default()
    };
    let sources = vec![
        source("Demographics_20250401.csv", "PATNO,SEX\n1,1\n2,0"),
        source("Vital_Signs_20250401.csv", "PATNO,TEMP\n1,36.6"),
        source("Biospecimen_20250401.csv", "PATNO,TYPE\n1,Plasma"),
    ];

    let summary = run_load(&mut target, sources, &settings(), false);

    assert_eq!(
        summary.succeeded,
        vec!["Demographics_20250401.csv", "Biospecimen_20250401.csv"]
    );
    assert_eq!(summary.failures.len(), 1);
    let failure = &summary.failures[0];
    assert_eq!(failure.kind(), "database");
    assert_eq!(failure.name(), "Vital_Signs_20250401.csv");
    assert!(failure.to_string().contains("into table 'vital_signs'"));
    assert!(failure.to_string().contains("violates a constraint"));
    assert!(summary.ensure_success().is_err());

    let tables = target
        .committed
        .iter()
        .map(|job| job.table.as_str())
        .collect::<Vec<_>>();
    assert_eq!(tables, vec!["demographics", "biospecimen"]);
}

#[test]
fn copy_only_load_uses_cleaned_header_names() {
    let mut target = RecordingTarget::default();
    let sources = vec![source("Visits.csv", "PATNO,Event ID,event-id\nx,BL,1")];

    let summary = run_load(&mut target, sources, &settings(), false);

    assert!(summary.is_success());
    let job = &target.committed[0];
    assert_eq!(job.column_names, vec!["patno", "event_id", "event_id_2"]);
    assert!(job.ddl.is_none());
    assert!(job.column_count.is_none());
}

#[test]
fn create_tables_passes_schema_and_ddl() {
    let mut target = RecordingTarget::default();
    let sources = vec![source("Visits_20250401.csv", "PATNO,EVENT_ID\n1,BL\n2,V01")];

    let summary = run_load(&mut target, sources, &settings(), true);

    assert!(summary.ensure_success().is_ok());
    let job = &target.committed[0];
    assert_eq!(job.table, "visits");
    assert_eq!(job.column_count, Some(2));
    let ddl = job.ddl.as_deref().expect("ddl present");
    assert!(ddl.starts_with("CREATE TABLE \"visits\" ("));
    assert!(ddl.contains("CREATE INDEX \"idx_visits_patno\""));
}

#[test]
fn unparseable_file_is_a_parse_failure_and_never_reaches_the_target() {
    let mut target = RecordingTarget::default();
    let sources = vec![
        source("Ragged.csv", "a,b\n1,2\n3"),
        source("Fine.csv", "a\n1"),
    ];

    let summary = run_load(&mut target, sources, &settings(), true);

    assert_eq!(summary.succeeded, vec!["Fine.csv"]);
    assert_eq!(summary.failures[0].kind(), "parse");
    assert_eq!(target.committed.len(), 1);
}

#[test]
fn headerless_file_never_reaches_the_target() {
    for create_tables in [false, true] {
        let mut target = RecordingTarget::default();
        let sources = vec![source("Empty.csv", ""), source("Fine.csv", "a\n1")];

        let summary = run_load(&mut target, sources, &settings(), create_tables);

        assert_eq!(summary.succeeded, vec!["Fine.csv"]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].kind(), "parse");
        assert!(summary.failures[0].to_string().contains("CSV has no header"));
        assert_eq!(target.committed.len(), 1);
    }
}
