//! End-to-end conversion of a DigLab record export.

use diglab_core::templates::{DatasetDescription, EphysSidecar};
use diglab_core::{convert_project, ConfigFile, CreationMode, Error, ProjectConfig, TsvTable};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const RECORDS: &str = r#"[
  {
    "record_id": "1",
    "guid": "NHP-0042",
    "date": "2021-06-15",
    "ses_number": "1",
    "user": "Jane Doe",
    "ethical_protocol_id": "APAFIS-1",
    "exp_name": "reach",
    "comments_exp": "",
    "comments_subject": "calm",
    "comments_setup": "rig B",
    "weight": "9.5",
    "modality___ephys": "1",
    "modality___video": "1",
    "subject_behaviour___calm": "1",
    "reward_fluid_type___water": "1",
    "reward_fluid_type_other": "",
    "special_event_0": "",
    "stimulation___yes": "0",
    "subject_behaviour_multi___yes": "0",
    "time_last_trial": "12:10",
    "data_quality___good": "1",
    "incomplete_session___yes": "0",
    "reward_fluid": 150,
    "reward_fluid_additional": 0
  },
  {
    "record_id": "2",
    "guid": "NHP-0042",
    "date": "2021-06-16",
    "ses_number": "2",
    "user": "John Roe",
    "ethical_protocol_id": "APAFIS-1",
    "exp_name": "reach",
    "comments_exp": "short",
    "comments_subject": "",
    "comments_setup": "",
    "weight": "9.4",
    "modality___ephys": "1",
    "special_event_0": "fire alarm",
    "special_event_time_0": "11:00",
    "stimulation___yes": "1",
    "subject_behaviour_multi___yes": "0",
    "time_last_trial": "11:05",
    "incomplete_session___yes": "1",
    "reward_fluid": 80,
    "reward_fluid_additional": 10
  }
]"#;

fn project(tmp: &Path) -> ProjectConfig {
    let records = tmp.join("records.json");
    fs::write(&records, RECORDS).unwrap();

    let data = tmp.join("raw/sub-NHP0042_ses-20210615id1");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("recording.nix"), b"nix").unwrap();

    let mut project = ProjectConfig::new(tmp.join("def"), tmp.join("bids"));
    project.records_file = Some(records);
    project.data_directory = Some(tmp.join("raw"));
    project.mode = CreationMode::Link;
    project
}

#[test]
fn test_convert_project_builds_dataset() {
    let tmp = TempDir::new().unwrap();
    let project = project(tmp.path());
    let root = project.output_directory.clone();

    let report = convert_project("SimpleProject", &project).unwrap();

    assert_eq!(report.sessions.len(), 2);
    assert_eq!(report.sessions[0].subject, "NHP0042");
    assert_eq!(report.sessions[0].session, "20210615id1");
    assert_eq!(report.placeholders, 1);

    let ephys = root.join("sub-NHP0042/ses-20210615id1/ephys");
    let data_file = ephys.join("sub-NHP0042_ses-20210615id1_ephys.nix");
    assert_eq!(fs::read(&data_file).unwrap(), b"nix");
    assert!(tmp.path().join("raw/sub-NHP0042_ses-20210615id1/recording.nix").exists());

    let scans = TsvTable::load(ephys.join("sub-NHP0042_ses-20210615id1_scans.tsv")).unwrap();
    assert_eq!(scans.rows[0][0], "ephys/sub-NHP0042_ses-20210615id1_ephys.nix");
    assert_eq!(scans.rows[0][8], "150");

    let sidecar: EphysSidecar = serde_json::from_str(
        &fs::read_to_string(ephys.join("sub-NHP0042_ses-20210615id1_ephys.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(sidecar.modalities, vec!["ephys", "video"]);
    assert!(sidecar.special_events.is_empty());

    let second: EphysSidecar = serde_json::from_str(
        &fs::read_to_string(
            root.join("sub-NHP0042/ses-20210616id2/ephys/sub-NHP0042_ses-20210616id2_ephys.json"),
        )
        .unwrap(),
    )
    .unwrap();
    assert_eq!(second.special_events["0"].comment, "fire alarm");

    let participants = TsvTable::load(root.join("participants.tsv")).unwrap();
    assert_eq!(participants.rows, vec![vec!["sub-NHP0042".to_string()]]);

    let sessions = TsvTable::load(root.join("sub-NHP0042/sessions.tsv")).unwrap();
    assert_eq!(sessions.row_count(), 2);
    assert_eq!(sessions.rows[1][1], "2021-06-16T00:00:00");

    let description: DatasetDescription = serde_json::from_str(
        &fs::read_to_string(root.join("dataset_description.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(description.authors, vec!["Jane Doe", "John Roe"]);
    assert_eq!(description.ethics_approvals, vec!["APAFIS-1"]);
}

#[test]
fn test_convert_is_repeatable() {
    let tmp = TempDir::new().unwrap();
    let mut project = project(tmp.path());
    project.data_directory = None;

    convert_project("SimpleProject", &project).unwrap();
    convert_project("SimpleProject", &project).unwrap();

    let root = &project.output_directory;
    let participants = TsvTable::load(root.join("participants.tsv")).unwrap();
    assert_eq!(participants.row_count(), 1);
    let sessions = TsvTable::load(root.join("sub-NHP0042/sessions.tsv")).unwrap();
    assert_eq!(sessions.row_count(), 2);
}

#[test]
fn test_config_roundtrip_and_missing_records() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("config.json");

    let mut config = ConfigFile::default();
    config.projects.insert(
        "Empty".into(),
        ProjectConfig::new(tmp.path().join("def"), tmp.path().join("out")),
    );
    config.save(&config_path).unwrap();

    let loaded = ConfigFile::load(&config_path).unwrap();
    let project = loaded.project("Empty").unwrap();
    assert!(matches!(
        convert_project("Empty", project),
        Err(Error::FileRead { .. })
    ));
}
