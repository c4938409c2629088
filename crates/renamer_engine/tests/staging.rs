use std::fs;

use bytes::Bytes;
use renamer_engine::{DirStagingArea, MemoryStagingArea, StagingArea, StorageError};
use tempfile::TempDir;

fn exercise_contract(staging: &dyn StagingArea) {
    staging.put("b.txt", Bytes::from_static(b"bee")).unwrap();
    staging.put("a.txt", Bytes::from_static(b"ay")).unwrap();
    staging.put("c.txt", Bytes::from_static(b"sea")).unwrap();
    assert_eq!(staging.list_ids().unwrap(), ["b.txt", "a.txt", "c.txt"]);

    // Rename keeps the staging position.
    staging.rename("a.txt", "alpha.txt").unwrap();
    assert_eq!(staging.list_ids().unwrap(), ["b.txt", "alpha.txt", "c.txt"]);
    assert_eq!(staging.read("alpha.txt").unwrap(), Bytes::from_static(b"ay"));
    assert!(matches!(staging.read("a.txt"), Err(StorageError::NotFound(_))));

    // Never clobbers another staged file.
    let err = staging.rename("b.txt", "c.txt").unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists(_)));
    assert_eq!(staging.read("c.txt").unwrap(), Bytes::from_static(b"sea"));

    // Renaming onto itself is fine.
    staging.rename("b.txt", "b.txt").unwrap();

    let err = staging.rename("b.txt", "../escape.txt").unwrap_err();
    assert!(matches!(err, StorageError::InvalidId(_)));
    assert!(matches!(
        staging.rename("missing.txt", "x.txt"),
        Err(StorageError::NotFound(_))
    ));

    // Re-putting an id replaces content in place.
    staging.put("b.txt", Bytes::from_static(b"bzz")).unwrap();
    assert_eq!(staging.list_ids().unwrap().len(), 3);
    assert_eq!(staging.read("b.txt").unwrap(), Bytes::from_static(b"bzz"));

    staging.delete("b.txt").unwrap();
    assert_eq!(staging.list_ids().unwrap(), ["alpha.txt", "c.txt"]);
    assert!(matches!(
        staging.delete("b.txt"),
        Err(StorageError::NotFound(_))
    ));

    staging.clear().unwrap();
    assert!(staging.list_ids().unwrap().is_empty());
}

#[test]
fn memory_staging_honours_the_contract() {
    exercise_contract(&MemoryStagingArea::new());
}

#[test]
fn dir_staging_honours_the_contract() {
    let temp = TempDir::new().unwrap();
    let staging = DirStagingArea::open(temp.path().join("staged")).unwrap();
    exercise_contract(&staging);
    assert_eq!(fs::read_dir(staging.dir()).unwrap().count(), 0);
}

#[test]
fn dir_staging_writes_real_files() {
    let temp = TempDir::new().unwrap();
    let staging = DirStagingArea::open(temp.path()).unwrap();

    staging.put("notes.md", Bytes::from_static(b"# hi")).unwrap();
    staging.rename("notes.md", "meeting_notes.md").unwrap();

    assert!(!temp.path().join("notes.md").exists());
    assert_eq!(
        fs::read_to_string(temp.path().join("meeting_notes.md")).unwrap(),
        "# hi"
    );
}

#[test]
fn dir_staging_refuses_to_replace_unlisted_files() {
    let temp = TempDir::new().unwrap();
    let staging = DirStagingArea::open(temp.path()).unwrap();
    staging.put("a.txt", Bytes::from_static(b"a")).unwrap();
    // Appears behind the staging area's back.
    fs::write(temp.path().join("b.txt"), "outsider").unwrap();

    let err = staging.rename("a.txt", "b.txt").unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists(_)));
    assert_eq!(fs::read_to_string(temp.path().join("b.txt")).unwrap(), "outsider");
}

#[cfg(unix)]
#[test]
fn dir_staging_allows_a_target_that_is_the_source_file() {
    let temp = TempDir::new().unwrap();
    let staging = DirStagingArea::open(temp.path()).unwrap();
    staging.put("photo.jpg", Bytes::from_static(b"jpeg")).unwrap();
    // A second link to the same file stands in for the case-insensitive
    // alias `Photo.jpg` of `photo.jpg`.
    fs::hard_link(temp.path().join("photo.jpg"), temp.path().join("Photo.jpg")).unwrap();

    staging.rename("photo.jpg", "Photo.jpg").unwrap();
    assert_eq!(staging.list_ids().unwrap(), ["Photo.jpg"]);
    assert_eq!(staging.read("Photo.jpg").unwrap(), Bytes::from_static(b"jpeg"));
}

#[test]
fn dir_staging_adopts_existing_files_in_name_order() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("zeta.txt"), "z").unwrap();
    fs::write(temp.path().join("alpha.txt"), "a").unwrap();
    fs::create_dir(temp.path().join("nested")).unwrap();

    let staging = DirStagingArea::open(temp.path()).unwrap();
    assert_eq!(staging.list_ids().unwrap(), ["alpha.txt", "zeta.txt"]);
}

#[test]
fn invalid_ids_are_rejected() {
    let staging = MemoryStagingArea::new();
    for id in ["", ".", "..", "dir/file.txt", "dir\\file.txt"] {
        let err = staging.put(id, Bytes::new()).unwrap_err();
        assert!(matches!(err, StorageError::InvalidId(_)), "{id:?}");
    }
}

#[test]
fn open_fails_when_path_is_a_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("not_a_dir");
    fs::write(&file, "x").unwrap();

    assert!(matches!(
        DirStagingArea::open(&file),
        Err(StorageError::Persist(_))
    ));
}
