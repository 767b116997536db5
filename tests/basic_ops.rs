//! End-to-end tests against the real filesystem via `PhysicalFilesystem`.

mod tests {
    use std::io::Cursor;

    use crash_safe_fs::{AbsPathBuf, DurableOps, Error, Filesystem, PhysicalFilesystem};

    fn ops() -> DurableOps<PhysicalFilesystem> {
        DurableOps::new(PhysicalFilesystem::default())
    }

    #[test]
    fn write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let target = AbsPathBuf::promote(dir.path().join("greeting.txt")).unwrap();
        let ops = ops();

        ops.write(&target, b"hello, durable world").unwrap();

        assert_eq!(
            std::fs::read(target.as_path()).unwrap(),
            b"hello, durable world"
        );
    }

    #[test]
    fn write_replaces_existing_contents() {
        let dir = tempfile::tempdir().unwrap();
        let target = AbsPathBuf::promote(dir.path().join("greeting.txt")).unwrap();
        let ops = ops();

        ops.write(&target, b"first version, much longer than the second")
            .unwrap();
        ops.write(&target, b"second").unwrap();

        assert_eq!(std::fs::read(target.as_path()).unwrap(), b"second");
    }

    #[test]
    fn write_stream_copies_a_reader_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let target = AbsPathBuf::promote(dir.path().join("stream.bin")).unwrap();
        let ops = ops();

        let payload = vec![7u8; 64 * 1024];
        let mut reader = Cursor::new(payload.clone());
        ops.write_stream(&target, &mut reader).unwrap();

        assert_eq!(std::fs::read(target.as_path()).unwrap(), payload);
    }

    #[test]
    fn move_relocates_a_file_across_directories() {
        let dir = tempfile::tempdir().unwrap();
        let src = AbsPathBuf::promote(dir.path().join("src.txt")).unwrap();
        std::fs::write(src.as_path(), b"payload").unwrap();

        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let tgt = AbsPathBuf::promote(sub.join("moved.txt")).unwrap();

        ops().move_(&src, &tgt).unwrap();

        assert!(!src.as_path().exists());
        assert_eq!(std::fs::read(tgt.as_path()).unwrap(), b"payload");
    }

    #[test]
    fn move_replaces_an_existing_target_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = AbsPathBuf::promote(dir.path().join("src.txt")).unwrap();
        std::fs::write(src.as_path(), b"new").unwrap();
        let tgt = AbsPathBuf::promote(dir.path().join("tgt.txt")).unwrap();
        std::fs::write(tgt.as_path(), b"old contents here").unwrap();

        ops().move_(&src, &tgt).unwrap();

        assert_eq!(std::fs::read(tgt.as_path()).unwrap(), b"new");
    }

    #[test]
    fn move_onto_a_directory_target_fails() {
        let dir = tempfile::tempdir().unwrap();
        let src = AbsPathBuf::promote(dir.path().join("src.txt")).unwrap();
        std::fs::write(src.as_path(), b"payload").unwrap();
        let tgt_dir = dir.path().join("tgt");
        std::fs::create_dir(&tgt_dir).unwrap();
        let tgt = AbsPathBuf::promote(&tgt_dir).unwrap();

        let err = ops().move_(&src, &tgt).unwrap_err();
        assert!(matches!(err, Error::IsDirectory(_)));
    }

    #[test]
    fn write_creates_missing_intermediate_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = AbsPathBuf::promote(dir.path().join("a/b/c")).unwrap();

        ops().write(&target, b"my data").unwrap();

        assert_eq!(std::fs::read(target.as_path()).unwrap(), b"my data");
    }

    #[test]
    fn write_stream_creates_missing_intermediate_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = AbsPathBuf::promote(dir.path().join("x/y/z")).unwrap();
        let mut reader = Cursor::new(b"streamed".to_vec());

        ops().write_stream(&target, &mut reader).unwrap();

        assert_eq!(std::fs::read(target.as_path()).unwrap(), b"streamed");
    }

    #[test]
    fn move_without_promising_source_deletion_is_publicly_reachable() {
        let dir = tempfile::tempdir().unwrap();
        let src = AbsPathBuf::promote(dir.path().join("src.txt")).unwrap();
        std::fs::write(src.as_path(), b"payload").unwrap();
        let tgt = AbsPathBuf::promote(dir.path().join("tgt.txt")).unwrap();

        ops()
            .move_without_promising_source_deletion(&src, &tgt)
            .unwrap();

        assert_eq!(std::fs::read(tgt.as_path()).unwrap(), b"payload");
    }

    #[test]
    fn open_file_on_an_existing_directory_fails_with_is_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target_dir = dir.path().join("a_directory");
        std::fs::create_dir(&target_dir).unwrap();
        let target = AbsPathBuf::promote(&target_dir).unwrap();

        let err = ops().filesystem().open_file(&target).unwrap_err();
        assert!(matches!(err, Error::IsDirectory(_)));
    }

    #[test]
    fn create_directories_builds_every_missing_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let target = AbsPathBuf::promote(dir.path().join("a/b/c")).unwrap();

        ops().create_directories(&target).unwrap();

        assert!(target.as_path().is_dir());
        ops().create_directories(&target).unwrap(); // idempotent
    }

    #[test]
    fn atomically_delete_removes_a_populated_directory_tree() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("tree");
        std::fs::create_dir_all(target.join("nested")).unwrap();
        std::fs::write(target.join("a.txt"), b"a").unwrap();
        std::fs::write(target.join("nested/b.txt"), b"b").unwrap();
        let target = AbsPathBuf::promote(target).unwrap();

        ops().atomically_delete(&target).unwrap();

        assert!(!target.as_path().exists());
    }

    #[test]
    fn atomically_delete_of_a_missing_path_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let target = AbsPathBuf::promote(dir.path().join("never-existed")).unwrap();

        ops().atomically_delete(&target).unwrap();
    }

    #[test]
    fn output_stream_leaves_target_absent_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let target = AbsPathBuf::promote(dir.path().join("staged.txt")).unwrap();
        let ops = ops();

        let mut stream = ops.open_output(&target).unwrap();
        stream.write(b"staged bytes").unwrap();
        assert!(!target.as_path().exists());
        stream.commit().unwrap();

        assert_eq!(std::fs::read(target.as_path()).unwrap(), b"staged bytes");
    }

    #[test]
    fn output_stream_abandoned_without_commit_leaves_target_absent() {
        let dir = tempfile::tempdir().unwrap();
        let target = AbsPathBuf::promote(dir.path().join("staged.txt")).unwrap();
        let ops = ops();

        {
            let mut stream = ops.open_output(&target).unwrap();
            stream.write(b"never committed").unwrap();
        }

        assert!(!target.as_path().exists());
    }

    #[test]
    fn directory_modification_scope_commits_ad_hoc_writes() {
        let dir = tempfile::tempdir().unwrap();
        let ops = ops();
        let dir_path = AbsPathBuf::promote(dir.path()).unwrap();

        let scope = ops.open_scope(&dir_path).unwrap();
        std::fs::write(dir.path().join("side-write.txt"), b"hi").unwrap();
        scope.commit().unwrap();

        assert_eq!(
            std::fs::read(dir.path().join("side-write.txt")).unwrap(),
            b"hi"
        );
    }
}
