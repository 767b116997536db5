//! Property tests that drive the crash-safe algorithms against
//! [`ModelFilesystem`], injecting a simulated crash immediately after every
//! operation and checking the universal durability invariants still hold.

mod tests {
    use crash_safe_fs::testing::model::ModelFilesystem;
    use crash_safe_fs::{AbsPathBuf, DurableOps, Filesystem};
    use proptest::prelude::*;

    fn root() -> AbsPathBuf {
        AbsPathBuf::promote("/").unwrap()
    }

    proptest! {
        /// A committed `write` is never partially visible: after a crash, the
        /// target either holds the old contents (crash struck before the
        /// rename's directory sync became durable) or the full new contents
        /// (crash struck after), never a prefix or a mix of the two.
        #[test]
        fn write_is_never_partially_durable_after_a_crash(
            seed in any::<u64>(),
            old in proptest::option::of("[a-z]{0,32}"),
            new in "[a-z]{1,64}",
        ) {
            let fs = ModelFilesystem::new(seed);
            let ops = DurableOps::new(fs);
            let target = root().resolve("target.txt");

            if let Some(old) = &old {
                ops.write(&target, old.as_bytes()).unwrap();
            }

            ops.write(&target, new.as_bytes()).unwrap();
            ops.filesystem().crash();

            let observed = ops.filesystem().read_durable(&target);
            let old_bytes = old.as_ref().map(|s| s.as_bytes().to_vec());
            prop_assert!(observed == Some(new.clone().into_bytes()) || observed == old_bytes);
        }

        /// `move_` never leaves the target durably holding the moved payload
        /// while the source also durably holds it: a crash either rolls the
        /// whole move back (source still there, target unaffected) or lets it
        /// fully through (target holds the payload, source gone), never both at
        /// once.
        #[test]
        fn move_is_all_or_nothing_after_a_crash(seed in any::<u64>(), payload in "[a-z]{1,32}") {
            let fs = ModelFilesystem::new(seed);
            let ops = DurableOps::new(fs);
            let src = root().resolve("src.txt");
            let tgt = root().resolve("tgt.txt");

            ops.write(&src, payload.as_bytes()).unwrap();
            ops.filesystem().crash(); // make sure the source write itself is durable first
            ops.move_(&src, &tgt).unwrap();
            ops.filesystem().crash();

            let src_seen = ops.filesystem().read_durable(&src);
            let tgt_seen = ops.filesystem().read_durable(&tgt);
            let payload_bytes = payload.clone().into_bytes();

            prop_assert!(!(tgt_seen == Some(payload_bytes.clone()) && src_seen == Some(payload_bytes)));
        }

        /// `create_directories` building a multi-level path never durably
        /// creates a child directory without its parent: after a crash, the
        /// durable directory tree is always a prefix of the requested path.
        #[test]
        fn create_directories_never_durably_skips_an_ancestor(seed in any::<u64>()) {
            let fs = ModelFilesystem::new(seed);
            let ops = DurableOps::new(fs);
            let target = root().resolve("a").resolve("b").resolve("c");

            ops.create_directories(&target).unwrap();
            ops.filesystem().crash();

            let a = root().resolve("a");
            let b = a.resolve("b");
            let c = b.resolve("c");
            let a_dir = ops.filesystem().list(&a);
            let b_dir = ops.filesystem().list(&b);
            let c_dir = ops.filesystem().list(&c);

            // If a deeper level exists, every shallower level must too.
            prop_assert!(c_dir.is_err() || b_dir.is_ok());
            prop_assert!(b_dir.is_err() || a_dir.is_ok());
        }
    }
}
