//! End-to-end entity tests over a self-consistent fixture dataset: real
//! object SHAs, LZF-framed payloads, TCH shards and a packed blob archive
//! built in a tempdir, then navigated through `Oscar` exactly like the
//! production layout.

use std::collections::HashSet;
use std::path::Path;

use crate::codec::{ber_encode, compress};
use crate::error::OscarError;
use crate::model::{IGNORED_AUTHORS, Oscar, Sha};
use crate::objects::{ObjectKind, build_commit, build_tree, object_sha};
use crate::settings::test_settings;
use crate::tch::test_writer::TchWriter;

const MARAT: &str = "Marat <valiev.m@gmail.com>";
const EARLY: &str = "Early Clock <early@example.com>";
const MERGE_BUTTON: &str = "GitHub Merge Button <merge-button@github.com>";
const PROJECT: &str = "user2589_minicms";

struct Fixture {
    _tmp: tempfile::TempDir,
    oscar: Oscar,
    c1: Sha,
    c2: Sha,
    c3: Sha,
    c4: Sha,
    c5: Sha,
    ghost: Sha,
    corrupt: Sha,
    root_v2: Sha,
    blob_shas: Vec<Sha>,
    b_gitignore: Sha,
    b_readme_v1: Sha,
    b_readme_v2: Sha,
    b_old_util: Sha,
    b_new_util: Sha,
}

fn sha_value(shas: &[Sha]) -> Vec<u8> {
    shas.iter().flat_map(|s| *s.as_bytes()).collect()
}

fn name_value(names: &str) -> Vec<u8> {
    compress(names.as_bytes())
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    for dir in ["All.sha1c", "All.sha1o", "All.blobs", "basemaps"] {
        std::fs::create_dir(tmp.path().join(dir)).unwrap();
    }
    let sha1c = tmp.path().join("All.sha1c");
    let basemaps = tmp.path().join("basemaps");

    // ── Blobs: archive + offset shard ───────────────────────────
    let gitignore = b"*.pyc\n.env\n*.swp\n".to_vec();
    let license = b"MIT License\n\nPermission is hereby granted, free of charge.\n".to_vec();
    let readme_v1 = b"# minicms\n\nMinimal CMS.\n".to_vec();
    let readme_v2 = b"# minicms\n\nMinimal CMS.\nNow with templates.\n".to_vec();
    let run_sh = b"#!/bin/sh\npython manage.py runserver\n".to_vec();
    let old_util =
        b"def slugify(s):\n    return s.lower().replace(' ', '-')\n\ndef truncate(s, n):\n    return s[:n]\n"
            .to_vec();
    let new_util =
        b"def slugify(s):\n    return s.lower().replace(' ', '-')\n\ndef truncate(s, n):\n    return s[:n]\n\ndef strip(s):\n    return s.strip()\n"
            .to_vec();
    let templates: Vec<Vec<u8>> = (1..=11)
        .map(|i| format!("<html>template {i:02}</html>\n").into_bytes())
        .collect();

    let mut contents: Vec<&[u8]> = vec![
        &gitignore, &license, &readme_v1, &readme_v2, &run_sh, &old_util, &new_util,
    ];
    contents.extend(templates.iter().map(Vec::as_slice));

    let mut bin = Vec::new();
    let mut offsets = TchWriter::new(64);
    let mut blob_shas = Vec::new();
    for content in &contents {
        let sha = object_sha(ObjectKind::Blob, content);
        let framed = compress(content);
        offsets.insert(
            sha.to_vec(),
            ber_encode(&[bin.len() as u64, framed.len() as u64]),
        );
        bin.extend_from_slice(&framed);
        blob_shas.push(Sha::from_array(sha));
    }
    std::fs::write(tmp.path().join("All.blobs/blob_0.bin"), &bin).unwrap();
    offsets.write_to(&tmp.path().join("All.sha1o/sha1.blob_0.tch"));

    let b_gitignore = blob_shas[0];
    let b_license = blob_shas[1];
    let b_readme_v1 = blob_shas[2];
    let b_readme_v2 = blob_shas[3];
    let b_run = blob_shas[4];
    let b_old_util = blob_shas[5];
    let b_new_util = blob_shas[6];
    let b_templates = &blob_shas[7..];

    // ── Trees ───────────────────────────────────────────────────
    let mut trees = TchWriter::new(64);
    let mut put_tree = |entries: &[(&[u8], &[u8], [u8; 20])]| -> Sha {
        let data = build_tree(entries);
        let sha = object_sha(ObjectKind::Tree, &data);
        trees.insert(sha.to_vec(), compress(&data));
        Sha::from_array(sha)
    };

    let template_names: Vec<String> = (1..=11).map(|i| format!("t{i:02}.html")).collect();
    let sub_entries: Vec<(&[u8], &[u8], [u8; 20])> = template_names
        .iter()
        .zip(b_templates)
        .map(|(name, sha)| (&b"100644"[..], name.as_bytes(), *sha.as_bytes()))
        .collect();
    let t_sub = put_tree(&sub_entries);

    let root_v0 = put_tree(&[
        (&b"100644"[..], &b".gitignore"[..], *b_gitignore.as_bytes()),
        (&b"100644"[..], &b"README.md"[..], *b_readme_v1.as_bytes()),
    ]);

    let root_v1 = put_tree(&[
        (&b"100644"[..], &b".gitignore"[..], *b_gitignore.as_bytes()),
        (&b"100644"[..], &b"LICENSE"[..], *b_license.as_bytes()),
        (&b"100644"[..], &b"README.md"[..], *b_readme_v1.as_bytes()),
        (&b"100644"[..], &b"old_util.py"[..], *b_old_util.as_bytes()),
        (&b"100755"[..], &b"run.sh"[..], *b_run.as_bytes()),
        (&b"40000"[..], &b"templates"[..], *t_sub.as_bytes()),
    ]);

    let root_v2 = put_tree(&[
        (&b"100644"[..], &b".gitignore"[..], *b_gitignore.as_bytes()),
        (&b"100644"[..], &b"LICENSE"[..], *b_license.as_bytes()),
        (&b"100644"[..], &b"README.md"[..], *b_readme_v2.as_bytes()),
        (&b"100644"[..], &b"new_util.py"[..], *b_new_util.as_bytes()),
        (&b"100755"[..], &b"run.sh"[..], *b_run.as_bytes()),
        (&b"40000"[..], &b"templates"[..], *t_sub.as_bytes()),
    ]);
    trees.write_to(&sha1c.join("tree_0.tch"));

    // ── Commits ─────────────────────────────────────────────────
    let mut commits = TchWriter::new(64);
    let mut put_commit =
        |tree: &Sha, parents: &[&Sha], author: &str, ts: &str, tz: &str, msg: &str| -> Sha {
            let parent_hexes: Vec<String> = parents.iter().map(|p| p.to_hex()).collect();
            let parent_refs: Vec<&str> = parent_hexes.iter().map(String::as_str).collect();
            let data = build_commit(&tree.to_hex(), &parent_refs, author, author, ts, tz, msg);
            let sha = object_sha(ObjectKind::Commit, &data);
            commits.insert(sha.to_vec(), compress(&data));
            Sha::from_array(sha)
        };

    let c1 = put_commit(&root_v0, &[], MARAT, "1337000000", "+1100", "initial commit\n");
    let c2 = put_commit(&root_v1, &[&c1], MARAT, "1337100000", "+1100", "add everything\n");
    let c3 = put_commit(
        &root_v2,
        &[&c2],
        MARAT,
        "1337145807",
        "+1100",
        "License changed :(\n\nnow CC-BY-NC\n",
    );
    let c4 = put_commit(
        &root_v2,
        &[&c3],
        MERGE_BUTTON,
        "1337200000",
        "+0000",
        "Merge pull request #1\n",
    );
    let c5 = put_commit(&root_v2, &[&c3], EARLY, "1000000000", "+0000", "touch-up\n");
    // A record whose payload is not a valid LZF frame.
    let corrupt = Sha::from_array([0xCC; 20]);
    commits.insert(corrupt.as_bytes().to_vec(), vec![0xFF; 8]);
    commits.write_to(&sha1c.join("commit_0.tch"));

    // A SHA recorded in relations but absent from commit_random.
    let ghost = Sha::from_array([0x99; 20]);

    // ── Basemap relations ───────────────────────────────────────
    let put_map = |file: &str, rows: Vec<(Vec<u8>, Vec<u8>)>| {
        let mut w = TchWriter::new(64);
        for (k, v) in rows {
            w.insert(k, v);
        }
        w.write_to(&basemaps.join(file));
    };

    put_map(
        "p2cFullR.0.tch",
        vec![(
            PROJECT.into(),
            sha_value(&[c1, c2, c3, c4, c5, ghost]),
        )],
    );
    put_map(
        "p2aFullR.0.tch",
        vec![(
            PROJECT.into(),
            name_value(&format!("{MARAT};{MERGE_BUTTON};{EARLY}")),
        )],
    );
    put_map(
        "c2pFullR.0.tch",
        vec![(c3.as_bytes().to_vec(), name_value(&format!("{PROJECT};EMPTY")))],
    );
    put_map(
        "c2ccFullR.0.tch",
        vec![
            (c2.as_bytes().to_vec(), sha_value(&[c3])),
            (c3.as_bytes().to_vec(), sha_value(&[c4, c5])),
        ],
    );
    put_map(
        "c2fFullR.0.tch",
        vec![(
            c3.as_bytes().to_vec(),
            name_value("README.md;new_util.py;old_util.py"),
        )],
    );
    put_map(
        "c2taFullR.0.tch",
        vec![(
            c3.as_bytes().to_vec(),
            name_value(&format!("1337145807;{MARAT}")),
        )],
    );
    put_map("c2rFullR.0.tch", vec![(c3.as_bytes().to_vec(), sha_value(&[c1]))]);
    put_map("c2hFullR.0.tch", vec![(c3.as_bytes().to_vec(), sha_value(&[c5]))]);
    put_map("c2pcFullR.0.tch", vec![(c3.as_bytes().to_vec(), sha_value(&[c2]))]);
    // commit_blobs famously misses the first file of every tree: leave out
    // the .gitignore blob.
    let mut c3_blobs: Vec<Sha> = vec![b_license, b_readme_v2, b_new_util, b_run];
    c3_blobs.extend_from_slice(b_templates);
    put_map("c2bFullR.0.tch", vec![(c3.as_bytes().to_vec(), sha_value(&c3_blobs))]);
    put_map(
        "b2cFullR.0.tch",
        vec![(b_readme_v2.as_bytes().to_vec(), sha_value(&[c3]))],
    );
    put_map(
        "b2faFullR.0.tch",
        vec![(
            b_readme_v2.as_bytes().to_vec(),
            name_value(&format!("1337145807;{MARAT}")),
        )],
    );
    put_map(
        "b2fFullR.0.tch",
        vec![(b_readme_v2.as_bytes().to_vec(), name_value("README.md"))],
    );
    put_map(
        "a2cFullR.0.tch",
        vec![(MARAT.into(), sha_value(&[c1, c2, c3]))],
    );
    put_map(
        "a2fFullR.0.tch",
        vec![(MARAT.into(), name_value(".gitignore;LICENSE;README.md;run.sh"))],
    );
    put_map(
        "f2cFullR.0.tch",
        vec![("README.md".into(), sha_value(&[c1, c2, c3, c4]))],
    );
    put_map("f2aFullR.0.tch", vec![("README.md".into(), name_value(MARAT))]);
    put_map(
        "f2bFullR.0.tch",
        vec![("README.md".into(), sha_value(&[b_readme_v1, b_readme_v2]))],
    );
    // author_projects is deliberately not written: lookups against it must
    // fail with ShardUnavailable.

    let dir = |p: &Path| p.to_str().unwrap().to_string();
    let settings = test_settings(&[
        ("OSCAR_ALL_SHA1C", &dir(&sha1c)),
        ("OSCAR_ALL_SHA1O", &dir(&tmp.path().join("All.sha1o"))),
        ("OSCAR_ALL_BLOBS", &dir(&tmp.path().join("All.blobs"))),
        ("OSCAR_BASEMAPS", &dir(&basemaps)),
    ]);
    let oscar = Oscar::with_settings(settings).unwrap();

    Fixture {
        _tmp: tmp,
        oscar,
        c1,
        c2,
        c3,
        c4,
        c5,
        ghost,
        corrupt,
        root_v2,
        blob_shas,
        b_gitignore,
        b_readme_v1,
        b_readme_v2,
        b_old_util,
        b_new_util,
    }
}

// ─── Commit decoding through storage ─────────────────────────────────

#[test]
fn test_commit_header_fields() {
    let fx = fixture();
    let commit = fx.oscar.commit(&fx.c3.to_hex()).unwrap();
    assert_eq!(commit.tree().unwrap().sha(), &fx.root_v2);
    assert_eq!(commit.parent_shas().unwrap(), vec![fx.c2]);
    assert!(commit.author().unwrap().starts_with(b"Marat"));
    let at = commit.authored_at().unwrap().unwrap();
    assert_eq!(at.offset().local_minus_utc(), 11 * 3600);
    assert_eq!(at.timestamp(), 1_337_145_807);
    assert_eq!(commit.message().unwrap(), b"License changed :(");
    assert_eq!(commit.encoding().unwrap(), "utf8");
    assert!(commit.signature().unwrap().is_none());
}

#[test]
fn test_commit_reparse_is_stable() {
    let fx = fixture();
    let commit = fx.oscar.commit(&fx.c3.to_hex()).unwrap();
    let direct = crate::objects::ParsedCommit::parse(commit.data().unwrap()).unwrap();
    assert_eq!(Sha::from_array(direct.tree), fx.root_v2);
    assert_eq!(direct.parents.len(), 1);
    assert_eq!(direct.authored_at, commit.authored_at().unwrap());
    assert_eq!(direct.committed_at, commit.committed_at().unwrap());
}

// ─── Blob invariants ─────────────────────────────────────────────────

#[test]
fn test_blob_identity_invariant() {
    let fx = fixture();
    for sha in &fx.blob_shas {
        let blob = fx.oscar.blob(&sha.to_hex()).unwrap();
        let data = blob.data().unwrap();
        assert_eq!(
            Sha::from_array(object_sha(ObjectKind::Blob, data)),
            *sha,
            "content hash must equal the key"
        );
    }
}

#[test]
fn test_blob_position_and_relations() {
    let fx = fixture();
    let blob = fx.oscar.blob(&fx.b_readme_v2.to_hex()).unwrap();
    let (offset, length) = blob.position().unwrap();
    assert!(length > 0);
    assert!(offset < 1 << 20);
    assert_eq!(blob.commit_shas().unwrap(), vec![fx.c3]);
    let (ts, author) = blob.first_author().unwrap();
    assert_eq!(ts, b"1337145807");
    assert_eq!(author, MARAT.as_bytes());
    assert_eq!(blob.file_names().unwrap(), vec![b"README.md".to_vec()]);
}

// ─── Trees ──────────────────────────────────────────────────────────

#[test]
fn test_tree_entries_and_files() {
    let fx = fixture();
    let tree = fx.oscar.tree(&fx.root_v2.to_hex()).unwrap();
    let entries: Vec<_> = tree.entries().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(entries.len(), 6);

    let files = tree.files().unwrap();
    assert_eq!(files.len(), 16, "recursive files exclude directories");
    assert!(files.contains_key(&b".gitignore"[..].to_vec()));
    assert!(files.contains_key(&b"templates/t01.html"[..].to_vec()));
    assert!(!files.keys().any(|k| k == b"templates"));
    assert!(files.values().any(|sha| sha == &fx.b_gitignore));
}

#[test]
fn test_tree_serialization_roundtrip_through_storage() {
    let fx = fixture();
    let tree = fx.oscar.tree(&fx.root_v2.to_hex()).unwrap();
    let entries: Vec<_> = tree.entries().unwrap().collect::<Result<_, _>>().unwrap();
    let rebuilt = build_tree(
        &entries
            .iter()
            .map(|e| (e.mode, e.name, e.sha))
            .collect::<Vec<_>>(),
    );
    assert_eq!(rebuilt.as_slice(), tree.data().unwrap());
}

// ─── Relations on commits ───────────────────────────────────────────

#[test]
fn test_commit_relations() {
    let fx = fixture();
    let c2 = fx.oscar.commit(&fx.c2.to_hex()).unwrap();
    assert_eq!(c2.child_shas().unwrap(), &[fx.c3]);

    let c3 = fx.oscar.commit(&fx.c3.to_hex()).unwrap();
    // The EMPTY sentinel is dropped during decoding.
    assert_eq!(c3.project_names().unwrap(), &[PROJECT.as_bytes().to_vec()]);
    assert_eq!(
        c3.changed_file_names().unwrap(),
        &[
            b"README.md".to_vec(),
            b"new_util.py".to_vec(),
            b"old_util.py".to_vec()
        ]
    );
    let (ts, author) = c3.time_author().unwrap();
    assert_eq!(ts, b"1337145807");
    assert_eq!(author, MARAT.as_bytes());
    assert_eq!(c3.root_sha().unwrap(), fx.c1);
    assert_eq!(c3.head_sha().unwrap(), fx.c5);
    assert_eq!(c3.parent_shas_rel().unwrap(), vec![fx.c2]);
}

#[test]
fn test_blob_shas_tree_vs_relation() {
    let fx = fixture();
    let c3 = fx.oscar.commit(&fx.c3.to_hex()).unwrap();
    let via_tree: HashSet<Sha> = c3.blob_shas().unwrap().iter().copied().collect();
    assert_eq!(via_tree.len(), 16);
    assert!(via_tree.contains(&fx.b_gitignore));

    // The relation misses the first file of every tree.
    let via_rel: HashSet<Sha> = c3.blob_shas_rel().unwrap().into_iter().collect();
    assert!(!via_rel.contains(&fx.b_gitignore));
    assert!(via_rel.is_subset(&via_tree));
}

// ─── Author / File entities ─────────────────────────────────────────

#[test]
fn test_author_relations() {
    let fx = fixture();
    let author = fx.oscar.author(MARAT);
    assert_eq!(author.commit_shas().unwrap(), vec![fx.c1, fx.c2, fx.c3]);
    let files = author.file_names().unwrap();
    assert_eq!(files.len(), 4);
    assert!(files.contains(&b"LICENSE"[..].to_vec()));
}

#[test]
fn test_file_relations_and_filtered_commits() {
    let fx = fixture();
    let file = fx.oscar.file("README.md");
    assert_eq!(file.commit_shas().unwrap().len(), 4);
    assert_eq!(file.author_names().unwrap(), vec![MARAT.as_bytes().to_vec()]);
    assert_eq!(
        file.blob_shas().unwrap(),
        vec![fx.b_readme_v1, fx.b_readme_v2]
    );
    // Iteration drops the merge-button commit but keeps the raw relation.
    let commits = file.commits().unwrap();
    assert_eq!(commits.len(), 3);
    assert!(commits.iter().all(|c| c.sha() != &fx.c4));
}

// ─── Project iteration, head/tail, first-parent chain ───────────────

#[test]
fn test_project_commit_filtering_and_sanitation() {
    let fx = fixture();
    let project = fx.oscar.project(PROJECT);
    // Raw relation keeps everything, including the ghost and the ignored
    // author.
    assert_eq!(project.commit_shas().unwrap().len(), 6);

    let commits = project.commits().unwrap();
    let shas: Vec<&Sha> = commits.iter().map(|c| c.sha()).collect();
    assert_eq!(shas, vec![&fx.c1, &fx.c2, &fx.c3, &fx.c5]);
    assert!(!shas.contains(&&fx.c4), "ignored author filtered");
    assert!(!shas.contains(&&fx.ghost), "unretrievable commit filtered");

    // c5 predates the tail, so its authored date is voided in memory.
    let c5 = commits.iter().find(|c| c.sha() == &fx.c5).unwrap();
    assert_eq!(c5.authored_at().unwrap(), None);
    // A fresh instance outside project iteration still sees the raw date.
    let fresh = fx.oscar.commit(&fx.c5.to_hex()).unwrap();
    assert_eq!(fresh.authored_at().unwrap().unwrap().timestamp(), 1_000_000_000);
}

#[test]
fn test_project_head_tail_and_first_parent_chain() {
    let fx = fixture();
    let project = fx.oscar.project(PROJECT);
    assert_eq!(project.tail().unwrap().unwrap().sha(), &fx.c1);
    // c5 is the only childless commit in the filtered set.
    assert_eq!(project.head().unwrap().unwrap().sha(), &fx.c5);
    // The chain starts at the argmax authored date (c3; c5's was voided).
    let chain: Vec<Sha> = project
        .commits_fp()
        .unwrap()
        .iter()
        .map(|c| *c.sha())
        .collect();
    assert_eq!(chain, vec![fx.c3, fx.c2, fx.c1]);
}

#[test]
fn test_project_author_names() {
    let fx = fixture();
    let authors = fx.oscar.project(PROJECT).author_names().unwrap();
    assert_eq!(authors.len(), 3);
    assert!(authors.contains(&MARAT.as_bytes().to_vec()));
    assert!(IGNORED_AUTHORS.contains(&&authors[1][..]));
}

// ─── Diff ───────────────────────────────────────────────────────────

#[test]
fn test_diff_without_rename_detection() {
    let fx = fixture();
    let c3 = fx.oscar.commit(&fx.c3.to_hex()).unwrap();
    let c2 = fx.oscar.commit(&fx.c2.to_hex()).unwrap();
    let entries = c3.diff(&c2, 1.0).unwrap();
    assert_eq!(entries.len(), 3);

    let changed = entries
        .iter()
        .find(|e| e.old_name.is_some() && e.new_name.is_some())
        .unwrap();
    assert_eq!(changed.new_name.as_deref(), Some(&b"README.md"[..]));
    assert_eq!(changed.old_sha, Some(fx.b_readme_v1));
    assert_eq!(changed.new_sha, Some(fx.b_readme_v2));

    assert!(entries.iter().any(|e| {
        e.old_name.is_none() && e.new_name.as_deref() == Some(&b"new_util.py"[..])
    }));
    assert!(entries.iter().any(|e| {
        e.new_name.is_none() && e.old_name.as_deref() == Some(&b"old_util.py"[..])
    }));
}

#[test]
fn test_diff_folds_similar_pair_into_rename() {
    let fx = fixture();
    let c3 = fx.oscar.commit(&fx.c3.to_hex()).unwrap();
    let c2 = fx.oscar.commit(&fx.c2.to_hex()).unwrap();
    let entries = c3.diff(&c2, 0.5).unwrap();
    assert_eq!(entries.len(), 2);

    let rename = entries
        .iter()
        .find(|e| e.old_name.as_deref() == Some(&b"old_util.py"[..]))
        .unwrap();
    assert_eq!(rename.new_name.as_deref(), Some(&b"new_util.py"[..]));
    assert_eq!(rename.old_sha, Some(fx.b_old_util));
    assert_eq!(rename.new_sha, Some(fx.b_new_util));
}

#[test]
fn test_diff_of_identical_trees_is_empty() {
    let fx = fixture();
    let c5 = fx.oscar.commit(&fx.c5.to_hex()).unwrap();
    let c4 = fx.oscar.commit(&fx.c4.to_hex()).unwrap();
    // Same tree on both sides (and c4 is not a parent: only a warning).
    assert!(c5.diff(&c4, 0.5).unwrap().is_empty());
}

// ─── Failure isolation ──────────────────────────────────────────────

#[test]
fn test_unknown_key_is_object_not_found() {
    let fx = fixture();
    let missing = fx.oscar.commit(&fx.ghost.to_hex()).unwrap();
    assert!(matches!(
        missing.data().unwrap_err(),
        OscarError::ObjectNotFound { .. }
    ));
    // A neighboring key in the same shard still resolves.
    assert!(fx.oscar.commit(&fx.c1.to_hex()).unwrap().data().is_ok());
}

#[test]
fn test_corrupt_record_is_corrupt_frame() {
    let fx = fixture();
    let commit = fx.oscar.commit(&fx.corrupt.to_hex()).unwrap();
    assert!(matches!(
        commit.data().unwrap_err(),
        OscarError::CorruptFrame(_)
    ));
}

#[test]
fn test_missing_shard_is_shard_unavailable() {
    let fx = fixture();
    let author = fx.oscar.author(MARAT);
    // author_projects has no shard on disk.
    assert!(matches!(
        author.project_names().unwrap_err(),
        OscarError::ShardUnavailable { .. }
    ));
    // Other relations for the same key are unaffected.
    assert_eq!(author.commit_shas().unwrap().len(), 3);
}

// ─── Whole-relation key iteration ───────────────────────────────────

#[test]
fn test_iter_relation_keys() {
    let fx = fixture();
    let keys: Vec<Vec<u8>> = fx
        .oscar
        .iter_relation_keys("project_commits")
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(keys, vec![PROJECT.as_bytes().to_vec()]);

    let commit_keys: Vec<Vec<u8>> = fx
        .oscar
        .iter_relation_keys("commit_random")
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(commit_keys.len(), 6);

    // No key registry: empty sequence, not an error.
    assert_eq!(fx.oscar.iter_relation_keys("blob_data").unwrap().count(), 0);

    // Registered relation with a missing shard: an error.
    assert!(fx.oscar.iter_relation_keys("author_projects").is_err());

    // Unknown relation name: a construction error.
    assert!(matches!(
        fx.oscar.iter_relation_keys("nonsense").unwrap_err(),
        OscarError::Construction { .. }
    ));
}

// ─── Equality and construction invariants ───────────────────────────

#[test]
fn test_entity_equality_and_hashing() {
    let fx = fixture();
    let a = fx.oscar.commit(&fx.c3.to_hex()).unwrap();
    let b = fx.oscar.commit(&fx.c3.to_hex()).unwrap();
    // Force one side's lazy state; equality still holds.
    a.parent_shas().unwrap();
    assert_eq!(a, b);

    let mut set = HashSet::new();
    set.insert(fx.oscar.commit(&fx.c1.to_hex()).unwrap());
    set.insert(fx.oscar.commit(&fx.c1.to_hex()).unwrap());
    set.insert(fx.oscar.commit(&fx.c2.to_hex()).unwrap());
    assert_eq!(set.len(), 2);

    assert_eq!(fx.oscar.project(PROJECT), fx.oscar.project(PROJECT));
    assert_ne!(fx.oscar.project(PROJECT), fx.oscar.project("other_repo"));
}

#[test]
fn test_sha_construction_errors() {
    let fx = fixture();
    assert!(matches!(
        fx.oscar.commit("e38126").unwrap_err(),
        OscarError::Construction { .. }
    ));
    assert!(fx.oscar.commit(&"zz".repeat(20)).is_err());
    assert!(Sha::from_bytes("commit", &[0u8; 19]).is_err());
    assert!(Sha::from_bytes("commit", &[0u8; 21]).is_err());
    assert!(Sha::from_bytes("commit", &[0u8; 20]).is_ok());
}
