//! Test-only NAR encoder.

#![allow(dead_code)]

use nar_format::archive::NAR_VERSION_MAGIC;

#[derive(Debug, Clone)]
pub enum Entry {
    File { executable: bool, contents: Vec<u8> },
    Directory(Vec<(String, Entry)>),
    Symlink(String),
}

pub fn file(contents: &[u8]) -> Entry {
    Entry::File {
        executable: false,
        contents: contents.to_vec(),
    }
}

pub fn executable(contents: &[u8]) -> Entry {
    Entry::File {
        executable: true,
        contents: contents.to_vec(),
    }
}

pub fn symlink(target: &str) -> Entry {
    Entry::Symlink(target.to_string())
}

pub fn dir(entries: Vec<(&str, Entry)>) -> Entry {
    let mut entries: Vec<(String, Entry)> = entries
        .into_iter()
        .map(|(name, entry)| (name.to_string(), entry))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Entry::Directory(entries)
}

/// A small tree with every kind of entry, nested a few levels deep.
pub fn sample_tree() -> Entry {
    dir(vec![
        (
            "bin",
            dir(vec![
                ("hello", executable(b"#!/bin/sh\necho hello\n")),
                ("hi", symlink("hello")),
            ]),
        ),
        ("empty", file(b"")),
        (
            "share",
            dir(vec![(
                "doc",
                dir(vec![
                    ("README", file(b"read me, seven bytes past a boundary")),
                    ("nested", dir(vec![])),
                ]),
            )]),
        ),
        ("self", symlink("/nix/store/eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee-sample")),
    ])
}

pub fn encode(entry: &Entry) -> Vec<u8> {
    let mut out = vec![];
    push_str(&mut out, NAR_VERSION_MAGIC.as_bytes());
    encode_node(&mut out, entry);
    out
}

fn encode_node(out: &mut Vec<u8>, entry: &Entry) {
    push_str(out, b"(");
    push_str(out, b"type");
    match entry {
        Entry::File {
            executable,
            contents,
        } => {
            push_str(out, b"regular");
            if *executable {
                push_str(out, b"executable");
                push_str(out, b"");
            }
            push_str(out, b"contents");
            push_str(out, contents);
        }
        Entry::Directory(entries) => {
            push_str(out, b"directory");
            for (name, child) in entries {
                push_str(out, b"entry");
                push_str(out, b"(");
                push_str(out, b"name");
                push_str(out, name.as_bytes());
                push_str(out, b"node");
                encode_node(out, child);
                push_str(out, b")");
            }
        }
        Entry::Symlink(target) => {
            push_str(out, b"symlink");
            push_str(out, b"target");
            push_str(out, target.as_bytes());
        }
    }
    push_str(out, b")");
}

fn push_str(out: &mut Vec<u8>, s: &[u8]) {
    out.extend_from_slice(&(s.len() as u64).to_le_bytes());
    out.extend_from_slice(s);
    out.resize(out.len() + (8 - s.len() % 8) % 8, 0);
}

/// Every path in `entry`, with the entry found there, parents first.
pub fn walk(entry: &Entry) -> Vec<(String, Entry)> {
    let mut out = vec![];
    walk_inner(entry, String::new(), &mut out);
    out
}

fn walk_inner(entry: &Entry, path: String, out: &mut Vec<(String, Entry)>) {
    out.push((
        if path.is_empty() {
            "/".to_string()
        } else {
            path.clone()
        },
        entry.clone(),
    ));
    if let Entry::Directory(entries) = entry {
        for (name, child) in entries {
            walk_inner(child, format!("{}/{}", path, name), out);
        }
    }
}
