// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn uuid_gen_creates_unique_ids() {
    let id_gen = UuidIdGen::default();
    let id1 = id_gen.next();
    let id2 = id_gen.next();
    assert_ne!(id1, id2);
    assert_eq!(id1.as_str().len(), 36);
}

#[test]
fn uuid_gen_prefixes_node_name() {
    let id_gen = UuidIdGen::for_node("node-a");
    let id = id_gen.next();
    assert!(id.as_str().starts_with("node-a/"), "got {}", id);
}

#[test]
fn sequential_gen_is_cloneable_and_shared() {
    let id_gen1 = SequentialIdGen::new("cp");
    let id_gen2 = id_gen1.clone();
    assert_eq!(id_gen1.next().as_str(), "cp-1");
    assert_eq!(id_gen2.next().as_str(), "cp-2");
    assert_eq!(id_gen1.next().as_str(), "cp-3");
}
