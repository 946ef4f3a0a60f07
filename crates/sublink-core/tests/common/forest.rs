//! Synthetic depth-first forest
//!
//! Trees are described top-down (root first, main progenitor first) and
//! flattened with the SubLink numbering: each node's `SubhaloID` is its
//! depth-first position plus `ID_OFFSET`, so main branches and progenitor
//! subtrees are contiguous in both id and row space.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

use sublink_core::schema::mandatory_column_specs;
use sublink_core::store::SnapshotEntry;
use sublink_core::{
    Block, Column, ColumnSpec, ColumnValues, ScalarType, StoreConfig, StoreWriter, WriteStats,
    DESCENDANT_ID, LAST_PROGENITOR_ID, MAIN_LEAF_PROGENITOR_ID, ROOT_DESCENDANT_ID, SNAP_NUM,
    SUBHALO_ID,
};

/// Added to every depth-first position, so ids never equal rows
pub const ID_OFFSET: i64 = 7_000_000_000_000;

/// Latest snapshot of the synthetic simulation
pub const LAST_SNAPSHOT: u32 = 3;

/// Tree node before flattening
#[derive(Debug, Clone)]
pub struct HaloSpec {
    pub snap: i32,
    pub mass: f32,
    /// Main progenitor first
    pub progenitors: Vec<HaloSpec>,
}

pub fn halo(snap: i32, mass: f32, progenitors: Vec<HaloSpec>) -> HaloSpec {
    HaloSpec {
        snap,
        mass,
        progenitors,
    }
}

/// One flattened row
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub subhalo_id: i64,
    pub descendant_id: i64,
    pub root_descendant_id: i64,
    pub main_leaf_progenitor_id: i64,
    pub last_progenitor_id: i64,
    pub snap: i32,
    pub mass: f32,
    pub pos: [f32; 3],
    pub len: i32,
    pub global_row: i64,
}

/// A flattened forest split into shards, plus its snapshot lookup lists
#[derive(Debug, Clone)]
pub struct Forest {
    pub nodes: Vec<NodeRecord>,
    pub shards: Vec<Range<usize>>,
    /// Per snapshot, local id -> node index; `None` marks an entity with no tree
    pub lookup: BTreeMap<u32, Vec<Option<usize>>>,
}

fn flatten(
    spec: &HaloSpec,
    descendant_id: i64,
    root_id: Option<i64>,
    out: &mut Vec<NodeRecord>,
) -> (i64, i64) {
    let idx = out.len();
    let id = ID_OFFSET + idx as i64;
    let root = root_id.unwrap_or(id);
    out.push(NodeRecord {
        subhalo_id: id,
        descendant_id,
        root_descendant_id: root,
        main_leaf_progenitor_id: id,
        last_progenitor_id: id,
        snap: spec.snap,
        mass: spec.mass,
        pos: [idx as f32, spec.mass * 0.5, spec.snap as f32 - 0.25],
        len: (spec.mass * 100.0) as i32,
        global_row: idx as i64,
    });

    let mut main_leaf = id;
    let mut last = id;
    for (i, progenitor) in spec.progenitors.iter().enumerate() {
        let (leaf, sub_last) = flatten(progenitor, id, Some(root), out);
        if i == 0 {
            main_leaf = leaf;
        }
        last = sub_last;
    }
    out[idx].main_leaf_progenitor_id = main_leaf;
    out[idx].last_progenitor_id = last;
    (main_leaf, last)
}

impl Forest {
    /// Flatten `shards` (a list of trees per shard) and rank each snapshot's
    /// nodes by mass, heaviest first, followed by one no-tree entity.
    pub fn build(shards: Vec<Vec<HaloSpec>>) -> Self {
        let mut nodes = Vec::new();
        let mut ranges = Vec::new();
        for trees in &shards {
            let start = nodes.len();
            for tree in trees {
                flatten(tree, -1, None, &mut nodes);
            }
            ranges.push(start..nodes.len());
        }

        let mut lookup = BTreeMap::new();
        for snap in 0..=LAST_SNAPSHOT {
            let mut at_snap: Vec<usize> = (0..nodes.len())
                .filter(|&i| nodes[i].snap == snap as i32)
                .collect();
            at_snap.sort_by(|&a, &b| nodes[b].mass.total_cmp(&nodes[a].mass));
            let mut entries: Vec<Option<usize>> = at_snap.into_iter().map(Some).collect();
            entries.push(None);
            lookup.insert(snap, entries);
        }

        Self {
            nodes,
            shards: ranges,
            lookup,
        }
    }

    /// Five trees over three shards, covering branching, a skipped
    /// snapshot, a tree ending early and a single-node tree.
    pub fn standard() -> Self {
        let tree_a = halo(
            3,
            10.0,
            vec![
                halo(
                    2,
                    6.0,
                    vec![halo(1, 4.0, vec![halo(0, 2.0, vec![])]), halo(1, 1.5, vec![])],
                ),
                halo(2, 3.0, vec![halo(1, 2.5, vec![halo(0, 1.0, vec![])])]),
            ],
        );
        let tree_b = halo(
            3,
            8.0,
            vec![halo(2, 7.0, vec![halo(1, 5.0, vec![halo(0, 4.0, vec![])])])],
        );
        let tree_c = halo(3, 2.0, vec![]);
        let tree_d = halo(
            2,
            9.0,
            vec![
                halo(1, 5.0, vec![]),
                halo(1, 4.5, vec![]),
                halo(1, 0.5, vec![halo(0, 0.2, vec![])]),
            ],
        );
        let tree_e = halo(3, 6.0, vec![halo(1, 5.0, vec![halo(0, 3.0, vec![])])]);

        Self::build(vec![vec![tree_a, tree_b], vec![tree_c, tree_d], vec![tree_e]])
    }

    pub fn columns() -> Vec<ColumnSpec> {
        let mut columns = mandatory_column_specs();
        columns.push(ColumnSpec::scalar("SubhaloMass", ScalarType::Float32));
        columns.push(ColumnSpec::vector("SubhaloPos", ScalarType::Float32, 3));
        columns.push(ColumnSpec::scalar("SubhaloLen", ScalarType::Int32));
        columns
    }

    fn block(&self, range: Range<usize>) -> Block {
        let rows = &self.nodes[range];
        let ids = |f: fn(&NodeRecord) -> i64| Column::int64(rows.iter().map(f).collect());
        Block::from_columns([
            (SUBHALO_ID, ids(|n| n.subhalo_id)),
            (DESCENDANT_ID, ids(|n| n.descendant_id)),
            (ROOT_DESCENDANT_ID, ids(|n| n.root_descendant_id)),
            (MAIN_LEAF_PROGENITOR_ID, ids(|n| n.main_leaf_progenitor_id)),
            (LAST_PROGENITOR_ID, ids(|n| n.last_progenitor_id)),
            (SNAP_NUM, Column::int32(rows.iter().map(|n| n.snap).collect())),
            ("SubhaloMass", Column::float32(rows.iter().map(|n| n.mass).collect())),
            (
                "SubhaloPos",
                Column::new(
                    3,
                    ColumnValues::Float32(rows.iter().flat_map(|n| n.pos).collect()),
                )
                .unwrap(),
            ),
            ("SubhaloLen", Column::int32(rows.iter().map(|n| n.len).collect())),
        ])
        .unwrap()
    }

    /// Write the forest as a store at `root`.
    pub fn write_store(&self, root: &Path, config: &StoreConfig) -> WriteStats {
        let mut writer = StoreWriter::create(root, config, Self::columns()).unwrap();
        for range in &self.shards {
            writer.append_shard(&self.block(range.clone())).unwrap();
        }
        for (&snap, entries) in &self.lookup {
            let entries: Vec<SnapshotEntry> = entries
                .iter()
                .map(|entry| match entry {
                    Some(i) => SnapshotEntry::new(self.nodes[*i].global_row, self.nodes[*i].subhalo_id),
                    None => SnapshotEntry::no_tree(),
                })
                .collect();
            writer.write_snapshot(snap, &entries).unwrap();
        }
        writer.finish().unwrap()
    }

    /// Every (snapshot, local id) with a tree, and its node
    pub fn entities(&self) -> Vec<(u32, u64, &NodeRecord)> {
        let mut out = Vec::new();
        for (&snap, entries) in &self.lookup {
            for (local_id, entry) in entries.iter().enumerate() {
                if let Some(i) = entry {
                    out.push((snap, local_id as u64, &self.nodes[*i]));
                }
            }
        }
        out
    }

    /// Local id of the no-tree entity at `snap`
    pub fn no_tree_id(&self, snap: u32) -> u64 {
        (self.lookup[&snap].len() - 1) as u64
    }

    /// Local id of the node with this mass at `snap`
    pub fn local_id_of(&self, snap: u32, mass: f32) -> u64 {
        self.lookup[&snap]
            .iter()
            .position(|entry| entry.is_some_and(|i| self.nodes[i].mass == mass))
            .unwrap() as u64
    }

    pub fn node(&self, subhalo_id: i64) -> &NodeRecord {
        &self.nodes[(subhalo_id - ID_OFFSET) as usize]
    }

    /// Ids of the nodes that evolve directly into `subhalo_id`, in row order
    pub fn children_of(&self, subhalo_id: i64) -> Vec<i64> {
        self.nodes
            .iter()
            .filter(|n| n.descendant_id == subhalo_id)
            .map(|n| n.subhalo_id)
            .collect()
    }

    /// Ids from `subhalo_id` forward to its root
    pub fn descendants_of(&self, subhalo_id: i64) -> Vec<i64> {
        let mut path = vec![subhalo_id];
        let mut current = self.node(subhalo_id);
        while current.descendant_id != -1 {
            current = self.node(current.descendant_id);
            path.push(current.subhalo_id);
        }
        path
    }
}
