//! The patch quadtree of one surface.
//!
//! Patches live in an arena addressed by [`PatchKey`]. Only leaves carry
//! neighbour sets; a split hands the parent's sets to its children and a
//! merge folds the children's sets back into the parent, so that across the
//! whole tree neighbour sets stay mutually consistent and adjacent leaves
//! never differ by more than one level.

use std::f64::consts::FRAC_1_SQRT_2;

use glam::DVec3;
use orrery_config::{LodConfig, MAX_PATCH_LOD, MAX_TESSELLATION_LEVEL};
use orrery_debug::{Diagnostic, DiagnosticKind, DiagnosticSink};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::{CullingFrustum, LodPolicy, Patch, PatchId, PatchKey, Quadrant, Side, Surface};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LodError {
    #[error("no live patch for key {0:?}")]
    UnknownPatch(PatchKey),

    #[error("patch {0} is not a leaf")]
    NotALeaf(PatchId),

    #[error("patch {0} is already at the deepest level")]
    MaxLod(PatchId),

    #[error("patch {0} has no children to merge")]
    NoChildren(PatchId),

    #[error("children of patch {0} are not all leaves")]
    ChildrenNotLeaves(PatchId),

    #[error("merging patch {0} would leave a neighbour two levels finer")]
    WouldUnbalance(PatchId),
}

/// Camera as seen from the surface, in body-local metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchView {
    pub camera: DVec3,
    /// Height of the camera above the surface, used as a lower bound on
    /// patch distances.
    pub altitude: f64,
    /// Angular size of a pixel, radians.
    pub pixel_size: f64,
}

/// Disjoint decisions of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LodUpdate {
    pub to_split: Vec<PatchId>,
    pub to_merge: Vec<PatchId>,
    pub to_show: Vec<PatchId>,
    pub to_remove: Vec<PatchId>,
    /// Splits postponed because the patch is not ready to be replaced.
    pub deferred: u32,
}

impl LodUpdate {
    pub fn is_empty(&self) -> bool {
        self.to_split.is_empty()
            && self.to_merge.is_empty()
            && self.to_show.is_empty()
            && self.to_remove.is_empty()
    }
}

/// What [`LodQuadtree::apply`] changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LodChanges {
    pub split: Vec<PatchId>,
    pub merged: Vec<PatchId>,
    pub created: Vec<PatchKey>,
    pub destroyed: Vec<PatchId>,
    pub shown: Vec<PatchKey>,
    pub hidden: Vec<PatchKey>,
    /// Patches whose outer tessellation changed and need a new mesh.
    pub refresh: Vec<PatchKey>,
    /// Splits made only to keep neighbours within one level.
    pub forced_splits: u32,
}

#[derive(Debug)]
pub struct LodQuadtree {
    surface: Surface,
    patches: Vec<Option<Patch>>,
    free: Vec<u32>,
    roots: Vec<PatchKey>,
    by_id: FxHashMap<PatchId, PatchKey>,
    max_level: u32,
    max_lod: u8,
    refresh: FxHashSet<PatchKey>,
    sink: DiagnosticSink,
}

impl LodQuadtree {
    /// Create the root patches of `surface` and link them across their edges.
    pub fn new(surface: Surface, config: &LodConfig, sink: DiagnosticSink) -> Self {
        let mut tree = Self {
            surface,
            patches: Vec::new(),
            free: Vec::new(),
            roots: Vec::new(),
            by_id: FxHashMap::default(),
            max_level: config.max_level.min(MAX_TESSELLATION_LEVEL),
            max_lod: config.max_lod.min(MAX_PATCH_LOD),
            refresh: FxHashSet::default(),
            sink,
        };

        for face in 0..surface.root_count() {
            let key = tree.alloc(PatchId::root(face), None);
            tree.roots.push(key);
        }
        for face in 0..surface.root_count() {
            let key = tree.roots[face as usize];
            for side in Side::ALL {
                if let Some(link) = surface.link(face, side)
                    && let Some(other) = tree.roots.get(link.face as usize).copied()
                    && let Ok(root) = tree.patch_mut(key)
                {
                    root.neighbours[side.index()].push(other);
                }
            }
        }
        for key in tree.roots.clone() {
            tree.calc_outer_tessellation_level(key);
        }
        tree.refresh.clear();
        tree
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    pub fn roots(&self) -> &[PatchKey] {
        &self.roots
    }

    pub fn get(&self, key: PatchKey) -> Option<&Patch> {
        self.patches.get(key.index()).and_then(Option::as_ref)
    }

    pub fn find(&self, id: PatchId) -> Option<PatchKey> {
        self.by_id.get(&id).copied()
    }

    /// Number of live patches, leaves and interior nodes.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PatchKey, &Patch)> {
        self.patches
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (PatchKey(i as u32), p)))
    }

    pub fn leaves(&self) -> impl Iterator<Item = (PatchKey, &Patch)> {
        self.iter().filter(|(_, p)| p.is_leaf())
    }

    pub fn shown(&self) -> impl Iterator<Item = (PatchKey, &Patch)> {
        self.leaves().filter(|(_, p)| p.shown)
    }

    pub fn set_instance_ready(&mut self, key: PatchKey, ready: bool) {
        if let Some(p) = self.patches.get_mut(key.index()).and_then(Option::as_mut) {
            p.instance_ready = ready;
        }
    }

    /// Record the height range of a patch once its data is known.
    pub fn set_height_range(&mut self, key: PatchKey, min: f64, max: f64) {
        let surface = self.surface;
        if let Some(p) = self.patches.get_mut(key.index()).and_then(Option::as_mut) {
            p.min_height = min;
            p.max_height = max;
            p.geometry = surface.geometry(p.id, min, max);
        }
    }

    /// Leaf containing the face point `(x, y)` of root `face`.
    pub fn leaf_at(&self, face: u8, x: f64, y: f64) -> Option<PatchKey> {
        let mut key = *self.roots.get(face as usize)?;
        loop {
            let patch = self.get(key)?;
            let Some(children) = patch.children else {
                return Some(key);
            };
            let r = patch.rect();
            let right = x >= (r.x0 + r.x1) * 0.5;
            let top = y >= (r.y0 + r.y1) * 0.5;
            let quadrant = match (right, top) {
                (false, false) => Quadrant::BottomLeft,
                (true, false) => Quadrant::BottomRight,
                (true, true) => Quadrant::TopRight,
                (false, true) => Quadrant::TopLeft,
            };
            key = children[quadrant as usize];
        }
    }

    // -- evaluation ---------------------------------------------------------

    /// Refresh distances and visibility and collect this frame's decisions.
    pub fn update(
        &mut self,
        view: &PatchView,
        culling: &dyn CullingFrustum,
        policy: &dyn LodPolicy,
    ) -> LodUpdate {
        let mut out = LodUpdate::default();
        let mut stack: Vec<PatchKey> = self.roots.clone();
        let max_lod = self.max_lod;

        while let Some(key) = stack.pop() {
            let (distance, apparent_size) = {
                let Ok(patch) = self.patch_mut(key) else { continue };
                let g = patch.geometry;
                let distance = ((g.center - view.camera).length() - g.length * FRAC_1_SQRT_2)
                    .max(view.altitude);
                let apparent_size = if distance > 0.0 {
                    g.length / (distance * view.pixel_size)
                } else {
                    f64::INFINITY
                };
                patch.distance = distance;
                patch.apparent_size = apparent_size;
                patch.visible = culling.is_bb_in_view(&g.bbox, g.normal, g.offset);
                (distance, apparent_size)
            };

            let Some(patch) = self.get(key) else { continue };
            match patch.children {
                None => {
                    let wants_split =
                        patch.lod() < max_lod && policy.should_split(patch, apparent_size, distance);
                    if wants_split && patch.instance_ready {
                        out.to_split.push(patch.id);
                        continue;
                    }
                    if wants_split {
                        trace!(patch = %patch.id, "split deferred until instance is ready");
                        out.deferred += 1;
                    }
                    if policy.should_remove(patch, apparent_size, distance) {
                        out.to_remove.push(patch.id);
                    } else if policy.should_instanciate(patch, apparent_size, distance) {
                        out.to_show.push(patch.id);
                    }
                }
                Some(children) => {
                    let all_leaves = children
                        .iter()
                        .all(|c| self.get(*c).is_some_and(Patch::is_leaf));
                    if all_leaves && policy.should_merge(patch, apparent_size, distance) {
                        out.to_merge.push(patch.id);
                    } else {
                        stack.extend(children);
                    }
                }
            }
        }
        out
    }

    /// Carry out an evaluation: merges, then splits largest first, then
    /// visibility changes.
    pub fn apply(&mut self, mut update: LodUpdate) -> LodChanges {
        let mut changes = LodChanges::default();

        for id in &update.to_merge {
            let Some(key) = self.find(*id) else { continue };
            match self.merge_into(key, &mut changes) {
                Ok(()) => {}
                Err(err) => trace!(patch = %id, %err, "merge postponed"),
            }
        }

        update.to_split.sort_by(|a, b| {
            let size = |id: &PatchId| {
                self.find(*id)
                    .and_then(|k| self.get(k))
                    .map_or(0.0, |p| p.apparent_size)
            };
            size(b).total_cmp(&size(a))
        });
        for id in &update.to_split {
            let Some(key) = self.find(*id) else { continue };
            if self.get(key).is_some_and(Patch::is_leaf) {
                if let Err(err) = self.split_balanced(key, &mut changes) {
                    trace!(patch = %id, %err, "split skipped");
                }
            }
        }

        for id in &update.to_show {
            if let Some(key) = self.find(*id)
                && let Some(p) = self.patches[key.index()].as_mut()
                && p.is_leaf()
                && !p.shown
            {
                p.shown = true;
                changes.shown.push(key);
            }
        }
        for id in &update.to_remove {
            if let Some(key) = self.find(*id)
                && let Some(p) = self.patches[key.index()].as_mut()
                && p.shown
            {
                p.shown = false;
                changes.hidden.push(key);
            }
        }

        self.rebalance(&mut changes);

        let mut refresh: Vec<PatchKey> = self
            .refresh
            .drain()
            .filter(|k| self.patches.get(k.index()).is_some_and(Option::is_some))
            .collect();
        refresh.sort_unstable();
        changes.refresh = refresh;

        if !changes.split.is_empty() || !changes.merged.is_empty() {
            debug!(
                split = changes.split.len(),
                merged = changes.merged.len(),
                forced = changes.forced_splits,
                patches = self.len(),
                "quadtree changed"
            );
        }
        changes
    }

    // -- structural edits ---------------------------------------------------

    /// Split a leaf, first splitting any coarser neighbour so that the new
    /// children stay within one level of everything they touch.
    pub fn split(&mut self, key: PatchKey) -> Result<LodChanges, LodError> {
        let mut changes = LodChanges::default();
        self.split_balanced(key, &mut changes)?;
        Ok(changes)
    }

    /// Merge the four leaf children of `key` back into it.
    pub fn merge(&mut self, key: PatchKey) -> Result<LodChanges, LodError> {
        let mut changes = LodChanges::default();
        self.merge_into(key, &mut changes)?;
        Ok(changes)
    }

    fn split_balanced(&mut self, key: PatchKey, changes: &mut LodChanges) -> Result<(), LodError> {
        let lod = self.patch(key)?.lod();
        if !self.patch(key)?.is_leaf() {
            return Err(LodError::NotALeaf(self.patch(key)?.id));
        }
        if lod >= self.max_lod {
            return Err(LodError::MaxLod(self.patch(key)?.id));
        }
        while let Some(coarser) = self.coarser_neighbour(key, lod) {
            self.split_balanced(coarser, changes)?;
            changes.forced_splits += 1;
        }
        self.split_leaf(key, changes)
    }

    fn coarser_neighbour(&self, key: PatchKey, lod: u8) -> Option<PatchKey> {
        let patch = self.get(key)?;
        patch
            .neighbours
            .iter()
            .flatten()
            .copied()
            .find(|q| self.get(*q).is_some_and(|q| q.lod() < lod))
    }

    fn split_leaf(&mut self, key: PatchKey, changes: &mut LodChanges) -> Result<(), LodError> {
        let (id, was_shown) = {
            let p = self.patch(key)?;
            (p.id, p.shown)
        };
        let parent_neighbours = std::mem::take(&mut self.patch_mut(key)?.neighbours);

        let [bl, br, tr, tl] = Quadrant::ALL.map(|q| self.alloc(id.child(q), Some(key)));
        let inherit = |side: Side| parent_neighbours[side.index()].clone();
        let assign = [
            (tl, [inherit(Side::North), vec![tr], vec![bl], inherit(Side::West)]),
            (tr, [inherit(Side::North), inherit(Side::East), vec![br], vec![tl]]),
            (br, [vec![tr], inherit(Side::East), inherit(Side::South), vec![bl]]),
            (bl, [vec![tl], vec![br], inherit(Side::South), inherit(Side::West)]),
        ];
        for (child, sets) in assign {
            let c = self.patch_mut(child)?;
            c.neighbours = sets;
            c.shown = was_shown;
            c.instance_ready = false;
        }
        let children = [bl, br, tr, tl];
        {
            let p = self.patch_mut(key)?;
            p.children = Some(children);
            p.shown = false;
        }

        let mut touched: Vec<PatchKey> = Vec::new();
        for side in Side::ALL {
            let pair = Quadrant::bordering(side).map(|q| children[q as usize]);
            for &q in &parent_neighbours[side.index()] {
                let facing = self.facing_side(id, side, q);
                let list = &mut self.patch_mut(q)?.neighbours[facing.index()];
                list.retain(|k| *k != key);
                for c in pair {
                    if !list.contains(&c) {
                        list.push(c);
                    }
                }
                if !touched.contains(&q) {
                    touched.push(q);
                }
            }
        }

        for &c in children.iter().chain(&touched) {
            self.remove_detached_neighbours(c);
        }
        for &c in &children {
            self.calc_outer_tessellation_level(c);
            self.refresh.remove(&c);
        }
        for &q in &touched {
            self.calc_outer_tessellation_level(q);
        }

        trace!(patch = %id, "split");
        changes.split.push(id);
        changes.created.extend(children);
        if was_shown {
            changes.hidden.push(key);
            changes.shown.extend(children);
        }
        Ok(())
    }

    fn merge_into(&mut self, key: PatchKey, changes: &mut LodChanges) -> Result<(), LodError> {
        let p = self.patch(key)?;
        let id = p.id;
        let children = p.children.ok_or(LodError::NoChildren(id))?;
        for &c in &children {
            if !self.patch(c)?.is_leaf() {
                return Err(LodError::ChildrenNotLeaves(id));
            }
        }
        for &c in &children {
            let child = self.patch(c)?;
            let finer = child
                .neighbours
                .iter()
                .flatten()
                .any(|q| self.get(*q).is_some_and(|q| q.lod() > child.lod()));
            if finer {
                return Err(LodError::WouldUnbalance(id));
            }
        }

        let mut merged: [Vec<PatchKey>; 4] = Default::default();
        for side in Side::ALL {
            let set = &mut merged[side.index()];
            for q in Quadrant::bordering(side) {
                for &n in self.patch(children[q as usize])?.neighbours(side) {
                    if !children.contains(&n) && !set.contains(&n) {
                        set.push(n);
                    }
                }
            }
        }

        let mut touched: Vec<PatchKey> = Vec::new();
        for side in Side::ALL {
            for &q in &merged[side.index()] {
                let facing = self.facing_side(id, side, q);
                let list = &mut self.patch_mut(q)?.neighbours[facing.index()];
                list.retain(|k| !children.contains(k));
                if !list.contains(&key) {
                    list.push(key);
                }
                if !touched.contains(&q) {
                    touched.push(q);
                }
            }
        }

        let mut was_shown = false;
        for c in children {
            if let Some(child) = self.free(c) {
                was_shown |= child.shown;
                changes.destroyed.push(child.id);
            }
            changes.shown.retain(|k| *k != c);
            changes.hidden.retain(|k| *k != c);
            changes.created.retain(|k| *k != c);
        }
        {
            let p = self.patch_mut(key)?;
            p.children = None;
            p.neighbours = merged;
            p.shown = was_shown;
        }
        if was_shown {
            changes.shown.push(key);
        }

        self.calc_outer_tessellation_level(key);
        for q in touched {
            self.calc_outer_tessellation_level(q);
        }
        trace!(patch = %id, "merged");
        changes.merged.push(id);
        Ok(())
    }

    /// Force splits until no leaf touches a neighbour two levels coarser.
    fn rebalance(&mut self, changes: &mut LodChanges) {
        loop {
            let violation = self.leaves().find_map(|(key, p)| {
                p.neighbours
                    .iter()
                    .flatten()
                    .copied()
                    .find(|q| self.get(*q).is_some_and(|q| q.lod() + 1 < p.lod()))
                    .map(|q| (key, q))
            });
            let Some((fine, coarse)) = violation else { break };
            if let (Some(f), Some(c)) = (self.get(fine), self.get(coarse)) {
                self.sink.report(Diagnostic::new(
                    DiagnosticKind::UnbalancedNeighbours,
                    f.id.subject(),
                    format!("neighbour {} is {} levels coarser", c.id, f.lod() - c.lod()),
                ));
            }
            if self.split_balanced(coarse, changes).is_err() {
                break;
            }
            changes.forced_splits += 1;
        }
    }

    // -- neighbour bookkeeping ----------------------------------------------

    /// The side of `other` that faces side `side` of `from`.
    fn facing_side(&self, from: PatchId, side: Side, other: PatchKey) -> Side {
        match self.get(other) {
            Some(q) if q.id.face != from.face => self
                .surface
                .link(from.face, side)
                .map_or(side.opposite(), |link| link.side),
            _ => side.opposite(),
        }
    }

    /// Drop neighbours whose shared edge no longer overlaps this patch's.
    fn remove_detached_neighbours(&mut self, key: PatchKey) {
        let Some(patch) = self.get(key) else { return };
        let id = patch.id;
        let rect = patch.rect();
        let mut keep: [Vec<PatchKey>; 4] = Default::default();
        for side in Side::ALL {
            let (a0, a1) = rect.span(side);
            for &q in patch.neighbours(side) {
                let Some(other) = self.get(q) else { continue };
                let (b0, b1) = if other.id.face == id.face {
                    other.rect().span(side.opposite())
                } else {
                    match self.surface.link(id.face, side) {
                        Some(link) => {
                            let (s0, s1) = other.rect().span(link.side);
                            if link.flipped { (1.0 - s1, 1.0 - s0) } else { (s0, s1) }
                        }
                        None => continue,
                    }
                };
                if a0.max(b0) < a1.min(b1) {
                    keep[side.index()].push(q);
                }
            }
        }
        if let Ok(p) = self.patch_mut(key) {
            p.neighbours = keep;
        }
    }

    /// Recompute the outer tessellation levels; queue a refresh on change.
    fn calc_outer_tessellation_level(&mut self, key: PatchKey) {
        let Some(patch) = self.get(key) else { return };
        let mut outer = [0u32; 4];
        for side in Side::ALL {
            outer[side.index()] = self.outer_level_for(patch, side);
        }
        if patch.outer != outer
            && let Ok(p) = self.patch_mut(key)
        {
            p.outer = outer;
            self.refresh.insert(key);
        }
    }

    /// `2^max(0, max_level - Δ)` with `Δ` the level gap to the coarsest
    /// neighbour on `side`.
    fn outer_level_for(&self, patch: &Patch, side: Side) -> u32 {
        let coarsest = patch
            .neighbours(side)
            .iter()
            .filter_map(|q| self.get(*q).map(Patch::lod))
            .min();
        let delta = coarsest.map_or(0, |lod| patch.lod().saturating_sub(lod) as u32);
        1 << self.max_level.saturating_sub(delta)
    }

    /// Every violation of the neighbour and tessellation invariants.
    pub fn check_consistency(&self) -> Vec<Diagnostic> {
        let mut found = Vec::new();
        for (key, p) in self.leaves() {
            for side in Side::ALL {
                for &q in p.neighbours(side) {
                    let Some(other) = self.get(q) else {
                        found.push(Diagnostic::new(
                            DiagnosticKind::AsymmetricNeighbours,
                            p.id.subject(),
                            format!("{side:?} neighbour {q:?} is gone"),
                        ));
                        continue;
                    };
                    if p.lod().abs_diff(other.lod()) > 1 {
                        found.push(Diagnostic::new(
                            DiagnosticKind::UnbalancedNeighbours,
                            p.id.subject(),
                            format!("{side:?} neighbour {} differs by more than one level", other.id),
                        ));
                    }
                    let facing = self.facing_side(p.id, side, q);
                    if !other.neighbours(facing).contains(&key) {
                        found.push(Diagnostic::new(
                            DiagnosticKind::AsymmetricNeighbours,
                            p.id.subject(),
                            format!("{side:?} neighbour {} does not list it back", other.id),
                        ));
                    }
                }
                if p.outer_level(side) != self.outer_level_for(p, side) {
                    found.push(Diagnostic::new(
                        DiagnosticKind::UnbalancedNeighbours,
                        p.id.subject(),
                        format!("stale {side:?} tessellation level"),
                    ));
                }
            }
        }
        found
    }

    // -- arena --------------------------------------------------------------

    fn alloc(&mut self, id: PatchId, parent: Option<PatchKey>) -> PatchKey {
        let geometry = self.surface.geometry(id, 0.0, 0.0);
        let patch = Patch::new(id, parent, geometry);
        let key = match self.free.pop() {
            Some(index) => {
                self.patches[index as usize] = Some(patch);
                PatchKey(index)
            }
            None => {
                self.patches.push(Some(patch));
                PatchKey(self.patches.len() as u32 - 1)
            }
        };
        self.by_id.insert(id, key);
        key
    }

    fn free(&mut self, key: PatchKey) -> Option<Patch> {
        let patch = self.patches.get_mut(key.index())?.take()?;
        self.by_id.remove(&patch.id);
        self.refresh.remove(&key);
        self.free.push(key.0);
        Some(patch)
    }

    fn patch(&self, key: PatchKey) -> Result<&Patch, LodError> {
        self.get(key).ok_or(LodError::UnknownPatch(key))
    }

    fn patch_mut(&mut self, key: PatchKey) -> Result<&mut Patch, LodError> {
        self.patches
            .get_mut(key.index())
            .and_then(Option::as_mut)
            .ok_or(LodError::UnknownPatch(key))
    }
}
