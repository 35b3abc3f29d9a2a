use crate::slice::{ImageMipArraySlice, ImageSliceState};

use ash::vk;

/// Points at the barrier that last brought a resource into a read state, so
/// that later reads can widen that barrier instead of adding a new one.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum BarrierRef {
    Pipeline(usize),
    Split(usize),
}

/// One partition of an image's extent together with its synchronization
/// bookkeeping during compilation.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TrackedSlice {
    pub state: ImageSliceState,
    /// Batch of the latest access. `None` while the region is untouched.
    pub batch: Option<usize>,
    pub read_barrier: Option<BarrierRef>,
    /// Index into the plan's first-use states when this region's first access
    /// is reconciled at execute time instead of being baked into the plan.
    pub first_ref: Option<usize>,
}

/// A piece of the previous partition that a new use overlaps. `state.slice`
/// is the overlapping region itself.
#[derive(Clone, Copy, Debug)]
pub(crate) struct OverlapPiece {
    pub state: ImageSliceState,
    pub batch: Option<usize>,
    pub read_barrier: Option<BarrierRef>,
    pub first_ref: Option<usize>,
}

/// Maintains the partition of one image's aspect/mip/layer extent into
/// tracked slices. The partition always covers the extent exactly once; it is
/// kept canonical (sorted by aspect, base mip, base layer, with adjacent
/// equal-state slices merged) so barrier emission is deterministic.
pub(crate) struct ImageUseTracker {
    full: ImageMipArraySlice,
    slices: Vec<TrackedSlice>,
}

impl ImageUseTracker {
    pub fn new(full: ImageMipArraySlice) -> Self {
        Self {
            full,
            slices: vec![TrackedSlice {
                state: ImageSliceState {
                    latest_access: Default::default(),
                    latest_layout: vk::ImageLayout::UNDEFINED,
                    slice: full,
                },
                batch: None,
                read_barrier: None,
                first_ref: None,
            }],
        }
    }

    pub fn slices(&self) -> &[TrackedSlice] {
        &self.slices
    }

    /// Removes the parts of the partition overlapping `slice` and returns
    /// them. The partition has a hole afterwards; the caller must fill it
    /// with [`ImageUseTracker::insert`] before the next cut.
    pub fn cut(&mut self, slice: ImageMipArraySlice) -> Vec<OverlapPiece> {
        let mut pieces = Vec::new();
        let mut index = 0;
        while index < self.slices.len() {
            let tracked = self.slices[index];
            if !tracked.state.slice.intersects(slice) {
                index += 1;
                continue;
            }
            let intersection = tracked.state.slice.intersect(slice);
            let (rests, rest_count) = tracked.state.slice.subtract(intersection);
            self.slices.remove(index);
            // The rests are disjoint from the cut slice, so appending them at
            // the end keeps this loop from revisiting them.
            for rest_index in 0..rest_count {
                let mut rest = tracked;
                rest.state.slice = rests[rest_index];
                self.slices.push(rest);
            }
            pieces.push(OverlapPiece {
                state: ImageSliceState {
                    slice: intersection,
                    ..tracked.state
                },
                batch: tracked.batch,
                read_barrier: tracked.read_barrier,
                first_ref: tracked.first_ref,
            });
        }
        pieces
    }

    /// Fills the hole left by [`ImageUseTracker::cut`] and re-canonicalizes.
    pub fn insert(&mut self, entries: impl IntoIterator<Item = TrackedSlice>) {
        self.slices.extend(entries);
        self.canonicalize();
    }

    fn canonicalize(&mut self) {
        // Merge until settled; a merge can enable further merges.
        loop {
            let mut merged_any = false;
            'outer: for first in 0..self.slices.len() {
                for second in (first + 1)..self.slices.len() {
                    if let Some(merged) = merge_tracked(&self.slices[first], &self.slices[second]) {
                        self.slices[first] = merged;
                        self.slices.remove(second);
                        merged_any = true;
                        break 'outer;
                    }
                }
            }
            if !merged_any {
                break;
            }
        }
        self.slices.sort_by_key(|tracked| {
            (
                tracked.state.slice.aspect_mask.as_raw(),
                tracked.state.slice.base_mip_level,
                tracked.state.slice.base_array_layer,
            )
        });

        #[cfg(debug_assertions)]
        self.check_partition();
    }

    #[cfg(debug_assertions)]
    fn check_partition(&self) {
        let area = |slice: &ImageMipArraySlice| {
            slice.aspect_mask.as_raw().count_ones() as u64
                * slice.level_count as u64
                * slice.layer_count as u64
        };
        let mut total = 0;
        for (index, tracked) in self.slices.iter().enumerate() {
            debug_assert!(
                self.full.contains(tracked.state.slice),
                "Tracked slice {:?} escapes the image extent {:?}!",
                tracked.state.slice,
                self.full
            );
            total += area(&tracked.state.slice);
            for other in &self.slices[index + 1..] {
                debug_assert!(
                    !tracked.state.slice.intersects(other.state.slice),
                    "Tracked slices {:?} and {:?} overlap!",
                    tracked.state.slice,
                    other.state.slice
                );
            }
        }
        debug_assert!(
            total == area(&self.full),
            "Tracked slices cover {} subresources, the image has {}!",
            total,
            area(&self.full)
        );
    }
}

/// Two tracked slices merge when their states and bookkeeping are identical
/// and their regions are adjacent along exactly one axis.
fn merge_tracked(a: &TrackedSlice, b: &TrackedSlice) -> Option<TrackedSlice> {
    if a.state.latest_access != b.state.latest_access
        || a.state.latest_layout != b.state.latest_layout
        || a.batch != b.batch
        || a.read_barrier != b.read_barrier
        || a.first_ref != b.first_ref
    {
        return None;
    }
    let sa = a.state.slice;
    let sb = b.state.slice;
    let same_aspect = sa.aspect_mask == sb.aspect_mask;
    let same_mips = sa.base_mip_level == sb.base_mip_level && sa.level_count == sb.level_count;
    let same_layers = sa.base_array_layer == sb.base_array_layer && sa.layer_count == sb.layer_count;

    let merged_slice = if same_aspect && same_layers && (sa.mip_end() == sb.base_mip_level || sb.mip_end() == sa.base_mip_level) {
        ImageMipArraySlice {
            base_mip_level: sa.base_mip_level.min(sb.base_mip_level),
            level_count: sa.level_count + sb.level_count,
            ..sa
        }
    } else if same_aspect && same_mips && (sa.layer_end() == sb.base_array_layer || sb.layer_end() == sa.base_array_layer) {
        ImageMipArraySlice {
            base_array_layer: sa.base_array_layer.min(sb.base_array_layer),
            layer_count: sa.layer_count + sb.layer_count,
            ..sa
        }
    } else if same_mips && same_layers && (sa.aspect_mask & sb.aspect_mask).is_empty() {
        ImageMipArraySlice {
            aspect_mask: sa.aspect_mask | sb.aspect_mask,
            ..sa
        }
    } else {
        return None;
    };

    let mut merged = *a;
    merged.state.slice = merged_slice;
    Some(merged)
}
