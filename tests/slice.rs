use lattice::slice::ImageMipArraySlice;

use ash::vk;

fn slice(base_mip: u32, mips: u32, base_layer: u32, layers: u32) -> ImageMipArraySlice {
    ImageMipArraySlice {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: base_mip,
        level_count: mips,
        base_array_layer: base_layer,
        layer_count: layers,
    }
}

fn area(slice: &ImageMipArraySlice) -> u64 {
    slice.aspect_mask.as_raw().count_ones() as u64
        * slice.level_count as u64
        * slice.layer_count as u64
}

#[test]
fn contains_and_intersects() {
    let full = slice(0, 4, 0, 4);
    let inner = slice(1, 2, 1, 2);
    assert!(full.contains(inner));
    assert!(!inner.contains(full));
    assert!(full.intersects(inner));

    let left = slice(0, 2, 0, 4);
    let right = slice(2, 2, 0, 4);
    assert!(!left.intersects(right));
    assert!(left.intersects(slice(1, 2, 0, 1)));
}

#[test]
fn disjoint_aspects_do_not_intersect() {
    let depth = ImageMipArraySlice {
        aspect_mask: vk::ImageAspectFlags::DEPTH,
        ..slice(0, 1, 0, 1)
    };
    let stencil = ImageMipArraySlice {
        aspect_mask: vk::ImageAspectFlags::STENCIL,
        ..slice(0, 1, 0, 1)
    };
    assert!(!depth.intersects(stencil));
    assert!(depth.intersect(stencil).is_empty());
}

#[test]
fn intersect_clamps_to_overlap() {
    let a = slice(0, 3, 0, 2);
    let b = slice(1, 3, 1, 2);
    let overlap = a.intersect(b);
    assert_eq!(overlap, slice(1, 2, 1, 1));
}

#[test]
fn subtract_disjoint_returns_self() {
    let a = slice(0, 2, 0, 2);
    let b = slice(2, 1, 0, 2);
    let (rests, count) = a.subtract(b);
    assert_eq!(count, 1);
    assert_eq!(rests[0], a);
}

#[test]
fn subtract_interior_mip_splits_in_two() {
    let a = slice(0, 3, 0, 1);
    let b = slice(1, 1, 0, 1);
    let (rests, count) = a.subtract(b);
    assert_eq!(count, 2);
    assert_eq!(rests[0], slice(0, 1, 0, 1));
    assert_eq!(rests[1], slice(2, 1, 0, 1));
}

#[test]
fn subtract_corner_preserves_area_and_disjointness() {
    let a = slice(0, 2, 0, 2);
    let b = slice(0, 1, 0, 1);
    let (rests, count) = a.subtract(b);
    let rests = &rests[..count];

    let rest_area: u64 = rests.iter().map(area).sum();
    assert_eq!(rest_area + area(&b), area(&a));
    for (index, rest) in rests.iter().enumerate() {
        assert!(!rest.intersects(b));
        assert!(a.contains(*rest));
        for other in &rests[index + 1..] {
            assert!(!rest.intersects(*other));
        }
    }
}

#[test]
fn subtract_aspect_leaves_other_aspect() {
    let depth_stencil = ImageMipArraySlice {
        aspect_mask: vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
        ..slice(0, 2, 0, 2)
    };
    let depth = ImageMipArraySlice {
        aspect_mask: vk::ImageAspectFlags::DEPTH,
        ..slice(0, 2, 0, 2)
    };
    let (rests, count) = depth_stencil.subtract(depth);
    assert_eq!(count, 1);
    assert_eq!(rests[0].aspect_mask, vk::ImageAspectFlags::STENCIL);
    assert_eq!(rests[0].level_count, 2);
    assert_eq!(rests[0].layer_count, 2);
}

#[test]
fn bounding_union_covers_both() {
    let a = slice(0, 1, 0, 1);
    let b = slice(2, 1, 1, 2);
    let union = a.bounding_union(b);
    assert!(union.contains(a));
    assert!(union.contains(b));
    assert_eq!(union, slice(0, 3, 0, 3));
}
