// Radius-limited visibility scan on a single z-plane.
//
// Sight floods outward from an origin through transparent voxels, restricted
// to a Euclidean radius. Opaque voxels are visible when reached but do not
// pass sight onward, so a contiguous barrier shadows everything behind it.
// The origin always projects outward even when its own voxel is opaque (an
// actor standing in a doorway still sees the corridor).
//
// The same scan shapes light-source falloff: a brazier's tight and wide rings
// are the visible discs at the two vision-boost radii, so light stops at
// walls exactly where sight does.
//
// See also: `world.rs` for the per-voxel `transparent` flag (effects may have
// overridden the catalog default), `sim.rs` for `update_fov`.

use crate::types::VoxelCoord;
use crate::world::VoxelWorld;
use std::collections::VecDeque;

/// Compute the visible bitmap for one z-plane, indexed by `x * height + y`.
/// An out-of-bounds origin or negative radius sees nothing.
pub fn visible_plane(
    world: &VoxelWorld,
    z: i32,
    origin: (i32, i32),
    radius: i32,
) -> Vec<bool> {
    let w = world.width as usize;
    let h = world.height as usize;
    let mut seen = vec![false; w * h];
    let (ox, oy) = origin;
    let start = VoxelCoord::new(z, ox, oy);
    if !world.in_bounds(start) || radius < 0 {
        return seen;
    }
    let r2 = radius * radius;
    let mut queue = VecDeque::new();
    seen[plane_index(world, ox, oy)] = true;
    queue.push_back(start);
    while let Some(coord) = queue.pop_front() {
        if coord != start && !world.is_transparent(coord) {
            continue;
        }
        for n in coord.plane_neighbors8() {
            if !world.in_bounds(n) {
                continue;
            }
            let (dx, dy) = (n.x - ox, n.y - oy);
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let idx = plane_index(world, n.x, n.y);
            if !seen[idx] {
                seen[idx] = true;
                queue.push_back(n);
            }
        }
    }
    seen
}

/// The visible voxels of one z-plane in ascending coordinate order.
pub fn visible_coords(
    world: &VoxelWorld,
    z: i32,
    origin: (i32, i32),
    radius: i32,
) -> Vec<VoxelCoord> {
    let plane = visible_plane(world, z, origin, radius);
    let mut out = Vec::new();
    for x in 0..world.width as i32 {
        for y in 0..world.height as i32 {
            if plane[plane_index(world, x, y)] {
                out.push(VoxelCoord::new(z, x, y));
            }
        }
    }
    out
}

fn plane_index(world: &VoxelWorld, x: i32, y: i32) -> usize {
    x as usize * world.height as usize + y as usize
}
