//! Recursive cost bisection of spatial regions

use tessera_core::{Axis, Region};
use tessera_interfaces::CostEstimator;

/// Cost proportional to area
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformCost;

impl CostEstimator for UniformCost {
    fn estimate(&self, region: &Region) -> f64 {
        region.area() as f64
    }
}

/// Per-cell cost grid over a bounding region.
///
/// Region costs come from a summed-area table, so each estimate is O(1).
#[derive(Debug, Clone)]
pub struct DensityMap {
    bounds: Region,
    // (width + 1) * (height + 1) prefix sums
    table: Vec<f64>,
}

impl DensityMap {
    /// Build from row-major cell costs covering `bounds`.
    ///
    /// Returns `None` when the number of costs does not match the area.
    pub fn new(bounds: Region, costs: &[f64]) -> Option<Self> {
        if costs.len() as u64 != bounds.area() {
            return None;
        }
        let w = bounds.width as usize;
        let h = bounds.height as usize;
        let stride = w + 1;
        let mut table = vec![0.0; stride * (h + 1)];
        for row in 0..h {
            let mut row_sum = 0.0;
            for col in 0..w {
                row_sum += costs[row * w + col].max(0.0);
                table[(row + 1) * stride + col + 1] = table[row * stride + col + 1] + row_sum;
            }
        }
        Some(Self { bounds, table })
    }

    pub fn bounds(&self) -> Region {
        self.bounds
    }

    fn prefix(&self, col: u32, row: u32) -> f64 {
        let stride = self.bounds.width as usize + 1;
        self.table[row as usize * stride + col as usize]
    }
}

impl CostEstimator for DensityMap {
    fn estimate(&self, region: &Region) -> f64 {
        let b = &self.bounds;
        let x0 = region.x.clamp(b.x, b.right()) - b.x;
        let y0 = region.y.clamp(b.y, b.bottom()) - b.y;
        let x1 = region.right().clamp(b.x, b.right()) - b.x;
        let y1 = region.bottom().clamp(b.y, b.bottom()) - b.y;
        if x1 <= x0 || y1 <= y0 {
            return 0.0;
        }
        self.prefix(x1, y1) - self.prefix(x0, y1) - self.prefix(x1, y0) + self.prefix(x0, y0)
    }
}

fn sanitize(cost: f64) -> f64 {
    if cost.is_finite() {
        cost.max(0.0)
    } else {
        0.0
    }
}

/// Best balanced split of `region`, trying the longer axis first
fn best_split(region: &Region, estimator: &dyn CostEstimator) -> Option<(Region, f64, Region, f64)> {
    let primary = region.longer_axis();
    let secondary = match primary {
        Axis::X => Axis::Y,
        Axis::Y => Axis::X,
    };

    for axis in [primary, secondary] {
        let extent = region.extent(axis);
        if extent < 2 {
            continue;
        }
        let mid = extent / 2;
        let mut best: Option<(f64, u32, Region, f64, Region, f64)> = None;
        for offset in 1..extent {
            let Some((a, b)) = region.split(axis, offset) else {
                continue;
            };
            let cost_a = sanitize(estimator.estimate(&a));
            let cost_b = sanitize(estimator.estimate(&b));
            let imbalance = (cost_a - cost_b).abs();
            let distance = offset.abs_diff(mid);
            let better = match &best {
                None => true,
                Some((best_imbalance, best_distance, ..)) => {
                    imbalance < *best_imbalance
                        || (imbalance == *best_imbalance && distance < *best_distance)
                }
            };
            if better {
                best = Some((imbalance, distance, a, cost_a, b, cost_b));
            }
        }
        if let Some((_, _, a, cost_a, b, cost_b)) = best {
            return Some((a, cost_a, b, cost_b));
        }
    }
    None
}

/// Split `bounds` into at most `target` regions of balanced cost.
///
/// The most expensive splittable region is bisected until `target` regions
/// exist or nothing can be split further. Returned regions are ordered
/// row-major by their top-left corner and paired with their estimated cost.
pub fn bisect(bounds: Region, target: usize, estimator: &dyn CostEstimator) -> Vec<(Region, f64)> {
    let target = target.max(1);
    let mut regions = vec![(bounds, sanitize(estimator.estimate(&bounds)))];
    // Regions that cannot be split are parked here
    let mut atoms: Vec<(Region, f64)> = Vec::new();

    while regions.len() + atoms.len() < target && !regions.is_empty() {
        let mut idx = 0;
        for (i, (region, cost)) in regions.iter().enumerate() {
            let (best_region, best_cost) = &regions[idx];
            if *cost > *best_cost || (*cost == *best_cost && region.area() > best_region.area()) {
                idx = i;
            }
        }

        let (region, cost) = regions.swap_remove(idx);
        match best_split(&region, estimator) {
            Some((a, cost_a, b, cost_b)) => {
                regions.push((a, cost_a));
                regions.push((b, cost_b));
            }
            None => atoms.push((region, cost)),
        }
    }

    regions.extend(atoms);
    regions.sort_by_key(|(region, _)| (region.y, region.x));
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_uniform_quadrants() {
        let tiles = bisect(Region::new(0, 0, 8, 8), 4, &UniformCost);
        let regions: Vec<_> = tiles.iter().map(|(r, _)| *r).collect();
        assert_eq!(
            regions,
            vec![
                Region::new(0, 0, 4, 4),
                Region::new(4, 0, 4, 4),
                Region::new(0, 4, 4, 4),
                Region::new(4, 4, 4, 4),
            ]
        );
        assert!(tiles.iter().all(|(_, cost)| *cost == 16.0));
    }

    #[test]
    fn test_density_map_estimates() {
        let bounds = Region::new(10, 10, 3, 2);
        let map = DensityMap::new(bounds, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(map.estimate(&bounds), 21.0);
        assert_eq!(map.estimate(&Region::new(11, 10, 2, 2)), 2.0 + 3.0 + 5.0 + 6.0);
        assert_eq!(map.estimate(&Region::new(10, 11, 1, 1)), 4.0);
        assert_eq!(map.estimate(&Region::new(0, 0, 5, 5)), 0.0);
        assert!(DensityMap::new(bounds, &[1.0]).is_none());
    }

    #[test]
    fn test_declared_costs_give_one_cell_each() {
        let bounds = Region::new(0, 0, 2, 2);
        let map = DensityMap::new(bounds, &[10.0, 10.0, 10.0, 10.0]).unwrap();
        let tiles = bisect(bounds, 4, &map);
        assert_eq!(tiles.len(), 4);
        assert!(tiles.iter().all(|(r, cost)| r.area() == 1 && *cost == 10.0));
    }

    #[test]
    fn test_hotspot_gets_smaller_tiles() {
        // Left column is ten times as expensive as the rest
        let bounds = Region::new(0, 0, 10, 1);
        let mut costs = vec![1.0; 10];
        costs[0] = 9.0;
        let map = DensityMap::new(bounds, &costs).unwrap();
        let tiles = bisect(bounds, 2, &map);
        assert_eq!(tiles[0].0, Region::new(0, 0, 1, 1));
        assert_eq!(tiles[0].1, tiles[1].1);
    }

    #[test]
    fn test_stops_when_unsplittable() {
        let tiles = bisect(Region::new(0, 0, 2, 1), 8, &UniformCost);
        assert_eq!(tiles.len(), 2);
        assert_eq!(bisect(Region::new(0, 0, 4, 4), 0, &UniformCost).len(), 1);
    }

    #[test]
    fn test_closure_estimator() {
        let by_row = |r: &Region| (r.height * (r.y + 1)) as f64;
        let tiles = bisect(Region::new(0, 0, 1, 6), 2, &by_row);
        assert_eq!(tiles.len(), 2);
        let total: u32 = tiles.iter().map(|(r, _)| r.height).sum();
        assert_eq!(total, 6);
    }

    proptest! {
        #[test]
        fn prop_tiles_partition_the_bounds(
            width in 1u32..40,
            height in 1u32..40,
            target in 1usize..12,
        ) {
            let bounds = Region::new(3, 5, width, height);
            let tiles = bisect(bounds, target, &UniformCost);
            prop_assert!(tiles.len() <= target);
            let area: u64 = tiles.iter().map(|(r, _)| r.area()).sum();
            prop_assert_eq!(area, bounds.area());
            for (region, _) in &tiles {
                prop_assert!(bounds.contains(region));
            }
        }

        #[test]
        fn prop_power_of_two_tiles_balance(exp in 0u32..4, side_exp in 3u32..6) {
            let side = 1u32 << side_exp;
            let target = 1usize << exp;
            let tiles = bisect(Region::new(0, 0, side, side), target, &UniformCost);
            prop_assert_eq!(tiles.len(), target);
            let max = tiles.iter().map(|(_, c)| *c).fold(f64::MIN, f64::max);
            let min = tiles.iter().map(|(_, c)| *c).fold(f64::MAX, f64::min);
            prop_assert!(max - min <= 0.0);
        }
    }
}
