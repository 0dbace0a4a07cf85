use std::collections::{BTreeMap, BTreeSet, VecDeque};

use conquest_protocol::{Position, RegionId};

use crate::rng::{shuffle, RandomSource};

/// Default cut for [`MapGraph::strategic_regions`].
pub const STRATEGIC_THRESHOLD: u32 = 7;

const BORDER: &str = "border";
const COASTAL: &str = "coastal";
const PORT: &str = "port";

/// Static attributes of one region.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionDef {
    pub id: RegionId,
    pub name: String,
    pub native_name: Option<String>,
    pub position: Position,
    pub strategic_value: u32,
    pub resource: String,
    pub population: u32,
}

/// Immutable adjacency graph of regions. Built once, shared by all sessions.
///
/// Adjacency is symmetric: if `a` lists `b`, then `b` neighbors `a` too. Declarations that were
/// only one-sided in the source data are kept in `asymmetric` for reporting.
#[derive(Clone, Debug)]
pub struct MapGraph {
    regions: BTreeMap<RegionId, RegionDef>,
    adjacency: BTreeMap<RegionId, BTreeSet<RegionId>>,
    asymmetric: Vec<(RegionId, RegionId)>,
}

impl MapGraph {
    /// Build a graph from region definitions and undirected links.
    ///
    /// Callers are expected to have validated that every link endpoint is a known region.
    pub(crate) fn from_parts(
        regions: BTreeMap<RegionId, RegionDef>,
        links: impl IntoIterator<Item = (RegionId, RegionId)>,
        asymmetric: Vec<(RegionId, RegionId)>,
    ) -> Self {
        let mut adjacency: BTreeMap<RegionId, BTreeSet<RegionId>> = regions
            .keys()
            .map(|id| (id.clone(), BTreeSet::new()))
            .collect();
        for (a, b) in links {
            if let Some(set) = adjacency.get_mut(&a) {
                set.insert(b.clone());
            }
            if let Some(set) = adjacency.get_mut(&b) {
                set.insert(a);
            }
        }
        Self {
            regions,
            adjacency,
            asymmetric,
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn contains(&self, id: &RegionId) -> bool {
        self.regions.contains_key(id)
    }

    pub fn region(&self, id: &RegionId) -> Option<&RegionDef> {
        self.regions.get(id)
    }

    pub fn regions(&self) -> impl Iterator<Item = &RegionDef> {
        self.regions.values()
    }

    pub fn region_ids(&self) -> impl Iterator<Item = &RegionId> {
        self.regions.keys()
    }

    /// Neighbors of `id` in sorted order; empty for unknown ids.
    pub fn neighbors(&self, id: &RegionId) -> impl Iterator<Item = &RegionId> {
        self.adjacency.get(id).into_iter().flatten()
    }

    pub fn are_neighbors(&self, a: &RegionId, b: &RegionId) -> bool {
        self.adjacency.get(a).is_some_and(|set| set.contains(b))
    }

    /// Links declared by only one side in the source data, as `(declared_by, target)`.
    pub fn asymmetric_links(&self) -> &[(RegionId, RegionId)] {
        &self.asymmetric
    }

    /// Euclidean distance between region positions, `None` if either id is unknown.
    pub fn distance(&self, a: &RegionId, b: &RegionId) -> Option<f64> {
        let pa = self.regions.get(a)?.position;
        let pb = self.regions.get(b)?.position;
        let dx = f64::from(pa.x) - f64::from(pb.x);
        let dy = f64::from(pa.y) - f64::from(pb.y);
        Some((dx * dx + dy * dy).sqrt())
    }

    /// Regions whose resource tag equals `resource`, in id order.
    pub fn regions_by_resource(&self, resource: &str) -> Vec<RegionId> {
        self.regions
            .values()
            .filter(|r| r.resource == resource)
            .map(|r| r.id.clone())
            .collect()
    }

    /// Regions worth at least `min_value`; [`STRATEGIC_THRESHOLD`] is the usual cut.
    pub fn strategic_regions(&self, min_value: u32) -> Vec<RegionId> {
        self.regions
            .values()
            .filter(|r| r.strategic_value >= min_value)
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn border_regions(&self) -> Vec<RegionId> {
        self.regions_by_resource(BORDER)
    }

    /// Coastal regions followed by ports.
    pub fn coastal_regions(&self) -> Vec<RegionId> {
        let mut regions = self.regions_by_resource(COASTAL);
        regions.extend(self.regions_by_resource(PORT));
        regions
    }

    /// Number of neighbors; 0 for unknown ids.
    pub fn connectivity(&self, id: &RegionId) -> usize {
        self.adjacency.get(id).map_or(0, BTreeSet::len)
    }

    /// Regions with more neighbors than the map average.
    pub fn central_regions(&self) -> Vec<RegionId> {
        if self.adjacency.is_empty() {
            return Vec::new();
        }
        let links: usize = self.adjacency.values().map(BTreeSet::len).sum();
        let average = links as f64 / self.adjacency.len() as f64;
        self.adjacency
            .iter()
            .filter(|(_, set)| set.len() as f64 > average)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Unweighted BFS path from `from` to `to`, both ends included.
    ///
    /// Returns `[from]` when the ends coincide and an empty path when either id is unknown or
    /// `to` is unreachable.
    pub fn shortest_path(&self, from: &RegionId, to: &RegionId) -> Vec<RegionId> {
        if !self.contains(from) || !self.contains(to) {
            return Vec::new();
        }
        if from == to {
            return vec![from.clone()];
        }

        let mut previous: BTreeMap<&RegionId, &RegionId> = BTreeMap::new();
        let mut queue = VecDeque::from([from]);
        let mut visited = BTreeSet::from([from]);

        while let Some(current) = queue.pop_front() {
            for next in self.neighbors(current) {
                if !visited.insert(next) {
                    continue;
                }
                previous.insert(next, current);
                if next == to {
                    let mut path = vec![to.clone()];
                    let mut cursor = to;
                    while let Some(prev) = previous.get(cursor) {
                        path.push((*prev).clone());
                        cursor = *prev;
                    }
                    path.reverse();
                    return path;
                }
                queue.push_back(next);
            }
        }

        Vec::new()
    }

    /// Randomized, as-equal-as-possible split of every region into `parts` groups.
    ///
    /// Each group gets `len / parts` regions and the last group also takes the remainder, so
    /// the groups together cover the whole map exactly once. `parts == 0` yields no groups.
    pub fn partition<R: RandomSource + ?Sized>(
        &self,
        parts: usize,
        rng: &mut R,
    ) -> Vec<Vec<RegionId>> {
        if parts == 0 {
            return Vec::new();
        }
        let mut ids: Vec<RegionId> = self.regions.keys().cloned().collect();
        shuffle(rng, &mut ids);

        let per_part = ids.len() / parts;
        let mut groups = Vec::with_capacity(parts);
        for index in 0..parts {
            let start = index * per_part;
            let end = if index == parts - 1 {
                ids.len()
            } else {
                start + per_part
            };
            groups.push(ids[start..end].to_vec());
        }
        groups
    }

    /// Connected components of `subset`, walking only through regions inside the subset.
    pub fn clusters<'a>(
        &self,
        subset: impl IntoIterator<Item = &'a RegionId>,
    ) -> Vec<Vec<RegionId>> {
        let mut remaining: BTreeSet<&RegionId> = subset
            .into_iter()
            .filter(|id| self.contains(id))
            .collect();
        let mut clusters = Vec::new();

        while let Some(seed) = remaining.pop_first() {
            let mut cluster = Vec::new();
            let mut queue = VecDeque::from([seed]);
            while let Some(current) = queue.pop_front() {
                cluster.push(current.clone());
                for next in self.neighbors(current) {
                    if remaining.remove(next) {
                        queue.push_back(next);
                    }
                }
            }
            clusters.push(cluster);
        }

        clusters
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::rng::GameRng;

    pub(crate) fn region(id: &str, x: i32, y: i32) -> RegionDef {
        RegionDef {
            id: RegionId::from(id),
            name: id.to_uppercase(),
            native_name: None,
            position: Position::new(x, y),
            strategic_value: 5,
            resource: "plains".into(),
            population: 10,
        }
    }

    /// a - b - c - d in a line, plus an isolated `e`.
    pub(crate) fn line_map() -> MapGraph {
        let regions = ["a", "b", "c", "d", "e"]
            .iter()
            .enumerate()
            .map(|(i, id)| (RegionId::from(*id), region(id, i as i32 * 10, 0)))
            .collect();
        let links = [("a", "b"), ("b", "c"), ("c", "d")]
            .iter()
            .map(|(a, b)| (RegionId::from(*a), RegionId::from(*b)));
        MapGraph::from_parts(regions, links, Vec::new())
    }

    fn ids(names: &[&str]) -> Vec<RegionId> {
        names.iter().map(|n| RegionId::from(*n)).collect()
    }

    #[test]
    fn adjacency_is_symmetric() {
        let map = line_map();
        assert!(map.are_neighbors(&"a".into(), &"b".into()));
        assert!(map.are_neighbors(&"b".into(), &"a".into()));
        assert!(!map.are_neighbors(&"a".into(), &"c".into()));
        assert!(!map.are_neighbors(&"a".into(), &"zzz".into()));
        let n: Vec<_> = map.neighbors(&"b".into()).cloned().collect();
        assert_eq!(n, ids(&["a", "c"]));
        assert_eq!(map.neighbors(&"nope".into()).count(), 0);
    }

    #[test]
    fn shortest_path_bfs() {
        let map = line_map();
        assert_eq!(
            map.shortest_path(&"a".into(), &"d".into()),
            ids(&["a", "b", "c", "d"])
        );
        assert_eq!(map.shortest_path(&"c".into(), &"c".into()), ids(&["c"]));
        assert!(map.shortest_path(&"a".into(), &"e".into()).is_empty());
        assert!(map.shortest_path(&"a".into(), &"zzz".into()).is_empty());
    }

    #[test]
    fn partition_covers_every_region_once() {
        let map = line_map();
        let mut rng = GameRng::seed_from_u64(11);

        for parts in 1..=5 {
            let groups = map.partition(parts, &mut rng);
            assert_eq!(groups.len(), parts);
            let mut all: Vec<RegionId> = groups.iter().flatten().cloned().collect();
            all.sort();
            assert_eq!(all, ids(&["a", "b", "c", "d", "e"]));

            let base = map.len() / parts;
            for group in &groups[..parts - 1] {
                assert_eq!(group.len(), base);
            }
            assert_eq!(groups[parts - 1].len(), base + map.len() % parts);
        }

        assert!(map.partition(0, &mut rng).is_empty());
    }

    #[test]
    fn clusters_split_disconnected_holdings() {
        let map = line_map();
        let holdings = ids(&["a", "b", "d", "e"]);
        let clusters = map.clusters(&holdings);
        assert_eq!(clusters, vec![ids(&["a", "b"]), ids(&["d"]), ids(&["e"])]);
        assert!(map.clusters(std::iter::empty()).is_empty());
    }

    #[test]
    fn distance_between_positions() {
        let map = line_map();
        assert_eq!(map.distance(&"a".into(), &"d".into()), Some(30.0));
        assert_eq!(map.distance(&"a".into(), &"zzz".into()), None);
    }

    #[test]
    fn distance_across_the_whole_coordinate_range() {
        let regions = [region("w", i32::MIN, 0), region("e", i32::MAX, 0)]
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        let map = MapGraph::from_parts(regions, std::iter::empty(), Vec::new());
        assert_eq!(
            map.distance(&"w".into(), &"e".into()),
            Some(f64::from(u32::MAX))
        );
    }

    /// `line_map` with resource tags and strategic values varied per region.
    fn tagged_map() -> MapGraph {
        let tags = [
            ("a", "border", 9),
            ("b", "port", 7),
            ("c", "coastal", 6),
            ("d", "plains", 5),
            ("e", "border", 3),
        ];
        let regions = tags
            .iter()
            .enumerate()
            .map(|(i, (id, resource, value))| {
                let mut def = region(id, i as i32 * 10, 0);
                def.resource = resource.to_string();
                def.strategic_value = *value;
                (def.id.clone(), def)
            })
            .collect();
        let links = [("a", "b"), ("b", "c"), ("c", "d")]
            .iter()
            .map(|(a, b)| (RegionId::from(*a), RegionId::from(*b)));
        MapGraph::from_parts(regions, links, Vec::new())
    }

    #[test]
    fn queries_by_resource_and_value() {
        let map = tagged_map();
        assert_eq!(map.regions_by_resource("border"), ids(&["a", "e"]));
        assert!(map.regions_by_resource("oil").is_empty());
        assert_eq!(map.border_regions(), ids(&["a", "e"]));
        // coastal first, then ports
        assert_eq!(map.coastal_regions(), ids(&["c", "b"]));
        assert_eq!(map.strategic_regions(STRATEGIC_THRESHOLD), ids(&["a", "b"]));
        assert_eq!(map.strategic_regions(0).len(), 5);
    }

    #[test]
    fn central_regions_beat_average_degree() {
        let map = line_map();
        assert_eq!(map.connectivity(&"b".into()), 2);
        assert_eq!(map.connectivity(&"e".into()), 0);
        assert_eq!(map.connectivity(&"zzz".into()), 0);
        // degrees 1, 2, 2, 1, 0 average 1.2
        assert_eq!(map.central_regions(), ids(&["b", "c"]));

        let empty = MapGraph::from_parts(BTreeMap::new(), std::iter::empty(), Vec::new());
        assert!(empty.central_regions().is_empty());
    }
}
