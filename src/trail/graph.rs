use {
    super::TrailMap,
    crate::*,
    bitvec::prelude::*,
    glam::IVec2,
    std::{
        collections::{HashMap, HashSet},
        mem::take,
    },
};

pub(super) struct CorridorNeighbor {
    pub(super) pos: IVec2,
    pub(super) dir: Direction,
    pub(super) weight: i32,
    pub(super) two_way: bool,
}

#[cfg_attr(test, derive(Debug))]
#[derive(Default)]
struct VertData {
    neighbors: [IVec2; Self::ARRAY_LEN],
    dirs: [Option<Direction>; Self::ARRAY_LEN],
    weights: [i32; Self::ARRAY_LEN],
    two_way: [bool; Self::ARRAY_LEN],
    len: u32,
}

impl VertData {
    const ARRAY_LEN: usize = 4_usize;

    fn contains_neighbor(&self, target_neighbor: IVec2) -> bool {
        self.neighbors[..self.len as usize]
            .iter()
            .any(|neighbor| *neighbor == target_neighbor)
    }

    fn push_neighbor(&mut self, neighbor: IVec2, dir: Direction, weight: i32) {
        if !self.contains_neighbor(neighbor) {
            assert!((self.len as usize) < Self::ARRAY_LEN);

            self.neighbors[self.len as usize] = neighbor;
            self.dirs[self.len as usize] = Some(dir);
            self.weights[self.len as usize] = weight;
            self.len += 1_u32;
        }
    }

    fn get_neighbor(&self, index: usize) -> Option<CorridorNeighbor> {
        (index < self.len as usize).then(|| CorridorNeighbor {
            pos: self.neighbors[index],
            dir: self.dirs[index].unwrap(),
            weight: self.weights[index],
            two_way: self.two_way[index],
        })
    }

    fn iter_neighbors(&self) -> impl Iterator<Item = CorridorNeighbor> + '_ {
        (0_usize..self.len as usize).map(|index| self.get_neighbor(index).unwrap())
    }
}

/// One in-flight corridor walk of the compression traversal: where it started, the first step it
/// took, and how far it has come.
struct CorridorWalk {
    origin: IVec2,
    first_dir: Direction,
    prev: IVec2,
    curr: IVec2,
    steps: i32,
}

/// Weighted digraph over the map's decision points. Corridors between verts are contracted into
/// single edges whose weight is the number of grid steps they replace, so summing edge weights
/// along any path reproduces the length of the full hike.
pub(super) struct TrailGraph {
    verts: HashMap<IVec2, VertData>,
    start: IVec2,
    goal: IVec2,
}

impl TrailGraph {
    fn push_walks_from(map: &TrailMap, stack: &mut Vec<CorridorWalk>, vert: IVec2) {
        for next in map.iter_steps(vert, vert) {
            stack.push(CorridorWalk {
                origin: vert,
                first_dir: (next - vert).try_into().unwrap(),
                prev: vert,
                curr: next,
                steps: 1_i32,
            });
        }
    }

    fn mark_two_way_corridors(verts: &mut HashMap<IVec2, VertData>) {
        let positions: Vec<IVec2> = verts.keys().copied().collect();

        for pos in positions {
            for index in 0_usize..verts[&pos].len as usize {
                let neighbor: IVec2 = verts[&pos].neighbors[index];
                let two_way: bool = verts[&neighbor].contains_neighbor(pos);

                verts.get_mut(&pos).unwrap().two_way[index] = two_way;
            }
        }
    }

    pub(super) fn compress(map: &TrailMap) -> Self {
        let mut verts: HashMap<IVec2, VertData> = map
            .iter_vert_positions()
            .map(|pos| (pos, VertData::default()))
            .collect();
        let mut stack: Vec<CorridorWalk> = Vec::new();
        let mut expanded: HashSet<IVec2> = HashSet::new();

        expanded.insert(map.start);
        Self::push_walks_from(map, &mut stack, map.start);

        while let Some(walk) = stack.pop() {
            if verts.contains_key(&walk.curr) {
                verts
                    .get_mut(&walk.origin)
                    .unwrap()
                    .push_neighbor(walk.curr, walk.first_dir, walk.steps);

                // Each vert's own corridors are walked exactly once, which also bounds the
                // traversal on grids whose corridors form cycles.
                if expanded.insert(walk.curr) {
                    Self::push_walks_from(map, &mut stack, walk.curr);
                }
            } else {
                for next in map.iter_steps(walk.curr, walk.prev) {
                    stack.push(CorridorWalk {
                        origin: walk.origin,
                        first_dir: walk.first_dir,
                        prev: walk.curr,
                        curr: next,
                        steps: walk.steps + 1_i32,
                    });
                }
            }
        }

        Self::mark_two_way_corridors(&mut verts);

        Self {
            verts,
            start: map.start,
            goal: map.goal,
        }
    }

    pub(super) fn start(&self) -> IVec2 {
        self.start
    }

    pub(super) fn goal(&self) -> IVec2 {
        self.goal
    }

    pub(super) fn neighbor_between(&self, from: IVec2, to: IVec2) -> Option<CorridorNeighbor> {
        self.verts
            .get(&from)
            .and_then(|vert_data| vert_data.iter_neighbors().find(|neighbor| neighbor.pos == to))
    }
}

#[cfg(test)]
impl TrailGraph {
    pub(super) fn vert_count(&self) -> usize {
        self.verts.len()
    }

    pub(super) fn edge_count(&self) -> usize {
        self.verts
            .values()
            .map(|vert_data| vert_data.len as usize)
            .sum()
    }

    pub(super) fn sorted_vert_positions(&self) -> Vec<IVec2> {
        let mut positions: Vec<IVec2> = self.verts.keys().copied().collect();

        positions.sort_unstable_by_key(|pos| (pos.y, pos.x));

        positions
    }

    pub(super) fn total_edge_weight(&self) -> i32 {
        self.verts
            .values()
            .flat_map(|vert_data| vert_data.iter_neighbors())
            .map(|neighbor| neighbor.weight)
            .sum()
    }
}

/// Exhaustive enumeration of the simple `start -> goal` paths of the directed graph, keeping the
/// heaviest one.
#[derive(Default)]
pub(super) struct DownhillHikeFinder {
    best_hike: Option<(Vec<IVec2>, i32)>,
    stack: Vec<(IVec2, usize, i32)>,
    visited: HashSet<IVec2>,
}

impl DownhillHikeFinder {
    pub(super) fn find_longest_hike(&mut self, graph: &TrailGraph) -> Option<(Vec<IVec2>, i32)> {
        self.best_hike = None;
        self.stack.clear();
        self.visited.clear();
        self.stack.push((graph.start, 0_usize, 0_i32));
        self.visited.insert(graph.start);

        while let Some((curr_pos, neighbor_index, cost)) = self.stack.last().copied() {
            if curr_pos == graph.goal {
                if self
                    .best_hike
                    .as_ref()
                    .map_or(true, |&(_, best_cost)| cost > best_cost)
                {
                    self.best_hike =
                        Some((self.stack.iter().map(|(pos, _, _)| *pos).collect(), cost));
                }

                // Don't explore any children of the goal
                self.stack.last_mut().unwrap().1 = VertData::ARRAY_LEN;
            }

            if let Some(corridor_neighbor) = graph
                .verts
                .get(&curr_pos)
                .unwrap()
                .get_neighbor(neighbor_index)
            {
                let next: (IVec2, usize, i32) = (
                    corridor_neighbor.pos,
                    0_usize,
                    cost + corridor_neighbor.weight,
                );

                self.stack.last_mut().unwrap().1 += 1_usize;

                if !self.visited.contains(&next.0) {
                    self.visited.insert(next.0);
                    self.stack.push(next);
                }
            } else {
                self.visited.remove(&curr_pos);
                self.stack.pop();
            }
        }

        take(&mut self.best_hike)
    }
}

#[cfg_attr(test, derive(Debug))]
#[derive(Clone, Default)]
struct VertEdges {
    neighbors: [u16; VertData::ARRAY_LEN],
    weights: [i32; VertData::ARRAY_LEN],
    len: u32,
}

impl VertEdges {
    fn push_neighbor(&mut self, neighbor: u16, weight: i32) {
        assert!((self.len as usize) < VertData::ARRAY_LEN);

        self.neighbors[self.len as usize] = neighbor;
        self.weights[self.len as usize] = weight;
        self.len += 1_u32;
    }

    fn iter_neighbors(&self) -> impl Iterator<Item = (u16, i32)> + '_ {
        (0_usize..self.len as usize).map(|index| (self.neighbors[index], self.weights[index]))
    }

    fn degree(&self) -> usize {
        self.len as usize
    }

    fn max_incident_weight(&self) -> i32 {
        self.weights[..self.len as usize]
            .iter()
            .copied()
            .max()
            .unwrap_or_default()
    }
}

struct FreeHikeState {
    visited: BitVec,
    path: Vec<u16>,
    potential: i32,
    best_hike: Option<(Vec<u16>, i32)>,
}

/// Undirected view of the trail graph with the start and goal verts folded into their sole
/// neighbors, plus the static tables that keep the branch-and-bound search tractable: a per-vert
/// admissible heuristic and the transitions that provably dead-end.
pub(super) struct RelaxedTrailGraph {
    verts: Vec<IVec2>,
    edges: Vec<VertEdges>,
    heuristics: Vec<i32>,
    forbidden: Vec<u8>,
    start: u16,
    goal: u16,
    base_cost: i32,
}

impl RelaxedTrailGraph {
    fn undirected_edges(graph: &TrailGraph) -> HashMap<IVec2, Vec<(IVec2, i32)>> {
        let mut edges_by_pos: HashMap<IVec2, Vec<(IVec2, i32)>> =
            graph.verts.keys().map(|&pos| (pos, Vec::new())).collect();
        let mut push_edge = |from: IVec2, to: IVec2, weight: i32| {
            let list: &mut Vec<(IVec2, i32)> = edges_by_pos.get_mut(&from).unwrap();

            if !list.iter().any(|&(pos, _)| pos == to) {
                list.push((to, weight));
            }
        };

        for (&from, vert_data) in graph.verts.iter() {
            for corridor_neighbor in vert_data.iter_neighbors() {
                push_edge(from, corridor_neighbor.pos, corridor_neighbor.weight);

                // A one-way corridor still joins its two verts once direction is dropped; the
                // opposite side of a two-way corridor is committed on its own.
                if !corridor_neighbor.two_way {
                    push_edge(corridor_neighbor.pos, from, corridor_neighbor.weight);
                }
            }
        }

        edges_by_pos
    }

    fn fold_terminal(
        edges_by_pos: &mut HashMap<IVec2, Vec<(IVec2, i32)>>,
        terminal: IVec2,
    ) -> (IVec2, i32) {
        let terminal_edges: Vec<(IVec2, i32)> = edges_by_pos.remove(&terminal).unwrap();

        assert_eq!(
            terminal_edges.len(),
            1_usize,
            "terminal verts must meet the rest of the graph through exactly one corridor"
        );

        let (into, weight): (IVec2, i32) = terminal_edges[0_usize];

        edges_by_pos
            .get_mut(&into)
            .unwrap()
            .retain(|&(pos, _)| pos != terminal);

        (into, weight)
    }

    pub(super) fn from_trail_graph(graph: &TrailGraph) -> Self {
        let mut edges_by_pos: HashMap<IVec2, Vec<(IVec2, i32)>> = Self::undirected_edges(graph);

        let (start, start_weight): (IVec2, i32) =
            Self::fold_terminal(&mut edges_by_pos, graph.start);
        let mut base_cost: i32 = start_weight;
        let goal: IVec2 = if start == graph.goal {
            // The whole maze is one corridor; the folded start already sits on the goal.
            start
        } else {
            let (goal, goal_weight): (IVec2, i32) =
                Self::fold_terminal(&mut edges_by_pos, graph.goal);

            base_cost += goal_weight;

            goal
        };

        let mut verts: Vec<IVec2> = edges_by_pos.keys().copied().collect();

        verts.sort_unstable_by_key(|pos| (pos.y, pos.x));

        let index_of: HashMap<IVec2, u16> = verts
            .iter()
            .enumerate()
            .map(|(index, &pos)| (pos, index as u16))
            .collect();
        let mut edges: Vec<VertEdges> = vec![VertEdges::default(); verts.len()];

        for (pos, list) in edges_by_pos {
            let vert_edges: &mut VertEdges = &mut edges[index_of[&pos] as usize];

            for (neighbor, weight) in list {
                vert_edges.push_neighbor(index_of[&neighbor], weight);
            }
        }

        let heuristics: Vec<i32> = edges
            .iter()
            .map(|vert_edges| vert_edges.max_incident_weight())
            .collect();
        let forbidden: Vec<u8> = vec![0_u8; edges.len()];
        let mut relaxed: Self = Self {
            verts,
            edges,
            heuristics,
            forbidden,
            start: index_of[&start],
            goal: index_of[&goal],
            base_cost,
        };

        relaxed.forbid_border_backtracking();

        relaxed
    }

    fn push_border_paths(
        &self,
        curr: u16,
        on_path: &mut BitVec,
        path: &mut Vec<u16>,
        border_paths: &mut Vec<Vec<u16>>,
    ) {
        if curr == self.goal {
            border_paths.push(path.clone());

            return;
        }

        on_path.set(curr as usize, true);

        for (neighbor, _) in self.edges[curr as usize].iter_neighbors() {
            if !on_path[neighbor as usize] && self.edges[neighbor as usize].degree() < 4_usize {
                path.push(neighbor);
                self.push_border_paths(neighbor, on_path, path, border_paths);
                path.pop();
            }
        }

        on_path.set(curr as usize, false);
    }

    /// Collects every start-to-goal path confined to verts below four-way degree, and forbids
    /// stepping backwards along any of them: completing a hike after such a step would require
    /// re-crossing an already-hiked boundary vert.
    fn forbid_border_backtracking(&mut self) {
        let mut border_paths: Vec<Vec<u16>> = Vec::new();
        let mut path: Vec<u16> = vec![self.start];
        let mut on_path: BitVec = BitVec::repeat(false, self.verts.len());

        self.push_border_paths(self.start, &mut on_path, &mut path, &mut border_paths);

        for border_path in border_paths {
            for verts in border_path.windows(2_usize) {
                let earlier: u16 = verts[0_usize];
                let later: u16 = verts[1_usize];
                let slot: usize = self.edges[later as usize]
                    .iter_neighbors()
                    .position(|(neighbor, _)| neighbor == earlier)
                    .unwrap();

                self.forbidden[later as usize] |= 1_u8 << slot;
            }
        }
    }

    fn hike_from(&self, curr: u16, cost: i32, state: &mut FreeHikeState) {
        if curr == self.goal {
            if state
                .best_hike
                .as_ref()
                .map_or(true, |&(_, best_cost)| cost > best_cost)
            {
                state.best_hike = Some((state.path.clone(), cost));
            }

            return;
        }

        // Even the rosiest completion of this hike can't beat the best one known.
        if state
            .best_hike
            .as_ref()
            .map_or(false, |&(_, best_cost)| cost + state.potential <= best_cost)
        {
            return;
        }

        let curr_index: usize = curr as usize;

        state.potential -= self.heuristics[curr_index];
        state.visited.set(curr_index, true);

        for (slot, (neighbor, weight)) in self.edges[curr_index].iter_neighbors().enumerate() {
            if !state.visited[neighbor as usize]
                && self.forbidden[curr_index] & (1_u8 << slot) == 0_u8
            {
                state.path.push(neighbor);
                self.hike_from(neighbor, cost + weight, state);
                state.path.pop();
            }
        }

        state.visited.set(curr_index, false);
        state.potential += self.heuristics[curr_index];
    }

    pub(super) fn find_longest_hike(&self) -> Option<(Vec<IVec2>, i32)> {
        let mut state: FreeHikeState = FreeHikeState {
            visited: BitVec::repeat(false, self.verts.len()),
            path: vec![self.start],
            potential: self.heuristics.iter().sum(),
            best_hike: None,
        };

        self.hike_from(self.start, 0_i32, &mut state);

        state.best_hike.map(|(path, cost)| {
            (
                path.into_iter()
                    .map(|index| self.verts[index as usize])
                    .collect(),
                self.base_cost + cost,
            )
        })
    }
}
