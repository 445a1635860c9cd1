use {
    crate::*,
    glam::IVec2,
    graph::{DownhillHikeFinder, RelaxedTrailGraph, TrailGraph},
    nom::{combinator::map_opt, error::Error, Err, IResult},
    strum::IntoEnumIterator,
};

mod graph;

define_cell! {
    #[repr(u8)]
    #[cfg_attr(test, derive(Debug))]
    #[derive(Clone, Copy, PartialEq)]
    pub enum Cell {
        Open = OPEN = b'.',
        Wall = WALL = b'#',
        NorthSlope = NORTH_SLOPE = b'^',
        EastSlope = EAST_SLOPE = b'>',
        SouthSlope = SOUTH_SLOPE = b'v',
        WestSlope = WEST_SLOPE = b'<',
        Start = START = b'S',
        Hiked = HIKED = b'O',
    }
}

impl Cell {
    fn slope_dir(self) -> Option<Direction> {
        match self {
            Self::NorthSlope => Some(Direction::North),
            Self::EastSlope => Some(Direction::East),
            Self::SouthSlope => Some(Direction::South),
            Self::WestSlope => Some(Direction::West),
            _ => None,
        }
    }

    fn is_trail(self) -> bool {
        matches!(
            self,
            Self::Open
                | Self::NorthSlope
                | Self::EastSlope
                | Self::SouthSlope
                | Self::WestSlope
                | Self::Hiked
        )
    }
}

#[cfg_attr(test, derive(Debug))]
pub struct TrailMap {
    grid: Grid2D<Cell>,
    start: IVec2,
    goal: IVec2,
}

impl TrailMap {
    fn iter_trail_neighbors(&self, pos: IVec2) -> impl Iterator<Item = IVec2> + '_ {
        Direction::iter().filter_map(move |dir| {
            let next: IVec2 = pos + dir.vec();

            self.grid
                .get(next)
                .map_or(false, |cell| cell.is_trail())
                .then_some(next)
        })
    }

    /// Cells a hiker at `pos` may step to without turning back to `prev`, ignoring slopes. Used
    /// to re-walk corridors that a hike crosses against their slopes.
    fn iter_relaxed_steps(&self, pos: IVec2, prev: IVec2) -> impl Iterator<Item = IVec2> + '_ {
        self.iter_trail_neighbors(pos).filter(move |&next| next != prev)
    }

    /// Cells a hiker at `pos` may step to, having arrived from `prev`. Stepping off a slope is
    /// only allowed in the direction it points; stepping onto one is allowed from any side.
    fn iter_steps(&self, pos: IVec2, prev: IVec2) -> impl Iterator<Item = IVec2> + '_ {
        let slope_dir: Option<Direction> = self.grid.get(pos).copied().and_then(Cell::slope_dir);

        self.iter_relaxed_steps(pos, prev)
            .filter(move |&next| slope_dir.map_or(true, |slope_dir| next - pos == slope_dir.vec()))
    }

    /// The cells that survive corridor contraction: the start, the goal, every slope, and every
    /// true junction (three or more passable neighbors).
    fn iter_vert_positions(&self) -> impl Iterator<Item = IVec2> + '_ {
        self.grid
            .iter_filtered_positions(|cell: &Cell| cell.is_trail())
            .filter(|&pos| {
                self.grid.get(pos).unwrap().slope_dir().is_some()
                    || self.iter_trail_neighbors(pos).count() > 2_usize
            })
            .chain([self.start, self.goal])
    }

    fn push_corridor_cells(&self, from: IVec2, dir: Direction, to: IVec2, hike: &mut Vec<IVec2>) {
        let mut prev: IVec2 = from;
        let mut curr: IVec2 = from + dir.vec();

        while curr != to {
            hike.push(curr);

            // Corridor interiors have exactly two passable neighbors, so the walk is forced.
            let next: IVec2 = self.iter_relaxed_steps(curr, prev).next().unwrap();

            prev = curr;
            curr = next;
        }
    }

    fn expand_vert_path(&self, graph: &TrailGraph, vert_path: &[IVec2]) -> Vec<IVec2> {
        let mut hike: Vec<IVec2> = Vec::new();

        for verts in vert_path.windows(2_usize) {
            let from: IVec2 = verts[0_usize];
            let to: IVec2 = verts[1_usize];

            hike.push(from);

            if let Some(corridor_neighbor) = graph.neighbor_between(from, to) {
                self.push_corridor_cells(from, corridor_neighbor.dir, to, &mut hike);
            } else {
                // The corridor was only committed from the far side; walk it backwards.
                let corridor_neighbor = graph.neighbor_between(to, from).unwrap();
                let mut reversed: Vec<IVec2> = Vec::new();

                self.push_corridor_cells(to, corridor_neighbor.dir, from, &mut reversed);
                hike.extend(reversed.into_iter().rev());
            }
        }

        hike.push(*vert_path.last().unwrap());

        hike
    }

    fn downhill_hike(&self) -> Option<Vec<IVec2>> {
        let graph: TrailGraph = TrailGraph::compress(self);

        DownhillHikeFinder::default()
            .find_longest_hike(&graph)
            .map(|(vert_path, _)| self.expand_vert_path(&graph, &vert_path))
    }

    fn climbing_hike(&self) -> Option<Vec<IVec2>> {
        let graph: TrailGraph = TrailGraph::compress(self);
        let relaxed: RelaxedTrailGraph = RelaxedTrailGraph::from_trail_graph(&graph);

        relaxed.find_longest_hike().map(|(folded_path, weight)| {
            let mut vert_path: Vec<IVec2> = Vec::with_capacity(folded_path.len() + 2_usize);

            vert_path.push(graph.start());
            vert_path.extend(folded_path);

            if *vert_path.last().unwrap() != graph.goal() {
                vert_path.push(graph.goal());
            }

            let hike: Vec<IVec2> = self.expand_vert_path(&graph, &vert_path);

            debug_assert_eq!(hike.len() as i32 - 1_i32, weight);

            hike
        })
    }

    fn map_hike_to_weight(hike: Vec<IVec2>) -> usize {
        hike.len() - 1_usize
    }

    fn map_hike_to_weight_and_string(&self) -> impl Fn(Vec<IVec2>) -> (usize, String) + '_ {
        |hike| {
            let mut grid: Grid2D<Cell> = self.grid.clone();

            for pos in hike.iter().copied() {
                *grid.get_mut(pos).unwrap() = Cell::Hiked;
            }

            *grid.get_mut(self.start).unwrap() = Cell::Start;

            (Self::map_hike_to_weight(hike), grid.into())
        }
    }

    pub fn downhill_hike_weight(&self) -> Option<usize> {
        self.downhill_hike().map(Self::map_hike_to_weight)
    }

    fn downhill_hike_weight_and_string(&self) -> Option<(usize, String)> {
        self.downhill_hike().map(self.map_hike_to_weight_and_string())
    }

    pub fn climbing_hike_weight(&self) -> Option<usize> {
        self.climbing_hike().map(Self::map_hike_to_weight)
    }

    fn climbing_hike_weight_and_string(&self) -> Option<(usize, String)> {
        self.climbing_hike().map(self.map_hike_to_weight_and_string())
    }
}

impl Parse for TrailMap {
    fn parse<'i>(input: &'i str) -> IResult<&'i str, Self> {
        map_opt(Grid2D::parse, |grid: Grid2D<Cell>| {
            let dimensions: IVec2 = grid.dimensions();

            (dimensions.x == dimensions.y && dimensions.x >= 2_i32).then_some(())?;

            let start: IVec2 = IVec2::new(1_i32, 0_i32);
            let goal: IVec2 = IVec2::new(dimensions.x - 2_i32, dimensions.y - 1_i32);

            // The border must be solid wall apart from the two fixed openings.
            CellIter2D::iter_edges_for_dimensions(dimensions)
                .all(|pos| {
                    *grid.get(pos).unwrap()
                        == if pos == start || pos == goal {
                            Cell::Open
                        } else {
                            Cell::Wall
                        }
                })
                .then(|| Self { grid, start, goal })
        })(input)
    }
}

impl RunQuestions for TrailMap {
    fn q1_internal(&mut self, args: &QuestionArgs) {
        if args.verbose {
            if let Some((weight, hike_string)) = self.downhill_hike_weight_and_string() {
                dbg!(weight);
                println!("\n\n{hike_string}\n");
            } else {
                eprintln!("Failed to find a downhill hike.");
            }
        } else {
            dbg!(self.downhill_hike_weight());
        }
    }

    fn q2_internal(&mut self, args: &QuestionArgs) {
        if args.verbose {
            if let Some((weight, hike_string)) = self.climbing_hike_weight_and_string() {
                dbg!(weight);
                println!("\n\n{hike_string}\n");
            } else {
                eprintln!("Failed to find a climbing hike.");
            }
        } else {
            dbg!(self.climbing_hike_weight());
        }
    }
}

impl<'i> TryFrom<&'i str> for TrailMap {
    type Error = Err<Error<&'i str>>;

    fn try_from(input: &'i str) -> Result<Self, Self::Error> {
        Ok(Self::parse(input)?.1)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::sync::OnceLock};

    const TRAIL_MAP_STR: &'static str = concat!(
        "#.#####################\n", // 0
        "#.......#########...###\n", // 1
        "#######.#########.#.###\n", // 2
        "###.....#.>.>.###.#.###\n", // 3
        "###v#####.#v#.###.#.###\n", // 4
        "###.>...#.#.#.....#...#\n", // 5
        "###v###.#.#.#########.#\n", // 6
        "###...#.#.#.......#...#\n", // 7
        "#####.#.#.#######.#.###\n", // 8
        "#.....#.#.#.......#...#\n", // 9
        "#.#####.#.#.#########v#\n", // 10
        "#.#...#...#...###...>.#\n", // 11
        "#.#.#v#######v###.###v#\n", // 12
        "#...#.>.#...>.>.#.###.#\n", // 13
        "#####v#.#.###v#.#.###.#\n", // 14
        "#.....#...#...#.#.#...#\n", // 15
        "#.#########.###.#.#.###\n", // 16
        "#...###...#...#...#.###\n", // 17
        "###.###.#.###v#####v###\n", // 18
        "#...#...#.#.>.>.#.>.###\n", // 19
        "#.###.###.#.###.#.#v###\n", // 20
        "#.....###...###...#...#\n", // 21
        "#####################.#\n", // 22
    );
    const SLOPE_FORK_STR: &'static str = "\
        #.###\n\
        #.>.#\n\
        #.#.#\n\
        #...#\n\
        ###.#\n";
    const CORRIDOR_STR: &'static str = "\
        #.###\n\
        #.###\n\
        #...#\n\
        ###.#\n\
        ###.#\n";
    const ADJACENT_STR: &'static str = "\
        #.#\n\
        #.#\n\
        #.#\n";

    fn trail_map() -> &'static TrailMap {
        static ONCE_LOCK: OnceLock<TrailMap> = OnceLock::new();

        ONCE_LOCK.get_or_init(|| TRAIL_MAP_STR.try_into().unwrap())
    }

    fn marked_cells(hike_string: &str) -> usize {
        hike_string
            .chars()
            .filter(|&c| matches!(c, 'O' | 'S'))
            .count()
    }

    #[test]
    fn test_try_from_str() {
        let trail_map: &TrailMap = trail_map();

        assert_eq!(trail_map.grid.dimensions(), IVec2::new(23_i32, 23_i32));
        assert_eq!(trail_map.start, IVec2::new(1_i32, 0_i32));
        assert_eq!(trail_map.goal, IVec2::new(21_i32, 22_i32));
        assert_eq!(
            trail_map.grid.get(IVec2::new(3_i32, 4_i32)),
            Some(&Cell::SouthSlope)
        );
        assert_eq!(
            trail_map.grid.get(IVec2::new(10_i32, 3_i32)),
            Some(&Cell::EastSlope)
        );
    }

    #[test]
    fn test_try_from_invalid_str() {
        // Not square
        assert!(TrailMap::try_from("#.#\n#.#\n").is_err());

        // Start opening missing or misplaced
        assert!(TrailMap::try_from("##.\n#.#\n#.#\n").is_err());
        assert!(TrailMap::try_from("###\n#.#\n#.#\n").is_err());

        // Extra opening in the border
        assert!(TrailMap::try_from("#.#\n..#\n#.#\n").is_err());

        // Goal opening missing
        assert!(TrailMap::try_from("#.#\n#.#\n###\n").is_err());
    }

    #[test]
    fn test_iter_steps() {
        let trail_map: TrailMap = SLOPE_FORK_STR.try_into().unwrap();
        let junction: IVec2 = IVec2::new(1_i32, 1_i32);
        let slope: IVec2 = IVec2::new(2_i32, 1_i32);

        // A junction offers every passable neighbor except the one stepped from.
        assert_eq!(
            trail_map
                .iter_steps(junction, IVec2::new(1_i32, 0_i32))
                .collect::<Vec<IVec2>>(),
            vec![slope, IVec2::new(1_i32, 2_i32)]
        );

        // A slope may only be exited in the direction it points.
        assert_eq!(
            trail_map.iter_steps(slope, junction).collect::<Vec<IVec2>>(),
            vec![IVec2::new(3_i32, 1_i32)]
        );

        // Entering a slope against its arrow is legal, but leaves no way forward.
        assert_eq!(
            trail_map
                .iter_steps(IVec2::new(3_i32, 1_i32), IVec2::new(3_i32, 2_i32))
                .collect::<Vec<IVec2>>(),
            vec![slope]
        );
        assert_eq!(
            trail_map
                .iter_steps(slope, IVec2::new(3_i32, 1_i32))
                .count(),
            0_usize
        );
    }

    #[test]
    fn test_one_way_corridors() {
        let trail_map: TrailMap = SLOPE_FORK_STR.try_into().unwrap();
        let graph: TrailGraph = TrailGraph::compress(&trail_map);
        let junction: IVec2 = IVec2::new(1_i32, 1_i32);
        let slope: IVec2 = IVec2::new(2_i32, 1_i32);
        let far_junction: IVec2 = IVec2::new(3_i32, 3_i32);

        assert!(!graph.neighbor_between(junction, slope).unwrap().two_way);
        assert!(graph.neighbor_between(slope, junction).is_none());
        assert!(graph.neighbor_between(far_junction, slope).unwrap().two_way);
        assert!(graph.neighbor_between(slope, far_junction).unwrap().two_way);
    }

    #[test]
    fn test_downhill_hike_weight() {
        assert_eq!(trail_map().downhill_hike_weight(), Some(94_usize));
    }

    #[test]
    fn test_climbing_hike_weight() {
        assert_eq!(trail_map().climbing_hike_weight(), Some(154_usize));
    }

    #[test]
    fn test_hike_strings_mark_every_hiked_cell() {
        let (weight, hike_string): (usize, String) =
            trail_map().downhill_hike_weight_and_string().unwrap();

        assert_eq!(weight, 94_usize);
        assert_eq!(marked_cells(&hike_string), 95_usize);

        let (weight, hike_string): (usize, String) =
            trail_map().climbing_hike_weight_and_string().unwrap();

        assert_eq!(weight, 154_usize);
        assert_eq!(marked_cells(&hike_string), 155_usize);
    }

    #[test]
    fn test_corridor_round_trip() {
        let trail_map: TrailMap = CORRIDOR_STR.try_into().unwrap();
        let graph: TrailGraph = TrailGraph::compress(&trail_map);

        assert_eq!(graph.vert_count(), 2_usize);
        assert_eq!(
            graph
                .neighbor_between(trail_map.start, trail_map.goal)
                .unwrap()
                .weight,
            6_i32
        );
        assert_eq!(trail_map.downhill_hike_weight(), Some(6_usize));
        assert_eq!(trail_map.climbing_hike_weight(), Some(6_usize));
    }

    #[test]
    fn test_adjacent_start_and_goal() {
        let trail_map: TrailMap = ADJACENT_STR.try_into().unwrap();

        assert_eq!(trail_map.downhill_hike_weight(), Some(2_usize));
        assert_eq!(trail_map.climbing_hike_weight(), Some(2_usize));
    }

    #[test]
    fn test_compression_is_deterministic() {
        let first: TrailGraph = TrailGraph::compress(trail_map());
        let second: TrailGraph = TrailGraph::compress(trail_map());

        assert_eq!(first.sorted_vert_positions(), second.sorted_vert_positions());
        assert_eq!(first.edge_count(), second.edge_count());
        assert_eq!(first.total_edge_weight(), second.total_edge_weight());
    }

    #[test]
    fn test_downhill_never_beats_climbing() {
        for trail_map_str in [TRAIL_MAP_STR, SLOPE_FORK_STR, CORRIDOR_STR, ADJACENT_STR] {
            let trail_map: TrailMap = trail_map_str.try_into().unwrap();

            assert!(
                trail_map.downhill_hike_weight().unwrap()
                    <= trail_map.climbing_hike_weight().unwrap()
            );
        }
    }
}
