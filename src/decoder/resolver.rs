use std::cmp::Reverse;
use std::collections::HashSet;

use tracing::debug;

use crate::decoder::route::{Route, Routes};
use crate::decoder::shortest_path::shortest_path;
use crate::{
    CandidateLine, CandidateLinePair, CandidateLines, DecodeError, DecoderConfig, DirectedGraph,
    Frc, Length, Path,
};

/// The decoder needs to compute a shortest-path between each pair of subsequent location reference
/// points. For each pair of location reference points suitable candidate lines must be chosen. The
/// candidate line of the first LRP of this pair acts as start of the shortest-path calculation.
/// The candidate line of the second location reference point of this pair is the end of the
/// shortest-path calculation. If the chosen lines are equal no shortest-path calculation needs to
/// be started.
///
/// The shortest path algorithm takes into account only the part of the network which contains all
/// lines having a functional road class lower than or equal to the lowest functional road class
/// announced by the first location reference point of the pair (LFRCNP).
///
/// If no shortest-path can be calculated for two subsequent location reference points, a different
/// pair of candidate lines is tried, up to `max_number_retries` times, before giving up.
pub fn resolve_routes<G: DirectedGraph>(
    config: &DecoderConfig,
    graph: &G,
    candidate_lines: &[CandidateLines<G::EdgeId>],
) -> Result<Routes<G::EdgeId>, DecodeError> {
    let mut routes = Vec::with_capacity(candidate_lines.len().saturating_sub(1));

    for pair in candidate_lines.windows(2) {
        let [lrp1, lrp2] = [&pair[0], &pair[1]];
        debug!("Resolving route between {:?} and {:?}", lrp1.lrp, lrp2.lrp);

        let route = resolve_route_pair(config, graph, lrp1, lrp2).ok_or(DecodeError::RouteNotFound)?;
        routes.push(route);
    }

    Ok(routes.into())
}

/// Tries every combination of candidate lines of the two location reference points, best rated
/// first, until a shortest-path that satisfies the FRC, length and variance constraints is found.
fn resolve_route_pair<G: DirectedGraph>(
    config: &DecoderConfig,
    graph: &G,
    lrp1_lines: &CandidateLines<G::EdgeId>,
    lrp2_lines: &CandidateLines<G::EdgeId>,
) -> Option<Route<G::EdgeId>> {
    let lrp1 = lrp1_lines.lrp;
    let lowest_frc = if config.ignore_frc {
        Frc::Frc7
    } else {
        lrp1.path.map_or(Frc::default(), |path| path.lfrcnp)
    };
    let dnp = lrp1.path.map_or(Length::MAX, |path| path.dnp);
    let max_length = if config.ignore_path_length {
        Length::MAX
    } else {
        dnp + config.next_point_variance
    };
    let variance = if config.ignore_path_length {
        Length::MAX
    } else {
        config.next_point_variance
    };

    let mut seen_edges: HashSet<G::EdgeId> = HashSet::new();

    let mut attempts: Vec<_> = lrp1_lines
        .lines
        .iter()
        .flat_map(|l1| lrp2_lines.lines.iter().map(move |l2| (*l1, *l2)))
        .map(|(l1, l2)| {
            // Lines already used by a higher rated attempt are degraded so that retries explore
            // distinct candidates instead of exhausting every pairing of the same top line.
            let repeats = i32::from(seen_edges.contains(&l1.edge)) + i32::from(seen_edges.contains(&l2.edge));
            seen_edges.insert(l1.edge);
            seen_edges.insert(l2.edge);

            let priority = l1.rating * l2.rating * config.same_line_degradation.powi(repeats);
            (priority, l1, l2)
        })
        .collect();

    attempts.sort_unstable_by_key(|(priority, ..)| Reverse(*priority));

    for (_, line_lrp1, line_lrp2) in attempts.into_iter().take(config.max_number_retries) {
        if let Some(path) = try_resolve_path(graph, &line_lrp1, &line_lrp2, lowest_frc, max_length, dnp, variance) {
            return Some(Route {
                path,
                candidates: CandidateLinePair {
                    line_lrp1,
                    line_lrp2,
                },
            });
        }
    }

    None
}

/// Resolves the path between a chosen pair of candidate lines. The resulting path always
/// includes both boundary candidate edges, with the shortest-path calculation only filling the
/// (possibly empty) gap between the end of the first line and the start of the second one.
fn try_resolve_path<G: DirectedGraph>(
    graph: &G,
    line_lrp1: &CandidateLine<G::EdgeId>,
    line_lrp2: &CandidateLine<G::EdgeId>,
    lowest_frc: Frc,
    search_length: Length,
    dnp: Length,
    variance: Length,
) -> Option<Path<G::EdgeId>> {
    let length_lrp1 = graph.get_edge_length(line_lrp1.edge)?;

    if line_lrp1.edge == line_lrp2.edge {
        return length_within_variance(length_lrp1, dnp, variance).then_some(Path {
            length: length_lrp1,
            edges: vec![line_lrp1.edge],
        });
    }

    let length_lrp2 = graph.get_edge_length(line_lrp2.edge)?;
    let start = graph.get_edge_end_vertex(line_lrp1.edge)?;
    let end = graph.get_edge_start_vertex(line_lrp2.edge)?;

    let gap = if start == end {
        Path::default()
    } else {
        shortest_path(graph, start, end, lowest_frc, search_length)?
    };

    let length = length_lrp1 + gap.length + length_lrp2;
    if !length_within_variance(length, dnp, variance) {
        return None;
    }

    let mut edges = Vec::with_capacity(gap.edges.len() + 2);
    edges.push(line_lrp1.edge);
    edges.extend(gap.edges);
    edges.push(line_lrp2.edge);

    Some(Path { length, edges })
}

/// Returns true if the resolved path length does not deviate from the announced distance to next
/// point (DNP) by more than the configured variance.
fn length_within_variance(length: Length, dnp: Length, variance: Length) -> bool {
    let diff = if length > dnp { length - dnp } else { dnp - length };
    diff <= variance
}
