use rand::Rng;

use crate::{Result, SageErr, graph::Graph};

/// Follows one random outgoing relationship of `node`.
///
/// Relationships are picked proportionally to their weight on weighted graphs, uniformly
/// otherwise or when every weight is zero.
///
/// # Returns
/// `None` if `node` has no outgoing relationships, or an error on a negative weight.
pub fn random_step<G, R>(graph: &G, node: u64, rng: &mut R) -> Result<Option<u64>>
where
    G: Graph + ?Sized,
    R: Rng + ?Sized,
{
    let degree = graph.degree(node);
    if degree == 0 {
        return Ok(None);
    }

    if graph.is_weighted() {
        let total = total_weight(graph, node)?;
        if total > 0. {
            return Ok(weighted_neighbor(graph, node, rng.random_range(0. ..total)));
        }
    }

    let index = rng.random_range(0..degree);
    Ok(graph.nth_neighbor(node, index).map(|(target, _)| target))
}

/// Samples a node that is structurally close to `node`.
///
/// Walks a random amount of steps in `1..=search_depth` and returns where the walk ends,
/// stopping early at nodes without outgoing relationships. An isolated node is its own
/// positive sample.
pub fn positive_sample<G, R>(
    graph: &G,
    node: u64,
    search_depth: usize,
    rng: &mut R,
) -> Result<u64>
where
    G: Graph + ?Sized,
    R: Rng + ?Sized,
{
    let steps = rng.random_range(1..=search_depth.max(1));
    let mut current = node;

    for _ in 0..steps {
        match random_step(graph, current, rng)? {
            Some(next) => current = next,
            None => break,
        }
    }

    Ok(current)
}

fn total_weight<G: Graph + ?Sized>(graph: &G, node: u64) -> Result<f64> {
    let mut total = 0.;
    let mut negative = None;

    graph.for_each_neighbor(node, &mut |target, weight| {
        if weight < 0. {
            negative = Some((target, weight));
            return false;
        }

        total += weight;
        true
    });

    match negative {
        Some((target, weight)) => Err(SageErr::NegativeRelationshipWeight {
            source: node,
            target,
            weight,
        }),
        None => Ok(total),
    }
}

fn weighted_neighbor<G: Graph + ?Sized>(graph: &G, node: u64, mut remaining: f64) -> Option<u64> {
    let mut picked = None;

    graph.for_each_neighbor(node, &mut |target, weight| {
        if weight <= 0. {
            return true;
        }

        picked = Some(target);
        remaining -= weight;
        remaining >= 0.
    });

    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{graph::CsrGraphBuilder, sampling::seeded_rng};

    #[test]
    fn dead_ends_stop_the_walk() {
        let graph = CsrGraphBuilder::new(3).relationship(0, 1).build().unwrap();
        let mut rng = seeded_rng(1);

        assert_eq!(random_step(&graph, 0, &mut rng).unwrap(), Some(1));
        assert_eq!(random_step(&graph, 1, &mut rng).unwrap(), None);
        assert_eq!(positive_sample(&graph, 0, 5, &mut rng).unwrap(), 1);
        assert_eq!(positive_sample(&graph, 2, 5, &mut rng).unwrap(), 2);
    }

    #[test]
    fn zero_weight_relationships_are_never_followed() {
        let graph = CsrGraphBuilder::new(3)
            .weighted_relationship(0, 1, 0.)
            .weighted_relationship(0, 2, 1.)
            .build()
            .unwrap();
        let mut rng = seeded_rng(5);

        for _ in 0..100 {
            assert_eq!(random_step(&graph, 0, &mut rng).unwrap(), Some(2));
        }
    }

    #[test]
    fn negative_weights_name_both_endpoints() {
        let graph = CsrGraphBuilder::new(3)
            .weighted_relationship(2, 0, 1.)
            .weighted_relationship(2, 1, -0.5)
            .build()
            .unwrap();

        match random_step(&graph, 2, &mut seeded_rng(0)) {
            Err(SageErr::NegativeRelationshipWeight {
                source,
                target,
                weight,
            }) => assert_eq!((source, target, weight), (2, 1, -0.5)),
            other => panic!("expected a negative weight error, got {other:?}"),
        }
    }
}
