use machine_learning::arch::{
    ComputationGraph, NodeId, WeightsId, layers::Layer, ops::NormalizeRows,
};
use ndarray::{Array2, Axis};

use crate::{Result, SageErr, batch::SubGraph};

/// Returns the id of the first tensor of every layer.
///
/// Tensors are numbered layer by layer, in the order `Layer::weights` lists them.
pub fn first_weight_ids(layers: &[Layer]) -> Vec<WeightsId> {
    layers
        .iter()
        .scan(0, |next, layer| {
            let first = *next;
            *next += layer.weights().len();
            Some(first)
        })
        .collect()
}

/// Adds the embedding model to `graph`.
///
/// The features of the first subgraph's input nodes go through every layer, the output
/// rows are scaled to unit length.
///
/// # Arguments
/// * `graph` - The computation graph to extend.
/// * `layers` - The layers, first layer first.
/// * `subgraphs` - One sampled subgraph per layer.
/// * `features` - One row per node of the whole graph.
///
/// # Returns
/// The node holding one embedding per output row of the last subgraph.
pub fn embeddings<'w>(
    graph: &mut ComputationGraph<'w>,
    layers: &'w [Layer],
    subgraphs: &[SubGraph],
    features: &Array2<f64>,
) -> Result<NodeId> {
    if layers.len() != subgraphs.len() {
        return Err(SageErr::InvalidConfig(format!(
            "{} subgraphs were sampled for {} layers",
            subgraphs.len(),
            layers.len()
        )));
    }

    let Some(first) = subgraphs.first() else {
        return Err(SageErr::InvalidConfig("model must have at least one layer".into()));
    };

    let rows = first
        .original_ids()
        .iter()
        .map(|&id| {
            let row = id as usize;
            if row < features.nrows() {
                Ok(row)
            } else {
                Err(SageErr::NodeOutOfRange {
                    node: id,
                    node_count: features.nrows() as u64,
                })
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let mut current = graph.constant(features.select(Axis(0), &rows));

    let first_ids = first_weight_ids(layers);
    for ((layer, subgraph), first_id) in layers.iter().zip(subgraphs).zip(first_ids) {
        current = layer.aggregate(graph, first_id, current, subgraph.adjacency())?;
    }

    Ok(graph.apply(NormalizeRows, &[current])?)
}
