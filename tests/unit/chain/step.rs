use super::*;
use crate::builtin::{Add, Gain, Plane};

fn gain(factor: f32) -> impl Fn(&mut FilterGraph<Plane>, NodeId) -> ChainResult<NodeId> {
    move |g: &mut FilterGraph<Plane>, n: NodeId| g.add(Gain::new(factor), [n])
}

#[test]
fn empty_chain_is_identity() {
    let mut graph = FilterGraph::new();
    let src = graph.source("Frame", Plane::new(1, 1)).unwrap();
    let chain = Chain::<Plane>::new();
    assert!(chain.is_empty());
    assert_eq!(chain.process(&mut graph, src).unwrap(), src);
}

#[test]
fn steps_apply_left_to_right() {
    let chain = Chain::new().then(gain(2.0)).append(Chain::new().then(gain(3.0)));
    assert_eq!(chain.len(), 2);
    assert_eq!(chain.step_names(), ["step", "step"]);

    let mut graph = FilterGraph::new();
    let src = graph.source("Frame", Plane::new(1, 1)).unwrap();
    let out = chain.process(&mut graph, src).unwrap();
    assert_eq!(
        graph.tag(out).unwrap().chain_description(),
        "Gain(3)"
    );
    assert_eq!(graph.inputs(out).unwrap().len(), 1);
    assert_eq!(graph.len(), 3);
}

#[test]
fn branching_step_joins_back() {
    let boost = |g: &mut FilterGraph<Plane>, n: NodeId| -> ChainResult<NodeId> {
        let scaled = g.add(Gain::new(0.5), [n])?;
        g.add(Add, [n, scaled])
    };
    let nested = Chain::new().then(boost);
    let chain = Chain::new().then(gain(2.0)).then(nested);
    assert_eq!(chain.step_names(), ["step", "chain"]);

    let mut graph = FilterGraph::new();
    let src = graph.source("Frame", Plane::filled(1, 1, 1.0)).unwrap();
    let out = chain.process(&mut graph, src).unwrap();
    let terminal = graph.compile(out).unwrap();
    assert_eq!(
        graph.tag(terminal).unwrap().chain_description(),
        "(Frame -> Gain(2) + Frame -> Gain(2) -> Gain(0.5)) -> Add"
    );
}

#[test]
fn failing_step_stops_the_chain() {
    let fail = |_: &mut FilterGraph<Plane>, _: NodeId| -> ChainResult<NodeId> {
        Err(crate::foundation::error::ChainError::validation("bad step"))
    };
    let chain = Chain::new().then(fail).then(gain(2.0));

    let mut graph = FilterGraph::new();
    let src = graph.source("Frame", Plane::new(1, 1)).unwrap();
    assert!(chain.process(&mut graph, src).is_err());
    assert_eq!(graph.len(), 1);
}
